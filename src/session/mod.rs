pub mod host;
pub mod packager;
pub mod practice;
pub mod scheduler;
