pub mod analyzer;
pub mod types;
