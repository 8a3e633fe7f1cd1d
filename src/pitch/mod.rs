pub mod gate;
pub mod sampler;
pub mod units;

use serde::{Deserialize, Serialize};

/// One reading of the external pitch detector.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct LivePitch {
    pub hz: Option<f64>,
    pub confidence: f64,
}

impl LivePitch {
    pub fn new(hz: Option<f64>, confidence: f64) -> Self {
        Self { hz, confidence }
    }

    pub fn silence() -> Self {
        Self {
            hz: None,
            confidence: 0.0,
        }
    }

    /// Voiced frequency, if the detector reported a usable one.
    pub fn voiced_hz(&self) -> Option<f64> {
        self.hz.filter(|hz| hz.is_finite() && *hz > 0.0)
    }

    /// Voiced and at least `conf_min` confident.
    pub fn confident_hz(&self, conf_min: f64) -> Option<f64> {
        if self.confidence >= conf_min {
            self.voiced_hz()
        } else {
            None
        }
    }
}

impl Default for LivePitch {
    fn default() -> Self {
        Self::silence()
    }
}
