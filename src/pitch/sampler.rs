//! Fixed-cadence recorder of the live pitch stream.
//!
//! The sampler is polled from the host's frame loop and throttles itself
//! against the caller's monotonic clock, so a late or doubled frame never
//! produces a burst of samples. It keeps its trace private: callers read an
//! immutable copy through `snapshot()`.

use serde::{Deserialize, Serialize};

use crate::pitch::LivePitch;
use crate::scoring::types::PitchSample;

/// Polls closer together than this fraction of the interval are dropped.
const JITTER_SLACK: f64 = 0.8;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SamplerConfig {
    pub rate_hz: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self { rate_hz: 60.0 }
    }
}

#[derive(Debug, Clone)]
pub struct PitchSampler {
    interval_ms: f64,
    anchor_ms: Option<f64>,
    last_sample_ms: Option<f64>,
    running: bool,
    trace: Vec<PitchSample>,
}

impl PitchSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        let rate = if config.rate_hz.is_finite() && config.rate_hz > 0.0 {
            config.rate_hz
        } else {
            SamplerConfig::default().rate_hz
        };
        Self {
            interval_ms: 1000.0 / rate,
            anchor_ms: None,
            last_sample_ms: None,
            running: false,
            trace: Vec::new(),
        }
    }

    /// Start a fresh trace. With `anchor_ms == None` the first sample's time becomes t=0.
    pub fn arm(&mut self, anchor_ms: Option<f64>) {
        self.trace.clear();
        self.anchor_ms = anchor_ms;
        self.last_sample_ms = None;
        self.running = true;
    }

    /// Stop sampling. Idempotent; captured samples are kept.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Discard the trace and clear the anchor so the next `arm` starts clean.
    pub fn reset(&mut self) {
        self.running = false;
        self.trace.clear();
        self.anchor_ms = None;
        self.last_sample_ms = None;
    }

    /// Record `live` if running and enough time has passed. Returns whether a sample was taken.
    pub fn poll(&mut self, now_ms: f64, live: LivePitch) -> bool {
        if !self.running || !now_ms.is_finite() {
            return false;
        }
        if let Some(last) = self.last_sample_ms {
            if now_ms - last < self.interval_ms * JITTER_SLACK {
                return false;
            }
        }
        let anchor = *self.anchor_ms.get_or_insert(now_ms);
        self.last_sample_ms = Some(now_ms);
        self.trace.push(PitchSample {
            t_sec: ((now_ms - anchor) / 1000.0).max(0.0),
            hz: live.voiced_hz(),
            conf: if live.confidence.is_finite() {
                live.confidence.clamp(0.0, 1.0)
            } else {
                0.0
            },
        });
        true
    }

    pub fn snapshot(&self) -> Vec<PitchSample> {
        self.trace.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn anchor_ms(&self) -> Option<f64> {
        self.anchor_ms
    }

    pub fn len(&self) -> usize {
        self.trace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace.is_empty()
    }
}
