//! Collaborator contracts for the practice loop.
//!
//! The loop never touches audio hardware. Playback, capture and pitch
//! detection belong to whoever embeds it, behind `PracticeHost`; pushed
//! changes (range, latency) arrive as `HostUpdate` messages on a channel.

use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::pitch::LivePitch;
use crate::session::practice::TakeContent;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct VocalRange {
    pub low_hz: Option<f64>,
    pub high_hz: Option<f64>,
}

impl VocalRange {
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self {
            low_hz: Some(low_hz),
            high_hz: Some(high_hz),
        }
    }

    pub fn is_known(&self) -> bool {
        self.low_hz.is_some() && self.high_hz.is_some()
    }
}

/// Pushed from the host; drained by the loop on its next tick.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum HostUpdate {
    RangeChanged { range: VocalRange },
    LatencyChanged { latency_ms: Option<f64> },
}

/// Identifies one `play_call` request. Completions carrying a ticket from
/// before a reset are ignored.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallTicket {
    pub epoch: u64,
    pub take_index: u32,
}

/// Metronome clicks for one lead-in, in host clock milliseconds.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CountInCue {
    pub anchor_ms: f64,
    pub beat_times_ms: Vec<f64>,
    pub bpm: f64,
    pub beats_per_bar: u32,
    /// Latency the beats were shifted by, if beat-synced.
    pub latency_shift_ms: Option<f64>,
}

pub trait PracticeHost {
    /// Begin playing the call for `take`. Must return promptly; completion is
    /// reported back through `PracticeLoop::call_finished` with the same ticket.
    fn play_call(&mut self, ticket: CallTicket, take: &TakeContent) -> Result<(), HostError>;

    fn start_capture(&mut self) -> Result<(), HostError>;

    fn stop_capture(&mut self) -> Result<(), HostError>;

    /// Polled once per tick while recording.
    fn live_pitch(&self) -> LivePitch;

    /// Read when a take's phrase is generated.
    fn vocal_range(&self) -> VocalRange;

    fn calibrated_latency_ms(&self) -> Option<f64> {
        None
    }

    fn schedule_count_in(&mut self, _cue: &CountInCue) {}
}
