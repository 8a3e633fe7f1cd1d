//! Practice session configuration.
//!
//! Every tuning constant is a named field with a default, and every struct is
//! `#[serde(default)]`, so a host can send a partial JSON document and only
//! override what it cares about.

use serde::{Deserialize, Serialize};

use crate::error::{PracticeError, PracticeResult};
use crate::exercises::catalog::ExercisePreset;
use crate::exercises::generators::{PhraseStrategy, RhythmParams, DEFAULT_PHRASE_SEC};
use crate::pitch::gate::GateConfig;
use crate::pitch::sampler::SamplerConfig;
use crate::pitch::units::DEFAULT_A4_HZ;
use crate::scoring::types::ScoringConfig;
use crate::transport::Transport;

/// What the singer is asked to reproduce each take.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExerciseContent {
    /// Range-bounded melody; needs a known vocal range.
    Melody { strategy: PhraseStrategy },
    /// Pitch-independent rhythm fabric. Seed and meter come from the session.
    Rhythm {
        bars: u32,
        rest_probability: f64,
        palette: Vec<crate::transport::NoteValue>,
    },
}

impl Default for ExerciseContent {
    fn default() -> Self {
        ExerciseContent::Melody {
            strategy: PhraseStrategy::ZigWalk,
        }
    }
}

impl ExerciseContent {
    pub fn rhythm_default() -> Self {
        let defaults = RhythmParams::default();
        ExerciseContent::Rhythm {
            bars: defaults.bars,
            rest_probability: defaults.rest_probability,
            palette: defaults.palette,
        }
    }
}

/// How the record phase ends. Both end in the same `record -> evaluate` step.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum RecordEndPolicy {
    /// Fixed window from the transport, sized to the content.
    MusicalWindow,
    /// Ends once any confident pitch is held for `min_hold_sec`, or after
    /// `max_window_sec` if that never happens.
    TimingFree { min_hold_sec: f64, max_window_sec: f64 },
}

impl Default for RecordEndPolicy {
    fn default() -> Self {
        RecordEndPolicy::MusicalWindow
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LyricMode {
    #[default]
    Off,
    Free,
    NoRepeat,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PracticeConfig {
    pub transport: Transport,
    pub content: ExerciseContent,
    pub record_end: RecordEndPolicy,
    pub lyrics: LyricMode,
    pub a4_hz: f64,
    pub note_dur_sec: f64,
    pub phrase_target_sec: f64,
    pub initial_seed: u32,
    pub initial_lyric_seed: u32,
    pub max_takes: u32,
    pub max_session_sec: f64,
    /// Schedule a metronome count-in during lead-in.
    pub count_in: bool,
    /// Shift count-in clicks earlier by the calibrated output latency.
    pub beat_sync: bool,
    /// Fold each take's sung extremes into the range capture.
    pub capture_range: bool,
    pub sampler: SamplerConfig,
    pub scoring: ScoringConfig,
    /// Tuning for hosts that run a sustain gate alongside the loop.
    pub gate: GateConfig,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            content: ExerciseContent::default(),
            record_end: RecordEndPolicy::default(),
            lyrics: LyricMode::default(),
            a4_hz: DEFAULT_A4_HZ,
            note_dur_sec: 0.5,
            phrase_target_sec: DEFAULT_PHRASE_SEC,
            initial_seed: 1,
            initial_lyric_seed: 1,
            max_takes: 8,
            max_session_sec: 15.0 * 60.0,
            count_in: true,
            beat_sync: false,
            capture_range: false,
            sampler: SamplerConfig::default(),
            scoring: ScoringConfig::default(),
            gate: GateConfig::default(),
        }
    }
}

impl PracticeConfig {
    pub fn from_json(json: &str) -> PracticeResult<Self> {
        let config: PracticeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Config for a catalog exercise, everything else at defaults.
    pub fn from_preset(preset: &ExercisePreset) -> Self {
        let mut config = PracticeConfig {
            content: preset.content.clone(),
            record_end: preset.record_end.clone(),
            note_dur_sec: preset.note_dur_sec,
            capture_range: preset.capture_range,
            ..PracticeConfig::default()
        };
        config.transport.bpm = preset.bpm_range[0];
        config.transport.lead_in = preset.lead_in;
        config.transport.rest_bars = preset.rest_bars;
        config.scoring.cents_tol = preset.cents_tol;
        config.scoring.pass_percent = preset.pass_percent;
        config.gate.cents_tol = preset.cents_tol;
        config.gate.hold_sec = preset.hold_sec;
        config
    }

    /// Rejects values no clamping can make sense of.
    pub fn validate(&self) -> PracticeResult<()> {
        if self.max_takes == 0 {
            return Err(PracticeError::Config("max_takes must be at least 1".to_string()));
        }
        if !self.note_dur_sec.is_finite() || self.note_dur_sec <= 0.0 {
            return Err(PracticeError::Config(format!(
                "note_dur_sec must be positive, got {}",
                self.note_dur_sec
            )));
        }
        if !self.max_session_sec.is_finite() || self.max_session_sec <= 0.0 {
            return Err(PracticeError::Config(format!(
                "max_session_sec must be positive, got {}",
                self.max_session_sec
            )));
        }
        let w = &self.scoring.weights;
        if [w.pitch, w.melody, w.rhythm, w.intervals]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(PracticeError::Config(
                "score weights must be non-negative".to_string(),
            ));
        }
        if let RecordEndPolicy::TimingFree {
            min_hold_sec,
            max_window_sec,
        } = self.record_end
        {
            if !(max_window_sec > 0.0) || !(min_hold_sec >= 0.0) {
                return Err(PracticeError::Config(
                    "timing-free capture needs a positive max window".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercises::catalog::exercise_presets;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PracticeConfig::from_json(
            r#"{ "max_takes": 3, "transport": { "bpm": 100 }, "scoring": { "pass_percent": 75 } }"#,
        )
        .unwrap();
        assert_eq!(config.max_takes, 3);
        assert_eq!(config.transport.bpm, 100.0);
        assert_eq!(config.transport.ts.num, 4);
        assert_eq!(config.scoring.pass_percent, 75.0);
        assert_eq!(config.scoring.conf_min, 0.6);
        assert_eq!(config.content, ExerciseContent::default());
    }

    #[test]
    fn test_tagged_content_and_policy() {
        let config = PracticeConfig::from_json(
            r#"{
                "content": { "kind": "melody", "strategy": { "kind": "diatonic", "scale": "major" } },
                "record_end": { "policy": "timing_free", "min_hold_sec": 0.5, "max_window_sec": 8 }
            }"#,
        )
        .unwrap();
        assert!(matches!(config.content, ExerciseContent::Melody { .. }));
        assert!(matches!(config.record_end, RecordEndPolicy::TimingFree { .. }));
    }

    #[test]
    fn test_rejects_zero_takes() {
        let err = PracticeConfig::from_json(r#"{ "max_takes": 0 }"#).unwrap_err();
        assert!(matches!(err, PracticeError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = PracticeConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, PracticeError::Serialization(_)));
    }

    #[test]
    fn test_every_preset_builds_a_valid_config() {
        for preset in exercise_presets() {
            let config = PracticeConfig::from_preset(&preset);
            assert!(config.validate().is_ok(), "{} is invalid", preset.name);
            assert_eq!(config.scoring.cents_tol, preset.cents_tol);
        }
    }
}
