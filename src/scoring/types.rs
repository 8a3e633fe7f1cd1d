use serde::{Deserialize, Serialize};

use crate::transport::{note_value_to_seconds, NoteValue};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Note {
    pub midi: i32,
    pub start_sec: f64,
    pub dur_sec: f64,
}

impl Note {
    pub fn end_sec(&self) -> f64 {
        self.start_sec + self.dur_sec
    }

    pub fn contains(&self, t_sec: f64) -> bool {
        t_sec >= self.start_sec && t_sec < self.end_sec()
    }
}

/// Target melody for one take. Notes are ordered by `start_sec`.
/// An empty phrase means "no exercise content", not an error.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct Phrase {
    pub duration_sec: f64,
    pub notes: Vec<Note>,
}

impl Phrase {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Note sounding at `t_sec`, if any.
    pub fn note_at(&self, t_sec: f64) -> Option<&Note> {
        self.notes.iter().find(|n| n.contains(t_sec))
    }

    pub fn onsets(&self) -> Vec<f64> {
        self.notes.iter().map(|n| n.start_sec).collect()
    }

    pub fn midi_span(&self) -> Option<(i32, i32)> {
        let lo = self.notes.iter().map(|n| n.midi).min()?;
        let hi = self.notes.iter().map(|n| n.midi).max()?;
        Some((lo, hi))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RhythmEventKind {
    Note,
    Rest,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RhythmEvent {
    #[serde(rename = "type")]
    pub kind: RhythmEventKind,
    pub value: NoteValue,
}

impl RhythmEvent {
    pub fn note(value: NoteValue) -> Self {
        Self {
            kind: RhythmEventKind::Note,
            value,
        }
    }

    pub fn rest(value: NoteValue) -> Self {
        Self {
            kind: RhythmEventKind::Rest,
            value,
        }
    }

    pub fn is_rest(&self) -> bool {
        self.kind == RhythmEventKind::Rest
    }
}

/// Onset times of the "note" events, accumulating every event's duration.
pub fn rhythm_onsets(events: &[RhythmEvent], bpm: f64, den: u32) -> Vec<f64> {
    let mut t = 0.0;
    let mut onsets = Vec::new();
    for event in events {
        if !event.is_rest() {
            onsets.push(t);
        }
        t += note_value_to_seconds(event.value, bpm, den);
    }
    onsets
}

pub fn rhythm_duration_sec(events: &[RhythmEvent], bpm: f64, den: u32) -> f64 {
    events
        .iter()
        .map(|e| note_value_to_seconds(e.value, bpm, den))
        .sum()
}

/// What a take is scored against. Times are seconds from the record anchor.
/// `rhythm_onsets` empty means the phrase's own note starts are the onsets.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ScoringTarget {
    pub phrase: Phrase,
    pub rhythm_onsets: Vec<f64>,
    pub seconds_per_beat: f64,
    pub a4_hz: f64,
}

impl Default for ScoringTarget {
    fn default() -> Self {
        Self {
            phrase: Phrase::empty(),
            rhythm_onsets: Vec::new(),
            seconds_per_beat: 0.75,
            a4_hz: crate::pitch::units::DEFAULT_A4_HZ,
        }
    }
}

impl ScoringTarget {
    pub fn onsets(&self) -> Vec<f64> {
        if self.rhythm_onsets.is_empty() {
            self.phrase.onsets()
        } else {
            self.rhythm_onsets.clone()
        }
    }
}

/// One sampler reading, timestamped relative to the take anchor.
/// `hz == None` means nothing voiced was detected in that frame.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PitchSample {
    pub t_sec: f64,
    pub hz: Option<f64>,
    pub conf: f64,
}

impl PitchSample {
    pub fn confident_hz(&self, conf_min: f64) -> Option<f64> {
        if self.conf >= conf_min {
            self.hz.filter(|hz| hz.is_finite() && *hz > 0.0)
        } else {
            None
        }
    }
}

/// Relative weight of each sub-score in the final percent. Weights must be
/// non-negative; they are normalised over the sub-scores that apply.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ScoreWeights {
    pub pitch: f64,
    pub melody: f64,
    pub rhythm: f64,
    pub intervals: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            pitch: 0.4,
            melody: 0.2,
            rhythm: 0.25,
            intervals: 0.15,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Samples below this confidence count as unvoiced.
    pub conf_min: f64,
    /// Full credit inside this many cents of the target.
    pub cents_tol: f64,
    /// Credit falls to zero this many cents beyond `cents_tol`.
    pub falloff_cents: f64,
    /// Sung pitch moves smaller than this count as "no movement" for contour.
    pub contour_deadband_cents: f64,
    /// Onset matching window, in beats of the take's tempo.
    pub onset_tolerance_beats: f64,
    /// A voiced run must last this long to count as an onset.
    pub min_onset_hold_sec: f64,
    /// A held pitch moving this far starts a new (legato) onset.
    pub onset_split_cents: f64,
    pub weights: ScoreWeights,
    /// Final percent needed for a take to pass.
    pub pass_percent: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            conf_min: 0.6,
            cents_tol: 50.0,
            falloff_cents: 100.0,
            contour_deadband_cents: 50.0,
            onset_tolerance_beats: 0.25,
            min_onset_hold_sec: 0.08,
            onset_split_cents: 70.0,
            weights: ScoreWeights::default(),
            pass_percent: 60.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FinalScore {
    pub percent: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PitchScore {
    pub percent: f64,
    /// Samples that fell inside a target note window.
    pub samples_scored: u32,
    pub samples_in_tolerance: u32,
    pub samples_unvoiced: u32,
    pub mean_cents_error: f64,
    pub mean_abs_cents_error: f64,
    pub tendency: String, // "sharp", "flat", "accurate"
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MelodyScore {
    pub percent: f64,
    pub transitions_compared: u32,
    pub transitions_matched: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RhythmScore {
    pub percent: f64,
    pub onsets_expected: u32,
    pub onsets_detected: u32,
    pub onsets_matched: u32,
    pub mean_offset_sec: f64,
    pub tendency: String, // "early", "late", "on_time"
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IntervalProblem {
    pub from_note: String,
    pub to_note: String,
    pub direction: String, // "up" or "down"
    pub avg_error_cents: f64,
    pub count: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct IntervalScore {
    pub percent: f64,
    pub intervals_compared: u32,
    pub mean_abs_error_cents: f64,
    pub problems: Vec<IntervalProblem>,
}

/// Score for one take. Built once from an immutable trace and never mutated.
/// A sub-score is `None` when the target gives it nothing to measure.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TakeScore {
    #[serde(rename = "final")]
    pub final_score: FinalScore,
    pub pitch: Option<PitchScore>,
    pub melody: Option<MelodyScore>,
    pub rhythm: Option<RhythmScore>,
    pub intervals: Option<IntervalScore>,
    #[serde(default)]
    pub feedback: Vec<String>,
}

impl TakeScore {
    pub fn percent(&self) -> f64 {
        self.final_score.percent
    }

    pub fn passed(&self, pass_percent: f64) -> bool {
        self.final_score.percent >= pass_percent
    }
}
