//! Transport clock: musical time to seconds.
//!
//! Everything here is a pure function of tempo and meter. Tempo, numerator
//! and denominator are clamped to at least 1 before any division, so a bad
//! authoring value degrades to a slow tempo instead of an infinite window.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ticks per whole note used for exact note-value arithmetic.
pub const TICKS_PER_WHOLE: u32 = 96;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    pub num: u32,
    pub den: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self { num: 4, den: 4 }
    }
}

impl TimeSignature {
    pub fn new(num: u32, den: u32) -> Self {
        Self {
            num: num.max(1),
            den: den.max(1),
        }
    }

    /// Parse "7/8" style text. Anything malformed yields 4/4.
    pub fn parse(text: &str) -> Self {
        let mut parts = text.trim().splitn(2, '/');
        let num = parts.next().and_then(|s| s.trim().parse::<u32>().ok());
        let den = parts.next().and_then(|s| s.trim().parse::<u32>().ok());
        match (num, den) {
            (Some(n), Some(d)) if n >= 1 && d >= 1 => Self { num: n, den: d },
            _ => Self::default(),
        }
    }

    /// Length of one bar in note-value ticks.
    pub fn bar_ticks(&self) -> u32 {
        let ticks = self.num.max(1) * TICKS_PER_WHOLE / self.den.max(1);
        if ticks == 0 {
            TICKS_PER_WHOLE
        } else {
            ticks
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NoteValue {
    Whole,
    DottedHalf,
    Half,
    DottedQuarter,
    Quarter,
    TripletQuarter,
    DottedEighth,
    Eighth,
    TripletEighth,
    Sixteenth,
}

impl NoteValue {
    /// Duration in ticks (`TICKS_PER_WHOLE` per whole note).
    pub fn ticks(&self) -> u32 {
        match self {
            NoteValue::Whole => 96,
            NoteValue::DottedHalf => 72,
            NoteValue::Half => 48,
            NoteValue::DottedQuarter => 36,
            NoteValue::Quarter => 24,
            NoteValue::TripletQuarter => 16,
            NoteValue::DottedEighth => 18,
            NoteValue::Eighth => 12,
            NoteValue::TripletEighth => 8,
            NoteValue::Sixteenth => 6,
        }
    }

    /// Fraction of a whole note.
    pub fn whole_fraction(&self) -> f64 {
        self.ticks() as f64 / TICKS_PER_WHOLE as f64
    }
}

fn clamp_bpm(bpm: f64) -> f64 {
    if bpm.is_finite() && bpm >= 1.0 {
        bpm
    } else {
        1.0
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// `(60 / bpm) * (4 / den)`
pub fn seconds_per_beat(bpm: f64, den: u32) -> f64 {
    (60.0 / clamp_bpm(bpm)) * (4.0 / den.max(1) as f64)
}

pub fn beats_to_seconds(beats: f64, bpm: f64, den: u32) -> f64 {
    non_negative(beats) * seconds_per_beat(bpm, den)
}

pub fn bars_to_beats(bars: f64, num: u32) -> f64 {
    non_negative(bars) * num.max(1) as f64
}

/// A note value lasts `fraction * den` beats of the given meter.
pub fn note_value_to_seconds(value: NoteValue, bpm: f64, den: u32) -> f64 {
    let beats = value.whole_fraction() * den.max(1) as f64;
    beats_to_seconds(beats, bpm, den)
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(rename_all = "snake_case", tag = "unit", content = "count")]
pub enum LeadIn {
    Bars(f64),
    Beats(f64),
}

impl Default for LeadIn {
    fn default() -> Self {
        LeadIn::Bars(1.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Transport {
    pub bpm: f64,
    pub ts: TimeSignature,
    pub lead_in: LeadIn,
    pub rest_bars: f64,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            bpm: 80.0,
            ts: TimeSignature::default(),
            lead_in: LeadIn::default(),
            rest_bars: 1.0,
        }
    }
}

impl Transport {
    pub fn seconds_per_beat(&self) -> f64 {
        seconds_per_beat(self.bpm, self.ts.den)
    }

    pub fn bar_seconds(&self) -> f64 {
        beats_to_seconds(bars_to_beats(1.0, self.ts.num), self.bpm, self.ts.den)
    }

    pub fn lead_beats(&self) -> f64 {
        match self.lead_in {
            LeadIn::Bars(bars) => bars_to_beats(bars, self.ts.num),
            LeadIn::Beats(beats) => non_negative(beats),
        }
    }

    pub fn lead_seconds(&self) -> f64 {
        beats_to_seconds(self.lead_beats(), self.bpm, self.ts.den)
    }

    pub fn rest_seconds(&self) -> f64 {
        beats_to_seconds(bars_to_beats(self.rest_bars, self.ts.num), self.bpm, self.ts.den)
    }

    /// Record window covering `content_sec`, rounded up to whole bars (at least one).
    pub fn record_seconds(&self, content_sec: f64) -> f64 {
        let bar = self.bar_seconds();
        let bars = (non_negative(content_sec) / bar).ceil().max(1.0);
        bars * bar
    }

    /// Absolute times (ms) of each count-in beat starting at `anchor_ms`.
    pub fn count_in_beats_ms(&self, anchor_ms: f64) -> Vec<f64> {
        let beats = self.lead_beats().floor() as usize;
        let step = self.seconds_per_beat() * 1000.0;
        (0..beats).map(|i| anchor_ms + i as f64 * step).collect()
    }
}
