use serde::{Deserialize, Serialize};

use crate::pitch::units::{hz_to_midi, DEFAULT_A4_HZ};
use crate::rng::SeededRng;
use crate::scoring::types::{Note, Phrase, RhythmEvent};
use crate::transport::{NoteValue, TimeSignature};

/// Total length the zig-walk aims for when the caller does not say.
pub const DEFAULT_PHRASE_SEC: f64 = 4.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScaleKind {
    Major,
    NaturalMinor,
    MajorPentatonic,
    MajorArpeggio,
}

impl ScaleKind {
    /// Semitone offsets from the root, ending on the octave.
    pub fn offsets(&self) -> &'static [i32] {
        match self {
            ScaleKind::Major => &[0, 2, 4, 5, 7, 9, 11, 12],
            ScaleKind::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10, 12],
            ScaleKind::MajorPentatonic => &[0, 2, 4, 7, 9, 12],
            ScaleKind::MajorArpeggio => &[0, 4, 7, 12],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScaleKind::Major => "major",
            ScaleKind::NaturalMinor => "natural_minor",
            ScaleKind::MajorPentatonic => "major_pentatonic",
            ScaleKind::MajorArpeggio => "major_arpeggio",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "scale")]
pub enum PhraseStrategy {
    ZigWalk,
    Diatonic(ScaleKind),
}

impl Default for PhraseStrategy {
    fn default() -> Self {
        PhraseStrategy::ZigWalk
    }
}

impl PhraseStrategy {
    pub fn parse(name: &str) -> Result<Self, String> {
        match name {
            "zig_walk" | "zigwalk" => Ok(PhraseStrategy::ZigWalk),
            "major" => Ok(PhraseStrategy::Diatonic(ScaleKind::Major)),
            "natural_minor" | "minor" => Ok(PhraseStrategy::Diatonic(ScaleKind::NaturalMinor)),
            "major_pentatonic" | "pentatonic" => {
                Ok(PhraseStrategy::Diatonic(ScaleKind::MajorPentatonic))
            }
            "major_arpeggio" | "arpeggio" => Ok(PhraseStrategy::Diatonic(ScaleKind::MajorArpeggio)),
            _ => Err(format!("Unknown phrase strategy: {}", name)),
        }
    }

    /// Scale name stored in take metadata.
    pub fn scale_name(&self) -> Option<&'static str> {
        match self {
            PhraseStrategy::ZigWalk => None,
            PhraseStrategy::Diatonic(scale) => Some(scale.name()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PhraseParams {
    pub low_hz: Option<f64>,
    pub high_hz: Option<f64>,
    pub a4_hz: f64,
    pub note_dur_sec: f64,
    pub seed: u32,
    pub target_sec: f64,
    pub strategy: PhraseStrategy,
}

impl PhraseParams {
    pub fn new(low_hz: Option<f64>, high_hz: Option<f64>, note_dur_sec: f64, seed: u32) -> Self {
        Self {
            low_hz,
            high_hz,
            a4_hz: DEFAULT_A4_HZ,
            note_dur_sec,
            seed,
            target_sec: DEFAULT_PHRASE_SEC,
            strategy: PhraseStrategy::ZigWalk,
        }
    }
}

/// MIDI window for a vocal range. `None` if either bound is unknown or the
/// window has no width.
pub fn midi_window(low_hz: Option<f64>, high_hz: Option<f64>, a4_hz: f64) -> Option<(i32, i32)> {
    let low = hz_to_midi(low_hz?, a4_hz)?;
    let high = hz_to_midi(high_hz?, a4_hz)?;
    if high <= low {
        return None;
    }
    Some((low, high))
}

/// Generate a target phrase. Pure: the same params always give the same phrase.
pub fn generate_phrase(params: &PhraseParams) -> Phrase {
    let Some((low, high)) = midi_window(params.low_hz, params.high_hz, params.a4_hz) else {
        return Phrase::empty();
    };
    if !params.note_dur_sec.is_finite() || params.note_dur_sec <= 0.0 {
        return Phrase::empty();
    }
    let mut rng = SeededRng::new(params.seed);

    let midis = match params.strategy {
        PhraseStrategy::ZigWalk => {
            let target = if params.target_sec.is_finite() && params.target_sec > 0.0 {
                params.target_sec
            } else {
                DEFAULT_PHRASE_SEC
            };
            let count = ((target / params.note_dur_sec).ceil() as usize).max(1);
            zig_walk(low, high, count, &mut rng)
        }
        PhraseStrategy::Diatonic(scale) => diatonic(low, high, scale, &mut rng),
    };

    build_phrase(&midis, params.note_dur_sec)
}

fn build_phrase(midis: &[i32], note_dur_sec: f64) -> Phrase {
    let notes: Vec<Note> = midis
        .iter()
        .enumerate()
        .map(|(i, &midi)| Note {
            midi,
            start_sec: i as f64 * note_dur_sec,
            dur_sec: note_dur_sec,
        })
        .collect();
    Phrase {
        duration_sec: notes.len() as f64 * note_dur_sec,
        notes,
    }
}

/// Walk 1-2 semitones at a time, bouncing off the window edges.
fn zig_walk(low: i32, high: i32, count: usize, rng: &mut SeededRng) -> Vec<i32> {
    let center = (low + high) / 2;
    let mut current = (center + rng.range_i32_inclusive(-1, 1)).clamp(low, high);
    let mut direction = if rng.chance(0.5) { 1 } else { -1 };

    let mut midis = Vec::with_capacity(count);
    for _ in 0..count {
        midis.push(current);
        let step = rng.range_i32_inclusive(1, 2);
        let mut next = current + direction * step;
        if next > high || next < low {
            direction = -direction;
            next = current + direction * step;
        }
        current = next.clamp(low, high);
    }
    midis
}

/// Scale pattern up then back down. Windowed at a random root when the range
/// covers the octave, otherwise squeezed into the available span.
fn diatonic(low: i32, high: i32, scale: ScaleKind, rng: &mut SeededRng) -> Vec<i32> {
    let offsets = scale.offsets();
    let span = high - low;
    let top = *offsets.last().unwrap_or(&12);

    let ascending: Vec<i32> = if span >= top {
        let root = rng.range_i32_inclusive(low, high - top);
        offsets.iter().map(|o| root + o).collect()
    } else {
        let mut squeezed: Vec<i32> = offsets
            .iter()
            .map(|&o| low + ((o * span) as f64 / top as f64).round() as i32)
            .collect();
        squeezed.dedup();
        squeezed
    };

    let mut midis = ascending.clone();
    midis.extend(ascending.iter().rev().skip(1));
    midis
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RhythmParams {
    pub bars: u32,
    pub ts: TimeSignature,
    pub seed: u32,
    pub rest_probability: f64,
    pub palette: Vec<NoteValue>,
}

impl Default for RhythmParams {
    fn default() -> Self {
        Self {
            bars: 2,
            ts: TimeSignature::default(),
            seed: 0,
            rest_probability: 0.15,
            palette: vec![
                NoteValue::Half,
                NoteValue::Quarter,
                NoteValue::Quarter,
                NoteValue::Eighth,
                NoteValue::Eighth,
            ],
        }
    }
}

/// Fill whole bars with events drawn from the palette. Independent of pitch.
pub fn generate_rhythm(params: &RhythmParams) -> Vec<RhythmEvent> {
    let mut rng = SeededRng::new(params.seed);
    let bar_ticks = params.ts.bar_ticks();
    let mut events = Vec::new();

    for _ in 0..params.bars {
        let mut remaining = bar_ticks;
        while remaining > 0 {
            let fitting: Vec<NoteValue> = params
                .palette
                .iter()
                .copied()
                .filter(|v| v.ticks() <= remaining)
                .collect();
            let value = match rng.pick(&fitting) {
                Some(v) => *v,
                None => smallest_fill(remaining),
            };
            remaining -= value.ticks().min(remaining);

            let rest = !events.is_empty() && rng.chance(params.rest_probability);
            events.push(if rest {
                RhythmEvent::rest(value)
            } else {
                RhythmEvent::note(value)
            });
        }
    }
    events
}

/// Largest standard value that fits when the palette has nothing left.
fn smallest_fill(remaining: u32) -> NoteValue {
    const LADDER: [NoteValue; 10] = [
        NoteValue::Whole,
        NoteValue::DottedHalf,
        NoteValue::Half,
        NoteValue::DottedQuarter,
        NoteValue::Quarter,
        NoteValue::DottedEighth,
        NoteValue::TripletQuarter,
        NoteValue::Eighth,
        NoteValue::TripletEighth,
        NoteValue::Sixteenth,
    ];
    LADDER
        .iter()
        .copied()
        .find(|v| v.ticks() <= remaining)
        .unwrap_or(NoteValue::Sixteenth)
}
