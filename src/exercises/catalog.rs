use serde::Serialize;

use crate::config::{ExerciseContent, RecordEndPolicy};
use crate::exercises::generators::{PhraseStrategy, ScaleKind};
use crate::transport::{LeadIn, NoteValue};

#[derive(Serialize, Clone, Debug)]
pub struct ExercisePreset {
    pub exercise_type: String,
    pub name: String,
    pub description: String,
    pub difficulty: u8,
    pub content: ExerciseContent,
    pub record_end: RecordEndPolicy,
    pub cents_tol: f64,
    pub hold_sec: f64,
    pub pass_percent: f64,
    pub note_dur_sec: f64,
    pub bpm_range: [f64; 2],
    pub lead_in: LeadIn,
    pub rest_bars: f64,
    pub capture_range: bool,
}

#[derive(Serialize, Clone, Debug)]
pub struct ExerciseStage {
    pub stage: u8,
    pub name: String,
    pub description: String,
    pub exercises: Vec<ExercisePreset>,
}

fn melody(strategy: PhraseStrategy) -> ExerciseContent {
    ExerciseContent::Melody { strategy }
}

pub fn get_catalog() -> Vec<ExerciseStage> {
    vec![
        ExerciseStage {
            stage: 1,
            name: "Find Your Voice".to_string(),
            description: "Free singing and matching single pitches".to_string(),
            exercises: vec![
                ExercisePreset {
                    exercise_type: "range_finder".to_string(),
                    name: "Range Finder".to_string(),
                    description: "Sing your lowest and highest comfortable notes".to_string(),
                    difficulty: 1,
                    content: melody(PhraseStrategy::ZigWalk),
                    record_end: RecordEndPolicy::TimingFree {
                        min_hold_sec: 0.75,
                        max_window_sec: 8.0,
                    },
                    cents_tol: 60.0,
                    hold_sec: 0.75,
                    pass_percent: 40.0,
                    note_dur_sec: 1.0,
                    bpm_range: [60.0, 80.0],
                    lead_in: LeadIn::Beats(2.0),
                    rest_bars: 1.0,
                    capture_range: true,
                },
                ExercisePreset {
                    exercise_type: "pitch_match".to_string(),
                    name: "Pitch Match".to_string(),
                    description: "Hear a note, then hold it steady".to_string(),
                    difficulty: 1,
                    content: melody(PhraseStrategy::Diatonic(ScaleKind::MajorArpeggio)),
                    record_end: RecordEndPolicy::MusicalWindow,
                    cents_tol: 35.0,
                    hold_sec: 0.375,
                    pass_percent: 60.0,
                    note_dur_sec: 1.0,
                    bpm_range: [60.0, 80.0],
                    lead_in: LeadIn::Bars(1.0),
                    rest_bars: 1.0,
                    capture_range: false,
                },
            ],
        },
        ExerciseStage {
            stage: 2,
            name: "Scales".to_string(),
            description: "Stepwise patterns inside your range".to_string(),
            exercises: vec![
                ExercisePreset {
                    exercise_type: "major_scale".to_string(),
                    name: "Major Scale".to_string(),
                    description: "Up and down the major scale, evenly".to_string(),
                    difficulty: 2,
                    content: melody(PhraseStrategy::Diatonic(ScaleKind::Major)),
                    record_end: RecordEndPolicy::MusicalWindow,
                    cents_tol: 50.0,
                    hold_sec: 0.375,
                    pass_percent: 60.0,
                    note_dur_sec: 0.5,
                    bpm_range: [70.0, 100.0],
                    lead_in: LeadIn::Bars(1.0),
                    rest_bars: 1.0,
                    capture_range: false,
                },
                ExercisePreset {
                    exercise_type: "minor_scale".to_string(),
                    name: "Natural Minor Scale".to_string(),
                    description: "The natural minor scale up and down".to_string(),
                    difficulty: 2,
                    content: melody(PhraseStrategy::Diatonic(ScaleKind::NaturalMinor)),
                    record_end: RecordEndPolicy::MusicalWindow,
                    cents_tol: 50.0,
                    hold_sec: 0.375,
                    pass_percent: 60.0,
                    note_dur_sec: 0.5,
                    bpm_range: [70.0, 100.0],
                    lead_in: LeadIn::Bars(1.0),
                    rest_bars: 1.0,
                    capture_range: false,
                },
                ExercisePreset {
                    exercise_type: "pentatonic".to_string(),
                    name: "Pentatonic Run".to_string(),
                    description: "Five-note scale with wider steps".to_string(),
                    difficulty: 2,
                    content: melody(PhraseStrategy::Diatonic(ScaleKind::MajorPentatonic)),
                    record_end: RecordEndPolicy::MusicalWindow,
                    cents_tol: 50.0,
                    hold_sec: 0.375,
                    pass_percent: 60.0,
                    note_dur_sec: 0.5,
                    bpm_range: [70.0, 100.0],
                    lead_in: LeadIn::Bars(1.0),
                    rest_bars: 1.0,
                    capture_range: false,
                },
            ],
        },
        ExerciseStage {
            stage: 3,
            name: "Ear Training".to_string(),
            description: "Echo new melodies and rhythms".to_string(),
            exercises: vec![
                ExercisePreset {
                    exercise_type: "melodic_echo".to_string(),
                    name: "Melodic Echo".to_string(),
                    description: "Listen to a short phrase and sing it back".to_string(),
                    difficulty: 3,
                    content: melody(PhraseStrategy::ZigWalk),
                    record_end: RecordEndPolicy::MusicalWindow,
                    cents_tol: 50.0,
                    hold_sec: 0.375,
                    pass_percent: 60.0,
                    note_dur_sec: 0.5,
                    bpm_range: [80.0, 110.0],
                    lead_in: LeadIn::Bars(1.0),
                    rest_bars: 1.0,
                    capture_range: false,
                },
                ExercisePreset {
                    exercise_type: "rhythm_echo".to_string(),
                    name: "Rhythm Echo".to_string(),
                    description: "Sing the rhythm back on any comfortable note".to_string(),
                    difficulty: 3,
                    content: ExerciseContent::Rhythm {
                        bars: 2,
                        rest_probability: 0.2,
                        palette: vec![
                            NoteValue::Half,
                            NoteValue::Quarter,
                            NoteValue::Quarter,
                            NoteValue::Eighth,
                            NoteValue::Eighth,
                            NoteValue::DottedQuarter,
                        ],
                    },
                    record_end: RecordEndPolicy::MusicalWindow,
                    cents_tol: 60.0,
                    hold_sec: 0.375,
                    pass_percent: 60.0,
                    note_dur_sec: 0.5,
                    bpm_range: [80.0, 120.0],
                    lead_in: LeadIn::Bars(1.0),
                    rest_bars: 1.0,
                    capture_range: false,
                },
            ],
        },
    ]
}

/// All presets across stages, in stage order.
pub fn exercise_presets() -> Vec<ExercisePreset> {
    get_catalog().into_iter().flat_map(|s| s.exercises).collect()
}

pub fn find_preset(exercise_type: &str) -> Option<ExercisePreset> {
    exercise_presets()
        .into_iter()
        .find(|p| p.exercise_type == exercise_type)
}
