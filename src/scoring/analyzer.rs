use std::collections::BTreeMap;

use crate::pitch::units::{cents_between, hz_to_midi_float, midi_to_hz, midi_to_name};
use crate::scoring::types::*;

/// Credit for a deviation: full inside `tol`, falling linearly to zero over
/// `falloff` cents beyond it.
fn credit_for(abs_cents: f64, tol: f64, falloff: f64) -> f64 {
    if abs_cents <= tol {
        1.0
    } else if falloff <= 0.0 {
        0.0
    } else {
        (1.0 - (abs_cents - tol) / falloff).max(0.0)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Scores one take. A pure function of the trace, the target and the tuning;
/// the trace is expected in time order, as the sampler produces it.
pub fn score_take(trace: &[PitchSample], target: &ScoringTarget, config: &ScoringConfig) -> TakeScore {
    let sung = sung_per_note(trace, target, config);

    let pitch = score_pitch(trace, target, config);
    let melody = score_melody(&target.phrase, &sung, config);
    let intervals = score_intervals(&target.phrase, &sung, config);
    let rhythm = score_rhythm(trace, target, config);

    let final_score = FinalScore {
        percent: combine(
            &config.weights,
            pitch.as_ref().map(|s| s.percent),
            melody.as_ref().map(|s| s.percent),
            rhythm.as_ref().map(|s| s.percent),
            intervals.as_ref().map(|s| s.percent),
        ),
    };

    let feedback = build_feedback(
        final_score.percent,
        pitch.as_ref(),
        melody.as_ref(),
        rhythm.as_ref(),
        intervals.as_ref(),
    );

    TakeScore {
        final_score,
        pitch,
        melody,
        rhythm,
        intervals,
        feedback,
    }
}

/// Weighted mean over the sub-scores that apply to the target.
fn combine(
    weights: &ScoreWeights,
    pitch: Option<f64>,
    melody: Option<f64>,
    rhythm: Option<f64>,
    intervals: Option<f64>,
) -> f64 {
    let parts: Vec<(f64, f64)> = [
        (weights.pitch, pitch),
        (weights.melody, melody),
        (weights.rhythm, rhythm),
        (weights.intervals, intervals),
    ]
    .into_iter()
    .filter_map(|(w, p)| p.map(|p| (w.max(0.0), p)))
    .collect();

    if parts.is_empty() {
        return 0.0;
    }
    let weight_sum: f64 = parts.iter().map(|(w, _)| w).sum();
    let percent = if weight_sum > 0.0 {
        parts.iter().map(|(w, p)| w * p).sum::<f64>() / weight_sum
    } else {
        parts.iter().map(|(_, p)| p).sum::<f64>() / parts.len() as f64
    };
    percent.clamp(0.0, 100.0)
}

fn score_pitch(trace: &[PitchSample], target: &ScoringTarget, config: &ScoringConfig) -> Option<PitchScore> {
    if target.phrase.is_empty() {
        return None;
    }

    let mut samples_scored = 0u32;
    let mut samples_in_tolerance = 0u32;
    let mut samples_unvoiced = 0u32;
    let mut credit = 0.0;
    let mut errors: Vec<f64> = Vec::new();

    for sample in trace {
        // Samples outside every note window are not judged.
        let Some(note) = target.phrase.note_at(sample.t_sec) else {
            continue;
        };
        samples_scored += 1;

        let cents = sample
            .confident_hz(config.conf_min)
            .and_then(|hz| cents_between(hz, midi_to_hz(note.midi, target.a4_hz)));
        match cents {
            Some(c) => {
                if c.abs() <= config.cents_tol {
                    samples_in_tolerance += 1;
                }
                credit += credit_for(c.abs(), config.cents_tol, config.falloff_cents);
                errors.push(c);
            }
            None => samples_unvoiced += 1,
        }
    }

    let percent = if samples_scored > 0 {
        credit / samples_scored as f64 * 100.0
    } else {
        0.0
    };
    let mean_cents_error = mean(&errors);
    let mean_abs_cents_error = if errors.is_empty() {
        0.0
    } else {
        errors.iter().map(|e| e.abs()).sum::<f64>() / errors.len() as f64
    };

    let tendency = if mean_cents_error > 10.0 {
        "sharp"
    } else if mean_cents_error < -10.0 {
        "flat"
    } else {
        "accurate"
    }
    .to_string();

    Some(PitchScore {
        percent,
        samples_scored,
        samples_in_tolerance,
        samples_unvoiced,
        mean_cents_error,
        mean_abs_cents_error,
        tendency,
    })
}

/// Median confident sung pitch (fractional MIDI) inside each note window.
fn sung_per_note(trace: &[PitchSample], target: &ScoringTarget, config: &ScoringConfig) -> Vec<Option<f64>> {
    target
        .phrase
        .notes
        .iter()
        .map(|note| {
            let mut midis: Vec<f64> = trace
                .iter()
                .filter(|s| note.contains(s.t_sec))
                .filter_map(|s| s.confident_hz(config.conf_min))
                .filter_map(|hz| hz_to_midi_float(hz, target.a4_hz))
                .collect();
            median(&mut midis)
        })
        .collect()
}

fn direction(delta_cents: f64, deadband: f64) -> i8 {
    if delta_cents.abs() < deadband {
        0
    } else if delta_cents > 0.0 {
        1
    } else {
        -1
    }
}

/// Contour match per transition. A transition with an unsung note on either
/// side counts as unmatched.
fn score_melody(phrase: &Phrase, sung: &[Option<f64>], config: &ScoringConfig) -> Option<MelodyScore> {
    if phrase.notes.len() < 2 {
        return None;
    }

    let mut transitions_matched = 0u32;
    for (i, pair) in phrase.notes.windows(2).enumerate() {
        let target_dir = (pair[1].midi - pair[0].midi).signum() as i8;
        if let (Some(a), Some(b)) = (sung[i], sung[i + 1]) {
            if direction((b - a) * 100.0, config.contour_deadband_cents) == target_dir {
                transitions_matched += 1;
            }
        }
    }

    let transitions_compared = (phrase.notes.len() - 1) as u32;
    Some(MelodyScore {
        percent: transitions_matched as f64 / transitions_compared as f64 * 100.0,
        transitions_compared,
        transitions_matched,
    })
}

fn score_intervals(
    phrase: &Phrase,
    sung: &[Option<f64>],
    config: &ScoringConfig,
) -> Option<IntervalScore> {
    if phrase.notes.len() < 2 {
        return None;
    }

    // Track errors per interval (from_midi, to_midi)
    let mut interval_errors: BTreeMap<(i32, i32), Vec<f64>> = BTreeMap::new();
    let mut abs_errors: Vec<f64> = Vec::new();
    let mut credit = 0.0;

    for (i, pair) in phrase.notes.windows(2).enumerate() {
        let (Some(a), Some(b)) = (sung[i], sung[i + 1]) else {
            continue;
        };
        let target_cents = (pair[1].midi - pair[0].midi) as f64 * 100.0;
        let error = (b - a) * 100.0 - target_cents;
        credit += credit_for(error.abs(), config.cents_tol, config.falloff_cents);
        abs_errors.push(error.abs());

        if error.abs() > config.cents_tol * 0.5 {
            interval_errors
                .entry((pair[0].midi, pair[1].midi))
                .or_default()
                .push(error);
        }
    }

    let mut problems: Vec<IntervalProblem> = Vec::new();
    for ((from_midi, to_midi), errors) in &interval_errors {
        if errors.len() < 2 {
            continue; // Need at least 2 occurrences to call it a pattern
        }
        let avg = mean(errors);
        if avg.abs() > 20.0 {
            let direction = if to_midi > from_midi { "up" } else { "down" };
            problems.push(IntervalProblem {
                from_note: midi_to_name(*from_midi),
                to_note: midi_to_name(*to_midi),
                direction: direction.to_string(),
                avg_error_cents: avg,
                count: errors.len() as u32,
            });
        }
    }

    // Sort by severity; stable, so ties keep key order
    problems.sort_by(|a, b| b.avg_error_cents.abs().total_cmp(&a.avg_error_cents.abs()));
    problems.truncate(3);

    let total = (phrase.notes.len() - 1) as f64;
    Some(IntervalScore {
        percent: credit / total * 100.0,
        intervals_compared: abs_errors.len() as u32,
        mean_abs_error_cents: mean(&abs_errors),
        problems,
    })
}

/// Onset times in the trace: the start of every confident run that lasts at
/// least `min_onset_hold_sec`, plus legato re-attacks where a held pitch moves
/// by `onset_split_cents` or more and settles there.
pub fn detect_onsets(trace: &[PitchSample], a4_hz: f64, config: &ScoringConfig) -> Vec<f64> {
    let mut onsets = Vec::new();
    let mut run_start: Option<f64> = None;
    let mut confirmed = false;
    let mut held_midi = 0.0;
    let mut split: Option<(f64, f64)> = None;

    for sample in trace {
        let midi = sample
            .confident_hz(config.conf_min)
            .and_then(|hz| hz_to_midi_float(hz, a4_hz));
        let Some(midi) = midi else {
            run_start = None;
            confirmed = false;
            split = None;
            continue;
        };

        let Some(start) = run_start else {
            run_start = Some(sample.t_sec);
            confirmed = false;
            held_midi = midi;
            split = None;
            continue;
        };

        if !confirmed {
            if sample.t_sec - start >= config.min_onset_hold_sec {
                onsets.push(start);
                confirmed = true;
            }
            continue;
        }

        if (midi - held_midi).abs() * 100.0 < config.onset_split_cents {
            split = None;
            continue;
        }
        match split {
            Some((since, split_midi)) if (midi - split_midi).abs() * 100.0 < config.onset_split_cents => {
                if sample.t_sec - since >= config.min_onset_hold_sec {
                    onsets.push(since);
                    held_midi = midi;
                    split = None;
                }
            }
            _ => split = Some((sample.t_sec, midi)),
        }
    }
    onsets
}

fn score_rhythm(trace: &[PitchSample], target: &ScoringTarget, config: &ScoringConfig) -> Option<RhythmScore> {
    let expected = target.onsets();
    if expected.is_empty() {
        return None;
    }

    let detected = detect_onsets(trace, target.a4_hz, config);
    let seconds_per_beat = if target.seconds_per_beat.is_finite() && target.seconds_per_beat > 0.0 {
        target.seconds_per_beat
    } else {
        ScoringTarget::default().seconds_per_beat
    };
    let tolerance_sec = config.onset_tolerance_beats.max(0.0) * seconds_per_beat;

    let mut used = vec![false; detected.len()];
    let mut offsets: Vec<f64> = Vec::new();
    let mut credit = 0.0;

    // For each target onset, take the nearest unused detection in the window
    for onset in &expected {
        let mut best_idx: Option<usize> = None;
        let mut best_dist = f64::MAX;
        for (i, t) in detected.iter().enumerate() {
            if used[i] {
                continue;
            }
            let dist = (t - onset).abs();
            if dist <= tolerance_sec && dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }
        if let Some(idx) = best_idx {
            used[idx] = true;
            offsets.push(detected[idx] - onset);
            credit += if tolerance_sec > 0.0 {
                1.0 - 0.5 * best_dist / tolerance_sec
            } else {
                1.0
            };
        }
    }

    let mean_offset_sec = mean(&offsets);
    let mean_offset_beats = mean_offset_sec / seconds_per_beat;
    let tendency = if mean_offset_beats > 0.1 {
        "late"
    } else if mean_offset_beats < -0.1 {
        "early"
    } else {
        "on_time"
    }
    .to_string();

    Some(RhythmScore {
        percent: credit / expected.len() as f64 * 100.0,
        onsets_expected: expected.len() as u32,
        onsets_detected: detected.len() as u32,
        onsets_matched: offsets.len() as u32,
        mean_offset_sec,
        tendency,
    })
}

fn build_feedback(
    final_percent: f64,
    pitch: Option<&PitchScore>,
    melody: Option<&MelodyScore>,
    rhythm: Option<&RhythmScore>,
    intervals: Option<&IntervalScore>,
) -> Vec<String> {
    let mut feedback: Vec<String> = Vec::new();

    if pitch.is_none() && melody.is_none() && rhythm.is_none() && intervals.is_none() {
        feedback.push("No target to score against.".to_string());
        return feedback;
    }

    if final_percent >= 90.0 {
        feedback.push(format!("Excellent! That take scored {:.0}%.", final_percent));
    } else if final_percent >= 70.0 {
        feedback.push(format!("Good take! You scored {:.0}%.", final_percent));
    } else if final_percent >= 50.0 {
        feedback.push(format!("Keep practicing! That take scored {:.0}%.", final_percent));
    } else {
        feedback.push(format!(
            "This one's tough! You scored {:.0}%. Try a slower tempo.",
            final_percent
        ));
    }

    if let Some(p) = pitch {
        if p.samples_scored > 0 && p.samples_unvoiced as f64 / p.samples_scored as f64 > 0.3 {
            feedback.push(
                "Much of the take was too quiet or unsteady to hear. Sing out and hold each note."
                    .to_string(),
            );
        }
        if p.mean_abs_cents_error > 30.0 {
            if p.mean_cents_error > 10.0 {
                feedback.push(format!(
                    "Your pitch is consistently {:.0} cents sharp. Relax and aim a little lower.",
                    p.mean_cents_error
                ));
            } else if p.mean_cents_error < -10.0 {
                feedback.push(format!(
                    "Your pitch is consistently {:.0} cents flat. Use more breath support and aim a little higher.",
                    p.mean_cents_error.abs()
                ));
            }
        }
    }

    if let Some(m) = melody {
        if m.percent < 50.0 {
            feedback.push(
                "Follow the shape of the melody: listen for where it rises and falls.".to_string(),
            );
        }
    }

    if let Some(r) = rhythm {
        if r.onsets_matched < r.onsets_expected {
            let missed = r.onsets_expected - r.onsets_matched;
            feedback.push(format!(
                "{} entr{} came in outside the beat window.",
                missed,
                if missed == 1 { "y" } else { "ies" }
            ));
        }
        if r.tendency == "late" {
            feedback.push(
                "You tend to come in late. Breathe before the beat so the note starts on it."
                    .to_string(),
            );
        } else if r.tendency == "early" {
            feedback.push(
                "You tend to rush ahead. Listen to the count and wait for the beat.".to_string(),
            );
        }
    }

    if let Some(i) = intervals {
        for problem in &i.problems {
            let dir_word = if problem.direction == "up" {
                "ascending"
            } else {
                "descending"
            };
            if problem.avg_error_cents > 0.0 {
                feedback.push(format!(
                    "You overshoot when going {} from {} to {} (avg +{:.0} cents).",
                    dir_word, problem.from_note, problem.to_note, problem.avg_error_cents
                ));
            } else {
                feedback.push(format!(
                    "You undershoot when going {} from {} to {} (avg {:.0} cents).",
                    dir_word, problem.from_note, problem.to_note, problem.avg_error_cents
                ));
            }
        }
    }

    feedback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::units::DEFAULT_A4_HZ;
    use approx::assert_abs_diff_eq;

    const RATE: f64 = 60.0;

    fn make_phrase(notes: Vec<(i32, f64, f64)>) -> Phrase {
        let notes: Vec<Note> = notes
            .into_iter()
            .map(|(midi, start_sec, dur_sec)| Note { midi, start_sec, dur_sec })
            .collect();
        let duration_sec = notes.last().map(|n| n.end_sec()).unwrap_or(0.0);
        Phrase { duration_sec, notes }
    }

    fn target(phrase: Phrase) -> ScoringTarget {
        ScoringTarget {
            phrase,
            rhythm_onsets: vec![],
            seconds_per_beat: 0.5,
            a4_hz: DEFAULT_A4_HZ,
        }
    }

    /// Sings every note of the phrase, shifted by `offset_cents`.
    fn sing(phrase: &Phrase, offset_cents: impl Fn(i32) -> f64) -> Vec<PitchSample> {
        let n = (phrase.duration_sec * RATE).round() as usize;
        (0..n)
            .map(|i| {
                let t_sec = i as f64 / RATE;
                let hz = phrase.note_at(t_sec).map(|note| {
                    midi_to_hz(note.midi, DEFAULT_A4_HZ) * 2f64.powf(offset_cents(note.midi) / 1200.0)
                });
                PitchSample { t_sec, hz, conf: 0.9 }
            })
            .collect()
    }

    fn three_notes() -> Phrase {
        make_phrase(vec![(60, 0.0, 0.5), (62, 0.5, 0.5), (64, 1.0, 0.5)])
    }

    #[test]
    fn test_perfect_take() {
        let phrase = three_notes();
        let trace = sing(&phrase, |_| 0.0);
        let score = score_take(&trace, &target(phrase), &ScoringConfig::default());

        let pitch = score.pitch.as_ref().unwrap();
        assert_abs_diff_eq!(pitch.percent, 100.0, epsilon = 1e-6);
        assert_eq!(pitch.tendency, "accurate");
        assert_eq!(pitch.samples_unvoiced, 0);

        let melody = score.melody.as_ref().unwrap();
        assert_eq!(melody.transitions_compared, 2);
        assert_eq!(melody.transitions_matched, 2);

        let rhythm = score.rhythm.as_ref().unwrap();
        assert_eq!(rhythm.onsets_detected, 3);
        assert_eq!(rhythm.onsets_matched, 3);
        assert_eq!(rhythm.tendency, "on_time");

        assert_abs_diff_eq!(score.percent(), 100.0, epsilon = 1e-6);
        assert!(score.feedback[0].starts_with("Excellent"));
    }

    #[test]
    fn test_final_is_monotonic_in_pitch_accuracy() {
        let phrase = three_notes();
        let config = ScoringConfig::default();
        let mut previous = f64::MAX;
        for offset in [0.0, 40.0, 80.0, 120.0, 200.0] {
            let trace = sing(&phrase, |_| offset);
            let score = score_take(&trace, &target(phrase.clone()), &config);
            assert!(
                score.percent() <= previous + 1e-9,
                "final rose from {} to {} at {} cents",
                previous,
                score.percent(),
                offset
            );
            previous = score.percent();
        }
    }

    #[test]
    fn test_pitch_credit_falloff() {
        let phrase = three_notes();
        let trace = sing(&phrase, |_| 80.0);
        let score = score_take(&trace, &target(phrase), &ScoringConfig::default());
        let pitch = score.pitch.unwrap();
        // 30 cents past a 50 cent tolerance with a 100 cent falloff
        assert_abs_diff_eq!(pitch.percent, 70.0, epsilon = 1e-6);
        assert_eq!(pitch.tendency, "sharp");
        assert_eq!(pitch.samples_in_tolerance, 0);
        assert!(score.feedback.iter().any(|f| f.contains("sharp")));
    }

    #[test]
    fn test_unvoiced_samples_count_as_misses() {
        let phrase = make_phrase(vec![(69, 0.0, 1.0)]);
        let trace: Vec<PitchSample> = (0..60)
            .map(|i| {
                let t_sec = i as f64 / RATE;
                if i < 30 {
                    PitchSample { t_sec, hz: Some(440.0), conf: 0.9 }
                } else if i < 45 {
                    PitchSample { t_sec, hz: None, conf: 0.0 }
                } else {
                    // Voiced but below the confidence floor
                    PitchSample { t_sec, hz: Some(440.0), conf: 0.3 }
                }
            })
            .collect();
        let score = score_take(&trace, &target(phrase), &ScoringConfig::default());
        let pitch = score.pitch.unwrap();
        assert_eq!(pitch.samples_scored, 60);
        assert_eq!(pitch.samples_unvoiced, 30);
        assert_abs_diff_eq!(pitch.percent, 50.0, epsilon = 1e-6);
        assert!(score.melody.is_none());
        assert!(score.intervals.is_none());
    }

    #[test]
    fn test_samples_outside_notes_are_excluded() {
        let phrase = Phrase {
            duration_sec: 1.5,
            notes: vec![Note { midi: 69, start_sec: 0.5, dur_sec: 0.5 }],
        };
        let trace: Vec<PitchSample> = (0..90)
            .map(|i| {
                let t_sec = i as f64 / RATE;
                let hz = if (30..60).contains(&i) { 440.0 } else { 200.0 };
                PitchSample { t_sec, hz: Some(hz), conf: 0.9 }
            })
            .collect();
        let score = score_take(&trace, &target(phrase), &ScoringConfig::default());
        let pitch = score.pitch.unwrap();
        assert_eq!(pitch.samples_scored, 30);
        assert_abs_diff_eq!(pitch.percent, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn test_rhythm_against_explicit_onsets() {
        let target = ScoringTarget {
            phrase: Phrase::empty(),
            rhythm_onsets: vec![0.0, 1.0],
            seconds_per_beat: 0.5,
            a4_hz: DEFAULT_A4_HZ,
        };
        let trace: Vec<PitchSample> = (0..90)
            .map(|i| {
                let t_sec = i as f64 / RATE;
                let voiced = (3..24).contains(&i) || (66..90).contains(&i);
                PitchSample {
                    t_sec,
                    hz: if voiced { Some(220.0) } else { None },
                    conf: if voiced { 0.9 } else { 0.0 },
                }
            })
            .collect();
        let score = score_take(&trace, &target, &ScoringConfig::default());
        assert!(score.pitch.is_none());
        let rhythm = score.rhythm.as_ref().unwrap();
        assert_eq!(rhythm.onsets_detected, 2);
        assert_eq!(rhythm.onsets_matched, 2);
        // Offsets of 0.05s and 0.1s against a 0.125s window
        assert_abs_diff_eq!(rhythm.percent, 70.0, epsilon = 1e-6);
        assert_eq!(rhythm.tendency, "late");
        assert_abs_diff_eq!(score.percent(), 70.0, epsilon = 1e-6);
    }

    #[test]
    fn test_short_blips_are_not_onsets() {
        let trace: Vec<PitchSample> = (0..30)
            .map(|i| PitchSample {
                t_sec: i as f64 / RATE,
                hz: if i % 3 == 0 { Some(220.0) } else { None },
                conf: 0.9,
            })
            .collect();
        assert!(detect_onsets(&trace, DEFAULT_A4_HZ, &ScoringConfig::default()).is_empty());
    }

    #[test]
    fn test_interval_problems() {
        let phrase = make_phrase(vec![
            (60, 0.0, 0.5),
            (64, 0.5, 0.5),
            (60, 1.0, 0.5),
            (64, 1.5, 0.5),
            (60, 2.0, 0.5),
            (64, 2.5, 0.5),
        ]);
        let trace = sing(&phrase, |midi| if midi == 64 { -40.0 } else { 0.0 });
        let score = score_take(&trace, &target(phrase), &ScoringConfig::default());

        let intervals = score.intervals.as_ref().unwrap();
        assert_eq!(intervals.intervals_compared, 5);
        assert_abs_diff_eq!(intervals.mean_abs_error_cents, 40.0, epsilon = 1e-6);
        assert_eq!(intervals.problems.len(), 2);
        assert_eq!(intervals.problems[0].direction, "up");
        assert_eq!(intervals.problems[0].from_note, "C4");
        assert_eq!(intervals.problems[0].to_note, "E4");
        assert_eq!(intervals.problems[0].count, 3);
        assert_abs_diff_eq!(intervals.problems[0].avg_error_cents, -40.0, epsilon = 1e-6);
        assert!(score.feedback.iter().any(|f| f.contains("undershoot")));
    }

    #[test]
    fn test_empty_target() {
        let score = score_take(&[], &ScoringTarget::default(), &ScoringConfig::default());
        assert_eq!(score.percent(), 0.0);
        assert!(score.pitch.is_none());
        assert!(score.rhythm.is_none());
        assert_eq!(score.feedback, vec!["No target to score against.".to_string()]);
    }

    #[test]
    fn test_silent_take_scores_zero() {
        let phrase = three_notes();
        let score = score_take(&[], &target(phrase), &ScoringConfig::default());
        assert_eq!(score.percent(), 0.0);
        assert_eq!(score.melody.unwrap().transitions_matched, 0);
        assert_eq!(score.rhythm.unwrap().onsets_matched, 0);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let phrase = three_notes();
        let trace = sing(&phrase, |midi| (midi - 60) as f64 * 7.0);
        let a = score_take(&trace, &target(phrase.clone()), &ScoringConfig::default());
        let b = score_take(&trace, &target(phrase), &ScoringConfig::default());
        assert_eq!(a, b);
    }
}
