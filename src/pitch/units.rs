/// Standard concert pitch for A4.
pub const DEFAULT_A4_HZ: f64 = 440.0;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

fn a4_or_default(a4_hz: f64) -> f64 {
    if a4_hz.is_finite() && a4_hz > 0.0 {
        a4_hz
    } else {
        DEFAULT_A4_HZ
    }
}

/// Fractional MIDI number for a frequency relative to the given A4.
pub fn hz_to_midi_float(hz: f64, a4_hz: f64) -> Option<f64> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    Some(69.0 + 12.0 * (hz / a4_or_default(a4_hz)).log2())
}

/// Nearest MIDI note for a frequency.
pub fn hz_to_midi(hz: f64, a4_hz: f64) -> Option<i32> {
    hz_to_midi_float(hz, a4_hz).map(|m| m.round() as i32)
}

pub fn midi_to_hz(midi: i32, a4_hz: f64) -> f64 {
    a4_or_default(a4_hz) * 2f64.powf((midi as f64 - 69.0) / 12.0)
}

/// `1200 * log2(live / target)`; `None` when either side is not a positive frequency.
pub fn cents_between(live_hz: f64, target_hz: f64) -> Option<f64> {
    if !live_hz.is_finite() || !target_hz.is_finite() || live_hz <= 0.0 || target_hz <= 0.0 {
        return None;
    }
    Some(1200.0 * (live_hz / target_hz).log2())
}

pub fn midi_to_name(midi: i32) -> String {
    let name = NOTE_NAMES[(midi.rem_euclid(12)) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_a4_is_midi_69() {
        assert_eq!(hz_to_midi(440.0, DEFAULT_A4_HZ), Some(69));
        assert_abs_diff_eq!(midi_to_hz(69, DEFAULT_A4_HZ), 440.0, epsilon = 1e-9);
    }

    #[test]
    fn test_c3_and_c5() {
        assert_eq!(hz_to_midi(130.8, DEFAULT_A4_HZ), Some(48));
        assert_eq!(hz_to_midi(523.25, DEFAULT_A4_HZ), Some(72));
    }

    #[test]
    fn test_alternate_reference_pitch() {
        assert_eq!(hz_to_midi(432.0, 432.0), Some(69));
        assert_abs_diff_eq!(midi_to_hz(57, 432.0), 216.0, epsilon = 1e-9);
        // Nonsense reference falls back to 440.
        assert_abs_diff_eq!(midi_to_hz(69, 0.0), 440.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cents_between() {
        assert_abs_diff_eq!(cents_between(880.0, 440.0).unwrap(), 1200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cents_between(440.0, 440.0).unwrap(), 0.0, epsilon = 1e-9);
        assert!(cents_between(0.0, 440.0).is_none());
        assert!(cents_between(440.0, -1.0).is_none());
    }

    #[test]
    fn test_invalid_frequency_has_no_midi() {
        assert!(hz_to_midi(0.0, DEFAULT_A4_HZ).is_none());
        assert!(hz_to_midi(f64::NAN, DEFAULT_A4_HZ).is_none());
    }

    #[test]
    fn test_midi_to_name() {
        assert_eq!(midi_to_name(60), "C4");
        assert_eq!(midi_to_name(69), "A4");
        assert_eq!(midi_to_name(70), "A#4");
        assert_eq!(midi_to_name(11), "B-1");
    }
}
