//! Pitch helpers.

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Convert MIDI pitch to frequency in Hz.
pub fn midi_to_hz(midi_note: u8) -> f64 {
    440.0 * 2.0f64.powf((midi_note as f64 - 69.0) / 12.0)
}

/// Scientific pitch name, e.g. 60 -> "C4", 61 -> "C#4".
pub fn note_name(midi_note: u8) -> String {
    let octave = (midi_note / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(midi_note % 12) as usize], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_to_hz() {
        // A4 = 440 Hz
        assert!((midi_to_hz(69) - 440.0).abs() < 0.01);
        // C4 = ~261.63 Hz
        assert!((midi_to_hz(60) - 261.63).abs() < 0.1);
        assert!((midi_to_hz(57) - 220.0).abs() < 0.01);
    }

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(61), "C#4");
        assert_eq!(note_name(69), "A4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
    }
}
