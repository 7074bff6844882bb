//! Key + mode → scale and pentatonic pitch classes

use crate::notes::{transpose_pitch_class, KeyName, Mode};

const MAJOR_INTERVALS: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const NATURAL_MINOR_INTERVALS: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

/// Degree indices into the 7-note scale that form the pentatonic subset
const MAJOR_PENTATONIC_DEGREES: [usize; 5] = [0, 1, 2, 4, 5];
const MINOR_PENTATONIC_DEGREES: [usize; 5] = [0, 2, 3, 4, 6];

/// Pitch classes of the 7-note scale rooted at the key
pub fn scale_pitch_classes(key: KeyName, mode: Mode) -> [u8; 7] {
    let root = key.pitch_class();
    let intervals = match mode {
        Mode::Major => MAJOR_INTERVALS,
        Mode::Minor => NATURAL_MINOR_INTERVALS,
    };
    intervals.map(|interval| transpose_pitch_class(root, interval))
}

/// Pentatonic subset of the scale, in scale order
pub fn pentatonic_pitch_classes(key: KeyName, mode: Mode) -> [u8; 5] {
    let scale = scale_pitch_classes(key, mode);
    let degrees = match mode {
        Mode::Major => MAJOR_PENTATONIC_DEGREES,
        Mode::Minor => MINOR_PENTATONIC_DEGREES,
    };
    degrees.map(|degree| scale[degree])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_pitch_classes() {
        assert_eq!(
            scale_pitch_classes(KeyName::C, Mode::Major),
            [0, 2, 4, 5, 7, 9, 11]
        );
        assert_eq!(
            scale_pitch_classes(KeyName::A, Mode::Minor),
            [9, 11, 0, 2, 4, 5, 7]
        );
        assert_eq!(
            scale_pitch_classes(KeyName::FSharp, Mode::Major),
            [6, 8, 10, 11, 1, 3, 5]
        );
    }

    #[test]
    fn test_pentatonic_pitch_classes() {
        assert_eq!(
            pentatonic_pitch_classes(KeyName::C, Mode::Major),
            [0, 2, 4, 7, 9]
        );
        assert_eq!(
            pentatonic_pitch_classes(KeyName::A, Mode::Minor),
            [9, 0, 2, 4, 7]
        );
    }
}
