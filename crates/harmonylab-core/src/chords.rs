//! Diatonic chord construction from scale degrees

use crate::notes::{transpose_pitch_class, Degree, KeyName, Mode};
use crate::scales::scale_pitch_classes;

struct ChordQuality {
    triad: [u8; 3],
    seventh: u8,
}

/// Diatonic triad quality per degree: I ii iii IV V vi vii°
const MAJOR_QUALITIES: [ChordQuality; 7] = [
    ChordQuality { triad: [0, 4, 7], seventh: 11 },
    ChordQuality { triad: [0, 3, 7], seventh: 10 },
    ChordQuality { triad: [0, 3, 7], seventh: 10 },
    ChordQuality { triad: [0, 4, 7], seventh: 11 },
    ChordQuality { triad: [0, 4, 7], seventh: 10 },
    ChordQuality { triad: [0, 3, 7], seventh: 10 },
    ChordQuality { triad: [0, 3, 6], seventh: 10 },
];

/// i ii° III iv V VI vii° (natural minor, major dominant)
const MINOR_QUALITIES: [ChordQuality; 7] = [
    ChordQuality { triad: [0, 3, 7], seventh: 10 },
    ChordQuality { triad: [0, 3, 7], seventh: 10 },
    ChordQuality { triad: [0, 4, 7], seventh: 11 },
    ChordQuality { triad: [0, 3, 7], seventh: 10 },
    ChordQuality { triad: [0, 4, 7], seventh: 10 },
    ChordQuality { triad: [0, 4, 7], seventh: 11 },
    ChordQuality { triad: [0, 3, 6], seventh: 10 },
];

/// Pitch classes of the diatonic chord on a scale degree, optionally with
/// its seventh
pub fn chord_pitch_classes(
    key: KeyName,
    mode: Mode,
    degree: Degree,
    include_seventh: bool,
) -> Vec<u8> {
    let scale = scale_pitch_classes(key, mode);
    let qualities = match mode {
        Mode::Major => &MAJOR_QUALITIES,
        Mode::Minor => &MINOR_QUALITIES,
    };
    let index = degree as usize % scale.len();
    let root = scale[index];
    let quality = &qualities[index];

    let mut chord: Vec<u8> = quality
        .triad
        .iter()
        .map(|&interval| transpose_pitch_class(root, interval))
        .collect();
    if include_seventh {
        chord.push(transpose_pitch_class(root, quality.seventh));
    }
    chord
}
