//! Canonical chord-progression patterns

use serde::{Deserialize, Serialize};

use crate::notes::{Degree, Mode};

/// I V vi IV / I vi IV V / I IV V V
const MAJOR_PATTERNS: [[Degree; 4]; 3] = [[0, 4, 5, 3], [0, 5, 3, 4], [0, 3, 4, 4]];

/// i iv V iv / i VI iv V / i V VI V
const MINOR_PATTERNS: [[Degree; 4]; 3] = [[0, 3, 4, 3], [0, 5, 3, 4], [0, 4, 5, 4]];

/// Ordered scale degrees, one nominal value per bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub bars: u8,
    pub degrees: Vec<Degree>,
}

/// Build the canonical progression for a mode: whole 4-degree patterns are
/// concatenated in rotation until `bars` is covered, then truncated.
/// Deterministic and stateless.
pub fn build_progression(mode: Mode, bars: u8) -> Progression {
    let patterns = match mode {
        Mode::Major => &MAJOR_PATTERNS,
        Mode::Minor => &MINOR_PATTERNS,
    };
    let mut degrees = Vec::with_capacity(bars as usize);
    let mut pattern_index = 0usize;
    while degrees.len() < bars as usize {
        degrees.extend_from_slice(&patterns[pattern_index % patterns.len()]);
        pattern_index += 1;
    }
    degrees.truncate(bars as usize);
    Progression { bars, degrees }
}

/// Extend or truncate a user-edited progression to its own bar count,
/// appending from the canonical progression at the index where the user
/// sequence ran out.
pub fn normalize_progression(progression: &Progression, mode: Mode) -> Progression {
    let target = progression.bars as usize;
    let mut degrees = progression.degrees.clone();
    if degrees.len() < target {
        let base = build_progression(mode, progression.bars);
        degrees.extend_from_slice(&base.degrees[degrees.len()..target]);
    }
    degrees.truncate(target);
    Progression {
        bars: progression.bars,
        degrees,
    }
}

/// Reconcile a progression after a bars/mode settings change: keep the
/// leading user degrees, pad the remainder cyclically from the canonical
/// progression for the new mode and bar count.
pub fn sync_progression(mode: Mode, bars: u8, current: &Progression) -> Progression {
    let base = build_progression(mode, bars);
    let mut degrees: Vec<Degree> = current.degrees.iter().copied().take(bars as usize).collect();
    while degrees.len() < bars as usize {
        degrees.push(base.degrees[degrees.len() % base.degrees.len()]);
    }
    Progression { bars, degrees }
}

pub fn validate_progression(progression: &Progression, bars: u8) -> bool {
    progression.degrees.len() == bars as usize
}
