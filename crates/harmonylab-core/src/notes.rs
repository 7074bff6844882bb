//! MIDI pitch numbers, note tokens, and pitch-class arithmetic

use serde::{Deserialize, Serialize};

use crate::error::NoteError;

/// MIDI note number, 0..=127 (60 = middle C)
pub type Midi = u8;

/// 0-based scale-step index (0 = I/i .. 6 = VII/vii)
pub type Degree = u8;

/// Textual placeholder for a rest slot
pub const REST_TOKEN: &str = "---";

const OCTAVE_MIN: i32 = -1;
const OCTAVE_MAX: i32 = 9;

/// Canonical pitch-class spellings: sharps only for C#/F#, flats elsewhere
const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// The 12 supported key roots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyName {
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "Eb")]
    EFlat,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "Ab")]
    AFlat,
    A,
    #[serde(rename = "Bb")]
    BFlat,
    B,
}

impl KeyName {
    pub const ALL: [KeyName; 12] = [
        Self::C,
        Self::CSharp,
        Self::D,
        Self::EFlat,
        Self::E,
        Self::F,
        Self::FSharp,
        Self::G,
        Self::AFlat,
        Self::A,
        Self::BFlat,
        Self::B,
    ];

    /// Chroma of the key root, 0..=11
    pub fn pitch_class(&self) -> u8 {
        match self {
            Self::C => 0,
            Self::CSharp => 1,
            Self::D => 2,
            Self::EFlat => 3,
            Self::E => 4,
            Self::F => 5,
            Self::FSharp => 6,
            Self::G => 7,
            Self::AFlat => 8,
            Self::A => 9,
            Self::BFlat => 10,
            Self::B => 11,
        }
    }

    pub fn name(&self) -> &'static str {
        PITCH_CLASS_NAMES[self.pitch_class() as usize]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "major" => Some(Self::Major),
            "minor" => Some(Self::Minor),
            _ => None,
        }
    }
}

/// Clamp an arbitrary value into the MIDI range
pub fn clamp_midi(value: i32) -> Midi {
    value.clamp(0, 127) as Midi
}

/// Wrap a transposed pitch class back into 0..=11
pub fn transpose_pitch_class(pc: u8, semitones: u8) -> u8 {
    (pc + semitones) % 12
}

/// MIDI number of a pitch class in a given octave (octave -1 starts at 0)
pub fn midi_for_pitch_class(pc: u8, octave: i32) -> Midi {
    clamp_midi((octave + 1) * 12 + pc as i32)
}

/// Parse a note token like `C4`, `Eb3`, or `F#-1`.
///
/// The rest token maps to `Ok(None)`. Any other failure is an error: the
/// token must be letter + optional accidental + single-digit octave, the
/// octave must lie in -1..=9, and the letter/accidental pair must name one
/// of the 12 pitch classes (no Cb/B#/Fb/E# spellings).
pub fn note_token_to_midi(token: &str) -> Result<Option<Midi>, NoteError> {
    if token == REST_TOKEN {
        return Ok(None);
    }

    let invalid = || NoteError::InvalidToken(token.to_string());

    let mut chars = token.chars();
    let letter = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
    let rest = chars.as_str();

    let (accidental, octave_str) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') | Some('B') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    let semitone: i32 = match (letter, accidental) {
        ('C', 0) => 0,
        ('C', 1) => 1,
        ('D', -1) => 1,
        ('D', 0) => 2,
        ('D', 1) => 3,
        ('E', -1) => 3,
        ('E', 0) => 4,
        ('F', 0) => 5,
        ('F', 1) => 6,
        ('G', -1) => 6,
        ('G', 0) => 7,
        ('G', 1) => 8,
        ('A', -1) => 8,
        ('A', 0) => 9,
        ('A', 1) => 10,
        ('B', -1) => 10,
        ('B', 0) => 11,
        _ => return Err(invalid()),
    };

    let single_digit =
        octave_str.len() == 1 || (octave_str.starts_with('-') && octave_str.len() == 2);
    if !single_digit {
        return Err(invalid());
    }
    let octave: i32 = octave_str.parse().map_err(|_| invalid())?;
    if !(OCTAVE_MIN..=OCTAVE_MAX).contains(&octave) {
        return Err(NoteError::OctaveOutOfRange(token.to_string()));
    }

    Ok(Some(clamp_midi((octave + 1) * 12 + semitone)))
}

/// Format a pitch as its canonical token; `None` becomes the rest token
pub fn midi_to_note_token(midi: Option<Midi>) -> String {
    let Some(value) = midi else {
        return REST_TOKEN.to_string();
    };
    let value = value.min(127);
    let pc = value % 12;
    let octave = (value / 12) as i32 - 1;
    format!("{}{}", PITCH_CLASS_NAMES[pc as usize], octave)
}

/// Result of parsing free-text note input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNotes {
    pub midis: Vec<Option<Midi>>,
    pub invalid_tokens: Vec<String>,
}

/// Tokenize note text into a fixed-length pitch array.
///
/// Pads with rests, truncates excess tokens, and collects invalid tokens
/// (in input order) instead of failing; each invalid token becomes a rest.
pub fn parse_note_text(text: &str, expected_len: usize) -> ParsedNotes {
    let mut midis = Vec::with_capacity(expected_len);
    let mut invalid_tokens = Vec::new();

    for token in text.split_whitespace().take(expected_len) {
        match note_token_to_midi(token) {
            Ok(midi) => midis.push(midi),
            Err(_) => {
                invalid_tokens.push(token.to_string());
                midis.push(None);
            }
        }
    }
    midis.resize(expected_len, None);

    ParsedNotes {
        midis,
        invalid_tokens,
    }
}

/// Inverse of [`parse_note_text`]: one canonical token per slot
pub fn format_note_text(midis: &[Option<Midi>]) -> String {
    midis
        .iter()
        .map(|&midi| midi_to_note_token(midi))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pick the octave of `target_pc` closest to a reference pitch.
///
/// Starts from the preferred octave, shifts by octaves toward the reference
/// until within ±6 semitones, then tries the octave-up and octave-down
/// neighbors in that order, each replacing the candidate only on strict
/// improvement. Shifts and neighbors never leave the MIDI range, so exact
/// half-octave ties and range edges keep the nearer in-range candidate.
pub fn closest_midi_to_target(target_pc: u8, reference: Midi, preferred_octave: i32) -> Midi {
    let reference = reference as i32;
    let mut candidate = midi_for_pitch_class(target_pc, preferred_octave) as i32;

    while candidate < reference - 6 && candidate + 12 <= 127 {
        candidate += 12;
    }
    while candidate > reference + 6 && candidate - 12 >= 0 {
        candidate -= 12;
    }

    let mut distance = (candidate - reference).abs();

    let alt_up = candidate + 12;
    let alt_down = candidate - 12;

    if alt_up <= 127 && (alt_up - reference).abs() < distance {
        candidate = alt_up;
        distance = (candidate - reference).abs();
    }
    if alt_down >= 0 && (alt_down - reference).abs() < distance {
        candidate = alt_down;
    }

    clamp_midi(candidate)
}
