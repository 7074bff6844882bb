//! harmonylab-core: music theory, sequence generation, and preset payloads
//! for the HarmonyLab generative workstation.

mod chords;
mod error;
mod notes;
mod preset;
mod progressions;
mod scales;
mod sequence;
mod settings;

pub use chords::chord_pitch_classes;
pub use error::{NoteError, PresetError};
pub use notes::{
    clamp_midi, closest_midi_to_target, format_note_text, midi_for_pitch_class,
    midi_to_note_token, note_token_to_midi, parse_note_text, transpose_pitch_class, Degree,
    KeyName, Midi, Mode, ParsedNotes, REST_TOKEN,
};
pub use preset::PresetPayload;
pub use progressions::{
    build_progression, normalize_progression, sync_progression, validate_progression, Progression,
};
pub use scales::{pentatonic_pitch_classes, scale_pitch_classes};
pub use sequence::{
    generate_sequence, NoteEvent, PartName, PartNoteMap, SequenceResult, UserNotes,
};
pub use settings::{
    Settings, SynthStyle, BPM_MAX, BPM_MIN, STEPS_PER_BAR, SUPPORTED_BARS, SWING_MAX,
};
