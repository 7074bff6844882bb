//! Error types for harmonylab-core

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NoteError {
    #[error("invalid note token: {0}")]
    InvalidToken(String),
    #[error("octave out of range in note token: {0}")]
    OctaveOutOfRange(String),
}

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("malformed preset payload: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid preset: {0}")]
    Invalid(String),
}
