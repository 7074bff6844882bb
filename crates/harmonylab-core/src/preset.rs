//! Preset payloads and their JSON codec

use serde::{Deserialize, Serialize};

use crate::error::PresetError;
use crate::progressions::Progression;
use crate::sequence::{PartNoteMap, UserNotes};
use crate::settings::{Settings, SUPPORTED_BARS};

/// A saved session: settings, progression, overrides, and the generated
/// material they produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetPayload {
    pub name: String,
    /// Milliseconds since the Unix epoch, stamped at save time
    pub created_at: u64,
    pub settings: Settings,
    pub progression: Progression,
    pub user_notes: UserNotes,
    pub generated_notes: PartNoteMap,
}

impl PresetPayload {
    pub fn to_json(&self) -> Result<String, PresetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate; all-or-nothing, no partial payloads escape
    pub fn from_json(serialized: &str) -> Result<Self, PresetError> {
        let payload: PresetPayload = serde_json::from_str(serialized)?;
        payload.validate()?;
        Ok(payload)
    }

    pub fn validate(&self) -> Result<(), PresetError> {
        if self.name.trim().is_empty() {
            return Err(PresetError::Invalid("preset name is empty".into()));
        }
        if !SUPPORTED_BARS.contains(&self.settings.bars) {
            return Err(PresetError::Invalid(format!(
                "unsupported bar count: {}",
                self.settings.bars
            )));
        }
        if self.progression.degrees.is_empty() {
            return Err(PresetError::Invalid("progression has no degrees".into()));
        }
        if let Some(&degree) = self.progression.degrees.iter().find(|&&degree| degree > 6) {
            return Err(PresetError::Invalid(format!(
                "scale degree out of range: {degree}"
            )));
        }
        Ok(())
    }
}
