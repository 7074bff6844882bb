//! File-backed preset storage: one `presets.json` per store directory

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use harmonylab_core::{PresetError, PresetPayload};
use thiserror::Error;
use tracing::warn;

const STORE_FILE: &str = "presets.json";

#[derive(Debug, Error)]
pub enum PresetStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Preset(#[from] PresetError),
}

pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join(STORE_FILE),
        }
    }

    fn read_all(&self) -> Vec<PresetPayload> {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(presets) => presets,
            Err(err) => {
                warn!("Ignoring unreadable preset store: {}", err);
                Vec::new()
            }
        }
    }

    fn write_all(&self, presets: &[PresetPayload]) -> Result<(), PresetStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(presets).map_err(PresetError::from)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Save a preset, replacing any existing one with the same name.
    /// `createdAt` is stamped with the current time.
    pub fn save(&self, payload: PresetPayload) -> Result<(), PresetStoreError> {
        payload.validate()?;
        let mut presets: Vec<PresetPayload> = self
            .read_all()
            .into_iter()
            .filter(|preset| preset.name != payload.name)
            .collect();
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0);
        presets.push(PresetPayload {
            created_at,
            ..payload
        });
        self.write_all(&presets)
    }

    pub fn load(&self, name: &str) -> Option<PresetPayload> {
        self.read_all()
            .into_iter()
            .find(|preset| preset.name == name)
    }

    /// All presets, newest first
    pub fn list(&self) -> Vec<PresetPayload> {
        let mut presets = self.read_all();
        presets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        presets
    }

    pub fn delete(&self, name: &str) -> Result<(), PresetStoreError> {
        let presets: Vec<PresetPayload> = self
            .read_all()
            .into_iter()
            .filter(|preset| preset.name != name)
            .collect();
        self.write_all(&presets)
    }

    /// Import a serialized payload; all-or-nothing, nothing is written
    /// when parsing or validation fails
    pub fn import(&self, serialized: &str) -> Result<PresetPayload, PresetStoreError> {
        let payload = PresetPayload::from_json(serialized)?;
        self.save(payload.clone())?;
        Ok(payload)
    }

    pub fn export(&self, name: &str) -> Option<String> {
        self.load(name).and_then(|preset| preset.to_json().ok())
    }
}
