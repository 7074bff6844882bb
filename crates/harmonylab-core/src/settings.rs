//! Session settings shared by the generator, scheduler, and synth

use serde::{Deserialize, Serialize};

use crate::notes::{KeyName, Mode};

/// 16th-note subdivisions per bar, the universal step grid
pub const STEPS_PER_BAR: u32 = 16;
pub const SUPPORTED_BARS: [u8; 3] = [4, 8, 16];
pub const BPM_MIN: f64 = 70.0;
pub const BPM_MAX: f64 = 130.0;
pub const SWING_MAX: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthStyle {
    #[default]
    Modern,
    Chiptune,
    Ambient,
}

/// Immutable value struct; mutate by building a new one and calling
/// [`Settings::clamped`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub key: KeyName,
    pub mode: Mode,
    pub bars: u8,
    pub bpm: f64,
    /// Fraction of a step the off-8th 16ths are delayed, 0..=0.25
    pub swing: f64,
    pub master: f32,
    pub cutoff: f32,
    #[serde(rename = "delayFB")]
    pub delay_fb: f32,
    pub drive: f32,
    pub limiter: bool,
    pub auto_gain: bool,
    pub nice: bool,
    pub lock_notes: bool,
    pub synth_style: SynthStyle,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            key: KeyName::C,
            mode: Mode::Major,
            bars: 8,
            bpm: 90.0,
            swing: 0.08,
            master: 0.8,
            cutoff: 1800.0,
            delay_fb: 0.35,
            drive: 0.15,
            limiter: true,
            auto_gain: true,
            nice: false,
            lock_notes: false,
            synth_style: SynthStyle::Modern,
        }
    }
}

impl Settings {
    /// Total 16th-note steps in one loop
    pub fn loop_steps(&self) -> u32 {
        self.bars as u32 * STEPS_PER_BAR
    }

    /// Enforce every field bound; an unsupported bar count falls back to
    /// the default 8
    pub fn clamped(mut self) -> Self {
        if !SUPPORTED_BARS.contains(&self.bars) {
            self.bars = 8;
        }
        self.bpm = self.bpm.clamp(BPM_MIN, BPM_MAX);
        self.swing = self.swing.clamp(0.0, SWING_MAX);
        self.master = self.master.clamp(0.0, 1.0);
        self.cutoff = self.cutoff.clamp(100.0, 12_000.0);
        self.delay_fb = self.delay_fb.clamp(0.0, 0.8);
        self.drive = self.drive.clamp(0.0, 0.5);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.bars, 8);
        assert_eq!(settings.loop_steps(), 128);
        assert_eq!(settings, settings.clone().clamped());
    }

    #[test]
    fn test_clamped() {
        let settings = Settings {
            bars: 5,
            bpm: 300.0,
            swing: 0.9,
            drive: 2.0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(settings.bars, 8);
        assert_eq!(settings.bpm, BPM_MAX);
        assert_eq!(settings.swing, SWING_MAX);
        assert_eq!(settings.drive, 0.5);
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        assert!(json.contains("\"delayFB\""));
        assert!(json.contains("\"autoGain\""));
        assert!(json.contains("\"lockNotes\""));
        assert!(json.contains("\"synthStyle\":\"modern\""));

        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Settings::default());
    }
}
