//! harmonylab-engine: real-time playback services for HarmonyLab: audio
//! clock, lookahead scheduler, synthesis voices, master chain, and preset
//! storage.

mod audio_io;
mod clock;
mod engine;
mod mixer;
mod preset_store;
mod scheduler;
mod synth;

pub use audio_io::{AudioOutputError, RealtimeOutputStream};
pub use clock::{AudioClock, ManualClock, SampleClock};
pub use engine::{AudioEngine, AudioEngineError};
pub use mixer::{MasterChain, ScopeBuffer};
pub use preset_store::{PresetStore, PresetStoreError};
pub use scheduler::{
    step_duration_secs, step_to_time, LookaheadScheduler, NoteSink, LOOKAHEAD_SECS, TICK_INTERVAL,
};
pub use synth::EngineSink;
