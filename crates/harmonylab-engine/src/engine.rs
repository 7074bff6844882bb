//! Real-time audio engine: owns the output stream and routes scheduler
//! dispatches into voices and the master chain

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Sender};
use harmonylab_core::Settings;
use thiserror::Error;
use tracing::info;

use crate::audio_io::{AudioOutputError, RealtimeOutputStream};
use crate::clock::SampleClock;
use crate::mixer::{MasterChain, ScopeBuffer};
use crate::synth::{EngineSink, SynthBank, SynthCommand};

#[derive(Debug, Error)]
pub enum AudioEngineError {
    #[error("Audio output error: {0}")]
    Output(#[from] AudioOutputError),
}

/// Playback half of the workstation. Generation and editing never need
/// one of these; constructing it fails only when no output device exists.
pub struct AudioEngine {
    stream: RealtimeOutputStream,
    samples: Arc<AtomicU64>,
    sink: Arc<EngineSink>,
    tx: Sender<SynthCommand>,
    scope: ScopeBuffer,
    sample_rate: u32,
}

impl AudioEngine {
    /// Open the default output device and start rendering
    pub fn start(settings: &Settings) -> Result<Self, AudioEngineError> {
        let (tx, rx) = unbounded::<SynthCommand>();
        let samples = Arc::new(AtomicU64::new(0));
        let scope = ScopeBuffer::new();

        let samples_render = samples.clone();
        let scope_render = scope.clone();
        let initial_settings = settings.clone();
        let mut bank = SynthBank::new();
        // Built lazily: the device sample rate is only known inside the
        // callback
        let mut chain: Option<MasterChain> = None;
        let mut mono: Vec<f32> = Vec::new();

        let stream = RealtimeOutputStream::start(move |buffer, sample_rate, channels| {
            let chain = chain.get_or_insert_with(|| {
                let mut chain = MasterChain::new(sample_rate, scope_render.clone());
                chain.update_from_settings(&initial_settings);
                chain
            });

            for command in rx.try_iter() {
                match command {
                    SynthCommand::Settings(settings) => chain.update_from_settings(&settings),
                    other => bank.apply(other),
                }
            }

            let channels = channels as usize;
            let frames = buffer.len() / channels;
            mono.resize(frames, 0.0);

            let start_time = samples_render.load(Ordering::SeqCst) as f64 / sample_rate as f64;
            bank.render(&mut mono, start_time, sample_rate as f64);
            chain.process(&mut mono);

            for (frame, sample) in buffer.chunks_mut(channels).zip(mono.iter()) {
                frame.fill(*sample);
            }
            samples_render.fetch_add(frames as u64, Ordering::SeqCst);
        })?;

        let sample_rate = stream.sample_rate();
        info!(sample_rate, "Audio engine started");

        Ok(Self {
            sink: Arc::new(EngineSink::new(tx.clone())),
            stream,
            samples,
            tx,
            scope,
            sample_rate,
        })
    }

    /// Clock advanced by the audio callback; share it with the scheduler
    pub fn clock(&self) -> Arc<SampleClock> {
        Arc::new(SampleClock::new(self.samples.clone(), self.sample_rate))
    }

    /// The scheduler-facing dispatch sink
    pub fn sink(&self) -> Arc<EngineSink> {
        self.sink.clone()
    }

    /// Oscilloscope tap on the master output
    pub fn scope(&self) -> ScopeBuffer {
        self.scope.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Forward the mixing fields of new settings to the master chain
    pub fn update_settings(&self, settings: &Settings) {
        let _ = self.tx.send(SynthCommand::Settings(settings.clone()));
    }

    /// Silence the stream; the engine cannot be restarted afterwards
    pub fn stop(&self) {
        self.stream.stop();
    }
}
