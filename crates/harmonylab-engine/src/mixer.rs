//! Mono master chain (filter → drive → delay → limiter → master gain →
//! auto-gain) and the oscilloscope waveform tap

use std::f32::consts::TAU;
use std::sync::{Arc, Mutex};

use harmonylab_core::Settings;

const TARGET_PEAK: f32 = 0.8;
const DELAY_SECS: f32 = 0.3;
const DELAY_SEND: f32 = 0.25;
const DELAY_MIX: f32 = 0.25;
const DRIVE_POST_GAIN: f32 = 0.8;
const LIMITER_CEILING: f32 = 0.7;
const SCOPE_LEN: usize = 2048;

/// Shared waveform ring buffer read by the oscilloscope
#[derive(Clone)]
pub struct ScopeBuffer {
    inner: Arc<Mutex<ScopeInner>>,
}

struct ScopeInner {
    samples: Vec<f32>,
    pos: usize,
}

impl ScopeBuffer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScopeInner {
                samples: vec![0.0; SCOPE_LEN],
                pos: 0,
            })),
        }
    }

    /// Called from the audio thread; skips the write rather than block
    /// when a reader holds the lock
    pub(crate) fn write(&self, block: &[f32]) {
        let Ok(mut inner) = self.inner.try_lock() else {
            return;
        };
        for &sample in block {
            let pos = inner.pos;
            inner.samples[pos] = sample;
            inner.pos = (pos + 1) % SCOPE_LEN;
        }
    }

    /// Copy of the most recent samples, oldest first
    pub fn snapshot(&self) -> Vec<f32> {
        let Ok(inner) = self.inner.lock() else {
            return vec![0.0; SCOPE_LEN];
        };
        let mut out = Vec::with_capacity(SCOPE_LEN);
        out.extend_from_slice(&inner.samples[inner.pos..]);
        out.extend_from_slice(&inner.samples[..inner.pos]);
        out
    }

    pub fn len(&self) -> usize {
        SCOPE_LEN
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for ScopeBuffer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct MasterChain {
    sample_rate: f32,
    cutoff: f32,
    lp_state: f32,
    drive_pre: f32,
    delay_buf: Vec<f32>,
    delay_pos: usize,
    delay_feedback: f32,
    limiter: bool,
    master: f32,
    auto_gain: bool,
    agc_gain: f32,
    scope: ScopeBuffer,
}

impl MasterChain {
    pub fn new(sample_rate: u32, scope: ScopeBuffer) -> Self {
        let delay_len = ((sample_rate as f32 * DELAY_SECS) as usize).max(1);
        let mut chain = Self {
            sample_rate: sample_rate as f32,
            cutoff: 1800.0,
            lp_state: 0.0,
            drive_pre: 1.0,
            delay_buf: vec![0.0; delay_len],
            delay_pos: 0,
            delay_feedback: 0.3,
            limiter: true,
            master: 0.8,
            auto_gain: true,
            agc_gain: 1.0,
            scope,
        };
        chain.update_from_settings(&Settings::default());
        chain
    }

    /// Apply the mixing fields of the settings
    pub fn update_from_settings(&mut self, settings: &Settings) {
        self.cutoff = settings.cutoff;
        self.delay_feedback = settings.delay_fb.clamp(0.0, 0.95);
        self.drive_pre = 1.0 + settings.drive * 6.0;
        self.master = settings.master;
        self.limiter = settings.limiter;
        self.auto_gain = settings.auto_gain;
    }

    pub fn process(&mut self, block: &mut [f32]) {
        let lp_coeff = 1.0 - (-TAU * self.cutoff / self.sample_rate).exp();
        let mut peak = 0.0f32;

        for sample in block.iter_mut() {
            self.lp_state += lp_coeff * (*sample - self.lp_state);

            let driven = soft_clip(self.lp_state * self.drive_pre) * DRIVE_POST_GAIN;

            let delayed = self.delay_buf[self.delay_pos];
            self.delay_buf[self.delay_pos] = driven * DELAY_SEND + delayed * self.delay_feedback;
            self.delay_pos = (self.delay_pos + 1) % self.delay_buf.len();

            let mut mixed = driven + delayed * DELAY_MIX;
            if self.limiter {
                mixed = soft_clip(mixed / LIMITER_CEILING) * LIMITER_CEILING;
            }

            let out = mixed * self.master * self.agc_gain;
            peak = peak.max(out.abs());
            *sample = out;
        }

        // Nudge toward the target peak once per block; never amplify past
        // unity
        if self.auto_gain && peak > 0.0 {
            let target = (TARGET_PEAK / peak * self.agc_gain).min(1.0);
            self.agc_gain += (target - self.agc_gain) * 0.1;
        }

        self.scope.write(block);
    }
}

fn soft_clip(x: f32) -> f32 {
    x.tanh()
}
