//! Audio clock abstraction

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic seconds-based clock read by the scheduler. Advanced
/// externally; the scheduler never sets it.
pub trait AudioClock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock derived from a shared sample counter advanced by the audio
/// callback
pub struct SampleClock {
    samples: Arc<AtomicU64>,
    sample_rate: u32,
}

impl SampleClock {
    pub fn new(samples: Arc<AtomicU64>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioClock for SampleClock {
    fn now(&self) -> f64 {
        self.samples.load(Ordering::SeqCst) as f64 / self.sample_rate as f64
    }
}

/// Manually advanced clock for tests and offline use
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, seconds: f64) {
        self.micros
            .fetch_add((seconds * 1e6).round() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, seconds: f64) {
        self.micros
            .store((seconds * 1e6).round() as u64, Ordering::SeqCst);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1e6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_clock() {
        let samples = Arc::new(AtomicU64::new(0));
        let clock = SampleClock::new(samples.clone(), 48_000);
        assert_eq!(clock.now(), 0.0);
        samples.store(24_000, Ordering::SeqCst);
        assert!((clock.now() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        clock.advance(0.25);
        clock.advance(0.25);
        assert!((clock.now() - 0.5).abs() < 1e-9);
        clock.set(2.0);
        assert!((clock.now() - 2.0).abs() < 1e-9);
    }
}
