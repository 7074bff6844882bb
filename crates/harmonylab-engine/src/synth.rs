//! Oscillator voices and percussion, rendered inside the audio callback.
//! The scheduler talks to [`EngineSink`], which forwards commands over a
//! channel; the callback drains them and renders additively.

use std::f64::consts::TAU;

use crossbeam_channel::Sender;
use harmonylab_core::{Midi, NoteEvent, PartName, Settings, SynthStyle};

use crate::scheduler::NoteSink;

const ATTACK_SECS: f64 = 0.01;
const RELEASE_SECS: f64 = 0.2;
const DRUM_BUS_GAIN: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wave {
    Sine,
    Square,
    Saw,
    Triangle,
}

#[derive(Debug, Clone)]
pub(crate) enum SynthCommand {
    Note {
        wave: Wave,
        freq: f64,
        start: f64,
        duration: f64,
        decay: f64,
        sustain: f32,
    },
    Percussion {
        beat: u8,
        start: f64,
    },
    StopAll,
    Settings(Settings),
}

pub(crate) fn frequency_from_midi(midi: Midi) -> f64 {
    440.0 * 2f64.powf((midi as f64 - 69.0) / 12.0)
}

fn part_wave(part: PartName, settings: &Settings) -> Wave {
    if settings.nice {
        return if part == PartName::Bass {
            Wave::Triangle
        } else {
            Wave::Sine
        };
    }
    match settings.synth_style {
        SynthStyle::Chiptune => Wave::Square,
        SynthStyle::Ambient => Wave::Sine,
        SynthStyle::Modern => {
            if part == PartName::Arp {
                Wave::Square
            } else {
                Wave::Saw
            }
        }
    }
}

fn part_decay(part: PartName) -> f64 {
    match part {
        PartName::Bass => 0.35,
        PartName::Arp => 0.25,
        PartName::Lead => 0.5,
    }
}

fn part_sustain(part: PartName) -> f32 {
    if part == PartName::Bass {
        0.6
    } else {
        0.4
    }
}

/// Scheduler-facing sink that forwards dispatches to the audio thread
pub struct EngineSink {
    tx: Sender<SynthCommand>,
}

impl EngineSink {
    pub(crate) fn new(tx: Sender<SynthCommand>) -> Self {
        Self { tx }
    }
}

impl NoteSink for EngineSink {
    fn play(&self, event: &NoteEvent, time: f64, settings: &Settings) {
        let Some(midi) = event.midi else {
            return;
        };
        let duration = event.dur_steps as f64 / 4.0 * (60.0 / settings.bpm);
        let _ = self.tx.send(SynthCommand::Note {
            wave: part_wave(event.part, settings),
            freq: frequency_from_midi(midi),
            start: time,
            duration,
            decay: part_decay(event.part),
            sustain: part_sustain(event.part),
        });
    }

    fn play_percussion(&self, step: u8, time: f64, _settings: &Settings) {
        let _ = self.tx.send(SynthCommand::Percussion {
            beat: step % 16,
            start: time,
        });
    }

    fn stop_all(&self) {
        let _ = self.tx.send(SynthCommand::StopAll);
    }
}

struct Voice {
    wave: Wave,
    freq: f64,
    phase: f64,
    start: f64,
    duration: f64,
    decay: f64,
    sustain: f32,
}

impl Voice {
    /// Attack to 1, decay to sustain, hold for the note duration, release
    fn envelope(&self, elapsed: f64) -> f32 {
        if elapsed < ATTACK_SECS {
            return (elapsed / ATTACK_SECS) as f32;
        }
        let after_attack = elapsed - ATTACK_SECS;
        if after_attack < self.decay && elapsed < self.duration {
            let frac = (after_attack / self.decay) as f32;
            return 1.0 + (self.sustain - 1.0) * frac;
        }
        if elapsed < self.duration {
            return self.sustain;
        }
        let released = elapsed - self.duration;
        if released < RELEASE_SECS {
            return self.sustain * (1.0 - (released / RELEASE_SECS) as f32);
        }
        0.0
    }

    fn sample(&mut self, t: f64, sample_rate: f64) -> f32 {
        if t < self.start {
            return 0.0;
        }
        let gain = self.envelope(t - self.start);
        if gain <= 0.0 {
            return 0.0;
        }
        let value = match self.wave {
            Wave::Sine => (self.phase * TAU).sin(),
            Wave::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Wave::Saw => 2.0 * self.phase - 1.0,
            Wave::Triangle => 4.0 * (self.phase - 0.5).abs() - 1.0,
        };
        self.phase += self.freq / sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        value as f32 * gain
    }

    fn finished(&self, t: f64) -> bool {
        t > self.start + self.duration + RELEASE_SECS
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DrumKind {
    Kick,
    Snare,
    Tick,
}

impl DrumKind {
    fn length(&self) -> f64 {
        match self {
            Self::Kick => 0.5,
            Self::Snare => 0.2,
            Self::Tick => 0.05,
        }
    }
}

struct DrumHit {
    kind: DrumKind,
    start: f64,
    phase: f64,
}

impl DrumHit {
    fn sample(&mut self, t: f64, sample_rate: f64) -> f32 {
        if t < self.start {
            return 0.0;
        }
        let elapsed = t - self.start;
        let length = self.kind.length();
        if elapsed >= length {
            return 0.0;
        }
        let frac = elapsed / length;

        match self.kind {
            DrumKind::Kick => {
                // Sine swept 120 → 40 Hz with matching exponential decay
                let freq = 120.0 * (40.0f64 / 120.0).powf(frac);
                self.phase += freq / sample_rate;
                if self.phase >= 1.0 {
                    self.phase -= 1.0;
                }
                let gain = 0.001f64.powf(frac);
                ((self.phase * TAU).sin() * gain) as f32
            }
            DrumKind::Snare | DrumKind::Tick => {
                let freq = if self.kind == DrumKind::Snare {
                    200.0
                } else {
                    800.0
                };
                self.phase += freq / sample_rate;
                if self.phase >= 1.0 {
                    self.phase -= 1.0;
                }
                let gain = 0.4 * (0.001f64 / 0.4).powf(frac);
                let value = if self.phase < 0.5 { 1.0 } else { -1.0 };
                (value * gain) as f32
            }
        }
    }

    fn finished(&self, t: f64) -> bool {
        t > self.start + self.kind.length()
    }
}

/// Every active voice; owned exclusively by the audio callback
pub(crate) struct SynthBank {
    voices: Vec<Voice>,
    drums: Vec<DrumHit>,
}

impl SynthBank {
    pub(crate) fn new() -> Self {
        Self {
            voices: Vec::new(),
            drums: Vec::new(),
        }
    }

    pub(crate) fn apply(&mut self, command: SynthCommand) {
        match command {
            SynthCommand::Note {
                wave,
                freq,
                start,
                duration,
                decay,
                sustain,
            } => self.voices.push(Voice {
                wave,
                freq,
                phase: 0.0,
                start,
                duration,
                decay,
                sustain,
            }),
            SynthCommand::Percussion { beat, start } => {
                if beat == 0 {
                    self.drums.push(DrumHit {
                        kind: DrumKind::Kick,
                        start,
                        phase: 0.0,
                    });
                }
                if beat == 8 {
                    self.drums.push(DrumHit {
                        kind: DrumKind::Snare,
                        start,
                        phase: 0.0,
                    });
                }
                if beat % 4 == 0 {
                    self.drums.push(DrumHit {
                        kind: DrumKind::Tick,
                        start,
                        phase: 0.0,
                    });
                }
            }
            SynthCommand::StopAll => {
                self.voices.clear();
                self.drums.clear();
            }
            SynthCommand::Settings(_) => {}
        }
    }

    /// Render one mono block starting at `start_time`, then retire
    /// finished voices
    pub(crate) fn render(&mut self, out: &mut [f32], start_time: f64, sample_rate: f64) {
        for (i, slot) in out.iter_mut().enumerate() {
            let t = start_time + i as f64 / sample_rate;
            let mut mix = 0.0f32;
            for voice in &mut self.voices {
                mix += voice.sample(t, sample_rate);
            }
            let mut drum_mix = 0.0f32;
            for drum in &mut self.drums {
                drum_mix += drum.sample(t, sample_rate);
            }
            *slot = mix + drum_mix * DRUM_BUS_GAIN;
        }
        let end = start_time + out.len() as f64 / sample_rate;
        self.voices.retain(|voice| !voice.finished(end));
        self.drums.retain(|drum| !drum.finished(end));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn voice(duration: f64) -> Voice {
        Voice {
            wave: Wave::Saw,
            freq: 110.0,
            phase: 0.0,
            start: 0.0,
            duration,
            decay: 0.35,
            sustain: 0.6,
        }
    }

    #[test]
    fn test_frequency_from_midi() {
        assert!((frequency_from_midi(69) - 440.0).abs() < 1e-9);
        assert!((frequency_from_midi(60) - 261.6256).abs() < 1e-3);
    }

    #[test]
    fn test_envelope_shape() {
        let voice = voice(1.0);
        assert_eq!(voice.envelope(0.0), 0.0);
        assert!((voice.envelope(ATTACK_SECS) - 1.0).abs() < 1e-6);
        // Fully decayed: holding at sustain
        assert!((voice.envelope(0.5) - 0.6).abs() < 1e-6);
        // Mid-release
        assert!(voice.envelope(1.1) < 0.6);
        assert!(voice.envelope(1.1) > 0.0);
        // Gone after the release tail
        assert_eq!(voice.envelope(1.0 + RELEASE_SECS + 0.01), 0.0);
    }

    #[test]
    fn test_bank_renders_and_retires() {
        let mut bank = SynthBank::new();
        bank.apply(SynthCommand::Note {
            wave: Wave::Sine,
            freq: 440.0,
            start: 0.0,
            duration: 0.01,
            decay: 0.25,
            sustain: 0.4,
        });
        bank.apply(SynthCommand::Percussion {
            beat: 0,
            start: 0.0,
        });
        // Kick + tick on beat 0
        assert_eq!(bank.drums.len(), 2);

        let mut block = vec![0.0f32; 512];
        bank.render(&mut block, 0.0, 48_000.0);
        assert!(block.iter().all(|sample| sample.is_finite()));
        assert!(block.iter().any(|sample| *sample != 0.0));

        // Render far past every envelope: everything retires
        bank.render(&mut block, 10.0, 48_000.0);
        assert!(bank.voices.is_empty());
        assert!(bank.drums.is_empty());
    }

    #[test]
    fn test_percussion_pattern() {
        let mut bank = SynthBank::new();
        bank.apply(SynthCommand::Percussion {
            beat: 8,
            start: 0.0,
        });
        // Snare + tick on beat 8
        assert_eq!(bank.drums.len(), 2);
        bank.apply(SynthCommand::Percussion {
            beat: 5,
            start: 0.0,
        });
        // Off-beats are silent
        assert_eq!(bank.drums.len(), 2);
        bank.apply(SynthCommand::StopAll);
        assert!(bank.drums.is_empty());
    }

    #[test]
    fn test_sink_forwards_note_commands() {
        let (tx, rx) = unbounded();
        let sink = EngineSink::new(tx);
        let settings = Settings {
            bpm: 120.0,
            ..Default::default()
        };
        let event = NoteEvent {
            part: PartName::Bass,
            step: 0,
            dur_steps: 4,
            midi: Some(69),
        };
        sink.play(&event, 1.5, &settings);

        match rx.try_recv().unwrap() {
            SynthCommand::Note {
                freq,
                start,
                duration,
                sustain,
                ..
            } => {
                assert!((freq - 440.0).abs() < 1e-9);
                assert_eq!(start, 1.5);
                // 4 steps = 1 beat = 0.5 s at 120 bpm
                assert!((duration - 0.5).abs() < 1e-9);
                assert_eq!(sustain, 0.6);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        // Rests never reach the audio thread
        sink.play(
            &NoteEvent {
                part: PartName::Lead,
                step: 0,
                dur_steps: 4,
                midi: None,
            },
            0.0,
            &settings,
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_nice_mode_and_style_waves() {
        let mut settings = Settings::default();
        assert_eq!(part_wave(PartName::Bass, &settings), Wave::Saw);
        assert_eq!(part_wave(PartName::Arp, &settings), Wave::Square);

        settings.nice = true;
        assert_eq!(part_wave(PartName::Bass, &settings), Wave::Triangle);
        assert_eq!(part_wave(PartName::Lead, &settings), Wave::Sine);

        settings.nice = false;
        settings.synth_style = SynthStyle::Chiptune;
        assert_eq!(part_wave(PartName::Lead, &settings), Wave::Square);
    }
}
