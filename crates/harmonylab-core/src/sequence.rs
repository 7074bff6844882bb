//! Sequence generation: progression + settings (+ user overrides) →
//! per-part pitch arrays and run-length-encoded note events

use serde::{Deserialize, Serialize};

use crate::chords::chord_pitch_classes;
use crate::notes::{closest_midi_to_target, midi_for_pitch_class, Degree, Midi};
use crate::progressions::Progression;
use crate::scales::pentatonic_pitch_classes;
use crate::settings::{Settings, STEPS_PER_BAR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartName {
    Lead,
    Arp,
    Bass,
}

impl PartName {
    pub const ALL: [PartName; 3] = [PartName::Lead, PartName::Arp, PartName::Bass];

    /// Note slots per bar for this part
    pub fn slots_per_bar(&self) -> u32 {
        match self {
            Self::Lead => 8,
            Self::Arp => 16,
            Self::Bass => 4,
        }
    }

    /// 16th-note steps covered by one slot
    pub fn step_size(&self) -> u32 {
        STEPS_PER_BAR / self.slots_per_bar()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Arp => "arp",
            Self::Bass => "bass",
        }
    }
}

/// A scheduled note: loop-relative 16th-note start and duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub part: PartName,
    pub step: u32,
    pub dur_steps: u32,
    /// `None` is a rest (never emitted by the generator, but preserved in
    /// persisted payloads)
    pub midi: Option<Midi>,
}

/// One fixed-length pitch-or-rest array per part
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartNoteMap {
    pub lead: Vec<Option<Midi>>,
    pub arp: Vec<Option<Midi>>,
    pub bass: Vec<Option<Midi>>,
}

impl PartNoteMap {
    pub fn part(&self, part: PartName) -> &[Option<Midi>] {
        match part {
            PartName::Lead => &self.lead,
            PartName::Arp => &self.arp,
            PartName::Bass => &self.bass,
        }
    }
}

/// Optional per-part override arrays; `None` falls back to generated
/// material
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotes {
    pub lead: Option<Vec<Option<Midi>>>,
    pub arp: Option<Vec<Option<Midi>>>,
    pub bass: Option<Vec<Option<Midi>>>,
}

impl UserNotes {
    pub fn part(&self, part: PartName) -> Option<&[Option<Midi>]> {
        match part {
            PartName::Lead => self.lead.as_deref(),
            PartName::Arp => self.arp.as_deref(),
            PartName::Bass => self.bass.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceResult {
    /// All parts merged, sorted by start step (stable across parts)
    pub events: Vec<NoteEvent>,
    /// Generated material, exposed even when user overrides drive the events
    pub generated: PartNoteMap,
}

fn to_midi(pc: u8, last: Option<Midi>, preferred_octave: i32) -> Midi {
    match last {
        Some(reference) => closest_midi_to_target(pc, reference, preferred_octave),
        None => midi_for_pitch_class(pc, preferred_octave),
    }
}

/// Root, root, fifth, root per bar; the fifth stays close to that bar's root
fn generate_bass(chords: &[Vec<u8>]) -> Vec<Option<Midi>> {
    let mut result = Vec::with_capacity(chords.len() * 4);
    let mut last: Option<Midi> = None;
    for chord in chords {
        let root_pc = chord[0];
        let fifth_pc = (root_pc + 7) % 12;
        let root = to_midi(root_pc, last, 2);
        let fifth = closest_midi_to_target(fifth_pc, root, 2);
        result.extend([Some(root), Some(root), Some(fifth), Some(root)]);
        last = Some(root);
    }
    result
}

fn generate_arp(chords: &[Vec<u8>]) -> Vec<Option<Midi>> {
    const PATTERN: [usize; 4] = [0, 2, 1, 3];
    let mut result = Vec::with_capacity(chords.len() * STEPS_PER_BAR as usize);
    let mut last: Option<Midi> = None;
    for chord in chords {
        for step in 0..STEPS_PER_BAR as usize {
            let tone = chord[PATTERN[step % PATTERN.len()] % chord.len()];
            let preferred_octave = 4 + (step / 16) as i32;
            let midi = to_midi(tone, last, preferred_octave);
            result.push(Some(midi));
            last = Some(midi);
        }
    }
    result
}

/// 8-slot template per bar: chord tones, two rests, two pentatonic passing
/// tones indexed by bar+1 / bar+2
fn generate_lead(chords: &[Vec<u8>], pentatonic: &[u8; 5]) -> Vec<Option<Midi>> {
    let mut result = Vec::with_capacity(chords.len() * 8);
    let mut last: Option<Midi> = None;
    for (bar, chord) in chords.iter().enumerate() {
        let template: [Option<u8>; 8] = [
            Some(chord[0]),
            None,
            Some(chord[2 % chord.len()]),
            Some(pentatonic[(bar + 1) % pentatonic.len()]),
            Some(chord[3 % chord.len()]),
            None,
            Some(pentatonic[(bar + 2) % pentatonic.len()]),
            Some(chord[1 % chord.len()]),
        ];
        for tone in template {
            let Some(pc) = tone else {
                result.push(None);
                continue;
            };
            let midi = to_midi(pc, last, 5);
            result.push(Some(midi));
            last = Some(midi);
        }
    }
    result
}

/// Run-length encode a part's pitch array: consecutive equal non-rest slots
/// collapse into one event; rests advance the step cursor without emitting.
fn notes_to_events(part: PartName, notes: &[Option<Midi>]) -> Vec<NoteEvent> {
    let step_size = part.step_size();
    let mut events = Vec::new();
    let mut step = 0u32;
    let mut idx = 0usize;
    while idx < notes.len() {
        let Some(midi) = notes[idx] else {
            idx += 1;
            step += step_size;
            continue;
        };
        let mut run_end = idx + 1;
        while run_end < notes.len() && notes[run_end] == Some(midi) {
            run_end += 1;
        }
        let duration = (run_end - idx) as u32 * step_size;
        events.push(NoteEvent {
            part,
            step,
            dur_steps: duration,
            midi: Some(midi),
        });
        step += duration;
        idx = run_end;
    }
    events
}

/// Pad with rests or truncate to the expected slot count
fn ensure_length(source: Option<&[Option<Midi>]>, target: usize) -> Option<Vec<Option<Midi>>> {
    let mut copy = source?.to_vec();
    copy.resize(target, None);
    Some(copy)
}

/// Derive every part's material and events from the current settings,
/// progression, and overrides. Pure: safe to call on every mutation.
pub fn generate_sequence(
    settings: &Settings,
    progression: &Progression,
    user_notes: &UserNotes,
) -> SequenceResult {
    let bars = settings.bars as usize;
    let degrees: Vec<Degree> = (0..bars)
        .map(|bar| {
            if progression.degrees.is_empty() {
                0
            } else {
                progression.degrees[bar % progression.degrees.len()]
            }
        })
        .collect();
    let chords: Vec<Vec<u8>> = degrees
        .iter()
        .map(|&degree| chord_pitch_classes(settings.key, settings.mode, degree, true))
        .collect();
    let pentatonic = pentatonic_pitch_classes(settings.key, settings.mode);

    let generated = PartNoteMap {
        lead: generate_lead(&chords, &pentatonic),
        arp: generate_arp(&chords),
        bass: generate_bass(&chords),
    };

    let mut events = Vec::new();
    for part in [PartName::Bass, PartName::Arp, PartName::Lead] {
        let expected = bars * part.slots_per_bar() as usize;
        let overridden = ensure_length(user_notes.part(part), expected);
        let notes = overridden.as_deref().unwrap_or(generated.part(part));
        events.extend(notes_to_events(part, notes));
    }
    events.sort_by_key(|event| event.step);

    SequenceResult { events, generated }
}
