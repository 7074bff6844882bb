//! Lookahead scheduler: converts loop-relative steps to audio-clock time
//! and dispatches note events ahead of the clock

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use harmonylab_core::{NoteEvent, Settings, STEPS_PER_BAR};
use tracing::debug;

use crate::clock::AudioClock;

/// Seconds of schedule guaranteed ahead of the clock
pub const LOOKAHEAD_SECS: f64 = 0.25;
/// Poll cadence; much smaller than the lookahead so scan horizons overlap
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Seconds per 16th-note step
pub fn step_duration_secs(bpm: f64) -> f64 {
    60.0 / bpm / 4.0
}

/// Map a step index to loop-relative seconds. Swing delays only the
/// off-8th 16ths (step mod 4 == 1 or 3); downbeats are never moved.
pub fn step_to_time(step: u64, bpm: f64, swing: f64) -> f64 {
    let base = step_duration_secs(bpm);
    let beat_position = step % 4;
    let swing_offset = if beat_position % 2 == 1 {
        base * swing
    } else {
        0.0
    };
    step as f64 * base + swing_offset
}

/// Synthesis collaborator contract. Dispatch is fire-and-forget and must
/// not block.
pub trait NoteSink: Send + Sync {
    fn play(&self, event: &NoteEvent, time: f64, settings: &Settings);
    fn play_percussion(&self, step: u8, time: f64, settings: &Settings);
    fn stop_all(&self);
}

struct RunState {
    events: Vec<NoteEvent>,
    settings: Settings,
    /// Clock timestamp of step 0 of loop 0
    start_time: f64,
    loop_steps: u64,
    next_event: usize,
    loop_count: u64,
    next_drum_step: u64,
}

impl RunState {
    fn new(events: Vec<NoteEvent>, settings: Settings, start_time: f64) -> Self {
        let loop_steps = settings.bars.max(1) as u64 * STEPS_PER_BAR as u64;
        Self {
            events,
            settings,
            start_time,
            loop_steps,
            next_event: 0,
            loop_count: 0,
            next_drum_step: 0,
        }
    }

    fn rewind(&mut self, start_time: f64) {
        self.start_time = start_time;
        self.next_event = 0;
        self.loop_count = 0;
        self.next_drum_step = 0;
    }
}

struct SchedulerState {
    cached_events: Vec<NoteEvent>,
    cached_settings: Settings,
    run: Option<RunState>,
    listeners: Vec<Sender<Option<NoteEvent>>>,
}

struct Shared {
    clock: Arc<dyn AudioClock>,
    sink: Arc<dyn NoteSink>,
    state: Mutex<SchedulerState>,
    running: AtomicBool,
}

struct PollHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

pub struct LookaheadScheduler {
    shared: Arc<Shared>,
    poll_interval: Duration,
    poll: Mutex<Option<PollHandle>>,
}

impl LookaheadScheduler {
    pub fn new(clock: Arc<dyn AudioClock>, sink: Arc<dyn NoteSink>) -> Self {
        Self::with_poll_interval(clock, sink, TICK_INTERVAL)
    }

    /// Override the poll cadence. Tests pass a long interval and drive
    /// [`LookaheadScheduler::tick`] manually.
    pub fn with_poll_interval(
        clock: Arc<dyn AudioClock>,
        sink: Arc<dyn NoteSink>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                clock,
                sink,
                state: Mutex::new(SchedulerState {
                    cached_events: Vec::new(),
                    cached_settings: Settings::default(),
                    run: None,
                    listeners: Vec::new(),
                }),
                running: AtomicBool::new(false),
            }),
            poll_interval,
            poll: Mutex::new(None),
        }
    }

    /// Begin looping playback from step 0 at the current clock time.
    /// Restarts cleanly if already running.
    pub fn start(&self, events: &[NoteEvent], settings: &Settings) {
        self.halt_polling();

        {
            let Ok(mut state) = self.shared.state.lock() else {
                return;
            };
            let sorted = sorted_by_step(events);
            state.cached_events = sorted.clone();
            state.cached_settings = settings.clone();
            state.run = Some(RunState::new(
                sorted,
                settings.clone(),
                self.shared.clock.now(),
            ));
            notify(&mut state.listeners, None);
        }

        self.shared.sink.stop_all();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = self.shared.clone();
        let interval = self.poll_interval;
        self.shared.running.store(true, Ordering::SeqCst);
        let thread = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => run_tick(&shared),
                    _ => break,
                }
            }
            shared.running.store(false, Ordering::SeqCst);
        });
        if let Ok(mut poll) = self.poll.lock() {
            *poll = Some(PollHandle { stop_tx, thread });
        }

        debug!(bars = settings.bars, bpm = settings.bpm, "scheduler started");
        run_tick(&self.shared);
    }

    /// Synchronous stop: after this returns no further dispatch occurs
    /// until the next start.
    pub fn stop(&self) {
        self.halt_polling();
        self.shared.sink.stop_all();
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        state.run = None;
        notify(&mut state.listeners, None);
    }

    /// Replace the event list. While running this restarts the loop from
    /// step 0 at the current clock time; while stopped it only updates the
    /// cache.
    pub fn set_events(&self, events: &[NoteEvent]) {
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        let sorted = sorted_by_step(events);
        state.cached_events = sorted.clone();
        let now = self.shared.clock.now();
        if let Some(run) = state.run.as_mut() {
            run.events = sorted;
            run.rewind(now);
        }
        notify(&mut state.listeners, None);
    }

    /// Apply new settings. A tempo, swing, or bar-count change invalidates
    /// every previously computed time, so the loop restarts exactly like
    /// [`LookaheadScheduler::set_events`].
    pub fn update_settings(&self, settings: &Settings) {
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        state.cached_settings = settings.clone();
        let now = self.shared.clock.now();
        if let Some(run) = state.run.as_mut() {
            run.settings = settings.clone();
            run.loop_steps = settings.bars.max(1) as u64 * STEPS_PER_BAR as u64;
            run.rewind(now);
        }
        notify(&mut state.listeners, None);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Subscribe to "about to play" notifications. `None` marks every
    /// reset (start, stop, event/settings change). Dropping the receiver
    /// cancels the subscription.
    pub fn subscribe(&self) -> Receiver<Option<NoteEvent>> {
        let (tx, rx) = unbounded();
        let _ = tx.send(None);
        if let Ok(mut state) = self.shared.state.lock() {
            state.listeners.push(tx);
        }
        rx
    }

    /// Run one scheduling pass immediately
    pub fn tick(&self) {
        run_tick(&self.shared);
    }

    fn halt_polling(&self) {
        let handle = {
            let Ok(mut poll) = self.poll.lock() else {
                return;
            };
            poll.take()
        };
        if let Some(PollHandle { stop_tx, thread }) = handle {
            let _ = stop_tx.send(());
            let _ = thread.join();
        }
    }
}

impl Drop for LookaheadScheduler {
    fn drop(&mut self) {
        self.halt_polling();
    }
}

fn sorted_by_step(events: &[NoteEvent]) -> Vec<NoteEvent> {
    let mut sorted = events.to_vec();
    sorted.sort_by_key(|event| event.step);
    sorted
}

fn notify(listeners: &mut Vec<Sender<Option<NoteEvent>>>, event: Option<NoteEvent>) {
    listeners.retain(|listener| listener.send(event.clone()).is_ok());
}

/// One scheduling pass: dispatch every percussion step and melodic event
/// whose time falls inside the lookahead horizon.
fn run_tick(shared: &Shared) {
    let Ok(mut state) = shared.state.lock() else {
        return;
    };
    let SchedulerState { run, listeners, .. } = &mut *state;
    let Some(run) = run.as_mut() else {
        return;
    };

    let horizon = shared.clock.now() + LOOKAHEAD_SECS;

    // Percussion repeats every bar regardless of loop length
    loop {
        let step = run.next_drum_step;
        let time = run.start_time + step_to_time(step, run.settings.bpm, run.settings.swing);
        if time > horizon {
            break;
        }
        shared
            .sink
            .play_percussion((step % STEPS_PER_BAR as u64) as u8, time, &run.settings);
        run.next_drum_step += 1;
    }

    while !run.events.is_empty() {
        let event = run.events[run.next_event].clone();
        let absolute_step = event.step as u64 + run.loop_count * run.loop_steps;
        let time =
            run.start_time + step_to_time(absolute_step, run.settings.bpm, run.settings.swing);
        if time > horizon {
            break;
        }
        notify(listeners, Some(event.clone()));
        shared.sink.play(&event, time, &run.settings);
        run.next_event += 1;
        if run.next_event >= run.events.len() {
            run.next_event = 0;
            run.loop_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use harmonylab_core::PartName;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingSink {
        plays: Mutex<Vec<(NoteEvent, f64, f64)>>,
        drums: Mutex<Vec<(u8, f64)>>,
        stops: AtomicUsize,
    }

    impl RecordingSink {
        fn played(&self) -> Vec<(NoteEvent, f64, f64)> {
            self.plays.lock().unwrap().clone()
        }

        fn drummed(&self) -> Vec<(u8, f64)> {
            self.drums.lock().unwrap().clone()
        }
    }

    impl NoteSink for RecordingSink {
        fn play(&self, event: &NoteEvent, time: f64, settings: &Settings) {
            self.plays
                .lock()
                .unwrap()
                .push((event.clone(), time, settings.bpm));
        }

        fn play_percussion(&self, step: u8, time: f64, _settings: &Settings) {
            self.drums.lock().unwrap().push((step, time));
        }

        fn stop_all(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn lead(step: u32, dur_steps: u32, midi: u8) -> NoteEvent {
        NoteEvent {
            part: PartName::Lead,
            step,
            dur_steps,
            midi: Some(midi),
        }
    }

    fn test_settings() -> Settings {
        Settings {
            bars: 4,
            bpm: 120.0,
            swing: 0.1,
            ..Default::default()
        }
    }

    fn fixture() -> (Arc<ManualClock>, Arc<RecordingSink>, LookaheadScheduler) {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(RecordingSink::default());
        // Hour-long poll interval: the poll thread stays parked and tests
        // drive tick() deterministically
        let scheduler = LookaheadScheduler::with_poll_interval(
            clock.clone(),
            sink.clone(),
            Duration::from_secs(3600),
        );
        (clock, sink, scheduler)
    }

    #[test]
    fn test_step_to_time_without_swing() {
        let base = step_duration_secs(120.0);
        assert_eq!(step_to_time(0, 120.0, 0.0), 0.0);
        assert!((step_to_time(1, 120.0, 0.0) - base).abs() < 1e-9);
        assert!((step_to_time(4, 120.0, 0.0) - base * 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_swing_delays_off_16ths() {
        let base = step_duration_secs(100.0);
        let swung = step_to_time(1, 100.0, 0.2);
        assert!(swung > base);
        let following = step_to_time(2, 100.0, 0.2);
        assert!((following - swung - base * (1.0 - 0.2)).abs() < 1e-9);
        // The next downbeat is unaffected
        assert!((step_to_time(4, 100.0, 0.2) - base * 4.0).abs() < 1e-9);
        // Step 3 is swung like step 1
        assert!((step_to_time(3, 100.0, 0.2) - (base * 3.0 + base * 0.2)).abs() < 1e-9);
    }

    #[test]
    fn test_start_dispatches_within_lookahead() {
        let (_clock, sink, scheduler) = fixture();
        let events = [lead(0, 4, 60), lead(4, 4, 62)];
        scheduler.start(&events, &test_settings());

        assert!(scheduler.is_running());
        assert_eq!(sink.stops.load(Ordering::SeqCst), 1);

        // bpm 120 → step 0.125 s; event 1 at 0.0 is inside the 0.25 s
        // horizon, event 2 at 0.5 is not
        let played = sink.played();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].0.midi, Some(60));
        assert_eq!(played[0].1, 0.0);
        assert_eq!(played[0].2, 120.0);
        assert!(!sink.drummed().is_empty());

        scheduler.stop();
    }

    #[test]
    fn test_clock_advance_dispatches_in_order() {
        let (clock, sink, scheduler) = fixture();
        let events = [lead(0, 4, 60), lead(4, 4, 62)];
        scheduler.start(&events, &test_settings());

        clock.advance(0.3);
        scheduler.tick();

        let played = sink.played();
        assert_eq!(played.len(), 2);
        assert_eq!(played[0].0.midi, Some(60));
        assert_eq!(played[1].0.midi, Some(62));
        assert!((played[1].1 - 0.5).abs() < 1e-9);

        scheduler.stop();
    }

    #[test]
    fn test_loop_wraps_with_loop_count() {
        let (clock, sink, scheduler) = fixture();
        // One event per loop of 64 steps (4 bars), 8 s per loop at 120 bpm
        let events = [lead(0, 4, 60)];
        scheduler.start(&events, &test_settings());

        clock.advance(8.0);
        scheduler.tick();

        let played = sink.played();
        assert_eq!(played.len(), 2);
        assert_eq!(played[0].1, 0.0);
        assert!((played[1].1 - 8.0).abs() < 1e-9);

        scheduler.stop();
    }

    #[test]
    fn test_set_events_drops_queued_and_restarts() {
        let (clock, sink, scheduler) = fixture();
        let events = [lead(0, 4, 60), lead(4, 4, 62)];
        scheduler.start(&events, &test_settings());

        clock.advance(0.1);
        scheduler.set_events(&[lead(0, 8, 70)]);
        scheduler.tick();

        let played = sink.played();
        assert_eq!(played.len(), 2);
        // The queued second event never fires; the new list starts from
        // step 0 anchored at the set_events clock time
        assert_eq!(played[1].0.midi, Some(70));
        assert!((played[1].1 - 0.1).abs() < 1e-9);
        assert!(played.iter().all(|(event, _, _)| event.midi != Some(62)));

        scheduler.stop();
    }

    #[test]
    fn test_update_settings_restarts_with_new_tempo() {
        let (clock, sink, scheduler) = fixture();
        scheduler.start(&[lead(0, 4, 60), lead(4, 4, 62)], &test_settings());

        clock.advance(0.1);
        let slower = Settings {
            bpm: 90.0,
            ..test_settings()
        };
        scheduler.update_settings(&slower);
        scheduler.tick();

        let played = sink.played();
        // First event again, now carrying the new settings and anchor
        let last = played.last().unwrap();
        assert_eq!(last.0.midi, Some(60));
        assert_eq!(last.2, 90.0);
        assert!((last.1 - 0.1).abs() < 1e-9);

        scheduler.stop();
    }

    #[test]
    fn test_updates_while_stopped_are_cached_no_ops() {
        let (_clock, sink, scheduler) = fixture();
        scheduler.set_events(&[lead(0, 4, 99)]);
        scheduler.update_settings(&test_settings());
        assert!(!scheduler.is_running());
        assert!(sink.played().is_empty());

        // start() uses the events it is given, not the cache
        scheduler.start(&[lead(0, 4, 60)], &test_settings());
        assert_eq!(sink.played()[0].0.midi, Some(60));
        scheduler.stop();
    }

    #[test]
    fn test_percussion_wraps_mod_16() {
        let (clock, sink, scheduler) = fixture();
        scheduler.start(&[], &test_settings());

        clock.advance(2.0);
        scheduler.tick();

        let drums = sink.drummed();
        // 0.125 s per step: steps 0..=18 fit inside the 2.25 s horizon
        assert!(drums.len() >= 17);
        assert_eq!(drums[0].0, 0);
        assert_eq!(drums[15].0, 15);
        assert_eq!(drums[16].0, 0);
        assert!((drums[16].1 - 2.0).abs() < 1e-9);

        scheduler.stop();
    }

    #[test]
    fn test_stop_silences_and_halts() {
        let (clock, sink, scheduler) = fixture();
        scheduler.start(&[lead(0, 4, 60), lead(4, 4, 62)], &test_settings());
        scheduler.stop();

        assert!(!scheduler.is_running());
        assert_eq!(sink.stops.load(Ordering::SeqCst), 2);

        let before = sink.played().len();
        clock.advance(10.0);
        scheduler.tick();
        assert_eq!(sink.played().len(), before);
    }

    #[test]
    fn test_subscription_receives_sentinels_and_events() {
        let (_clock, sink, scheduler) = fixture();
        let notes = scheduler.subscribe();

        // Immediate None clears stale UI state
        assert_eq!(notes.try_recv().unwrap(), None);

        scheduler.start(&[lead(0, 4, 60)], &test_settings());
        let received: Vec<_> = notes.try_iter().collect();
        // None on start reset, then the first event before dispatch
        assert_eq!(received.first(), Some(&None));
        assert!(received.contains(&Some(lead(0, 4, 60))));
        assert!(!sink.played().is_empty());

        scheduler.stop();
        assert!(notes.try_iter().any(|event| event.is_none()));
    }

    #[test]
    fn test_polling_thread_dispatches_on_its_own() {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(RecordingSink::default());
        let scheduler = LookaheadScheduler::with_poll_interval(
            clock.clone(),
            sink.clone(),
            Duration::from_millis(5),
        );
        scheduler.start(&[lead(0, 4, 60), lead(4, 4, 62)], &test_settings());

        clock.advance(0.3);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while sink.played().len() < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(sink.played().len(), 2);

        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
