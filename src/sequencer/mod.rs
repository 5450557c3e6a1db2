pub mod clock;
pub mod history;
pub mod pattern;

pub use clock::{Clock, DEFAULT_BPM, MAX_BPM, MIN_BPM};
pub use history::{UndoAction, UndoHistory, MAX_UNDO};
pub use pattern::{Pattern, PatternError, STEPS, TRACKS, TRACK_NAMES};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::Result;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};

use crate::audio::SamplePlayer;
use crate::project;

/// `current_step` value while stopped / not positioned
const STOPPED: i32 = -1;

#[derive(Clone, Copy, Debug, Default)]
struct Transport {
    running: bool,
    paused: bool,
    rec_mode: bool,
    /// Bumped on every start so a loop left over from `stop()` can never
    /// mistake a later start for its own
    generation: u64,
}

/// State read by the timing thread
struct Shared {
    pattern: RwLock<Pattern>,
    transport: Mutex<Transport>,
    current_step: AtomicI32,
    bpm: AtomicU32,
}

impl Shared {
    fn bpm(&self) -> u32 {
        self.bpm.load(Ordering::Acquire)
    }

    fn is_live(&self, generation: u64) -> bool {
        let transport = self.transport.lock();
        transport.running && transport.generation == generation
    }

    /// Move the cursor one step (mod 32) for the loop of `generation`.
    /// Returns None once that loop has been told to exit.
    fn advance_step(&self, generation: u64) -> Option<usize> {
        let transport = self.transport.lock();
        if !transport.running || transport.generation != generation {
            return None;
        }
        let next = (self.current_step.load(Ordering::Acquire) + 1).rem_euclid(STEPS as i32);
        self.current_step.store(next, Ordering::Release);
        Some(next as usize)
    }
}

struct Worker {
    handle: JoinHandle<()>,
    /// Dropping this wakes the loop out of its step sleep
    wake: Sender<()>,
}

/// Drives playback timing, owns the pattern and routes edits through the undo history
pub struct Sequencer {
    shared: Arc<Shared>,
    history: Mutex<UndoHistory>,
    player: Arc<dyn SamplePlayer>,
    worker: Mutex<Option<Worker>>,
    pattern_path: Option<PathBuf>,
}

impl Sequencer {
    /// Sequencer with an empty pattern and no persistence
    pub fn new(player: Arc<dyn SamplePlayer>) -> Self {
        Self::with_pattern(player, Pattern::new(), None)
    }

    /// Sequencer backed by a pattern file. A missing or unreadable file
    /// starts from an empty pattern; the pattern is written back on drop.
    pub fn open(player: Arc<dyn SamplePlayer>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let pattern = match project::load_pattern(&path) {
            Ok(pattern) => {
                log::info!("Loaded pattern from {}", path.display());
                pattern
            }
            Err(e) => {
                log::warn!("Starting from an empty pattern: {:#}", e);
                Pattern::new()
            }
        };
        Self::with_pattern(player, pattern, Some(path))
    }

    fn with_pattern(
        player: Arc<dyn SamplePlayer>,
        pattern: Pattern,
        pattern_path: Option<PathBuf>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pattern: RwLock::new(pattern),
                transport: Mutex::new(Transport::default()),
                current_step: AtomicI32::new(STOPPED),
                bpm: AtomicU32::new(DEFAULT_BPM),
            }),
            history: Mutex::new(UndoHistory::new()),
            player,
            worker: Mutex::new(None),
            pattern_path,
        }
    }

    pub fn pattern_path(&self) -> Option<&Path> {
        self.pattern_path.as_deref()
    }

    /// Write the pattern to its file (no-op without one)
    pub fn save(&self) -> Result<()> {
        match &self.pattern_path {
            Some(path) => project::save_pattern(&self.pattern(), path),
            None => Ok(()),
        }
    }

    // Transport

    /// Start playback. Returns false (and does nothing) if already running.
    pub fn start(&self) -> bool {
        self.start_with(false)
    }

    pub fn start_recording(&self) -> bool {
        self.start_with(true)
    }

    fn start_with(&self, recording: bool) -> bool {
        let generation = {
            let mut transport = self.shared.transport.lock();
            if transport.running {
                return false;
            }
            transport.running = true;
            transport.paused = false;
            transport.rec_mode = recording;
            transport.generation += 1;
            transport.generation
        };

        let (wake_tx, wake_rx) = bounded(1);
        let shared = self.shared.clone();
        let player = self.player.clone();
        let spawned = thread::Builder::new()
            .name("sequencer".into())
            .spawn(move || run_loop(shared, player, generation, wake_rx));

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(Worker {
                    handle,
                    wake: wake_tx,
                });
                log::info!(
                    "Sequencer started{} at {} BPM",
                    if recording { " (recording)" } else { "" },
                    self.bpm()
                );
                true
            }
            Err(e) => {
                log::error!("Failed to spawn sequencer thread: {}", e);
                self.shared.transport.lock().running = false;
                false
            }
        }
    }

    /// Stop playback and reset the cursor. Does not wait for the timing
    /// thread; a trigger already being dispatched may still complete.
    pub fn stop(&self) {
        {
            let mut transport = self.shared.transport.lock();
            transport.running = false;
            transport.paused = false;
            self.shared.current_step.store(STOPPED, Ordering::Release);
        }
        // Detach: dropping the wake sender ends the step sleep early
        drop(self.worker.lock().take());
    }

    /// Pause playback, keeping the cursor. Blocks until the timing thread
    /// has exited, so no trigger fires after this returns.
    pub fn pause(&self) {
        {
            let mut transport = self.shared.transport.lock();
            transport.running = false;
            transport.paused = true;
        }
        self.join_worker();
    }

    fn join_worker(&self) {
        let worker = self.worker.lock().take();
        if let Some(Worker { handle, wake }) = worker {
            drop(wake);
            if handle.join().is_err() {
                log::error!("Sequencer thread panicked");
            }
        }
    }

    /// Turn record intent on or off without touching playback
    pub fn set_recording(&self, recording: bool) {
        self.shared.transport.lock().rec_mode = recording;
    }

    /// Enter or leave edit mode (paused with record intent)
    pub fn set_edit_mode(&self, edit: bool) {
        let mut transport = self.shared.transport.lock();
        transport.rec_mode = edit;
        transport.paused = edit;
    }

    pub fn is_running(&self) -> bool {
        self.shared.transport.lock().running
    }

    pub fn is_paused(&self) -> bool {
        self.shared.transport.lock().paused
    }

    pub fn rec_mode(&self) -> bool {
        self.shared.transport.lock().rec_mode
    }

    /// Running with record intent
    pub fn is_recording(&self) -> bool {
        let transport = self.shared.transport.lock();
        transport.running && transport.rec_mode
    }

    /// Step under the cursor, None while stopped
    pub fn current_step(&self) -> Option<usize> {
        usize::try_from(self.shared.current_step.load(Ordering::Acquire)).ok()
    }

    /// Manual advance for edit mode, clamped to the last step
    pub fn next_step(&self) -> Option<usize> {
        let _transport = self.shared.transport.lock();
        let step = (self.shared.current_step.load(Ordering::Acquire) + 1).min(STEPS as i32 - 1);
        self.shared.current_step.store(step, Ordering::Release);
        usize::try_from(step).ok()
    }

    /// Manual retreat for edit mode, clamped to the stopped position
    pub fn prev_step(&self) -> Option<usize> {
        let _transport = self.shared.transport.lock();
        let step = (self.shared.current_step.load(Ordering::Acquire) - 1).max(STOPPED);
        self.shared.current_step.store(step, Ordering::Release);
        usize::try_from(step).ok()
    }

    // Tempo

    pub fn bpm(&self) -> u32 {
        self.shared.bpm()
    }

    pub fn set_bpm(&self, bpm: u32) -> u32 {
        self.update_bpm(|_| bpm)
    }

    pub fn speed_up(&self, delta: u32) -> u32 {
        self.update_bpm(|bpm| bpm.saturating_add(delta))
    }

    pub fn slow_down(&self, delta: u32) -> u32 {
        self.update_bpm(|bpm| bpm.saturating_sub(delta))
    }

    fn update_bpm(&self, f: impl Fn(u32) -> u32) -> u32 {
        let clamp = |bpm: u32| bpm.clamp(MIN_BPM, MAX_BPM);
        let previous = self
            .shared
            .bpm
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bpm| Some(clamp(f(bpm))))
            .unwrap_or_else(|bpm| bpm);
        clamp(f(previous))
    }

    // Pattern editing

    pub fn trig(&self, track: usize, step: usize) -> bool {
        self.shared.pattern.read().get(track, step)
    }

    /// Set one trigger. With `undoable`, a change is recorded in the history
    /// first; setting a trigger to its current value records nothing.
    pub fn set_trig(&self, track: usize, step: usize, value: bool, undoable: bool) {
        if track >= TRACKS || step >= STEPS {
            log::warn!("Ignoring edit outside the grid: track {} step {}", track, step);
            return;
        }
        let mut history = self.history.lock();
        let mut pattern = self.shared.pattern.write();
        if undoable && pattern.get(track, step) != value {
            history.push(UndoAction::TrigEdit { track, step, value });
        }
        pattern.set(track, step, value);
    }

    /// Pad tap while recording or in edit mode: write (or erase) the track's
    /// trigger at the cursor. Returns the step written.
    pub fn record_hit(&self, track: usize, erase: bool) -> Option<usize> {
        if !(self.is_recording() || self.is_paused()) {
            return None;
        }
        let step = self.current_step()?;
        self.set_trig(track, step, !erase, true);
        Some(step)
    }

    /// Clear every trigger as one undoable action. Returns false when there
    /// was nothing to do: the pattern is already empty, or the last applied
    /// action was itself a clear.
    pub fn clear_pattern(&self) -> bool {
        let mut history = self.history.lock();
        if matches!(history.last_applied(), Some(UndoAction::ClearAll { .. })) {
            log::debug!("Pattern already cleared");
            return false;
        }
        let mut pattern = self.shared.pattern.write();
        if pattern.is_empty() {
            log::debug!("Pattern already empty");
            return false;
        }
        history.push(UndoAction::ClearAll {
            snapshot: Box::new(pattern.clone()),
        });
        pattern.clear_all();
        true
    }

    /// Revert the last applied action. `UndoAction::None` at the start of history.
    pub fn undo(&self) -> UndoAction {
        let mut history = self.history.lock();
        let mut pattern = self.shared.pattern.write();
        history.undo(&mut pattern)
    }

    /// Re-apply the next action. `UndoAction::None` at the end of history.
    pub fn redo(&self) -> UndoAction {
        let mut history = self.history.lock();
        let mut pattern = self.shared.pattern.write();
        history.redo(&mut pattern)
    }

    pub fn can_undo(&self) -> bool {
        self.history.lock().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.lock().can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn history_position(&self) -> usize {
        self.history.lock().position()
    }

    /// Snapshot of the live pattern
    pub fn pattern(&self) -> Pattern {
        self.shared.pattern.read().clone()
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        self.shared.transport.lock().running = false;
        self.join_worker();
        if let Err(e) = self.save() {
            log::error!("Failed to write pattern: {:#}", e);
        }
    }
}

/// Timing loop: one iteration per step boundary while running
fn run_loop(
    shared: Arc<Shared>,
    player: Arc<dyn SamplePlayer>,
    generation: u64,
    wake: Receiver<()>,
) {
    let mut clock = Clock::new(shared.bpm(), Instant::now());

    loop {
        if clock.sync_bpm(shared.bpm()) {
            log::debug!(
                "Tempo now {} BPM ({:?} per step)",
                clock.bpm(),
                clock.step_duration()
            );
        }
        let deadline = clock.schedule_next();

        let Some(step) = shared.advance_step(generation) else {
            break;
        };

        let column = shared.pattern.read().column(step);
        for (track, _) in column.iter().enumerate().filter(|(_, on)| **on) {
            player.play_sample(track);
        }

        if !shared.is_live(generation) {
            break;
        }

        match wake.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) | Ok(()) => {}
            Err(RecvTimeoutError::Disconnected) => {
                // Woken by stop/pause; only keep time if we are somehow still live
                if shared.is_live(generation) {
                    thread::sleep(deadline.saturating_duration_since(Instant::now()));
                }
            }
        }
    }
}
