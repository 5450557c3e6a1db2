use std::time::{Duration, Instant};

pub const DEFAULT_BPM: u32 = 120;
pub const MIN_BPM: u32 = 1;
pub const MAX_BPM: u32 = 999;

/// Sixteenth notes: 4 steps per beat
pub const STEPS_PER_BEAT: u32 = 4;

/// Length of one step at the given tempo
pub fn step_duration(bpm: u32) -> Duration {
    let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
    Duration::from_secs_f64(60.0 / (bpm * STEPS_PER_BEAT) as f64)
}

/// Wall-clock step scheduler for the timing thread.
///
/// Deadlines accumulate (`next += step`) instead of sleeping a fixed amount,
/// so time spent dispatching triggers does not drift the grid.
pub struct Clock {
    bpm: u32,
    step_duration: Duration,
    next_tick: Instant,
}

impl Clock {
    pub fn new(bpm: u32, start: Instant) -> Self {
        let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        Self {
            bpm,
            step_duration: step_duration(bpm),
            next_tick: start,
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn step_duration(&self) -> Duration {
        self.step_duration
    }

    /// Pick up a tempo change. Takes effect from the next scheduled step.
    /// Returns true if the step length was recomputed.
    pub fn sync_bpm(&mut self, bpm: u32) -> bool {
        let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        if bpm == self.bpm {
            return false;
        }
        self.bpm = bpm;
        self.step_duration = step_duration(bpm);
        true
    }

    /// Advance to the next step boundary and return its deadline
    pub fn schedule_next(&mut self) -> Instant {
        self.next_tick += self.step_duration;
        self.next_tick
    }
}
