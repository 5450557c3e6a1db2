use thiserror::Error;

pub const STEPS: usize = 32;
pub const TRACKS: usize = 9;

/// Sample slot names, in track order
pub const TRACK_NAMES: [&str; TRACKS] = [
    "KICK", "SNARE", "OPEN HAT", "CRASH", "CLAVE", "RIDE", "TOM HI", "TOM LO", "CLAP",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("expected {TRACKS} tracks, found {0}")]
    MissingTracks(usize),
    #[error("track {track} has {len} steps, expected at least {STEPS}")]
    ShortTrack { track: usize, len: usize },
    #[error("track {track} step {step}: invalid trigger '{found}'")]
    InvalidTrigger {
        track: usize,
        step: usize,
        found: char,
    },
}

/// Fixed 9x32 grid of on/off triggers
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pattern {
    /// steps[track][step]
    steps: [[bool; STEPS]; TRACKS],
}

impl Pattern {
    pub fn new() -> Self {
        Self {
            steps: [[false; STEPS]; TRACKS],
        }
    }

    /// Toggle a trigger, returning its new state
    pub fn toggle(&mut self, track: usize, step: usize) -> bool {
        if track < TRACKS && step < STEPS {
            self.steps[track][step] = !self.steps[track][step];
            self.steps[track][step]
        } else {
            false
        }
    }

    pub fn set(&mut self, track: usize, step: usize, value: bool) {
        if track < TRACKS && step < STEPS {
            self.steps[track][step] = value;
        }
    }

    pub fn get(&self, track: usize, step: usize) -> bool {
        if track < TRACKS && step < STEPS {
            self.steps[track][step]
        } else {
            false
        }
    }

    /// Triggers of every track at one step
    pub fn column(&self, step: usize) -> [bool; TRACKS] {
        let mut column = [false; TRACKS];
        if step < STEPS {
            for (track, on) in column.iter_mut().enumerate() {
                *on = self.steps[track][step];
            }
        }
        column
    }

    pub fn is_empty(&self) -> bool {
        self.steps.iter().flatten().all(|on| !on)
    }

    pub fn active_count(&self) -> usize {
        self.steps.iter().flatten().filter(|on| **on).count()
    }

    pub fn clear_all(&mut self) {
        self.steps = [[false; STEPS]; TRACKS];
    }

    /// Parse the persisted text form: one line per track, 32 `0`/`1` tokens each.
    /// Characters past the 32nd on a line are ignored.
    pub fn from_text(text: &str) -> Result<Self, PatternError> {
        let mut pattern = Self::new();
        let mut lines = text.lines();
        for track in 0..TRACKS {
            let line = lines.next().ok_or(PatternError::MissingTracks(track))?;
            let mut chars = line.chars();
            for step in 0..STEPS {
                let c = chars.next().ok_or(PatternError::ShortTrack {
                    track,
                    len: step,
                })?;
                pattern.steps[track][step] = match c {
                    '0' => false,
                    '1' => true,
                    found => {
                        return Err(PatternError::InvalidTrigger { track, step, found });
                    }
                };
            }
        }
        Ok(pattern)
    }

    /// Render the persisted text form, newline-terminated per track
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(TRACKS * (STEPS + 1));
        for track in &self.steps {
            for &on in track {
                out.push(if on { '1' } else { '0' });
            }
            out.push('\n');
        }
        out
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new()
    }
}
