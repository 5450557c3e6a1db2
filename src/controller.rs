use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::audio::SamplePlayer;
use crate::command::{Command, USAGE};
use crate::fx::DelayEffect;
use crate::sequencer::{Pattern, Sequencer, UndoAction, STEPS, TRACKS, TRACK_NAMES};

/// What the front end should do after a command
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Done,
    Message(String),
    Quit,
}

/// Serializable snapshot of transport, tempo, delay and history state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub running: bool,
    pub paused: bool,
    pub recording: bool,
    pub rec_mode: bool,
    /// 1-based, None while stopped
    pub step: Option<usize>,
    pub bpm: u32,
    pub delay_time_ms: u32,
    pub delay_feedback: f32,
    pub delay_channels: Vec<usize>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub history_len: usize,
    pub history_position: usize,
}

/// Applies commands to the sequencer and delay the way the front panel does:
/// transport buttons, pads, step keys, tempo and delay knobs.
pub struct Controller {
    sequencer: Sequencer,
    delay: DelayEffect,
    player: Arc<dyn SamplePlayer>,
}

impl Controller {
    pub fn new(sequencer: Sequencer, delay: DelayEffect, player: Arc<dyn SamplePlayer>) -> Self {
        Self {
            sequencer,
            delay,
            player,
        }
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn delay(&self) -> &DelayEffect {
        &self.delay
    }

    pub fn apply(&self, cmd: &Command) -> Result<Response> {
        let seq = &self.sequencer;
        let response = match *cmd {
            Command::Play => {
                self.play();
                Response::Done
            }
            Command::Record => {
                self.record();
                Response::Done
            }
            Command::Pause => {
                self.pause();
                Response::Done
            }
            Command::Toggle => {
                self.toggle();
                Response::Done
            }
            Command::Stop => {
                seq.stop();
                Response::Done
            }
            Command::SetBpm(bpm) => bpm_message(seq.set_bpm(bpm)),
            Command::SpeedUp(delta) => bpm_message(seq.speed_up(delta)),
            Command::SlowDown(delta) => bpm_message(seq.slow_down(delta)),
            Command::NextStep => {
                seq.next_step();
                self.sync_edit_mode()
            }
            Command::PrevStep => {
                seq.prev_step();
                self.sync_edit_mode()
            }
            Command::ToggleTrig { track, step } => {
                let value = !seq.trig(track, step);
                seq.set_trig(track, step, value, true);
                Response::Done
            }
            Command::SetTrig { track, step, value } => {
                seq.set_trig(track, step, value, true);
                Response::Done
            }
            Command::Tap { track, erase } => self.tap(track, erase),
            Command::ClearPattern => {
                if seq.clear_pattern() {
                    Response::Done
                } else {
                    Response::Message("Nothing to clear".to_string())
                }
            }
            Command::Undo => history_message("Undo", seq.undo()),
            Command::Redo => history_message("Redo", seq.redo()),
            Command::DelayTime(ms) => delay_time_message(self.delay.set_time(ms)),
            Command::DelayTimeBy(delta) => delay_time_message(self.delay.increase_time(delta)),
            Command::DelayFeedback(fb) => feedback_message(self.delay.set_feedback(fb)),
            Command::DelayFeedbackBy(delta) => {
                feedback_message(self.delay.increase_feedback(delta))
            }
            Command::ToggleDelayChannel(track) => {
                let enabled = !self.delay.channel_enabled(track);
                self.delay.enable_channel(track, enabled);
                Response::Message(format!(
                    "Delay on {}: {}",
                    TRACK_NAMES.get(track).copied().unwrap_or("?"),
                    if enabled { "on" } else { "off" }
                ))
            }
            Command::Status => Response::Message(serde_json::to_string_pretty(&self.status())?),
            Command::Show => Response::Message(render_grid(&seq.pattern(), seq.current_step())),
            Command::Save => {
                seq.save()?;
                match seq.pattern_path() {
                    Some(path) => Response::Message(format!("Saved {}", path.display())),
                    None => Response::Message("No pattern file to save to".to_string()),
                }
            }
            Command::Help => Response::Message(USAGE.to_string()),
            Command::Quit => Response::Quit,
        };
        Ok(response)
    }

    /// Play button
    pub fn play(&self) {
        let seq = &self.sequencer;
        if seq.is_running() {
            if seq.rec_mode() {
                seq.set_recording(false);
            } else {
                seq.stop();
            }
        } else if seq.is_paused() && !seq.rec_mode() {
            seq.stop();
        } else {
            seq.start();
        }
    }

    /// Record button
    pub fn record(&self) {
        let seq = &self.sequencer;
        if seq.is_running() {
            if seq.rec_mode() {
                seq.stop();
            } else {
                seq.set_recording(true);
            }
        } else if seq.is_paused() && seq.rec_mode() {
            seq.stop();
        } else {
            seq.start_recording();
        }
    }

    /// Pause button: pauses a running loop, resumes a paused one
    pub fn pause(&self) {
        let seq = &self.sequencer;
        if seq.is_running() {
            seq.pause();
        } else if seq.is_paused() {
            if seq.rec_mode() {
                seq.start_recording();
            } else {
                seq.start();
            }
        }
    }

    /// Space bar
    pub fn toggle(&self) {
        let seq = &self.sequencer;
        if seq.is_running() {
            seq.stop();
        } else if seq.is_paused() && seq.rec_mode() {
            seq.start_recording();
        } else {
            seq.start();
        }
    }

    /// Pad hit: the sample always sounds, and lands in the pattern when recording
    fn tap(&self, track: usize, erase: bool) -> Response {
        if track >= TRACKS {
            return Response::Message(format!("No track {}", track));
        }
        self.player.play_sample(track);
        if let Some(step) = self.sequencer.record_hit(track, erase) {
            log::debug!("Recorded {} at step {}", TRACK_NAMES[track], step + 1);
        }
        Response::Done
    }

    /// Manual stepping while stopped enters edit mode; stepping back to the
    /// stopped position leaves it
    fn sync_edit_mode(&self) -> Response {
        let seq = &self.sequencer;
        if !seq.is_running() {
            seq.set_edit_mode(seq.current_step().is_some());
        }
        match seq.current_step() {
            Some(step) => Response::Message(format!("Step {}", step + 1)),
            None => Response::Message("Stopped".to_string()),
        }
    }

    pub fn status(&self) -> Status {
        let seq = &self.sequencer;
        Status {
            running: seq.is_running(),
            paused: seq.is_paused(),
            recording: seq.is_recording(),
            rec_mode: seq.rec_mode(),
            step: seq.current_step().map(|s| s + 1),
            bpm: seq.bpm(),
            delay_time_ms: self.delay.time(),
            delay_feedback: self.delay.feedback(),
            delay_channels: (0..TRACKS)
                .filter(|&t| self.delay.channel_enabled(t))
                .map(|t| t + 1)
                .collect(),
            can_undo: seq.can_undo(),
            can_redo: seq.can_redo(),
            history_len: seq.history_len(),
            history_position: seq.history_position(),
        }
    }
}

fn bpm_message(bpm: u32) -> Response {
    Response::Message(format!("{} BPM", bpm))
}

fn delay_time_message(ms: u32) -> Response {
    Response::Message(format!("Delay time {} ms", ms))
}

fn feedback_message(feedback: f32) -> Response {
    Response::Message(format!("Delay feedback {:.2}", feedback))
}

fn history_message(verb: &str, action: UndoAction) -> Response {
    if action.is_none() {
        Response::Message(format!("Nothing to {}", verb.to_lowercase()))
    } else {
        Response::Message(format!("{}: {}", verb, action.description()))
    }
}

const NAME_WIDTH: usize = 10;

/// Text grid: one row per track, `x` for a trigger, bars of four steps,
/// with a caret under the cursor step
pub fn render_grid(pattern: &Pattern, cursor: Option<usize>) -> String {
    let mut out = String::new();
    for (track, name) in TRACK_NAMES.iter().enumerate() {
        out.push_str(&format!("{:<width$}", name, width = NAME_WIDTH));
        for step in 0..STEPS {
            if step > 0 && step % 4 == 0 {
                out.push(' ');
            }
            out.push(if pattern.get(track, step) { 'x' } else { '.' });
        }
        out.push('\n');
    }
    if let Some(step) = cursor {
        out.push_str(&" ".repeat(NAME_WIDTH + step + step / 4));
        out.push('^');
        out.push('\n');
    }
    out
}
