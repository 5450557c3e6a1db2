use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sequencer::{STEPS, TRACKS, TRACK_NAMES};

/// Step used by `faster` / `slower` without an argument
pub const DEFAULT_BPM_DELTA: u32 = 10;
/// Step used by `delay time up` / `delay time down`
pub const DELAY_TIME_DELTA_MS: i32 = 20;
/// Step used by `delay feedback up` / `delay feedback down`
pub const DELAY_FEEDBACK_DELTA: f32 = 0.1;

/// Console command reference
pub const USAGE: &str = "\
transport   play | rec | pause | space | stop
tempo       bpm <n> | faster [n] | slower [n]
cursor      next | prev
pattern     trig <track> <step> | set <track> <step> on|off
pads        tap <track> | erase <track>
history     clear | undo | redo
delay       delay time <ms>|up|down | delay feedback <f>|up|down | delay channel <track>
console     show | status | save | help | quit
tracks are 1-9 or kick, snare, open_hat, crash, clave, ride, tom_hi, tom_lo, clap; steps are 1-32";

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("invalid {argument} '{value}'")]
    InvalidArgument {
        argument: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    // Transport buttons
    Play,
    Record,
    Pause,
    /// Space bar
    Toggle,
    Stop,

    // Tempo
    SetBpm(u32),
    SpeedUp(u32),
    SlowDown(u32),

    // Cursor
    NextStep,
    PrevStep,

    // Pattern
    ToggleTrig { track: usize, step: usize },
    SetTrig { track: usize, step: usize, value: bool },
    /// Pad hit; `erase` clears the trigger under the cursor instead of setting it
    Tap { track: usize, erase: bool },
    ClearPattern,
    Undo,
    Redo,

    // Delay
    DelayTime(u32),
    DelayTimeBy(i32),
    DelayFeedback(f32),
    DelayFeedbackBy(f32),
    ToggleDelayChannel(usize),

    // Console
    Status,
    Show,
    Save,
    Help,
    Quit,
}

impl Command {
    /// Parse one console line, e.g. `trig kick 4`, `bpm 140`, `delay time up`
    pub fn parse(line: &str) -> Result<Command, ParseError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(ParseError::Empty);
        };
        let args: Vec<&str> = words.collect();
        let arg = |i: usize, command: &'static str, argument: &'static str| {
            args.get(i)
                .copied()
                .ok_or(ParseError::MissingArgument { command, argument })
        };

        let cmd = match head.to_ascii_lowercase().as_str() {
            "play" => Command::Play,
            "rec" | "record" => Command::Record,
            "pause" => Command::Pause,
            "space" | "toggle" => Command::Toggle,
            "stop" => Command::Stop,
            "bpm" => Command::SetBpm(parse_number(arg(0, "bpm", "a tempo")?, "tempo")?),
            "faster" => Command::SpeedUp(optional_delta(args.first().copied())?),
            "slower" => Command::SlowDown(optional_delta(args.first().copied())?),
            "next" => Command::NextStep,
            "prev" => Command::PrevStep,
            "trig" => Command::ToggleTrig {
                track: parse_track(arg(0, "trig", "a track")?)?,
                step: parse_step(arg(1, "trig", "a step")?)?,
            },
            "set" => Command::SetTrig {
                track: parse_track(arg(0, "set", "a track")?)?,
                step: parse_step(arg(1, "set", "a step")?)?,
                value: parse_switch(arg(2, "set", "on or off")?)?,
            },
            "tap" => Command::Tap {
                track: parse_track(arg(0, "tap", "a track")?)?,
                erase: false,
            },
            "erase" => Command::Tap {
                track: parse_track(arg(0, "erase", "a track")?)?,
                erase: true,
            },
            "clear" => Command::ClearPattern,
            "undo" => Command::Undo,
            "redo" => Command::Redo,
            "delay" => parse_delay(&args)?,
            "status" => Command::Status,
            "show" => Command::Show,
            "save" => Command::Save,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }

    /// Human-readable description of the command
    pub fn description(&self) -> String {
        match self {
            Command::Play => "Play".to_string(),
            Command::Record => "Record".to_string(),
            Command::Pause => "Pause".to_string(),
            Command::Toggle => "Toggle play".to_string(),
            Command::Stop => "Stop".to_string(),
            Command::SetBpm(bpm) => format!("Set BPM to {}", bpm),
            Command::SpeedUp(delta) => format!("Speed up by {} BPM", delta),
            Command::SlowDown(delta) => format!("Slow down by {} BPM", delta),
            Command::NextStep => "Next step".to_string(),
            Command::PrevStep => "Previous step".to_string(),
            Command::ToggleTrig { track, step } => {
                format!("Toggle {} step {}", track_name(*track), step + 1)
            }
            Command::SetTrig { track, step, value } => format!(
                "Set {} step {} {}",
                track_name(*track),
                step + 1,
                if *value { "on" } else { "off" }
            ),
            Command::Tap { track, erase: false } => format!("Tap {}", track_name(*track)),
            Command::Tap { track, erase: true } => format!("Erase {}", track_name(*track)),
            Command::ClearPattern => "Clear pattern".to_string(),
            Command::Undo => "Undo".to_string(),
            Command::Redo => "Redo".to_string(),
            Command::DelayTime(ms) => format!("Set delay time to {} ms", ms),
            Command::DelayTimeBy(delta) => format!("Change delay time by {:+} ms", delta),
            Command::DelayFeedback(fb) => format!("Set delay feedback to {:.2}", fb),
            Command::DelayFeedbackBy(delta) => format!("Change delay feedback by {:+.2}", delta),
            Command::ToggleDelayChannel(track) => {
                format!("Toggle delay send on {}", track_name(*track))
            }
            Command::Status => "Status".to_string(),
            Command::Show => "Show pattern".to_string(),
            Command::Save => "Save pattern".to_string(),
            Command::Help => "Help".to_string(),
            Command::Quit => "Quit".to_string(),
        }
    }
}

fn track_name(track: usize) -> &'static str {
    TRACK_NAMES.get(track).copied().unwrap_or("?")
}

fn parse_number<T: std::str::FromStr>(word: &str, argument: &'static str) -> Result<T, ParseError> {
    word.parse().map_err(|_| ParseError::InvalidArgument {
        argument,
        value: word.to_string(),
    })
}

fn optional_delta(word: Option<&str>) -> Result<u32, ParseError> {
    word.map_or(Ok(DEFAULT_BPM_DELTA), |w| parse_number(w, "tempo change"))
}

/// Tracks are given by number (1-9) or by name, spaces written as underscores
fn parse_track(word: &str) -> Result<usize, ParseError> {
    if let Ok(n) = word.parse::<usize>() {
        if (1..=TRACKS).contains(&n) {
            return Ok(n - 1);
        }
    }
    let name = word.replace('_', " ").to_ascii_uppercase();
    TRACK_NAMES
        .iter()
        .position(|t| *t == name)
        .ok_or(ParseError::InvalidArgument {
            argument: "track",
            value: word.to_string(),
        })
}

/// Steps are 1-based on the console
fn parse_step(word: &str) -> Result<usize, ParseError> {
    match word.parse::<usize>() {
        Ok(n) if (1..=STEPS).contains(&n) => Ok(n - 1),
        _ => Err(ParseError::InvalidArgument {
            argument: "step",
            value: word.to_string(),
        }),
    }
}

fn parse_switch(word: &str) -> Result<bool, ParseError> {
    match word.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Ok(true),
        "off" | "0" | "false" => Ok(false),
        _ => Err(ParseError::InvalidArgument {
            argument: "switch",
            value: word.to_string(),
        }),
    }
}

fn parse_delay(args: &[&str]) -> Result<Command, ParseError> {
    let missing = |argument| ParseError::MissingArgument {
        command: "delay",
        argument,
    };
    let what = args.first().ok_or(missing("time, feedback or channel"))?;
    let value = args.get(1).copied();
    match *what {
        "time" => match value.ok_or(missing("a time in ms"))? {
            "up" => Ok(Command::DelayTimeBy(DELAY_TIME_DELTA_MS)),
            "down" => Ok(Command::DelayTimeBy(-DELAY_TIME_DELTA_MS)),
            ms => Ok(Command::DelayTime(parse_number(ms, "delay time")?)),
        },
        "feedback" => match value.ok_or(missing("a feedback amount"))? {
            "up" => Ok(Command::DelayFeedbackBy(DELAY_FEEDBACK_DELTA)),
            "down" => Ok(Command::DelayFeedbackBy(-DELAY_FEEDBACK_DELTA)),
            fb => Ok(Command::DelayFeedback(parse_number(fb, "delay feedback")?)),
        },
        "channel" => Ok(Command::ToggleDelayChannel(parse_track(
            value.ok_or(missing("a track"))?,
        )?)),
        other => Err(ParseError::InvalidArgument {
            argument: "delay setting",
            value: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transport() {
        assert_eq!(Command::parse("play"), Ok(Command::Play));
        assert_eq!(Command::parse("  REC "), Ok(Command::Record));
        assert_eq!(Command::parse("space"), Ok(Command::Toggle));
        assert_eq!(Command::parse("exit"), Ok(Command::Quit));
    }

    #[test]
    fn test_parse_tracks_by_number_and_name() {
        assert_eq!(
            Command::parse("trig 1 1"),
            Ok(Command::ToggleTrig { track: 0, step: 0 })
        );
        assert_eq!(
            Command::parse("trig open_hat 32"),
            Ok(Command::ToggleTrig { track: 2, step: 31 })
        );
        assert_eq!(
            Command::parse("erase tom_lo"),
            Ok(Command::Tap { track: 7, erase: true })
        );
        assert_eq!(
            Command::parse("set clap 4 on"),
            Ok(Command::SetTrig {
                track: 8,
                step: 3,
                value: true
            })
        );
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(matches!(
            Command::parse("trig 10 1"),
            Err(ParseError::InvalidArgument { argument: "track", .. })
        ));
        assert!(matches!(
            Command::parse("trig kick 33"),
            Err(ParseError::InvalidArgument { argument: "step", .. })
        ));
        assert!(matches!(
            Command::parse("trig kick 0"),
            Err(ParseError::InvalidArgument { argument: "step", .. })
        ));
        assert!(matches!(
            Command::parse("trig kick"),
            Err(ParseError::MissingArgument { command: "trig", .. })
        ));
    }

    #[test]
    fn test_parse_tempo_and_delay() {
        assert_eq!(Command::parse("bpm 140"), Ok(Command::SetBpm(140)));
        assert_eq!(Command::parse("faster"), Ok(Command::SpeedUp(DEFAULT_BPM_DELTA)));
        assert_eq!(Command::parse("slower 10"), Ok(Command::SlowDown(10)));
        assert_eq!(Command::parse("delay time 300"), Ok(Command::DelayTime(300)));
        assert_eq!(Command::parse("delay time down"), Ok(Command::DelayTimeBy(-20)));
        assert_eq!(
            Command::parse("delay feedback up"),
            Ok(Command::DelayFeedbackBy(DELAY_FEEDBACK_DELTA))
        );
        assert_eq!(
            Command::parse("delay channel snare"),
            Ok(Command::ToggleDelayChannel(1))
        );
        assert!(Command::parse("bpm fast").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("   "), Err(ParseError::Empty));
        assert_eq!(
            Command::parse("dance"),
            Err(ParseError::Unknown("dance".to_string()))
        );
        assert_eq!(
            Command::parse("set kick 1 maybe").unwrap_err().to_string(),
            "invalid switch 'maybe'"
        );
    }

    #[test]
    fn test_description() {
        assert_eq!(
            Command::ToggleTrig { track: 0, step: 3 }.description(),
            "Toggle KICK step 4"
        );
        assert_eq!(Command::DelayTimeBy(-20).description(), "Change delay time by -20 ms");
    }
}
