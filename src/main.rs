use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use drumoxide::app::{App, AppConfig};
use drumoxide::fx::delay::{DEFAULT_DELAY_MS, DEFAULT_FEEDBACK};
use drumoxide::project::MAIN_PATTERN_FILE;
use drumoxide::sequencer::{DEFAULT_BPM, TRACKS};

/// Drumoxide - 9-track, 32-step sample drum machine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pattern file, loaded at startup and written back on exit
    #[arg(long, default_value = MAIN_PATTERN_FILE)]
    pattern: PathBuf,

    /// Directory holding the nine WAV samples
    #[arg(long, default_value = "./samples")]
    samples: PathBuf,

    /// Starting tempo
    #[arg(long, default_value_t = DEFAULT_BPM)]
    bpm: u32,

    /// Delay time in milliseconds
    #[arg(long, default_value_t = DEFAULT_DELAY_MS)]
    delay_time: u32,

    /// Delay feedback amount
    #[arg(long, default_value_t = DEFAULT_FEEDBACK)]
    delay_feedback: f32,

    /// Route a track (1-9) into the delay; repeatable
    #[arg(long = "delay-channel", value_parser = clap::value_parser!(u8).range(1..=TRACKS as i64))]
    delay_channels: Vec<u8>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = AppConfig {
        pattern_path: args.pattern,
        samples_dir: args.samples,
        bpm: args.bpm,
        delay_time_ms: args.delay_time,
        delay_feedback: args.delay_feedback,
        delay_channels: args.delay_channels.iter().map(|&t| t as usize - 1).collect(),
    };

    let mut app = App::new(&config)?;
    app.run()
}
