use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};

use crate::audio::{AudioEngine, SamplePlayer};
use crate::command::{Command, CommandBus, CommandSender, USAGE};
use crate::controller::{Controller, Response};
use crate::sequencer::Sequencer;

/// Startup settings, resolved from the command line
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub pattern_path: PathBuf,
    pub samples_dir: PathBuf,
    pub bpm: u32,
    pub delay_time_ms: u32,
    pub delay_feedback: f32,
    /// 0-based tracks routed into the delay
    pub delay_channels: Vec<usize>,
}

/// Application state
pub struct App {
    /// Dropped first so the pattern is saved while audio is still up
    controller: Controller,
    bus: CommandBus,
    _audio: AudioEngine,
}

impl App {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let audio = AudioEngine::new(&config.samples_dir)?;
        let player: Arc<dyn SamplePlayer> = audio.output();
        let delay = audio.delay();

        let sequencer = Sequencer::open(player.clone(), config.pattern_path.clone());
        sequencer.set_bpm(config.bpm);
        delay.set_time(config.delay_time_ms);
        delay.set_feedback(config.delay_feedback);
        for &track in &config.delay_channels {
            delay.enable_channel(track, true);
        }
        log::info!(
            "{} Hz, {} BPM, delay {} ms / {:.2}",
            audio.sample_rate(),
            sequencer.bpm(),
            delay.time(),
            delay.feedback()
        );

        Ok(Self {
            controller: Controller::new(sequencer, delay, player),
            bus: CommandBus::new(),
            _audio: audio,
        })
    }

    /// Read console commands until `quit` or end of input
    pub fn run(&mut self) -> Result<()> {
        spawn_console(self.bus.sender())?;
        println!("{}", USAGE);

        while let Some(cmd) = self.bus.recv() {
            log::debug!("{}", cmd.description());
            match self.controller.apply(&cmd) {
                Ok(Response::Done) => {}
                Ok(Response::Message(msg)) => println!("{}", msg),
                Ok(Response::Quit) => break,
                Err(e) => log::warn!("{} failed: {:#}", cmd.description(), e),
            }
        }

        self.controller.sequencer().stop();
        Ok(())
    }
}

/// Parse stdin lines on their own thread so the main loop only sees commands.
/// End of input is treated as `quit`.
fn spawn_console(sender: CommandSender) -> Result<()> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(cmd) => {
                        sender.send(cmd);
                    }
                    Err(e) => eprintln!("{} (type 'help')", e),
                }
            }
            sender.send_blocking(Command::Quit);
        })
        .context("Failed to spawn console thread")?;
    Ok(())
}
