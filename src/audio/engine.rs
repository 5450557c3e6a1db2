use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::bank::SampleBank;
use super::frame::Frame;
use super::voice::VoiceMixer;
use super::SamplePlayer;
use crate::fx::{DelayEffect, DelayProcessor};

/// Pending trigger requests between the timing thread and the audio callback
const TRIGGER_CAPACITY: usize = 256;

/// Frames preallocated for the callback scratch buffer
const SCRATCH_FRAMES: usize = 4096;

/// Owns the output stream. Dropping it stops playback.
pub struct AudioEngine {
    _stream: Stream,
    sample_rate: u32,
    output: Arc<AudioOutput>,
}

impl AudioEngine {
    /// Open the default output device and load the sample bank at its rate
    pub fn new(samples_dir: &Path) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No output device available")?;

        let config = device
            .default_output_config()
            .context("Failed to query output config")?;
        let sample_rate = config.sample_rate().0;

        let bank = SampleBank::load_dir(samples_dir, sample_rate)
            .with_context(|| format!("Failed to load samples from {}", samples_dir.display()))?;
        let (delay, processor) = DelayEffect::new(sample_rate);
        let (trigger_tx, trigger_rx) = bounded(TRIGGER_CAPACITY);
        let mixer = VoiceMixer::new(bank.samples());

        let stream = match config.sample_format() {
            SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.into(), mixer, processor, trigger_rx)?
            }
            SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.into(), mixer, processor, trigger_rx)?
            }
            SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.into(), mixer, processor, trigger_rx)?
            }
            format => anyhow::bail!("Unsupported sample format: {:?}", format),
        };

        stream.play().context("Failed to start output stream")?;
        log::info!("Audio output running at {} Hz", sample_rate);

        Ok(Self {
            _stream: stream,
            sample_rate,
            output: Arc::new(AudioOutput {
                bank,
                delay,
                triggers: trigger_tx,
            }),
        })
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        mut mixer: VoiceMixer,
        mut processor: DelayProcessor,
        trigger_rx: Receiver<usize>,
    ) -> Result<Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut scratch = vec![Frame::SILENT; SCRATCH_FRAMES];

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                while let Ok(track) = trigger_rx.try_recv() {
                    mixer.trigger(track);
                }

                fill_output(data, channels, &mut scratch, &mut mixer, &mut processor);
            },
            |err| log::error!("Audio stream error: {}", err),
            None,
        )?;

        Ok(stream)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shared handle the sequencer and controller use to make sound
    pub fn output(&self) -> Arc<AudioOutput> {
        self.output.clone()
    }

    pub fn delay(&self) -> DelayEffect {
        self.output.delay.clone()
    }
}

/// Render voices and the delay into an interleaved device buffer, in chunks
/// no longer than `scratch` so the callback never allocates
fn fill_output<T>(
    data: &mut [T],
    channels: usize,
    scratch: &mut [Frame],
    mixer: &mut VoiceMixer,
    processor: &mut DelayProcessor,
) where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = channels.max(1);
    if scratch.is_empty() {
        return;
    }
    for chunk in data.chunks_mut(scratch.len() * channels) {
        let buf = &mut scratch[..chunk.len() / channels];
        mixer.render(buf);
        processor.process(buf);

        for (out, frame) in chunk.chunks_mut(channels).zip(buf.iter()) {
            let (left, right) = frame.to_f32();
            for (ch, sample) in out.iter_mut().enumerate() {
                let value = match ch {
                    0 => left,
                    1 => right,
                    _ => (left + right) * 0.5,
                };
                *sample = T::from_sample(value);
            }
        }
    }
}

/// Thread-safe front of the audio engine: queues triggers for the callback
/// and feeds delay-enabled tracks into the delay line.
pub struct AudioOutput {
    bank: SampleBank,
    delay: DelayEffect,
    triggers: Sender<usize>,
}

impl SamplePlayer for AudioOutput {
    fn play_sample(&self, track: usize) {
        let Some(sample) = self.bank.get(track) else {
            return;
        };
        self.delay.enqueue(track, sample);
        match self.triggers.try_send(track) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::warn!("Trigger queue full, dropping track {}", track),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
