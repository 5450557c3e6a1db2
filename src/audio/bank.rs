use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};

use super::frame::{frames_from_interleaved, Frame};
use crate::sequencer::TRACKS;

/// File names looked up in the samples directory, in track order
pub const SAMPLE_FILES: [&str; TRACKS] = [
    "kick.wav",
    "snare.wav",
    "open_hat.wav",
    "crash.wav",
    "clave.wav",
    "ride.wav",
    "tom_hi.wav",
    "tom_lo.wav",
    "clap.wav",
];

/// The nine one-shot samples, as stereo frames at the output sample rate
pub struct SampleBank {
    samples: [Arc<[Frame]>; TRACKS],
}

impl SampleBank {
    /// Load every track's sample from `dir`. Any missing or empty file fails the whole bank.
    pub fn load_dir(dir: &Path, sample_rate: u32) -> Result<Self> {
        let mut samples: Vec<Arc<[Frame]>> = Vec::with_capacity(TRACKS);
        for name in SAMPLE_FILES {
            let path = dir.join(name);
            let frames = load_wav(&path, sample_rate)?;
            log::debug!("Loaded {} ({} frames)", path.display(), frames.len());
            samples.push(frames.into());
        }
        let samples = samples
            .try_into()
            .map_err(|_| anyhow!("Expected {} samples", TRACKS))?;
        Ok(Self { samples })
    }

    pub fn get(&self, track: usize) -> Option<&Arc<[Frame]>> {
        self.samples.get(track)
    }

    pub fn samples(&self) -> [Arc<[Frame]>; TRACKS] {
        self.samples.clone()
    }
}

/// Load a WAV file as stereo 16-bit frames at the target sample rate
pub fn load_wav(path: &Path, target_sr: u32) -> Result<Vec<Frame>> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV: {}", path.display()))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    // Normalise everything to i16 before grouping into frames
    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let shift = spec.bits_per_sample.saturating_sub(16) as u32;
            let widen = 16u16.saturating_sub(spec.bits_per_sample) as u32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| ((s >> shift) << widen) as i16)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)
            .collect(),
    };

    let frames = frames_from_interleaved(&samples, channels);
    if frames.is_empty() {
        bail!("WAV file is empty: {}", path.display());
    }

    Ok(resample(&frames, spec.sample_rate, target_sr))
}

/// Linear-interpolation resample
fn resample(frames: &[Frame], from_sr: u32, to_sr: u32) -> Vec<Frame> {
    if from_sr == to_sr || from_sr == 0 || to_sr == 0 {
        return frames.to_vec();
    }
    let ratio = from_sr as f64 / to_sr as f64;
    let new_len = (frames.len() as f64 / ratio) as usize;
    let lerp = |a: i16, b: i16, t: f64| (a as f64 + (b as f64 - a as f64) * t).round() as i16;
    (0..new_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = pos - idx as f64;
            let f0 = frames.get(idx).copied().unwrap_or_default();
            let f1 = frames.get(idx + 1).copied().unwrap_or(f0);
            Frame::new(lerp(f0.left, f1.left, frac), lerp(f0.right, f1.right, frac))
        })
        .collect()
}
