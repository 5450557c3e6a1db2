use std::sync::Arc;

use super::frame::Frame;
use crate::sequencer::TRACKS;

/// One-shot playback of a sample
struct Voice {
    sample: Arc<[Frame]>,
    position: usize,
}

/// One voice per track; retriggering a track restarts its voice
pub struct VoiceMixer {
    samples: [Arc<[Frame]>; TRACKS],
    voices: [Option<Voice>; TRACKS],
}

impl VoiceMixer {
    pub fn new(samples: [Arc<[Frame]>; TRACKS]) -> Self {
        Self {
            samples,
            voices: Default::default(),
        }
    }

    pub fn trigger(&mut self, track: usize) {
        if track >= TRACKS || self.samples[track].is_empty() {
            return;
        }
        self.voices[track] = Some(Voice {
            sample: self.samples[track].clone(),
            position: 0,
        });
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().flatten().count()
    }

    /// Overwrite `out` with the sum of all playing voices
    pub fn render(&mut self, out: &mut [Frame]) {
        out.fill(Frame::SILENT);
        for slot in self.voices.iter_mut() {
            let Some(voice) = slot else {
                continue;
            };
            let remaining = &voice.sample[voice.position..];
            let n = remaining.len().min(out.len());
            for (dst, src) in out.iter_mut().zip(&remaining[..n]) {
                *dst = dst.saturating_add(*src);
            }
            voice.position += n;
            if voice.position >= voice.sample.len() {
                *slot = None;
            }
        }
    }
}
