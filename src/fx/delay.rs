// Feedback delay on the mixed output
//
// Split in two halves:
// - `DelayEffect`: cloneable control handle for the UI and timing threads.
//   Parameters live in atomics, enqueued samples travel over a bounded channel.
// - `DelayProcessor`: owned by the audio callback. It is the only writer of
//   the ring buffer, so the callback never takes a lock.

use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::audio::Frame;
use crate::sequencer::TRACKS;

/// Reference sample rate
pub const SAMPLE_RATE: u32 = 44_100;

pub const MIN_DELAY_MS: u32 = 20;
pub const MAX_DELAY_MS: u32 = 1000;
pub const DEFAULT_DELAY_MS: u32 = 250;

pub const MAX_FEEDBACK: f32 = 1.2;
pub const DEFAULT_FEEDBACK: f32 = 0.2;

/// Extra ring capacity beyond the longest delay
const HEADROOM_MS: u32 = 1000;

/// Pending enqueues between two audio callbacks
const PENDING_CAPACITY: usize = 64;

fn ms_to_frames(ms: u32, sample_rate: u32) -> usize {
    (sample_rate as u64 * ms as u64 / 1000) as usize
}

/// Circular buffer of frames, indexed strictly in frames
pub struct DelayLine {
    frames: Box<[Frame]>,
    write_index: usize,
}

impl DelayLine {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: vec![Frame::SILENT; capacity.max(1)].into_boxed_slice(),
            write_index: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    #[cfg(test)]
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Ring index `offset` frames ahead of the write cursor
    pub fn index_at(&self, offset: usize) -> usize {
        (self.write_index + offset % self.capacity()) % self.capacity()
    }

    #[cfg(test)]
    pub fn frame_at(&self, offset: usize) -> Frame {
        self.frames[self.index_at(offset)]
    }

    /// Take the frame `offset` ahead of the cursor, leaving silence
    fn take_at(&mut self, offset: usize) -> Frame {
        let index = self.index_at(offset);
        std::mem::take(&mut self.frames[index])
    }

    /// Mix `frames` into the ring starting `offset` frames ahead of the cursor
    pub fn mix_in(&mut self, offset: usize, frames: &[Frame]) {
        for (i, frame) in frames.iter().enumerate() {
            let index = self.index_at(offset + i);
            self.frames[index] = self.frames[index].saturating_add(*frame);
        }
    }

    pub fn advance(&mut self, frames: usize) {
        self.write_index = self.index_at(frames);
    }
}

/// Time and feedback packed into one word so the audio thread reads both
/// from the same update
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelaySettings {
    pub time_ms: u32,
    pub feedback: f32,
}

impl DelaySettings {
    fn pack(self) -> u64 {
        ((self.time_ms as u64) << 32) | self.feedback.to_bits() as u64
    }

    fn unpack(word: u64) -> Self {
        Self {
            time_ms: (word >> 32) as u32,
            feedback: f32::from_bits(word as u32),
        }
    }
}

struct DelayParams {
    settings: AtomicU64,
    /// One bit per track
    channels: AtomicU16,
}

impl DelayParams {
    fn load(&self) -> DelaySettings {
        DelaySettings::unpack(self.settings.load(Ordering::Acquire))
    }

    fn update(&self, f: impl Fn(DelaySettings) -> DelaySettings) -> DelaySettings {
        let previous = self
            .settings
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                Some(f(DelaySettings::unpack(word)).pack())
            })
            .unwrap_or_else(|word| word);
        f(DelaySettings::unpack(previous))
    }
}

fn clamp_time(ms: i64, max_ms: u32) -> u32 {
    ms.clamp(MIN_DELAY_MS as i64, max_ms as i64) as u32
}

fn clamp_feedback(feedback: f32) -> f32 {
    if feedback.is_nan() {
        0.0
    } else {
        feedback.clamp(0.0, MAX_FEEDBACK)
    }
}

/// Control handle: parameter setters and sample enqueue
#[derive(Clone)]
pub struct DelayEffect {
    params: Arc<DelayParams>,
    pending: Sender<Arc<[Frame]>>,
    sample_rate: u32,
    max_time_ms: u32,
    capacity: usize,
}

impl DelayEffect {
    /// Create the control handle and the audio-thread processor for one delay
    pub fn new(sample_rate: u32) -> (Self, DelayProcessor) {
        let capacity = ms_to_frames(MAX_DELAY_MS + HEADROOM_MS, sample_rate).max(2);
        // Never let a delay reach the full ring
        let max_time_ms = MAX_DELAY_MS.min(((capacity - 1) as u64 * 1000 / sample_rate.max(1) as u64) as u32);
        Self::with_capacity(sample_rate, capacity, max_time_ms)
    }

    fn with_capacity(sample_rate: u32, capacity: usize, max_time_ms: u32) -> (Self, DelayProcessor) {
        let params = Arc::new(DelayParams {
            settings: AtomicU64::new(
                DelaySettings {
                    time_ms: clamp_time(DEFAULT_DELAY_MS as i64, max_time_ms),
                    feedback: DEFAULT_FEEDBACK,
                }
                .pack(),
            ),
            channels: AtomicU16::new(0),
        });
        let (tx, rx) = bounded(PENDING_CAPACITY);
        let effect = Self {
            params: params.clone(),
            pending: tx,
            sample_rate,
            max_time_ms,
            capacity,
        };
        let processor = DelayProcessor {
            params,
            pending: rx,
            line: DelayLine::with_capacity(capacity),
            sample_rate,
        };
        (effect, processor)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Ring buffer capacity in frames
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Longest settable delay, always below the ring capacity
    pub fn max_time_ms(&self) -> u32 {
        self.max_time_ms
    }

    pub fn time(&self) -> u32 {
        self.params.load().time_ms
    }

    pub fn feedback(&self) -> f32 {
        self.params.load().feedback
    }

    /// Current delay length in frames, always below capacity
    pub fn delay_length(&self) -> usize {
        ms_to_frames(self.time(), self.sample_rate)
    }

    pub fn set_time(&self, ms: u32) -> u32 {
        let max = self.max_time_ms;
        self.params
            .update(|s| DelaySettings {
                time_ms: clamp_time(ms as i64, max),
                ..s
            })
            .time_ms
    }

    pub fn increase_time(&self, delta_ms: i32) -> u32 {
        let max = self.max_time_ms;
        self.params
            .update(|s| DelaySettings {
                time_ms: clamp_time(s.time_ms as i64 + delta_ms as i64, max),
                ..s
            })
            .time_ms
    }

    pub fn set_feedback(&self, feedback: f32) -> f32 {
        self.params
            .update(|s| DelaySettings {
                feedback: clamp_feedback(feedback),
                ..s
            })
            .feedback
    }

    pub fn increase_feedback(&self, delta: f32) -> f32 {
        self.params
            .update(|s| DelaySettings {
                // Round to hundredths so repeated 0.1 steps land on exact values
                feedback: clamp_feedback(((s.feedback + delta) * 100.0).round() / 100.0),
                ..s
            })
            .feedback
    }

    /// Route a track into the delay. Disabling does not flush audio
    /// already in the ring.
    pub fn enable_channel(&self, track: usize, enabled: bool) {
        if track >= TRACKS {
            return;
        }
        let bit = 1u16 << track;
        if enabled {
            self.params.channels.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.params.channels.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    pub fn channel_enabled(&self, track: usize) -> bool {
        track < TRACKS && self.params.channels.load(Ordering::Acquire) & (1u16 << track) != 0
    }

    /// Send a triggered track's raw sample into the delay, if its channel is
    /// enabled. It is mixed in `delay_length()` frames ahead of the write
    /// cursor at the next audio callback. Returns true if it was queued.
    pub fn enqueue(&self, track: usize, frames: &Arc<[Frame]>) -> bool {
        if !self.channel_enabled(track) || frames.is_empty() {
            return false;
        }
        match self.pending.try_send(frames.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Delay queue full, dropping track {} send", track);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Audio-thread half: owns the ring buffer
pub struct DelayProcessor {
    params: Arc<DelayParams>,
    pending: Receiver<Arc<[Frame]>>,
    line: DelayLine,
    sample_rate: u32,
}

impl DelayProcessor {
    #[cfg(test)]
    pub fn line(&self) -> &DelayLine {
        &self.line
    }

    /// Post-mix hook, once per output buffer.
    ///
    /// Each frame: the stored frame is attenuated by feedback, averaged with
    /// the live frame, and re-injected one delay length further on for the
    /// next repeat. The cursor then advances by the buffer length.
    pub fn process(&mut self, buffer: &mut [Frame]) {
        let settings = self.params.load();
        let delay_len = ms_to_frames(settings.time_ms, self.sample_rate)
            .clamp(1, self.line.capacity() - 1);

        // Only enqueue what fits once around the ring
        let max_len = self.line.capacity() - delay_len;
        while let Ok(sample) = self.pending.try_recv() {
            let len = sample.len().min(max_len);
            self.line.mix_in(delay_len, &sample[..len]);
        }

        for (i, out) in buffer.iter_mut().enumerate() {
            let delayed = self.line.take_at(i).scaled(settings.feedback);
            *out = Frame::average(*out, delayed);
            if !delayed.is_silent() {
                self.line.mix_in(i + delay_len, &[delayed]);
            }
        }
        self.line.advance(buffer.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(value: i16, len: usize) -> Arc<[Frame]> {
        vec![Frame::new(value, value); len].into()
    }

    #[test]
    fn test_ring_wraps_at_boundary() {
        let mut line = DelayLine::with_capacity(100);
        line.advance(99);
        assert_eq!(line.write_index(), 99);
        line.advance(10);
        assert_eq!(line.write_index(), 9);
        assert_eq!(line.index_at(95), 4);
        line.advance(1000);
        assert_eq!(line.write_index(), 9);
    }

    #[test]
    fn test_mix_in_wraps() {
        let mut line = DelayLine::with_capacity(8);
        line.advance(6);
        line.mix_in(1, &[Frame::new(1, 1); 4]);
        assert_eq!(line.frame_at(1), Frame::new(1, 1));
        assert_eq!(line.frames[7], Frame::new(1, 1));
        assert_eq!(line.frames[0], Frame::new(1, 1));
        assert_eq!(line.frames[2], Frame::new(1, 1));
        assert_eq!(line.frames[3], Frame::SILENT);
    }

    #[test]
    fn test_capacity_exceeds_longest_delay() {
        let (delay, processor) = DelayEffect::new(SAMPLE_RATE);
        assert_eq!(delay.capacity(), 88_200);
        assert_eq!(processor.line().capacity(), delay.capacity());
        assert_eq!(delay.max_time_ms(), MAX_DELAY_MS);

        for ms in [0, 1, 20, 250, 999, 1000, 1001, 5000, u32::MAX] {
            delay.set_time(ms);
            assert!(delay.delay_length() < delay.capacity(), "{} ms", ms);
        }
    }

    #[test]
    fn test_time_clamps() {
        let (delay, _) = DelayEffect::new(SAMPLE_RATE);
        assert_eq!(delay.time(), DEFAULT_DELAY_MS);
        assert_eq!(delay.set_time(5000), MAX_DELAY_MS);
        assert_eq!(delay.set_time(0), MIN_DELAY_MS);
        assert_eq!(delay.increase_time(20), MIN_DELAY_MS + 20);
        assert_eq!(delay.increase_time(-1000), MIN_DELAY_MS);
        assert_eq!(delay.delay_length(), 882);
    }

    #[test]
    fn test_feedback_clamps() {
        let (delay, _) = DelayEffect::new(SAMPLE_RATE);
        assert_eq!(delay.feedback(), DEFAULT_FEEDBACK);
        assert_eq!(delay.set_feedback(5.0), MAX_FEEDBACK);
        assert_eq!(delay.set_feedback(-1.0), 0.0);
        assert_eq!(delay.set_feedback(f32::NAN), 0.0);
        assert_eq!(delay.increase_feedback(0.1), 0.1);
        assert_eq!(delay.increase_feedback(0.1), 0.2);
        for _ in 0..20 {
            delay.increase_feedback(0.1);
        }
        assert_eq!(delay.feedback(), MAX_FEEDBACK);
        // Time is untouched by feedback edits
        assert_eq!(delay.time(), DEFAULT_DELAY_MS);
    }

    #[test]
    fn test_channel_mask() {
        let (delay, _) = DelayEffect::new(SAMPLE_RATE);
        assert!((0..TRACKS).all(|t| !delay.channel_enabled(t)));
        delay.enable_channel(0, true);
        delay.enable_channel(8, true);
        delay.enable_channel(TRACKS, true);
        assert!(delay.channel_enabled(0) && delay.channel_enabled(8));
        assert!(!delay.channel_enabled(4));
        assert!(!delay.channel_enabled(TRACKS));
        delay.enable_channel(0, false);
        assert!(!delay.channel_enabled(0));
        assert!(delay.channel_enabled(8));
    }

    #[test]
    fn test_enqueue_requires_enabled_channel() {
        let (delay, mut processor) = DelayEffect::new(SAMPLE_RATE);
        let sample = pulse(1000, 4);
        assert!(!delay.enqueue(2, &sample));
        delay.enable_channel(2, true);
        assert!(delay.enqueue(2, &sample));

        let mut buffer = vec![Frame::SILENT; 16];
        processor.process(&mut buffer);
        assert_eq!(processor.line().frame_at(delay.delay_length() - 16), Frame::new(1000, 1000));
    }

    #[test]
    fn test_echo_surfaces_after_delay() {
        let (delay, mut processor) = DelayEffect::new(1000);
        delay.set_time(100); // 100 frames at 1 kHz
        delay.set_feedback(1.0);
        delay.enable_channel(0, true);
        delay.enqueue(0, &pulse(10_000, 1));

        let mut buffer = vec![Frame::SILENT; 250];
        processor.process(&mut buffer);

        // Averaged with silence: half level, repeating every delay length
        assert_eq!(buffer[100], Frame::new(5000, 5000));
        assert_eq!(buffer[200], Frame::new(5000, 5000));
        assert!(buffer
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 100 && *i != 200)
            .all(|(_, f)| f.is_silent()));
    }

    #[test]
    fn test_feedback_decays_repeats() {
        let (delay, mut processor) = DelayEffect::new(1000);
        delay.set_time(50);
        delay.set_feedback(0.5);
        delay.enable_channel(3, true);
        delay.enqueue(3, &pulse(16_000, 1));

        let mut buffer = vec![Frame::SILENT; 160];
        processor.process(&mut buffer);
        assert_eq!(buffer[50].left, 4000);
        assert_eq!(buffer[100].left, 2000);
        assert_eq!(buffer[150].left, 1000);
    }

    #[test]
    fn test_live_signal_is_averaged() {
        let (_delay, mut processor) = DelayEffect::new(SAMPLE_RATE);
        let mut buffer = vec![Frame::new(800, -800); 32];
        processor.process(&mut buffer);
        assert!(buffer.iter().all(|f| *f == Frame::new(400, -400)));
        assert_eq!(processor.line().write_index(), 32);
    }

    #[test]
    fn test_disabling_keeps_buffered_audio() {
        let (delay, mut processor) = DelayEffect::new(1000);
        delay.set_time(100);
        delay.set_feedback(1.0);
        delay.enable_channel(1, true);
        delay.enqueue(1, &pulse(10_000, 1));
        delay.enable_channel(1, false);
        assert!(!delay.enqueue(1, &pulse(10_000, 1)));

        let mut buffer = vec![Frame::SILENT; 120];
        processor.process(&mut buffer);
        assert_eq!(buffer[100], Frame::new(5000, 5000));
    }

    #[test]
    fn test_process_wraps_near_end_of_ring() {
        let (delay, mut processor) = DelayEffect::new(1000);
        let capacity = processor.line().capacity();
        processor.line.advance(capacity - 1);
        assert_eq!(processor.line().write_index(), capacity - 1);

        delay.set_time(MIN_DELAY_MS);
        let mut buffer = vec![Frame::SILENT; 10];
        processor.process(&mut buffer);
        assert_eq!(processor.line().write_index(), 9);
    }

    #[test]
    fn test_long_sample_is_truncated_to_ring() {
        let (delay, mut processor) = DelayEffect::new(1000);
        delay.set_time(100);
        delay.set_feedback(0.0);
        delay.enable_channel(0, true);
        let capacity = processor.line().capacity();
        delay.enqueue(0, &pulse(1, capacity * 2));

        processor.process(&mut []);
        // The frames just behind the insert point stay silent
        assert_eq!(processor.line().frame_at(99), Frame::SILENT);
        assert_eq!(processor.line().frame_at(100), Frame::new(1, 1));
    }

    #[test]
    fn test_settings_pack() {
        let settings = DelaySettings {
            time_ms: 740,
            feedback: 0.7,
        };
        assert_eq!(DelaySettings::unpack(settings.pack()), settings);
    }
}
