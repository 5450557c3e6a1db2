/// One interleaved stereo frame of signed 16-bit audio
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    pub const SILENT: Frame = Frame { left: 0, right: 0 };

    pub fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }

    pub fn is_silent(&self) -> bool {
        *self == Self::SILENT
    }

    /// Multiply both channels by `gain`, saturating at the i16 range
    pub fn scaled(self, gain: f32) -> Self {
        let scale = |s: i16| (s as f32 * gain).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        Self {
            left: scale(self.left),
            right: scale(self.right),
        }
    }

    pub fn saturating_add(self, other: Frame) -> Self {
        Self {
            left: self.left.saturating_add(other.left),
            right: self.right.saturating_add(other.right),
        }
    }

    /// Equal-gain mix of two frames: (a + b) / 2 per channel
    pub fn average(a: Frame, b: Frame) -> Self {
        let avg = |x: i16, y: i16| ((x as i32 + y as i32) / 2) as i16;
        Self {
            left: avg(a.left, b.left),
            right: avg(a.right, b.right),
        }
    }

    pub fn from_f32(left: f32, right: f32) -> Self {
        let convert = |s: f32| (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        Self {
            left: convert(left),
            right: convert(right),
        }
    }

    pub fn to_f32(self) -> (f32, f32) {
        let convert = |s: i16| s as f32 / i16::MAX as f32;
        (convert(self.left), convert(self.right))
    }
}

/// Group interleaved samples into frames. Mono input is duplicated to both
/// channels; channels past the second are dropped.
pub fn frames_from_interleaved(samples: &[i16], channels: usize) -> Vec<Frame> {
    match channels {
        0 => Vec::new(),
        1 => samples.iter().map(|&s| Frame::new(s, s)).collect(),
        n => samples
            .chunks_exact(n)
            .map(|chunk| Frame::new(chunk[0], chunk[1]))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_saturates() {
        let f = Frame::new(20_000, -20_000);
        assert_eq!(f.scaled(0.5), Frame::new(10_000, -10_000));
        assert_eq!(f.scaled(2.0), Frame::new(i16::MAX, i16::MIN));
        assert_eq!(f.scaled(0.0), Frame::SILENT);
    }

    #[test]
    fn test_average_does_not_overflow() {
        let loud = Frame::new(i16::MAX, i16::MIN);
        assert_eq!(Frame::average(loud, loud), loud);
        assert_eq!(
            Frame::average(Frame::new(100, -100), Frame::SILENT),
            Frame::new(50, -50)
        );
    }

    #[test]
    fn test_saturating_add() {
        let a = Frame::new(30_000, -30_000);
        assert_eq!(a.saturating_add(a), Frame::new(i16::MAX, i16::MIN));
    }

    #[test]
    fn test_interleaved_grouping() {
        let mono = frames_from_interleaved(&[1, 2, 3], 1);
        assert_eq!(mono, vec![Frame::new(1, 1), Frame::new(2, 2), Frame::new(3, 3)]);

        let quad = frames_from_interleaved(&[1, 2, 3, 4, 5, 6, 7, 8], 4);
        assert_eq!(quad, vec![Frame::new(1, 2), Frame::new(5, 6)]);
    }
}
