//! Sample types

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Stereo sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub const fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub const fn mono(value: Sample) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Larger absolute value of both channels
    #[inline]
    pub fn peak(self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

/// True when every sample is finite (no NaN / Inf)
#[inline]
pub fn all_finite(samples: &[Sample]) -> bool {
    samples.iter().all(|s| s.is_finite())
}

/// Absolute peak of a buffer
#[inline]
pub fn peak_abs(samples: &[Sample]) -> Sample {
    samples.iter().fold(0.0, |acc, s| acc.max(s.abs()))
}

/// RMS level of a buffer
pub fn rms(samples: &[Sample]) -> Sample {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<Sample>() / samples.len() as Sample).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_helpers() {
        let buf = [0.5, -1.0, 0.25];
        assert_eq!(peak_abs(&buf), 1.0);
        assert!(all_finite(&buf));
        assert!(!all_finite(&[0.0, f64::NAN]));
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[1.0, -1.0]) - 1.0).abs() < 1e-12);
        assert_eq!(StereoSample::new(0.2, -0.7).peak(), 0.7);
    }
}
