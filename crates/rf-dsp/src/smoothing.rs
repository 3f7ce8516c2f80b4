//! Parameter smoothing for zipper-free changes
//!
//! Formula: current = current + coeff * (target - current)
//! where coeff = 1 - exp(-1 / (time_constant * sample_rate))

/// Default smoothing time in milliseconds
pub const DEFAULT_SMOOTH_TIME_MS: f64 = 1.5;

/// Threshold for considering smoothing complete (absolute)
const SMOOTH_THRESHOLD: f64 = 1e-9;

/// Single parameter smoother using exponential smoothing
#[derive(Debug, Clone)]
pub struct ParamSmoother {
    current: f64,
    target: f64,
    coeff: f64,
}

impl ParamSmoother {
    /// Create new smoother with default smoothing time
    pub fn new(sample_rate: f64, initial_value: f64) -> Self {
        Self::with_time(sample_rate, initial_value, DEFAULT_SMOOTH_TIME_MS)
    }

    /// Create smoother with custom smoothing time
    pub fn with_time(sample_rate: f64, initial_value: f64, smooth_time_ms: f64) -> Self {
        let time_constant_samples = (smooth_time_ms / 1000.0) * sample_rate;
        let coeff = if time_constant_samples <= 0.0 {
            1.0
        } else {
            1.0 - (-1.0 / time_constant_samples).exp()
        };
        Self {
            current: initial_value,
            target: initial_value,
            coeff,
        }
    }

    /// Set new target value (starts smoothing)
    #[inline]
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    /// Jump straight to the target
    #[inline]
    pub fn snap(&mut self) {
        self.current = self.target;
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.current != self.target
    }

    /// Advance one sample
    #[inline(always)]
    pub fn next(&mut self) -> f64 {
        if self.current != self.target {
            self.current += self.coeff * (self.target - self.current);
            if (self.target - self.current).abs() < SMOOTH_THRESHOLD {
                self.current = self.target;
            }
        }
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoother_converges() {
        let mut s = ParamSmoother::new(48000.0, 0.0);
        s.set_target(1.0);
        let first = s.next();
        assert!(first > 0.0 && first < 0.1);
        for _ in 0..48000 {
            s.next();
        }
        assert_eq!(s.current(), 1.0);
        assert!(!s.is_smoothing());
    }

    #[test]
    fn test_snap() {
        let mut s = ParamSmoother::new(48000.0, 0.5);
        s.set_target(-2.0);
        s.snap();
        assert_eq!(s.next(), -2.0);
    }
}
