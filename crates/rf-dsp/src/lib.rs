//! rf-dsp: DSP processors for ReelForge
//!
//! Allocation-free per-sample processing. Every buffer a processor needs is
//! sized in `new()`, so parameter changes and `process_*` never touch the heap.
//!
//! ## Modules
//! - `biquad` - TDF-II biquad filters (lowpass, highpass, peaking, shelving)
//! - `eq` - 64-band parametric EQ with dynamic EQ per band, Pultec-style EQ
//! - `dynamics` - Compressor (VCA/Opto/FET), true peak limiter, gate, expander, de-esser
//! - `reverb` - Room (comb/allpass) and FDN algorithmic reverbs
//! - `delay` - Ping-pong delay with filtered feedback
//! - `saturation` - Tape, tube, transistor saturation and clippers
//! - `smoothing` - One-pole parameter smoothing

pub mod biquad;
pub mod delay;
pub mod dynamics;
pub mod eq;
pub mod reverb;
pub mod saturation;
pub mod smoothing;

use rf_core::Sample;

/// Trait for all DSP processors
pub trait Processor: Send {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

/// Stereo processor trait
pub trait StereoProcessor: Processor {
    /// Process a stereo sample pair
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample);

    /// Process stereo blocks
    fn process_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        debug_assert_eq!(left.len(), right.len());
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            (*l, *r) = self.process_sample(*l, *r);
        }
    }
}

/// One-pole coefficient for a time constant in milliseconds
///
/// `y = x + coeff * (y - x)` reaches ~63% of a step after `ms`.
#[inline]
pub fn time_coeff(ms: f64, sample_rate: f64) -> f64 {
    let samples = ms * 0.001 * sample_rate;
    if samples <= 0.0 {
        0.0
    } else {
        (-1.0 / samples).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_coeff() {
        assert_eq!(time_coeff(0.0, 48000.0), 0.0);
        let c = time_coeff(10.0, 48000.0);
        assert!(c > 0.99 && c < 1.0);
    }
}
