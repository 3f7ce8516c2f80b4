//! Delay processors

use rf_core::Sample;

use crate::biquad::BiquadTDF2;
use crate::smoothing::ParamSmoother;
use crate::{MonoProcessor, Processor, StereoProcessor};

/// Delay time glides over this many milliseconds instead of jumping
const DELAY_GLIDE_MS: f64 = 30.0;

/// Stereo ping-pong delay with filtered feedback
///
/// The buffer is sized for `max_delay_ms` at construction. Delay time changes
/// glide through a fractional read position, so moving the time does not click.
#[derive(Debug, Clone)]
pub struct PingPongDelay {
    buffer_l: Vec<Sample>,
    buffer_r: Vec<Sample>,
    write_pos: usize,
    delay: ParamSmoother,
    max_delay_samples: usize,
    feedback: f64,
    dry_wet: f64,
    ping_pong: f64, // 0.0 = normal stereo, 1.0 = full ping-pong

    // Feedback filtering
    highpass_l: BiquadTDF2,
    highpass_r: BiquadTDF2,
    lowpass_l: BiquadTDF2,
    lowpass_r: BiquadTDF2,

    sample_rate: f64,
}

impl PingPongDelay {
    pub fn new(sample_rate: f64, max_delay_ms: f64) -> Self {
        let max_delay_samples = (max_delay_ms * 0.001 * sample_rate).ceil() as usize + 2;
        let initial = (375.0 * 0.001 * sample_rate).min((max_delay_samples - 2) as f64);

        let mut delay = Self {
            buffer_l: vec![0.0; max_delay_samples],
            buffer_r: vec![0.0; max_delay_samples],
            write_pos: 0,
            delay: ParamSmoother::with_time(sample_rate, initial, DELAY_GLIDE_MS),
            max_delay_samples,
            feedback: 0.4,
            dry_wet: 0.3,
            ping_pong: 1.0,
            highpass_l: BiquadTDF2::new(sample_rate),
            highpass_r: BiquadTDF2::new(sample_rate),
            lowpass_l: BiquadTDF2::new(sample_rate),
            lowpass_r: BiquadTDF2::new(sample_rate),
            sample_rate,
        };
        delay.set_hp_freq(80.0);
        delay.set_lp_freq(8000.0);
        delay
    }

    pub fn set_delay_ms(&mut self, ms: f64) {
        let samples = (ms.max(0.0) * 0.001 * self.sample_rate).max(1.0);
        self.delay
            .set_target(samples.min((self.max_delay_samples - 2) as f64));
    }

    /// Current (possibly gliding) delay in samples
    pub fn delay_samples(&self) -> f64 {
        self.delay.current()
    }

    pub fn set_feedback(&mut self, feedback: f64) {
        self.feedback = feedback.clamp(0.0, 0.95);
    }

    pub fn set_dry_wet(&mut self, mix: f64) {
        self.dry_wet = mix.clamp(0.0, 1.0);
    }

    pub fn set_ping_pong(&mut self, amount: f64) {
        self.ping_pong = amount.clamp(0.0, 1.0);
    }

    /// Set feedback highpass filter frequency (Hz)
    pub fn set_hp_freq(&mut self, freq_hz: f64) {
        let f = freq_hz.clamp(20.0, 2000.0);
        self.highpass_l.set_highpass(f, 0.707);
        self.highpass_r.set_highpass(f, 0.707);
    }

    /// Set feedback lowpass filter frequency (Hz)
    pub fn set_lp_freq(&mut self, freq_hz: f64) {
        let f = freq_hz.clamp(200.0, 20000.0);
        self.lowpass_l.set_lowpass(f, 0.707);
        self.lowpass_r.set_lowpass(f, 0.707);
    }

    #[inline(always)]
    fn read(buffer: &[Sample], write_pos: usize, delay: f64) -> Sample {
        let len = buffer.len();
        let whole = delay.floor();
        let frac = delay - whole;
        let i0 = (write_pos + len - whole as usize) % len;
        let i1 = (i0 + len - 1) % len;
        buffer[i0] * (1.0 - frac) + buffer[i1] * frac
    }
}

impl Processor for PingPongDelay {
    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
        self.delay.snap();
        self.highpass_l.reset();
        self.highpass_r.reset();
        self.lowpass_l.reset();
        self.lowpass_r.reset();
    }
}

impl StereoProcessor for PingPongDelay {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let delay = self.delay.next();
        let delayed_l = Self::read(&self.buffer_l, self.write_pos, delay);
        let delayed_r = Self::read(&self.buffer_r, self.write_pos, delay);

        let filtered_l = self
            .lowpass_l
            .process_sample(self.highpass_l.process_sample(delayed_l));
        let filtered_r = self
            .lowpass_r
            .process_sample(self.highpass_r.process_sample(delayed_r));

        // Ping-pong crossfeed
        let fb_l = filtered_l * (1.0 - self.ping_pong) + filtered_r * self.ping_pong;
        let fb_r = filtered_r * (1.0 - self.ping_pong) + filtered_l * self.ping_pong;

        self.buffer_l[self.write_pos] = left + fb_l * self.feedback;
        self.buffer_r[self.write_pos] = right + fb_r * self.feedback;
        self.write_pos = (self.write_pos + 1) % self.max_delay_samples;

        (
            left * (1.0 - self.dry_wet) + delayed_l * self.dry_wet,
            right * (1.0 - self.dry_wet) + delayed_r * self.dry_wet,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48000.0;

    #[test]
    fn test_echo_arrives_after_delay_time() {
        let mut delay = PingPongDelay::new(SR, 2000.0);
        delay.set_delay_ms(10.0);
        delay.set_dry_wet(1.0);
        delay.set_feedback(0.0);
        delay.set_hp_freq(20.0);
        delay.reset();

        let mut left = vec![0.0; 1000];
        let mut right = vec![0.0; 1000];
        left[0] = 1.0;
        right[0] = 1.0;
        delay.process_block(&mut left, &mut right);

        assert!(left[..479].iter().all(|s| s.abs() < 1e-12));
        assert!((left[480] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_delay_time_is_bounded() {
        let mut delay = PingPongDelay::new(SR, 100.0);
        delay.set_delay_ms(5000.0);
        delay.reset();
        assert!(delay.delay_samples() <= 4800.0);
    }

    #[test]
    fn test_feedback_decays() {
        let mut delay = PingPongDelay::new(SR, 2000.0);
        delay.set_delay_ms(20.0);
        delay.set_feedback(0.5);
        delay.reset();
        let mut left = vec![0.0; 48000];
        let mut right = vec![0.0; 48000];
        left[0] = 1.0;
        delay.process_block(&mut left, &mut right);
        assert!(left[40000..].iter().chain(right[40000..].iter()).all(|s| s.abs() < 1e-3));
        // Ping-pong moves the first repeat to the other side
        assert!(right.iter().any(|s| s.abs() > 0.01));
    }
}
