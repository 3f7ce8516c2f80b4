//! Dynamics processors: compressor, limiter, gate, expander, de-esser
//!
//! - VCA, Opto, and FET compressor characteristics
//! - Peak detection with gain smoothing in the dB domain
//! - True peak limiting with lookahead and interpolated inter-sample peaks
//! - Soft-knee compression and expansion

use rf_core::{Sample, db_to_gain, gain_to_db};

use crate::biquad::{BiquadCoeffs, BiquadTDF2};
use crate::{MonoProcessor, Processor, StereoProcessor, time_coeff};

/// Envelope follower for dynamics processing
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    attack_coeff: f64,
    release_coeff: f64,
    envelope: f64,
    sample_rate: f64,
}

impl EnvelopeFollower {
    pub fn new(sample_rate: f64) -> Self {
        let mut follower = Self {
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            sample_rate,
        };
        follower.set_times(10.0, 100.0);
        follower
    }

    /// Set attack and release times in milliseconds
    pub fn set_times(&mut self, attack_ms: f64, release_ms: f64) {
        self.attack_coeff = time_coeff(attack_ms, self.sample_rate);
        self.release_coeff = time_coeff(release_ms, self.sample_rate);
    }

    #[inline(always)]
    pub fn process(&mut self, input: Sample) -> f64 {
        let abs_input = input.abs();
        let coeff = if abs_input > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = abs_input + coeff * (self.envelope - abs_input);
        self.envelope
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    pub fn current(&self) -> f64 {
        self.envelope
    }
}

/// Peak detector: instant attack, exponential release
#[derive(Debug, Clone)]
pub struct PeakDetector {
    release_coeff: f64,
    level: f64,
}

impl PeakDetector {
    pub fn new(release_ms: f64, sample_rate: f64) -> Self {
        Self {
            release_coeff: time_coeff(release_ms, sample_rate),
            level: 0.0,
        }
    }

    pub fn set_release(&mut self, release_ms: f64, sample_rate: f64) {
        self.release_coeff = time_coeff(release_ms, sample_rate);
    }

    #[inline(always)]
    pub fn process(&mut self, input: Sample) -> f64 {
        let x = input.abs();
        self.level = if x > self.level {
            x
        } else {
            x + self.release_coeff * (self.level - x)
        };
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

// ============ Compressor ============

/// Compressor characteristic type
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CompressorType {
    /// Clean VCA compression - fast, transparent
    #[default]
    Vca,
    /// Optical compression - smooth, program-dependent release
    Opto,
    /// FET compression - aggressive, punchy, adds harmonics
    Fet,
}

impl CompressorType {
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Self::Opto,
            2 => Self::Fet,
            _ => Self::Vca,
        }
    }
}

/// Compressor with multiple characteristics
///
/// The detector tracks the signal peak; attack and release shape the gain
/// reduction itself, so a steady tone settles at the static curve value.
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold_db: f64,
    ratio: f64,
    knee_db: f64,
    makeup_gain_db: f64,
    attack_ms: f64,
    release_ms: f64,
    mix: f64,
    comp_type: CompressorType,

    detector: PeakDetector,
    attack_coeff: f64,
    release_coeff: f64,
    gain_reduction: f64,

    sample_rate: f64,
}

impl Compressor {
    pub fn new(sample_rate: f64) -> Self {
        let mut comp = Self {
            threshold_db: -20.0,
            ratio: 4.0,
            knee_db: 6.0,
            makeup_gain_db: 0.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            mix: 1.0,
            comp_type: CompressorType::Vca,
            detector: PeakDetector::new(100.0, sample_rate),
            attack_coeff: 0.0,
            release_coeff: 0.0,
            gain_reduction: 0.0,
            sample_rate,
        };
        comp.set_times(10.0, 100.0);
        comp
    }

    pub fn set_type(&mut self, comp_type: CompressorType) {
        self.comp_type = comp_type;
    }

    pub fn set_threshold(&mut self, db: f64) {
        self.threshold_db = db.clamp(-60.0, 0.0);
    }

    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio.clamp(1.0, 100.0);
    }

    pub fn set_knee(&mut self, db: f64) {
        self.knee_db = db.clamp(0.0, 24.0);
    }

    pub fn set_times(&mut self, attack_ms: f64, release_ms: f64) {
        self.attack_ms = attack_ms.clamp(0.01, 500.0);
        self.release_ms = release_ms.clamp(1.0, 5000.0);
        self.attack_coeff = time_coeff(self.attack_ms, self.sample_rate);
        self.release_coeff = time_coeff(self.release_ms, self.sample_rate);
        self.detector.set_release(self.release_ms, self.sample_rate);
    }

    pub fn set_makeup(&mut self, db: f64) {
        self.makeup_gain_db = db.clamp(-24.0, 24.0);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    /// Get current gain reduction in dB
    pub fn gain_reduction_db(&self) -> f64 {
        self.gain_reduction
    }

    /// Static soft-knee curve: dB of reduction for a detector level
    #[inline]
    pub fn calculate_gain_reduction(&self, input_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio;
        let half_knee = self.knee_db / 2.0;

        if self.knee_db <= 0.0 || input_db > self.threshold_db + half_knee {
            (input_db - self.threshold_db).max(0.0) * slope
        } else if input_db < self.threshold_db - half_knee {
            0.0
        } else {
            let x = input_db - (self.threshold_db - half_knee);
            (slope * x * x) / (2.0 * self.knee_db)
        }
    }

    /// FET curve: harder knee, ratio grows with overshoot
    #[inline]
    fn fet_gain_reduction(&self, input_db: f64) -> f64 {
        if input_db <= self.threshold_db {
            return 0.0;
        }
        let over = input_db - self.threshold_db;
        let effective_ratio = self.ratio * (1.0 + over * 0.05).min(2.0);
        over * (1.0 - 1.0 / effective_ratio)
    }

    /// Compress `input` using `key` as the detector signal
    #[inline(always)]
    pub fn process_keyed(&mut self, input: Sample, key: Sample) -> Sample {
        let level_db = gain_to_db(self.detector.process(key));
        let target = match self.comp_type {
            CompressorType::Fet => self.fet_gain_reduction(level_db),
            _ => self.calculate_gain_reduction(level_db),
        };

        let coeff = if target > self.gain_reduction {
            self.attack_coeff
        } else if self.comp_type == CompressorType::Opto {
            // Opto cells release slower the harder they were driven
            time_coeff(self.release_ms * (1.0 + self.gain_reduction * 0.02), self.sample_rate)
        } else {
            self.release_coeff
        };
        self.gain_reduction = target + coeff * (self.gain_reduction - target);

        let mut wet = input * db_to_gain(self.makeup_gain_db - self.gain_reduction);
        if self.comp_type == CompressorType::Fet {
            let amount = (self.gain_reduction / 20.0).min(0.3);
            if amount > 0.0 {
                let x = wet * (1.0 + amount);
                wet = x / (1.0 + x.abs() * amount * 0.5);
            }
        }

        input * (1.0 - self.mix) + wet * self.mix
    }
}

impl Processor for Compressor {
    fn reset(&mut self) {
        self.detector.reset();
        self.gain_reduction = 0.0;
    }
}

impl MonoProcessor for Compressor {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        self.process_keyed(input, input)
    }
}

/// Stereo compressor with link options
#[derive(Debug, Clone)]
pub struct StereoCompressor {
    left: Compressor,
    right: Compressor,
    link: f64, // 0.0 = independent, 1.0 = fully linked
}

impl StereoCompressor {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            left: Compressor::new(sample_rate),
            right: Compressor::new(sample_rate),
            link: 1.0,
        }
    }

    pub fn set_link(&mut self, link: f64) {
        self.link = link.clamp(0.0, 1.0);
    }

    /// Apply the same setting to both channels
    pub fn set_both<F>(&mut self, f: F)
    where
        F: Fn(&mut Compressor),
    {
        f(&mut self.left);
        f(&mut self.right);
    }

    pub fn gain_reduction_db(&self) -> (f64, f64) {
        (self.left.gain_reduction_db(), self.right.gain_reduction_db())
    }
}

impl Processor for StereoCompressor {
    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

impl StereoProcessor for StereoCompressor {
    #[inline(always)]
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let linked = left.abs().max(right.abs());
        let key_l = self.link * linked + (1.0 - self.link) * left.abs();
        let key_r = self.link * linked + (1.0 - self.link) * right.abs();
        (
            self.left.process_keyed(left, key_l),
            self.right.process_keyed(right, key_r),
        )
    }
}

// ============ True Peak Limiter ============

/// Longest lookahead the limiter can be set to
pub const MAX_LOOKAHEAD_MS: f64 = 10.0;

/// Oversampling factor used for inter-sample peak estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Oversampling {
    X1,
    X2,
    #[default]
    X4,
    X8,
}

impl Oversampling {
    pub fn factor(&self) -> usize {
        match self {
            Self::X1 => 1,
            Self::X2 => 2,
            Self::X4 => 4,
            Self::X8 => 8,
        }
    }

    pub fn from_index(index: usize) -> Self {
        match index {
            0 => Self::X1,
            1 => Self::X2,
            3 => Self::X8,
            _ => Self::X4,
        }
    }
}

/// True Peak Limiter with lookahead
///
/// Inter-sample peaks are estimated with Catmull-Rom interpolation at the
/// oversampling factor. Gain drops instantly, holds for the lookahead window,
/// then releases. A final clamp keeps sample peaks at or below the ceiling.
#[derive(Debug, Clone)]
pub struct TruePeakLimiter {
    input_gain: f64,
    ceiling_db: f64,
    ceiling: f64,
    release_ms: f64,
    release_coeff: f64,
    link: f64,
    oversampling: Oversampling,

    lookahead: usize,
    buffer_l: Vec<Sample>,
    buffer_r: Vec<Sample>,
    write_pos: usize,
    history: [[Sample; 4]; 2],

    gain: [f64; 2],
    hold: [usize; 2],
    true_peak: f64,
    sample_rate: f64,
}

impl TruePeakLimiter {
    pub fn new(sample_rate: f64) -> Self {
        let capacity = (MAX_LOOKAHEAD_MS * 0.001 * sample_rate).ceil() as usize + 1;
        let mut limiter = Self {
            input_gain: 1.0,
            ceiling_db: -0.3,
            ceiling: db_to_gain(-0.3),
            release_ms: 100.0,
            release_coeff: 0.0,
            link: 1.0,
            oversampling: Oversampling::X4,
            lookahead: 1,
            buffer_l: vec![0.0; capacity],
            buffer_r: vec![0.0; capacity],
            write_pos: 0,
            history: [[0.0; 4]; 2],
            gain: [1.0; 2],
            hold: [0; 2],
            true_peak: 0.0,
            sample_rate,
        };
        limiter.set_release(100.0);
        limiter.set_lookahead(1.5);
        limiter
    }

    pub fn set_input_gain(&mut self, db: f64) {
        self.input_gain = db_to_gain(db.clamp(-12.0, 24.0));
    }

    pub fn set_ceiling(&mut self, db: f64) {
        self.ceiling_db = db.clamp(-6.0, 0.0);
        self.ceiling = db_to_gain(self.ceiling_db);
    }

    pub fn set_release(&mut self, ms: f64) {
        self.release_ms = ms.clamp(10.0, 1000.0);
        self.release_coeff = time_coeff(self.release_ms, self.sample_rate);
    }

    pub fn set_lookahead(&mut self, ms: f64) {
        let samples = (ms.clamp(0.0, MAX_LOOKAHEAD_MS) * 0.001 * self.sample_rate).round() as usize;
        self.lookahead = samples.clamp(1, self.buffer_l.len() - 1);
    }

    pub fn set_oversampling(&mut self, os: Oversampling) {
        self.oversampling = os;
    }

    pub fn set_link(&mut self, link: f64) {
        self.link = link.clamp(0.0, 1.0);
    }

    /// Highest true peak seen since the last reset, in dBTP
    pub fn true_peak_db(&self) -> f64 {
        gain_to_db(self.true_peak)
    }

    /// Current gain reduction in dB (worst channel)
    pub fn gain_reduction_db(&self) -> f64 {
        -gain_to_db(self.gain[0].min(self.gain[1]))
    }

    /// Push a sample into a channel's history and estimate its true peak
    #[inline(always)]
    fn channel_peak(&mut self, channel: usize, input: Sample) -> f64 {
        let h = &mut self.history[channel];
        h.rotate_left(1);
        h[3] = input;

        let mut peak = input.abs();
        let factor = self.oversampling.factor();
        if factor > 1 {
            let (p0, p1, p2, p3) = (h[0], h[1], h[2], h[3]);
            for k in 1..factor {
                let t = k as f64 / factor as f64;
                let t2 = t * t;
                let t3 = t2 * t;
                let v = 0.5
                    * ((2.0 * p1)
                        + (-p0 + p2) * t
                        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
                        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3);
                peak = peak.max(v.abs());
            }
        }
        peak
    }

    #[inline(always)]
    fn update_gain(&mut self, channel: usize, peak: f64) {
        let target = if peak > self.ceiling {
            self.ceiling / peak
        } else {
            1.0
        };
        if target < self.gain[channel] {
            self.gain[channel] = target;
            self.hold[channel] = self.lookahead;
        } else if self.hold[channel] > 0 {
            self.hold[channel] -= 1;
        } else {
            self.gain[channel] = target + self.release_coeff * (self.gain[channel] - target);
        }
    }
}

impl Processor for TruePeakLimiter {
    fn reset(&mut self) {
        self.gain = [1.0; 2];
        self.hold = [0; 2];
        self.true_peak = 0.0;
        self.history = [[0.0; 4]; 2];
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }

    fn latency(&self) -> usize {
        self.lookahead
    }
}

impl StereoProcessor for TruePeakLimiter {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let left = left * self.input_gain;
        let right = right * self.input_gain;

        let peak_l = self.channel_peak(0, left);
        let peak_r = self.channel_peak(1, right);
        let linked = peak_l.max(peak_r);
        self.true_peak = self.true_peak.max(linked);
        self.update_gain(0, self.link * linked + (1.0 - self.link) * peak_l);
        self.update_gain(1, self.link * linked + (1.0 - self.link) * peak_r);

        let capacity = self.buffer_l.len();
        self.buffer_l[self.write_pos] = left;
        self.buffer_r[self.write_pos] = right;
        let read_pos = (self.write_pos + capacity - self.lookahead) % capacity;
        self.write_pos = (self.write_pos + 1) % capacity;

        let ceiling = self.ceiling;
        (
            (self.buffer_l[read_pos] * self.gain[0]).clamp(-ceiling, ceiling),
            (self.buffer_r[read_pos] * self.gain[1]).clamp(-ceiling, ceiling),
        )
    }
}

// ============ Gate ============

/// Noise gate with hold and hysteresis, stereo-linked detection
#[derive(Debug, Clone)]
pub struct Gate {
    threshold_db: f64,
    range_db: f64,
    hysteresis_db: f64,
    attack_ms: f64,
    hold_ms: f64,
    release_ms: f64,

    envelope: EnvelopeFollower,
    open_threshold: f64,
    close_threshold: f64,
    range: f64,
    attack_coeff: f64,
    release_coeff: f64,
    hold_samples: usize,

    gain: f64,
    hold_counter: usize,
    is_open: bool,
    sample_rate: f64,
}

impl Gate {
    pub fn new(sample_rate: f64) -> Self {
        let mut gate = Self {
            threshold_db: -40.0,
            range_db: -80.0,
            hysteresis_db: 0.0,
            attack_ms: 1.0,
            hold_ms: 50.0,
            release_ms: 100.0,
            envelope: EnvelopeFollower::new(sample_rate),
            open_threshold: 0.0,
            close_threshold: 0.0,
            range: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            hold_samples: 0,
            gain: 0.0,
            hold_counter: 0,
            is_open: false,
            sample_rate,
        };
        gate.envelope.set_times(1.0, 50.0);
        gate.update_coefficients();
        gate.gain = gate.range;
        gate
    }

    fn update_coefficients(&mut self) {
        self.open_threshold = db_to_gain(self.threshold_db);
        self.close_threshold = db_to_gain(self.threshold_db - self.hysteresis_db);
        self.range = db_to_gain(self.range_db);
        self.attack_coeff = time_coeff(self.attack_ms, self.sample_rate);
        self.release_coeff = time_coeff(self.release_ms, self.sample_rate);
        self.hold_samples = (self.hold_ms * 0.001 * self.sample_rate) as usize;
    }

    pub fn set_threshold(&mut self, db: f64) {
        self.threshold_db = db.clamp(-80.0, 0.0);
        self.update_coefficients();
    }

    pub fn set_range(&mut self, db: f64) {
        self.range_db = db.clamp(-80.0, 0.0);
        self.update_coefficients();
    }

    pub fn set_hysteresis(&mut self, db: f64) {
        self.hysteresis_db = db.clamp(0.0, 12.0);
        self.update_coefficients();
    }

    pub fn set_attack(&mut self, ms: f64) {
        self.attack_ms = ms.clamp(0.01, 100.0);
        self.update_coefficients();
    }

    pub fn set_hold(&mut self, ms: f64) {
        self.hold_ms = ms.clamp(0.0, 500.0);
        self.update_coefficients();
    }

    pub fn set_release(&mut self, ms: f64) {
        self.release_ms = ms.clamp(1.0, 1000.0);
        self.update_coefficients();
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    #[inline(always)]
    fn next_gain(&mut self, key: Sample) -> f64 {
        let envelope = self.envelope.process(key);

        if envelope >= self.open_threshold {
            self.is_open = true;
            self.hold_counter = self.hold_samples;
        } else if self.is_open && envelope < self.close_threshold {
            if self.hold_counter > 0 {
                self.hold_counter -= 1;
            } else {
                self.is_open = false;
            }
        }

        let target_gain = if self.is_open { 1.0 } else { self.range };
        let coeff = if target_gain > self.gain {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.gain = target_gain + coeff * (self.gain - target_gain);
        self.gain
    }
}

impl Processor for Gate {
    fn reset(&mut self) {
        self.envelope.reset();
        self.gain = self.range;
        self.hold_counter = 0;
        self.is_open = false;
    }
}

impl StereoProcessor for Gate {
    #[inline(always)]
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let gain = self.next_gain(left.abs().max(right.abs()));
        (left * gain, right * gain)
    }
}

// ============ Expander ============

/// Downward expander (opposite of compressor), stereo-linked
#[derive(Debug, Clone)]
pub struct Expander {
    threshold_db: f64,
    ratio: f64,
    knee_db: f64,
    range_db: f64,
    envelope: EnvelopeFollower,
}

impl Expander {
    pub fn new(sample_rate: f64) -> Self {
        let mut exp = Self {
            threshold_db: -30.0,
            ratio: 2.0,
            knee_db: 6.0,
            range_db: -60.0,
            envelope: EnvelopeFollower::new(sample_rate),
        };
        exp.envelope.set_times(5.0, 100.0);
        exp
    }

    pub fn set_threshold(&mut self, db: f64) {
        self.threshold_db = db.clamp(-80.0, 0.0);
    }

    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio.clamp(1.0, 20.0);
    }

    pub fn set_knee(&mut self, db: f64) {
        self.knee_db = db.clamp(0.0, 24.0);
    }

    pub fn set_range(&mut self, db: f64) {
        self.range_db = db.clamp(-80.0, 0.0);
    }

    pub fn set_times(&mut self, attack_ms: f64, release_ms: f64) {
        self.envelope
            .set_times(attack_ms.clamp(0.01, 500.0), release_ms.clamp(1.0, 5000.0));
    }

    /// Static curve: gain in dB (≤ 0) for a detector level
    pub fn gain_db(&self, env_db: f64) -> f64 {
        let half_knee = self.knee_db / 2.0;
        let slope = self.ratio - 1.0;
        let gain_db = if env_db < self.threshold_db - half_knee {
            (env_db - self.threshold_db) * slope
        } else if self.knee_db <= 0.0 || env_db > self.threshold_db + half_knee {
            0.0
        } else {
            let x = (self.threshold_db + half_knee) - env_db;
            -(slope * x * x) / (2.0 * self.knee_db)
        };
        gain_db.max(self.range_db)
    }
}

impl Processor for Expander {
    fn reset(&mut self) {
        self.envelope.reset();
    }
}

impl StereoProcessor for Expander {
    #[inline(always)]
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let envelope = self.envelope.process(left.abs().max(right.abs()));
        let gain = db_to_gain(self.gain_db(gain_to_db(envelope)));
        (left * gain, right * gain)
    }
}

// ============ De-esser ============

/// De-esser processing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeEsserMode {
    /// Duck the whole signal
    #[default]
    Wideband,
    /// Duck only the sibilant band
    Split,
}

impl DeEsserMode {
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Self::Split,
            _ => Self::Wideband,
        }
    }
}

/// Sibilance reducer with a bandpass sidechain
#[derive(Debug, Clone)]
pub struct DeEsser {
    frequency: f64,
    q: f64,
    threshold_db: f64,
    range_db: f64,
    mode: DeEsserMode,
    listen: bool,

    sidechain: BiquadTDF2,
    band_l: BiquadTDF2,
    band_r: BiquadTDF2,
    envelope: EnvelopeFollower,
    gain_reduction: f64,
    sample_rate: f64,
}

impl DeEsser {
    pub fn new(sample_rate: f64) -> Self {
        let mut deesser = Self {
            frequency: 6500.0,
            q: 1.5,
            threshold_db: -30.0,
            range_db: 12.0,
            mode: DeEsserMode::Wideband,
            listen: false,
            sidechain: BiquadTDF2::new(sample_rate),
            band_l: BiquadTDF2::new(sample_rate),
            band_r: BiquadTDF2::new(sample_rate),
            envelope: EnvelopeFollower::new(sample_rate),
            gain_reduction: 0.0,
            sample_rate,
        };
        deesser.envelope.set_times(1.0, 50.0);
        deesser.update_filters();
        deesser
    }

    fn update_filters(&mut self) {
        let coeffs = BiquadCoeffs::bandpass(self.frequency, self.q, self.sample_rate);
        self.sidechain.set_coeffs(coeffs);
        self.band_l.set_coeffs(coeffs);
        self.band_r.set_coeffs(coeffs);
    }

    /// Set band center and Q together (one coefficient update)
    pub fn set_band(&mut self, frequency: f64, q: f64) {
        self.frequency = frequency.clamp(2000.0, 16000.0);
        self.q = q.clamp(0.3, 8.0);
        self.update_filters();
    }

    pub fn set_threshold(&mut self, db: f64) {
        self.threshold_db = db.clamp(-60.0, 0.0);
    }

    pub fn set_range(&mut self, db: f64) {
        self.range_db = db.clamp(0.0, 24.0);
    }

    pub fn set_times(&mut self, attack_ms: f64, release_ms: f64) {
        self.envelope
            .set_times(attack_ms.clamp(0.1, 50.0), release_ms.clamp(5.0, 500.0));
    }

    pub fn set_mode(&mut self, mode: DeEsserMode) {
        self.mode = mode;
    }

    pub fn set_listen(&mut self, listen: bool) {
        self.listen = listen;
    }

    pub fn gain_reduction_db(&self) -> f64 {
        self.gain_reduction
    }
}

impl Processor for DeEsser {
    fn reset(&mut self) {
        self.sidechain.reset();
        self.band_l.reset();
        self.band_r.reset();
        self.envelope.reset();
        self.gain_reduction = 0.0;
    }
}

impl StereoProcessor for DeEsser {
    #[inline(always)]
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let key = self.sidechain.process_sample((left + right) * 0.5);
        let env_db = gain_to_db(self.envelope.process(key));
        self.gain_reduction = (env_db - self.threshold_db).clamp(0.0, self.range_db);
        let gain = db_to_gain(-self.gain_reduction);

        let band_l = self.band_l.process_sample(left);
        let band_r = self.band_r.process_sample(right);
        if self.listen {
            return (band_l, band_r);
        }

        match self.mode {
            DeEsserMode::Wideband => (left * gain, right * gain),
            DeEsserMode::Split => (
                left - band_l * (1.0 - gain),
                right - band_r * (1.0 - gain),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::peak_abs;
    use std::f64::consts::PI;

    const SR: f64 = 48000.0;

    fn sine(freq: f64, amp: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amp * (2.0 * PI * freq * i as f64 / SR).sin())
            .collect()
    }

    #[test]
    fn test_compressor_static_curve() {
        let mut comp = Compressor::new(SR);
        comp.set_threshold(-18.0);
        comp.set_ratio(4.0);
        comp.set_knee(6.0);
        // 12 dB over threshold at 4:1 → 9 dB of reduction
        assert!((comp.calculate_gain_reduction(-6.0) - 9.0).abs() < 1e-9);
        assert_eq!(comp.calculate_gain_reduction(-30.0), 0.0);
        // Inside the knee the curve is continuous and below the hard-knee line
        let in_knee = comp.calculate_gain_reduction(-18.0);
        assert!(in_knee > 0.0 && in_knee < 1.0);
    }

    #[test]
    fn test_compressor_steady_tone() {
        let mut comp = StereoCompressor::new(SR);
        comp.set_both(|c| {
            c.set_threshold(-18.0);
            c.set_ratio(4.0);
        });
        let input = sine(1000.0, db_to_gain(-6.0), 48000);
        let mut left = input.clone();
        let mut right = input.clone();
        comp.process_block(&mut left, &mut right);

        let tail = 48000 - 4800;
        let reduction = gain_to_db(peak_abs(&input[tail..]) / peak_abs(&left[tail..]));
        assert!((reduction - 9.0).abs() < 0.3, "reduction {reduction}");
    }

    #[test]
    fn test_compressor_types() {
        for ty in [CompressorType::Vca, CompressorType::Opto, CompressorType::Fet] {
            let mut comp = Compressor::new(SR);
            comp.set_type(ty);
            comp.set_threshold(-20.0);
            let mut buf = sine(440.0, 0.8, 4800);
            comp.process_block(&mut buf);
            assert!(buf.iter().all(|s| s.is_finite()));
            assert!(comp.gain_reduction_db() > 0.0, "{ty:?}");
        }
    }

    #[test]
    fn test_true_peak_limiter_ceiling() {
        let mut limiter = TruePeakLimiter::new(SR);
        limiter.set_ceiling(-1.0);
        limiter.set_input_gain(12.0);
        let input = sine(997.0, 0.9, 9600);
        let mut left = input.clone();
        let mut right = input;
        limiter.process_block(&mut left, &mut right);

        let ceiling = db_to_gain(-1.0);
        assert!(peak_abs(&left) <= ceiling + 1e-12);
        assert!(limiter.gain_reduction_db() > 10.0);
        assert_eq!(limiter.latency(), 72);
    }

    #[test]
    fn test_limiter_passes_quiet_signal_delayed() {
        let mut limiter = TruePeakLimiter::new(SR);
        let mut left = vec![0.0; 200];
        let mut right = vec![0.0; 200];
        left[0] = 0.25;
        right[0] = 0.25;
        limiter.process_block(&mut left, &mut right);
        let delay = limiter.latency();
        assert!((left[delay] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_gate_with_hold() {
        let mut gate = Gate::new(SR);
        gate.set_threshold(-30.0);
        gate.set_hold(10.0);

        let mut loud_l = sine(200.0, 0.5, 4800);
        let mut loud_r = loud_l.clone();
        gate.process_block(&mut loud_l, &mut loud_r);
        assert!(gate.is_open());

        let mut quiet_l = sine(200.0, 0.001, 48000);
        let mut quiet_r = quiet_l.clone();
        gate.process_block(&mut quiet_l, &mut quiet_r);
        assert!(!gate.is_open());
        assert!(peak_abs(&quiet_l[40000..]) < 1e-5);
    }

    #[test]
    fn test_expander_attenuates_below_threshold() {
        let exp = Expander::new(SR);
        assert_eq!(exp.gain_db(-10.0), 0.0);
        assert!((exp.gain_db(-50.0) - (-20.0)).abs() < 1e-9);
        // Range floors the reduction
        assert_eq!(exp.gain_db(-140.0), -60.0);
    }

    #[test]
    fn test_deesser_targets_sibilance() {
        let run = |freq: f64| {
            let mut deesser = DeEsser::new(SR);
            let mut l = sine(freq, 0.5, 9600);
            let mut r = l.clone();
            deesser.process_block(&mut l, &mut r);
            deesser.gain_reduction_db()
        };
        assert!(run(6500.0) > 6.0);
        assert!(run(200.0) < 1.0);
    }
}
