//! Biquad filter implementation using Transposed Direct Form II
//!
//! Coefficients follow the RBJ audio-EQ cookbook. TDF-II keeps quantization
//! noise low for f64 processing.

use rf_core::Sample;
use std::f64::consts::PI;

use crate::{MonoProcessor, Processor};

/// Biquad filter types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
    Allpass,
    Peaking,
    LowShelf,
    HighShelf,
}

/// Biquad coefficients (normalized, a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::bypass()
    }
}

/// Shared intermediate terms of the cookbook formulas
struct Omega {
    cos: f64,
    alpha: f64,
}

impl Omega {
    #[inline]
    fn new(freq: f64, q: f64, sample_rate: f64) -> Self {
        // Keep the center frequency strictly below Nyquist
        let freq = freq.clamp(1.0, sample_rate * 0.499);
        let w = 2.0 * PI * freq / sample_rate;
        Self {
            cos: w.cos(),
            alpha: w.sin() / (2.0 * q.max(1e-3)),
        }
    }
}

impl BiquadCoeffs {
    #[inline]
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Build coefficients for any filter type; gain is ignored by non-gain shapes
    pub fn design(filter: FilterType, freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        match filter {
            FilterType::Lowpass => Self::lowpass(freq, q, sample_rate),
            FilterType::Highpass => Self::highpass(freq, q, sample_rate),
            FilterType::Bandpass => Self::bandpass(freq, q, sample_rate),
            FilterType::Notch => Self::notch(freq, q, sample_rate),
            FilterType::Allpass => Self::allpass(freq, q, sample_rate),
            FilterType::Peaking => Self::peaking(freq, q, gain_db, sample_rate),
            FilterType::LowShelf => Self::low_shelf(freq, q, gain_db, sample_rate),
            FilterType::HighShelf => Self::high_shelf(freq, q, gain_db, sample_rate),
        }
    }

    pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let w = Omega::new(freq, q, sample_rate);
        let b1 = 1.0 - w.cos;
        Self::normalized(b1 / 2.0, b1, b1 / 2.0, 1.0 + w.alpha, -2.0 * w.cos, 1.0 - w.alpha)
    }

    pub fn highpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let w = Omega::new(freq, q, sample_rate);
        let b0 = (1.0 + w.cos) / 2.0;
        Self::normalized(b0, -(1.0 + w.cos), b0, 1.0 + w.alpha, -2.0 * w.cos, 1.0 - w.alpha)
    }

    /// Constant 0 dB peak gain bandpass
    pub fn bandpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let w = Omega::new(freq, q, sample_rate);
        Self::normalized(w.alpha, 0.0, -w.alpha, 1.0 + w.alpha, -2.0 * w.cos, 1.0 - w.alpha)
    }

    pub fn notch(freq: f64, q: f64, sample_rate: f64) -> Self {
        let w = Omega::new(freq, q, sample_rate);
        Self::normalized(1.0, -2.0 * w.cos, 1.0, 1.0 + w.alpha, -2.0 * w.cos, 1.0 - w.alpha)
    }

    pub fn allpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let w = Omega::new(freq, q, sample_rate);
        Self::normalized(
            1.0 - w.alpha,
            -2.0 * w.cos,
            1.0 + w.alpha,
            1.0 + w.alpha,
            -2.0 * w.cos,
            1.0 - w.alpha,
        )
    }

    pub fn peaking(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let w = Omega::new(freq, q, sample_rate);
        Self::normalized(
            1.0 + w.alpha * a,
            -2.0 * w.cos,
            1.0 - w.alpha * a,
            1.0 + w.alpha / a,
            -2.0 * w.cos,
            1.0 - w.alpha / a,
        )
    }

    pub fn low_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let w = Omega::new(freq, q, sample_rate);
        let k = 2.0 * a.sqrt() * w.alpha;
        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * w.cos + k),
            2.0 * a * ((a - 1.0) - (a + 1.0) * w.cos),
            a * ((a + 1.0) - (a - 1.0) * w.cos - k),
            (a + 1.0) + (a - 1.0) * w.cos + k,
            -2.0 * ((a - 1.0) + (a + 1.0) * w.cos),
            (a + 1.0) + (a - 1.0) * w.cos - k,
        )
    }

    pub fn high_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let w = Omega::new(freq, q, sample_rate);
        let k = 2.0 * a.sqrt() * w.alpha;
        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * w.cos + k),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * w.cos),
            a * ((a + 1.0) + (a - 1.0) * w.cos - k),
            (a + 1.0) - (a - 1.0) * w.cos + k,
            2.0 * ((a - 1.0) - (a + 1.0) * w.cos),
            (a + 1.0) - (a - 1.0) * w.cos - k,
        )
    }

    /// Bypass (unity gain, no filtering)
    pub const fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Magnitude response at `freq`, linear
    pub fn magnitude(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());
        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

/// Transposed Direct Form II biquad filter
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
    sample_rate: f64,
}

impl BiquadTDF2 {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_coeffs(BiquadCoeffs::bypass(), sample_rate)
    }

    pub fn with_coeffs(coeffs: BiquadCoeffs, sample_rate: f64) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
        }
    }

    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    #[inline]
    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn set(&mut self, filter: FilterType, freq: f64, q: f64, gain_db: f64) {
        self.coeffs = BiquadCoeffs::design(filter, freq, q, gain_db, self.sample_rate);
    }

    pub fn set_lowpass(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::lowpass(freq, q, self.sample_rate);
    }

    pub fn set_highpass(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::highpass(freq, q, self.sample_rate);
    }

    pub fn set_bandpass(&mut self, freq: f64, q: f64) {
        self.coeffs = BiquadCoeffs::bandpass(freq, q, self.sample_rate);
    }

    pub fn set_peaking(&mut self, freq: f64, q: f64, gain_db: f64) {
        self.coeffs = BiquadCoeffs::peaking(freq, q, gain_db, self.sample_rate);
    }

    pub fn set_low_shelf(&mut self, freq: f64, q: f64, gain_db: f64) {
        self.coeffs = BiquadCoeffs::low_shelf(freq, q, gain_db, self.sample_rate);
    }

    pub fn set_high_shelf(&mut self, freq: f64, q: f64, gain_db: f64) {
        self.coeffs = BiquadCoeffs::high_shelf(freq, q, gain_db, self.sample_rate);
    }

    pub fn set_bypass(&mut self) {
        self.coeffs = BiquadCoeffs::bypass();
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let output = self.coeffs.b0 * input + self.z1;
        self.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.z2;
        self.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }
}

/// First-order lowpass / highpass used in feedback paths and damping
#[derive(Debug, Clone, Default)]
pub struct OnePole {
    coeff: f64,
    state: f64,
}

impl OnePole {
    pub fn lowpass(freq: f64, sample_rate: f64) -> Self {
        let mut filter = Self::default();
        filter.set_freq(freq, sample_rate);
        filter
    }

    pub fn set_freq(&mut self, freq: f64, sample_rate: f64) {
        let freq = freq.clamp(1.0, sample_rate * 0.49);
        self.coeff = (-2.0 * PI * freq / sample_rate).exp();
    }

    /// Set the feedback coefficient directly (0 = no smoothing)
    pub fn set_coeff(&mut self, coeff: f64) {
        self.coeff = coeff.clamp(0.0, 0.9999);
    }

    #[inline(always)]
    pub fn lowpass_sample(&mut self, input: Sample) -> Sample {
        self.state = input + self.coeff * (self.state - input);
        self.state
    }

    #[inline(always)]
    pub fn highpass_sample(&mut self, input: Sample) -> Sample {
        input - self.lowpass_sample(input)
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}
