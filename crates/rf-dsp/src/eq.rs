//! Equalizers
//!
//! - `ParametricEq`: 64-band parametric EQ, per-band dynamic gain
//! - `PultecEq`: passive-style program EQ with the boost/atten "trick"
//!
//! All bands are allocated up front; enabling a band or changing its shape
//! only rewrites coefficients.

use rf_core::{Sample, db_to_gain, gain_to_db};

use crate::biquad::{BiquadCoeffs, BiquadTDF2, FilterType};
use crate::dynamics::EnvelopeFollower;
use crate::smoothing::ParamSmoother;
use crate::{MonoProcessor, Processor, StereoProcessor};

/// Number of bands in `ParametricEq`
pub const EQ_MAX_BANDS: usize = 64;

/// Dynamic bands recompute coefficients at this interval (samples)
const DYNAMIC_UPDATE_INTERVAL: usize = 32;

/// EQ band shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EqShape {
    #[default]
    Bell,
    LowShelf,
    HighShelf,
    LowCut,
    HighCut,
    Notch,
    BandPass,
}

impl EqShape {
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Self::LowShelf,
            2 => Self::HighShelf,
            3 => Self::LowCut,
            4 => Self::HighCut,
            5 => Self::Notch,
            6 => Self::BandPass,
            _ => Self::Bell,
        }
    }

    /// Shapes whose gain parameter does anything (and so can be dynamic)
    pub fn has_gain(&self) -> bool {
        matches!(self, Self::Bell | Self::LowShelf | Self::HighShelf)
    }

    fn filter_type(&self) -> FilterType {
        match self {
            Self::Bell => FilterType::Peaking,
            Self::LowShelf => FilterType::LowShelf,
            Self::HighShelf => FilterType::HighShelf,
            Self::LowCut => FilterType::Highpass,
            Self::HighCut => FilterType::Lowpass,
            Self::Notch => FilterType::Notch,
            Self::BandPass => FilterType::Bandpass,
        }
    }
}

/// Dynamic EQ settings for a band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicEqParams {
    pub enabled: bool,
    pub threshold_db: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
    /// Maximum gain reduction in dB
    pub range_db: f64,
}

impl Default for DynamicEqParams {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_db: -20.0,
            ratio: 2.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            range_db: 12.0,
        }
    }
}

/// Single EQ band
#[derive(Debug, Clone)]
pub struct EqBand {
    enabled: bool,
    shape: EqShape,
    frequency: f64,
    gain_db: f64,
    q: f64,
    dynamic: DynamicEqParams,

    filter_l: BiquadTDF2,
    filter_r: BiquadTDF2,
    detector: BiquadTDF2,
    envelope: EnvelopeFollower,
    /// Gain the current coefficients were built with
    applied_gain_db: f64,

    sample_rate: f64,
    needs_update: bool,
}

impl EqBand {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            enabled: false,
            shape: EqShape::Bell,
            frequency: 1000.0,
            gain_db: 0.0,
            q: 0.707,
            dynamic: DynamicEqParams::default(),
            filter_l: BiquadTDF2::new(sample_rate),
            filter_r: BiquadTDF2::new(sample_rate),
            detector: BiquadTDF2::new(sample_rate),
            envelope: EnvelopeFollower::new(sample_rate),
            applied_gain_db: 0.0,
            sample_rate,
            needs_update: true,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            // Coming back from idle: don't replay stale filter memory
            self.filter_l.reset();
            self.filter_r.reset();
        }
        self.enabled = enabled;
    }

    /// Set band parameters
    pub fn set_params(&mut self, freq: f64, gain_db: f64, q: f64, shape: EqShape) {
        let freq = freq.clamp(10.0, 30000.0);
        let gain_db = gain_db.clamp(-30.0, 30.0);
        let q = q.clamp(0.05, 50.0);
        if freq != self.frequency || gain_db != self.gain_db || q != self.q || shape != self.shape
        {
            self.frequency = freq;
            self.gain_db = gain_db;
            self.q = q;
            self.shape = shape;
            self.needs_update = true;
        }
    }

    pub fn set_dynamic(&mut self, dynamic: DynamicEqParams) {
        if dynamic != self.dynamic {
            self.envelope.set_times(dynamic.attack_ms, dynamic.release_ms);
            self.dynamic = dynamic;
            self.needs_update = true;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }

    pub fn shape(&self) -> EqShape {
        self.shape
    }

    /// Gain the band is currently applying, after dynamics
    pub fn applied_gain_db(&self) -> f64 {
        self.applied_gain_db
    }

    fn is_dynamic(&self) -> bool {
        self.dynamic.enabled && self.shape.has_gain()
    }

    fn set_filter_gain(&mut self, gain_db: f64) {
        let coeffs = BiquadCoeffs::design(
            self.shape.filter_type(),
            self.frequency,
            self.q,
            gain_db,
            self.sample_rate,
        );
        self.filter_l.set_coeffs(coeffs);
        self.filter_r.set_coeffs(coeffs);
        self.applied_gain_db = gain_db;
    }

    /// Update filter coefficients if anything changed
    pub fn update_coeffs(&mut self) {
        if !self.needs_update {
            return;
        }
        self.needs_update = false;
        self.detector
            .set_bandpass(self.frequency, self.q.clamp(0.3, 10.0));
        self.set_filter_gain(self.gain_db);
    }

    /// Dynamic gain for the level measured over the last chunk
    fn dynamic_gain_db(&self, level: f64) -> f64 {
        let over = gain_to_db(level) - self.dynamic.threshold_db;
        if over <= 0.0 {
            return self.gain_db;
        }
        let reduction = (over * (1.0 - 1.0 / self.dynamic.ratio)).min(self.dynamic.range_db);
        self.gain_db - reduction
    }

    fn filter(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            *l = self.filter_l.process_sample(*l);
            *r = self.filter_r.process_sample(*r);
        }
    }

    pub fn process_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        if !self.enabled {
            return;
        }
        self.update_coeffs();

        if !self.is_dynamic() {
            self.filter(left, right);
            return;
        }

        for (l, r) in left
            .chunks_mut(DYNAMIC_UPDATE_INTERVAL)
            .zip(right.chunks_mut(DYNAMIC_UPDATE_INTERVAL))
        {
            let mut level: f64 = 0.0;
            for (sl, sr) in l.iter().zip(r.iter()) {
                let key = self.detector.process_sample((sl + sr) * 0.5);
                level = level.max(self.envelope.process(key));
            }
            let target = self.dynamic_gain_db(level);
            if (target - self.applied_gain_db).abs() > 0.01 {
                self.set_filter_gain(target);
            }
            self.filter(l, r);
        }
    }

    pub fn reset(&mut self) {
        self.filter_l.reset();
        self.filter_r.reset();
        self.detector.reset();
        self.envelope.reset();
        self.needs_update = true;
    }
}

/// 64-band parametric EQ with dynamic bands and output gain
#[derive(Debug, Clone)]
pub struct ParametricEq {
    bands: Vec<EqBand>,
    output_gain: ParamSmoother,
}

impl ParametricEq {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            bands: (0..EQ_MAX_BANDS).map(|_| EqBand::new(sample_rate)).collect(),
            output_gain: ParamSmoother::new(sample_rate, 1.0),
        }
    }

    pub fn band(&self, index: usize) -> Option<&EqBand> {
        self.bands.get(index)
    }

    pub fn band_mut(&mut self, index: usize) -> Option<&mut EqBand> {
        self.bands.get_mut(index)
    }

    pub fn set_output_gain_db(&mut self, db: f64) {
        self.output_gain.set_target(db_to_gain(db.clamp(-24.0, 24.0)));
    }

    pub fn enabled_bands(&self) -> usize {
        self.bands.iter().filter(|b| b.is_enabled()).count()
    }
}

impl Processor for ParametricEq {
    fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
        self.output_gain.snap();
    }
}

impl StereoProcessor for ParametricEq {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let mut l = [left];
        let mut r = [right];
        self.process_block(&mut l, &mut r);
        (l[0], r[0])
    }

    fn process_block(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        for band in self.bands.iter_mut().filter(|b| b.is_enabled()) {
            band.process_block(left, right);
        }
        if self.output_gain.is_smoothing() || self.output_gain.current() != 1.0 {
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                let g = self.output_gain.next();
                *l *= g;
                *r *= g;
            }
        }
    }
}

// ============ Pultec ============

/// Pultec low frequency selections (Hz)
pub const PULTEC_LOW_FREQS: [f64; 4] = [20.0, 30.0, 60.0, 100.0];
/// Pultec high boost selections (Hz)
pub const PULTEC_HIGH_BOOST_FREQS: [f64; 7] =
    [3000.0, 4000.0, 5000.0, 8000.0, 10000.0, 12000.0, 16000.0];
/// Pultec high atten selections (Hz)
pub const PULTEC_HIGH_ATTEN_FREQS: [f64; 3] = [5000.0, 10000.0, 20000.0];

/// dB per knob step for boost and atten
const PULTEC_BOOST_DB_PER_STEP: f64 = 1.35;
const PULTEC_ATTEN_DB_PER_STEP: f64 = 1.75;

/// Pultec EQP-1A style settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PultecSettings {
    /// 0-10
    pub low_boost: f64,
    /// 0-10
    pub low_atten: f64,
    pub low_freq: f64,
    /// 0-10
    pub high_boost: f64,
    pub high_boost_freq: f64,
    /// 0 = sharp, 1 = broad
    pub high_bandwidth: f64,
    /// 0-10
    pub high_atten: f64,
    pub high_atten_freq: f64,
    pub output_db: f64,
}

impl Default for PultecSettings {
    fn default() -> Self {
        Self {
            low_boost: 0.0,
            low_atten: 0.0,
            low_freq: 60.0,
            high_boost: 0.0,
            high_boost_freq: 8000.0,
            high_bandwidth: 0.5,
            high_atten: 0.0,
            high_atten_freq: 10000.0,
            output_db: 0.0,
        }
    }
}

/// Passive program EQ
///
/// Boost and atten on the same low frequency overlap: the atten shelf sits
/// half an octave higher, leaving a bump below a dip.
#[derive(Debug, Clone)]
pub struct PultecEq {
    settings: PultecSettings,
    // [low boost, low atten, high boost, high atten]
    stages_l: [BiquadTDF2; 4],
    stages_r: [BiquadTDF2; 4],
    output: ParamSmoother,
    sample_rate: f64,
}

impl PultecEq {
    pub fn new(sample_rate: f64) -> Self {
        let stage = BiquadTDF2::new(sample_rate);
        let mut eq = Self {
            settings: PultecSettings::default(),
            stages_l: [stage.clone(), stage.clone(), stage.clone(), stage.clone()],
            stages_r: [stage.clone(), stage.clone(), stage.clone(), stage],
            output: ParamSmoother::new(sample_rate, 1.0),
            sample_rate,
        };
        eq.apply(PultecSettings::default());
        eq
    }

    pub fn settings(&self) -> PultecSettings {
        self.settings
    }

    pub fn apply(&mut self, settings: PultecSettings) {
        let sr = self.sample_rate;
        let low_q = 0.5 + (settings.low_freq / 100.0) * 0.3;
        let high_q = 0.3 + (1.0 - settings.high_bandwidth.clamp(0.0, 1.0)) * 2.0;

        let coeffs = [
            BiquadCoeffs::low_shelf(
                settings.low_freq,
                low_q,
                settings.low_boost.clamp(0.0, 10.0) * PULTEC_BOOST_DB_PER_STEP,
                sr,
            ),
            BiquadCoeffs::low_shelf(
                settings.low_freq * 1.5,
                0.4,
                -settings.low_atten.clamp(0.0, 10.0) * PULTEC_ATTEN_DB_PER_STEP,
                sr,
            ),
            BiquadCoeffs::peaking(
                settings.high_boost_freq,
                high_q,
                settings.high_boost.clamp(0.0, 10.0) * PULTEC_BOOST_DB_PER_STEP,
                sr,
            ),
            BiquadCoeffs::high_shelf(
                settings.high_atten_freq,
                0.5,
                -settings.high_atten.clamp(0.0, 10.0) * PULTEC_ATTEN_DB_PER_STEP,
                sr,
            ),
        ];
        for (i, c) in coeffs.into_iter().enumerate() {
            self.stages_l[i].set_coeffs(c);
            self.stages_r[i].set_coeffs(c);
        }
        self.output
            .set_target(db_to_gain(settings.output_db.clamp(-12.0, 12.0)));
        self.settings = settings;
    }
}

impl Processor for PultecEq {
    fn reset(&mut self) {
        for stage in self.stages_l.iter_mut().chain(self.stages_r.iter_mut()) {
            stage.reset();
        }
        self.output.snap();
    }
}

impl StereoProcessor for PultecEq {
    #[inline(always)]
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let mut l = left;
        let mut r = right;
        for (sl, sr) in self.stages_l.iter_mut().zip(self.stages_r.iter_mut()) {
            l = sl.process_sample(l);
            r = sr.process_sample(r);
        }
        let g = self.output.next();
        (l * g, r * g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_core::peak_abs;
    use std::f64::consts::PI;

    const SR: f64 = 48000.0;

    fn tone_gain_db(eq: &mut impl StereoProcessor, freq: f64) -> f64 {
        let input: Vec<f64> = (0..24000)
            .map(|i| 0.25 * (2.0 * PI * freq * i as f64 / SR).sin())
            .collect();
        let mut l = input.clone();
        let mut r = input.clone();
        eq.process_block(&mut l, &mut r);
        gain_to_db(peak_abs(&l[12000..]) / peak_abs(&input[12000..]))
    }

    #[test]
    fn test_disabled_eq_is_transparent() {
        let mut eq = ParametricEq::new(SR);
        assert_eq!(eq.enabled_bands(), 0);
        assert!(tone_gain_db(&mut eq, 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_bell_band() {
        let mut eq = ParametricEq::new(SR);
        let band = eq.band_mut(2).unwrap();
        band.set_params(2000.0, 6.0, 1.0, EqShape::Bell);
        band.set_enabled(true);
        assert!((tone_gain_db(&mut eq, 2000.0) - 6.0).abs() < 0.1);
    }

    #[test]
    fn test_output_gain() {
        let mut eq = ParametricEq::new(SR);
        eq.set_output_gain_db(-6.0);
        eq.reset();
        assert!((tone_gain_db(&mut eq, 500.0) + 6.0).abs() < 1e-6);
    }

    #[test]
    fn test_dynamic_band_reduces_gain_on_loud_input() {
        let mut eq = ParametricEq::new(SR);
        let band = eq.band_mut(0).unwrap();
        band.set_params(1000.0, 0.0, 1.0, EqShape::Bell);
        band.set_dynamic(DynamicEqParams {
            enabled: true,
            threshold_db: -30.0,
            ratio: 4.0,
            ..Default::default()
        });
        band.set_enabled(true);
        let gain = tone_gain_db(&mut eq, 1000.0);
        assert!(gain < -5.0, "gain {gain}");
        assert!(eq.band(0).unwrap().applied_gain_db() >= -12.0 - 1e-9);
    }

    #[test]
    fn test_pultec_boost() {
        let mut eq = PultecEq::new(SR);
        assert!(tone_gain_db(&mut eq, 1000.0).abs() < 0.05);
        eq.apply(PultecSettings {
            low_boost: 5.0,
            low_freq: 60.0,
            ..Default::default()
        });
        assert!(tone_gain_db(&mut eq, 30.0) > 3.0);
    }
}
