//! DSP Processor Wrappers
//!
//! InsertProcessor implementations for the rf-dsp modules. Each wrapper maps
//! its parameter table onto DSP setters in `apply_params`, which runs on the
//! render thread whenever the shared block's epoch has moved.

use std::sync::Arc;

use rf_core::Sample;
use rf_dsp::dynamics::{
    CompressorType, DeEsser, DeEsserMode, Expander, Gate, Oversampling, StereoCompressor,
    TruePeakLimiter,
};
use rf_dsp::delay::PingPongDelay;
use rf_dsp::eq::{
    DynamicEqParams, EqShape, PULTEC_HIGH_ATTEN_FREQS, PULTEC_HIGH_BOOST_FREQS,
    PULTEC_LOW_FREQS, ParametricEq, PultecEq, PultecSettings,
};
use rf_dsp::reverb::{AlgorithmicReverb, RoomReverb};
use rf_dsp::saturation::{SaturationType, StereoSaturator};
use rf_dsp::{Processor, StereoProcessor};

use crate::params::{PRO_EQ_BAND_PARAMS, PRO_EQ_BANDS, PRO_EQ_OUTPUT_GAIN, eq_band};
use crate::processor::{InsertProcessor, ProcessorKind, ProcessorShared};

/// Longest delay time the delay table allows
const DELAY_MAX_MS: f64 = 2000.0;

// ============ Hosting ============

/// A DSP unit plus the mapping from its parameter table
pub trait DspWrapper: Send + 'static {
    const KIND: ProcessorKind;

    fn new(sample_rate: f64) -> Self;

    /// Push every parameter from the shared block into the DSP state
    fn apply_params(&mut self, params: &ProcessorShared);

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]);

    fn reset(&mut self);

    fn latency(&self) -> usize {
        0
    }
}

/// Insert processor hosting a [`DspWrapper`]
///
/// Re-applies parameters at the top of a buffer when the epoch moved, so a
/// control write is heard no later than the next buffer.
pub struct HostedProcessor<W: DspWrapper> {
    dsp: W,
    shared: Arc<ProcessorShared>,
    seen_epoch: u64,
}

impl<W: DspWrapper> HostedProcessor<W> {
    pub fn new(sample_rate: f64) -> Self {
        let shared = ProcessorShared::new(W::KIND);
        let mut dsp = W::new(sample_rate);
        let seen_epoch = shared.epoch();
        dsp.apply_params(&shared);
        // Start from the defaults, not a glide towards them
        dsp.reset();
        shared.publish_latency(dsp.latency());
        Self {
            dsp,
            shared,
            seen_epoch,
        }
    }

    #[inline]
    fn sync_params(&mut self) {
        let epoch = self.shared.epoch();
        if epoch != self.seen_epoch {
            self.seen_epoch = epoch;
            self.dsp.apply_params(&self.shared);
            self.shared.publish_latency(self.dsp.latency());
        }
    }
}

impl<W: DspWrapper> InsertProcessor for HostedProcessor<W> {
    fn shared(&self) -> &Arc<ProcessorShared> {
        &self.shared
    }

    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.sync_params();
        self.dsp.process(left, right);
    }

    fn reset(&mut self) {
        self.dsp.reset();
    }

    fn prime(&mut self) {
        self.sync_params();
        self.dsp.reset();
    }

    fn latency(&self) -> usize {
        self.dsp.latency()
    }
}

// ============ EQ Wrappers ============

/// 64-band parametric EQ
///
/// Band `b` occupies indices `b * 11 .. b * 11 + 11` (see `params::eq_band`);
/// index 704 is the output gain.
pub struct ProEqWrapper {
    eq: ParametricEq,
}

impl DspWrapper for ProEqWrapper {
    const KIND: ProcessorKind = ProcessorKind::ProEq;

    fn new(sample_rate: f64) -> Self {
        Self {
            eq: ParametricEq::new(sample_rate),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        let per_band = PRO_EQ_BAND_PARAMS.len();
        for b in 0..PRO_EQ_BANDS {
            let base = b * per_band;
            let Some(band) = self.eq.band_mut(b) else {
                break;
            };
            band.set_params(
                params.value(base + eq_band::FREQUENCY),
                params.value(base + eq_band::GAIN),
                params.value(base + eq_band::Q),
                EqShape::from_index(params.choice(base + eq_band::SHAPE)),
            );
            band.set_dynamic(DynamicEqParams {
                enabled: params.flag(base + eq_band::DYN_ENABLED),
                threshold_db: params.value(base + eq_band::DYN_THRESHOLD),
                ratio: params.value(base + eq_band::DYN_RATIO),
                attack_ms: params.value(base + eq_band::DYN_ATTACK),
                release_ms: params.value(base + eq_band::DYN_RELEASE),
                range_db: params.value(base + eq_band::DYN_RANGE),
            });
            band.set_enabled(params.flag(base + eq_band::ENABLED));
        }
        self.eq
            .set_output_gain_db(params.value(PRO_EQ_OUTPUT_GAIN));
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.eq.process_block(left, right);
    }

    fn reset(&mut self) {
        self.eq.reset();
    }
}

/// Pultec EQP-1A style EQ
///
/// Parameter layout:
///   0: Low Boost (0-10)     3: High Boost (0-10)        6: High Atten (0-10)
///   1: Low Atten (0-10)     4: High Boost Freq (enum)   7: High Atten Freq (enum)
///   2: Low Freq (enum)      5: Bandwidth (0-1)          8: Output (dB)
pub struct PultecWrapper {
    eq: PultecEq,
}

impl DspWrapper for PultecWrapper {
    const KIND: ProcessorKind = ProcessorKind::Pultec;

    fn new(sample_rate: f64) -> Self {
        Self {
            eq: PultecEq::new(sample_rate),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        let pick = |table: &[f64], index: usize| table[params.choice(index).min(table.len() - 1)];
        self.eq.apply(PultecSettings {
            low_boost: params.value(0),
            low_atten: params.value(1),
            low_freq: pick(&PULTEC_LOW_FREQS, 2),
            high_boost: params.value(3),
            high_boost_freq: pick(&PULTEC_HIGH_BOOST_FREQS, 4),
            high_bandwidth: params.value(5),
            high_atten: params.value(6),
            high_atten_freq: pick(&PULTEC_HIGH_ATTEN_FREQS, 7),
            output_db: params.value(8),
        });
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.eq.process_block(left, right);
    }

    fn reset(&mut self) {
        self.eq.reset();
    }
}

// ============ Dynamics Wrappers ============

/// Compressor
///
/// Parameter layout:
///   0: Threshold (dB)   3: Release (ms)   6: Knee (dB)
///   1: Ratio            4: Makeup (dB)    7: Type (VCA/Opto/FET)
///   2: Attack (ms)      5: Mix            8: Stereo Link
pub struct CompressorWrapper {
    comp: StereoCompressor,
}

impl DspWrapper for CompressorWrapper {
    const KIND: ProcessorKind = ProcessorKind::Compressor;

    fn new(sample_rate: f64) -> Self {
        Self {
            comp: StereoCompressor::new(sample_rate),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        let threshold = params.value(0);
        let ratio = params.value(1);
        let attack = params.value(2);
        let release = params.value(3);
        let makeup = params.value(4);
        let mix = params.value(5);
        let knee = params.value(6);
        let comp_type = CompressorType::from_index(params.choice(7));
        self.comp.set_both(|c| {
            c.set_type(comp_type);
            c.set_threshold(threshold);
            c.set_ratio(ratio);
            c.set_times(attack, release);
            c.set_makeup(makeup);
            c.set_mix(mix);
            c.set_knee(knee);
        });
        self.comp.set_link(params.value(8));
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.comp.process_block(left, right);
    }

    fn reset(&mut self) {
        self.comp.reset();
    }
}

/// True peak limiter
///
/// Parameter layout:
///   0: Input Trim (dB)   2: Release (ms)     4: Oversampling (1x/2x/4x/8x)
///   1: Ceiling (dBTP)    3: Lookahead (ms)   5: Stereo Link
pub struct LimiterWrapper {
    limiter: TruePeakLimiter,
}

impl DspWrapper for LimiterWrapper {
    const KIND: ProcessorKind = ProcessorKind::Limiter;

    fn new(sample_rate: f64) -> Self {
        Self {
            limiter: TruePeakLimiter::new(sample_rate),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        self.limiter.set_input_gain(params.value(0));
        self.limiter.set_ceiling(params.value(1));
        self.limiter.set_release(params.value(2));
        self.limiter.set_lookahead(params.value(3));
        self.limiter
            .set_oversampling(Oversampling::from_index(params.choice(4)));
        self.limiter.set_link(params.value(5));
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.limiter.process_block(left, right);
    }

    fn reset(&mut self) {
        self.limiter.reset();
    }

    fn latency(&self) -> usize {
        self.limiter.latency()
    }
}

pub struct GateWrapper {
    gate: Gate,
}

impl DspWrapper for GateWrapper {
    const KIND: ProcessorKind = ProcessorKind::Gate;

    fn new(sample_rate: f64) -> Self {
        Self {
            gate: Gate::new(sample_rate),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        self.gate.set_threshold(params.value(0));
        self.gate.set_range(params.value(1));
        self.gate.set_attack(params.value(2));
        self.gate.set_hold(params.value(3));
        self.gate.set_release(params.value(4));
        self.gate.set_hysteresis(params.value(5));
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.gate.process_block(left, right);
    }

    fn reset(&mut self) {
        self.gate.reset();
    }
}

pub struct ExpanderWrapper {
    expander: Expander,
}

impl DspWrapper for ExpanderWrapper {
    const KIND: ProcessorKind = ProcessorKind::Expander;

    fn new(sample_rate: f64) -> Self {
        Self {
            expander: Expander::new(sample_rate),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        self.expander.set_threshold(params.value(0));
        self.expander.set_ratio(params.value(1));
        self.expander.set_knee(params.value(2));
        self.expander.set_times(params.value(3), params.value(4));
        self.expander.set_range(params.value(5));
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.expander.process_block(left, right);
    }

    fn reset(&mut self) {
        self.expander.reset();
    }
}

/// De-esser
///
/// Parameter layout:
///   0: Frequency (Hz)   2: Range (dB)   4: Attack (ms)    6: Mode (Wideband/Split)
///   1: Threshold (dB)   3: Q            5: Release (ms)   7: Listen
pub struct DeEsserWrapper {
    deesser: DeEsser,
}

impl DspWrapper for DeEsserWrapper {
    const KIND: ProcessorKind = ProcessorKind::DeEsser;

    fn new(sample_rate: f64) -> Self {
        Self {
            deesser: DeEsser::new(sample_rate),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        self.deesser.set_band(params.value(0), params.value(3));
        self.deesser.set_threshold(params.value(1));
        self.deesser.set_range(params.value(2));
        self.deesser.set_times(params.value(4), params.value(5));
        self.deesser
            .set_mode(DeEsserMode::from_index(params.choice(6)));
        self.deesser.set_listen(params.flag(7));
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.deesser.process_block(left, right);
    }

    fn reset(&mut self) {
        self.deesser.reset();
    }
}

// ============ Time-based Wrappers ============

pub struct ReverbWrapper {
    reverb: RoomReverb,
}

impl DspWrapper for ReverbWrapper {
    const KIND: ProcessorKind = ProcessorKind::Reverb;

    fn new(sample_rate: f64) -> Self {
        Self {
            reverb: RoomReverb::new(sample_rate),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        self.reverb.set_room_size(params.value(0));
        self.reverb.set_damping(params.value(1));
        self.reverb.set_width(params.value(2));
        self.reverb.set_mix(params.value(3));
        self.reverb.set_predelay(params.value(4));
        self.reverb.set_freeze(params.flag(5));
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.reverb.process_block(left, right);
    }

    fn reset(&mut self) {
        self.reverb.reset();
    }
}

/// FDN reverb
///
/// Parameter layout:
///   0: Decay (s)     2: Damping     4: PreDelay (ms)   6: Mix
///   1: Size          3: Diffusion   5: Width (0-2)
pub struct AlgorithmicReverbWrapper {
    reverb: AlgorithmicReverb,
}

impl DspWrapper for AlgorithmicReverbWrapper {
    const KIND: ProcessorKind = ProcessorKind::AlgorithmicReverb;

    fn new(sample_rate: f64) -> Self {
        Self {
            reverb: AlgorithmicReverb::new(sample_rate),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        self.reverb.set_decay(params.value(0));
        self.reverb.set_size(params.value(1));
        self.reverb.set_damping(params.value(2));
        self.reverb.set_diffusion(params.value(3));
        self.reverb.set_predelay(params.value(4));
        self.reverb.set_width(params.value(5));
        self.reverb.set_mix(params.value(6));
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.reverb.process_block(left, right);
    }

    fn reset(&mut self) {
        self.reverb.reset();
    }
}

pub struct DelayWrapper {
    delay: PingPongDelay,
}

impl DspWrapper for DelayWrapper {
    const KIND: ProcessorKind = ProcessorKind::Delay;

    fn new(sample_rate: f64) -> Self {
        Self {
            delay: PingPongDelay::new(sample_rate, DELAY_MAX_MS),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        self.delay.set_delay_ms(params.value(0));
        self.delay.set_feedback(params.value(1));
        self.delay.set_dry_wet(params.value(2));
        self.delay.set_ping_pong(params.value(3));
        self.delay.set_hp_freq(params.value(4));
        self.delay.set_lp_freq(params.value(5));
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.delay.process_block(left, right);
    }

    fn reset(&mut self) {
        self.delay.reset();
    }
}

// ============ Color ============

pub struct SaturatorWrapper {
    saturator: StereoSaturator,
}

impl DspWrapper for SaturatorWrapper {
    const KIND: ProcessorKind = ProcessorKind::Saturator;

    fn new(sample_rate: f64) -> Self {
        Self {
            saturator: StereoSaturator::new(sample_rate),
        }
    }

    fn apply_params(&mut self, params: &ProcessorShared) {
        let drive = params.value(0);
        let sat_type = SaturationType::from_index(params.choice(1));
        let mix = params.value(2);
        let output = params.value(3);
        self.saturator.set_both(|s| {
            s.set_drive_db(drive);
            s.set_type(sat_type);
            s.set_mix(mix);
            s.set_output_db(output);
        });
    }

    fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) {
        self.saturator.process_block(left, right);
    }

    fn reset(&mut self) {
        self.saturator.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rf_core::{db_to_gain, peak_abs};

    const SR: f64 = 48000.0;

    fn sine(freq: f64, amplitude: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / SR).sin())
            .collect()
    }

    #[test]
    fn test_param_write_heard_next_buffer() {
        let mut proc = HostedProcessor::<ProEqWrapper>::new(SR);
        let mut l = vec![1.0; 64];
        let mut r = vec![1.0; 64];
        proc.process_stereo(&mut l, &mut r);
        assert_relative_eq!(l[63], 1.0, epsilon = 1e-12);

        proc.set_param(PRO_EQ_OUTPUT_GAIN, -6.0).unwrap();
        let mut l = vec![1.0; 4800];
        let mut r = vec![1.0; 4800];
        proc.process_stereo(&mut l, &mut r);
        assert_relative_eq!(l[4799], db_to_gain(-6.0), epsilon = 1e-6);
    }

    #[test]
    fn test_primed_instance_starts_at_stored_values() {
        let mut proc = HostedProcessor::<ProEqWrapper>::new(SR);
        proc.set_param(PRO_EQ_OUTPUT_GAIN, -6.0).unwrap();
        proc.prime();

        let mut l = vec![1.0; 64];
        let mut r = vec![1.0; 64];
        proc.process_stereo(&mut l, &mut r);
        assert_relative_eq!(l[0], db_to_gain(-6.0), epsilon = 1e-12);
        assert_relative_eq!(r[63], db_to_gain(-6.0), epsilon = 1e-12);
    }

    #[test]
    fn test_limiter_publishes_latency() {
        let mut proc = HostedProcessor::<LimiterWrapper>::new(SR);
        assert_eq!(proc.latency(), 72);
        assert_eq!(proc.shared().latency(), 72);

        proc.set_param(3, 5.0).unwrap();
        let mut l = vec![0.0; 16];
        let mut r = vec![0.0; 16];
        proc.process_stereo(&mut l, &mut r);
        assert_eq!(proc.latency(), 240);
        assert_eq!(proc.shared().latency(), 240);
    }

    #[test]
    fn test_every_kind_processes_finite() {
        let input = sine(440.0, 0.5, 4096);
        for kind in ProcessorKind::ALL {
            let mut proc = crate::registry::create_kind(kind, SR);
            let mut l = input.clone();
            let mut r = input.clone();
            proc.process_stereo(&mut l, &mut r);
            assert!(
                l.iter().chain(r.iter()).all(|s| s.is_finite()),
                "{kind} produced non-finite output"
            );
            assert!(peak_abs(&l) < 4.0, "{kind} blew up");
        }
    }

    #[test]
    fn test_saturator_drive_param() {
        let mut proc = HostedProcessor::<SaturatorWrapper>::new(SR);
        proc.set_param(1, 4.0).unwrap(); // Hard Clip
        proc.set_param(0, 20.0).unwrap();
        let mut l = sine(200.0, 0.5, 9600);
        let mut r = l.clone();
        proc.process_stereo(&mut l, &mut r);
        // Drive glides in; once settled the clipper holds the output at 1.0
        assert_relative_eq!(peak_abs(&l[4800..]), 1.0, epsilon = 1e-9);
    }
}
