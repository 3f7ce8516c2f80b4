//! Processor contract
//!
//! A processor instance is split in two:
//! - the DSP state, owned exclusively by the insert slot on the render thread
//! - a [`ProcessorShared`] block of atomics that the control side writes and
//!   the DSP state re-reads at the top of the next buffer
//!
//! The shared block belongs to exactly one instance. Replacing a processor
//! creates a fresh block, so nothing from the previous instance leaks into
//! the new one.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use rf_core::{AtomicParam, Sample};

use crate::error::InsertError;
use crate::params::{
    ALGORITHMIC_REVERB_PARAMS, COMPRESSOR_PARAMS, DEESSER_PARAMS, DELAY_PARAMS,
    EXPANDER_PARAMS, GATE_PARAMS, LIMITER_PARAMS, PRO_EQ_BAND_PARAMS, PRO_EQ_BANDS,
    PRO_EQ_GLOBAL_PARAMS, PULTEC_PARAMS, ParamAddress, ParamLayout, REVERB_PARAMS,
    SATURATOR_PARAMS,
};

// ============ Processor Kind ============

/// Every processor the engine can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessorKind {
    ProEq,
    Pultec,
    Compressor,
    Limiter,
    Gate,
    Expander,
    DeEsser,
    Reverb,
    AlgorithmicReverb,
    Delay,
    Saturator,
}

impl ProcessorKind {
    pub const ALL: [ProcessorKind; 11] = [
        Self::ProEq,
        Self::Pultec,
        Self::Compressor,
        Self::Limiter,
        Self::Gate,
        Self::Expander,
        Self::DeEsser,
        Self::Reverb,
        Self::AlgorithmicReverb,
        Self::Delay,
        Self::Saturator,
    ];

    /// Canonical type id used on the wire
    pub const fn id(self) -> &'static str {
        match self {
            Self::ProEq => "pro-eq",
            Self::Pultec => "pultec",
            Self::Compressor => "compressor",
            Self::Limiter => "limiter",
            Self::Gate => "gate",
            Self::Expander => "expander",
            Self::DeEsser => "deesser",
            Self::Reverb => "reverb",
            Self::AlgorithmicReverb => "algorithmic-reverb",
            Self::Delay => "delay",
            Self::Saturator => "saturator",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::ProEq => "ReelForge Pro-EQ 64",
            Self::Pultec => "ReelForge Pultec EQP-1A",
            Self::Compressor => "ReelForge Compressor",
            Self::Limiter => "ReelForge True Peak Limiter",
            Self::Gate => "ReelForge Gate",
            Self::Expander => "ReelForge Expander",
            Self::DeEsser => "ReelForge De-Esser",
            Self::Reverb => "ReelForge Room Reverb",
            Self::AlgorithmicReverb => "ReelForge Algorithmic Reverb",
            Self::Delay => "ReelForge Ping-Pong Delay",
            Self::Saturator => "ReelForge Saturator",
        }
    }

    pub const fn layout(self) -> ParamLayout {
        match self {
            Self::ProEq => ParamLayout::Banded {
                bands: PRO_EQ_BANDS,
                per_band: PRO_EQ_BAND_PARAMS,
                global: PRO_EQ_GLOBAL_PARAMS,
            },
            Self::Pultec => ParamLayout::Flat(PULTEC_PARAMS),
            Self::Compressor => ParamLayout::Flat(COMPRESSOR_PARAMS),
            Self::Limiter => ParamLayout::Flat(LIMITER_PARAMS),
            Self::Gate => ParamLayout::Flat(GATE_PARAMS),
            Self::Expander => ParamLayout::Flat(EXPANDER_PARAMS),
            Self::DeEsser => ParamLayout::Flat(DEESSER_PARAMS),
            Self::Reverb => ParamLayout::Flat(REVERB_PARAMS),
            Self::AlgorithmicReverb => ParamLayout::Flat(ALGORITHMIC_REVERB_PARAMS),
            Self::Delay => ParamLayout::Flat(DELAY_PARAMS),
            Self::Saturator => ParamLayout::Flat(SATURATOR_PARAMS),
        }
    }

    pub const fn param_count(self) -> usize {
        self.layout().count()
    }
}

impl FromStr for ProcessorKind {
    type Err = InsertError;

    /// Canonical ids plus the historical aliases, case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "pro-eq" | "proeq" | "pro_eq" | "eq" | "parametric-eq" => Self::ProEq,
            "pultec" | "pultec-eq" | "pultec_eq" | "eqp1a" => Self::Pultec,
            "compressor" | "comp" => Self::Compressor,
            "limiter" | "true-peak" | "truepeak" | "true-peak-limiter" => Self::Limiter,
            "gate" | "noise-gate" | "noise_gate" => Self::Gate,
            "expander" | "exp" => Self::Expander,
            "deesser" | "de-esser" | "de_esser" => Self::DeEsser,
            "reverb" | "room-reverb" | "room" => Self::Reverb,
            "algorithmic-reverb" | "algorithmic_reverb" | "algo-reverb" | "fdn-reverb" => {
                Self::AlgorithmicReverb
            }
            "delay" | "ping-pong-delay" | "pingpong" | "timeless" => Self::Delay,
            "saturator" | "saturation" | "saturn" => Self::Saturator,
            _ => return Err(InsertError::UnknownProcessorType(s.to_string())),
        };
        Ok(kind)
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ============ Shared Parameter Block ============

/// Control-visible state of one processor instance
///
/// Parameter stores are relaxed; `epoch` is bumped with release ordering after
/// every write, and the render side acquires it before re-reading values.
pub struct ProcessorShared {
    kind: ProcessorKind,
    layout: ParamLayout,
    values: Box<[AtomicParam]>,
    epoch: AtomicU64,
    latency: AtomicUsize,
}

impl ProcessorShared {
    /// Fresh block holding the kind's defaults
    pub fn new(kind: ProcessorKind) -> Arc<Self> {
        let layout = kind.layout();
        Arc::new(Self {
            kind,
            layout,
            values: layout.defaults().map(AtomicParam::new).collect(),
            epoch: AtomicU64::new(0),
            latency: AtomicUsize::new(0),
        })
    }

    pub fn kind(&self) -> ProcessorKind {
        self.kind
    }

    pub fn layout(&self) -> ParamLayout {
        self.layout
    }

    pub fn param_count(&self) -> usize {
        self.values.len()
    }

    fn check_index(&self, index: usize) -> Result<ParamAddress, InsertError> {
        self.layout
            .resolve(index)
            .ok_or(InsertError::ParamIndexOutOfRange {
                index,
                count: self.values.len(),
            })
    }

    pub fn get(&self, index: usize) -> Result<f64, InsertError> {
        self.check_index(index)?;
        Ok(self.values[index].get())
    }

    /// Store a normalized value and publish it; returns what was stored
    pub fn set(&self, index: usize, value: f64) -> Result<f64, InsertError> {
        self.check_index(index)?;
        if !value.is_finite() {
            return Err(InsertError::InvalidValue(value));
        }
        let stored = self
            .layout
            .descriptor(index)
            .map_or(value, |d| d.normalize(value));
        self.values[index].set(stored);
        self.epoch.fetch_add(1, Ordering::Release);
        Ok(stored)
    }

    /// Render-side read of an index known to be in range
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.values.get(index).map_or(0.0, AtomicParam::get)
    }

    #[inline]
    pub fn flag(&self, index: usize) -> bool {
        self.value(index) >= 0.5
    }

    #[inline]
    pub fn choice(&self, index: usize) -> usize {
        self.value(index).max(0.0) as usize
    }

    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn latency(&self) -> usize {
        self.latency.load(Ordering::Relaxed)
    }

    pub(crate) fn publish_latency(&self, samples: usize) {
        self.latency.store(samples, Ordering::Relaxed);
    }

    /// Every current value, in index order
    pub fn snapshot(&self) -> Vec<f64> {
        self.values.iter().map(AtomicParam::get).collect()
    }
}

impl fmt::Debug for ProcessorShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorShared")
            .field("kind", &self.kind)
            .field("params", &self.values.len())
            .field("epoch", &self.epoch.load(Ordering::Relaxed))
            .finish()
    }
}

// ============ Insert Processor Trait ============

/// Trait for insert effect processors
///
/// `process_stereo` runs on the render thread and must not allocate, lock or
/// block. Everything else is callable from the control thread through the
/// shared block.
pub trait InsertProcessor: Send {
    fn shared(&self) -> &Arc<ProcessorShared>;

    /// Process stereo audio in-place
    fn process_stereo(&mut self, left: &mut [Sample], right: &mut [Sample]);

    /// Clear internal state (filters, envelopes, delay lines)
    fn reset(&mut self);

    /// Take on the stored parameter values with no glide, from a clean state
    ///
    /// For a fresh instance on the control thread, before it is handed over.
    fn prime(&mut self) {
        self.reset();
    }

    /// Latency in samples
    fn latency(&self) -> usize {
        0
    }

    fn kind(&self) -> ProcessorKind {
        self.shared().kind()
    }

    fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    fn num_params(&self) -> usize {
        self.shared().param_count()
    }

    fn get_param(&self, index: usize) -> Result<f64, InsertError> {
        self.shared().get(index)
    }

    fn set_param(&self, index: usize, value: f64) -> Result<f64, InsertError> {
        self.shared().set(index, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve_to_canonical() {
        let cases = [
            ("ProEQ", ProcessorKind::ProEq),
            ("pro_eq", ProcessorKind::ProEq),
            ("COMP", ProcessorKind::Compressor),
            ("true-peak", ProcessorKind::Limiter),
            ("noise-gate", ProcessorKind::Gate),
            ("De-Esser", ProcessorKind::DeEsser),
            ("algo-reverb", ProcessorKind::AlgorithmicReverb),
            ("saturation", ProcessorKind::Saturator),
            ("ping-pong-delay", ProcessorKind::Delay),
        ];
        for (alias, kind) in cases {
            assert_eq!(alias.parse::<ProcessorKind>(), Ok(kind), "{alias}");
        }
        for kind in ProcessorKind::ALL {
            assert_eq!(kind.id().parse::<ProcessorKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            "ultra-eq".parse::<ProcessorKind>(),
            Err(InsertError::UnknownProcessorType("ultra-eq".into()))
        );
    }

    #[test]
    fn test_shared_set_get() {
        let shared = ProcessorShared::new(ProcessorKind::Compressor);
        assert_eq!(shared.param_count(), 9);
        assert_eq!(shared.get(0), Ok(-20.0));

        let before = shared.epoch();
        assert_eq!(shared.set(0, -18.0), Ok(-18.0));
        assert_eq!(shared.get(0), Ok(-18.0));
        assert!(shared.epoch() > before);

        // Clamped and quantized
        assert_eq!(shared.set(1, 100.0), Ok(20.0));
        assert_eq!(shared.set(7, 1.7), Ok(2.0));
    }

    #[test]
    fn test_shared_rejects_without_mutating() {
        let shared = ProcessorShared::new(ProcessorKind::Gate);
        let before = shared.snapshot();
        let epoch = shared.epoch();

        assert_eq!(
            shared.set(6, 1.0),
            Err(InsertError::ParamIndexOutOfRange { index: 6, count: 6 })
        );
        assert!(matches!(
            shared.set(0, f64::NAN),
            Err(InsertError::InvalidValue(_))
        ));
        assert_eq!(shared.snapshot(), before);
        assert_eq!(shared.epoch(), epoch);
    }
}
