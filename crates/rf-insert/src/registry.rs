//! Processor factory
//!
//! The single place that knows which processor kinds exist and how to build
//! them. Lookup is total over [`ProcessorKind`]: a valid id always yields an
//! instance, anything else is `UnknownProcessorType`.

use crate::dsp_wrappers::{
    AlgorithmicReverbWrapper, CompressorWrapper, DeEsserWrapper, DelayWrapper, ExpanderWrapper,
    GateWrapper, HostedProcessor, LimiterWrapper, ProEqWrapper, PultecWrapper, ReverbWrapper,
    SaturatorWrapper,
};
use crate::error::InsertError;
use crate::processor::{InsertProcessor, ProcessorKind};

/// Build a processor from a type id (canonical or alias)
pub fn create_processor(
    type_id: &str,
    sample_rate: f64,
) -> Result<Box<dyn InsertProcessor>, InsertError> {
    let kind: ProcessorKind = type_id.parse()?;
    Ok(create_kind(kind, sample_rate))
}

/// Build a processor of a known kind
pub fn create_kind(kind: ProcessorKind, sample_rate: f64) -> Box<dyn InsertProcessor> {
    match kind {
        ProcessorKind::ProEq => Box::new(HostedProcessor::<ProEqWrapper>::new(sample_rate)),
        ProcessorKind::Pultec => Box::new(HostedProcessor::<PultecWrapper>::new(sample_rate)),
        ProcessorKind::Compressor => {
            Box::new(HostedProcessor::<CompressorWrapper>::new(sample_rate))
        }
        ProcessorKind::Limiter => Box::new(HostedProcessor::<LimiterWrapper>::new(sample_rate)),
        ProcessorKind::Gate => Box::new(HostedProcessor::<GateWrapper>::new(sample_rate)),
        ProcessorKind::Expander => Box::new(HostedProcessor::<ExpanderWrapper>::new(sample_rate)),
        ProcessorKind::DeEsser => Box::new(HostedProcessor::<DeEsserWrapper>::new(sample_rate)),
        ProcessorKind::Reverb => Box::new(HostedProcessor::<ReverbWrapper>::new(sample_rate)),
        ProcessorKind::AlgorithmicReverb => {
            Box::new(HostedProcessor::<AlgorithmicReverbWrapper>::new(sample_rate))
        }
        ProcessorKind::Delay => Box::new(HostedProcessor::<DelayWrapper>::new(sample_rate)),
        ProcessorKind::Saturator => {
            Box::new(HostedProcessor::<SaturatorWrapper>::new(sample_rate))
        }
    }
}

/// Get list of all available processors (canonical ids)
pub fn available_processors() -> Vec<&'static str> {
    ProcessorKind::ALL.iter().map(|k| k.id()).collect()
}
