//! rf-insert: Insert-Chain Processing Engine
//!
//! Hosts swappable DSP processors in fixed per-track insert chains:
//! - 8 insert slots per track, processed serially in slot order
//! - Numerically addressed, versioned parameter tables
//! - Lock-free control → render hand-off (rtrb), deferred reclamation
//! - Crossfaded bypass / mix / load / replace / remove
//! - Chain presets and a C ABI command surface
//!
//! [`InsertEngine::new`] returns the control half and the [`InsertRenderer`];
//! the renderer belongs on the audio thread.

// Audio engine uses explicit indexing in sample loops
#![allow(clippy::needless_range_loop)]

mod config;
mod dsp_wrappers;
mod engine;
mod error;
mod handoff;
mod insert_chain;
mod params;
mod preset;
mod processor;
mod registry;
mod renderer;

pub mod ffi;

pub use config::*;
pub use dsp_wrappers::{DspWrapper, HostedProcessor};
pub use engine::*;
pub use error::*;
pub use handoff::RenderStatsSnapshot;
pub use insert_chain::{InsertSlot, MAX_INSERT_SLOTS, SlotControls, TrackChain};
pub use params::*;
pub use preset::*;
pub use processor::*;
pub use registry::*;
pub use renderer::*;
