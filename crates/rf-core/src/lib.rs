//! rf-core: Shared types, traits, and utilities for ReelForge
//!
//! This crate provides the foundational types used across the insert-chain crates.

mod error;
mod params;
mod sample;

pub use error::*;
pub use params::*;
pub use sample::*;

/// Standard sample rate options
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u32)]
pub enum SampleRate {
    Hz44100 = 44100,
    Hz48000 = 48000,
    Hz88200 = 88200,
    Hz96000 = 96000,
    Hz176400 = 176400,
    Hz192000 = 192000,
}

impl SampleRate {
    #[inline]
    pub fn as_f64(self) -> f64 {
        self as u32 as f64
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Map a raw rate (e.g. from a host over the C ABI) onto a supported rate
    pub fn from_u32(hz: u32) -> RfResult<Self> {
        match hz {
            44100 => Ok(Self::Hz44100),
            48000 => Ok(Self::Hz48000),
            88200 => Ok(Self::Hz88200),
            96000 => Ok(Self::Hz96000),
            176400 => Ok(Self::Hz176400),
            192000 => Ok(Self::Hz192000),
            other => Err(RfError::InvalidSampleRate(other)),
        }
    }

    /// Number of whole samples covering `ms` milliseconds (at least one)
    #[inline]
    pub fn ms_to_samples(self, ms: f64) -> usize {
        ((ms * 0.001 * self.as_f64()).round() as usize).max(1)
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::Hz48000
    }
}

/// Buffer size options
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u32)]
pub enum BufferSize {
    Samples32 = 32,
    Samples64 = 64,
    Samples128 = 128,
    Samples256 = 256,
    Samples512 = 512,
    Samples1024 = 1024,
    Samples2048 = 2048,
    Samples4096 = 4096,
}

impl BufferSize {
    #[inline]
    pub fn as_usize(self) -> usize {
        self as u32 as usize
    }

    /// Calculate latency in milliseconds
    #[inline]
    pub fn latency_ms(self, sample_rate: SampleRate) -> f64 {
        (self.as_usize() as f64 / sample_rate.as_f64()) * 1000.0
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self::Samples256
    }
}

/// Decibel value wrapper
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Decibels(pub f64);

impl Decibels {
    pub const ZERO: Self = Self(0.0);
    pub const NEG_INF: Self = Self(f64::NEG_INFINITY);

    #[inline]
    pub fn from_gain(gain: f64) -> Self {
        if gain <= 0.0 {
            Self::NEG_INF
        } else {
            Self(20.0 * gain.log10())
        }
    }

    #[inline]
    pub fn to_gain(self) -> f64 {
        if self.0 <= -144.0 {
            0.0
        } else {
            10.0_f64.powf(self.0 / 20.0)
        }
    }
}

impl Default for Decibels {
    fn default() -> Self {
        Self::ZERO
    }
}

/// dB → linear gain
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    Decibels(db).to_gain()
}

/// Linear gain → dB, floored at -144 dB for silence
#[inline]
pub fn gain_to_db(gain: f64) -> f64 {
    if gain <= 1e-20 {
        -144.0
    } else {
        20.0 * gain.log10()
    }
}
