//! Engine configuration

use std::fs;
use std::path::Path;

use rf_core::{BufferSize, RfError, RfResult, SampleRate};
use serde::{Deserialize, Serialize};

/// Largest render block the renderer will split a callback into
pub const MAX_BLOCK_SIZE_LIMIT: usize = 8192;

/// Longest crossfade accepted for bypass/mix/replace transitions
pub const MAX_CROSSFADE_MS: f64 = 50.0;

/// Most tracks one engine will host
pub const MAX_TRACKS_LIMIT: usize = 1024;

/// Largest control → render hand-off queue
pub const MAX_COMMAND_CAPACITY: usize = 65536;

/// Insert engine configuration
///
/// Fixed for the engine's lifetime. Changing the sample rate means building
/// a new engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: SampleRate,
    /// Scratch buffers are sized for this; longer callbacks are processed in chunks
    pub max_block_size: usize,
    pub max_tracks: usize,
    /// Linear crossfade used for bypass, mix, load, replace and remove
    pub crossfade_ms: f64,
    /// Control → render hand-off queue capacity
    pub command_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::Hz48000,
            max_block_size: BufferSize::Samples512.as_usize(),
            max_tracks: 64,
            crossfade_ms: 5.0,
            command_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Small blocks for live auditioning
    pub fn low_latency() -> Self {
        Self {
            max_block_size: BufferSize::Samples128.as_usize(),
            command_capacity: 256,
            ..Self::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: SampleRate) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn from_json_str(json: &str) -> RfResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| RfError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> RfResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json(&self) -> RfResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RfError::Serialization(e.to_string()))
    }

    pub fn validate(&self) -> RfResult<()> {
        if self.max_block_size == 0 || self.max_block_size > MAX_BLOCK_SIZE_LIMIT {
            return Err(RfError::InvalidConfig(format!(
                "max_block_size must be 1..={MAX_BLOCK_SIZE_LIMIT}, got {}",
                self.max_block_size
            )));
        }
        if self.max_tracks == 0 || self.max_tracks > MAX_TRACKS_LIMIT {
            return Err(RfError::InvalidConfig(format!(
                "max_tracks must be 1..={MAX_TRACKS_LIMIT}, got {}",
                self.max_tracks
            )));
        }
        if !self.crossfade_ms.is_finite()
            || self.crossfade_ms < 0.0
            || self.crossfade_ms > MAX_CROSSFADE_MS
        {
            return Err(RfError::InvalidConfig(format!(
                "crossfade_ms must be 0..={MAX_CROSSFADE_MS}, got {}",
                self.crossfade_ms
            )));
        }
        if self.command_capacity < 16 || self.command_capacity > MAX_COMMAND_CAPACITY {
            return Err(RfError::InvalidConfig(format!(
                "command_capacity must be 16..={MAX_COMMAND_CAPACITY}, got {}",
                self.command_capacity
            )));
        }
        Ok(())
    }

    /// Crossfade length in samples (at least one)
    pub fn fade_samples(&self) -> usize {
        self.sample_rate.ms_to_samples(self.crossfade_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fade_is_5ms() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fade_samples(), 240);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "max_tracks": 8 }"#).unwrap();
        assert_eq!(config.max_tracks, 8);
        assert_eq!(config.max_block_size, 512);
        assert_eq!(config.sample_rate, SampleRate::Hz48000);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(EngineConfig::from_json_str(r#"{ "max_block_size": 0 }"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{ "crossfade_ms": 500.0 }"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{ "max_tracks": 0 }"#).is_err());
        assert!(EngineConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_rejects_oversized_allocations() {
        let huge_tracks = EngineConfig {
            max_tracks: usize::MAX / 64,
            ..EngineConfig::default()
        };
        assert!(matches!(huge_tracks.validate(), Err(RfError::InvalidConfig(_))));

        let huge_queue = EngineConfig {
            command_capacity: MAX_COMMAND_CAPACITY + 1,
            ..EngineConfig::default()
        };
        assert!(matches!(huge_queue.validate(), Err(RfError::InvalidConfig(_))));

        let at_limits = EngineConfig {
            max_tracks: MAX_TRACKS_LIMIT,
            command_capacity: MAX_COMMAND_CAPACITY,
            ..EngineConfig::default()
        };
        assert!(at_limits.validate().is_ok());
        assert!(EngineConfig::from_json_str(r#"{ "max_tracks": 1025 }"#).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let config = EngineConfig::low_latency().with_sample_rate(SampleRate::Hz96000);
        fs::write(&path, config.to_json().unwrap()).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.fade_samples(), 480);
    }
}
