//! Error types for ReelForge

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum RfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias
pub type RfResult<T> = Result<T, RfError>;
