//! Insert engine errors and their wire status codes

use thiserror::Error;

/// Status code returned across the command surface (0 = success)
pub type StatusCode = i32;

pub const STATUS_OK: StatusCode = 0;

/// Every failure a control command can report
///
/// Codes are part of the wire contract and never change meaning.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InsertError {
    #[error("Track {0} does not exist")]
    InvalidTrack(u32),

    #[error("Slot {0} is out of range")]
    InvalidSlot(usize),

    #[error("Unknown processor type: {0}")]
    UnknownProcessorType(String),

    #[error("Parameter index {index} out of range (processor declares {count})")]
    ParamIndexOutOfRange { index: usize, count: usize },

    #[error("No processor loaded in slot {0}")]
    ProcessorNotLoaded(usize),

    #[error("Invalid parameter value: {0}")]
    InvalidValue(f64),

    #[error("Track {0} already exists")]
    TrackExists(u32),

    #[error("Track limit reached ({0})")]
    TrackLimitReached(usize),

    #[error("Render hand-off queue is full")]
    QueueFull,

    #[error("Invalid preset: {0}")]
    InvalidPreset(String),

    #[error("Insert engine not initialized")]
    NotInitialized,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl InsertError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidTrack(_) => -1,
            Self::InvalidSlot(_) => -2,
            Self::UnknownProcessorType(_) => -3,
            Self::ParamIndexOutOfRange { .. } => -4,
            Self::ProcessorNotLoaded(_) => -5,
            Self::InvalidValue(_) => -6,
            Self::TrackExists(_) => -7,
            Self::TrackLimitReached(_) => -8,
            Self::QueueFull => -9,
            Self::InvalidPreset(_) => -10,
            Self::NotInitialized => -11,
            Self::InvalidArgument(_) => -12,
        }
    }
}

/// Collapse a command result into its status code
pub fn status_of<T>(result: &Result<T, InsertError>) -> StatusCode {
    match result {
        Ok(_) => STATUS_OK,
        Err(e) => e.status_code(),
    }
}
