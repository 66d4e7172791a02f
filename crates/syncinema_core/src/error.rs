//! Engine Error Types

use thiserror::Error;

use crate::track::TrackId;

/// Errors that can occur in the sync engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("Playback host error: {0}")]
    Playback(String),

    #[error("Playback rejected by host: {0}")]
    PlayRejected(String),

    #[error("Output routing failed: {0}")]
    SinkError(String),

    #[error("Device enumeration failed: {0}")]
    DeviceEnumeration(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid project file: {0}")]
    InvalidProject(String),

    #[error("Project JSON error: {0}")]
    ProjectJson(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown EQ preset: {0}")]
    UnknownPreset(String),

    #[error("DSP error: {0}")]
    DspError(#[from] syncinema_dsp::DspError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
