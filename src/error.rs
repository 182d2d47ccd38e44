use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapcamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },
}

/// Result codes a capture device reports back to the pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device busy during {operation}")]
    Busy { operation: &'static str },

    #[error("device in illegal state for {operation}")]
    IllegalState { operation: &'static str },

    #[error("fatal device failure during {operation}")]
    Fatal { operation: &'static str },

    #[error("device did not settle during {operation} within {waited:?}")]
    Timeout {
        operation: &'static str,
        waited: Duration,
    },
}

impl DeviceError {
    /// Transient codes clear on their own once the device finishes what it is doing
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DeviceError::Busy { .. } | DeviceError::IllegalState { .. } | DeviceError::Timeout { .. }
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, DeviceError::Fatal { .. })
    }
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Invalid frame geometry: {details}")]
    Geometry { details: String },

    #[error("Reel allocation failed: {details}")]
    ReelAllocation { details: String },

    #[error("Capture pipeline halted after fatal device error")]
    Halted,

    #[error("Capture pipeline is not running")]
    NotRunning,
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to load cue {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cue player did not accept {cue} after {attempts} attempts")]
    CueRejected { cue: &'static str, attempts: u32 },

    #[error("Cue player could not be reloaded: {details}")]
    Reload { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("No subscribers for event {event_type}")]
    NoSubscribers { event_type: &'static str },

    #[error("Receiver lagged behind by {missed} events")]
    Lagged { missed: u64 },

    #[error("Event bus closed")]
    ChannelClosed,
}

impl SnapcamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Whether the owning application can keep running after this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            SnapcamError::Device(e) => e.is_transient(),
            SnapcamError::Capture(CaptureError::Halted) => false,
            SnapcamError::Capture(_) => true,
            SnapcamError::Audio(_) => true,
            SnapcamError::EventBus(_) => true,
            SnapcamError::Config(_) | SnapcamError::Serialization(_) => false,
            SnapcamError::Io(_) => true,
            SnapcamError::System { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SnapcamError>;
