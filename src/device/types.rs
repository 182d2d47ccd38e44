use crate::error::DeviceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which image sensor is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorSelect {
    /// Both sensors in standby
    None,
    /// User-facing sensor
    Inner,
    /// Rotating outer sensor with the privacy LED
    Outer,
}

impl SensorSelect {
    /// The sensor a switch request moves to
    pub fn other(self) -> Self {
        match self {
            SensorSelect::Inner => SensorSelect::Outer,
            SensorSelect::Outer => SensorSelect::Inner,
            SensorSelect::None => SensorSelect::None,
        }
    }

    /// LED side effects only apply to the outer sensor
    pub fn is_external(self) -> bool {
        matches!(self, SensorSelect::Outer)
    }
}

impl fmt::Display for SensorSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorSelect::None => write!(f, "none"),
            SensorSelect::Inner => write!(f, "inner"),
            SensorSelect::Outer => write!(f, "outer"),
        }
    }
}

/// Readout orientation applied by the sensor itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorFlip {
    #[default]
    None,
    Horizontal,
    Vertical,
    Reverse,
}

/// Outer camera LED state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedState {
    On,
    Off,
    Blinking,
}

/// A single full-frame line transfer armed on the DMA engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    /// Capture slot the transfer writes into
    pub slot: usize,
    /// Bytes moved per chunk
    pub bytes_per_chunk: usize,
    /// Bytes in the whole frame
    pub frame_bytes: usize,
    /// Monotonic id so completions of abandoned transfers can be told apart
    pub sequence: u64,
}

/// Notifications a device raises asynchronously
#[derive(Debug, Clone, PartialEq)]
pub enum Interrupt {
    /// Sensor started a new frame
    Vsync,
    /// Receive buffer overran or the transfer fell out of step
    BufferError,
    /// Device finished an internal restart
    RebootComplete(Result<(), DeviceError>),
    /// An armed transfer finished moving a whole frame
    TransferComplete(TransferRequest),
}

impl Interrupt {
    pub fn kind(&self) -> &'static str {
        match self {
            Interrupt::Vsync => "vsync",
            Interrupt::BufferError => "buffer_error",
            Interrupt::RebootComplete(_) => "reboot_complete",
            Interrupt::TransferComplete(_) => "transfer_complete",
        }
    }
}
