use serde::Serialize;
use std::fmt;
use tokio::time::Instant;

/// User-visible capture mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Idle,
    StillArmed,
    Recording,
    Playback,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Idle => write!(f, "idle"),
            Mode::StillArmed => write!(f, "still_armed"),
            Mode::Recording => write!(f, "recording"),
            Mode::Playback => write!(f, "playback"),
        }
    }
}

/// Progress of a still capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StillState {
    None,
    /// Waiting for the first display tick at or after `not_before`
    Pending { not_before: Instant },
    /// Snapshot taken on the display side, waiting to be shown
    Captured,
}

impl StillState {
    pub fn is_none(&self) -> bool {
        matches!(self, StillState::None)
    }
}

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingEnd {
    UserStopped,
    ReelFull,
    Suspended,
}

impl fmt::Display for RecordingEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingEnd::UserStopped => write!(f, "stopped by user"),
            RecordingEnd::ReelFull => write!(f, "reel full"),
            RecordingEnd::Suspended => write!(f, "suspended"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Recording,
    Playback,
    StillPending,
    NotRecording,
    ReelEmpty,
    Suspended,
    Halted,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::Recording => "recording in progress",
            RejectReason::Playback => "playback in progress",
            RejectReason::StillPending => "still capture pending",
            RejectReason::NotRecording => "not recording",
            RejectReason::ReelEmpty => "reel is empty",
            RejectReason::Suspended => "pipeline suspended",
            RejectReason::Halted => "pipeline halted",
        };
        f.write_str(text)
    }
}

/// Result of a user request against the mode manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Rejected(RejectReason),
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}
