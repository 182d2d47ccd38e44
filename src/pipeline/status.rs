use crate::controller::CaptureStats;
use crate::device::SensorSelect;
use crate::display::DisplayStats;
use crate::mode::Mode;
use serde::Serialize;
use std::fmt;

/// Pipeline lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Created,
    Running,
    Suspended,
    Halted,
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Created => write!(f, "created"),
            PipelineState::Running => write!(f, "running"),
            PipelineState::Suspended => write!(f, "suspended"),
            PipelineState::Halted => write!(f, "halted"),
            PipelineState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Point-in-time view of the pipeline for the debug report
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub sensor: SensorSelect,
    pub mode: Mode,
    pub write_index: usize,
    pub read_index: usize,
    pub pending_recapture: bool,
    pub stabilized_count: u32,
    pub stabilized: bool,
    pub reel_count: usize,
    pub reel_capacity: usize,
    pub reel_cursor: usize,
    pub last_fps: Option<f64>,
    pub capture: CaptureStats,
    pub display: DisplayStats,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Capture to slot {}, display from slot {} [{} on {} sensor, {}, reel {}/{}, stabilized {}",
            self.write_index,
            self.read_index,
            self.state,
            self.sensor,
            self.mode,
            self.reel_count,
            self.reel_capacity,
            self.stabilized_count
        )?;
        if let Some(fps) = self.last_fps {
            write!(f, ", {:.3} fps", fps)?;
        }
        write!(f, "]")
    }
}
