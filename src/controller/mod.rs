mod stats;
mod swap;

pub use stats::{CaptureStats, FrameRateMeter, FPS_REPORT_INTERVAL};
pub use swap::{CaptureController, CompletionOutcome};
