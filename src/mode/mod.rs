mod manager;
mod state;
#[cfg(test)]
mod tests;

pub use manager::CaptureModeManager;
pub use state::{Mode, RecordingEnd, RejectReason, StillState, Transition};
