mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::{SimulatedPipeline, SnapcamOrchestrator};
pub use types::{ComponentState, InputEvent, ShutdownReason};
