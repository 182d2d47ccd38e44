pub mod app;
pub mod audio;
pub mod config;
pub mod controller;
pub mod device;
pub mod display;
pub mod error;
pub mod events;
pub mod frame;
pub mod keyboard_input;
pub mod mode;
pub mod pipeline;
pub mod recovery;

pub use app::{ComponentState, InputEvent, ShutdownReason, SimulatedPipeline, SnapcamOrchestrator};
pub use audio::{Cue, CueBank, CuePlayer, SimulatedCuePlayer};
pub use config::SnapcamConfig;
pub use controller::{CaptureController, CaptureStats, CompletionOutcome};
pub use device::{CaptureDevice, Interrupt, SensorFlip, SensorSelect, SimulatedDevice};
pub use display::{DisplaySync, PresentationSurface, RecordingSurface, Screen, TickOutcome};
pub use error::{Result, SnapcamError};
pub use events::{EventBus, EventFilter, EventReceiver, PipelineEvent};
pub use frame::{FrameBufferSet, FrameGeometry, ReelBuffer};
pub use mode::{CaptureModeManager, Mode, Transition};
pub use pipeline::{Button, Pipeline, PipelineState, PipelineStatus};
pub use recovery::RetryPolicy;
