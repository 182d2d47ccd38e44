use super::types::{ComponentState, InputEvent, ShutdownReason};
use crate::audio::SimulatedCuePlayer;
use crate::config::SnapcamConfig;
use crate::device::SimulatedDevice;
use crate::display::RecordingSurface;
use crate::error::Result;
use crate::events::{EventFilter, EventReceiver, PipelineEvent};
use crate::keyboard_input::KeyboardInputHandler;
use crate::pipeline::Pipeline;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;

/// Pipeline over the simulated camera, cue player and screens
pub type SimulatedPipeline = Pipeline<SimulatedDevice, SimulatedCuePlayer, RecordingSurface>;

// Presentations kept for the final report
const PRESENTATION_HISTORY: usize = 64;

// Events worth a line in the log and a place in the session record
const NOTABLE_EVENTS: &[&str] = &[
    "recording_started",
    "recording_stopped",
    "sensor_switched",
    "suspended",
    "resumed",
    "fatal_error",
];

/// Owns the pipeline and drives it from one task
pub struct SnapcamOrchestrator {
    pub(super) pipeline: SimulatedPipeline,

    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,
    pub(super) input_sender: mpsc::UnboundedSender<InputEvent>,
    pub(super) input_receiver: mpsc::UnboundedReceiver<InputEvent>,
    pub(super) run_for: Option<Duration>,
    pub(super) notable_events: EventReceiver,
    pub(super) notable_log: Vec<PipelineEvent>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) shutdown_reason: Option<ShutdownReason>,
    pub(super) cancellation_token: CancellationToken,
}

impl SnapcamOrchestrator {
    pub fn new(config: SnapcamConfig) -> Result<Self> {
        let device = SimulatedDevice::with_faults(config.simulation.clone());
        let pipeline = Pipeline::new(
            config,
            device,
            SimulatedCuePlayer::new(),
            RecordingSurface::bounded(PRESENTATION_HISTORY),
        )?;

        let notable_events = EventReceiver::new(
            pipeline.events().subscribe(),
            EventFilter::EventTypes(NOTABLE_EVENTS.to_vec()),
            "orchestrator",
        );

        let (input_sender, input_receiver) = mpsc::unbounded_channel();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();
        let keyboard_handler = Some(KeyboardInputHandler::new(input_sender.clone()));

        Ok(Self {
            pipeline,
            keyboard_handler,
            keyboard_enabled: false,
            input_sender,
            input_receiver,
            run_for: None,
            notable_events,
            notable_log: Vec::new(),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            shutdown_reason: None,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable the keyboard input handler
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Stop on our own after `limit`
    pub fn set_run_for(&mut self, limit: Option<Duration>) {
        self.run_for = limit;
    }

    /// Extra input source next to the keyboard
    pub fn input_sender(&self) -> mpsc::UnboundedSender<InputEvent> {
        self.input_sender.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn pipeline(&self) -> &SimulatedPipeline {
        &self.pipeline
    }

    pub fn shutdown_reason(&self) -> Option<&ShutdownReason> {
        self.shutdown_reason.as_ref()
    }

    /// Recording, sensor, standby and fatal events seen so far, oldest first
    pub fn notable_events(&self) -> &[PipelineEvent] {
        &self.notable_log
    }
}
