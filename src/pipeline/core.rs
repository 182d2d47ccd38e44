use super::input::Button;
use super::status::{PipelineState, PipelineStatus};
use crate::audio::{CueBank, CuePlayer};
use crate::config::SnapcamConfig;
use crate::controller::{CaptureController, CompletionOutcome};
use crate::device::{interrupt_line, CaptureDevice, Interrupt, InterruptReceiver};
use crate::display::{DisplaySync, PresentationSurface, Screen, TickOutcome};
use crate::error::{EventBusError, Result};
use crate::events::{EventBus, PipelineEvent, RecoveryCause};
use crate::frame::{FrameBufferSet, ReelBuffer};
use crate::mode::{CaptureModeManager, Mode, RecordingEnd, RejectReason, Transition};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Capture pipeline: device, buffers and the three handlers that share them
///
/// Everything runs on one task. Interrupts raised by the device are queued on
/// the interrupt line and handled by [`Pipeline::drain_interrupts`]; the owner
/// calls [`Pipeline::on_display_tick`] once per refresh and
/// [`Pipeline::service`] from its main loop.
pub struct Pipeline<D, A, S>
where
    D: CaptureDevice,
    A: CuePlayer,
    S: PresentationSurface,
{
    pub(super) config: SnapcamConfig,
    pub(super) device: D,
    pub(super) player: A,
    pub(super) surface: S,
    pub(super) buffers: FrameBufferSet,
    pub(super) reel: ReelBuffer,
    pub(super) controller: CaptureController,
    pub(super) display: DisplaySync,
    pub(super) mode: CaptureModeManager,
    pub(super) interrupts: InterruptReceiver,
    pub(super) events: EventBus,
    pub(super) state: PipelineState,
}

impl<D, A, S> Pipeline<D, A, S>
where
    D: CaptureDevice,
    A: CuePlayer,
    S: PresentationSurface,
{
    /// Allocate every buffer up front and attach to the device's interrupt line
    pub fn new(config: SnapcamConfig, mut device: D, player: A, surface: S) -> Result<Self> {
        let geometry = config.camera.geometry();
        let buffers = FrameBufferSet::new(geometry)?;
        let reel = ReelBuffer::with_budget(
            geometry,
            config.reel.memory_budget_bytes,
            config.reel.reserve_frames,
        )?;
        let cues = CueBank::load(&config.audio)?;

        let (line, interrupts) = interrupt_line();
        device.attach(line);

        let controller = CaptureController::new(&config.camera, &config.pipeline);
        let display = DisplaySync::new(config.reel.playback_divider);
        let mode = CaptureModeManager::new(cues, &config.audio, &config.reel, config.camera.sensor);
        let events = EventBus::new(config.system.event_bus_capacity);

        info!(
            "Pipeline ready: {}x{} frames, reel of {} frames",
            geometry.width,
            geometry.height,
            reel.capacity()
        );

        Ok(Self {
            config,
            device,
            player,
            surface,
            buffers,
            reel,
            controller,
            display,
            mode,
            interrupts,
            events,
            state: PipelineState::Created,
        })
    }

    /// Initialize the device and start the first capture
    pub async fn start(&mut self) -> Result<()> {
        if self.state != PipelineState::Created {
            debug!("Pipeline already started ({})", self.state);
            return Ok(());
        }

        if let Err(e) = self.controller.start(&mut self.device).await {
            if e.is_fatal() {
                self.state = PipelineState::Halted;
                self.emit(PipelineEvent::FatalError {
                    error: e.to_string(),
                });
            }
            return Err(e.into());
        }

        self.state = PipelineState::Running;
        self.emit(PipelineEvent::CaptureStarted {
            sensor: self.controller.sensor(),
        });
        Ok(())
    }

    /// Handle everything the device raised since the last call
    pub fn drain_interrupts(&mut self) -> Result<usize> {
        let mut handled = 0;
        loop {
            match self.interrupts.try_recv() {
                Ok(interrupt) => {
                    self.dispatch(interrupt)?;
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        Ok(handled)
    }

    /// Wait for the next interrupt and handle it
    pub async fn next_interrupt(&mut self) -> Result<bool> {
        match self.interrupts.recv().await {
            Some(interrupt) => {
                self.dispatch(interrupt)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn dispatch(&mut self, interrupt: Interrupt) -> Result<()> {
        if self.state == PipelineState::Halted {
            trace!("Dropping {} after halt", interrupt.kind());
            return Ok(());
        }

        match interrupt {
            Interrupt::Vsync => self.controller.on_vsync(),
            Interrupt::BufferError => {
                if self.controller.is_running() {
                    self.controller.on_buffer_error(&mut self.device);
                    self.emit(PipelineEvent::BufferRecovered {
                        cause: RecoveryCause::BufferError,
                        slot: self.controller.write_index(),
                    });
                }
            }
            Interrupt::RebootComplete(result) => {
                if let Err(e) = self.controller.on_reboot_complete(&mut self.device, result) {
                    self.state = PipelineState::Halted;
                    self.emit(PipelineEvent::FatalError {
                        error: e.to_string(),
                    });
                    return Err(e.into());
                }
                if self.controller.is_running() {
                    self.emit(PipelineEvent::BufferRecovered {
                        cause: RecoveryCause::Reboot,
                        slot: self.controller.write_index(),
                    });
                }
            }
            Interrupt::TransferComplete(request) => {
                if self.controller.accepts(&request) {
                    self.device
                        .receive_frame(&request, self.buffers.slot_mut(request.slot));
                }
                match self
                    .controller
                    .on_transfer_complete(&mut self.device, &request)
                {
                    CompletionOutcome::Promoted { finished, .. } => {
                        self.emit(PipelineEvent::FramePromoted { slot: finished });
                    }
                    CompletionOutcome::Desynced => {
                        self.emit(PipelineEvent::BufferRecovered {
                            cause: RecoveryCause::Desync,
                            slot: self.controller.write_index(),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// One display refresh: apply a pending sensor switch, then present
    pub fn on_display_tick(&mut self) -> Result<TickOutcome> {
        if self.state != PipelineState::Running {
            return Ok(TickOutcome::default());
        }

        match self.controller.apply_pending_switch(&mut self.device) {
            Ok(Some(sensor)) => {
                self.mode.sensor_switched(sensor);
                self.emit(PipelineEvent::SensorSwitched { sensor });
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => {
                self.state = PipelineState::Halted;
                self.emit(PipelineEvent::FatalError {
                    error: e.to_string(),
                });
                return Err(e.into());
            }
            Err(e) => debug!("Sensor switch not applied this tick: {}", e),
        }

        let outcome = self.display.tick(
            self.controller.write_index(),
            &mut self.buffers,
            &mut self.reel,
            &mut self.mode,
            &mut self.surface,
            Instant::now(),
        );

        if outcome.still_captured {
            self.emit(PipelineEvent::StillCaptured);
        }
        if outcome.playback_finished {
            self.emit(PipelineEvent::PlaybackFinished {
                frames_shown: self.reel.len(),
            });
        }
        Ok(outcome)
    }

    /// Main-loop work the tick hands off: recording epilogue and still review
    pub async fn service(&mut self) -> Result<()> {
        if let Some(reason) = self
            .mode
            .service(&mut self.device, &mut self.player, &self.reel)
            .await
        {
            self.emit_recording_stopped(reason);
        }

        if self.mode.take_captured_still() {
            self.surface.present(Screen::Review, self.buffers.snapshot());
            debug!("Still shown on review screen");
        }
        Ok(())
    }

    pub async fn handle_input(&mut self, button: Button) -> Result<Transition> {
        debug!("Button: {}", button);
        match button {
            Button::StandbyToggle => {
                match self.state {
                    PipelineState::Suspended => self.resume().await?,
                    PipelineState::Running => self.suspend().await?,
                    _ => return Ok(Transition::Rejected(self.unavailable_reason())),
                }
                Ok(Transition::Applied)
            }
            Button::DebugReport => {
                info!("{}", self.status());
                Ok(Transition::Applied)
            }
            Button::Shutter => Ok(self.request_still_capture().await),
            Button::RecordToggle => {
                if self.mode.is_recording() {
                    Ok(self.request_stop_recording(false).await)
                } else {
                    Ok(self.request_start_recording().await)
                }
            }
            Button::SwitchSensor => Ok(self.request_switch_sensor()),
            Button::PlaybackToggle => Ok(self.request_playback()),
        }
    }

    pub async fn request_still_capture(&mut self) -> Transition {
        if let Some(reason) = self.check_available() {
            return Transition::Rejected(reason);
        }
        let transition = self
            .mode
            .request_still_capture(&mut self.device, &mut self.player)
            .await;
        log_transition("still capture", transition);
        transition
    }

    pub async fn request_start_recording(&mut self) -> Transition {
        if let Some(reason) = self.check_available() {
            return Transition::Rejected(reason);
        }
        let transition = self
            .mode
            .request_start_recording(&mut self.device, &mut self.player, &mut self.reel)
            .await;
        if let (Transition::Applied, Some(session)) = (transition, self.mode.session()) {
            self.emit(PipelineEvent::RecordingStarted {
                session,
                capacity: self.reel.capacity(),
            });
        }
        log_transition("start recording", transition);
        transition
    }

    pub async fn request_stop_recording(&mut self, then_play: bool) -> Transition {
        if let Some(reason) = self.check_available() {
            return Transition::Rejected(reason);
        }
        let transition = self
            .mode
            .request_stop_recording(&mut self.device, &mut self.player, &self.reel, then_play)
            .await;
        if transition.is_applied() {
            self.emit_recording_stopped(RecordingEnd::UserStopped);
        }
        log_transition("stop recording", transition);
        transition
    }

    pub fn request_switch_sensor(&mut self) -> Transition {
        if let Some(reason) = self.check_available() {
            return Transition::Rejected(reason);
        }
        let transition = self.mode.request_switch_sensor(&mut self.controller);
        log_transition("switch sensor", transition);
        transition
    }

    pub fn request_playback(&mut self) -> Transition {
        if let Some(reason) = self.check_available() {
            return Transition::Rejected(reason);
        }
        let was_playing = self.mode.mode() == Mode::Playback;
        let transition = self.mode.request_playback(&self.reel);
        if transition.is_applied() {
            if was_playing {
                self.emit(PipelineEvent::PlaybackFinished {
                    frames_shown: self.mode.reel_cursor(),
                });
            } else {
                self.emit(PipelineEvent::PlaybackStarted {
                    frames: self.reel.len(),
                });
            }
        }
        log_transition("playback", transition);
        transition
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            state: self.state,
            sensor: self.controller.sensor(),
            mode: self.mode.mode(),
            write_index: self.controller.write_index(),
            read_index: self.display.read_index(),
            pending_recapture: self.controller.pending_recapture(),
            stabilized_count: self.controller.stabilized_count(),
            stabilized: self.controller.is_stabilized(),
            reel_count: self.reel.len(),
            reel_capacity: self.reel.capacity(),
            reel_cursor: self.mode.reel_cursor(),
            last_fps: self.controller.last_fps(),
            capture: self.controller.stats().clone(),
            display: self.display.stats().clone(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &SnapcamConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn player(&self) -> &A {
        &self.player
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    pub fn display(&self) -> &DisplaySync {
        &self.display
    }

    pub fn mode(&self) -> &CaptureModeManager {
        &self.mode
    }

    pub fn buffers(&self) -> &FrameBufferSet {
        &self.buffers
    }

    pub fn reel(&self) -> &ReelBuffer {
        &self.reel
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub(super) fn emit(&self, event: PipelineEvent) {
        match self.events.publish(event) {
            Ok(_) | Err(EventBusError::NoSubscribers { .. }) => {}
            Err(e) => warn!("Failed to publish event: {}", e),
        }
    }

    pub(super) fn emit_recording_stopped(&self, reason: RecordingEnd) {
        self.emit(PipelineEvent::RecordingStopped {
            session: self.mode.session(),
            reason,
            frames: self.reel.len(),
        });
        if self.mode.mode() == Mode::Playback {
            self.emit(PipelineEvent::PlaybackStarted {
                frames: self.reel.len(),
            });
        }
    }

    fn check_available(&self) -> Option<RejectReason> {
        match self.state {
            PipelineState::Running => None,
            _ => Some(self.unavailable_reason()),
        }
    }

    fn unavailable_reason(&self) -> RejectReason {
        match self.state {
            PipelineState::Halted => RejectReason::Halted,
            _ => RejectReason::Suspended,
        }
    }
}

fn log_transition(request: &str, transition: Transition) {
    match transition {
        Transition::Applied => debug!("{} applied", request),
        Transition::Rejected(reason) => info!("{} rejected: {}", request, reason),
    }
}
