use super::state::{Mode, RecordingEnd, RejectReason, StillState, Transition};
use crate::audio::{play_until_accepted, wait_for_silence, Cue, CueBank, CuePlayer};
use crate::config::{AudioConfig, ReelConfig};
use crate::controller::CaptureController;
use crate::device::{CaptureDevice, SensorSelect};
use crate::error::AudioError;
use crate::frame::ReelBuffer;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// User-driven still/video state machine
///
/// Requests come from the main loop. The display tick reads the mode and
/// reports back through `mark_still_captured`, `mark_reel_full` and the
/// playback cursor; cue and LED side effects it cannot run itself are left as
/// an epilogue for [`CaptureModeManager::service`].
pub struct CaptureModeManager {
    mode: Mode,
    still: StillState,
    reel_cursor: usize,
    external_sensor: bool,
    epilogue: Option<RecordingEnd>,
    session: Option<Uuid>,
    cues: CueBank,
    audio: AudioConfig,
    playback_after_recording: bool,
}

impl CaptureModeManager {
    pub fn new(cues: CueBank, audio: &AudioConfig, reel: &ReelConfig, sensor: SensorSelect) -> Self {
        Self {
            mode: Mode::Idle,
            still: StillState::None,
            reel_cursor: 0,
            external_sensor: sensor.is_external(),
            epilogue: None,
            session: None,
            cues,
            audio: audio.clone(),
            playback_after_recording: reel.playback_after_recording,
        }
    }

    /// Shutter cue, outer LED off, then arm the still for the display tick
    pub async fn request_still_capture<D, P>(&mut self, device: &mut D, player: &mut P) -> Transition
    where
        D: CaptureDevice + ?Sized,
        P: CuePlayer + ?Sized,
    {
        if let Some(reason) = self.capture_blocker() {
            debug!("Still capture rejected: {}", reason);
            return Transition::Rejected(reason);
        }

        self.play(player, Cue::Shutter).await;
        if self.external_sensor {
            if let Err(e) = device.switch_off_led() {
                warn!("Failed to switch off camera LED: {}", e);
            }
        }

        self.still = StillState::Pending {
            not_before: Instant::now() + self.audio.shutter_delay(),
        };
        self.mode = Mode::StillArmed;
        info!("Still capture armed");
        Transition::Applied
    }

    pub async fn request_start_recording<D, P>(
        &mut self,
        device: &mut D,
        player: &mut P,
        reel: &mut ReelBuffer,
    ) -> Transition
    where
        D: CaptureDevice + ?Sized,
        P: CuePlayer + ?Sized,
    {
        if let Some(reason) = self.capture_blocker() {
            debug!("Recording rejected: {}", reason);
            return Transition::Rejected(reason);
        }

        self.play(player, Cue::RecordBegin).await;
        reel.reset();
        self.mode = Mode::Recording;
        let session = Uuid::new_v4();
        self.session = Some(session);
        self.set_led(device, true);

        info!(
            "Recording {} started ({} frames available)",
            session,
            reel.capacity()
        );
        Transition::Applied
    }

    /// End cue, LED back to steady, then idle or straight into playback
    pub async fn request_stop_recording<D, P>(
        &mut self,
        device: &mut D,
        player: &mut P,
        reel: &ReelBuffer,
        then_play: bool,
    ) -> Transition
    where
        D: CaptureDevice + ?Sized,
        P: CuePlayer + ?Sized,
    {
        if self.mode != Mode::Recording {
            return Transition::Rejected(RejectReason::NotRecording);
        }

        self.mode = Mode::Idle;
        self.finish_recording(device, player, RecordingEnd::UserStopped, reel.len())
            .await;
        if then_play || self.playback_after_recording {
            self.start_playback(reel);
        }
        Transition::Applied
    }

    /// Raise the deferred sensor switch flag
    pub fn request_switch_sensor(&mut self, controller: &mut CaptureController) -> Transition {
        if self.mode == Mode::Recording || self.epilogue.is_some() {
            return Transition::Rejected(RejectReason::Recording);
        }
        if self.mode == Mode::Playback {
            return Transition::Rejected(RejectReason::Playback);
        }
        controller.request_switch();
        debug!("Sensor switch requested");
        Transition::Applied
    }

    /// Idle → Playback when the reel holds frames, Playback → Idle
    pub fn request_playback(&mut self, reel: &ReelBuffer) -> Transition {
        match self.mode {
            Mode::Playback => {
                info!("Playback stopped at frame {}", self.reel_cursor);
                self.finish_playback();
                Transition::Applied
            }
            Mode::Recording => Transition::Rejected(RejectReason::Recording),
            Mode::StillArmed => Transition::Rejected(RejectReason::StillPending),
            Mode::Idle if self.epilogue.is_some() => Transition::Rejected(RejectReason::Recording),
            Mode::Idle if reel.is_empty() => Transition::Rejected(RejectReason::ReelEmpty),
            Mode::Idle => {
                self.start_playback(reel);
                Transition::Applied
            }
        }
    }

    /// Run side effects left behind by the display tick.
    ///
    /// Returns the reason when a recording finished since the last call.
    pub async fn service<D, P>(
        &mut self,
        device: &mut D,
        player: &mut P,
        reel: &ReelBuffer,
    ) -> Option<RecordingEnd>
    where
        D: CaptureDevice + ?Sized,
        P: CuePlayer + ?Sized,
    {
        let reason = self.epilogue.take()?;
        self.finish_recording(device, player, reason, reel.len()).await;
        if self.playback_after_recording && self.mode == Mode::Idle {
            self.start_playback(reel);
        }
        Some(reason)
    }

    /// Drain cues and close any recording before the device goes down
    pub async fn prepare_suspend<D, P>(
        &mut self,
        device: &mut D,
        player: &mut P,
        reel: &ReelBuffer,
    ) -> Option<RecordingEnd>
    where
        D: CaptureDevice + ?Sized,
        P: CuePlayer + ?Sized,
    {
        self.drain(player).await;

        let ended = if self.mode == Mode::Recording {
            self.mode = Mode::Idle;
            Some(RecordingEnd::Suspended)
        } else {
            self.epilogue.take()
        };

        if let Some(reason) = ended {
            self.finish_recording(device, player, reason, reel.len())
                .await;
            self.drain(player).await;
        }

        player.unload();
        debug!("Cue player unloaded for suspend");
        ended
    }

    pub fn resume<P: CuePlayer + ?Sized>(&mut self, player: &mut P) -> Result<(), AudioError> {
        player.reload()
    }

    pub fn sensor_switched(&mut self, sensor: SensorSelect) {
        self.external_sensor = sensor.is_external();
    }

    /// Display tick: the still is due once its shutter delay has passed
    pub fn still_due(&self, now: Instant) -> bool {
        matches!(self.still, StillState::Pending { not_before } if now >= not_before)
    }

    /// Display tick: snapshot buffer now holds the still
    pub fn mark_still_captured(&mut self) {
        self.still = StillState::Captured;
    }

    /// Main loop: hand over a captured still once; the mode returns to idle
    pub fn take_captured_still(&mut self) -> bool {
        if self.still != StillState::Captured {
            return false;
        }
        self.still = StillState::None;
        if self.mode == Mode::StillArmed {
            self.mode = Mode::Idle;
        }
        true
    }

    /// Display tick: the reel filled up, so recording stops now and the
    /// end cue runs on the next `service`
    pub fn mark_reel_full(&mut self) {
        if self.mode == Mode::Recording {
            self.mode = Mode::Idle;
            self.epilogue = Some(RecordingEnd::ReelFull);
        }
    }

    pub fn advance_cursor(&mut self) {
        self.reel_cursor += 1;
    }

    pub fn finish_playback(&mut self) {
        if self.mode == Mode::Playback {
            self.mode = Mode::Idle;
        }
        self.reel_cursor = 0;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn still_state(&self) -> StillState {
        self.still
    }

    pub fn is_recording(&self) -> bool {
        self.mode == Mode::Recording
    }

    pub fn is_external_sensor(&self) -> bool {
        self.external_sensor
    }

    pub fn reel_cursor(&self) -> usize {
        self.reel_cursor
    }

    pub fn session(&self) -> Option<Uuid> {
        self.session
    }

    pub fn has_pending_epilogue(&self) -> bool {
        self.epilogue.is_some()
    }

    /// Stills and recordings exclude each other and playback
    fn capture_blocker(&self) -> Option<RejectReason> {
        match self.mode {
            Mode::Recording => Some(RejectReason::Recording),
            Mode::Playback => Some(RejectReason::Playback),
            _ if self.epilogue.is_some() => Some(RejectReason::Recording),
            _ if !self.still.is_none() => Some(RejectReason::StillPending),
            _ => None,
        }
    }

    fn start_playback(&mut self, reel: &ReelBuffer) {
        if reel.is_empty() {
            return;
        }
        self.mode = Mode::Playback;
        self.reel_cursor = 0;
        info!("Playback of {} frames started", reel.len());
    }

    async fn finish_recording<D, P>(
        &mut self,
        device: &mut D,
        player: &mut P,
        reason: RecordingEnd,
        frames: usize,
    ) where
        D: CaptureDevice + ?Sized,
        P: CuePlayer + ?Sized,
    {
        self.play(player, Cue::RecordEnd).await;
        self.set_led(device, false);
        match self.session {
            Some(session) => info!("Recording {} finished ({}): {} frames", session, reason, frames),
            None => info!("Recording finished ({}): {} frames", reason, frames),
        }
    }

    async fn play<P: CuePlayer + ?Sized>(&self, player: &mut P, cue: Cue) {
        if let Err(e) = play_until_accepted(
            player,
            self.cues.sample(cue),
            self.audio.cue_retry_limit,
            self.audio.cue_retry_interval(),
        )
        .await
        {
            warn!("Continuing without cue: {}", e);
        }
    }

    async fn drain<P: CuePlayer + ?Sized>(&self, player: &P) {
        wait_for_silence(player, self.audio.drain_poll(), self.audio.drain_timeout()).await;
    }

    fn set_led<D: CaptureDevice + ?Sized>(&self, device: &mut D, blink: bool) {
        if !self.external_sensor {
            return;
        }
        if let Err(e) = device.set_led(blink) {
            warn!("Failed to set camera LED (blink {}): {}", blink, e);
        }
    }
}
