use super::core::Pipeline;
use super::status::PipelineState;
use crate::audio::CuePlayer;
use crate::device::CaptureDevice;
use crate::display::PresentationSurface;
use crate::error::{CaptureError, Result};
use crate::events::PipelineEvent;
use tracing::{info, warn};

impl<D, A, S> Pipeline<D, A, S>
where
    D: CaptureDevice,
    A: CuePlayer,
    S: PresentationSurface,
{
    /// Quiesce audio and capture before the system sleeps.
    ///
    /// Cues drain first and any recording is closed with its normal epilogue,
    /// then the cue player is released and capture stops. If the sensor does
    /// not go idle in time capture is restarted and a timeout is returned.
    pub async fn suspend(&mut self) -> Result<()> {
        if self.state != PipelineState::Running {
            return Err(CaptureError::NotRunning.into());
        }
        info!("Suspending capture pipeline");

        if let Some(reason) = self
            .mode
            .prepare_suspend(&mut self.device, &mut self.player, &self.reel)
            .await
        {
            self.emit_recording_stopped(reason);
        }

        let poll = self.config.pipeline.busy_poll_interval();
        let timeout = self.config.pipeline.busy_timeout();
        if let Err(e) = self.controller.stop(&mut self.device, poll, timeout).await {
            if let Err(audio) = self.mode.resume(&mut self.player) {
                warn!("Cue player did not come back: {}", audio);
            }
            warn!("Suspend aborted: {}", e);
            return Err(e.into());
        }

        self.state = PipelineState::Suspended;
        self.emit(PipelineEvent::Suspended);
        info!("Capture pipeline suspended");
        Ok(())
    }

    /// Bring audio and capture back after `suspend`
    pub async fn resume(&mut self) -> Result<()> {
        if self.state != PipelineState::Suspended {
            return Err(CaptureError::NotRunning.into());
        }
        info!("Resuming capture pipeline");

        if let Err(e) = self.mode.resume(&mut self.player) {
            warn!("Resuming without cues: {}", e);
        }

        if let Err(e) = self.controller.resume(&mut self.device).await {
            if e.is_fatal() {
                self.state = PipelineState::Halted;
                self.emit(PipelineEvent::FatalError {
                    error: e.to_string(),
                });
            }
            return Err(e.into());
        }

        self.state = PipelineState::Running;
        self.emit(PipelineEvent::Resumed);
        Ok(())
    }

    /// Stop capture for good, closing any recording first
    pub async fn shutdown(&mut self) -> Result<()> {
        match self.state {
            PipelineState::Stopped => return Ok(()),
            PipelineState::Running => {
                if let Some(reason) = self
                    .mode
                    .prepare_suspend(&mut self.device, &mut self.player, &self.reel)
                    .await
                {
                    self.emit_recording_stopped(reason);
                }

                let poll = self.config.pipeline.busy_poll_interval();
                let timeout = self.config.pipeline.busy_timeout();
                if let Err(e) = self.controller.stop(&mut self.device, poll, timeout).await {
                    warn!("Forcing capture stop: {}", e);
                    self.device.stop_capture();
                    self.device.stop_transfer();
                }
            }
            PipelineState::Halted => {
                self.device.stop_capture();
                self.device.stop_transfer();
                self.player.unload();
            }
            PipelineState::Suspended | PipelineState::Created => {
                self.player.unload();
            }
        }

        self.state = PipelineState::Stopped;
        info!("Capture pipeline stopped");
        Ok(())
    }
}
