use super::{ComponentState, ShutdownReason, SnapcamOrchestrator};
use crate::error::{Result, SnapcamError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const KEYBOARD_STOP_TIMEOUT: Duration = Duration::from_secs(2);

impl SnapcamOrchestrator {
    /// Stop the keyboard, then capture. Returns the exit code.
    pub async fn shutdown(&mut self, reason: &ShutdownReason) -> Result<i32> {
        info!("Beginning graceful shutdown");
        self.cancellation_token.cancel();

        let mut exit_code = reason.exit_code();

        if self.keyboard_enabled {
            if let Err(e) = self.stop_keyboard().await {
                error!("Error stopping keyboard: {}", e);
                exit_code = 1;
            }
        }

        if let Err(e) = self.stop_pipeline().await {
            error!("Error stopping pipeline: {}", e);
            exit_code = 1;
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_keyboard(&mut self) -> Result<()> {
        let Some(keyboard_handler) = &self.keyboard_handler else {
            return Ok(());
        };
        self.set_component_state("keyboard", ComponentState::Stopping)
            .await;

        let result = timeout(KEYBOARD_STOP_TIMEOUT, keyboard_handler.stop()).await;
        match result {
            Ok(Ok(())) => {
                self.set_component_state("keyboard", ComponentState::Stopped)
                    .await;
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state("keyboard", ComponentState::Failed)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.set_component_state("keyboard", ComponentState::Failed)
                    .await;
                Err(SnapcamError::system("keyboard component stop timeout"))
            }
        }
    }

    async fn stop_pipeline(&mut self) -> Result<()> {
        self.set_component_state("pipeline", ComponentState::Stopping)
            .await;

        // cue drain and busy wait each run to their own timeout
        let audio = &self.pipeline.config().audio;
        let limit = audio.drain_timeout() * 2
            + self.pipeline.config().pipeline.busy_timeout()
            + Duration::from_secs(1);

        let result = timeout(limit, self.pipeline.shutdown()).await;
        match result {
            Ok(Ok(())) => {
                self.set_component_state("pipeline", ComponentState::Stopped)
                    .await;
                info!("Pipeline stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state("pipeline", ComponentState::Failed)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.set_component_state("pipeline", ComponentState::Failed)
                    .await;
                Err(SnapcamError::system("pipeline stop timeout"))
            }
        }
    }
}
