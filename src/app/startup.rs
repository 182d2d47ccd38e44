use super::{ComponentState, SnapcamOrchestrator};
use crate::error::Result;
use tracing::{error, info};

impl SnapcamOrchestrator {
    /// Register the components that will be started
    pub async fn initialize(&mut self) -> Result<()> {
        let mut states = self.component_states.lock().await;
        states.insert("pipeline".to_string(), ComponentState::Stopped);
        if self.keyboard_enabled {
            states.insert("keyboard".to_string(), ComponentState::Stopped);
        }
        drop(states);

        info!("Components initialized");
        Ok(())
    }

    /// Start capture, then the keyboard
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting snapcam");

        self.set_component_state("pipeline", ComponentState::Starting)
            .await;
        if let Err(e) = self.pipeline.start().await {
            error!("Failed to start capture pipeline: {}", e);
            self.set_component_state("pipeline", ComponentState::Failed)
                .await;
            return Err(e);
        }
        self.set_component_state("pipeline", ComponentState::Running)
            .await;

        if self.keyboard_enabled {
            if let Some(keyboard_handler) = &self.keyboard_handler {
                self.set_component_state("keyboard", ComponentState::Starting)
                    .await;
                keyboard_handler.start().await.map_err(|e| {
                    error!("Failed to start keyboard handler: {}", e);
                    e
                })?;
                self.set_component_state("keyboard", ComponentState::Running)
                    .await;
            }
        }

        info!(
            "Snapcam started on {} sensor",
            self.pipeline.controller().sensor()
        );
        Ok(())
    }
}
