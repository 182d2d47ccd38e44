use super::{InputEvent, ShutdownReason, SnapcamOrchestrator};
use crate::error::{Result, SnapcamError};
use crate::events::PipelineEvent;
use crate::mode::Transition;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tokio::time::{interval, interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

impl SnapcamOrchestrator {
    /// Run the main loop until a signal, the quit key, the run limit or a
    /// fatal error, then shut down. Returns the process exit code.
    pub async fn run(&mut self) -> Result<i32> {
        info!("Snapcam is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| SnapcamError::system("Shutdown sender already taken"))?;
        let mut shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| SnapcamError::system("Shutdown receiver already taken"))?;

        self.setup_signal_handlers(shutdown_sender);

        let config = self.pipeline.config().clone();
        let mut sensor_clock = interval(config.camera.frame_period());
        sensor_clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut display_clock = interval(config.pipeline.display_period());
        display_clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let status_period = config.system.status_interval();
        let mut status_clock = interval_at(Instant::now() + status_period, status_period);
        let deadline = self.run_for.map(|limit| Instant::now() + limit);

        let reason = loop {
            tokio::select! {
                received = &mut shutdown_receiver => {
                    break received.unwrap_or_else(|_| {
                        ShutdownReason::Error("Shutdown channel closed unexpectedly".to_string())
                    });
                }
                _ = self.cancellation_token.cancelled() => {
                    break ShutdownReason::UserRequest;
                }
                _ = run_limit(deadline) => {
                    info!("Run time limit reached");
                    break ShutdownReason::DurationElapsed;
                }
                _ = sensor_clock.tick() => {
                    self.pipeline.device_mut().advance_frame();
                    if let Err(e) = self.pipeline.drain_interrupts() {
                        if !e.is_recoverable() {
                            break ShutdownReason::Error(e.to_string());
                        }
                        warn!("Interrupt handling failed: {}", e);
                    }
                }
                _ = display_clock.tick() => {
                    if let Err(e) = self.pipeline.on_display_tick() {
                        if !e.is_recoverable() {
                            break ShutdownReason::Error(e.to_string());
                        }
                        warn!("Display tick failed: {}", e);
                    }
                    if let Err(e) = self.pipeline.service().await {
                        warn!("Main loop service failed: {}", e);
                    }
                }
                Some(input) = self.input_receiver.recv() => {
                    let button = match input {
                        InputEvent::Quit => break ShutdownReason::UserRequest,
                        InputEvent::Button(button) => button,
                    };
                    match self.pipeline.handle_input(button).await {
                        Ok(Transition::Applied) => debug!("{} handled", button),
                        Ok(Transition::Rejected(why)) => info!("{} ignored: {}", button, why),
                        Err(e) if e.is_recoverable() => warn!("{} failed: {}", button, e),
                        Err(e) => break ShutdownReason::Error(e.to_string()),
                    }
                }
                Ok(event) = self.notable_events.recv() => {
                    self.record_notable(event);
                }
                _ = status_clock.tick() => {
                    info!("{}", self.pipeline.status());
                }
            }
        };

        self.drain_notable();
        info!("Shutdown initiated: {:?}", reason);
        let exit_code = self.shutdown(&reason).await?;
        self.drain_notable();
        self.shutdown_reason = Some(reason);

        info!("Snapcam shutdown complete");
        Ok(exit_code)
    }

    fn record_notable(&mut self, event: PipelineEvent) {
        info!("Session event: {}", event.description());
        self.notable_log.push(event);
    }

    fn drain_notable(&mut self) {
        for event in self.notable_events.drain() {
            self.record_notable(event);
        }
    }

    /// Ctrl-C and SIGTERM feed the shutdown channel
    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}

async fn run_limit(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
