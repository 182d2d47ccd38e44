use crate::app::InputEvent;
use crate::error::Result;
use crate::pipeline::Button;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Map a key to the input it stands for
pub fn key_to_input(code: KeyCode) -> Option<InputEvent> {
    let input = match code {
        KeyCode::Char(' ') | KeyCode::Char('a') => InputEvent::Button(Button::Shutter),
        KeyCode::Char('r') => InputEvent::Button(Button::RecordToggle),
        KeyCode::Char('x') => InputEvent::Button(Button::SwitchSensor),
        KeyCode::Char('p') => InputEvent::Button(Button::PlaybackToggle),
        KeyCode::Char('s') => InputEvent::Button(Button::StandbyToggle),
        KeyCode::Char('d') => InputEvent::Button(Button::DebugReport),
        KeyCode::Char('q') | KeyCode::Esc => InputEvent::Quit,
        _ => return None,
    };
    Some(input)
}

/// Keyboard stand-in for the camera's buttons
pub struct KeyboardInputHandler {
    sender: mpsc::UnboundedSender<InputEvent>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(sender: mpsc::UnboundedSender<InputEvent>) -> Self {
        Self {
            sender,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Keys: space/a shutter, r record, x switch sensor, p playback, s standby, d debug, q quit");

        let sender = self.sender.clone();
        let cancellation_token = self.cancellation_token.clone();

        // crossterm polling blocks, so it gets its own thread
        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }
            debug!("Raw mode enabled - keyboard handler active");

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard input handler stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let key_event = match event::read() {
                            Ok(Event::Key(key_event)) if key_event.kind == KeyEventKind::Press => {
                                key_event
                            }
                            _ => continue,
                        };

                        let Some(input) = key_to_input(key_event.code) else {
                            debug!("Key pressed: {:?}", key_event.code);
                            continue;
                        };

                        if sender.send(input).is_err() {
                            debug!("Input channel closed");
                            break;
                        }
                        if input == InputEvent::Quit {
                            info!("Quit key pressed - requesting shutdown");
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }
            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the poll loop a chance to leave raw mode itself
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}
