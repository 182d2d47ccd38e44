use super::cues::{Cue, CueSample};
use crate::error::AudioError;
use crate::recovery::wait_until;
use std::cell::Cell;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

/// Non-blocking cue playback engine
pub trait CuePlayer {
    /// Try to start a cue. `false` means the engine is not ready yet; call again.
    fn play_cue(&mut self, sample: &CueSample) -> bool;

    fn is_playing(&self) -> bool;

    /// Release the engine before the system suspends
    fn unload(&mut self);

    /// Bring the engine back after resume
    fn reload(&mut self) -> Result<(), AudioError>;
}

/// Keep offering a cue until the player starts it, up to `attempts` tries
pub async fn play_until_accepted<P: CuePlayer + ?Sized>(
    player: &mut P,
    sample: &CueSample,
    attempts: u32,
    interval: Duration,
) -> Result<(), AudioError> {
    for attempt in 1..=attempts {
        if player.play_cue(sample) {
            trace!("Cue {} started on attempt {}", sample.cue, attempt);
            return Ok(());
        }
        if interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            sleep(interval).await;
        }
    }
    warn!("Cue {} was not accepted after {} attempts", sample.cue, attempts);
    Err(AudioError::CueRejected {
        cue: sample.cue.name(),
        attempts,
    })
}

/// Wait for the current cue to finish; `false` if it was still playing at `timeout`
pub async fn wait_for_silence<P: CuePlayer + ?Sized>(
    player: &P,
    poll: Duration,
    timeout: Duration,
) -> bool {
    match wait_until(|| !player.is_playing(), poll, timeout).await {
        Ok(waited) => {
            if !waited.is_zero() {
                debug!("Cue finished after {:?}", waited);
            }
            true
        }
        Err(waited) => {
            warn!("Cue still playing after {:?}", waited);
            false
        }
    }
}

/// Cue player that accepts cues after a configurable number of refusals
/// and reports playing for a fixed number of polls
pub struct SimulatedCuePlayer {
    refusals_per_cue: u32,
    refusals_left: u32,
    play_polls: u32,
    remaining: Cell<u32>,
    loaded: bool,
    fail_reload: bool,
    played: Vec<Cue>,
    attempts: u32,
}

impl SimulatedCuePlayer {
    pub fn new() -> Self {
        Self {
            refusals_per_cue: 0,
            refusals_left: 0,
            play_polls: 0,
            remaining: Cell::new(0),
            loaded: true,
            fail_reload: false,
            played: Vec::new(),
            attempts: 0,
        }
    }

    /// Refuse each cue this many times before starting it
    pub fn with_refusals(mut self, refusals: u32) -> Self {
        self.refusals_per_cue = refusals;
        self.refusals_left = refusals;
        self
    }

    /// Report playing for this many `is_playing` polls after a cue starts
    pub fn with_play_polls(mut self, polls: u32) -> Self {
        self.play_polls = polls;
        self
    }

    pub fn set_fail_reload(&mut self, fail: bool) {
        self.fail_reload = fail;
    }

    pub fn played(&self) -> &[Cue] {
        &self.played
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl Default for SimulatedCuePlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl CuePlayer for SimulatedCuePlayer {
    fn play_cue(&mut self, sample: &CueSample) -> bool {
        self.attempts += 1;
        if !self.loaded || self.remaining.get() > 0 {
            return false;
        }
        if self.refusals_left > 0 {
            self.refusals_left -= 1;
            return false;
        }
        self.refusals_left = self.refusals_per_cue;
        self.remaining.set(self.play_polls);
        self.played.push(sample.cue);
        true
    }

    fn is_playing(&self) -> bool {
        let remaining = self.remaining.get();
        if remaining > 0 {
            self.remaining.set(remaining - 1);
            true
        } else {
            false
        }
    }

    fn unload(&mut self) {
        self.loaded = false;
        self.remaining.set(0);
    }

    fn reload(&mut self) -> Result<(), AudioError> {
        if self.fail_reload {
            return Err(AudioError::Reload {
                details: "simulated engine refused to load".to_string(),
            });
        }
        self.loaded = true;
        Ok(())
    }
}
