use super::stats::DisplayStats;
use super::surface::{PresentationSurface, Screen};
use crate::frame::{FrameBufferSet, ReelBuffer};
use crate::mode::{CaptureModeManager, Mode};
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// What one display tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// Capture slot newly shown on the live screen
    pub presented: Option<usize>,
    /// Reel slot the presented frame was archived into
    pub archived: Option<usize>,
    pub reel_full: bool,
    pub still_captured: bool,
    /// The still was copied before any live frame was shown, so it holds an empty slot
    pub still_before_first_frame: bool,
    /// Reel frame shown on the review screen
    pub playback_frame: Option<usize>,
    pub playback_finished: bool,
}

/// Display half of the ping-pong protocol
///
/// Runs once per refresh. It only ever reads the capture slot the controller
/// has moved away from, so a presented frame is never one still being filled.
pub struct DisplaySync {
    /// Slot the live screen shows. Written only by `tick`.
    read_index: usize,
    playback_divider: u32,
    playback_phase: u32,
    stats: DisplayStats,
}

impl DisplaySync {
    pub fn new(playback_divider: u32) -> Self {
        Self {
            read_index: 1,
            playback_divider: playback_divider.max(1),
            playback_phase: 0,
            stats: DisplayStats::default(),
        }
    }

    pub fn tick<S: PresentationSurface + ?Sized>(
        &mut self,
        write_index: usize,
        buffers: &mut FrameBufferSet,
        reel: &mut ReelBuffer,
        mode: &mut CaptureModeManager,
        surface: &mut S,
        now: Instant,
    ) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        self.stats.record_tick();

        // capture has moved onto the slot we show, so the other one is complete
        if write_index == self.read_index {
            self.read_index ^= 1;
            let pixels = buffers.slot(self.read_index);
            surface.present(Screen::Live, pixels);
            self.stats.record_present();
            outcome.presented = Some(self.read_index);
            trace!("Presenting slot {}", self.read_index);

            if mode.is_recording() {
                outcome.archived = reel.push(pixels);
                if outcome.archived.is_some() {
                    self.stats.record_archive();
                }
                if reel.is_full() {
                    info!("Reel full after {} frames", reel.len());
                    mode.mark_reel_full();
                    outcome.reel_full = true;
                }
            }
        }

        if mode.still_due(now) {
            buffers.take_snapshot(self.read_index);
            mode.mark_still_captured();
            self.stats.record_still();
            outcome.still_captured = true;
            if self.stats.frames_presented == 0 {
                outcome.still_before_first_frame = true;
                debug!(
                    "Still taken from slot {} before the first frame was shown",
                    self.read_index
                );
            } else {
                debug!("Still taken from slot {}", self.read_index);
            }
        }

        if mode.mode() == Mode::Playback {
            self.step_playback(reel, mode, surface, &mut outcome);
        } else {
            self.playback_phase = 0;
        }

        outcome
    }

    fn step_playback<S: PresentationSurface + ?Sized>(
        &mut self,
        reel: &ReelBuffer,
        mode: &mut CaptureModeManager,
        surface: &mut S,
        outcome: &mut TickOutcome,
    ) {
        let due = self.playback_phase == 0;
        self.playback_phase = (self.playback_phase + 1) % self.playback_divider;
        if !due {
            return;
        }

        let cursor = mode.reel_cursor();
        if let Some(frame) = reel.frame(cursor) {
            surface.present(Screen::Review, frame);
            self.stats.record_playback_frame();
            outcome.playback_frame = Some(cursor);
            mode.advance_cursor();
        }

        if mode.reel_cursor() >= reel.len() {
            debug!("Playback reached end of reel ({} frames)", reel.len());
            mode.finish_playback();
            self.playback_phase = 0;
            outcome.playback_finished = true;
        }
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn stats(&self) -> &DisplayStats {
        &self.stats
    }
}
