use serde::Serialize;

/// Display tick statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayStats {
    pub ticks: u64,
    pub frames_presented: u64,
    pub frames_archived: u64,
    pub stills_captured: u64,
    pub playback_frames: u64,
}

impl DisplayStats {
    pub fn record_tick(&mut self) {
        self.ticks += 1;
    }

    pub fn record_present(&mut self) {
        self.frames_presented += 1;
    }

    pub fn record_archive(&mut self) {
        self.frames_archived += 1;
    }

    pub fn record_still(&mut self) {
        self.stills_captured += 1;
    }

    pub fn record_playback_frame(&mut self) {
        self.playback_frames += 1;
    }

    /// Share of ticks that showed a new live frame
    pub fn present_rate(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.frames_presented as f64 / self.ticks as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
