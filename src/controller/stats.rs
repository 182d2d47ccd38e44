use serde::Serialize;
use tokio::time::Instant;
use tracing::info;

/// Completions between frame-rate reports
pub const FPS_REPORT_INTERVAL: u32 = 32;

/// Counters kept by the completion and error handlers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub completions: u64,
    pub promotions: u64,
    pub recaptures: u64,
    pub warmups: u64,
    pub stale_completions: u64,
    pub desyncs: u64,
    pub buffer_errors: u64,
    pub reboots: u64,
    pub vsyncs: u64,
    pub not_rearmed: u64,
    pub sensor_switches: u64,
}

impl CaptureStats {
    /// Frames that made it to the display side
    pub fn promotion_rate(&self) -> f64 {
        if self.completions == 0 {
            0.0
        } else {
            self.promotions as f64 / self.completions as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Measures capture rate over fixed blocks of completions
#[derive(Debug, Default)]
pub struct FrameRateMeter {
    begin: Option<Instant>,
    count: u32,
    last_fps: Option<f64>,
}

impl FrameRateMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note one completion; returns the measured rate once per report interval
    pub fn record(&mut self) -> Option<f64> {
        let now = Instant::now();
        let Some(begin) = self.begin else {
            self.begin = Some(now);
            return None;
        };

        self.count += 1;
        if self.count < FPS_REPORT_INTERVAL {
            return None;
        }

        let elapsed = now.duration_since(begin).as_secs_f64();
        let fps = if elapsed > 0.0 {
            self.count as f64 / elapsed
        } else {
            0.0
        };
        info!("{:.3} fps", fps);

        self.count = 0;
        self.begin = Some(now);
        self.last_fps = Some(fps);
        Some(fps)
    }

    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }

    /// Forget the current block, e.g. after capture was stopped
    pub fn restart(&mut self) {
        self.begin = None;
        self.count = 0;
    }
}
