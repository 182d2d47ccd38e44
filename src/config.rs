use crate::device::{SensorFlip, SensorSelect};
use crate::frame::{FrameGeometry, ReelBuffer};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SnapcamConfig {
    pub camera: CameraConfig,
    pub pipeline: PipelineConfig,
    pub reel: ReelConfig,
    pub audio: AudioConfig,
    pub system: SystemConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Captured image width in pixels
    #[serde(default = "default_camera_width")]
    pub width: u32,

    /// Captured image height in pixels
    #[serde(default = "default_camera_height")]
    pub height: u32,

    /// Sensor frame rate
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Sensor activated at startup
    #[serde(default = "default_camera_sensor")]
    pub sensor: SensorSelect,

    /// Flip applied to the inner (user-facing) sensor
    #[serde(default)]
    pub inner_flip: SensorFlip,

    /// Flip applied to the outer (rotating) sensor
    #[serde(default)]
    pub outer_flip: SensorFlip,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Frames that must complete after activation before a frame may be presented
    #[serde(default = "default_stabilization_threshold")]
    pub stabilization_threshold: u32,

    /// Display refresh rate driving the presentation tick
    #[serde(default = "default_display_hz")]
    pub display_hz: u32,

    /// Upper bound on waiting for the device to leave the busy state
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Interval between busy polls
    #[serde(default = "default_busy_poll_interval_ms")]
    pub busy_poll_interval_ms: u64,

    /// Attempts for device initialization on transient errors
    #[serde(default = "default_init_retries")]
    pub init_retries: u32,

    /// Base delay for initialization backoff
    #[serde(default = "default_init_retry_base_ms")]
    pub init_retry_base_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReelConfig {
    /// Memory set aside for recorded video frames
    #[serde(default = "default_reel_memory_budget")]
    pub memory_budget_bytes: u64,

    /// Frames of the budget kept back as reserve
    #[serde(default = "default_reel_reserve_frames")]
    pub reserve_frames: u32,

    /// Display ticks per playback frame
    #[serde(default = "default_playback_divider")]
    pub playback_divider: u32,

    /// Start playback as soon as recording stops
    #[serde(default)]
    pub playback_after_recording: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AudioConfig {
    /// Shutter cue sample file
    #[serde(default)]
    pub shutter_cue: Option<String>,

    /// Recording start cue sample file
    #[serde(default)]
    pub begin_cue: Option<String>,

    /// Recording end cue sample file
    #[serde(default)]
    pub end_cue: Option<String>,

    /// Attempts to get a cue accepted by the player
    #[serde(default = "default_cue_retry_limit")]
    pub cue_retry_limit: u32,

    /// Delay between cue attempts
    #[serde(default = "default_cue_retry_interval_ms")]
    pub cue_retry_interval_ms: u64,

    /// Pause between the shutter cue and arming the still
    #[serde(default = "default_shutter_delay_ms")]
    pub shutter_delay_ms: u64,

    /// Poll interval while waiting for a cue to finish
    #[serde(default = "default_drain_poll_ms")]
    pub drain_poll_ms: u64,

    /// Upper bound on waiting for a cue to finish
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Interval for periodic status logging
    #[serde(default = "default_status_interval")]
    pub status_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Raise a buffer error every N simulated frames (0 disables)
    #[serde(default)]
    pub buffer_error_interval: u64,

    /// Raise a reboot notification every N simulated frames (0 disables)
    #[serde(default)]
    pub reboot_interval: u64,
}

impl CameraConfig {
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height)
    }

    /// Interval between frames on the sensor clock
    pub fn frame_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.fps.max(1) as u64)
    }

    pub fn flip_for(&self, sensor: SensorSelect) -> SensorFlip {
        match sensor {
            SensorSelect::Outer => self.outer_flip,
            _ => self.inner_flip,
        }
    }
}

impl SystemConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_seconds.max(1))
    }
}

impl PipelineConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn busy_poll_interval(&self) -> Duration {
        Duration::from_millis(self.busy_poll_interval_ms)
    }

    pub fn display_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.display_hz.max(1) as u64)
    }
}

impl AudioConfig {
    pub fn cue_retry_interval(&self) -> Duration {
        Duration::from_millis(self.cue_retry_interval_ms)
    }

    pub fn shutter_delay(&self) -> Duration {
        Duration::from_millis(self.shutter_delay_ms)
    }

    pub fn drain_poll(&self) -> Duration {
        Duration::from_millis(self.drain_poll_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl SnapcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("snapcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.width", default_camera_width())?
            .set_default("camera.height", default_camera_height())?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.sensor", "inner")?
            .set_default("camera.inner_flip", "none")?
            .set_default("camera.outer_flip", "none")?
            .set_default(
                "pipeline.stabilization_threshold",
                default_stabilization_threshold(),
            )?
            .set_default("pipeline.display_hz", default_display_hz())?
            .set_default("pipeline.busy_timeout_ms", default_busy_timeout_ms())?
            .set_default(
                "pipeline.busy_poll_interval_ms",
                default_busy_poll_interval_ms(),
            )?
            .set_default("pipeline.init_retries", default_init_retries())?
            .set_default("pipeline.init_retry_base_ms", default_init_retry_base_ms())?
            .set_default("reel.memory_budget_bytes", default_reel_memory_budget())?
            .set_default("reel.reserve_frames", default_reel_reserve_frames())?
            .set_default("reel.playback_divider", default_playback_divider())?
            .set_default("reel.playback_after_recording", false)?
            .set_default("audio.cue_retry_limit", default_cue_retry_limit())?
            .set_default("audio.cue_retry_interval_ms", default_cue_retry_interval_ms())?
            .set_default("audio.shutter_delay_ms", default_shutter_delay_ms())?
            .set_default("audio.drain_poll_ms", default_drain_poll_ms())?
            .set_default("audio.drain_timeout_ms", default_drain_timeout_ms())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.status_interval_seconds", default_status_interval())?
            .set_default("simulation.buffer_error_interval", 0)?
            .set_default("simulation.reboot_interval", 0)?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // SNAPCAM_PIPELINE__DISPLAY_HZ=30 style overrides
            .add_source(
                Environment::with_prefix("SNAPCAM")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: SnapcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.camera.sensor == SensorSelect::None {
            return Err(ConfigError::Message(
                "Startup sensor must be inner or outer".to_string(),
            ));
        }

        let geometry = self.camera.geometry();
        if let Err(e) = geometry.check_alignment() {
            return Err(ConfigError::Message(e.to_string()));
        }

        if self.pipeline.display_hz == 0 {
            return Err(ConfigError::Message(
                "Display rate must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.busy_poll_interval_ms > self.pipeline.busy_timeout_ms {
            return Err(ConfigError::Message(
                "Busy poll interval must not exceed the busy timeout".to_string(),
            ));
        }

        if self.reel.playback_divider == 0 {
            return Err(ConfigError::Message(
                "Playback divider must be greater than 0".to_string(),
            ));
        }

        let capacity = ReelBuffer::capacity_for(
            self.reel.memory_budget_bytes,
            geometry.frame_bytes(),
            self.reel.reserve_frames,
        );
        if capacity == 0 {
            return Err(ConfigError::Message(format!(
                "Reel budget of {} bytes holds no frames of {} bytes after reserving {}",
                self.reel.memory_budget_bytes,
                geometry.frame_bytes(),
                self.reel.reserve_frames
            )));
        }

        if self.audio.cue_retry_limit == 0 {
            return Err(ConfigError::Message(
                "Cue retry limit must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SnapcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                width: default_camera_width(),
                height: default_camera_height(),
                fps: default_camera_fps(),
                sensor: default_camera_sensor(),
                inner_flip: SensorFlip::None,
                outer_flip: SensorFlip::None,
            },
            pipeline: PipelineConfig {
                stabilization_threshold: default_stabilization_threshold(),
                display_hz: default_display_hz(),
                busy_timeout_ms: default_busy_timeout_ms(),
                busy_poll_interval_ms: default_busy_poll_interval_ms(),
                init_retries: default_init_retries(),
                init_retry_base_ms: default_init_retry_base_ms(),
            },
            reel: ReelConfig {
                memory_budget_bytes: default_reel_memory_budget(),
                reserve_frames: default_reel_reserve_frames(),
                playback_divider: default_playback_divider(),
                playback_after_recording: false,
            },
            audio: AudioConfig {
                shutter_cue: None,
                begin_cue: None,
                end_cue: None,
                cue_retry_limit: default_cue_retry_limit(),
                cue_retry_interval_ms: default_cue_retry_interval_ms(),
                shutter_delay_ms: default_shutter_delay_ms(),
                drain_poll_ms: default_drain_poll_ms(),
                drain_timeout_ms: default_drain_timeout_ms(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                status_interval_seconds: default_status_interval(),
            },
            simulation: SimulationConfig {
                buffer_error_interval: 0,
                reboot_interval: 0,
            },
        }
    }
}

// Default value functions
fn default_camera_width() -> u32 {
    256
}
fn default_camera_height() -> u32 {
    192
}
fn default_camera_fps() -> u32 {
    15
}
fn default_camera_sensor() -> SensorSelect {
    SensorSelect::Inner
}

// Long enough for auto-exposure to settle outdoors
fn default_stabilization_threshold() -> u32 {
    31
}
fn default_display_hz() -> u32 {
    60
}
fn default_busy_timeout_ms() -> u64 {
    500
}
fn default_busy_poll_interval_ms() -> u64 {
    1
}
fn default_init_retries() -> u32 {
    5
}
fn default_init_retry_base_ms() -> u64 {
    10
}

fn default_reel_memory_budget() -> u64 {
    8 * 1024 * 1024
}
fn default_reel_reserve_frames() -> u32 {
    2
}
fn default_playback_divider() -> u32 {
    4
}

fn default_cue_retry_limit() -> u32 {
    100
}
fn default_cue_retry_interval_ms() -> u64 {
    1
}
fn default_shutter_delay_ms() -> u64 {
    200
}
fn default_drain_poll_ms() -> u64 {
    100
}
fn default_drain_timeout_ms() -> u64 {
    5000
}

fn default_event_bus_capacity() -> usize {
    100
}
fn default_status_interval() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SnapcamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.geometry().frame_bytes(), 256 * 192 * 2);
        assert_eq!(config.camera.flip_for(SensorSelect::Outer), SensorFlip::None);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SnapcamConfig::default();

        config.camera.width = 0;
        assert!(config.validate().is_err());
        config.camera.width = 256;

        // 3 x 3 x 2 bytes is not a whole number of 32-byte blocks
        config.camera.width = 3;
        config.camera.height = 3;
        assert!(config.validate().is_err());
        config.camera.width = 256;
        config.camera.height = 192;

        config.reel.memory_budget_bytes = 256 * 192 * 2;
        assert!(config.validate().is_err());
        config.reel.memory_budget_bytes = default_reel_memory_budget();

        config.reel.playback_divider = 0;
        assert!(config.validate().is_err());
        config.reel.playback_divider = 4;

        config.camera.sensor = SensorSelect::None;
        assert!(config.validate().is_err());
        config.camera.sensor = SensorSelect::Outer;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[camera]
width = 128
height = 96
sensor = "outer"
outer_flip = "horizontal"

[pipeline]
stabilization_threshold = 4

[reel]
playback_after_recording = true
"#
        )
        .unwrap();

        let config = SnapcamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.camera.width, 128);
        assert_eq!(config.camera.height, 96);
        assert_eq!(config.camera.sensor, SensorSelect::Outer);
        assert_eq!(config.camera.outer_flip, SensorFlip::Horizontal);
        assert_eq!(config.camera.inner_flip, SensorFlip::None);
        assert_eq!(config.pipeline.stabilization_threshold, 4);
        assert_eq!(config.pipeline.display_hz, 60);
        assert!(config.reel.playback_after_recording);
        assert!(config.audio.shutter_cue.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = SnapcamConfig::load_from_file("/nonexistent/snapcam.toml").unwrap();
        assert_eq!(config.camera.width, default_camera_width());
        assert_eq!(config.reel.reserve_frames, default_reel_reserve_frames());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = SnapcamConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: SnapcamConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
