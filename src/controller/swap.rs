use super::stats::{CaptureStats, FrameRateMeter};
use crate::config::{CameraConfig, PipelineConfig};
use crate::device::{CaptureDevice, SensorFlip, SensorSelect, TransferRequest};
use crate::error::{CaptureError, DeviceError};
use crate::frame::FrameGeometry;
use crate::recovery::{retry_transient, wait_until, RetryPolicy};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// What a transfer completion did to the capture side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Completion of a transfer that is no longer armed
    Stale,
    /// Capture was stopped; nothing re-armed
    Stopped,
    /// DMA overran the frame; capture restarted into the same slot
    Desynced,
    /// Frame discarded after a recovery; same slot re-armed
    Recaptured { slot: usize },
    /// Sensor still settling; same slot re-armed
    WarmingUp { slot: usize },
    /// `finished` holds a complete frame and capture moved on to `next`
    Promoted { finished: usize, next: usize },
}

/// Owner of the capture half of the ping-pong protocol
///
/// Every field is written from exactly one place, so none of them need a lock:
/// the completion, buffer error and reboot handlers own the slot state, the main
/// loop only raises `switch_requested`, and the display tick consumes it.
pub struct CaptureController {
    geometry: FrameGeometry,
    /// Slot the armed transfer fills. Completion handler, or start/stop/resume while quiesced.
    write_index: usize,
    /// Next completion lands in the same slot. Error handlers set it, the completion handler clears it.
    pending_recapture: bool,
    /// Completions since the sensor was (re)activated, saturating at `threshold + 1`
    stabilized_count: u32,
    threshold: u32,
    /// Main loop sets it, display tick consumes it
    switch_requested: bool,
    sensor: SensorSelect,
    camera: CameraConfig,
    in_flight: Option<TransferRequest>,
    next_sequence: u64,
    running: bool,
    halted: bool,
    retry: RetryPolicy,
    stats: CaptureStats,
    meter: FrameRateMeter,
}

impl CaptureController {
    pub fn new(camera: &CameraConfig, pipeline: &PipelineConfig) -> Self {
        Self {
            geometry: camera.geometry(),
            write_index: 0,
            pending_recapture: true,
            stabilized_count: 0,
            threshold: pipeline.stabilization_threshold,
            switch_requested: false,
            sensor: camera.sensor,
            camera: camera.clone(),
            in_flight: None,
            next_sequence: 0,
            running: false,
            halted: false,
            retry: RetryPolicy {
                max_attempts: pipeline.init_retries,
                base_delay: Duration::from_millis(pipeline.init_retry_base_ms),
                ..RetryPolicy::default()
            },
            stats: CaptureStats::default(),
            meter: FrameRateMeter::new(),
        }
    }

    /// Bring the device up and arm the first transfer
    pub async fn start<D: CaptureDevice + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<(), DeviceError> {
        info!(
            "Starting capture on {} sensor ({}x{}, {} lines per transfer)",
            self.sensor,
            self.geometry.width,
            self.geometry.height,
            self.geometry.transfer_lines()
        );

        retry_transient("initialize", &self.retry, || device.initialize()).await?;

        for sensor in [SensorSelect::Inner, SensorSelect::Outer] {
            let flip = self.flip_for(sensor);
            if let Err(e) = device.set_flip(sensor, flip) {
                warn!("Failed to set {:?} flip on {} sensor: {}", flip, sensor, e);
            }
        }

        let sensor = self.sensor;
        retry_transient("activate", &self.retry, || device.activate(sensor)).await?;

        self.write_index = 0;
        self.pending_recapture = true;
        self.stabilized_count = 0;
        self.arm(device);
        device.clear_buffer();
        device.start_capture();
        self.running = true;
        self.halted = false;
        self.meter.restart();

        debug!("Capture running into slot {}", self.write_index);
        Ok(())
    }

    /// Arm a whole-frame transfer into the current write slot
    pub fn arm<D: CaptureDevice + ?Sized>(&mut self, device: &mut D) {
        let request = TransferRequest {
            slot: self.write_index,
            bytes_per_chunk: self.geometry.bytes_per_chunk(),
            frame_bytes: self.geometry.frame_bytes(),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.in_flight = Some(request);
        device.request_line_transfer(request);
    }

    /// Whether a completion belongs to the transfer currently armed
    pub fn accepts(&self, request: &TransferRequest) -> bool {
        !self.halted && self.in_flight.map(|r| r.sequence) == Some(request.sequence)
    }

    /// DMA completion: decide the next slot and re-arm
    pub fn on_transfer_complete<D: CaptureDevice + ?Sized>(
        &mut self,
        device: &mut D,
        request: &TransferRequest,
    ) -> CompletionOutcome {
        if !self.accepts(request) {
            self.stats.stale_completions += 1;
            trace!("Ignoring completion seq {}", request.sequence);
            return CompletionOutcome::Stale;
        }
        self.in_flight = None;
        self.stats.completions += 1;

        if !device.is_busy() {
            self.stats.not_rearmed += 1;
            debug!("Capture stopped; transfer not re-armed");
            return CompletionOutcome::Stopped;
        }

        if device.is_transfer_busy() {
            warn!("DMA was not done at frame end; recapturing slot {}", self.write_index);
            self.stats.desyncs += 1;
            self.recover(device);
            return CompletionOutcome::Desynced;
        }

        let outcome = if self.pending_recapture {
            self.pending_recapture = false;
            self.stats.recaptures += 1;
            CompletionOutcome::Recaptured {
                slot: self.write_index,
            }
        } else if self.stabilized_count > self.threshold {
            let finished = self.write_index;
            self.write_index ^= 1;
            self.stats.promotions += 1;
            CompletionOutcome::Promoted {
                finished,
                next: self.write_index,
            }
        } else {
            self.stats.warmups += 1;
            CompletionOutcome::WarmingUp {
                slot: self.write_index,
            }
        };

        if self.stabilized_count <= self.threshold {
            self.stabilized_count += 1;
        }

        self.arm(device);
        self.meter.record();
        trace!("{:?}, stabilized {}", outcome, self.stabilized_count);
        outcome
    }

    /// Receive buffer overran: drop the frame in flight and restart into the same slot
    pub fn on_buffer_error<D: CaptureDevice + ?Sized>(&mut self, device: &mut D) {
        if !self.running || self.halted {
            debug!("Buffer error while capture is not running; ignored");
            return;
        }
        self.stats.buffer_errors += 1;
        warn!("Camera buffer error; recapturing slot {}", self.write_index);
        self.recover(device);
    }

    /// Device restarted itself; a fatal result halts the pipeline
    pub fn on_reboot_complete<D: CaptureDevice + ?Sized>(
        &mut self,
        device: &mut D,
        result: Result<(), DeviceError>,
    ) -> Result<(), CaptureError> {
        if self.halted {
            return Err(CaptureError::Halted);
        }
        self.stats.reboots += 1;

        if let Err(e) = result {
            if e.is_fatal() {
                error!("Camera reboot failed: {}", e);
                self.halt(device);
                return Err(CaptureError::Halted);
            }
            warn!("Camera reboot reported {}; recovering", e);
        } else {
            info!("Camera rebooted; recapturing slot {}", self.write_index);
        }

        if self.running {
            self.recover(device);
        }
        Ok(())
    }

    pub fn on_vsync(&mut self) {
        self.stats.vsyncs += 1;
    }

    /// Ask for the other sensor; applied on the next display tick
    pub fn request_switch(&mut self) {
        self.switch_requested = true;
    }

    /// Display tick: swap sensors if a switch was requested.
    ///
    /// A transient device result leaves the request pending for the next tick.
    pub fn apply_pending_switch<D: CaptureDevice + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<Option<SensorSelect>, DeviceError> {
        if !self.switch_requested || !self.running {
            return Ok(None);
        }
        self.switch_requested = false;

        let target = self.sensor.other();
        if let Err(e) = device.activate(target) {
            if e.is_transient() {
                debug!("Sensor switch deferred: {}", e);
                self.switch_requested = true;
            } else if e.is_fatal() {
                error!("Sensor switch to {} failed: {}", target, e);
                self.halt(device);
            }
            return Err(e);
        }

        let flip = self.flip_for(target);
        if let Err(e) = device.set_flip(target, flip) {
            warn!("Failed to set {:?} flip on {} sensor: {}", flip, target, e);
        }

        self.sensor = target;
        self.stabilized_count = 0;
        self.stats.sensor_switches += 1;
        info!("Switched to {} sensor", target);
        Ok(Some(target))
    }

    /// Stop capture and wait for the sensor to go idle, then park the device.
    ///
    /// If the sensor is still busy at `timeout` capture is restarted and the
    /// timeout is returned; the caller may try again later.
    pub async fn stop<D: CaptureDevice + ?Sized>(
        &mut self,
        device: &mut D,
        poll: Duration,
        timeout: Duration,
    ) -> Result<Duration, DeviceError> {
        if self.halted {
            return Ok(Duration::ZERO);
        }
        device.stop_capture();
        self.running = false;

        match wait_until(|| !device.is_busy(), poll, timeout).await {
            Ok(waited) => {
                device.stop_transfer();
                self.in_flight = None;
                if let Err(e) =
                    retry_transient("standby", &self.retry, || device.activate(SensorSelect::None))
                        .await
                {
                    warn!("Failed to put sensors in standby: {}", e);
                }
                self.pending_recapture = true;
                self.meter.restart();
                debug!("Capture stopped after {:?}", waited);
                Ok(waited)
            }
            Err(waited) => {
                warn!("Camera still busy after {:?}; restarting capture", waited);
                self.running = true;
                self.recover(device);
                Err(DeviceError::Timeout {
                    operation: "stop_capture",
                    waited,
                })
            }
        }
    }

    /// Reactivate the current sensor and restart capture after `stop`
    pub async fn resume<D: CaptureDevice + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<(), DeviceError> {
        if self.halted {
            return Err(DeviceError::Fatal {
                operation: "resume",
            });
        }
        let sensor = self.sensor;
        retry_transient("activate", &self.retry, || device.activate(sensor)).await?;

        let flip = self.flip_for(sensor);
        if let Err(e) = device.set_flip(sensor, flip) {
            warn!("Failed to set {:?} flip on {} sensor: {}", flip, sensor, e);
        }

        self.arm(device);
        device.clear_buffer();
        device.start_capture();
        self.stabilized_count = 0;
        self.running = true;
        info!("Capture resumed on {} sensor", sensor);
        Ok(())
    }

    /// Terminal stop: no transfer stays armed and nothing restarts capture
    fn halt<D: CaptureDevice + ?Sized>(&mut self, device: &mut D) {
        self.halted = true;
        self.running = false;
        self.in_flight = None;
        device.stop_capture();
        device.stop_transfer();
    }

    fn recover<D: CaptureDevice + ?Sized>(&mut self, device: &mut D) {
        device.stop_capture();
        device.stop_transfer();
        device.clear_buffer();
        self.pending_recapture = true;
        self.arm(device);
        device.start_capture();
    }

    fn flip_for(&self, sensor: SensorSelect) -> SensorFlip {
        self.camera.flip_for(sensor)
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn pending_recapture(&self) -> bool {
        self.pending_recapture
    }

    pub fn stabilized_count(&self) -> u32 {
        self.stabilized_count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn is_stabilized(&self) -> bool {
        self.stabilized_count > self.threshold
    }

    pub fn switch_requested(&self) -> bool {
        self.switch_requested
    }

    pub fn sensor(&self) -> SensorSelect {
        self.sensor
    }

    pub fn in_flight(&self) -> Option<TransferRequest> {
        self.in_flight
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn last_fps(&self) -> Option<f64> {
        self.meter.last_fps()
    }
}
