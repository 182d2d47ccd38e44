use super::interface::{CaptureDevice, InterruptSender};
use super::types::{Interrupt, LedState, SensorFlip, SensorSelect, TransferRequest};
use crate::config::SimulationConfig;
use crate::error::DeviceError;
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace, warn};

/// Software stand-in for the camera and its DMA channel
///
/// Frames are produced by calling [`SimulatedDevice::advance_frame`] on the
/// sensor clock. Each delivered frame is filled with one pixel value so tests
/// can tell which capture ended up where.
pub struct SimulatedDevice {
    line: Option<InterruptSender>,
    initialized: bool,
    active: SensorSelect,
    flips: HashMap<SensorSelect, SensorFlip>,
    capturing: bool,
    armed: Option<TransferRequest>,
    delivered: VecDeque<(u64, u16)>,
    frames: u64,
    led: LedState,
    transfer_stuck: bool,
    busy_after_stop: Cell<u32>,
    stop_latency_polls: u32,
    never_settles: bool,
    scripted: HashMap<&'static str, VecDeque<DeviceError>>,
    faults: SimulationConfig,
    activations: Vec<SensorSelect>,
    requests: Vec<TransferRequest>,
    led_history: Vec<LedState>,
    clears: u32,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self::with_faults(SimulationConfig {
            buffer_error_interval: 0,
            reboot_interval: 0,
        })
    }

    pub fn with_faults(faults: SimulationConfig) -> Self {
        Self {
            line: None,
            initialized: false,
            active: SensorSelect::None,
            flips: HashMap::new(),
            capturing: false,
            armed: None,
            delivered: VecDeque::new(),
            frames: 0,
            led: LedState::On,
            transfer_stuck: false,
            busy_after_stop: Cell::new(0),
            stop_latency_polls: 0,
            never_settles: false,
            scripted: HashMap::new(),
            faults,
            activations: Vec::new(),
            requests: Vec::new(),
            led_history: Vec::new(),
            clears: 0,
        }
    }

    /// Pixel value written into every pixel of the given frame
    pub fn frame_pixel(frame: u64, sensor: SensorSelect) -> u16 {
        let base = (frame & 0x7fff) as u16;
        if sensor.is_external() {
            base | 0x8000
        } else {
            base
        }
    }

    /// One sensor period: raise vsync and complete the armed transfer
    pub fn advance_frame(&mut self) {
        if !self.capturing || self.active == SensorSelect::None {
            return;
        }

        self.frames += 1;
        let frame = self.frames;
        self.raise(Interrupt::Vsync);

        if self.faults.buffer_error_interval > 0 && frame % self.faults.buffer_error_interval == 0 {
            warn!("Simulated buffer error on frame {}", frame);
            self.raise(Interrupt::BufferError);
            return;
        }

        if self.faults.reboot_interval > 0 && frame % self.faults.reboot_interval == 0 {
            warn!("Simulated device reboot on frame {}", frame);
            self.raise(Interrupt::RebootComplete(Ok(())));
            return;
        }

        if let Some(request) = self.armed.take() {
            self.delivered
                .push_back((request.sequence, Self::frame_pixel(frame, self.active)));
            trace!(
                "Simulated frame {} complete into slot {} (seq {})",
                frame,
                request.slot,
                request.sequence
            );
            self.raise(Interrupt::TransferComplete(request));
        }
    }

    /// Raise an arbitrary interrupt on the attached line
    pub fn raise(&self, interrupt: Interrupt) {
        if let Some(line) = &self.line {
            if line.send(interrupt).is_err() {
                debug!("Interrupt line closed; dropping interrupt");
            }
        }
    }

    /// Make the next call of `operation` fail with `error`
    pub fn script_failure(&mut self, operation: &'static str, error: DeviceError) {
        self.scripted.entry(operation).or_default().push_back(error);
    }

    /// Keep the DMA channel reporting busy, as if a transfer overran its slot
    pub fn set_transfer_stuck(&mut self, stuck: bool) {
        self.transfer_stuck = stuck;
    }

    /// Number of busy polls that still see the sensor streaming after a stop
    pub fn set_stop_latency(&mut self, polls: u32) {
        self.stop_latency_polls = polls;
    }

    /// Sensor never leaves the busy state once stopped
    pub fn set_never_settles(&mut self, never: bool) {
        self.never_settles = never;
    }

    pub fn active_sensor(&self) -> SensorSelect {
        self.active
    }

    pub fn flip(&self, sensor: SensorSelect) -> SensorFlip {
        self.flips.get(&sensor).copied().unwrap_or_default()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn armed(&self) -> Option<TransferRequest> {
        self.armed
    }

    pub fn led(&self) -> LedState {
        self.led
    }

    pub fn led_history(&self) -> &[LedState] {
        &self.led_history
    }

    pub fn activations(&self) -> &[SensorSelect] {
        &self.activations
    }

    pub fn requests(&self) -> &[TransferRequest] {
        &self.requests
    }

    pub fn frames_produced(&self) -> u64 {
        self.frames
    }

    pub fn clear_count(&self) -> u32 {
        self.clears
    }

    fn take_scripted(&mut self, operation: &'static str) -> Result<(), DeviceError> {
        match self.scripted.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(error) => {
                debug!("Scripted failure for {}: {}", operation, error);
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn record_led(&mut self, state: LedState) {
        self.led = state;
        self.led_history.push(state);
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for SimulatedDevice {
    fn attach(&mut self, line: InterruptSender) {
        self.line = Some(line);
    }

    fn initialize(&mut self) -> Result<(), DeviceError> {
        self.take_scripted("initialize")?;
        self.initialized = true;
        debug!("Simulated device initialized");
        Ok(())
    }

    fn activate(&mut self, sensor: SensorSelect) -> Result<(), DeviceError> {
        if !self.initialized {
            return Err(DeviceError::IllegalState {
                operation: "activate",
            });
        }
        self.take_scripted("activate")?;
        self.active = sensor;
        self.activations.push(sensor);
        debug!("Simulated sensor activated: {}", sensor);
        Ok(())
    }

    fn set_flip(&mut self, sensor: SensorSelect, flip: SensorFlip) -> Result<(), DeviceError> {
        self.take_scripted("set_flip")?;
        self.flips.insert(sensor, flip);
        Ok(())
    }

    fn request_line_transfer(&mut self, request: TransferRequest) {
        self.armed = Some(request);
        self.requests.push(request);
    }

    fn stop_transfer(&mut self) {
        self.armed = None;
        self.transfer_stuck = false;
    }

    fn start_capture(&mut self) {
        self.capturing = true;
    }

    fn stop_capture(&mut self) {
        if self.capturing {
            self.busy_after_stop.set(self.stop_latency_polls);
        }
        self.capturing = false;
    }

    fn clear_buffer(&mut self) {
        self.clears += 1;
    }

    fn is_busy(&self) -> bool {
        if self.capturing {
            return true;
        }
        if self.never_settles {
            return true;
        }
        let remaining = self.busy_after_stop.get();
        if remaining > 0 {
            self.busy_after_stop.set(remaining - 1);
            return true;
        }
        false
    }

    fn is_transfer_busy(&self) -> bool {
        self.transfer_stuck
    }

    fn switch_off_led(&mut self) -> Result<(), DeviceError> {
        self.take_scripted("switch_off_led")?;
        self.record_led(LedState::Off);
        Ok(())
    }

    fn set_led(&mut self, blink: bool) -> Result<(), DeviceError> {
        self.take_scripted("set_led")?;
        self.record_led(if blink {
            LedState::Blinking
        } else {
            LedState::On
        });
        Ok(())
    }

    fn receive_frame(&mut self, request: &TransferRequest, target: &mut [u16]) {
        while let Some((sequence, pixel)) = self.delivered.pop_front() {
            if sequence == request.sequence {
                target.fill(pixel);
                return;
            }
        }
        warn!(
            "No simulated data for transfer seq {} into slot {}",
            request.sequence, request.slot
        );
    }
}
