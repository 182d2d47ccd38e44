use super::types::{Interrupt, SensorFlip, SensorSelect, TransferRequest};
use crate::error::DeviceError;
use tokio::sync::mpsc;

pub type InterruptSender = mpsc::UnboundedSender<Interrupt>;
pub type InterruptReceiver = mpsc::UnboundedReceiver<Interrupt>;

/// Create the line a device raises interrupts on
pub fn interrupt_line() -> (InterruptSender, InterruptReceiver) {
    mpsc::unbounded_channel()
}

/// Camera sensor plus the DMA engine that drains it
///
/// All calls are synchronous. Asynchronous work (frame transfers, error and
/// reboot notifications) is reported through the interrupt line handed to
/// [`CaptureDevice::attach`].
pub trait CaptureDevice {
    /// Register the interrupt line for vsync, buffer error, reboot and transfer completion
    fn attach(&mut self, line: InterruptSender);

    fn initialize(&mut self) -> Result<(), DeviceError>;

    /// Activate a sensor; `SensorSelect::None` puts both in standby
    fn activate(&mut self, sensor: SensorSelect) -> Result<(), DeviceError>;

    fn set_flip(&mut self, sensor: SensorSelect, flip: SensorFlip) -> Result<(), DeviceError>;

    /// Arm one frame transfer. Returns immediately and does not re-arm itself.
    fn request_line_transfer(&mut self, request: TransferRequest);

    /// Abort the armed transfer
    fn stop_transfer(&mut self);

    fn start_capture(&mut self);

    fn stop_capture(&mut self);

    /// Discard whatever the receive FIFO holds
    fn clear_buffer(&mut self);

    /// Capture is enabled and the sensor is still streaming
    fn is_busy(&self) -> bool;

    /// The DMA channel is still moving data
    fn is_transfer_busy(&self) -> bool;

    /// Outer LED off for the duration of a still exposure
    fn switch_off_led(&mut self) -> Result<(), DeviceError>;

    /// Outer LED blinking while recording, steady otherwise
    fn set_led(&mut self, blink: bool) -> Result<(), DeviceError>;

    /// Land the lines of a finished transfer in `target`.
    ///
    /// Hardware DMA has already written the memory by the time the completion
    /// fires, so real devices keep the default.
    fn receive_frame(&mut self, _request: &TransferRequest, _target: &mut [u16]) {}
}
