mod interface;
mod simulated;
mod types;

pub use interface::{interrupt_line, CaptureDevice, InterruptReceiver, InterruptSender};
pub use simulated::SimulatedDevice;
pub use types::{Interrupt, LedState, SensorFlip, SensorSelect, TransferRequest};
