mod buffers;
mod geometry;
mod reel;

pub use buffers::{AlignedFrame, FrameBufferSet};
pub use geometry::{FrameGeometry, BYTES_PER_PIXEL, DMA_ALIGNMENT, TRANSFER_FIFO_BYTES};
pub use reel::ReelBuffer;
