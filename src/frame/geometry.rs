use crate::error::CaptureError;
use serde::{Deserialize, Serialize};

/// Bytes per captured pixel (16-bit direct color)
pub const BYTES_PER_PIXEL: usize = 2;

/// Alignment the DMA engine requires of every target buffer
pub const DMA_ALIGNMENT: usize = 32;

/// Receive FIFO size bounding how many lines one transfer may move
pub const TRANSFER_FIFO_BYTES: usize = 4096;

/// Dimensions of a captured frame and the transfer sizes derived from them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn line_bytes(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn frame_bytes(&self) -> usize {
        self.line_bytes() * self.height as usize
    }

    /// Largest line count the FIFO can hold in one transfer
    pub fn max_transfer_lines(&self) -> usize {
        (TRANSFER_FIFO_BYTES / self.line_bytes().max(1)).max(1)
    }

    /// Line count per transfer, rounded down so the frame splits into whole transfers
    pub fn transfer_lines(&self) -> usize {
        let height = self.height as usize;
        (2..=self.max_transfer_lines())
            .rev()
            .find(|lines| height % lines == 0)
            .unwrap_or(1)
    }

    /// Bytes moved per DMA chunk
    pub fn bytes_per_chunk(&self) -> usize {
        self.line_bytes() * self.transfer_lines()
    }

    /// Frames must be a whole number of aligned blocks
    pub fn check_alignment(&self) -> Result<(), CaptureError> {
        if self.pixel_count() == 0 {
            return Err(CaptureError::Geometry {
                details: "frame has no pixels".to_string(),
            });
        }
        if self.frame_bytes() % DMA_ALIGNMENT != 0 {
            return Err(CaptureError::Geometry {
                details: format!(
                    "{}x{} frame is {} bytes, not a multiple of {}",
                    self.width,
                    self.height,
                    self.frame_bytes(),
                    DMA_ALIGNMENT
                ),
            });
        }
        Ok(())
    }
}
