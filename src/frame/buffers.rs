use super::geometry::{FrameGeometry, DMA_ALIGNMENT};
use crate::error::CaptureError;
use bytemuck::{Pod, Zeroable};
use tracing::debug;

pub(crate) const PIXELS_PER_BLOCK: usize = DMA_ALIGNMENT / 2;

/// One DMA-aligned run of pixels; frames are stored as slices of these
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C, align(32))]
pub(crate) struct PixelBlock([u16; PIXELS_PER_BLOCK]);

pub(crate) fn alloc_blocks(blocks: usize) -> Box<[PixelBlock]> {
    vec![PixelBlock::zeroed(); blocks].into_boxed_slice()
}

/// A single 32-byte aligned frame of 16-bit pixels
#[derive(Debug, Clone)]
pub struct AlignedFrame {
    blocks: Box<[PixelBlock]>,
}

impl AlignedFrame {
    pub fn new(geometry: FrameGeometry) -> Result<Self, CaptureError> {
        geometry.check_alignment()?;
        Ok(Self {
            blocks: alloc_blocks(geometry.pixel_count() / PIXELS_PER_BLOCK),
        })
    }

    pub fn pixels(&self) -> &[u16] {
        bytemuck::cast_slice(&self.blocks)
    }

    pub fn pixels_mut(&mut self) -> &mut [u16] {
        bytemuck::cast_slice_mut(&mut self.blocks)
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.blocks)
    }

    pub fn copy_from(&mut self, pixels: &[u16]) {
        self.pixels_mut().copy_from_slice(pixels);
    }

    pub fn clear(&mut self) {
        self.pixels_mut().fill(0);
    }

    pub(crate) fn address(&self) -> usize {
        self.blocks.as_ptr() as usize
    }
}

/// The ping-pong capture pair plus the still snapshot
///
/// Slots are plain storage. Which slot is being filled and which one is
/// presentable lives in the capture controller and display sync respectively.
pub struct FrameBufferSet {
    geometry: FrameGeometry,
    slots: [AlignedFrame; 2],
    snapshot: AlignedFrame,
}

impl FrameBufferSet {
    pub fn new(geometry: FrameGeometry) -> Result<Self, CaptureError> {
        let set = Self {
            geometry,
            slots: [AlignedFrame::new(geometry)?, AlignedFrame::new(geometry)?],
            snapshot: AlignedFrame::new(geometry)?,
        };

        debug!(
            "Allocated capture buffers: 2 x {} bytes + snapshot ({}x{})",
            geometry.frame_bytes(),
            geometry.width,
            geometry.height
        );

        Ok(set)
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Panics if `index` is not 0 or 1
    pub fn slot(&self, index: usize) -> &[u16] {
        self.slots[index].pixels()
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut [u16] {
        self.slots[index].pixels_mut()
    }

    pub fn snapshot(&self) -> &[u16] {
        self.snapshot.pixels()
    }

    /// Copy a capture slot into the snapshot buffer
    pub fn take_snapshot(&mut self, index: usize) {
        let Self {
            slots, snapshot, ..
        } = self;
        snapshot.copy_from(slots[index].pixels());
    }

    pub(crate) fn slot_address(&self, index: usize) -> usize {
        self.slots[index].address()
    }
}
