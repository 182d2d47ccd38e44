use super::buffers::{alloc_blocks, PixelBlock, PIXELS_PER_BLOCK};
use super::geometry::FrameGeometry;
use crate::error::CaptureError;
use tracing::{debug, info, trace};

/// Pre-allocated video reel: a fixed number of frame slots filled front to back
pub struct ReelBuffer {
    geometry: FrameGeometry,
    storage: Box<[PixelBlock]>,
    blocks_per_frame: usize,
    capacity: usize,
    count: usize,
}

impl ReelBuffer {
    /// Frames a memory budget holds once `reserve` frames are held back
    pub fn capacity_for(budget_bytes: u64, frame_bytes: usize, reserve: u32) -> usize {
        if frame_bytes == 0 {
            return 0;
        }
        let frames = budget_bytes / frame_bytes as u64;
        frames.saturating_sub(reserve as u64) as usize
    }

    pub fn with_budget(
        geometry: FrameGeometry,
        budget_bytes: u64,
        reserve: u32,
    ) -> Result<Self, CaptureError> {
        let capacity = Self::capacity_for(budget_bytes, geometry.frame_bytes(), reserve);
        Self::with_capacity(geometry, capacity)
    }

    pub fn with_capacity(geometry: FrameGeometry, capacity: usize) -> Result<Self, CaptureError> {
        geometry.check_alignment()?;
        if capacity == 0 {
            return Err(CaptureError::ReelAllocation {
                details: "reel must hold at least one frame".to_string(),
            });
        }

        let blocks_per_frame = geometry.pixel_count() / PIXELS_PER_BLOCK;
        let total_blocks = blocks_per_frame
            .checked_mul(capacity)
            .ok_or_else(|| CaptureError::ReelAllocation {
                details: format!("{} frames overflow the address space", capacity),
            })?;

        info!(
            "Allocated video reel: {} frames of {} bytes",
            capacity,
            geometry.frame_bytes()
        );

        Ok(Self {
            geometry,
            storage: alloc_blocks(total_blocks),
            blocks_per_frame,
            capacity,
            count: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.capacity
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Forget recorded frames; storage stays allocated
    pub fn reset(&mut self) {
        debug!("Resetting reel ({} frames discarded)", self.count);
        self.count = 0;
    }

    /// Append a frame, returning its slot, or `None` when every slot is taken
    pub fn push(&mut self, pixels: &[u16]) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let slot = self.count;
        self.slot_mut(slot).copy_from_slice(pixels);
        self.count += 1;
        trace!("Archived frame into reel slot {}", slot);
        Some(slot)
    }

    /// A recorded frame
    pub fn frame(&self, index: usize) -> Option<&[u16]> {
        if index >= self.count {
            return None;
        }
        let start = index * self.blocks_per_frame;
        Some(bytemuck::cast_slice(
            &self.storage[start..start + self.blocks_per_frame],
        ))
    }

    fn slot_mut(&mut self, index: usize) -> &mut [u16] {
        let start = index * self.blocks_per_frame;
        bytemuck::cast_slice_mut(&mut self.storage[start..start + self.blocks_per_frame])
    }
}
