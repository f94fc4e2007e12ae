// Backbuffer: the CPU-side pixel allocation that external renderer code draws
// into and the presentation path blits from. Pixels are 32-bit RGBA, row
// major, top-down. Storage is a Vec<u32> so the memory is always 4-byte
// aligned; the framebuffer descriptor exposes it as raw bytes.

use thiserror::Error;

/// Bytes occupied by one RGBA pixel.
pub const BYTES_PER_PIXEL: u32 = 4;

#[derive(Debug, Error)]
#[error("backbuffer allocation of {bytes} bytes failed")]
pub struct AllocError {
    pub bytes: usize,
}

#[derive(Debug, Error)]
#[error("no backbuffer has been allocated yet")]
pub struct NoBackbuffer;

/// Writable view of the current backbuffer handed to renderer code.
/// Callers may fill up to `height * stride` bytes; the memory stays owned by
/// the window state and must never be freed or reallocated by the caller.
pub struct FrameBuffer<'a> {
    pub pixels: &'a mut [u8],
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

/// Owner of the pixel memory. Starts unallocated; `resize` brings it in sync
/// with the window's physical client size.
#[derive(Debug, Default)]
pub struct Backbuffer {
    memory: Vec<u32>,
    width: u32,
    height: u32,
    stride: u32,
}

impl Backbuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes between the start of consecutive rows.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn is_allocated(&self) -> bool {
        !self.memory.is_empty()
    }

    /// Pixel memory as packed u32 values (RGBA bytes in little-endian order).
    pub fn pixels(&self) -> &[u32] {
        &self.memory
    }

    /// (Re)allocate the buffer to match a physical client size.
    ///
    /// Requesting the dimensions the buffer already has is a successful no-op,
    /// so spurious size notifications cause no allocation churn. On allocation
    /// failure the existing buffer is left untouched and an error is returned;
    /// the caller keeps presenting at the old size until a later resize
    /// succeeds. On success the previous allocation is released only after the
    /// new one is installed.
    pub fn resize(&mut self, physical_w: u32, physical_h: u32) -> Result<(), AllocError> {
        if physical_w == self.width && physical_h == self.height && !self.memory.is_empty() {
            // There's no need to resize.
            return Ok(());
        }
        let count = (physical_w as usize).saturating_mul(physical_h as usize);
        let mut fresh: Vec<u32> = Vec::new();
        if fresh.try_reserve_exact(count).is_err() {
            // Keep the prior backbuffer since memory allocation failed.
            return Err(AllocError {
                bytes: count.saturating_mul(BYTES_PER_PIXEL as usize),
            });
        }
        fresh.resize(count, 0);
        self.memory = fresh;
        self.width = physical_w;
        self.height = physical_h;
        self.stride = physical_w * BYTES_PER_PIXEL;
        Ok(())
    }

    /// Retrieve a description of the current framebuffer, or fail if nothing
    /// has been allocated yet (window not created or never shown).
    pub fn frame_buffer(&mut self) -> Result<FrameBuffer<'_>, NoBackbuffer> {
        if self.memory.is_empty() {
            return Err(NoBackbuffer);
        }
        Ok(FrameBuffer {
            pixels: bytemuck::cast_slice_mut(&mut self.memory),
            width: self.width,
            height: self.height,
            stride: self.stride,
        })
    }
}
