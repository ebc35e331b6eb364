//! Opaque raster buffer handle.
//!
//! Image codec I/O lives outside the engine; layers that carry pixel data
//! hold one of these already-decoded buffers.

use std::sync::Arc;

/// A decoded, straight-alpha RGBA8 pixel buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    /// Row-major `[r, g, b, a]` bytes, length `width * height * 4`.
    rgba: Arc<[u8]>,
}

impl Bitmap {
    /// Wrap decoded pixels. `None` when the buffer length does not match the
    /// dimensions, or a dimension is zero.
    #[must_use]
    pub fn new(width: u32, height: u32, rgba: impl Into<Arc<[u8]>>) -> Option<Self> {
        let rgba = rgba.into();
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        if width == 0 || height == 0 || rgba.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            rgba,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Fetch one pixel. `None` out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba.get(idx..idx + 4)?.try_into().ok()
    }
}
