use std::sync::Arc;

use super::SourceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
}

impl PixelFormat {
    #[inline]
    pub const fn bytes_per_pixel(self) -> u32 {
        4
    }
}

/// One decoded image.
///
/// Pixel bytes are shared so a producer can hand the same buffer to several
/// consumers without copying.
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row; at least `width * 4`.
    pub stride: u32,
    pub pixel_format: PixelFormat,
}

impl Frame {
    pub fn new_rgba(data: impl Into<Arc<[u8]>>, width: u32, height: u32) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride: width.saturating_mul(PixelFormat::Rgba8.bytes_per_pixel()),
            pixel_format: PixelFormat::Rgba8,
        }
    }

    pub fn new_bgra(data: impl Into<Arc<[u8]>>, width: u32, height: u32, stride: u32) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            stride,
            pixel_format: PixelFormat::Bgra8,
        }
    }

    /// Single-color frame, handy for placeholders and tests.
    pub fn solid_rgba(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let data: Vec<u8> = rgba.iter().copied().cycle().take(pixels * 4).collect();
        Self::new_rgba(data, width, height)
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Checks dimensions against the buffer.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.width == 0 || self.height == 0 {
            return Err(SourceError::Malformed(format!(
                "zero-sized frame {}x{}",
                self.width, self.height
            )));
        }

        let min_stride = self.width as u64 * self.pixel_format.bytes_per_pixel() as u64;
        if (self.stride as u64) < min_stride {
            return Err(SourceError::Malformed(format!(
                "stride {} shorter than a {}-pixel row",
                self.stride, self.width
            )));
        }

        let needed = self.stride as u64 * (self.height as u64 - 1) + min_stride;
        if (self.data.len() as u64) < needed {
            return Err(SourceError::Malformed(format!(
                "{} bytes for a {}x{} frame (need {needed})",
                self.data.len(),
                self.width,
                self.height
            )));
        }

        Ok(())
    }

    /// Tightly packed RGBA rows, converting and dropping row padding as needed.
    pub fn to_packed_rgba(&self) -> Result<Vec<u8>, SourceError> {
        self.validate()?;

        let row_bytes = self.width as usize * 4;
        let mut out = Vec::with_capacity(row_bytes * self.height as usize);

        for row in 0..self.height as usize {
            let start = row * self.stride as usize;
            let src = self
                .data
                .get(start..start + row_bytes)
                .ok_or_else(|| SourceError::Malformed(format!("row {row} out of bounds")))?;
            match self.pixel_format {
                PixelFormat::Rgba8 => out.extend_from_slice(src),
                PixelFormat::Bgra8 => {
                    for px in src.chunks_exact(4) {
                        out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                    }
                }
            }
        }

        Ok(out)
    }
}
