//! Frame buffers handed over by the camera pipeline.
//!
//! - `Image`: owned 8-bit, 3-channel interleaved pixel buffer.
//! - `FrameSample`: preview + full-resolution image pair for one frame cycle.
//! - `FrameCycle`: a sample plus the tracked objects reported alongside it.
//!
//! The preview image is what the detector/tracker ran on; the full-resolution
//! image is what gets scored and persisted.

use anyhow::{anyhow, Context, Result};
use image::{ExtendedColorType, ImageEncoder};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use crate::detect::TrackedObject;

// ----------------------------------------------------------------------------
// Image: owned pixel buffer
// ----------------------------------------------------------------------------

/// Channel order of an interleaved 3-channel buffer.
///
/// Camera pipelines usually hand out BGR; decoded files come back as RGB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChannelOrder {
    #[default]
    Bgr,
    Rgb,
}

#[derive(Clone, Debug)]
pub struct Image {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
}

impl Image {
    /// Wrap an interleaved buffer. The length must be exactly `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, order: ChannelOrder) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if width == 0 || height == 0 {
            return Err(anyhow!("image dimensions must be non-zero"));
        }
        if data.len() != expected {
            return Err(anyhow!(
                "pixel buffer is {} bytes; {}x{} needs {}",
                data.len(),
                width,
                height,
                expected
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            order,
        })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel, in `order`.
    pub fn from_fn(
        width: u32,
        height: u32,
        order: ChannelOrder,
        mut f: impl FnMut(u32, u32) -> [u8; 3],
    ) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
            order,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// 8-bit luma plane using the BT.601 fixed-point weights common to
    /// computer-vision libraries (`(4899 R + 9617 G + 1868 B + 2^13) >> 14`).
    pub fn to_luma(&self) -> Vec<u8> {
        self.data
            .chunks_exact(3)
            .map(|px| {
                let (r, g, b) = match self.order {
                    ChannelOrder::Bgr => (px[2], px[1], px[0]),
                    ChannelOrder::Rgb => (px[0], px[1], px[2]),
                };
                let y = (r as u32) * 4899 + (g as u32) * 9617 + (b as u32) * 1868 + (1 << 13);
                (y >> 14).min(255) as u8
            })
            .collect()
    }

    fn to_rgb_bytes(&self) -> std::borrow::Cow<'_, [u8]> {
        match self.order {
            ChannelOrder::Rgb => std::borrow::Cow::Borrowed(&self.data),
            ChannelOrder::Bgr => {
                let mut rgb = self.data.clone();
                for px in rgb.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                std::borrow::Cow::Owned(rgb)
            }
        }
    }

    /// Decode an image file (PNG) into an RGB-ordered buffer.
    pub fn open(path: &Path) -> Result<Self> {
        let decoded =
            image::open(path).with_context(|| format!("decode image {}", path.display()))?;
        let rgb = decoded.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(rgb.into_raw(), width, height, ChannelOrder::Rgb)
    }

    /// Encode as PNG into `writer`.
    pub fn write_png<W: Write>(&self, writer: W) -> image::ImageResult<()> {
        let rgb = self.to_rgb_bytes();
        image::codecs::png::PngEncoder::new(writer).write_image(
            &rgb,
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )
    }
}

// ----------------------------------------------------------------------------
// FrameSample / FrameCycle
// ----------------------------------------------------------------------------

/// Preview + full-resolution images captured in the same cycle.
#[derive(Clone, Debug)]
pub struct FrameSample {
    pub preview: Image,
    pub full: Image,
    /// Monotonic arrival time.
    pub captured_at: Instant,
}

/// One pull from the frame source: images plus the tracker's object set.
#[derive(Clone, Debug)]
pub struct FrameCycle {
    pub sample: FrameSample,
    pub objects: Vec<TrackedObject>,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_mismatched_buffer() {
        assert!(Image::new(vec![0; 11], 2, 2, ChannelOrder::Bgr).is_err());
        assert!(Image::new(vec![], 0, 0, ChannelOrder::Bgr).is_err());
        assert!(Image::new(vec![0; 12], 2, 2, ChannelOrder::Bgr).is_ok());
    }

    #[test]
    fn luma_respects_channel_order() {
        // Pure red in each layout.
        let bgr = Image::new(vec![0, 0, 255], 1, 1, ChannelOrder::Bgr).unwrap();
        let rgb = Image::new(vec![255, 0, 0], 1, 1, ChannelOrder::Rgb).unwrap();
        assert_eq!(bgr.to_luma(), vec![76]);
        assert_eq!(rgb.to_luma(), vec![76]);

        let white = Image::new(vec![255; 3], 1, 1, ChannelOrder::Bgr).unwrap();
        assert_eq!(white.to_luma(), vec![255]);
    }

    #[test]
    fn png_roundtrip_preserves_pixels_as_rgb() {
        let img = Image::from_fn(3, 2, ChannelOrder::Bgr, |x, y| [x as u8, y as u8, 200]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        img.write_png(std::fs::File::create(&path).unwrap()).unwrap();

        let decoded = Image::open(&path).unwrap();
        assert_eq!(decoded.order, ChannelOrder::Rgb);
        assert_eq!((decoded.width, decoded.height), (3, 2));
        // BGR [x, y, 200] becomes RGB [200, y, x].
        assert_eq!(decoded.pixel(2, 1), [200, 1, 2]);
        assert_eq!(decoded.to_luma(), img.to_luma());
    }
}
