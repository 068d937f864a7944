//! Decoded frame representation.
//!
//! This module provides the one raster type every other layer exchanges.
//!
//! - `Frame`: tightly packed RGB8 raster with validated dimensions.
//! - Horizontal mirroring for live-view streams.
//! - Decode/encode glue over the `image` crate.
//!
//! Frames are plain data. Sources produce them, the engine reads them,
//! the renderer copies them; nothing in this module holds device or
//! decoder handles.

use std::path::Path;

use crate::error::{Error, Result};

// ----------------------------------------------------------------------------
// Frame: RGB8 raster
// ----------------------------------------------------------------------------

/// One decoded RGB8 frame. `data.len() == width * height * 3`, rows
/// packed top to bottom with no stride padding.
///
/// The 0x0 frame returned by [`Frame::empty`] is the designated
/// placeholder carried by degraded pipeline results; every decoded
/// frame has non-zero dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Packed RGB bytes. Private so the length invariant holds.
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Build a frame from packed RGB bytes, validating the length.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(Error::Read(format!(
                "frame buffer is {} bytes, {}x{} RGB needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// The designated empty placeholder (0x0, no pixels).
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Packed RGB bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Mirror left-to-right. Each row's pixels are reversed as whole
    /// RGB triplets; dimensions are unchanged.
    pub fn flip_horizontal(&self) -> Frame {
        if self.is_empty() {
            return self.clone();
        }
        let row_bytes = self.width as usize * 3;
        let mut out = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(row_bytes) {
            for px in row.chunks_exact(3).rev() {
                out.extend_from_slice(px);
            }
        }
        Frame {
            data: out,
            width: self.width,
            height: self.height,
        }
    }

    /// Decode a still image from disk into RGB8.
    pub fn decode(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .map_err(|e| Error::Read(format!("decode {}: {}", path.display(), e)))?
            .to_rgb8();
        let (width, height) = img.dimensions();
        Ok(Self {
            data: img.into_raw(),
            width,
            height,
        })
    }

    /// Write this frame to disk as PNG.
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let img = self.to_image().ok_or_else(|| {
            Error::Export(format!(
                "frame buffer does not match {}x{}",
                self.width, self.height
            ))
        })?;
        img.save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| Error::Export(format!("write {}: {}", path.display(), e)))?;
        Ok(())
    }

    /// View as an `image` buffer for drawing. `None` only if the
    /// length invariant were broken, which `new` prevents.
    pub(crate) fn to_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub(crate) fn from_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            data: img.into_raw(),
            width,
            height,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_frame(width: u32, height: u32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for i in 0..(width * height) {
            data.push((i * 3) as u8);
            data.push((i * 3 + 1) as u8);
            data.push((i * 3 + 2) as u8);
        }
        Frame::new(data, width, height).unwrap()
    }

    #[test]
    fn new_rejects_mismatched_buffer() {
        let err = Frame::new(vec![0u8; 10], 2, 2).unwrap_err();
        assert_eq!(err.kind(), "read");
    }

    #[test]
    fn empty_frame_is_empty() {
        let f = Frame::empty();
        assert!(f.is_empty());
        assert_eq!(f.pixels().len(), 0);
    }

    #[test]
    fn flip_reverses_each_row() {
        // 2x1: pixel A then pixel B.
        let f = Frame::new(vec![1, 2, 3, 4, 5, 6], 2, 1).unwrap();
        let flipped = f.flip_horizontal();
        assert_eq!(flipped.pixels(), &[4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn flip_twice_is_identity() {
        let f = make_test_frame(4, 3);
        assert_eq!(f.flip_horizontal().flip_horizontal(), f);
    }

    #[test]
    fn flip_of_empty_is_empty() {
        assert_eq!(Frame::empty().flip_horizontal(), Frame::empty());
    }

    #[test]
    fn decode_missing_file_is_read_error() {
        let err = Frame::decode(Path::new("/nonexistent/frame.jpg")).unwrap_err();
        assert_eq!(err.kind(), "read");
    }

    #[test]
    fn save_and_decode_round_trip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.png");
        let f = make_test_frame(8, 5);
        f.save_png(&path)?;
        let back = Frame::decode(&path)?;
        assert_eq!(back, f);
        Ok(())
    }
}
