//! Raster frame types flowing through the relay.
//!
//! [`FrameImage`] is the decoded RGB raster produced by the payload decoder;
//! [`IndexedFrame`] is the palette-indexed form produced by the quantizer and
//! consumed by both render backends.

use crate::panel::{PaletteEntry, Rgb};
use crate::{RelayError, Result};

/// Decoded frame raster: row-major RGB24, three bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameImage {
    /// Create a frame from a raw RGB24 buffer.
    ///
    /// The buffer must contain exactly `width * height * 3` bytes.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(RelayError::image_decode(format!(
                "pixel buffer is {} bytes, {}x{} RGB needs {}",
                pixels.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// Create a frame filled with a single color.
    pub fn filled(width: u32, height: u32, color: Rgb) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..width as usize * height as usize {
            pixels.extend_from_slice(&[color.r, color.g, color.b]);
        }
        Self { width, height, pixels }
    }

    /// Wrap a decoded `image` crate buffer.
    pub fn from_rgb_image(image: image::RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height, pixels: image.into_raw() }
    }

    /// Convert into an `image` crate buffer for resizing or PNG encoding.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.width, self.height, |x, y| {
            let Rgb { r, g, b } = self.pixel(x, y);
            image::Rgb([r, g, b])
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGB24 buffer, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at (x, y). Out-of-range coordinates read as black; the
    /// constructor invariant makes that path unreachable for valid indices.
    pub fn pixel(&self, x: u32, y: u32) -> Rgb {
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        match self.pixels.get(offset..offset + 3) {
            Some([r, g, b]) => Rgb::new(*r, *g, *b),
            _ => Rgb::BLACK,
        }
    }

    /// Whether dimensions match exactly.
    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width && self.height == height
    }
}

/// Quantized frame: one palette index per pixel, row-major.
///
/// Indices are always valid positions into the palette the quantizer was
/// given; the hardware driver packs them into controller codes and the
/// simulation backend expands them back to RGB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFrame {
    width: u32,
    height: u32,
    indices: Vec<u8>,
}

impl IndexedFrame {
    pub(crate) fn new(width: u32, height: u32, indices: Vec<u8>) -> Self {
        debug_assert_eq!(indices.len(), width as usize * height as usize);
        Self { width, height, indices }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Palette indices, row-major.
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Expand back to RGB using the palette the indices were built against.
    pub fn to_rgb(&self, palette: &[PaletteEntry]) -> FrameImage {
        let fallback = palette.first().map(|entry| entry.color).unwrap_or(Rgb::WHITE);
        let mut pixels = Vec::with_capacity(self.indices.len() * 3);
        for &index in &self.indices {
            let color =
                palette.get(index as usize).map(|entry| entry.color).unwrap_or(fallback);
            pixels.extend_from_slice(&[color.r, color.g, color.b]);
        }
        FrameImage { width: self.width, height: self.height, pixels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::registry;

    #[test]
    fn new_rejects_mismatched_buffer() {
        let result = FrameImage::new(4, 4, vec![0u8; 10]);
        assert!(matches!(result, Err(RelayError::ImageDecode { .. })));
    }

    #[test]
    fn filled_frame_has_uniform_pixels() {
        let frame = FrameImage::filled(3, 2, Rgb::new(10, 20, 30));
        assert_eq!(frame.pixels().len(), 3 * 2 * 3);
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(frame.pixel(x, y), Rgb::new(10, 20, 30));
            }
        }
    }

    #[test]
    fn rgb_image_round_trip_preserves_bytes() {
        let frame = FrameImage::new(2, 2, vec![
            1, 2, 3, 4, 5, 6, //
            7, 8, 9, 10, 11, 12,
        ])
        .expect("valid buffer");
        let round_tripped = FrameImage::from_rgb_image(frame.to_rgb_image());
        assert_eq!(frame, round_tripped);
    }

    #[test]
    fn indexed_frame_expands_through_palette() {
        let palette = registry::default_model().palette;
        let indexed = IndexedFrame::new(2, 1, vec![0, 1]);
        let rgb = indexed.to_rgb(palette);
        assert_eq!(rgb.pixel(0, 0), palette[0].color);
        assert_eq!(rgb.pixel(1, 0), palette[1].color);
    }
}
