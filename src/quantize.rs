//! Palette quantization and the fixed frame-fit policy.
//!
//! E-paper controllers show a handful of fixed colors, so every incoming
//! RGB frame is mapped pixel-by-pixel to the nearest palette entry before it
//! reaches a backend. The mapping is pure and deterministic: the same frame
//! and palette always produce byte-identical output, and ties break toward
//! the earliest palette entry.
//!
//! ## Fit policy
//!
//! When a frame's dimensions differ from the active panel, the frame is
//! resized to exactly panel width x height: scaled preserving aspect ratio
//! with nearest-neighbor filtering, centered, remainder letterboxed with the
//! palette's white entry (first entry when the palette has no white).
//! Nearest-neighbor keeps the result exactly reproducible across platforms,
//! which matters more than smoothness for an image that is about to collapse
//! to at most seven colors. Callers that want mismatches rejected instead
//! use [`SizePolicy::Exact`].

use image::imageops::{self, FilterType};
use tracing::debug;

use crate::frame::{FrameImage, IndexedFrame};
use crate::panel::{PaletteEntry, PanelModel, Rgb};
use crate::{RelayError, Result};

/// How the dispatcher treats frames whose dimensions differ from the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizePolicy {
    /// Resize with the fixed letterbox policy. Matches the upstream backend,
    /// which renders at panel resolution and only drifts on misconfiguration.
    #[default]
    Letterbox,
    /// Reject mismatched frames with a dimension error.
    Exact,
}

/// Index of the palette entry nearest to `color`.
///
/// Distance is squared Euclidean in RGB space; the first entry among equals
/// wins. An empty palette cannot occur for registry models, but degrades to
/// index 0 rather than panicking.
pub fn nearest_index(color: Rgb, palette: &[PaletteEntry]) -> u8 {
    let mut best = 0usize;
    let mut best_distance = u32::MAX;
    for (index, entry) in palette.iter().enumerate() {
        let distance = color.distance_sq(entry.color);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best as u8
}

/// Map every pixel to its nearest palette entry.
pub fn quantize(image: &FrameImage, palette: &[PaletteEntry]) -> IndexedFrame {
    let mut indices = Vec::with_capacity(image.width() as usize * image.height() as usize);
    for y in 0..image.height() {
        for x in 0..image.width() {
            indices.push(nearest_index(image.pixel(x, y), palette));
        }
    }
    IndexedFrame::new(image.width(), image.height(), indices)
}

/// Apply the fixed fit policy: aspect-preserving nearest-neighbor scale to
/// the largest size fitting inside the panel, centered on a background of
/// the panel's letterbox color. Frames that already match pass through
/// untouched.
pub fn fit_to_panel(image: FrameImage, model: &PanelModel) -> FrameImage {
    if image.matches(model.width, model.height) {
        return image;
    }

    let scale = f64::min(
        model.width as f64 / image.width() as f64,
        model.height as f64 / image.height() as f64,
    );
    let scaled_width = ((image.width() as f64 * scale).floor() as u32).clamp(1, model.width);
    let scaled_height = ((image.height() as f64 * scale).floor() as u32).clamp(1, model.height);

    debug!(
        from_width = image.width(),
        from_height = image.height(),
        to_width = scaled_width,
        to_height = scaled_height,
        model = model.key,
        "Letterboxing frame to panel dimensions"
    );

    let scaled =
        imageops::resize(&image.to_rgb_image(), scaled_width, scaled_height, FilterType::Nearest);

    let background = model.background_color();
    let mut canvas = image::RgbImage::from_pixel(
        model.width,
        model.height,
        image::Rgb([background.r, background.g, background.b]),
    );
    let x = ((model.width - scaled_width) / 2) as i64;
    let y = ((model.height - scaled_height) / 2) as i64;
    imageops::replace(&mut canvas, &scaled, x, y);

    FrameImage::from_rgb_image(canvas)
}

/// Full preparation pipeline for a decoded frame: size policy, then
/// quantization against the model's palette.
pub fn prepare(image: FrameImage, model: &PanelModel, policy: SizePolicy) -> Result<IndexedFrame> {
    let sized = match policy {
        SizePolicy::Letterbox => fit_to_panel(image, model),
        SizePolicy::Exact => {
            if !image.matches(model.width, model.height) {
                return Err(RelayError::OversizeImage {
                    width: image.width(),
                    height: image.height(),
                    model: model.key.to_string(),
                    panel_width: model.width,
                    panel_height: model.height,
                });
            }
            image
        }
    };
    Ok(quantize(&sized, model.palette))
}
