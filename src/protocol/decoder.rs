//! Type-routed payload decoding.
//!
//! Document payloads (JSON, gzip) are passed through as opaque text so the
//! dispatcher can short-circuit without touching the display adapter. Frame
//! payloads decode to a [`FrameImage`]. Both failure paths are recoverable
//! and request-scoped: the hardware is never touched on a decode error.

use std::io::Read;

use flate2::read::GzDecoder;
use tracing::{debug, trace};

use super::envelope::{FrameEnvelope, PayloadKind};
use crate::frame::FrameImage;
use crate::{RelayError, Result};

/// Result of decoding one envelope payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    /// A non-frame payload: dispatch stops here, display untouched.
    Document { kind: PayloadKind, routing: u8, text: String },
    /// A raster frame bound for the panel.
    Frame(FrameImage),
}

/// Decode an envelope's payload according to its declared type.
pub fn decode(envelope: &FrameEnvelope<'_>) -> Result<DecodedPayload> {
    match envelope.kind {
        PayloadKind::Json => {
            let text = String::from_utf8_lossy(envelope.payload).into_owned();
            trace!(bytes = text.len(), routing = envelope.routing, "JSON document passthrough");
            Ok(DecodedPayload::Document {
                kind: PayloadKind::Json,
                routing: envelope.routing,
                text,
            })
        }
        PayloadKind::Gzip => {
            let text = inflate_document(envelope.payload)?;
            trace!(
                compressed = envelope.payload.len(),
                inflated = text.len(),
                routing = envelope.routing,
                "Inflated gzip document"
            );
            Ok(DecodedPayload::Document {
                kind: PayloadKind::Gzip,
                routing: envelope.routing,
                text,
            })
        }
        PayloadKind::Frame => {
            let image = decode_frame(envelope.payload)?;
            debug!(
                width = image.width(),
                height = image.height(),
                bytes = envelope.payload.len(),
                legacy = envelope.is_legacy(),
                "Decoded frame payload"
            );
            Ok(DecodedPayload::Frame(image))
        }
    }
}

/// Inflate a gzip payload to the embedded document text.
///
/// Non-UTF-8 document bytes are replaced rather than rejected; the document
/// is opaque to the relay and only logged or echoed.
fn inflate_document(payload: &[u8]) -> Result<String> {
    let mut decoder = GzDecoder::new(payload);
    let mut inflated = Vec::new();
    decoder.read_to_end(&mut inflated).map_err(|e| {
        RelayError::decompression(
            format!("{} compressed bytes rejected by gzip decoder", payload.len()),
            Some(e),
        )
    })?;
    Ok(String::from_utf8_lossy(&inflated).into_owned())
}

/// Decode a raster payload. PNG is the wire contract; the decoder accepts
/// any container the `image` crate recognizes from its magic bytes.
fn decode_frame(payload: &[u8]) -> Result<FrameImage> {
    let decoded = image::load_from_memory(payload).map_err(|e| {
        RelayError::image_decode_with_source(
            format!("{} payload bytes are not a decodable raster", payload.len()),
            e,
        )
    })?;
    Ok(FrameImage::from_rgb_image(decoded.to_rgb8()))
}
