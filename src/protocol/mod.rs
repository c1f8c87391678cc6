//! Wire protocol layer: envelope detection and payload decoding.
//!
//! The transport hands the relay a raw request body. This module decides
//! what that body is (prefixed envelope or legacy raster), then decodes it
//! into either an opaque document or a [`FrameImage`](crate::FrameImage).
//! Both steps are pure and reentrant; concurrent requests share nothing.

mod decoder;
mod envelope;

pub use decoder::{DecodedPayload, decode};
pub use envelope::{FrameEnvelope, PREFIX_LEN, PayloadKind};
