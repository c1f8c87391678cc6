//! Wire envelope detection and stripping.
//!
//! Incoming request bodies optionally begin with an 8-byte ASCII prefix:
//!
//! ```text
//! L L L L T T R R | payload...
//! ```
//!
//! - `LLLL` - zero-padded decimal payload length hint (0000..9999, advisory)
//! - `TT`   - zero-padded decimal payload type (00 JSON, 01 gzip, 02 frame)
//! - `RR`   - zero-padded decimal routing tag (caller-defined, passed through)
//!
//! Detection is deliberately conservative: the first 8 bytes must all be
//! ASCII decimal digits and the type field must be a known value. Anything
//! else, including bodies shorter than 8 bytes, is treated as a legacy
//! unprefixed raster payload. Parsing never fails and never panics; the
//! worst case is the legacy interpretation.
//!
//! The length hint is advisory only. A 4-digit field cannot describe real
//! raster payloads anyway, so a mismatch against the actual payload size is
//! logged and otherwise ignored.

use tracing::{debug, warn};

/// Size of the optional ASCII prefix.
pub const PREFIX_LEN: usize = 8;

/// Declared payload type from the envelope's `TT` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum PayloadKind {
    /// Type 00: opaque JSON document, no display action.
    Json,
    /// Type 01: gzip-compressed JSON document, no display action.
    Gzip,
    /// Type 02 and legacy unprefixed bodies: raster frame for the panel.
    Frame,
}

impl PayloadKind {
    /// Map the parsed two-digit type field to a known kind.
    pub fn from_type_field(value: u32) -> Option<Self> {
        match value {
            0 => Some(PayloadKind::Json),
            1 => Some(PayloadKind::Gzip),
            2 => Some(PayloadKind::Frame),
            _ => None,
        }
    }

    /// Wire value of this kind.
    pub fn type_field(self) -> u8 {
        match self {
            PayloadKind::Json => 0,
            PayloadKind::Gzip => 1,
            PayloadKind::Frame => 2,
        }
    }
}

/// One parsed request body: classification plus the payload slice.
///
/// Borrows the raw buffer; envelopes live for a single dispatch and are
/// discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEnvelope<'a> {
    pub kind: PayloadKind,
    /// Routing tag from the `RR` field; 0 for legacy bodies. Passed through
    /// for logging, unused by core routing.
    pub routing: u8,
    /// Length hint from the `LLLL` field; `None` for legacy bodies.
    pub declared_len: Option<u32>,
    pub payload: &'a [u8],
}

impl<'a> FrameEnvelope<'a> {
    /// Classify a raw request body, stripping the prefix when one is present.
    ///
    /// Infallible: malformed prefixes fall through to the legacy
    /// interpretation of the whole buffer as a raster frame.
    pub fn parse(raw: &'a [u8]) -> FrameEnvelope<'a> {
        if raw.len() < PREFIX_LEN {
            return Self::legacy(raw);
        }

        let Some(declared_len) = parse_digits(&raw[0..4]) else {
            return Self::legacy(raw);
        };
        let Some(type_field) = parse_digits(&raw[4..6]) else {
            return Self::legacy(raw);
        };
        let Some(routing) = parse_digits(&raw[6..8]) else {
            return Self::legacy(raw);
        };
        let Some(kind) = PayloadKind::from_type_field(type_field) else {
            debug!("Prefix candidate has unknown type {:02}, using legacy mode", type_field);
            return Self::legacy(raw);
        };

        let payload = &raw[PREFIX_LEN..];
        if declared_len as usize != payload.len() {
            // Tolerated: the hint is too narrow for real payloads and the
            // upstream sender is known to fill it best-effort.
            warn!(
                declared = declared_len,
                actual = payload.len(),
                "Envelope length hint does not match payload size"
            );
        }

        debug!(
            kind = ?kind,
            routing,
            payload_bytes = payload.len(),
            "Parsed prefixed envelope"
        );

        FrameEnvelope { kind, routing: routing as u8, declared_len: Some(declared_len), payload }
    }

    /// Whether this body arrived without a prefix.
    pub fn is_legacy(&self) -> bool {
        self.declared_len.is_none()
    }

    fn legacy(raw: &'a [u8]) -> FrameEnvelope<'a> {
        FrameEnvelope { kind: PayloadKind::Frame, routing: 0, declared_len: None, payload: raw }
    }
}

/// Parse a run of ASCII decimal digits. Returns `None` on any non-digit.
fn parse_digits(bytes: &[u8]) -> Option<u32> {
    bytes.iter().try_fold(0u32, |acc, &b| {
        b.is_ascii_digit().then(|| acc * 10 + (b - b'0') as u32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_buffers_are_always_legacy() {
        for len in 0..PREFIX_LEN {
            let raw = vec![b'7'; len];
            let envelope = FrameEnvelope::parse(&raw);
            assert!(envelope.is_legacy());
            assert_eq!(envelope.kind, PayloadKind::Frame);
            assert_eq!(envelope.routing, 0);
            assert_eq!(envelope.payload, raw.as_slice());
        }
    }

    #[test]
    fn json_prefix_is_detected_and_stripped() {
        let raw = b"00050007{\"a\":1}";
        let envelope = FrameEnvelope::parse(raw);
        assert_eq!(envelope.kind, PayloadKind::Json);
        assert_eq!(envelope.routing, 7);
        assert_eq!(envelope.declared_len, Some(5));
        assert_eq!(envelope.payload, b"{\"a\":1}");
    }

    #[test]
    fn unknown_type_field_falls_back_to_legacy() {
        let raw = b"00100900payload";
        let envelope = FrameEnvelope::parse(raw);
        assert!(envelope.is_legacy());
        assert_eq!(envelope.payload, raw.as_slice());
    }

    #[test]
    fn non_digit_prefix_falls_back_to_legacy() {
        let raw = b"\x89PNG\r\n\x1a\nrest-of-image";
        let envelope = FrameEnvelope::parse(raw);
        assert!(envelope.is_legacy());
        assert_eq!(envelope.kind, PayloadKind::Frame);
        assert_eq!(envelope.payload, raw.as_slice());
    }

    #[test]
    fn length_mismatch_is_tolerated() {
        // Declared 0010, actual 16 bytes of payload.
        let mut raw = b"00100200".to_vec();
        raw.extend_from_slice(&[0xAA; 16]);
        let envelope = FrameEnvelope::parse(&raw);
        assert_eq!(envelope.kind, PayloadKind::Frame);
        assert_eq!(envelope.routing, 0);
        assert_eq!(envelope.declared_len, Some(10));
        assert_eq!(envelope.payload.len(), 16);
    }

    proptest! {
        /// Any valid prefix extracts exactly the digits it was built from,
        /// no matter how wrong the length hint is.
        #[test]
        fn valid_prefixes_extract_kind_and_routing(
            declared in 0u32..=9999,
            type_field in 0u8..=2,
            routing in 0u8..=99,
            payload in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let mut raw = format!("{declared:04}{type_field:02}{routing:02}").into_bytes();
            raw.extend_from_slice(&payload);

            let envelope = FrameEnvelope::parse(&raw);
            prop_assert_eq!(envelope.kind.type_field(), type_field);
            prop_assert_eq!(envelope.routing, routing);
            prop_assert_eq!(envelope.declared_len, Some(declared));
            prop_assert_eq!(envelope.payload, payload.as_slice());
        }

        /// Parsing never panics on arbitrary input and always yields either a
        /// stripped envelope or the full buffer in legacy mode.
        #[test]
        fn parse_is_total(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
            let envelope = FrameEnvelope::parse(&raw);
            if envelope.is_legacy() {
                prop_assert_eq!(envelope.payload, raw.as_slice());
            } else {
                prop_assert_eq!(envelope.payload.len(), raw.len() - PREFIX_LEN);
            }
        }
    }
}
