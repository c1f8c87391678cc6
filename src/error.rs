//! Error types for the frame relay.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context so the transport layer can map them to a response without string
//! matching.
//!
//! ## Error Categories
//!
//! - **Payload Errors**: gzip inflation or raster decode failures, scoped to
//!   one request
//! - **Geometry Errors**: frames whose dimensions the active panel cannot
//!   accept under the configured size policy
//! - **Model Errors**: lookups against the panel registry with an unknown key
//! - **Backend Errors**: hardware write failures and simulation filesystem
//!   failures
//!
//! ## Recovery
//!
//! Every variant except [`RelayError::UnsupportedModel`] is request-scoped
//! and recoverable; the process keeps serving after reporting it. An unknown
//! model key is only fatal when it aborts startup.
//!
//! ```rust
//! use inkrelay::RelayError;
//!
//! let error = RelayError::image_decode("not a PNG stream");
//! assert!(error.is_recoverable());
//! assert_eq!(error.status_code(), 422);
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Main error type for relay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Gzip payload could not be inflated: {details}")]
    Decompression {
        details: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Frame payload could not be decoded: {details}")]
    ImageDecode {
        details: String,
        #[source]
        source: Option<image::ImageError>,
    },

    #[error("Unknown panel model '{key}', valid models: {}", valid.join(", "))]
    UnsupportedModel { key: String, valid: Vec<String> },

    #[error(
        "Frame is {width}x{height} but panel '{model}' accepts exactly {panel_width}x{panel_height}"
    )]
    OversizeImage {
        width: u32,
        height: u32,
        model: String,
        panel_width: u32,
        panel_height: u32,
    },

    #[error("Panel driver '{driver}' write failed: {details}")]
    HardwareWrite { driver: String, details: String },

    #[error("Simulation frame write failed: {path}")]
    SimulationWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Render task failed: {details}")]
    Render { details: String },
}

impl RelayError {
    /// Returns whether the process can keep serving after this error.
    ///
    /// Request-scoped failures are recoverable; an unknown model key is not,
    /// because it can only be produced by startup configuration or an
    /// explicit registry lookup that the caller must correct.
    pub fn is_recoverable(&self) -> bool {
        match self {
            RelayError::Decompression { .. } => true,
            RelayError::ImageDecode { .. } => true,
            RelayError::UnsupportedModel { .. } => false,
            RelayError::OversizeImage { .. } => true,
            RelayError::HardwareWrite { .. } => true,
            RelayError::SimulationWrite { .. } => true,
            RelayError::Render { .. } => true,
        }
    }

    /// HTTP status class the transport layer should surface for this error.
    ///
    /// Client-correctable payload problems map to 4xx, backend faults to 5xx.
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::Decompression { .. } => 400,
            RelayError::ImageDecode { .. } => 422,
            RelayError::UnsupportedModel { .. } => 404,
            RelayError::OversizeImage { .. } => 413,
            RelayError::HardwareWrite { .. } => 500,
            RelayError::SimulationWrite { .. } => 500,
            RelayError::Render { .. } => 500,
        }
    }

    /// Helper constructor for gzip inflation failures.
    pub fn decompression(details: impl Into<String>, source: Option<std::io::Error>) -> Self {
        RelayError::Decompression { details: details.into(), source }
    }

    /// Helper constructor for raster decode failures.
    pub fn image_decode(details: impl Into<String>) -> Self {
        RelayError::ImageDecode { details: details.into(), source: None }
    }

    /// Helper constructor for raster decode failures with the decoder error attached.
    pub fn image_decode_with_source(details: impl Into<String>, source: image::ImageError) -> Self {
        RelayError::ImageDecode { details: details.into(), source: Some(source) }
    }

    /// Helper constructor for unknown model keys; callers pass the registry's valid keys.
    pub fn unsupported_model(
        key: impl Into<String>,
        valid: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        RelayError::UnsupportedModel {
            key: key.into(),
            valid: valid.into_iter().map(Into::into).collect(),
        }
    }

    /// Helper constructor for hardware write failures.
    pub fn hardware_write(driver: impl Into<String>, details: impl Into<String>) -> Self {
        RelayError::HardwareWrite { driver: driver.into(), details: details.into() }
    }

    /// Helper constructor for simulation filesystem failures.
    pub fn simulation_write(path: PathBuf, source: std::io::Error) -> Self {
        RelayError::SimulationWrite { path, source }
    }

    /// Helper constructor for render task failures.
    pub fn render(details: impl Into<String>) -> Self {
        RelayError::Render { details: details.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_contain_their_context(
                details in "[a-zA-Z0-9 ]+",
                key in "[a-z0-9]+",
                width in 1u32..4096,
                height in 1u32..4096,
            ) {
                let decode_err = RelayError::image_decode(details.clone());
                prop_assert!(decode_err.to_string().contains(&details));

                let model_err = RelayError::unsupported_model(key.clone(), ["5in79g"]);
                prop_assert!(model_err.to_string().contains(&key));
                prop_assert!(model_err.to_string().contains("5in79g"));

                let size_err = RelayError::OversizeImage {
                    width,
                    height,
                    model: key.clone(),
                    panel_width: 792,
                    panel_height: 272,
                };
                prop_assert!(size_err.to_string().contains(&width.to_string()));
                prop_assert!(size_err.to_string().contains(&height.to_string()));
            }

            #[test]
            fn recoverability_matches_status_class(details in "[a-zA-Z ]+") {
                // Every recoverable error has a status code; unrecoverable ones
                // only appear at startup and map to 404 for the lookup case.
                let errors = vec![
                    RelayError::decompression(details.clone(), None),
                    RelayError::image_decode(details.clone()),
                    RelayError::unsupported_model(details.clone(), ["a"]),
                    RelayError::hardware_write("epd", details.clone()),
                    RelayError::render(details.clone()),
                ];
                for error in errors {
                    let code = error.status_code();
                    prop_assert!((400..=599).contains(&code));
                    if !error.is_recoverable() {
                        prop_assert_eq!(code, 404);
                    }
                }
            }
        }
    }

    #[test]
    fn error_constructors_validation() {
        let gz_err = RelayError::decompression(
            "truncated stream",
            Some(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof")),
        );
        assert!(matches!(gz_err, RelayError::Decompression { .. }));

        let sim_err = RelayError::simulation_write(
            PathBuf::from("/tmp/epaper_frame_x.png"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(sim_err, RelayError::SimulationWrite { .. }));
        assert!(sim_err.is_recoverable());
    }

    #[test]
    fn error_traits_validation() {
        // Compile-time check: RelayError must be Send + Sync + 'static
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<RelayError>();

        let error = RelayError::image_decode("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn unsupported_model_lists_valid_keys() {
        let error = RelayError::unsupported_model("9in99x", ["5in79g", "7in3sce", "4in01e"]);
        let message = error.to_string();
        assert!(message.contains("9in99x"));
        assert!(message.contains("5in79g"));
        assert!(message.contains("7in3sce"));
        assert!(message.contains("4in01e"));
        assert!(!error.is_recoverable());
    }
}
