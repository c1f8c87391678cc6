//! Panel models and the static registry of supported displays.
//!
//! A [`PanelModel`] describes one supported e-paper display: resolution, the
//! fixed color palette the controller can physically show, and the driver
//! identifier used to select a hardware command profile. The registry is a
//! static catalog; exactly one model is active for the process lifetime,
//! chosen at startup and never changed while serving.

mod model;
pub mod registry;

pub use model::{PaletteEntry, PanelModel, Rgb};
pub use registry::{default_model, lookup, model_keys};
