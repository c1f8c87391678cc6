//! On-device e-paper frame relay.
//!
//! Inkrelay receives pre-rendered image frames over an HTTP transport (owned
//! by the embedding host), decodes and validates them, and forwards the
//! bitmap to a low-refresh-rate multi-color panel, falling back to writing
//! PNG artifacts to disk when no panel is attached.
//!
//! # Features
//!
//! - **Dual-mode wire format**: optional 8-byte `LLLLTTRR` envelope with
//!   type routing, transparent legacy fallback for bare PNG bodies
//! - **Palette quantization**: deterministic nearest-color mapping against
//!   each panel's fixed palette, with a fixed letterbox fit policy
//! - **Hardware or simulation**: one render interface over a probed SPI
//!   driver or a frame directory, chosen once at startup
//! - **Serialized writes**: e-paper cannot absorb concurrent refreshes, so
//!   renders queue on a single adapter lock
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use inkrelay::{DispatchOutcome, Inkrelay};
//!
//! #[tokio::main]
//! async fn main() -> inkrelay::Result<()> {
//!     // Simulation mode: frames land in /tmp as PNG artifacts.
//!     let relay = Inkrelay::simulation(Some("5in79g"))?;
//!     relay.show_startup_screen().await?;
//!
//!     let body: Vec<u8> = std::fs::read("frame.png").expect("frame bytes");
//!     match relay.handle_incoming(&body).await? {
//!         DispatchOutcome::Rendered(report) => println!("rendered: {}", report.detail),
//!         DispatchOutcome::Document { text, .. } => println!("document: {text}"),
//!     }
//!     Ok(())
//! }
//! ```

mod dispatch;
mod error;
mod frame;

pub mod display;
pub mod panel;
pub mod protocol;
pub mod quantize;

// Core exports
pub use dispatch::{DispatchOutcome, Dispatcher, DisplayInfo, StatusSnapshot};
pub use display::{
    DisplayAdapter, DriverProfile, PanelDriver, RenderMode, RenderReport, SpiPanelDriver,
    profile_for,
};
pub use error::{RelayError, Result};
pub use frame::{FrameImage, IndexedFrame};
pub use panel::{PaletteEntry, PanelModel, Rgb};
pub use protocol::{DecodedPayload, FrameEnvelope, PayloadKind};
pub use quantize::SizePolicy;

/// Default simulation artifact directory.
pub const DEFAULT_SIMULATION_DIR: &str = "/tmp";

/// Unified entry point for constructing the relay.
///
/// The factory resolves the configured panel model against the registry
/// (failing startup on an unknown key), builds the display adapter in the
/// requested mode, and returns the [`Dispatcher`] the transport layer talks
/// to. Mode is fixed for the process lifetime.
///
/// # Examples
///
/// ## Simulation (no panel attached)
/// ```rust
/// use inkrelay::Inkrelay;
///
/// # fn main() -> inkrelay::Result<()> {
/// let relay = Inkrelay::simulation(None)?; // default model, frames in /tmp
/// # Ok(())
/// # }
/// ```
///
/// ## Hardware
/// ```rust,ignore
/// use inkrelay::{Inkrelay, SpiPanelDriver, profile_for};
///
/// let profile = profile_for("epd5in79g").expect("known driver");
/// let driver = SpiPanelDriver::new(profile, spi, dc, rst, busy, delay);
/// let relay = Inkrelay::with_driver(Some("5in79g"), Box::new(driver))?;
/// ```
pub struct Inkrelay;

impl Inkrelay {
    /// Simulation mode with the default artifact directory.
    pub fn simulation(model_key: Option<&str>) -> Result<Dispatcher> {
        Self::simulation_in(model_key, DEFAULT_SIMULATION_DIR)
    }

    /// Simulation mode writing artifacts into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::UnsupportedModel`] when `model_key` is not in
    /// the registry; the process must not start in that case.
    pub fn simulation_in(
        model_key: Option<&str>,
        dir: impl Into<std::path::PathBuf>,
    ) -> Result<Dispatcher> {
        let model = resolve_model(model_key)?;
        let adapter = DisplayAdapter::simulation(model, dir);
        Ok(Dispatcher::new(adapter, SizePolicy::default()))
    }

    /// Hardware mode around an unstarted driver. Runs the controller init
    /// sequence; init failure aborts startup.
    pub fn with_driver(
        model_key: Option<&str>,
        driver: Box<dyn PanelDriver>,
    ) -> Result<Dispatcher> {
        let model = resolve_model(model_key)?;
        let adapter = DisplayAdapter::hardware(model, driver)?;
        Ok(Dispatcher::new(adapter, SizePolicy::default()))
    }

    /// Hardware mode with an explicit size policy for mismatched frames.
    pub fn with_driver_and_policy(
        model_key: Option<&str>,
        driver: Box<dyn PanelDriver>,
        policy: SizePolicy,
    ) -> Result<Dispatcher> {
        let model = resolve_model(model_key)?;
        let adapter = DisplayAdapter::hardware(model, driver)?;
        Ok(Dispatcher::new(adapter, policy))
    }

    /// Simulation mode with an explicit size policy.
    pub fn simulation_with_policy(
        model_key: Option<&str>,
        dir: impl Into<std::path::PathBuf>,
        policy: SizePolicy,
    ) -> Result<Dispatcher> {
        let model = resolve_model(model_key)?;
        let adapter = DisplayAdapter::simulation(model, dir);
        Ok(Dispatcher::new(adapter, policy))
    }
}

fn resolve_model(model_key: Option<&str>) -> Result<&'static PanelModel> {
    match model_key {
        Some(key) => panel::registry::lookup(key),
        None => Ok(panel::registry::default_model()),
    }
}
