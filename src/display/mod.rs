//! Display adapter: one render interface over hardware and simulation.
//!
//! The adapter owns the only mutable resource in the relay. E-paper
//! controllers cannot absorb concurrent writes and interleaved simulation
//! files would be corrupt, so every render, clear and sleep call funnels
//! through a single mutex held for the full operation. Concurrent callers
//! queue; nothing is rejected and nothing is cancelled mid-refresh.
//!
//! The backing store is fixed at construction: either a probed hardware
//! driver or a simulation directory that collects PNG artifacts named
//! `epaper_frame_{model}_{seq}.png`. There is no hot-swap between modes.

pub mod driver;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::frame::IndexedFrame;
use crate::panel::PanelModel;
use crate::{RelayError, Result};

pub use driver::{DriverProfile, PanelDriver, SpiPanelDriver, pack_pixels, profile_for};

/// Which backing store is active for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    Hardware,
    Simulation,
}

impl std::fmt::Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderMode::Hardware => f.write_str("hardware"),
            RenderMode::Simulation => f.write_str("simulation"),
        }
    }
}

/// Outcome of one successful render call.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub mode: RenderMode,
    /// Process-monotonic render counter, also the simulation file sequence.
    pub frame_index: u64,
    pub detail: String,
    /// Simulation artifact location; `None` in hardware mode.
    pub artifact: Option<PathBuf>,
}

enum RenderBackend {
    Hardware(Box<dyn PanelDriver>),
    Simulation { dir: PathBuf },
}

/// Serialized access to the panel or its simulation stand-in.
pub struct DisplayAdapter {
    model: &'static PanelModel,
    mode: RenderMode,
    backend: Mutex<RenderBackend>,
    /// Render attempts; also the simulation artifact sequence.
    sequence: AtomicU64,
    /// Completed renders, for the status surface.
    rendered: AtomicU64,
}

impl std::fmt::Debug for DisplayAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayAdapter")
            .field("model", &self.model.key)
            .field("mode", &self.mode)
            .field("sequence", &self.sequence)
            .field("rendered", &self.rendered)
            .finish_non_exhaustive()
    }
}

impl DisplayAdapter {
    /// Wrap an initialized hardware driver. Runs the controller init
    /// sequence; an init failure here is a startup failure.
    pub fn hardware(model: &'static PanelModel, mut driver: Box<dyn PanelDriver>) -> Result<Self> {
        driver.init()?;
        info!(model = model.key, driver = driver.driver_id(), "Panel hardware initialized");
        Ok(Self {
            model,
            mode: RenderMode::Hardware,
            backend: Mutex::new(RenderBackend::Hardware(driver)),
            sequence: AtomicU64::new(0),
            rendered: AtomicU64::new(0),
        })
    }

    /// Write frames to `dir` instead of hardware.
    pub fn simulation(model: &'static PanelModel, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        info!(model = model.key, dir = %dir.display(), "Display running in simulation mode");
        Self {
            model,
            mode: RenderMode::Simulation,
            backend: Mutex::new(RenderBackend::Simulation { dir }),
            sequence: AtomicU64::new(0),
            rendered: AtomicU64::new(0),
        }
    }

    pub fn model(&self) -> &'static PanelModel {
        self.model
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Frames successfully rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }

    /// Render one quantized frame. Blocks while any other backend operation
    /// is in flight; the lock is held for the whole write/refresh cycle.
    pub fn render(&self, frame: &IndexedFrame) -> Result<RenderReport> {
        let mut backend = self.lock_backend();
        let frame_index = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        let report = match &mut *backend {
            RenderBackend::Hardware(driver) => {
                driver.display_frame(frame)?;
                debug!(frame_index, driver = driver.driver_id(), "Frame refreshed on panel");
                RenderReport {
                    mode: RenderMode::Hardware,
                    frame_index,
                    detail: format!("refreshed on {}", driver.driver_id()),
                    artifact: None,
                }
            }
            RenderBackend::Simulation { dir } => {
                let path =
                    dir.join(format!("epaper_frame_{}_{:06}.png", self.model.key, frame_index));
                let rgb = frame.to_rgb(self.model.palette).to_rgb_image();
                rgb.save(&path)
                    .map_err(|e| simulation_save_error(path.clone(), e))?;
                debug!(frame_index, path = %path.display(), "Frame written to simulation path");
                RenderReport {
                    mode: RenderMode::Simulation,
                    frame_index,
                    detail: format!("saved {}", path.display()),
                    artifact: Some(path),
                }
            }
        };

        self.rendered.fetch_add(1, Ordering::Relaxed);
        Ok(report)
    }

    /// Clear the panel to its background color. Simulation mode records the
    /// request without producing an artifact.
    pub fn clear(&self) -> Result<()> {
        let mut backend = self.lock_backend();
        match &mut *backend {
            RenderBackend::Hardware(driver) => driver.clear(),
            RenderBackend::Simulation { .. } => {
                debug!(model = self.model.key, "Simulation: clear requested");
                Ok(())
            }
        }
    }

    /// Put hardware to sleep for shutdown. Safe to call repeatedly; failures
    /// are reported but leave the driver in its last-known state.
    pub fn sleep(&self) -> Result<()> {
        let mut backend = self.lock_backend();
        match &mut *backend {
            RenderBackend::Hardware(driver) => driver.sleep(),
            RenderBackend::Simulation { .. } => Ok(()),
        }
    }

    fn lock_backend(&self) -> MutexGuard<'_, RenderBackend> {
        // A panicked render must not wedge the adapter; the backend state is
        // valid after any completed or failed driver call.
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn simulation_save_error(path: PathBuf, error: image::ImageError) -> RelayError {
    warn!(path = %path.display(), %error, "Simulation frame write failed");
    match error {
        image::ImageError::IoError(io) => RelayError::simulation_write(path, io),
        other => RelayError::simulation_write(
            path,
            std::io::Error::other(other.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::registry;
    use crate::quantize;
    use crate::{FrameImage, panel::Rgb};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quantized_frame(model: &'static PanelModel, color: Rgb) -> IndexedFrame {
        let image = FrameImage::filled(model.width, model.height, color);
        quantize::quantize(&image, model.palette)
    }

    struct RecordingDriver {
        frames: Arc<AtomicU32>,
        fail_next: bool,
    }

    impl PanelDriver for RecordingDriver {
        fn driver_id(&self) -> &'static str {
            "recording"
        }
        fn init(&mut self) -> crate::Result<()> {
            Ok(())
        }
        fn display_frame(&mut self, _frame: &IndexedFrame) -> crate::Result<()> {
            if self.fail_next {
                return Err(RelayError::hardware_write("recording", "injected fault"));
            }
            self.frames.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn clear(&mut self) -> crate::Result<()> {
            Ok(())
        }
        fn sleep(&mut self) -> crate::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn simulation_render_writes_named_artifact() {
        let model = registry::default_model();
        let dir = tempfile::tempdir().expect("tempdir");
        let adapter = DisplayAdapter::simulation(model, dir.path());

        let report = adapter
            .render(&quantized_frame(model, Rgb::RED))
            .expect("simulation render succeeds");

        assert_eq!(report.mode, RenderMode::Simulation);
        assert_eq!(report.frame_index, 1);
        let path = report.artifact.expect("simulation produces an artifact");
        assert!(path.file_name().is_some_and(|name| {
            name.to_string_lossy().starts_with("epaper_frame_5in79g_")
        }));

        let written = image::open(&path).expect("artifact decodes").to_rgb8();
        assert_eq!(written.dimensions(), (model.width, model.height));
        assert_eq!(written.get_pixel(0, 0).0, [255, 0, 0]);
    }

    #[test]
    fn simulation_write_failure_is_reported_not_swallowed() {
        let model = registry::default_model();
        let adapter =
            DisplayAdapter::simulation(model, "/nonexistent-inkrelay-dir/frames");

        let error = adapter
            .render(&quantized_frame(model, Rgb::BLACK))
            .expect_err("missing directory must fail");
        assert!(matches!(error, RelayError::SimulationWrite { .. }));
        assert!(error.is_recoverable());
    }

    #[test]
    fn hardware_failure_leaves_adapter_serving() {
        let model = registry::default_model();
        let frames = Arc::new(AtomicU32::new(0));
        let adapter = DisplayAdapter::hardware(
            model,
            Box::new(RecordingDriver { frames: Arc::clone(&frames), fail_next: true }),
        )
        .expect("init succeeds");

        let error = adapter
            .render(&quantized_frame(model, Rgb::WHITE))
            .expect_err("injected fault surfaces");
        assert!(matches!(error, RelayError::HardwareWrite { .. }));

        // Adapter still usable after the failure.
        adapter.clear().expect("clear still works");
        adapter.sleep().expect("sleep still works");
    }

    #[test]
    fn hardware_render_counts_frames() {
        let model = registry::default_model();
        let frames = Arc::new(AtomicU32::new(0));
        let adapter = DisplayAdapter::hardware(
            model,
            Box::new(RecordingDriver { frames: Arc::clone(&frames), fail_next: false }),
        )
        .expect("init succeeds");

        for _ in 0..3 {
            adapter.render(&quantized_frame(model, Rgb::YELLOW)).expect("render succeeds");
        }
        assert_eq!(frames.load(Ordering::SeqCst), 3);
        assert_eq!(adapter.frames_rendered(), 3);
    }

    #[test]
    fn concurrent_renders_are_serialized() {
        let model = registry::default_model();
        let dir = tempfile::tempdir().expect("tempdir");
        let adapter = Arc::new(DisplayAdapter::simulation(model, dir.path()));

        const WRITERS: usize = 8;
        let handles: Vec<_> = (0..WRITERS)
            .map(|_| {
                let adapter = Arc::clone(&adapter);
                std::thread::spawn(move || {
                    adapter
                        .render(&quantized_frame(model, Rgb::BLACK))
                        .expect("render succeeds")
                })
            })
            .collect();

        let mut indices: Vec<u64> =
            handles.into_iter().map(|h| h.join().expect("no panics").frame_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, (1..=WRITERS as u64).collect::<Vec<_>>());

        // Exactly one uncorrupted artifact per render.
        let mut artifacts: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").path())
            .collect();
        artifacts.sort();
        assert_eq!(artifacts.len(), WRITERS);
        for path in artifacts {
            let decoded = image::open(&path).expect("every artifact decodes").to_rgb8();
            assert_eq!(decoded.dimensions(), (model.width, model.height));
        }
    }
}
