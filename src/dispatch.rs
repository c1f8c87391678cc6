//! Request dispatch: the single entry point the transport layer calls.
//!
//! Each request moves through fixed stages: received, parsed, decoded,
//! quantized, rendered. Document payloads stop at the decode stage without
//! touching the display adapter; any stage failure surfaces as a structured
//! error with no retries (the upstream sender retries at the transport
//! level). The parse, decode and quantize stages are pure and run fully in
//! parallel across requests; only the render stage funnels through the
//! shared adapter, on a blocking worker so panel refresh time never stalls
//! the async executor.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::display::{DisplayAdapter, RenderMode, RenderReport};
use crate::frame::{FrameImage, IndexedFrame};
use crate::protocol::{DecodedPayload, FrameEnvelope, PayloadKind, decode};
use crate::quantize::{self, SizePolicy};
use crate::{RelayError, Result};

/// Result of dispatching one request body.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Non-frame payload handled without touching the display.
    Document { kind: PayloadKind, routing: u8, text: String },
    /// Frame payload decoded, quantized and rendered.
    Rendered(RenderReport),
}

/// Read-only snapshot of core state for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub model_key: &'static str,
    pub width: u32,
    pub height: u32,
    pub palette_len: usize,
    pub mode: RenderMode,
    pub frames_received: u64,
    pub frames_rendered: u64,
    pub documents_received: u64,
    pub last_frame_unix: Option<u64>,
    pub uptime_seconds: u64,
}

/// Read-only display description for the info surface.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayInfo {
    pub model_key: &'static str,
    pub width: u32,
    pub height: u32,
    pub colors: Vec<&'static str>,
    pub mode: RenderMode,
}

/// Stateless-per-request orchestrator around the shared display adapter.
#[derive(Debug)]
pub struct Dispatcher {
    display: Arc<DisplayAdapter>,
    policy: SizePolicy,
    started: Instant,
    frames_received: AtomicU64,
    documents_received: AtomicU64,
    last_frame_unix: AtomicU64,
    report_tx: watch::Sender<Option<Arc<RenderReport>>>,
}

impl Dispatcher {
    pub fn new(display: DisplayAdapter, policy: SizePolicy) -> Self {
        let (report_tx, _) = watch::channel(None);
        let model_key = display.model().key;
        let render_mode = display.mode();
        info!(
            model = model_key,
            mode = %render_mode,
            "Dispatcher ready"
        );
        Self {
            display: Arc::new(display),
            policy,
            started: Instant::now(),
            frames_received: AtomicU64::new(0),
            documents_received: AtomicU64::new(0),
            last_frame_unix: AtomicU64::new(0),
            report_tx,
        }
    }

    /// Handle one raw request body end to end.
    ///
    /// This is the entry point the HTTP layer calls with the request bytes.
    /// Returns the explicit document outcome for non-frame payloads, the
    /// render report for frames, or a recoverable error; it never panics on
    /// malformed input.
    pub async fn handle_incoming(&self, raw: &[u8]) -> Result<DispatchOutcome> {
        let envelope = FrameEnvelope::parse(raw);
        debug!(
            kind = ?envelope.kind,
            routing = envelope.routing,
            legacy = envelope.is_legacy(),
            bytes = envelope.payload.len(),
            "Request parsed"
        );

        match decode(&envelope)? {
            DecodedPayload::Document { kind, routing, text } => {
                self.documents_received.fetch_add(1, Ordering::Relaxed);
                debug!(?kind, routing, bytes = text.len(), "Document handled, display untouched");
                Ok(DispatchOutcome::Document { kind, routing, text })
            }
            DecodedPayload::Frame(image) => {
                self.frames_received.fetch_add(1, Ordering::Relaxed);
                let indexed = quantize::prepare(image, self.display.model(), self.policy)?;
                let report = self.render(indexed).await?;
                Ok(DispatchOutcome::Rendered(report))
            }
        }
    }

    /// Render an all-white frame, mirroring what the panel shows after a
    /// hardware clear. Called by hosts at startup.
    pub async fn show_startup_screen(&self) -> Result<RenderReport> {
        let model = self.display.model();
        let blank = FrameImage::filled(model.width, model.height, model.background_color());
        let indexed = quantize::quantize(&blank, model.palette);
        let report = self.render(indexed).await?;
        info!(frame_index = report.frame_index, "Startup screen displayed");
        Ok(report)
    }

    /// Clear the panel to its background color.
    pub async fn clear(&self) -> Result<()> {
        let display = Arc::clone(&self.display);
        tokio::task::spawn_blocking(move || display.clear())
            .await
            .map_err(|e| RelayError::render(format!("clear task aborted: {e}")))?
    }

    /// Put hardware to sleep for shutdown. Failures are logged and returned
    /// but leave the process in a serviceable state.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down display");
        let display = Arc::clone(&self.display);
        let result = tokio::task::spawn_blocking(move || display.sleep())
            .await
            .map_err(|e| RelayError::render(format!("shutdown task aborted: {e}")))?;
        if let Err(error) = &result {
            warn!(%error, "Display shutdown reported an error");
        }
        result
    }

    /// Snapshot of counters and configuration for the status endpoint.
    pub fn status(&self) -> StatusSnapshot {
        let model = self.display.model();
        let last = self.last_frame_unix.load(Ordering::Relaxed);
        StatusSnapshot {
            model_key: model.key,
            width: model.width,
            height: model.height,
            palette_len: model.palette.len(),
            mode: self.display.mode(),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_rendered: self.display.frames_rendered(),
            documents_received: self.documents_received.load(Ordering::Relaxed),
            last_frame_unix: (last != 0).then_some(last),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }

    /// Static description of the active display for the info endpoint.
    pub fn display_info(&self) -> DisplayInfo {
        let model = self.display.model();
        DisplayInfo {
            model_key: model.key,
            width: model.width,
            height: model.height,
            colors: model.color_names(),
            mode: self.display.mode(),
        }
    }

    /// Stream of render reports, one per completed render. The transport
    /// layer can push these to observers instead of polling `status`.
    pub fn render_updates(&self) -> impl Stream<Item = Arc<RenderReport>> + 'static {
        WatchStream::new(self.report_tx.subscribe()).filter_map(|opt| async move { opt })
    }

    async fn render(&self, frame: IndexedFrame) -> Result<RenderReport> {
        let display = Arc::clone(&self.display);
        let report = tokio::task::spawn_blocking(move || display.render(&frame))
            .await
            .map_err(|e| RelayError::render(format!("render task aborted: {e}")))??;

        self.last_frame_unix.store(unix_now(), Ordering::Relaxed);
        let _ = self.report_tx.send(Some(Arc::new(report.clone())));
        Ok(report)
    }
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}
