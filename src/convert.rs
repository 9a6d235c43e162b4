//! The pipeline controller and the library's async entry points.
//!
//! [`run_pipeline`] is the synchronous heart of a conversion: decode, then
//! walk the pages in order, render each one, fold it into the deck, and
//! serialise. It drives the [`Session`] state machine and observes the
//! session's cancel flag at page boundaries. Both execution engines in
//! [`crate::bridge`] call it, and so do the convenience functions below,
//! which run it under `spawn_blocking` so pdfium never stalls the executor.

use crate::config::{ClampPolicy, ConversionConfig, RenderConfig};
use crate::deck::Deck;
use crate::error::Pdf2PptxError;
use crate::output::{
    format_bytes, to_pptx_name, ConversionResult, ConversionStats, DocumentInfo,
};
use crate::pipeline::{input, render};
use crate::pptx::PptxWriter;
use crate::progress::{
    page_percent, ConversionProgressCallback, NoopProgressCallback, ProgressTracker,
    PERCENT_LOADED, PERCENT_SERIALIZED, PERCENT_SERIALIZING,
};
use crate::session::{ConversionState, Session};
use crate::source::pdfium::PdfiumBackend;
use crate::source::PdfBackend;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

/// Everything a single conversion needs. Moved into the executing context.
#[derive(Clone, Default)]
pub struct ConversionRequest {
    pub source_bytes: Vec<u8>,
    /// Original file name; drives the output name.
    pub source_name: Option<String>,
    /// Settings are clamped against `clamp_policy` when the run starts.
    pub render: RenderConfig,
    pub clamp_policy: ClampPolicy,
    pub password: Option<String>,
}

impl fmt::Debug for ConversionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionRequest")
            .field("source_bytes", &format_args!("<{} bytes>", self.source_bytes.len()))
            .field("source_name", &self.source_name)
            .field("render", &self.render)
            .field("clamp_policy", &self.clamp_policy)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ConversionRequest {
    pub fn new(source_bytes: Vec<u8>) -> Self {
        Self {
            source_bytes,
            ..Self::default()
        }
    }

    /// A request carrying the render settings and password of `config`.
    pub fn from_config(
        source_bytes: Vec<u8>,
        source_name: Option<String>,
        config: &ConversionConfig,
    ) -> Self {
        Self {
            source_bytes,
            source_name,
            render: config.render.clamped(&config.clamp_policy),
            clamp_policy: config.clamp_policy,
            password: config.password.clone(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }

    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// How a pipeline run ended when it did not fail.
#[derive(Debug)]
pub enum PipelineOutcome {
    Completed(ConversionResult),
    /// The cancel flag was observed; no output was produced.
    Cancelled,
}

/// Run one conversion to completion, cancellation or failure.
///
/// Progress and log lines go to `progress`. On cancellation the progress is
/// reset to `Aborted`/0 and the session settles in `Cancelled`; on error it
/// settles in `Failed` and the error is returned unchanged.
pub fn run_pipeline(
    backend: &dyn PdfBackend,
    request: &ConversionRequest,
    session: &Session,
    progress: &dyn ConversionProgressCallback,
) -> Result<PipelineOutcome, Pdf2PptxError> {
    let span = info_span!("conversion", session = session.id());
    let _guard = span.enter();

    let mut tracker = ProgressTracker::new();
    match drive(backend, request, session, progress, &mut tracker) {
        Ok(Some(result)) => Ok(PipelineOutcome::Completed(result)),
        Ok(None) => {
            info!("Conversion aborted");
            tracker.reset(progress);
            progress.on_log("Conversion aborted");
            session.settle(ConversionState::Cancelled);
            Ok(PipelineOutcome::Cancelled)
        }
        Err(e) => {
            warn!("Conversion failed: {}", e);
            session.settle(ConversionState::Failed);
            Err(e)
        }
    }
}

/// `Ok(None)` means the run was cancelled.
fn drive(
    backend: &dyn PdfBackend,
    request: &ConversionRequest,
    session: &Session,
    progress: &dyn ConversionProgressCallback,
    tracker: &mut ProgressTracker,
) -> Result<Option<ConversionResult>, Pdf2PptxError> {
    let started = Instant::now();
    let settings = request.render.clamped(&request.clamp_policy);
    if settings != request.render {
        debug!("Render settings clamped: {:?} -> {:?}", request.render, settings);
    }
    let mode = settings.mode.as_str();

    // ── Loading ──────────────────────────────────────────────────────────
    session.transition(ConversionState::Loading)?;
    input::check_magic(&request.source_bytes)?;
    let decoder = backend.decoder()?;
    let document = decoder.open(&request.source_bytes, request.password.as_deref())?;
    let total = document.page_count();
    info!(
        "Opened PDF with {} ({} pages, {} mode)",
        backend.name(),
        total,
        mode
    );
    tracker.advance(progress, "Loading PDF", PERCENT_LOADED);
    progress.on_log(&format!("Starting conversion: {total} pages, {mode} mode"));
    if observed_cancel(session, "after decode") {
        return Ok(None);
    }

    let output_name = to_pptx_name(request.source_name.as_deref());
    let title = output_name.trim_end_matches(".pptx").to_string();
    let mut deck = Deck::new(PptxWriter::new().with_title(title));
    let mut degraded_pages = Vec::new();

    // ── Pages ────────────────────────────────────────────────────────────
    for index in 0..total {
        let number = index + 1;
        if observed_cancel(session, "before page") {
            return Ok(None);
        }
        session.transition(ConversionState::Extracting(number))?;
        tracker.advance(
            progress,
            format!("Rendering page {number} / {total}"),
            page_percent(number, total),
        );
        progress.on_log(&format!("Rendering page {number}"));

        let page = document.page(index)?;
        if index == 0 {
            let natural = page.viewport(1.0);
            deck.set_canvas_from_first_page(natural.width, natural.height);
            progress.on_log(&format!(
                "Slide size {:.0} x {:.0} pt",
                natural.width, natural.height
            ));
        }

        session.transition(ConversionState::Rendering(number))?;
        let rendered = render::render_page(&*page, &settings)?;
        if observed_cancel(session, "after render") {
            return Ok(None);
        }

        session.transition(ConversionState::Accumulating(number))?;
        for degradation in &rendered.degradations {
            progress.on_log(&degradation.to_string());
        }
        degraded_pages.extend(rendered.degradations);
        deck.add_slide(rendered.artifact)?;
        debug!("Page {}/{} added to deck", number, total);
    }

    if observed_cancel(session, "before finalizing") {
        return Ok(None);
    }

    // ── Finalizing ───────────────────────────────────────────────────────
    session.transition(ConversionState::Finalizing)?;
    tracker.advance(progress, "Writing PPTX", PERCENT_SERIALIZING);
    let slides = deck.slide_count();
    let output_bytes = deck.serialize()?;
    let output_size = output_bytes.len();
    progress.on_log(&format!("PPTX size {}", format_bytes(output_size as u64)));
    tracker.advance(progress, "PPTX ready", PERCENT_SERIALIZED);

    let stats = ConversionStats {
        total_pages: total,
        slides,
        degraded_pages,
        output_size,
        duration_ms: started.elapsed().as_millis() as u64,
    };
    session.transition(ConversionState::Done)?;
    info!(
        "Conversion complete: {} slides, {} in {}ms",
        stats.slides,
        format_bytes(output_size as u64),
        stats.duration_ms
    );

    Ok(Some(ConversionResult {
        output_bytes,
        output_name,
        stats,
    }))
}

fn observed_cancel(session: &Session, at: &str) -> bool {
    let cancelled = session.is_cancelled();
    if cancelled {
        debug!("Cancel observed {}", at);
    }
    cancelled
}

// ── Async entry points ───────────────────────────────────────────────────

/// Convert a local PDF file to a `.pptx` deck held in memory.
///
/// The file is validated first (exists, PDF by name, under
/// `config.max_input_bytes`), then converted with [`convert_bytes`].
///
/// # Errors
/// Any fatal [`Pdf2PptxError`]. A fired `config.cancel_token` is reported as
/// [`Pdf2PptxError::Cancelled`].
pub async fn convert(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, Pdf2PptxError> {
    let path = path.as_ref();
    info!("Starting conversion: {}", path.display());
    let bytes = input::read_source(path, config.max_input_bytes).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    convert_bytes(bytes, name.as_deref(), config).await
}

/// Convert PDF bytes already in memory.
///
/// `source_name` only influences the suggested output name.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2pptx::{convert_bytes, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("slides.pdf")?;
/// let result = convert_bytes(bytes, Some("slides.pdf"), &ConversionConfig::default()).await?;
/// assert_eq!(result.output_name, "slides.pptx");
/// # Ok(())
/// # }
/// ```
pub async fn convert_bytes(
    bytes: Vec<u8>,
    source_name: Option<&str>,
    config: &ConversionConfig,
) -> Result<ConversionResult, Pdf2PptxError> {
    let size = bytes.len() as u64;
    if size > config.max_input_bytes {
        return Err(Pdf2PptxError::FileTooLarge {
            name: source_name.unwrap_or_default().to_string(),
            size,
            limit: config.max_input_bytes,
        });
    }

    let request = ConversionRequest::from_config(bytes, source_name.map(str::to_string), config);
    let session = match config.cancel_token {
        Some(ref token) => Session::with_token(token.clone()),
        None => Session::new(),
    };
    let backend = resolve_backend(config);
    let callback = config.progress_callback.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let progress: &dyn ConversionProgressCallback = match callback {
            Some(ref cb) => cb.as_ref(),
            None => &NoopProgressCallback,
        };
        run_pipeline(backend.as_ref(), &request, &session, progress)
    })
    .await
    .map_err(|e| Pdf2PptxError::Internal(format!("conversion task panicked: {e}")))??;

    match outcome {
        PipelineOutcome::Completed(result) => Ok(result),
        PipelineOutcome::Cancelled => Err(Pdf2PptxError::Cancelled),
    }
}

/// Convert a PDF and write the deck to `output_path`.
///
/// Uses atomic write (temp file in the target directory + rename), so a
/// failed or cancelled run never leaves a partial `.pptx` behind.
pub async fn convert_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Pdf2PptxError> {
    let result = convert(path, config).await?;
    let output_path = output_path.as_ref().to_path_buf();

    let target = output_path.clone();
    tokio::task::spawn_blocking(move || write_deck(&target, &result.output_bytes))
        .await
        .map_err(|e| Pdf2PptxError::Internal(format!("write task panicked: {e}")))??;

    info!("Wrote {}", output_path.display());
    Ok(result.stats)
}

/// Write deck bytes to `path` atomically (temp file in the same directory,
/// then rename). Missing parent directories are created.
pub fn write_deck(path: &Path, bytes: &[u8]) -> Result<(), Pdf2PptxError> {
    write_atomically(path, bytes).map_err(|source| Pdf2PptxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally; do not call it from inside
/// an async context.
pub fn convert_sync(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, Pdf2PptxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2PptxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(path, config))
}

/// Page count, first-page size and output name, without rendering anything.
pub async fn inspect(path: impl AsRef<Path>) -> Result<DocumentInfo, Pdf2PptxError> {
    inspect_with(path, &ConversionConfig::default()).await
}

/// [`inspect`] using the backend, password and size limit of `config`.
pub async fn inspect_with(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentInfo, Pdf2PptxError> {
    let path = path.as_ref();
    let bytes = input::read_source(path, config.max_input_bytes).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());
    let backend = resolve_backend(config);
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        describe_document(backend.as_ref(), &bytes, password.as_deref(), name.as_deref())
    })
    .await
    .map_err(|e| Pdf2PptxError::Internal(format!("inspect task panicked: {e}")))?
}

/// Blocking core of [`inspect`].
pub fn describe_document(
    backend: &dyn PdfBackend,
    bytes: &[u8],
    password: Option<&str>,
    source_name: Option<&str>,
) -> Result<DocumentInfo, Pdf2PptxError> {
    input::check_magic(bytes)?;
    let decoder = backend.decoder()?;
    let document = decoder.open(bytes, password)?;
    let page_count = document.page_count();
    let (first_page_width_pts, first_page_height_pts) = if page_count > 0 {
        document.page(0)?.size_pts()
    } else {
        (0.0, 0.0)
    };
    Ok(DocumentInfo {
        page_count,
        first_page_width_pts,
        first_page_height_pts,
        output_name: to_pptx_name(source_name),
    })
}

/// The injected backend, or pdfium located the default way.
pub(crate) fn resolve_backend(config: &ConversionConfig) -> Arc<dyn PdfBackend> {
    match config.backend {
        Some(ref backend) => Arc::clone(backend),
        None => Arc::new(PdfiumBackend::new()),
    }
}
