//! Execution bridge: runs the pipeline in a background or inline context and
//! streams [`EngineMessage`]s back to the controlling context.
//!
//! Two [`Engine`]s share one contract:
//!
//! * [`WorkerEngine`] runs each conversion on a dedicated OS thread. Messages
//!   arrive asynchronously through the sink.
//! * [`InlineEngine`] runs on the caller's thread; `start` returns once the
//!   run has ended. Every message delivery is a point where the caller may
//!   set the cancel flag.
//!
//! Whatever the engine, one run delivers zero or more `progress`/`log`
//! messages followed by exactly one terminal message. A [`Bridge`] picks the
//! engine from the backend's [`Capabilities`] once per conversion, and tears
//! down the previous run before starting the next.
//!
//! ```rust,no_run
//! use edgequake_pdf2pptx::bridge::Bridge;
//! use edgequake_pdf2pptx::convert::ConversionRequest;
//! use edgequake_pdf2pptx::protocol::EngineMessage;
//! use edgequake_pdf2pptx::source::pdfium::PdfiumBackend;
//! use std::sync::{mpsc, Arc};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bridge = Bridge::new(Arc::new(PdfiumBackend::new()));
//! let (tx, rx) = mpsc::channel::<EngineMessage>();
//! let bytes = std::fs::read("slides.pdf")?;
//! bridge.start(ConversionRequest::new(bytes).with_name("slides.pdf"), Arc::new(tx))?;
//! for message in rx {
//!     let done = message.is_terminal();
//!     println!("{}", serde_json::to_string(&message)?);
//!     if done {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::{ClampPolicy, ConversionConfig, EnginePreference};
use crate::convert::{run_pipeline, ConversionRequest, PipelineOutcome};
use crate::error::Pdf2PptxError;
use crate::progress::{ConversionProgressCallback, ProgressCallback, ProgressEvent, PERCENT_DONE};
use crate::protocol::{ClientMessage, EngineMessage, MessageSink, SinkProgress};
use crate::session::{ConversionState, Session};
use crate::source::{Capabilities, PdfBackend};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Thread name of worker-engine threads.
pub const WORKER_THREAD_NAME: &str = "pdf2pptx-worker";

/// Which execution context runs a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Worker,
    Inline,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Worker => "worker",
            EngineKind::Inline => "inline",
        }
    }
}

/// One execution context for the pipeline.
pub trait Engine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Run `request` under `session`, delivering messages to `sink`.
    ///
    /// A run still active on this engine is terminated first.
    fn start(
        &self,
        request: ConversionRequest,
        session: Arc<Session>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), Pdf2PptxError>;

    /// Ask the active run to stop at its next page boundary.
    ///
    /// Returns `false` when no run is active.
    fn cancel(&self) -> bool;

    /// Cancel the active run and stop delivering its messages.
    ///
    /// Returns `true` when the run had not yet delivered its terminal
    /// message; the caller then owns the job of telling the controller.
    fn terminate(&self) -> bool;
}

// ── Gated sink ───────────────────────────────────────────────────────────

const GATE_OPEN: u8 = 0;
const GATE_FINISHED: u8 = 1;
const GATE_CLOSED: u8 = 2;

thread_local! {
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Forwards messages until the terminal one, or until closed.
struct GatedSink {
    inner: Arc<dyn MessageSink>,
    state: AtomicU8,
    delivery: Mutex<()>,
}

impl GatedSink {
    fn new(inner: Arc<dyn MessageSink>) -> Self {
        Self {
            inner,
            state: AtomicU8::new(GATE_OPEN),
            delivery: Mutex::new(()),
        }
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stop forwarding. Returns whether the terminal message was still pending.
    fn close(&self) -> bool {
        // Sinks may tear the run down from inside their own delivery; the
        // delivery lock is already held on this thread in that case.
        let _guard = if DELIVERING.with(Cell::get) {
            None
        } else {
            Some(self.lock_delivery())
        };
        self.state
            .compare_exchange(GATE_OPEN, GATE_CLOSED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        self.state.load(Ordering::SeqCst) == GATE_OPEN
    }
}

impl MessageSink for GatedSink {
    fn deliver(&self, message: EngineMessage) {
        let _guard = self.lock_delivery();
        let next = if message.is_terminal() {
            GATE_FINISHED
        } else {
            GATE_OPEN
        };
        if self
            .state
            .compare_exchange(GATE_OPEN, next, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            trace!("dropping message from a finished or terminated run");
            return;
        }
        let previous = DELIVERING.with(|d| d.replace(true));
        self.inner.deliver(message);
        DELIVERING.with(|d| d.set(previous));
    }
}

// ── Shared run logic ─────────────────────────────────────────────────────

/// Run the pipeline and translate its outcome into exactly one terminal message.
fn execute(
    backend: &dyn PdfBackend,
    request: &ConversionRequest,
    session: &Session,
    sink: &dyn MessageSink,
    mirror: Option<&dyn ConversionProgressCallback>,
) {
    let progress = SinkProgress { sink, mirror };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        run_pipeline(backend, request, session, &progress)
    }));

    match outcome {
        Ok(Ok(PipelineOutcome::Completed(result))) => {
            let done = ProgressEvent::new("Done", PERCENT_DONE);
            if let Some(cb) = mirror {
                cb.on_progress(&done);
            }
            sink.deliver(EngineMessage::Progress(done));
            sink.deliver(EngineMessage::Result(result));
        }
        Ok(Ok(PipelineOutcome::Cancelled)) => sink.deliver(EngineMessage::Cancelled),
        Ok(Err(e)) => sink.deliver(EngineMessage::from_error(&e)),
        Err(_) => {
            session.settle(ConversionState::Failed);
            let e = Pdf2PptxError::Internal("conversion panicked".to_string());
            sink.deliver(EngineMessage::from_error(&e));
        }
    }
}

struct ActiveRun {
    session: Arc<Session>,
    gate: Arc<GatedSink>,
    // Dropping the handle detaches the thread.
    _thread: Option<JoinHandle<()>>,
}

/// Shared bookkeeping of both engines.
#[derive(Default)]
struct RunSlot(Mutex<Option<ActiveRun>>);

impl RunSlot {
    fn lock(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cancel(&self) -> bool {
        match self.lock().as_ref() {
            Some(run) if !run.session.state().is_terminal() => {
                run.session.cancel();
                true
            }
            _ => false,
        }
    }

    fn terminate(&self) -> bool {
        let Some(run) = self.lock().take() else {
            return false;
        };
        run.session.cancel();
        let pending = run.gate.close();
        debug!(session = run.session.id(), pending, "run terminated");
        pending
    }
}

// ── Worker engine ────────────────────────────────────────────────────────

/// Runs each conversion on its own background thread.
pub struct WorkerEngine {
    backend: Arc<dyn PdfBackend>,
    mirror: Option<ProgressCallback>,
    run: RunSlot,
}

impl WorkerEngine {
    pub fn new(backend: Arc<dyn PdfBackend>) -> Self {
        Self {
            backend,
            mirror: None,
            run: RunSlot::default(),
        }
    }

    /// Also report progress to `cb`, from the worker thread.
    pub fn with_progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.mirror = Some(cb);
        self
    }
}

impl Engine for WorkerEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Worker
    }

    fn start(
        &self,
        request: ConversionRequest,
        session: Arc<Session>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), Pdf2PptxError> {
        self.terminate();

        let gate = Arc::new(GatedSink::new(sink));
        let backend = Arc::clone(&self.backend);
        let mirror = self.mirror.clone();
        let thread_session = Arc::clone(&session);
        let thread_gate = Arc::clone(&gate);

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                execute(
                    backend.as_ref(),
                    &request,
                    &thread_session,
                    thread_gate.as_ref(),
                    mirror.as_deref(),
                );
            })
            .map_err(|e| Pdf2PptxError::Internal(format!("failed to spawn worker thread: {e}")))?;

        debug!(session = session.id(), "worker started");
        *self.run.lock() = Some(ActiveRun {
            session,
            gate,
            _thread: Some(handle),
        });
        Ok(())
    }

    fn cancel(&self) -> bool {
        self.run.cancel()
    }

    fn terminate(&self) -> bool {
        self.run.terminate()
    }
}

// ── Inline engine ────────────────────────────────────────────────────────

/// Runs each conversion on the calling thread.
pub struct InlineEngine {
    backend: Arc<dyn PdfBackend>,
    mirror: Option<ProgressCallback>,
    run: RunSlot,
}

impl InlineEngine {
    pub fn new(backend: Arc<dyn PdfBackend>) -> Self {
        Self {
            backend,
            mirror: None,
            run: RunSlot::default(),
        }
    }

    pub fn with_progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.mirror = Some(cb);
        self
    }
}

impl Engine for InlineEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Inline
    }

    /// Blocks until the run has delivered its terminal message.
    fn start(
        &self,
        request: ConversionRequest,
        session: Arc<Session>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), Pdf2PptxError> {
        self.terminate();

        let gate = Arc::new(GatedSink::new(sink));
        *self.run.lock() = Some(ActiveRun {
            session: Arc::clone(&session),
            gate: Arc::clone(&gate),
            _thread: None,
        });

        debug!(session = session.id(), "inline run started");
        execute(
            self.backend.as_ref(),
            &request,
            &session,
            gate.as_ref(),
            self.mirror.as_deref(),
        );
        Ok(())
    }

    fn cancel(&self) -> bool {
        self.run.cancel()
    }

    fn terminate(&self) -> bool {
        self.run.terminate()
    }
}

// ── Bridge ───────────────────────────────────────────────────────────────

struct Current {
    engine: Arc<dyn Engine>,
    session: Arc<Session>,
    sink: Arc<dyn MessageSink>,
}

/// Controller-side handle: selects an engine, starts and cancels runs.
///
/// One conversion at a time; starting a new one silently tears down the
/// previous run.
pub struct Bridge {
    backend: Arc<dyn PdfBackend>,
    preference: EnginePreference,
    clamp_policy: ClampPolicy,
    mirror: Option<ProgressCallback>,
    current: Mutex<Option<Current>>,
}

impl Bridge {
    pub fn new(backend: Arc<dyn PdfBackend>) -> Self {
        Self {
            backend,
            preference: EnginePreference::Auto,
            clamp_policy: ClampPolicy::default(),
            mirror: None,
            current: Mutex::new(None),
        }
    }

    /// A bridge using the backend, engine preference, clamp policy and
    /// progress callback of `config`.
    pub fn from_config(config: &ConversionConfig) -> Self {
        let mut bridge = Self::new(crate::convert::resolve_backend(config))
            .with_preference(config.engine)
            .with_clamp_policy(config.clamp_policy);
        bridge.mirror = config.progress_callback.clone();
        bridge
    }

    pub fn with_preference(mut self, preference: EnginePreference) -> Self {
        self.preference = preference;
        self
    }

    /// Policy applied to raw `start` payloads in [`Bridge::handle`].
    pub fn with_clamp_policy(mut self, policy: ClampPolicy) -> Self {
        self.clamp_policy = policy;
        self
    }

    pub fn with_progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.mirror = Some(cb);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Option<Current>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Which engine the next conversion would run on.
    pub fn select_engine(&self) -> Result<EngineKind, Pdf2PptxError> {
        choose_engine(self.backend.capabilities(), self.preference).ok_or_else(|| {
            Pdf2PptxError::ImagingUnavailable(format!(
                "the {} backend can render neither in the background nor inline",
                self.backend.name()
            ))
        })
    }

    fn build_engine(&self, kind: EngineKind) -> Arc<dyn Engine> {
        let backend = Arc::clone(&self.backend);
        match (kind, self.mirror.clone()) {
            (EngineKind::Worker, Some(cb)) => {
                Arc::new(WorkerEngine::new(backend).with_progress_callback(cb))
            }
            (EngineKind::Worker, None) => Arc::new(WorkerEngine::new(backend)),
            (EngineKind::Inline, Some(cb)) => {
                Arc::new(InlineEngine::new(backend).with_progress_callback(cb))
            }
            (EngineKind::Inline, None) => Arc::new(InlineEngine::new(backend)),
        }
    }

    /// Start a conversion in a fresh session and return that session.
    ///
    /// With the inline engine this returns only after the run has ended.
    /// When no engine is available the error is delivered to `sink` as an
    /// `error` message and also returned.
    pub fn start(
        &self,
        request: ConversionRequest,
        sink: Arc<dyn MessageSink>,
    ) -> Result<Arc<Session>, Pdf2PptxError> {
        let session = Arc::new(Session::new());
        self.start_session(request, Arc::clone(&session), sink)?;
        Ok(session)
    }

    /// [`Bridge::start`] with a caller-supplied session.
    pub fn start_session(
        &self,
        mut request: ConversionRequest,
        session: Arc<Session>,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), Pdf2PptxError> {
        self.shutdown();
        request.clamp_policy = self.clamp_policy;
        request.render = request.render.clamped(&self.clamp_policy);

        let kind = match self.select_engine() {
            Ok(kind) => kind,
            Err(e) => {
                warn!("{}", e);
                sink.deliver(EngineMessage::from_error(&e));
                return Err(e);
            }
        };
        info!(
            session = session.id(),
            "Starting conversion on the {} engine",
            kind.as_str()
        );

        let engine = self.build_engine(kind);
        *self.lock() = Some(Current {
            engine: Arc::clone(&engine),
            session: Arc::clone(&session),
            sink: Arc::clone(&sink),
        });
        engine.start(request, session, sink)
    }

    /// Dispatch a client message. `start` payloads are normalised with the
    /// bridge's clamp policy first.
    pub fn handle(
        &self,
        message: ClientMessage,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), Pdf2PptxError> {
        match message {
            ClientMessage::Start(payload) => {
                let request = payload.into_request(&self.clamp_policy);
                self.start(request, sink).map(|_| ())
            }
            ClientMessage::Cancel => {
                self.cancel();
                Ok(())
            }
        }
    }

    /// Cancel the active conversion. Returns `false` when none is active.
    ///
    /// An inline run stops at its next page boundary and reports the abort
    /// itself. A worker run is terminated right away; if it had not finished,
    /// the bridge reports `Aborted`/0, a log line and `cancelled` on its behalf.
    pub fn cancel(&self) -> bool {
        let Some((engine, session, sink)) = self
            .lock()
            .as_ref()
            .map(|c| (Arc::clone(&c.engine), Arc::clone(&c.session), Arc::clone(&c.sink)))
        else {
            return false;
        };

        match engine.kind() {
            EngineKind::Inline => engine.cancel(),
            EngineKind::Worker => {
                if !engine.terminate() {
                    return false;
                }
                info!(session = session.id(), "Conversion aborted");
                let aborted = ProgressEvent::aborted();
                if let Some(ref cb) = self.mirror {
                    cb.on_progress(&aborted);
                }
                sink.deliver(EngineMessage::Progress(aborted));
                sink.deliver(EngineMessage::log("Conversion aborted"));
                sink.deliver(EngineMessage::Cancelled);
                true
            }
        }
    }

    /// Tear down the active conversion without reporting anything.
    pub fn shutdown(&self) {
        if let Some(current) = self.lock().take() {
            if current.engine.terminate() {
                debug!(session = current.session.id(), "previous run torn down");
            }
        }
    }

    /// Kind of the engine running (or last running) a conversion.
    pub fn active_engine(&self) -> Option<EngineKind> {
        self.lock().as_ref().map(|c| c.engine.kind())
    }

    /// Whether a run is active and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|c| !c.session.is_cancelled() && !c.session.state().is_terminal())
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Background when available (unless inline is preferred), otherwise inline.
fn choose_engine(caps: Capabilities, preference: EnginePreference) -> Option<EngineKind> {
    match preference {
        EnginePreference::Auto if caps.background => Some(EngineKind::Worker),
        EnginePreference::Auto if caps.inline => Some(EngineKind::Inline),
        EnginePreference::Inline if caps.inline => Some(EngineKind::Inline),
        EnginePreference::Inline if caps.background => Some(EngineKind::Worker),
        _ => None,
    }
}
