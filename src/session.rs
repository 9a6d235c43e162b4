//! Per-conversion state: the pipeline state machine and its cancel flag.
//!
//! Every conversion owns exactly one [`Session`]. Nothing about a run lives in
//! globals, so a cancelled or terminated run cannot leak state into the next.

use crate::error::Pdf2PptxError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Cooperative cancellation flag shared between controller and executor.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Pipeline controller states.
///
/// `Extracting`, `Rendering` and `Accumulating` carry the 1-indexed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "page", rename_all = "snake_case")]
pub enum ConversionState {
    Idle,
    Loading,
    Extracting(usize),
    Rendering(usize),
    Accumulating(usize),
    Finalizing,
    Done,
    Cancelled,
    Failed,
}

impl ConversionState {
    /// `Done`, `Cancelled` and `Failed` accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConversionState::Done | ConversionState::Cancelled | ConversionState::Failed
        )
    }

    fn allows(&self, next: &ConversionState) -> bool {
        use ConversionState::*;
        if self.is_terminal() {
            return false;
        }
        match (*self, *next) {
            (_, Cancelled) | (_, Failed) => true,
            (Idle, Loading) => true,
            (Loading, Extracting(1)) | (Loading, Finalizing) => true,
            (Extracting(p), Rendering(q)) | (Rendering(p), Accumulating(q)) => p == q,
            (Accumulating(p), Extracting(q)) => q == p + 1,
            (Accumulating(_), Finalizing) => true,
            (Finalizing, Done) => true,
            _ => false,
        }
    }
}

/// One conversion's state machine plus its cancel token.
#[derive(Debug)]
pub struct Session {
    id: u64,
    cancel: CancelToken,
    state: Mutex<ConversionState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_token(CancelToken::new())
    }

    /// A session observing a caller-owned cancel token.
    pub fn with_token(cancel: CancelToken) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            cancel,
            state: Mutex::new(ConversionState::Idle),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> ConversionState {
        *self.lock()
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&self, next: ConversionState) -> Result<(), Pdf2PptxError> {
        let mut state = self.lock();
        if !state.allows(&next) {
            return Err(Pdf2PptxError::Internal(format!(
                "invalid state transition {:?} -> {:?}",
                *state, next
            )));
        }
        trace!(session = self.id, from = ?*state, to = ?next, "state transition");
        *state = next;
        Ok(())
    }

    /// Move to a terminal state unless one was already reached.
    pub(crate) fn settle(&self, terminal: ConversionState) {
        let mut state = self.lock();
        if !state.is_terminal() {
            *state = terminal;
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConversionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
