//! Progress events and the callback trait that receives them.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! checkpoint events as the pipeline walks the document.
//!
//! A run emits percentages at fixed checkpoints:
//!
//! | Point                | Percent                        |
//! |----------------------|--------------------------------|
//! | PDF decoded          | 5                              |
//! | entering page `i/N`  | `10 + round(i / N * 70)`       |
//! | serialising the deck | 90                             |
//! | deck serialised      | 95                             |
//! | result delivered     | 100 (emitted by the bridge)    |
//!
//! Within a run the percentage never decreases, except for the reset to 0 when
//! the run is aborted or fails.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2pptx::{ConversionConfig, ConversionProgressCallback, ProgressEvent};
//! use std::sync::{Arc, atomic::{AtomicU8, Ordering}};
//!
//! struct LastPercent(AtomicU8);
//!
//! impl ConversionProgressCallback for LastPercent {
//!     fn on_progress(&self, event: &ProgressEvent) {
//!         self.0.store(event.percent, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(LastPercent(AtomicU8::new(0))))
//!     .build();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Percent reported once the PDF is decoded.
pub const PERCENT_LOADED: u8 = 5;
/// Percent reported when serialisation starts.
pub const PERCENT_SERIALIZING: u8 = 90;
/// Percent reported when the container bytes exist.
pub const PERCENT_SERIALIZED: u8 = 95;
/// Percent reported when the result is handed to the caller.
pub const PERCENT_DONE: u8 = 100;

/// A single progress checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub label: String,
    /// 0–100.
    pub percent: u8,
}

impl ProgressEvent {
    pub fn new(label: impl Into<String>, percent: u8) -> Self {
        Self {
            label: label.into(),
            percent: percent.min(100),
        }
    }

    /// The reset event emitted when a run is aborted.
    pub fn aborted() -> Self {
        Self::new("Aborted", 0)
    }
}

/// Percent reported on entry to 1-indexed page `page` of `total`.
pub fn page_percent(page: usize, total: usize) -> u8 {
    if total == 0 {
        return 10;
    }
    let ratio = page.min(total) as f64 / total as f64;
    10 + (ratio * 70.0).round() as u8
}

/// Receives progress checkpoints and log lines from a running conversion.
///
/// Implementations must be `Send + Sync`: the worker engine calls them from
/// its own thread. Both methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// A progress checkpoint was reached.
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = event;
    }

    /// A human-readable log line.
    fn on_log(&self, message: &str) {
        let _ = message;
    }
}

/// Callback that drops every event. Used when none is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Enforces the monotonic-percent rule for one run.
///
/// Events that would move the bar backwards are clamped up to the last
/// reported value; [`ProgressTracker::reset`] is the only way back to 0.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    last: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit `label` at `percent` (or at the last percent if that is higher).
    pub fn advance(
        &mut self,
        cb: &dyn ConversionProgressCallback,
        label: impl Into<String>,
        percent: u8,
    ) {
        self.last = self.last.max(percent.min(100));
        cb.on_progress(&ProgressEvent::new(label, self.last));
    }

    /// Emit the aborted reset to 0.
    pub fn reset(&mut self, cb: &dyn ConversionProgressCallback) {
        self.last = 0;
        cb.on_progress(&ProgressEvent::aborted());
    }

    pub fn last(&self) -> u8 {
        self.last
    }
}
