//! # edgequake-pdf2pptx
//!
//! Convert PDF documents to PowerPoint (`.pptx`) decks entirely in-process.
//!
//! ## Why this crate?
//!
//! Slide decks exported as PDF (from Keynote, Google Slides, notebook tools)
//! lose their editability. This crate turns each page back into a slide, either
//! as a faithful full-page picture or as a lighter background raster with the
//! page's text laid over it as editable text boxes. Nothing leaves the process:
//! pdfium decodes and rasterises, and the `.pptx` package is written directly.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Input    name / MIME / size / %PDF checks
//!  ├─ 2. Decode   pdfium (or any PdfBackend), page count fixed here
//!  ├─ 3. Render   per page: Image (scale × raster) or Hybrid (1.2× + text)
//!  ├─ 4. Deck     canvas from page 1, pictures fitted, text boxes placed
//!  ├─ 5. Package  Office Open XML zip, media streamed as slides are added
//!  └─ 6. Output   bytes + suggested `<name>.pptx` + stats
//! ```
//!
//! The run is a state machine on a per-conversion [`Session`] and can be
//! cancelled at any page boundary. The [`bridge`] module runs it on a worker
//! thread or inline and streams serialisable [`protocol`] messages.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2pptx::{convert_to_file, ConversionConfig, RenderMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .scale(2.0)
//!         .mode(RenderMode::Hybrid)
//!         .build();
//!     let stats = convert_to_file("talk.pdf", "talk.pptx", &config).await?;
//!     eprintln!("{} slides, {} degraded", stats.slides, stats.degraded_pages.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2pptx` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdf2pptx = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing a Mode
//!
//! | Mode | Slide content | Editable | Size |
//! |------|---------------|----------|------|
//! | `image`  | one picture at `scale ×` (1–3) | no | large at scale 3 |
//! | `hybrid` | 1.2× background + text boxes | text only | small |
//!
//! JPEG (quality 0.4–1) keeps decks small for photo-heavy pages; PNG is the
//! default and is lossless.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod bridge;
pub mod config;
pub mod convert;
pub mod deck;
pub mod error;
pub mod geometry;
pub mod output;
pub mod pipeline;
pub mod pptx;
pub mod progress;
pub mod protocol;
pub mod session;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use artifact::{EncodedImage, HybridSlide, ImageSlide, PageArtifact, TextItem};
pub use bridge::{Bridge, Engine, EngineKind, InlineEngine, WorkerEngine};
pub use config::{
    ClampPolicy, ConversionConfig, ConversionConfigBuilder, EnginePreference, ImageEncoding,
    RawRenderConfig, RenderConfig, RenderMode,
};
pub use convert::{
    convert, convert_bytes, convert_sync, convert_to_file, inspect, inspect_with,
    ConversionRequest,
};
pub use deck::{Deck, DeckCanvas};
pub use error::{ErrorKind, PageError, Pdf2PptxError};
pub use output::{format_bytes, to_pptx_name, ConversionResult, ConversionStats, DocumentInfo};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressEvent};
pub use protocol::{ClientMessage, EngineMessage, MessageSink};
pub use session::{CancelToken, ConversionState, Session};
