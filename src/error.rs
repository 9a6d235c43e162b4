//! Error types for the edgequake-pdf2pptx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2PptxError`] — **Fatal**: the conversion cannot produce a deck
//!   (bad input file, corrupt PDF, empty deck, no imaging capability). Any of
//!   these moves the pipeline into its `Failed` state and the message is
//!   surfaced verbatim to the controlling context.
//!
//! * [`PageError`] — **Non-fatal**: one layer of a single page could not be
//!   produced in hybrid mode, and the page was degraded instead of dropped.
//!   Recorded in [`crate::output::ConversionStats::degraded_pages`].
//!
//! [`ErrorKind`] groups the fatal variants into the coarse classes callers
//! usually branch on (tell the user to pick another file, retry, report a bug).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2pptx library.
#[derive(Debug, Error)]
pub enum Pdf2PptxError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Neither the MIME type nor the file name identify a PDF.
    #[error("File '{name}' is not a PDF (expected application/pdf or a .pdf extension)")]
    UnsupportedFileType { name: String },

    /// The file exceeds the accepted input size.
    #[error("File '{name}' is {size} bytes, over the {limit}-byte limit")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    // ── Decode errors ─────────────────────────────────────────────────────
    /// No `%PDF-` header near the start of the bytes. `magic` holds the first four bytes.
    #[error("Source is not a valid PDF: first bytes {magic:?}")]
    NotAPdf { magic: Vec<u8> },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for encrypted PDF")]
    WrongPassword,

    /// The decoder could not hand out a page it reported as present.
    #[error("Page {page} could not be loaded: {detail}")]
    PageUnavailable { page: usize, detail: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// A page could not be rasterised and there is no further fallback.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Encoding errors ───────────────────────────────────────────────────
    /// Serialisation was requested before any slide was added.
    #[error("Cannot write a presentation with no slides (the PDF has no pages)")]
    EmptyDeck,

    /// A rendered page could not be encoded as PNG/JPEG.
    #[error("Image encoding failed for page {page}: {detail}")]
    ImageEncoding { page: usize, detail: String },

    /// Writing the presentation container failed.
    #[error("Failed to write presentation container: {0}")]
    Container(String),

    // ── Capability errors ─────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or place the platform library next to\n\
the executable or in ./libs.\n"
    )]
    PdfiumBindingFailed(String),

    /// Neither execution context can rasterise pages.
    #[error("No execution context can render pages: {0}")]
    ImagingUnavailable(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output presentation file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The caller's cancel token fired before the deck was complete.
    ///
    /// Only the convenience entry points in [`crate::convert`] report
    /// cancellation this way; the pipeline and the bridge treat it as a
    /// terminal outcome rather than an error.
    #[error("Conversion aborted")]
    Cancelled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`Pdf2PptxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input file type or size; no conversion was attempted.
    Validation,
    /// The source is not a PDF or is corrupt.
    Decode,
    /// A page could not be rendered and had nothing to degrade to.
    Render,
    /// Empty deck, image encoding, or container serialisation failure.
    Encoding,
    /// Required imaging capability is missing.
    Capability,
    /// Output could not be written.
    Io,
    /// The run was aborted.
    Cancelled,
    /// Bug or unexpected state.
    Internal,
}

impl Pdf2PptxError {
    /// The class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::UnsupportedFileType { .. }
            | Self::FileTooLarge { .. } => ErrorKind::Validation,
            Self::NotAPdf { .. }
            | Self::CorruptPdf { .. }
            | Self::PasswordRequired
            | Self::WrongPassword
            | Self::PageUnavailable { .. } => ErrorKind::Decode,
            Self::RasterisationFailed { .. } => ErrorKind::Render,
            Self::EmptyDeck | Self::ImageEncoding { .. } | Self::Container(_) => {
                ErrorKind::Encoding
            }
            Self::PdfiumBindingFailed(_) | Self::ImagingUnavailable(_) => ErrorKind::Capability,
            Self::OutputWriteFailed { .. } => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<zip::result::ZipError> for Pdf2PptxError {
    fn from(e: zip::result::ZipError) -> Self {
        Pdf2PptxError::Container(e.to_string())
    }
}

impl From<std::fmt::Error> for Pdf2PptxError {
    fn from(e: std::fmt::Error) -> Self {
        Pdf2PptxError::Container(format!("XML formatting: {e}"))
    }
}

impl From<std::io::Error> for Pdf2PptxError {
    fn from(e: std::io::Error) -> Self {
        Pdf2PptxError::Container(e.to_string())
    }
}

/// A non-fatal degradation of a single page.
///
/// Only hybrid rendering degrades: a page whose background raster failed is
/// kept as a text-only slide, and a page whose text layer failed is kept as a
/// background-only slide.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum PageError {
    /// The 1.2× background raster could not be produced.
    #[error("Page {page}: background render failed, kept text only: {detail}")]
    BackgroundRenderFailed { page: usize, detail: String },

    /// The text layer could not be extracted.
    #[error("Page {page}: text extraction failed, kept background only: {detail}")]
    TextExtractionFailed { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page the degradation applies to.
    pub fn page(&self) -> usize {
        match self {
            PageError::BackgroundRenderFailed { page, .. }
            | PageError::TextExtractionFailed { page, .. } => *page,
        }
    }
}
