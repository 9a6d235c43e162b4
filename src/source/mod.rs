//! PDF decoding collaborators.
//!
//! The pipeline never talks to a PDF library directly. It asks a
//! [`PdfBackend`] for a [`PdfDecoder`], opens a [`SourceDocument`] from raw
//! bytes, and walks its [`SourcePage`]s. Two backends ship with the crate:
//!
//! * [`pdfium::PdfiumBackend`] — the real thing, via `pdfium-render`.
//! * [`memory::MemoryBackend`] — synthetic pages for tests and tooling.
//!
//! The split between backend and decoder exists because pdfium documents
//! borrow the library binding: the decoder owns the binding, and documents
//! and pages borrow from it for as long as the run lasts.

pub mod memory;
pub mod pdfium;

use crate::error::Pdf2PptxError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Which execution contexts can rasterise with this backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Pages can be rendered from a dedicated background thread.
    pub background: bool,
    /// Pages can be rendered on the caller's thread.
    pub inline: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        background: true,
        inline: true,
    };
}

/// Page viewport at a given scale, in CSS-style pixels (1 px = 1 pt at scale 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl Viewport {
    /// Pixel dimensions of a raster covering this viewport.
    pub fn pixel_size(&self) -> (u32, u32) {
        // 100.0 * 1.2 is 120.00000000000001; that must not grow a pixel.
        let snap = |v: f64| (v - 1e-7).ceil().max(1.0) as u32;
        (snap(self.width), snap(self.height))
    }
}

/// A positioned run of text as reported by the decoder.
///
/// `transform` is the PDF text matrix `[a, b, c, d, e, f]`: `d` is the
/// vertical scale (≈ font size) and `(e, f)` the baseline origin in page
/// space with a bottom-left origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub content: String,
    pub transform: [f64; 6],
    /// Advance width in points, `0.0` when unknown.
    pub width: f64,
    /// Height in points, `0.0` when unknown.
    pub height: f64,
}

/// Factory for decoders. Shared across threads, so it must be cheap to hold.
pub trait PdfBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Build a decoder on the current thread.
    fn decoder(&self) -> Result<Box<dyn PdfDecoder>, Pdf2PptxError>;
}

/// Turns bytes into documents. Lives on the thread that uses it.
pub trait PdfDecoder {
    fn open<'a>(
        &'a self,
        bytes: &'a [u8],
        password: Option<&'a str>,
    ) -> Result<Box<dyn SourceDocument + 'a>, Pdf2PptxError>;
}

/// An opened PDF.
pub trait SourceDocument {
    /// Number of pages; fixed for the life of the document.
    fn page_count(&self) -> usize;

    /// 0-indexed page access.
    fn page(&self, index: usize) -> Result<Box<dyn SourcePage + '_>, Pdf2PptxError>;
}

/// One page of an opened PDF.
pub trait SourcePage {
    /// 1-indexed page number, for error messages.
    fn number(&self) -> usize;

    /// Natural size in points `(width, height)`.
    fn size_pts(&self) -> (f64, f64);

    /// Viewport at `scale` times the natural size. Never renders.
    fn viewport(&self, scale: f64) -> Viewport {
        let (w, h) = self.size_pts();
        Viewport {
            width: w * scale,
            height: h * scale,
            scale,
        }
    }

    /// Positioned text runs in content order.
    fn text_runs(&self) -> Result<Vec<TextRun>, Pdf2PptxError>;

    /// Rasterise into an image of [`Viewport::pixel_size`].
    fn render(&self, viewport: &Viewport) -> Result<DynamicImage, Pdf2PptxError>;
}
