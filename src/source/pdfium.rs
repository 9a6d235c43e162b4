//! pdfium-backed decoder.
//!
//! The library binding is located at decoder construction time. Search order:
//!
//! 1. `PDFIUM_LIB_PATH` (a library file, or a directory containing one)
//! 2. the directory of the running executable
//! 3. `./` and `./libs`
//! 4. the system library path
//!
//! pdfium is CPU-bound and not async-aware; every call into this module
//! happens on a blocking thread (a worker thread or `spawn_blocking`).

use super::{Capabilities, PdfBackend, PdfDecoder, SourceDocument, SourcePage, TextRun, Viewport};
use crate::error::Pdf2PptxError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Env var naming the pdfium library (or its directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// [`PdfBackend`] that binds pdfium on demand.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
}

impl PdfiumBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a specific library file or directory instead of searching.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }
}

impl PdfBackend for PdfiumBackend {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn capabilities(&self) -> Capabilities {
        // Built with `thread_safe`: any thread may drive the binding.
        Capabilities::ALL
    }

    fn decoder(&self) -> Result<Box<dyn PdfDecoder>, Pdf2PptxError> {
        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        Ok(Box::new(PdfiumDecoder { pdfium }))
    }
}

/// Bind to a pdfium library, trying the configured path first.
pub fn bind_pdfium(explicit: Option<&Path>) -> Result<Pdfium, Pdf2PptxError> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = explicit {
        candidates.push(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        if !p.is_empty() {
            candidates.push(PathBuf::from(p));
        }
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir);
    }
    candidates.push(PathBuf::from("./"));
    candidates.push(PathBuf::from("./libs"));

    for candidate in &candidates {
        let lib = if candidate.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(candidate)
        } else {
            candidate.clone()
        };
        debug!("Trying pdfium at {:?}", lib);
        if let Ok(bindings) = Pdfium::bind_to_library(&lib) {
            info!("Bound pdfium from {:?}", lib);
            return Ok(Pdfium::new(bindings));
        }
    }

    debug!("Trying system pdfium library");
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| Pdf2PptxError::PdfiumBindingFailed(format!("{e:?}")))
}

struct PdfiumDecoder {
    pdfium: Pdfium,
}

impl PdfDecoder for PdfiumDecoder {
    fn open<'a>(
        &'a self,
        bytes: &'a [u8],
        password: Option<&'a str>,
    ) -> Result<Box<dyn SourceDocument + 'a>, Pdf2PptxError> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(|e| classify_load_error(e, password.is_some()))?;
        Ok(Box::new(PdfiumDocument { document }))
    }
}

/// Map a pdfium load failure onto the decode-class errors.
fn classify_load_error(e: PdfiumError, had_password: bool) -> Pdf2PptxError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            Pdf2PptxError::WrongPassword
        } else {
            Pdf2PptxError::PasswordRequired
        }
    } else {
        Pdf2PptxError::CorruptPdf { detail: err_str }
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl SourceDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page(&self, index: usize) -> Result<Box<dyn SourcePage + '_>, Pdf2PptxError> {
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|e| Pdf2PptxError::PageUnavailable {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;
        Ok(Box::new(PdfiumPage {
            number: index + 1,
            page,
        }))
    }
}

struct PdfiumPage<'a> {
    number: usize,
    page: PdfPage<'a>,
}

impl SourcePage for PdfiumPage<'_> {
    fn number(&self) -> usize {
        self.number
    }

    fn size_pts(&self) -> (f64, f64) {
        (
            self.page.width().value as f64,
            self.page.height().value as f64,
        )
    }

    fn text_runs(&self) -> Result<Vec<TextRun>, Pdf2PptxError> {
        let text = self.page.text().map_err(|e| Pdf2PptxError::PageUnavailable {
            page: self.number,
            detail: format!("text layer: {:?}", e),
        })?;

        let runs = text
            .segments()
            .iter()
            .map(|segment| {
                let bounds = segment.bounds();
                let left = bounds.left().value as f64;
                let right = bounds.right().value as f64;
                let top = bounds.top().value as f64;
                let bottom = bounds.bottom().value as f64;
                let height = (top - bottom).max(0.0);
                TextRun {
                    content: segment.text(),
                    transform: [1.0, 0.0, 0.0, height, left, bottom],
                    width: (right - left).max(0.0),
                    height,
                }
            })
            .collect::<Vec<_>>();

        debug!("Page {}: {} text segments", self.number, runs.len());
        Ok(runs)
    }

    fn render(&self, viewport: &Viewport) -> Result<DynamicImage, Pdf2PptxError> {
        let (w, h) = viewport.pixel_size();
        let config = PdfRenderConfig::new()
            .set_target_width(w as i32)
            .set_target_height(h as i32);

        let bitmap = self
            .page
            .render_with_config(&config)
            .map_err(|e| Pdf2PptxError::RasterisationFailed {
                page: self.number,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            self.number,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}
