//! Synthetic in-memory PDF backend.
//!
//! A supported [`PdfBackend`] for hosts that have no pdfium library: layout
//! previews, tooling that only needs the deck structure, and tests. Documents
//! come from a page list instead of parsed bytes. Pages render as flat colour
//! fills ([`MemoryPage::with_fill`]); failures and slowness can be injected per
//! page.

use super::{Capabilities, PdfBackend, PdfDecoder, SourceDocument, SourcePage, TextRun, Viewport};
use crate::error::Pdf2PptxError;
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::Arc;
use std::time::Duration;

/// One synthetic page.
#[derive(Debug, Clone)]
pub struct MemoryPage {
    pub width_pts: f64,
    pub height_pts: f64,
    pub text_runs: Vec<TextRun>,
    pub fill: [u8; 3],
    /// Every render of this page fails.
    pub fail_render: bool,
    /// Text extraction for this page fails.
    pub fail_text: bool,
    /// Sleep this long inside `render`.
    pub render_delay: Duration,
}

impl MemoryPage {
    pub fn new(width_pts: f64, height_pts: f64) -> Self {
        Self {
            width_pts,
            height_pts,
            text_runs: Vec::new(),
            fill: [255, 255, 255],
            fail_render: false,
            fail_text: false,
            render_delay: Duration::ZERO,
        }
    }

    /// US Letter portrait, 612 × 792 pt.
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// Add a run whose baseline sits at `(x, y)` in bottom-left page space.
    pub fn with_text(mut self, content: &str, x: f64, y: f64, size: f64) -> Self {
        self.text_runs.push(TextRun {
            content: content.to_string(),
            transform: [size, 0.0, 0.0, size, x, y],
            width: content.chars().count() as f64 * size * 0.5,
            height: size,
        });
        self
    }

    pub fn with_run(mut self, run: TextRun) -> Self {
        self.text_runs.push(run);
        self
    }

    pub fn with_fill(mut self, fill: [u8; 3]) -> Self {
        self.fill = fill;
        self
    }

    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub fn failing_text(mut self) -> Self {
        self.fail_text = true;
        self
    }

    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }
}

/// Backend serving a fixed list of [`MemoryPage`]s for any input bytes.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    pages: Arc<Vec<MemoryPage>>,
    capabilities: Capabilities,
    password: Option<String>,
    corrupt: bool,
}

impl MemoryBackend {
    pub fn new(pages: Vec<MemoryPage>) -> Self {
        Self {
            pages: Arc::new(pages),
            capabilities: Capabilities::ALL,
            password: None,
            corrupt: false,
        }
    }

    /// `count` blank Letter pages.
    pub fn letter_pages(count: usize) -> Self {
        Self::new(vec![MemoryPage::letter(); count])
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Documents only open with this password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Every open fails as a corrupt document.
    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }
}

impl PdfBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn decoder(&self) -> Result<Box<dyn PdfDecoder>, Pdf2PptxError> {
        Ok(Box::new(self.clone()))
    }
}

impl PdfDecoder for MemoryBackend {
    fn open<'a>(
        &'a self,
        _bytes: &'a [u8],
        password: Option<&'a str>,
    ) -> Result<Box<dyn SourceDocument + 'a>, Pdf2PptxError> {
        if self.corrupt {
            return Err(Pdf2PptxError::CorruptPdf {
                detail: "synthetic corrupt document".to_string(),
            });
        }
        match (self.password.as_deref(), password) {
            (Some(_), None) => return Err(Pdf2PptxError::PasswordRequired),
            (Some(expected), Some(given)) if expected != given => {
                return Err(Pdf2PptxError::WrongPassword)
            }
            _ => {}
        }
        Ok(Box::new(MemoryDocument { pages: &self.pages }))
    }
}

struct MemoryDocument<'a> {
    pages: &'a [MemoryPage],
}

impl SourceDocument for MemoryDocument<'_> {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, index: usize) -> Result<Box<dyn SourcePage + '_>, Pdf2PptxError> {
        let page = self
            .pages
            .get(index)
            .ok_or_else(|| Pdf2PptxError::PageUnavailable {
                page: index + 1,
                detail: format!("document has {} pages", self.pages.len()),
            })?;
        Ok(Box::new(MemorySourcePage {
            number: index + 1,
            page,
        }))
    }
}

struct MemorySourcePage<'a> {
    number: usize,
    page: &'a MemoryPage,
}

impl SourcePage for MemorySourcePage<'_> {
    fn number(&self) -> usize {
        self.number
    }

    fn size_pts(&self) -> (f64, f64) {
        (self.page.width_pts, self.page.height_pts)
    }

    fn text_runs(&self) -> Result<Vec<TextRun>, Pdf2PptxError> {
        if self.page.fail_text {
            return Err(Pdf2PptxError::PageUnavailable {
                page: self.number,
                detail: "synthetic text layer failure".to_string(),
            });
        }
        Ok(self.page.text_runs.clone())
    }

    fn render(&self, viewport: &Viewport) -> Result<DynamicImage, Pdf2PptxError> {
        if !self.page.render_delay.is_zero() {
            std::thread::sleep(self.page.render_delay);
        }
        if self.page.fail_render {
            return Err(Pdf2PptxError::RasterisationFailed {
                page: self.number,
                detail: "synthetic raster failure".to_string(),
            });
        }
        let (w, h) = viewport.pixel_size();
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            w,
            h,
            Rgb(self.page.fill),
        )))
    }
}
