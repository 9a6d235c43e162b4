//! Page rendering strategies.
//!
//! * **Image** renders the whole page at `scale ×` its natural size and
//!   places it as a single picture. Faithful, but nothing is editable.
//!   A raster failure here is fatal; there is nothing to fall back to.
//! * **Hybrid** renders a fixed 1.2× background and lays the page's text runs
//!   over it as editable text boxes. Each layer is best-effort: a page that
//!   loses one layer is kept with the other and the loss is recorded as a
//!   [`PageError`]. Only a page that loses both fails the run.
//!
//! All functions here block; callers run them off the async executor.

use crate::artifact::{EncodedImage, HybridSlide, ImageSlide, PageArtifact};
use crate::config::{RenderConfig, RenderMode};
use crate::error::{PageError, Pdf2PptxError};
use crate::pipeline::{encode, text};
use crate::source::SourcePage;
use tracing::{debug, warn};

/// Background scale for hybrid slides, independent of the configured scale.
pub const HYBRID_BACKGROUND_SCALE: f64 = 1.2;

/// A page artifact plus any degradations recorded while producing it.
#[derive(Debug)]
pub struct RenderedPage {
    pub artifact: PageArtifact,
    pub degradations: Vec<PageError>,
}

/// Render one page with the strategy selected by `config.mode`.
pub fn render_page(
    page: &dyn SourcePage,
    config: &RenderConfig,
) -> Result<RenderedPage, Pdf2PptxError> {
    match config.mode {
        RenderMode::Image => Ok(RenderedPage {
            artifact: PageArtifact::Image(render_image_slide(page, config)?),
            degradations: Vec::new(),
        }),
        RenderMode::Hybrid => {
            let (slide, degradations) = render_hybrid_slide(page, config)?;
            Ok(RenderedPage {
                artifact: PageArtifact::Hybrid(slide),
                degradations,
            })
        }
    }
}

/// Whole page as one picture at the configured scale.
pub fn render_image_slide(
    page: &dyn SourcePage,
    config: &RenderConfig,
) -> Result<ImageSlide, Pdf2PptxError> {
    let (width_pts, height_pts) = page.size_pts();
    let image = rasterise(page, config.scale as f64, config)?;
    Ok(ImageSlide {
        width_pts,
        height_pts,
        image,
    })
}

/// Background raster plus text items; each layer degrades independently.
pub fn render_hybrid_slide(
    page: &dyn SourcePage,
    config: &RenderConfig,
) -> Result<(HybridSlide, Vec<PageError>), Pdf2PptxError> {
    let number = page.number();
    let (width_pts, height_pts) = page.size_pts();
    let mut degradations = Vec::new();

    let background = match rasterise(page, HYBRID_BACKGROUND_SCALE, config) {
        Ok(img) => Some(img),
        Err(e) => {
            warn!("Page {}: background render failed, keeping text only: {}", number, e);
            degradations.push(PageError::BackgroundRenderFailed {
                page: number,
                detail: e.to_string(),
            });
            None
        }
    };

    let text_items = match page.text_runs() {
        Ok(runs) => text::map_text_runs(&runs, height_pts),
        Err(e) => {
            if background.is_none() {
                return Err(Pdf2PptxError::RasterisationFailed {
                    page: number,
                    detail: format!("background and text layer both failed: {e}"),
                });
            }
            warn!("Page {}: text extraction failed, keeping background only: {}", number, e);
            degradations.push(PageError::TextExtractionFailed {
                page: number,
                detail: e.to_string(),
            });
            Vec::new()
        }
    };

    debug!(
        "Page {}: hybrid slide with {} text items (background: {})",
        number,
        text_items.len(),
        background.is_some()
    );

    Ok((
        HybridSlide {
            width_pts,
            height_pts,
            background,
            text_items,
        },
        degradations,
    ))
}

fn rasterise(
    page: &dyn SourcePage,
    scale: f64,
    config: &RenderConfig,
) -> Result<EncodedImage, Pdf2PptxError> {
    let viewport = page.viewport(scale);
    let image = page.render(&viewport)?;
    encode::encode_image(&image, config.image_format, page.number())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::{MemoryBackend, MemoryPage};
    use crate::source::PdfBackend;

    fn with_page<T>(page: MemoryPage, f: impl FnOnce(&dyn SourcePage) -> T) -> T {
        let backend = MemoryBackend::new(vec![page]);
        let decoder = backend.decoder().unwrap();
        let doc = decoder.open(b"%PDF", None).unwrap();
        let page = doc.page(0).unwrap();
        f(page.as_ref())
    }

    #[test]
    fn image_strategy_pixel_size() {
        let cfg = RenderConfig::builder().scale(2.0).build();
        let slide = with_page(MemoryPage::new(612.3, 792.0), |p| {
            render_image_slide(p, &cfg).unwrap()
        });
        assert_eq!(slide.width_pts, 612.3);
        assert_eq!((slide.image.width_px, slide.image.height_px), (1225, 1584));
    }

    #[test]
    fn image_strategy_failure_is_fatal() {
        let cfg = RenderConfig::default();
        let err = with_page(MemoryPage::letter().failing_render(), |p| {
            render_page(p, &cfg).unwrap_err()
        });
        assert!(matches!(err, Pdf2PptxError::RasterisationFailed { page: 1, .. }));
    }

    #[test]
    fn hybrid_background_is_fixed_scale() {
        let cfg = RenderConfig::builder().scale(3.0).mode(RenderMode::Hybrid).build();
        let page = MemoryPage::new(100.0, 50.0).with_text("Hello", 10.0, 20.0, 14.0);
        let (slide, degradations) = with_page(page, |p| render_hybrid_slide(p, &cfg).unwrap());
        let bg = slide.background.expect("background");
        assert_eq!((bg.width_px, bg.height_px), (120, 60));
        assert_eq!(slide.text_items.len(), 1);
        assert!(degradations.is_empty());
    }

    #[test]
    fn hybrid_degrades_to_text_only() {
        let cfg = RenderConfig::builder().mode(RenderMode::Hybrid).build();
        let page = MemoryPage::letter()
            .with_text("survives", 72.0, 700.0, 12.0)
            .failing_render();
        let rendered = with_page(page, |p| render_page(p, &cfg).unwrap());
        let PageArtifact::Hybrid(slide) = rendered.artifact else {
            panic!("expected hybrid");
        };
        assert!(slide.background.is_none());
        assert_eq!(slide.text_items[0].content, "survives");
        assert!(matches!(
            rendered.degradations.as_slice(),
            [PageError::BackgroundRenderFailed { page: 1, .. }]
        ));
    }

    #[test]
    fn hybrid_degrades_to_background_only() {
        let cfg = RenderConfig::builder().mode(RenderMode::Hybrid).build();
        let rendered = with_page(MemoryPage::letter().failing_text(), |p| {
            render_page(p, &cfg).unwrap()
        });
        let PageArtifact::Hybrid(slide) = rendered.artifact else {
            panic!("expected hybrid");
        };
        assert!(slide.background.is_some());
        assert!(slide.text_items.is_empty());
        assert!(matches!(
            rendered.degradations.as_slice(),
            [PageError::TextExtractionFailed { page: 1, .. }]
        ));
    }

    #[test]
    fn hybrid_with_both_layers_failing_is_fatal() {
        let cfg = RenderConfig::builder().mode(RenderMode::Hybrid).build();
        let err = with_page(MemoryPage::letter().failing_text().failing_render(), |p| {
            render_page(p, &cfg).unwrap_err()
        });
        assert!(matches!(err, Pdf2PptxError::RasterisationFailed { page: 1, .. }));
    }
}
