//! Deck builder: folds page artifacts into a presentation.
//!
//! The canvas is fixed once, from the first page's natural size, and never
//! changes afterwards. A first page outside the slide sizes PowerPoint opens
//! (1 to 56 in per side) is brought into range by [`constrain_canvas`]. Image
//! slides are fitted into the canvas (letterboxed when a later page has a
//! different aspect ratio); hybrid slides place their text items at the
//! geometry computed by the page renderer, rescaled by the same factor when
//! the canvas was constrained.

use crate::artifact::{HybridSlide, ImageSlide, PageArtifact};
use crate::error::Pdf2PptxError;
use crate::geometry::{constrain_canvas, fit_rect, to_inches, Rect};
use crate::pipeline::text::MIN_FONT_SIZE_PT;
use crate::pptx::{PptxWriter, PresentationWriter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Colour of hybrid text boxes.
pub const TEXT_COLOUR: &str = "333333";

/// Slide size in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeckCanvas {
    pub width_pts: f64,
    pub height_pts: f64,
}

/// An in-progress presentation.
pub struct Deck<W: PresentationWriter = PptxWriter> {
    writer: W,
    canvas: Option<DeckCanvas>,
    /// Canvas size over first-page size, per axis. `(1, 1)` unless constrained.
    text_scale: (f64, f64),
}

impl Deck<PptxWriter> {
    /// A deck backed by the `.pptx` writer.
    pub fn pptx() -> Self {
        Self::new(PptxWriter::new())
    }
}

impl<W: PresentationWriter> Deck<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            canvas: None,
            text_scale: (1.0, 1.0),
        }
    }

    pub fn canvas(&self) -> Option<DeckCanvas> {
        self.canvas
    }

    pub fn slide_count(&self) -> usize {
        self.writer.slide_count()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Fix the canvas. Only the first call has any effect; returns whether
    /// this call set it.
    pub fn set_canvas_from_first_page(&mut self, width_pts: f64, height_pts: f64) -> bool {
        if let Some(existing) = self.canvas {
            debug!(
                "Canvas already fixed at {:.1}x{:.1} pt; ignoring {:.1}x{:.1}",
                existing.width_pts, existing.height_pts, width_pts, height_pts
            );
            return false;
        }
        let (w, h) = constrain_canvas(width_pts, height_pts);
        if (w, h) != (width_pts, height_pts) {
            warn!(
                "First page is {:.1}x{:.1} pt, outside the supported slide size; canvas set to {:.1}x{:.1} pt",
                width_pts, height_pts, w, h
            );
            if width_pts > 0.0 && height_pts > 0.0 {
                self.text_scale = (w / width_pts, h / height_pts);
            }
        }
        self.canvas = Some(DeckCanvas {
            width_pts: w,
            height_pts: h,
        });
        self.writer.define_canvas(to_inches(w), to_inches(h));
        true
    }

    /// Append one slide for `artifact`; returns its 0-based index.
    pub fn add_slide(&mut self, artifact: PageArtifact) -> Result<usize, Pdf2PptxError> {
        let (page_w, page_h) = artifact.page_size();
        if self.canvas.is_none() {
            self.set_canvas_from_first_page(page_w, page_h);
        }
        let slide = self.writer.add_slide()?;
        match artifact {
            PageArtifact::Image(image) => self.place_image(slide, image)?,
            PageArtifact::Hybrid(hybrid) => self.place_hybrid(slide, hybrid)?,
        }
        Ok(slide)
    }

    fn place_image(&mut self, slide: usize, s: ImageSlide) -> Result<(), Pdf2PptxError> {
        let canvas = self.canvas_or_page(s.width_pts, s.height_pts);
        let frame = fit_rect(s.width_pts, s.height_pts, canvas.width_pts, canvas.height_pts);
        self.writer.add_image(slide, s.image, frame.to_inches())
    }

    fn place_hybrid(&mut self, slide: usize, s: HybridSlide) -> Result<(), Pdf2PptxError> {
        if let Some(background) = s.background {
            self.writer.set_background(slide, background)?;
        }
        let (sx, sy) = self.text_scale;
        for item in &s.text_items {
            let frame = Rect::new(
                item.x_in * sx,
                item.y_in * sy,
                item.width_in * sx,
                item.height_in * sy,
            );
            let font_size = if (sx, sy) == (1.0, 1.0) {
                item.font_size_pt
            } else {
                (item.font_size_pt as f64 * sx.min(sy))
                    .round()
                    .max(MIN_FONT_SIZE_PT) as u32
            };
            self.writer
                .add_text(slide, &item.content, frame, font_size, TEXT_COLOUR)?;
        }
        Ok(())
    }

    fn canvas_or_page(&self, width_pts: f64, height_pts: f64) -> DeckCanvas {
        self.canvas.unwrap_or(DeckCanvas {
            width_pts,
            height_pts,
        })
    }

    /// Produce the container bytes.
    pub fn serialize(self) -> Result<Vec<u8>, Pdf2PptxError> {
        if self.writer.slide_count() == 0 {
            return Err(Pdf2PptxError::EmptyDeck);
        }
        self.writer.serialize()
    }
}
