//! Presentation container writing.
//!
//! [`PresentationWriter`] is the seam between the deck builder and a concrete
//! file format. [`PptxWriter`] implements it for Office Open XML
//! PresentationML: a zip package whose media parts are written the moment an
//! image is added, so only the current slide's XML is held in memory.
//!
//! Geometry crosses the seam in inches; EMU conversion happens here.

pub mod parts;
pub mod slide;

use crate::artifact::EncodedImage;
use crate::error::Pdf2PptxError;
use crate::geometry::{inches_to_emu, Rect, EMU_PER_INCH};
use slide::{EmuRect, SlideBuilder};
use std::fmt;
use std::io::{Cursor, Write};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Canvas used when a deck is serialised without one: 10 × 7.5 in.
pub const DEFAULT_CANVAS_IN: (f64, f64) = (10.0, 7.5);

/// `p:sldSz` bounds accepted by PowerPoint: 1 in to 56 in.
pub const SLIDE_SIZE_EMU: std::ops::RangeInclusive<i64> = EMU_PER_INCH..=56 * EMU_PER_INCH;

/// A slide-file writer.
///
/// Slides are built strictly in order: only the most recently added slide
/// accepts content.
pub trait PresentationWriter {
    /// Fix the slide size in inches.
    fn define_canvas(&mut self, width_in: f64, height_in: f64);

    /// Start a new slide; returns its 0-based index.
    fn add_slide(&mut self) -> Result<usize, Pdf2PptxError>;

    /// Fill the whole slide background with `image`.
    fn set_background(&mut self, slide: usize, image: EncodedImage) -> Result<(), Pdf2PptxError>;

    /// Place `image` stretched over `frame` (inches).
    fn add_image(
        &mut self,
        slide: usize,
        image: EncodedImage,
        frame: Rect,
    ) -> Result<(), Pdf2PptxError>;

    /// Place a text box over `frame` (inches). `colour` is `RRGGBB`.
    fn add_text(
        &mut self,
        slide: usize,
        content: &str,
        frame: Rect,
        font_size_pt: u32,
        colour: &str,
    ) -> Result<(), Pdf2PptxError>;

    fn slide_count(&self) -> usize;

    /// Finish the container and return its bytes.
    fn serialize(self) -> Result<Vec<u8>, Pdf2PptxError>
    where
        Self: Sized;
}

/// Office Open XML (`.pptx`) writer.
pub struct PptxWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    canvas_emu: Option<(i64, i64)>,
    current: Option<SlideBuilder>,
    slide_count: usize,
    media_count: usize,
    title: String,
}

impl Default for PptxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PptxWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PptxWriter")
            .field("canvas_emu", &self.canvas_emu)
            .field("slide_count", &self.slide_count)
            .field("media_count", &self.media_count)
            .field("title", &self.title)
            .finish()
    }
}

impl PptxWriter {
    pub fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            canvas_emu: None,
            current: None,
            slide_count: 0,
            media_count: 0,
            title: String::new(),
        }
    }

    /// Document title stored in `docProps/core.xml`.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    fn deflated() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
    }

    // PNG and JPEG are already compressed.
    fn stored() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    }

    fn write_part(
        &mut self,
        name: &str,
        data: &[u8],
        options: SimpleFileOptions,
    ) -> Result<(), Pdf2PptxError> {
        self.zip.start_file(name, options)?;
        self.zip.write_all(data)?;
        Ok(())
    }

    fn check_slide(&self, slide: usize) -> Result<(), Pdf2PptxError> {
        if self.current.is_none() || slide + 1 != self.slide_count {
            return Err(Pdf2PptxError::Internal(format!(
                "slide {} is not open for writing ({} slides)",
                slide, self.slide_count
            )));
        }
        Ok(())
    }

    fn current_slide(&mut self, slide: usize) -> Result<&mut SlideBuilder, Pdf2PptxError> {
        self.check_slide(slide)?;
        self.current
            .as_mut()
            .ok_or_else(|| Pdf2PptxError::Internal("no open slide".to_string()))
    }

    /// Write `image` under `ppt/media/` and return its file name.
    fn store_media(&mut self, image: &EncodedImage) -> Result<String, Pdf2PptxError> {
        self.media_count += 1;
        let name = format!("image{}.{}", self.media_count, image.format.extension());
        self.write_part(&format!("ppt/media/{name}"), &image.bytes, Self::stored())?;
        debug!("Stored media {} ({} bytes)", name, image.bytes.len());
        Ok(name)
    }

    fn flush_current(&mut self) -> Result<(), Pdf2PptxError> {
        if let Some(slide) = self.current.take() {
            let n = self.slide_count;
            let xml = slide.to_xml()?;
            let rels = slide.rels_xml()?;
            self.write_part(&format!("ppt/slides/slide{n}.xml"), xml.as_bytes(), Self::deflated())?;
            self.write_part(
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                rels.as_bytes(),
                Self::deflated(),
            )?;
        }
        Ok(())
    }
}

impl PresentationWriter for PptxWriter {
    fn define_canvas(&mut self, width_in: f64, height_in: f64) {
        let bound = |v: i64| v.clamp(*SLIDE_SIZE_EMU.start(), *SLIDE_SIZE_EMU.end());
        let (cx, cy) = (inches_to_emu(width_in), inches_to_emu(height_in));
        if !SLIDE_SIZE_EMU.contains(&cx) || !SLIDE_SIZE_EMU.contains(&cy) {
            warn!("Slide size {}x{} EMU out of range; clamping", cx, cy);
        }
        self.canvas_emu = Some((bound(cx), bound(cy)));
    }

    fn add_slide(&mut self) -> Result<usize, Pdf2PptxError> {
        self.flush_current()?;
        self.current = Some(SlideBuilder::new());
        self.slide_count += 1;
        Ok(self.slide_count - 1)
    }

    fn set_background(&mut self, slide: usize, image: EncodedImage) -> Result<(), Pdf2PptxError> {
        self.check_slide(slide)?;
        let name = self.store_media(&image)?;
        let builder = self.current_slide(slide)?;
        let rid = builder.add_image_rel(&name);
        builder.set_background(rid);
        Ok(())
    }

    fn add_image(
        &mut self,
        slide: usize,
        image: EncodedImage,
        frame: Rect,
    ) -> Result<(), Pdf2PptxError> {
        self.check_slide(slide)?;
        let name = self.store_media(&image)?;
        let builder = self.current_slide(slide)?;
        let rid = builder.add_image_rel(&name);
        builder.push_picture(&rid, EmuRect::from_inches(frame))
    }

    fn add_text(
        &mut self,
        slide: usize,
        content: &str,
        frame: Rect,
        font_size_pt: u32,
        colour: &str,
    ) -> Result<(), Pdf2PptxError> {
        self.current_slide(slide)?
            .push_text(content, EmuRect::from_inches(frame), font_size_pt, colour)
    }

    fn slide_count(&self) -> usize {
        self.slide_count
    }

    fn serialize(mut self) -> Result<Vec<u8>, Pdf2PptxError> {
        if self.slide_count == 0 {
            return Err(Pdf2PptxError::EmptyDeck);
        }
        self.flush_current()?;

        let n = self.slide_count;
        let (cx, cy) = self.canvas_emu.unwrap_or((
            inches_to_emu(DEFAULT_CANVAS_IN.0),
            inches_to_emu(DEFAULT_CANVAS_IN.1),
        ));

        self.write_part("[Content_Types].xml", parts::content_types_xml(n)?.as_bytes(), Self::deflated())?;
        self.write_part("_rels/.rels", parts::package_rels_xml()?.as_bytes(), Self::deflated())?;
        let title = self.title.clone();
        self.write_part("docProps/core.xml", parts::core_props_xml(&title).as_bytes(), Self::deflated())?;
        self.write_part("docProps/app.xml", parts::app_props_xml(n).as_bytes(), Self::deflated())?;
        self.write_part(
            "ppt/presentation.xml",
            parts::presentation_xml(n, cx, cy)?.as_bytes(),
            Self::deflated(),
        )?;
        self.write_part(
            "ppt/_rels/presentation.xml.rels",
            parts::presentation_rels_xml(n)?.as_bytes(),
            Self::deflated(),
        )?;
        self.write_part(
            "ppt/slideMasters/slideMaster1.xml",
            parts::slide_master_xml().as_bytes(),
            Self::deflated(),
        )?;
        self.write_part(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            parts::slide_master_rels_xml()?.as_bytes(),
            Self::deflated(),
        )?;
        self.write_part(
            "ppt/slideLayouts/slideLayout1.xml",
            parts::slide_layout_xml().as_bytes(),
            Self::deflated(),
        )?;
        self.write_part(
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            parts::slide_layout_rels_xml()?.as_bytes(),
            Self::deflated(),
        )?;
        self.write_part("ppt/theme/theme1.xml", parts::theme_xml().as_bytes(), Self::deflated())?;
        self.write_part("ppt/presProps.xml", parts::pres_props_xml().as_bytes(), Self::deflated())?;
        self.write_part("ppt/viewProps.xml", parts::view_props_xml().as_bytes(), Self::deflated())?;
        self.write_part("ppt/tableStyles.xml", parts::table_styles_xml().as_bytes(), Self::deflated())?;

        let cursor = self.zip.finish()?;
        let bytes = cursor.into_inner();
        debug!("Serialised {} slides → {} bytes", n, bytes.len());
        Ok(bytes)
    }
}
