//! Slide part assembly: pictures, text boxes and picture backgrounds.

use super::parts::{escape_xml, relationships_xml, Relationship, NS_A, NS_P, NS_R, REL_IMAGE, REL_SLIDE_LAYOUT};
use crate::error::Pdf2PptxError;
use crate::geometry::{inches_to_emu, Rect};
use std::fmt::Write as _;

/// A rectangle in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmuRect {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

impl EmuRect {
    /// Convert an inch-based rectangle.
    pub fn from_inches(r: Rect) -> Self {
        Self {
            x: inches_to_emu(r.x),
            y: inches_to_emu(r.y),
            cx: inches_to_emu(r.w).max(1),
            cy: inches_to_emu(r.h).max(1),
        }
    }
}

/// Accumulates the shapes and relationships of one slide.
#[derive(Debug)]
pub struct SlideBuilder {
    shapes: String,
    background_rel: Option<String>,
    rels: Vec<Relationship>,
    next_shape_id: u32,
}

impl Default for SlideBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SlideBuilder {
    pub fn new() -> Self {
        Self {
            shapes: String::with_capacity(1024),
            background_rel: None,
            rels: vec![Relationship::new(
                "rId1",
                REL_SLIDE_LAYOUT,
                "../slideLayouts/slideLayout1.xml",
            )],
            // id 1 is the shape tree itself
            next_shape_id: 2,
        }
    }

    /// Register a media part (path relative to `ppt/`) and return its rel id.
    pub fn add_image_rel(&mut self, media_name: &str) -> String {
        let id = format!("rId{}", self.rels.len() + 1);
        self.rels.push(Relationship::new(
            id.clone(),
            REL_IMAGE,
            format!("../media/{media_name}"),
        ));
        id
    }

    pub fn set_background(&mut self, rel_id: String) {
        self.background_rel = Some(rel_id);
    }

    pub fn shape_count(&self) -> usize {
        (self.next_shape_id - 2) as usize
    }

    fn take_shape_id(&mut self) -> u32 {
        let id = self.next_shape_id;
        self.next_shape_id += 1;
        id
    }

    /// Append a `p:pic` stretched over `frame`.
    pub fn push_picture(&mut self, rel_id: &str, frame: EmuRect) -> Result<(), Pdf2PptxError> {
        let id = self.take_shape_id();
        let xml = &mut self.shapes;
        xml.push_str("<p:pic>");
        write!(
            xml,
            r#"<p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>"#
        )?;
        write!(
            xml,
            r#"<p:blipFill><a:blip r:embed="{rel_id}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#
        )?;
        write_sp_pr(xml, frame)?;
        xml.push_str("</p:pic>");
        Ok(())
    }

    /// Append a text box. Lines in `content` become separate paragraphs.
    pub fn push_text(
        &mut self,
        content: &str,
        frame: EmuRect,
        font_size_pt: u32,
        colour: &str,
    ) -> Result<(), Pdf2PptxError> {
        let id = self.take_shape_id();
        let xml = &mut self.shapes;
        xml.push_str("<p:sp>");
        write!(
            xml,
            r#"<p:nvSpPr><p:cNvPr id="{id}" name="Text Box {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#
        )?;
        write_sp_pr(xml, frame)?;
        xml.push_str("<p:txBody>");
        xml.push_str(r#"<a:bodyPr wrap="none" lIns="0" tIns="0" rIns="0" bIns="0" rtlCol="0"><a:noAutofit/></a:bodyPr>"#);
        xml.push_str("<a:lstStyle/>");
        for line in content.lines() {
            xml.push_str("<a:p><a:r>");
            write!(
                xml,
                r#"<a:rPr lang="en-US" sz="{}" dirty="0"><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:rPr>"#,
                font_size_pt * 100,
                escape_xml(colour)
            )?;
            write!(xml, "<a:t>{}</a:t>", escape_xml(line))?;
            xml.push_str("</a:r></a:p>");
        }
        if content.lines().next().is_none() {
            // txBody needs at least one paragraph
            xml.push_str("<a:p/>");
        }
        xml.push_str("</p:txBody>");
        xml.push_str("</p:sp>");
        Ok(())
    }

    /// The complete `slideN.xml`.
    pub fn to_xml(&self) -> Result<String, Pdf2PptxError> {
        let mut xml = String::with_capacity(self.shapes.len() + 1024);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        write!(xml, r#"<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}">"#)?;
        xml.push_str("<p:cSld>");

        // The background must precede the shape tree.
        if let Some(ref rid) = self.background_rel {
            write!(
                xml,
                r#"<p:bg><p:bgPr><a:blipFill dpi="0" rotWithShape="1"><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></a:blipFill><a:effectLst/></p:bgPr></p:bg>"#
            )?;
        }

        xml.push_str("<p:spTree>");
        xml.push_str(r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#);
        xml.push_str(r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#);
        xml.push_str(&self.shapes);
        xml.push_str("</p:spTree>");
        xml.push_str("</p:cSld>");
        xml.push_str(r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>"#);
        xml.push_str("</p:sld>");
        Ok(xml)
    }

    /// The matching `slideN.xml.rels`.
    pub fn rels_xml(&self) -> Result<String, Pdf2PptxError> {
        relationships_xml(&self.rels)
    }
}

fn write_sp_pr(xml: &mut String, frame: EmuRect) -> Result<(), Pdf2PptxError> {
    write!(
        xml,
        r#"<p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr>"#,
        frame.x, frame.y, frame.cx, frame.cy
    )?;
    Ok(())
}
