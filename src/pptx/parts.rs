//! Package-level parts: everything in the `.pptx` that is not a slide.
//!
//! The master, layout and theme are the smallest that PowerPoint, Keynote and
//! LibreOffice all open without repair prompts. Slides never use placeholders,
//! so one blank layout is enough.

use crate::error::Pdf2PptxError;
use std::fmt::Write as _;

pub const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const REL_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// First slide id in `p:sldIdLst`; PowerPoint requires ids ≥ 256.
pub const FIRST_SLIDE_ID: u32 = 256;
/// Slide-master id; master and layout ids share a range starting at 2^31.
pub const MASTER_ID: u64 = 2_147_483_648;
const LAYOUT_ID: u64 = MASTER_ID + 1;

/// Relationship ids from `presentation.xml` to its fixed parts. Slides
/// follow from `rId6`.
const FIXED_PRESENTATION_RELS: usize = 5;

/// Relationship id of the `index`-th (0-based) slide in `presentation.xml.rels`.
pub fn slide_rel_id(index: usize) -> String {
    format!("rId{}", FIXED_PRESENTATION_RELS + 1 + index)
}

/// Escape XML special characters and drop code points XML 1.0 forbids.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

/// One `Relationship` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

impl Relationship {
    pub fn new(id: impl Into<String>, rel_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type.into(),
            target: target.into(),
        }
    }
}

/// Serialise a `.rels` part.
pub fn relationships_xml(rels: &[Relationship]) -> Result<String, Pdf2PptxError> {
    let mut xml = String::with_capacity(256 + rels.len() * 160);
    xml.push_str(XML_DECL);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for rel in rels {
        write!(
            xml,
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            rel.id,
            rel.rel_type,
            escape_xml(&rel.target)
        )?;
    }
    xml.push_str("</Relationships>");
    Ok(xml)
}

/// `[Content_Types].xml` for `slide_count` slides.
pub fn content_types_xml(slide_count: usize) -> Result<String, Pdf2PptxError> {
    let mut xml = String::with_capacity(2048 + slide_count * 160);
    xml.push_str(XML_DECL);
    xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    xml.push_str(r#"<Default Extension="png" ContentType="image/png"/>"#);
    xml.push_str(r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#);

    let overrides: [(&str, &str); 9] = [
        ("/ppt/presentation.xml", "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"),
        ("/ppt/slideMasters/slideMaster1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"),
        ("/ppt/slideLayouts/slideLayout1.xml", "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"),
        ("/ppt/theme/theme1.xml", "application/vnd.openxmlformats-officedocument.theme+xml"),
        ("/ppt/presProps.xml", "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml"),
        ("/ppt/viewProps.xml", "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml"),
        ("/ppt/tableStyles.xml", "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml"),
        ("/docProps/core.xml", "application/vnd.openxmlformats-package.core-properties+xml"),
        ("/docProps/app.xml", "application/vnd.openxmlformats-officedocument.extended-properties+xml"),
    ];
    for (part, ct) in overrides {
        write!(xml, r#"<Override PartName="{part}" ContentType="{ct}"/>"#)?;
    }
    for n in 1..=slide_count {
        write!(
            xml,
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        )?;
    }
    xml.push_str("</Types>");
    Ok(xml)
}

/// `_rels/.rels`.
pub fn package_rels_xml() -> Result<String, Pdf2PptxError> {
    relationships_xml(&[
        Relationship::new("rId1", format!("{REL_BASE}/officeDocument"), "ppt/presentation.xml"),
        Relationship::new(
            "rId2",
            "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties",
            "docProps/core.xml",
        ),
        Relationship::new("rId3", format!("{REL_BASE}/extended-properties"), "docProps/app.xml"),
    ])
}

/// `ppt/_rels/presentation.xml.rels`.
pub fn presentation_rels_xml(slide_count: usize) -> Result<String, Pdf2PptxError> {
    let mut rels = vec![
        Relationship::new("rId1", format!("{REL_BASE}/slideMaster"), "slideMasters/slideMaster1.xml"),
        Relationship::new("rId2", format!("{REL_BASE}/presProps"), "presProps.xml"),
        Relationship::new("rId3", format!("{REL_BASE}/viewProps"), "viewProps.xml"),
        Relationship::new("rId4", format!("{REL_BASE}/theme"), "theme/theme1.xml"),
        Relationship::new("rId5", format!("{REL_BASE}/tableStyles"), "tableStyles.xml"),
    ];
    for i in 0..slide_count {
        rels.push(Relationship::new(
            slide_rel_id(i),
            REL_SLIDE,
            format!("slides/slide{}.xml", i + 1),
        ));
    }
    relationships_xml(&rels)
}

/// `ppt/presentation.xml` with the canvas size in EMU.
pub fn presentation_xml(slide_count: usize, cx: i64, cy: i64) -> Result<String, Pdf2PptxError> {
    let mut xml = String::with_capacity(1024 + slide_count * 48);
    xml.push_str(XML_DECL);
    write!(
        xml,
        r#"<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1">"#
    )?;
    write!(
        xml,
        r#"<p:sldMasterIdLst><p:sldMasterId id="{MASTER_ID}" r:id="rId1"/></p:sldMasterIdLst>"#
    )?;
    xml.push_str("<p:sldIdLst>");
    for i in 0..slide_count {
        write!(
            xml,
            r#"<p:sldId id="{}" r:id="{}"/>"#,
            FIRST_SLIDE_ID as usize + i,
            slide_rel_id(i)
        )?;
    }
    xml.push_str("</p:sldIdLst>");
    write!(xml, r#"<p:sldSz cx="{cx}" cy="{cy}"/>"#)?;
    xml.push_str(r#"<p:notesSz cx="6858000" cy="9144000"/>"#);
    xml.push_str("</p:presentation>");
    Ok(xml)
}

/// `ppt/slideMasters/slideMaster1.xml`.
pub fn slide_master_xml() -> String {
    format!(
        concat!(
            r#"{decl}<p:sldMaster xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}">"#,
            r#"<p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>"#,
            r#"<p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
            r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
            r#"</p:spTree></p:cSld>"#,
            r#"<p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>"#,
            r#"<p:sldLayoutIdLst><p:sldLayoutId id="{layout}" r:id="rId1"/></p:sldLayoutIdLst>"#,
            r#"<p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles>"#,
            r#"</p:sldMaster>"#
        ),
        decl = XML_DECL,
        a = NS_A,
        r = NS_R,
        p = NS_P,
        layout = LAYOUT_ID,
    )
}

/// `ppt/slideMasters/_rels/slideMaster1.xml.rels`.
pub fn slide_master_rels_xml() -> Result<String, Pdf2PptxError> {
    relationships_xml(&[
        Relationship::new("rId1", REL_SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
        Relationship::new("rId2", format!("{REL_BASE}/theme"), "../theme/theme1.xml"),
    ])
}

/// `ppt/slideLayouts/slideLayout1.xml`: a blank layout.
pub fn slide_layout_xml() -> String {
    format!(
        concat!(
            r#"{decl}<p:sldLayout xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}" type="blank" preserve="1">"#,
            r#"<p:cSld name="Blank"><p:spTree>"#,
            r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
            r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
            r#"</p:spTree></p:cSld>"#,
            r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>"#,
            r#"</p:sldLayout>"#
        ),
        decl = XML_DECL,
        a = NS_A,
        r = NS_R,
        p = NS_P,
    )
}

/// `ppt/slideLayouts/_rels/slideLayout1.xml.rels`.
pub fn slide_layout_rels_xml() -> Result<String, Pdf2PptxError> {
    relationships_xml(&[Relationship::new(
        "rId1",
        format!("{REL_BASE}/slideMaster"),
        "../slideMasters/slideMaster1.xml",
    )])
}

/// `ppt/theme/theme1.xml`.
pub fn theme_xml() -> String {
    let mut xml = String::with_capacity(4096);
    xml.push_str(XML_DECL);
    xml.push_str(r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements>"#);

    xml.push_str(r#"<a:clrScheme name="Office">"#);
    xml.push_str(r#"<a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>"#);
    xml.push_str(r#"<a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>"#);
    for (name, rgb) in [
        ("dk2", "44546A"),
        ("lt2", "E7E6E6"),
        ("accent1", "4472C4"),
        ("accent2", "ED7D31"),
        ("accent3", "A5A5A5"),
        ("accent4", "FFC000"),
        ("accent5", "5B9BD5"),
        ("accent6", "70AD47"),
        ("hlink", "0563C1"),
        ("folHlink", "954F72"),
    ] {
        xml.push_str(&format!(r#"<a:{name}><a:srgbClr val="{rgb}"/></a:{name}>"#));
    }
    xml.push_str("</a:clrScheme>");

    xml.push_str(r#"<a:fontScheme name="Office">"#);
    for slot in ["majorFont", "minorFont"] {
        xml.push_str(&format!(
            r#"<a:{slot}><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:{slot}>"#
        ));
    }
    xml.push_str("</a:fontScheme>");

    xml.push_str(r#"<a:fmtScheme name="Office"><a:fillStyleLst>"#);
    for _ in 0..3 {
        xml.push_str(r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#);
    }
    xml.push_str("</a:fillStyleLst><a:lnStyleLst>");
    for w in [6350, 12700, 19050] {
        xml.push_str(&format!(
            r#"<a:ln w="{w}"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#
        ));
    }
    xml.push_str("</a:lnStyleLst><a:effectStyleLst>");
    for _ in 0..3 {
        xml.push_str("<a:effectStyle><a:effectLst/></a:effectStyle>");
    }
    xml.push_str("</a:effectStyleLst><a:bgFillStyleLst>");
    for _ in 0..3 {
        xml.push_str(r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#);
    }
    xml.push_str("</a:bgFillStyleLst></a:fmtScheme>");

    xml.push_str("</a:themeElements></a:theme>");
    xml
}

/// `ppt/presProps.xml`.
pub fn pres_props_xml() -> String {
    format!(r#"{XML_DECL}<p:presentationPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"/>"#)
}

/// `ppt/viewProps.xml`.
pub fn view_props_xml() -> String {
    format!(
        r#"{XML_DECL}<p:viewPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:gridSpacing cx="76200" cy="76200"/></p:viewPr>"#
    )
}

/// `ppt/tableStyles.xml`.
pub fn table_styles_xml() -> String {
    format!(
        r#"{XML_DECL}<a:tblStyleLst xmlns:a="{NS_A}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#
    )
}

/// `docProps/core.xml`.
pub fn core_props_xml(title: &str) -> String {
    format!(
        concat!(
            r#"{decl}<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
            r#"<dc:title>{title}</dc:title><dc:creator>{creator}</dc:creator>"#,
            r#"</cp:coreProperties>"#
        ),
        decl = XML_DECL,
        title = escape_xml(title),
        creator = env!("CARGO_PKG_NAME"),
    )
}

/// `docProps/app.xml`.
pub fn app_props_xml(slide_count: usize) -> String {
    format!(
        concat!(
            r#"{decl}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" "#,
            r#"xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#,
            r#"<Application>{app} {version}</Application><Slides>{slides}</Slides>"#,
            r#"</Properties>"#
        ),
        decl = XML_DECL,
        app = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        slides = slide_count,
    )
}
