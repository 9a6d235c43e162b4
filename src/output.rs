//! Output types returned by the conversion entry points.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// Name used when the source has no usable file name.
pub const DEFAULT_OUTPUT_STEM: &str = "pdf2pptx-export";

/// The finished presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Bytes of the `.pptx` container.
    #[serde(with = "crate::protocol::base64_bytes")]
    pub output_bytes: Vec<u8>,

    /// Suggested download / file name, always ending in `.pptx`.
    pub output_name: String,

    /// Run statistics.
    pub stats: ConversionStats,
}

/// Statistics about a finished conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Slides written to the deck; equals `total_pages` on success.
    pub slides: usize,
    /// Hybrid pages that lost one of their two layers.
    pub degraded_pages: Vec<PageError>,
    /// Size of the `.pptx` container in bytes.
    pub output_size: usize,
    /// Wall-clock time of the whole run.
    pub duration_ms: u64,
}

/// What [`crate::inspect`] learns about a PDF without rendering it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Natural size of page 1 in points; this becomes the slide canvas.
    pub first_page_width_pts: f64,
    pub first_page_height_pts: f64,
    /// The name the converted deck would be given.
    pub output_name: String,
}

/// Derive the output file name from the source name.
///
/// Any directory component (`/` or `\`) is stripped. A name already ending in
/// `.pptx` is kept, a trailing `.pdf` (any case) becomes `.pptx`, and anything
/// else gets `.pptx` appended. Missing or empty names map to
/// `pdf2pptx-export.pptx`.
pub fn to_pptx_name(source_name: Option<&str>) -> String {
    let base = source_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .filter(|base| !base.is_empty())
        .unwrap_or(DEFAULT_OUTPUT_STEM);

    let lower = base.to_ascii_lowercase();
    if lower.ends_with(".pptx") {
        base.to_string()
    } else if lower.ends_with(".pdf") {
        format!("{}.pptx", &base[..base.len() - 4])
    } else {
        format!("{base}.pptx")
    }
}

/// Human-readable byte size: `0 B`, `512 B`, `1.5 KB`, `12 MB`.
///
/// One decimal below 10 units, none at or above, and never for plain bytes.
pub fn format_bytes(bytes: u64) -> String {
    const SIZES: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut i = 0usize;
    let mut value = bytes as f64;
    while value >= 1024.0 && i < SIZES.len() - 1 {
        value /= 1024.0;
        i += 1;
    }
    if value >= 10.0 || i == 0 {
        format!("{value:.0} {}", SIZES[i])
    } else {
        format!("{value:.1} {}", SIZES[i])
    }
}
