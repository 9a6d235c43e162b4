//! Per-page render products handed from the page renderer to the deck builder.
//!
//! Every geometric value on a page artifact is in one of two units only:
//! page sizes in points (so the deck can fit them against its canvas) and
//! text-item geometry in inches (already in slide space).

use crate::config::ImageEncoding;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Raster format of an [`EncodedImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }
}

impl From<ImageEncoding> for ImageFormat {
    fn from(enc: ImageEncoding) -> Self {
        match enc {
            ImageEncoding::Png => ImageFormat::Png,
            ImageEncoding::Jpeg { .. } => ImageFormat::Jpeg,
        }
    }
}

/// An encoded page raster.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedImage {
    pub format: ImageFormat,
    #[serde(with = "crate::protocol::base64_bytes")]
    pub bytes: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>` form of the image.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            STANDARD.encode(&self.bytes)
        )
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .finish()
    }
}

/// A positioned piece of text on a hybrid slide. Geometry is in inches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub content: String,
    pub x_in: f64,
    pub y_in: f64,
    pub width_in: f64,
    pub height_in: f64,
    /// Never below 8.
    pub font_size_pt: u32,
}

/// Strategy A output: the whole page as one picture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSlide {
    pub width_pts: f64,
    pub height_pts: f64,
    pub image: EncodedImage,
}

/// Strategy B output: optional background plus editable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridSlide {
    pub width_pts: f64,
    pub height_pts: f64,
    /// `None` when the background raster failed and the page was kept as text only.
    pub background: Option<EncodedImage>,
    pub text_items: Vec<TextItem>,
}

/// What the page renderer produces for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageArtifact {
    Image(ImageSlide),
    Hybrid(HybridSlide),
}

impl PageArtifact {
    /// Natural page size in points `(width, height)`.
    pub fn page_size(&self) -> (f64, f64) {
        match self {
            PageArtifact::Image(s) => (s.width_pts, s.height_pts),
            PageArtifact::Hybrid(s) => (s.width_pts, s.height_pts),
        }
    }
}
