//! Image encoding: `DynamicImage` → PNG or JPEG bytes wrapped in [`EncodedImage`].
//!
//! JPEG has no alpha channel, so rasters are flattened to RGB first. The
//! quality factor is carried as a fraction in `[0, 1]` and mapped onto the
//! encoder's 1–100 scale here.

use crate::artifact::{EncodedImage, ImageFormat};
use crate::config::ImageEncoding;
use crate::error::Pdf2PptxError;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page raster.
pub fn encode_image(
    img: &DynamicImage,
    encoding: ImageEncoding,
    page: usize,
) -> Result<EncodedImage, Pdf2PptxError> {
    let map_err = |e: image::ImageError| Pdf2PptxError::ImageEncoding {
        page,
        detail: e.to_string(),
    };

    let mut buf = Vec::new();
    match encoding {
        ImageEncoding::Png => {
            img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                .map_err(map_err)?;
        }
        ImageEncoding::Jpeg { quality } => {
            let rgb = img.to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality));
            rgb.write_with_encoder(encoder).map_err(map_err)?;
        }
    }

    debug!(
        "Encoded page {} as {} → {} bytes",
        page,
        encoding.mime_type(),
        buf.len()
    );

    Ok(EncodedImage {
        format: ImageFormat::from(encoding),
        bytes: buf,
        width_px: img.width(),
        height_px: img.height(),
    })
}

/// Map a `[0, 1]` quality fraction onto the encoder's `1..=100` range.
fn jpeg_quality(fraction: f32) -> u8 {
    (fraction * 100.0).round().clamp(1.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn encode_png() {
        let data = encode_image(&red_square(), ImageEncoding::Png, 1).expect("encode should succeed");
        assert_eq!(data.format, ImageFormat::Png);
        assert!(data.bytes.starts_with(&[0x89, b'P', b'N', b'G']));
        assert_eq!((data.width_px, data.height_px), (10, 10));
        assert!(data.data_uri().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn encode_jpeg_flattens_alpha() {
        let data = encode_image(&red_square(), ImageEncoding::Jpeg { quality: 0.82 }, 1)
            .expect("encode should succeed");
        assert_eq!(data.format, ImageFormat::Jpeg);
        assert!(data.bytes.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn quality_mapping() {
        assert_eq!(jpeg_quality(0.82), 82);
        assert_eq!(jpeg_quality(0.4), 40);
        assert_eq!(jpeg_quality(1.0), 100);
        assert_eq!(jpeg_quality(0.0), 1);
    }
}
