//! Input validation: decide whether a candidate file is worth converting.
//!
//! The checks mirror what a file picker would enforce before handing bytes to
//! the engine: it must exist, look like a PDF by MIME type or extension, and
//! fit under the size limit. The `%PDF-` header is checked separately on the
//! bytes themselves so callers get a meaningful error rather than a decoder
//! failure.

use crate::error::Pdf2PptxError;
use std::path::Path;
use tracing::debug;

pub use crate::config::MAX_INPUT_BYTES;

/// MIME type that identifies a PDF regardless of its file name.
pub const PDF_MIME: &str = "application/pdf";

/// Validate a candidate by name, optional MIME type and size.
///
/// A file passes the type check when its MIME type is `application/pdf` *or*
/// its name ends in `.pdf` (any case).
pub fn validate_source(
    name: &str,
    mime: Option<&str>,
    size: u64,
    limit: u64,
) -> Result<(), Pdf2PptxError> {
    let is_pdf = mime.is_some_and(|m| m.eq_ignore_ascii_case(PDF_MIME))
        || name.to_ascii_lowercase().ends_with(".pdf");
    if !is_pdf {
        return Err(Pdf2PptxError::UnsupportedFileType {
            name: name.to_string(),
        });
    }
    if size > limit {
        return Err(Pdf2PptxError::FileTooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// How far into the file the `%PDF-` header may start.
pub const HEADER_SEARCH_WINDOW: usize = 1024;

/// Verify that a `%PDF-` header starts within the first
/// [`HEADER_SEARCH_WINDOW`] bytes.
///
/// Readers tolerate leading junk (a BOM, blank lines, a mail header), so
/// the header need not sit at offset 0.
pub fn check_magic(bytes: &[u8]) -> Result<(), Pdf2PptxError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    match window.windows(5).position(|w| w == b"%PDF-") {
        Some(0) => Ok(()),
        Some(offset) => {
            debug!("PDF header found at offset {}", offset);
            Ok(())
        }
        None => Err(Pdf2PptxError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        }),
    }
}

/// Read a local PDF, applying the same checks as [`validate_source`].
pub async fn read_source(path: &Path, limit: u64) -> Result<Vec<u8>, Pdf2PptxError> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| map_open_error(path, e))?;
    if !meta.is_file() {
        return Err(Pdf2PptxError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    validate_source(&name, None, meta.len(), limit)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| map_open_error(path, e))?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

fn map_open_error(path: &Path, e: std::io::Error) -> Pdf2PptxError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        Pdf2PptxError::PermissionDenied {
            path: path.to_path_buf(),
        }
    } else {
        Pdf2PptxError::FileNotFound {
            path: path.to_path_buf(),
        }
    }
}
