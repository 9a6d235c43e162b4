//! Pipeline stages for PDF-to-PPTX conversion.
//!
//! Each submodule implements one transformation step and is independently
//! testable. The controller that sequences them lives in [`crate::convert`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ source ──▶ render ──┬──▶ encode ──▶ deck
//! (checks)  (decode)   (A / B)  └──▶ text   ──▶ deck
//! ```
//!
//! 1. [`input`]  — name / MIME / size / `%PDF` checks before decoding
//! 2. [`render`] — Strategy A (whole-page picture) or B (background + text)
//! 3. [`encode`] — PNG or JPEG encoding of page rasters
//! 4. [`text`]   — PDF text runs → slide-space text boxes

pub mod encode;
pub mod input;
pub mod render;
pub mod text;
