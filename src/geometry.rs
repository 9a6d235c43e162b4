//! Unit conversion and frame fitting between PDF page space and slide space.
//!
//! PDF geometry is expressed in points (1/72 inch). PresentationML stores
//! positions in English Metric Units, but every public slide coordinate in
//! this crate is kept in inches and converted to EMU only when XML is written.

use serde::{Deserialize, Serialize};

/// Points per inch, the PDF user-space unit.
pub const POINTS_PER_INCH: f64 = 72.0;

/// English Metric Units per inch, the OOXML drawing unit.
pub const EMU_PER_INCH: i64 = 914_400;

/// Smallest slide side PowerPoint opens (1 in).
pub const MIN_SLIDE_PTS: f64 = 72.0;

/// Largest slide side PowerPoint opens (56 in).
pub const MAX_SLIDE_PTS: f64 = 4032.0;

/// Convert PDF points to inches.
pub fn to_inches(points: f64) -> f64 {
    points / POINTS_PER_INCH
}

/// Convert inches to EMU, rounding to the nearest unit.
pub fn inches_to_emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH as f64).round() as i64
}

/// Convert PDF points straight to EMU.
pub fn points_to_emu(points: f64) -> i64 {
    inches_to_emu(to_inches(points))
}

/// An axis-aligned rectangle with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Convert a rectangle expressed in points into inches.
    pub fn to_inches(self) -> Rect {
        Rect {
            x: to_inches(self.x),
            y: to_inches(self.y),
            w: to_inches(self.w),
            h: to_inches(self.h),
        }
    }
}

/// Fit a `src_w × src_h` rectangle inside `dst_w × dst_h`, preserving the
/// aspect ratio and centring the result.
///
/// `src_w` and `src_h` must be positive; page sizes always are.
pub fn fit_rect(src_w: f64, src_h: f64, dst_w: f64, dst_h: f64) -> Rect {
    let scale = (dst_w / src_w).min(dst_h / src_h);
    let w = src_w * scale;
    let h = src_h * scale;
    Rect {
        x: (dst_w - w) / 2.0,
        y: (dst_h - h) / 2.0,
        w,
        h,
    }
}

/// Bring a slide size into `[MIN_SLIDE_PTS, MAX_SLIDE_PTS]` on both sides.
///
/// Sizes already in range come back unchanged. Otherwise the size is scaled
/// uniformly first (down when the long side is too big, up when the short
/// side is too small and the long side has room), then each side is clamped.
/// Only extreme aspect ratios lose their shape. Non-positive or non-finite
/// sides become [`MIN_SLIDE_PTS`].
pub fn constrain_canvas(width_pts: f64, height_pts: f64) -> (f64, f64) {
    let sane = |v: f64| if v.is_finite() && v > 0.0 { v } else { MIN_SLIDE_PTS };
    let (mut w, mut h) = (sane(width_pts), sane(height_pts));

    let long = w.max(h);
    let short = w.min(h);
    if long > MAX_SLIDE_PTS {
        let s = MAX_SLIDE_PTS / long;
        w *= s;
        h *= s;
    } else if short < MIN_SLIDE_PTS {
        let s = (MIN_SLIDE_PTS / short).min(MAX_SLIDE_PTS / long);
        w *= s;
        h *= s;
    }
    (
        w.clamp(MIN_SLIDE_PTS, MAX_SLIDE_PTS),
        h.clamp(MIN_SLIDE_PTS, MAX_SLIDE_PTS),
    )
}
