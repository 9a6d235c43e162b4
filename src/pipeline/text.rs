//! Text-layer mapping: decoder text runs → slide-space [`TextItem`]s.
//!
//! PDF text runs are positioned by their baseline in a bottom-left origin
//! space; slides use a top-left origin. Reported sizes are frequently missing
//! or zero, so each dimension has a floor derived from the font size.

use crate::artifact::TextItem;
use crate::geometry::to_inches;
use crate::source::TextRun;

/// Smallest font size a text box may get.
pub const MIN_FONT_SIZE_PT: f64 = 8.0;

/// Font size used when the run's own size is unknown or smaller.
pub const FALLBACK_FONT_SIZE_PT: f64 = 12.0;

/// Minimum advance per font-size unit for a box with no reported width.
const MIN_WIDTH_PER_PT: f64 = 0.4;

/// Map one run onto a text item, or `None` for blank runs.
pub fn map_text_run(run: &TextRun, page_height_pts: f64) -> Option<TextItem> {
    if run.content.trim().is_empty() {
        return None;
    }

    let vertical_scale = run.transform[3].abs();
    let font_size = MIN_FONT_SIZE_PT
        .max(vertical_scale)
        .max(run.height)
        .max(FALLBACK_FONT_SIZE_PT)
        .round();

    let width = run.width.max(font_size * MIN_WIDTH_PER_PT);
    let height = run.height.max(font_size);
    let x = run.transform[4].max(0.0);
    let y = (page_height_pts - run.transform[5] - height).max(0.0);

    Some(TextItem {
        content: run.content.clone(),
        x_in: to_inches(x),
        y_in: to_inches(y),
        width_in: to_inches(width),
        height_in: to_inches(height),
        font_size_pt: font_size as u32,
    })
}

/// Map every run on a page, dropping blanks. Order is preserved.
pub fn map_text_runs(runs: &[TextRun], page_height_pts: f64) -> Vec<TextItem> {
    runs.iter()
        .filter_map(|run| map_text_run(run, page_height_pts))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(content: &str, d: f64, e: f64, f: f64, width: f64, height: f64) -> TextRun {
        TextRun {
            content: content.to_string(),
            transform: [d, 0.0, 0.0, d, e, f],
            width,
            height,
        }
    }

    #[test]
    fn small_scale_without_height_gets_twelve() {
        let item = map_text_run(&run("Hi", 6.0, 72.0, 700.0, 0.0, 0.0), 792.0).unwrap();
        assert_eq!(item.font_size_pt, 12);
    }

    #[test]
    fn large_runs_keep_their_size() {
        let item = map_text_run(&run("Title", 28.4, 72.0, 700.0, 90.0, 0.0), 792.0).unwrap();
        assert_eq!(item.font_size_pt, 28);
        let item = map_text_run(&run("Tall", 10.0, 0.0, 0.0, 0.0, 30.6), 792.0).unwrap();
        assert_eq!(item.font_size_pt, 31);
    }

    #[test]
    fn negative_vertical_scale_uses_magnitude() {
        let item = map_text_run(&run("flipped", -20.0, 0.0, 100.0, 0.0, 0.0), 792.0).unwrap();
        assert_eq!(item.font_size_pt, 20);
    }

    #[test]
    fn font_size_never_below_eight() {
        for d in [0.0, 1.0, 7.9, -3.0] {
            let item = map_text_run(&run("x", d, 0.0, 0.0, 0.0, 0.0), 100.0).unwrap();
            assert!(item.font_size_pt >= 8);
        }
    }

    #[test]
    fn geometry_in_inches_with_top_left_origin() {
        // 12pt text whose baseline sits 72pt above the bottom of a Letter page.
        let item = map_text_run(&run("Body", 12.0, 72.0, 72.0, 144.0, 12.0), 792.0).unwrap();
        assert!((item.x_in - 1.0).abs() < 1e-9);
        assert!((item.y_in - (792.0 - 72.0 - 12.0) / 72.0).abs() < 1e-9);
        assert!((item.width_in - 2.0).abs() < 1e-9);
        assert!((item.height_in - 12.0 / 72.0).abs() < 1e-9);
    }

    #[test]
    fn missing_width_gets_a_floor() {
        let item = map_text_run(&run("w", 12.0, 0.0, 0.0, 0.0, 0.0), 792.0).unwrap();
        assert!((item.width_in - 12.0 * 0.4 / 72.0).abs() < 1e-9);
    }

    #[test]
    fn positions_are_clamped_to_the_page() {
        let item = map_text_run(&run("off", 12.0, -30.0, 900.0, 10.0, 12.0), 792.0).unwrap();
        assert_eq!(item.x_in, 0.0);
        assert_eq!(item.y_in, 0.0);
    }

    #[test]
    fn blank_runs_are_dropped() {
        let runs = vec![
            run("  ", 12.0, 0.0, 0.0, 0.0, 0.0),
            run("\n\t", 12.0, 0.0, 0.0, 0.0, 0.0),
            run("kept", 12.0, 0.0, 0.0, 0.0, 0.0),
            run("", 12.0, 0.0, 0.0, 0.0, 0.0),
        ];
        let items = map_text_runs(&runs, 792.0);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content, "kept");
    }
}
