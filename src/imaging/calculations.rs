//! Pure calculation functions for output geometry and size statistics.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::catalog::FitMode;

/// Calculate output dimensions for fitting `source` into the `target` box.
///
/// Both modes anchor on the target width first and fall back to the target
/// height when the width-anchored height lands on the wrong side of the box:
///
/// - [`FitMode::Cover`]: result is at least the box on both axes, equal on one.
/// - [`FitMode::Contain`]: result is at most the box on both axes, equal on one.
///
/// Returns `None` for a degenerate source with a zero dimension. Axes that
/// would round to zero (extreme aspect ratios) are clamped to one pixel.
///
/// # Examples
/// ```
/// # use storeimg::catalog::FitMode;
/// # use storeimg::imaging::calculate_fit_dimensions;
/// // 4000x3000 covering 300x300 → 400x300
/// assert_eq!(calculate_fit_dimensions((4000, 3000), (300, 300), FitMode::Cover), Some((400, 300)));
///
/// // 800x600 contained in 800x450 → 600x450
/// assert_eq!(calculate_fit_dimensions((800, 600), (800, 450), FitMode::Contain), Some((600, 450)));
/// ```
pub fn calculate_fit_dimensions(
    source: (u32, u32),
    target: (u32, u32),
    fit: FitMode,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    if src_w == 0 || src_h == 0 {
        return None;
    }

    let aspect = src_w as f64 / src_h as f64;

    let w = tgt_w;
    let h = (w as f64 / aspect).round() as u32;

    let height_anchored = match fit {
        FitMode::Cover => h < tgt_h,
        FitMode::Contain => h > tgt_h,
    };

    let (w, h) = if height_anchored {
        let h = tgt_h;
        ((h as f64 * aspect).round() as u32, h)
    } else {
        (w, h)
    };

    Some((w.max(1), h.max(1)))
}

/// Percentage of bytes saved going from `original` to `compressed`.
///
/// Negative when the output is larger. Zero for an empty original.
pub fn reduction_percent(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (original as f64 - compressed as f64) / original as f64 * 100.0
}
