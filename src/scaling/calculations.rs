//! Pure calculation functions for thumbnail geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use super::options::Dimensions;

/// Ratio of source width to the thumbnail's width along the same axis.
///
/// When the host rotates the thumbnail by a quarter turn, the source width
/// ends up along the physical height, so that axis is compared instead.
/// Returns `None` when the compared physical dimension is zero.
///
/// ```
/// # use thumbro::scaling::{Dimensions, shrink_factor};
/// assert_eq!(shrink_factor(4000, Dimensions::new(1000, 750), false), Some(4.0));
/// assert_eq!(shrink_factor(4000, Dimensions::new(750, 1000), true), Some(4.0));
/// ```
pub fn shrink_factor(source_width: u32, physical: Dimensions, rotated: bool) -> Option<f64> {
    let along = if rotated {
        physical.height
    } else {
        physical.width
    };
    if along == 0 {
        return None;
    }
    Some(f64::from(source_width) / f64::from(along))
}

/// Scale `source` to `target_width`, keeping the aspect ratio.
///
/// The height is rounded and never drops below one pixel. A target wider
/// than the source is clamped to the source width (no upscaling).
pub fn fit_to_width(source: Dimensions, target_width: u32) -> Dimensions {
    if source.width == 0 || source.height == 0 {
        return Dimensions::new(target_width, target_width);
    }
    let width = target_width.clamp(1, source.width);
    let height = (f64::from(source.height) * f64::from(width) / f64::from(source.width)).round();
    Dimensions::new(width, (height as u32).max(1))
}

/// Scale `source` to fit inside `bounds`, keeping the aspect ratio.
pub fn fit_within(source: Dimensions, bounds: Dimensions) -> Dimensions {
    let by_width = fit_to_width(source, bounds.width);
    if by_width.height <= bounds.height || source.height == 0 {
        return by_width;
    }
    let height = bounds.height.clamp(1, source.height);
    let width = (f64::from(source.width) * f64::from(height) / f64::from(source.height)).round();
    Dimensions::new((width as u32).max(1), height)
}
