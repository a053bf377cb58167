//! Initial control points from the status bar marker.
//!
//! Standard panels draw a horizontal bar spanning 0 to 2,000,000 control
//! points with a small white marker at the system's value at the start of
//! the cycle. The marker position is read from pixels, not from OCR text.

use image::RgbaImage;

use super::preprocess::threshold_bright_pixels;
use super::region::crop_region;
use crate::config::RegionConfig;

/// Control points at the right end of the bar.
pub const MAX_CONTROL_POINTS: u64 = 2_000_000;

/// Channel value all of R, G and B must exceed for a marker pixel.
const MARKER_BRIGHTNESS: u8 = 200;

/// Maps a marker offset within a bar of `bar_width` pixels linearly onto
/// `0..=MAX_CONTROL_POINTS`, clamped at both ends.
pub fn control_points_from_offset(offset: f32, bar_width: u32) -> u64 {
    if bar_width == 0 || !offset.is_finite() {
        return 0;
    }
    let fraction = (offset as f64 / bar_width as f64).clamp(0.0, 1.0);
    (fraction * MAX_CONTROL_POINTS as f64).round() as u64
}

/// Horizontal position of the marker: the mean of all columns that contain
/// a bright pixel. `None` when the bar has no bright pixels.
pub fn find_marker(bar: &RgbaImage) -> Option<f32> {
    let mask = threshold_bright_pixels(bar, MARKER_BRIGHTNESS);

    let columns: Vec<u32> = (0..mask.width())
        .filter(|&x| (0..mask.height()).any(|y| mask.get_pixel(x, y)[0] == 0))
        .collect();

    if columns.is_empty() {
        return None;
    }
    Some(columns.iter().sum::<u32>() as f32 / columns.len() as f32)
}

/// Reads the initial control points from a cropped standard panel.
pub fn initial_control_points(panel: &RgbaImage, regions: &RegionConfig) -> Option<u64> {
    let bar = crop_region(panel, &regions.control_bar);
    let offset = find_marker(&bar)?;
    Some(control_points_from_offset(offset, bar.width()))
}
