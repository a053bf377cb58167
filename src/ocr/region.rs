//! Region cropping.
//!
//! Panel rectangles are measured in pixels on a reference-resolution capture
//! and rescaled to whatever resolution the screenshot actually has.

use image::RgbaImage;

use crate::config::{RegionConfig, RelativeRect, SubsectionRect};
use crate::record::PanelLayout;

/// Crops a sub-region from an image using relative coordinates.
///
/// Converts the relative rect (0.0–1.0) to absolute pixel coordinates,
/// clamps to image bounds, and returns the cropped sub-image. A rect lying
/// entirely outside the image yields a zero-area image rather than a panic.
pub fn crop_region(img: &RgbaImage, region: &RelativeRect) -> RgbaImage {
    let (w, h) = img.dimensions();

    // `as u32` saturates negative and NaN values to 0
    let x0 = ((region.x * w as f32) as u32).min(w);
    let y0 = ((region.y * h as f32) as u32).min(h);
    let rw = ((region.width * w as f32) as u32).min(w - x0);
    let rh = ((region.height * h as f32) as u32).min(h - y0);

    image::imageops::crop_imm(img, x0, y0, rw, rh).to_image()
}

/// Crops the Powerplay panel for the given layout.
pub fn crop_panel(img: &RgbaImage, layout: PanelLayout, regions: &RegionConfig) -> RgbaImage {
    let rect = match layout {
        PanelLayout::Standard => regions.standard_panel,
        PanelLayout::Competitive => regions.competitive_panel,
    };
    crop_region(img, &rect.to_relative(regions.reference_width, regions.reference_height))
}

/// Subsection layout configured for a panel variant.
pub fn subsections(layout: PanelLayout, regions: &RegionConfig) -> &[SubsectionRect] {
    match layout {
        PanelLayout::Standard => &regions.standard_subsections,
        PanelLayout::Competitive => &regions.competitive_subsections,
    }
}

/// Crops one named subsection out of an already-cropped panel.
///
/// Returns `None` when the layout has no subsection with that name.
pub fn crop_subsection(
    panel: &RgbaImage,
    layout: PanelLayout,
    regions: &RegionConfig,
    name: &str,
) -> Option<RgbaImage> {
    subsections(layout, regions)
        .iter()
        .find(|s| s.name == name)
        .map(|s| crop_region(panel, &s.rect))
}

/// Crops every configured subsection of a panel, in configuration order.
pub fn crop_subsections(
    panel: &RgbaImage,
    layout: PanelLayout,
    regions: &RegionConfig,
) -> Vec<(String, RgbaImage)> {
    subsections(layout, regions)
        .iter()
        .map(|s| (s.name.clone(), crop_region(panel, &s.rect)))
        .collect()
}

/// True when a crop has no pixels to recognize.
pub fn is_empty(img: &RgbaImage) -> bool {
    img.width() == 0 || img.height() == 0
}
