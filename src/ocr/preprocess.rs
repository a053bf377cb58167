//! Image preprocessing for OCR.
//!
//! The Powerplay panel is light text on a dark, slightly noisy background.
//! Each [`PreprocessMethod`] is a deterministic transform from a cropped RGBA
//! region to the grayscale image handed to Tesseract. Choosing which methods
//! to try, and in which order, is the extraction driver's job.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
use imageproc::distance_transform::Norm;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::PreprocessConfig;

/// Named preprocessing pipelines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprocessMethod {
    /// Grayscale only.
    None,
    /// Cubic upscale, light denoise, sharpen.
    Upscale,
    /// Denoise, then Otsu binarization.
    Threshold,
    /// Tile-based contrast-limited equalization, then light denoise.
    Clahe,
    /// CLAHE, adaptive threshold, one dilation pass.
    Enhanced,
}

impl PreprocessMethod {
    pub fn name(self) -> &'static str {
        match self {
            PreprocessMethod::None => "none",
            PreprocessMethod::Upscale => "upscale",
            PreprocessMethod::Threshold => "threshold",
            PreprocessMethod::Clahe => "clahe",
            PreprocessMethod::Enhanced => "enhanced",
        }
    }
}

impl fmt::Display for PreprocessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Applies `method` to a cropped region.
pub fn preprocess(img: &RgbaImage, method: PreprocessMethod, config: &PreprocessConfig) -> GrayImage {
    let gray = imageops::grayscale(img);
    if gray.width() == 0 || gray.height() == 0 {
        return gray;
    }

    match method {
        PreprocessMethod::None => gray,
        PreprocessMethod::Upscale => upscale(&gray, config.upscale_factor),
        PreprocessMethod::Threshold => otsu_binarize(&median_denoise(&gray)),
        PreprocessMethod::Clahe => {
            let equalized = clahe(&gray, config.clahe_clip_limit, config.clahe_tiles);
            light_denoise(&equalized)
        }
        PreprocessMethod::Enhanced => {
            let equalized = clahe(&gray, config.clahe_clip_limit, config.clahe_tiles);
            let binary = adaptive_threshold(&equalized, config.adaptive_radius, config.adaptive_offset);
            imageproc::morphology::dilate(&binary, Norm::LInf, 1)
        }
    }
}

/// Converts image to binary by keeping only bright pixels.
///
/// Pixels where R > threshold AND G > threshold AND B > threshold become black.
/// All other pixels become white (background).
///
/// Used to isolate the white control-bar marker from the coloured bar.
pub fn threshold_bright_pixels(img: &RgbaImage, threshold: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let Rgba([r, g, b, _]) = *pixel;
        let value = if r > threshold && g > threshold && b > threshold {
            0u8
        } else {
            255u8
        };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

fn upscale(gray: &GrayImage, factor: u32) -> GrayImage {
    let factor = factor.clamp(2, 3);
    let (w, h) = gray.dimensions();
    let resized = imageops::resize(gray, w * factor, h * factor, FilterType::CatmullRom);
    let denoised = median_denoise(&resized);
    imageproc::filter::sharpen3x3(&denoised)
}

fn median_denoise(gray: &GrayImage) -> GrayImage {
    imageproc::filter::median_filter(gray, 1, 1)
}

fn light_denoise(gray: &GrayImage) -> GrayImage {
    imageproc::filter::gaussian_blur_f32(gray, 0.6)
}

/// Global Otsu threshold: pixels above the level become white.
fn otsu_binarize(gray: &GrayImage) -> GrayImage {
    let level = imageproc::contrast::otsu_level(gray);
    binarize(gray, |value, _, _| value > level)
}

/// Local-mean threshold: a pixel is white when brighter than the mean of
/// its `(2r+1)²` neighbourhood minus `offset`.
fn adaptive_threshold(gray: &GrayImage, radius: u32, offset: i16) -> GrayImage {
    let radius = radius.min(gray.width().min(gray.height()) / 2).max(1);
    let mean = imageproc::filter::box_filter(gray, radius, radius);
    binarize(gray, |value, x, y| {
        value as i16 > mean.get_pixel(x, y)[0] as i16 - offset
    })
}

fn binarize(gray: &GrayImage, is_foreground: impl Fn(u8, u32, u32) -> bool) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if is_foreground(gray.get_pixel(x, y)[0], x, y) {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `tiles` x `tiles` grid. Each tile gets its own
/// equalization table from a histogram clipped at `clip_limit` times the
/// uniform bin height, with the clipped excess spread over all bins. Pixels
/// are mapped by bilinear blending of the four nearest tile tables.
fn clahe(gray: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let tile_w = w.div_ceil(tiles.clamp(1, w));
    let tile_h = h.div_ceil(tiles.clamp(1, h));
    let tiles_x = w.div_ceil(tile_w);
    let tiles_y = h.div_ceil(tile_h);

    let mut tables = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            tables.push(equalization_table(&mut hist, (x1 - x0) * (y1 - y0), clip_limit));
        }
    }

    // Position of a pixel in tile-centre coordinates, split into the lower
    // tile index and the blend weight towards the next tile.
    let locate = |pos: u32, tile: u32, count: u32| -> (u32, u32, f32) {
        let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
        let lower = (f.floor().max(0.0) as u32).min(count - 1);
        let upper = (lower + 1).min(count - 1);
        let weight = (f - lower as f32).clamp(0.0, 1.0);
        (lower, upper, weight)
    };

    GrayImage::from_fn(w, h, |x, y| {
        let value = gray.get_pixel(x, y)[0] as usize;
        let (tx0, tx1, ax) = locate(x, tile_w, tiles_x);
        let (ty0, ty1, ay) = locate(y, tile_h, tiles_y);
        let at = |tx: u32, ty: u32| tables[(ty * tiles_x + tx) as usize][value] as f32;

        let top = at(tx0, ty0) * (1.0 - ax) + at(tx1, ty0) * ax;
        let bottom = at(tx0, ty1) * (1.0 - ax) + at(tx1, ty1) * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

fn equalization_table(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let limit = (clip_limit * area as f32 / 256.0).max(1.0) as u32;

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let bonus = excess / 256;
    let mut remainder = excess % 256;
    for bin in hist.iter_mut() {
        *bin += bonus;
        if remainder > 0 {
            *bin += 1;
            remainder -= 1;
        }
    }

    let scale = 255.0 / area.max(1) as f32;
    let mut table = [0u8; 256];
    let mut cdf = 0u32;
    for (value, bin) in hist.iter().enumerate() {
        cdf += bin;
        table[value] = (cdf as f32 * scale).round().min(255.0) as u8;
    }
    table
}
