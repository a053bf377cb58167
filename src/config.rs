//! Pipeline configuration.
//!
//! Loaded from `config.json` next to the executable (or an explicit path).
//! Every field has a default, so a partial file only overrides what it names.
//! The loaded value is passed explicitly into the pipeline entry points.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::ocr::preprocess::PreprocessMethod;
use crate::ocr::strategy::StrategyPlan;

/// A rectangle in relative coordinates (0.0 to 1.0).
/// Used for defining regions that scale with the image size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub x: f32,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub y: f32,
    /// Width as fraction of image width
    pub width: f32,
    /// Height as fraction of image height
    pub height: f32,
}

impl Default for RelativeRect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

/// A rectangle in absolute pixels, measured on a reference-resolution capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Converts to fractions of a `reference_width` x `reference_height` frame.
    pub fn to_relative(&self, reference_width: u32, reference_height: u32) -> RelativeRect {
        let rw = reference_width.max(1) as f32;
        let rh = reference_height.max(1) as f32;
        RelativeRect {
            x: self.left as f32 / rw,
            y: self.top as f32 / rh,
            width: self.width() as f32 / rw,
            height: self.height() as f32 / rh,
        }
    }
}

/// A named sub-region inside a cropped panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubsectionRect {
    pub name: String,
    pub rect: RelativeRect,
}

impl SubsectionRect {
    fn new(name: &str, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            name: name.to_string(),
            rect: RelativeRect { x, y, width, height },
        }
    }
}

/// Tesseract invocation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Explicit path to the tesseract binary. Discovered when unset.
    pub executable: Option<PathBuf>,
    /// Explicit tessdata directory. Tesseract's own default when unset.
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
    /// `--oem`: 1 selects the LSTM engine.
    pub engine_mode: u8,
    /// `--psm` for whole-panel text (4 = single column of variable sizes).
    pub panel_psm: u8,
    /// `--psm` for subsection crops (6 = single uniform block).
    pub subsection_psm: u8,
    pub dpi: Option<u32>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            executable: None,
            tessdata_dir: None,
            language: "eng".to_string(),
            engine_mode: 1,
            panel_psm: 4,
            subsection_psm: 6,
            dpi: None,
        }
    }
}

/// Panel geometry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Resolution the pixel rectangles were measured at.
    pub reference_width: u32,
    pub reference_height: u32,
    pub standard_panel: PixelRect,
    /// Competitive panels extend further down for the ranking list.
    pub competitive_panel: PixelRect,
    /// Fractions of the cropped standard panel.
    pub standard_subsections: Vec<SubsectionRect>,
    /// Fractions of the cropped competitive panel.
    pub competitive_subsections: Vec<SubsectionRect>,
    /// Status bar holding the initial control point marker, as a fraction
    /// of the cropped standard panel.
    pub control_bar: RelativeRect,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            reference_width: 5120,
            reference_height: 1440,
            standard_panel: PixelRect { left: 2916, top: 224, right: 3656, bottom: 870 },
            competitive_panel: PixelRect { left: 2916, top: 224, right: 3658, bottom: 1064 },
            standard_subsections: vec![
                SubsectionRect::new("name_line", 0.0, 0.0, 1.0, 0.20),
                SubsectionRect::new("status_line", 0.0, 0.18, 1.0, 0.24),
                SubsectionRect::new("power_section", 0.0, 0.44, 1.0, 0.30),
                SubsectionRect::new("control_points", 0.0, 0.68, 1.0, 0.22),
            ],
            competitive_subsections: vec![
                SubsectionRect::new("name_line", 0.0, 0.0, 1.0, 0.16),
                SubsectionRect::new("status_line", 0.0, 0.14, 1.0, 0.18),
                SubsectionRect::new("power_ranking", 0.0, 0.38, 1.0, 0.46),
                SubsectionRect::new("power_your_rank", 0.0, 0.82, 1.0, 0.14),
            ],
            control_bar: RelativeRect { x: 0.04, y: 0.30, width: 0.92, height: 0.05 },
        }
    }
}

/// Image preprocessing parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Method used for the first whole-panel pass.
    pub primary_method: PreprocessMethod,
    /// Resize factor for `upscale` (clamped to 2..=3).
    pub upscale_factor: u32,
    /// CLAHE clip limit, as a multiple of the uniform bin height.
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid (tiles per side).
    pub clahe_tiles: u32,
    /// Neighbourhood radius of the adaptive threshold in `enhanced`.
    pub adaptive_radius: u32,
    /// Offset subtracted from the local mean in `enhanced`.
    pub adaptive_offset: i16,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            primary_method: PreprocessMethod::Upscale,
            upscale_factor: 2,
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            adaptive_radius: 7,
            adaptive_offset: 5,
        }
    }
}

/// Text parsing thresholds and windows.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Minimum normalized similarity for fuzzy keyword matches.
    pub similarity_threshold: f64,
    /// Maximum length difference between a word and a keyword for fuzzy matching.
    pub length_tolerance: usize,
    /// Lines after the section header in which the system name may appear.
    pub name_window: usize,
    /// Names must be longer than this many characters.
    pub min_name_length: usize,
    /// Lines searched either side of a faction for its role keyword.
    pub role_window: usize,
    /// Lines searched after a score label for a standalone number.
    pub score_lookahead: usize,
    /// Lines searched after a ranked faction for a standalone score.
    pub rank_score_lookahead: usize,
}

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            length_tolerance: 2,
            name_window: 3,
            min_name_length: 5,
            role_window: 3,
            score_lookahead: 3,
            rank_score_lookahead: 2,
        }
    }
}

/// Cross-batch plausibility settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    /// Current/previous ratio at or above which an increase is suspicious.
    pub jump_ratio: f64,
    /// Weekday of the weekly tick, as days from Monday (3 = Thursday).
    pub tick_weekday: u32,
    /// UTC hour of the weekly tick.
    pub tick_hour: u32,
}

pub const DEFAULT_JUMP_RATIO: f64 = 9.0;

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            jump_ratio: DEFAULT_JUMP_RATIO,
            tick_weekday: 3,
            tick_hour: 7,
        }
    }
}

/// Output file locations. Relative paths resolve against the working directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Batch file rewritten on every run.
    pub main_file: PathBuf,
    /// Directory holding timestamped archives.
    pub archive_dir: PathBuf,
    /// Directory for cropped panels and raw OCR text of each capture.
    pub debug_dir: PathBuf,
    pub save_debug: bool,
    /// Append an `Initial CP` column to each batch line.
    pub include_initial_cp: bool,
    /// Remove a screenshot once its record has been accepted.
    pub delete_processed_screenshots: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            main_file: PathBuf::from("powerplay_auto_capture.txt"),
            archive_dir: PathBuf::from("auto_capture_outputs"),
            debug_dir: PathBuf::from("auto_capture/debug"),
            save_debug: true,
            include_initial_cp: false,
            delete_processed_screenshots: false,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ocr: OcrConfig,
    pub regions: RegionConfig,
    pub preprocessing: PreprocessConfig,
    pub parsing: ParserConfig,
    pub strategies: StrategyPlan,
    pub consistency: ConsistencyConfig,
    pub output: OutputConfig,
}

/// Default config location: `config.json` next to the executable.
pub fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

/// Loads configuration from `path`, or returns defaults.
///
/// A missing, unreadable or malformed file is logged and replaced by the
/// defaults; it never stops a run.
pub fn load_config(path: &Path) -> PipelineConfig {
    info!("Looking for config at: {}", path.display());

    if !path.exists() {
        info!("{} not found. Using default config.", path.display());
        return PipelineConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                info!("Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                PipelineConfig::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
            PipelineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_pixel_rect_to_relative() {
        let rect = PixelRect { left: 2560, top: 360, right: 3840, bottom: 1080 };
        let rel = rect.to_relative(5120, 1440);
        assert!((rel.x - 0.5).abs() < 1e-6);
        assert!((rel.y - 0.25).abs() < 1e-6);
        assert!((rel.width - 0.25).abs() < 1e-6);
        assert!((rel.height - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_inverted_pixel_rect_has_zero_size() {
        let rect = PixelRect { left: 10, top: 10, right: 5, bottom: 5 };
        assert_eq!(rect.width(), 0);
        assert_eq!(rect.height(), 0);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "parsing": { "similarity_threshold": 0.8 }, "consistency": { "jump_ratio": 5.0 } }"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert!((config.parsing.similarity_threshold - 0.8).abs() < 1e-9);
        assert_eq!(config.parsing.name_window, 3);
        assert!((config.consistency.jump_ratio - 5.0).abs() < 1e-9);
        assert_eq!(config.consistency.tick_hour, 7);
        assert_eq!(config.ocr.panel_psm, 4);
        assert_eq!(config.regions.standard_panel.left, 2916);
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_config(&path);
        assert!((config.parsing.similarity_threshold - DEFAULT_SIMILARITY_THRESHOLD).abs() < 1e-9);
        assert!((config.consistency.jump_ratio - DEFAULT_JUMP_RATIO).abs() < 1e-9);
    }

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.json"));
        assert_eq!(config.output.main_file, PathBuf::from("powerplay_auto_capture.txt"));
        assert_eq!(config.regions.competitive_panel.bottom, 1064);
    }
}
