//! Screenshot sources.
//!
//! Capturing the game window is done elsewhere; this module only defines
//! the boundary the extractor consumes:
//! - [`Screenshot`]: an RGBA image plus its pixel dimensions
//! - [`ScreenshotSource`]: anything that hands out screenshots in order
//! - [`FileScreenshots`]: previously saved captures read back from disk

use image::RgbaImage;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::PixelRect;
use crate::paths::screenshot_file_name;

/// Errors that abandon a single capture. The rest of the batch continues.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The screenshot could not be read or decoded
    #[error("Failed to load screenshot {path}: {reason}")]
    Load { path: String, reason: String },

    /// A crop ended up with no pixels
    #[error("Region '{0}' is empty")]
    EmptyRegion(String),

    /// The OCR engine failed on the primary pass
    #[error("OCR failed: {0}")]
    Ocr(String),
}

/// A captured frame.
#[derive(Clone, Debug)]
pub struct Screenshot {
    pub image: RgbaImage,
    pub width: u32,
    pub height: u32,
}

impl Screenshot {
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self { image, width, height }
    }

    /// Loads a PNG (or any format the `image` crate reads) from disk.
    pub fn load(path: &Path) -> Result<Self, CaptureError> {
        let image = image::open(path).map_err(|e| CaptureError::Load {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_image(image.to_rgba8()))
    }

    /// Returns the given pixel rectangle, clamped to the frame.
    pub fn crop(&self, region: PixelRect) -> Self {
        let left = region.left.min(self.width);
        let top = region.top.min(self.height);
        let width = region.width().min(self.width - left);
        let height = region.height().min(self.height - top);
        Self::from_image(image::imageops::crop_imm(&self.image, left, top, width, height).to_image())
    }
}

/// Hands out screenshots one at a time, in capture order.
pub trait ScreenshotSource {
    /// Next screenshot, optionally restricted to `region`.
    fn capture(&mut self, region: Option<PixelRect>) -> Result<Screenshot, CaptureError>;

    /// Called once the last screenshot's record has been accepted.
    fn release(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Screenshots saved by the capture run as `capture_NNN_<name>.png`.
pub struct FileScreenshots {
    pending: VecDeque<PathBuf>,
    current: Option<PathBuf>,
    delete_on_release: bool,
}

impl FileScreenshots {
    /// Expects one file per system name, numbered from 1 in input order.
    pub fn for_systems(dir: &Path, systems: &[String], delete_on_release: bool) -> Self {
        let pending = systems
            .iter()
            .enumerate()
            .map(|(i, name)| dir.join(screenshot_file_name(i + 1, name)))
            .collect();
        Self {
            pending,
            current: None,
            delete_on_release,
        }
    }
}

impl ScreenshotSource for FileScreenshots {
    fn capture(&mut self, region: Option<PixelRect>) -> Result<Screenshot, CaptureError> {
        let path = self.pending.pop_front().ok_or_else(|| CaptureError::Load {
            path: "<none>".to_string(),
            reason: "no screenshots left".to_string(),
        })?;
        debug!("Loading screenshot {}", path.display());
        self.current = Some(path.clone());

        let shot = Screenshot::load(&path)?;
        Ok(match region {
            Some(r) => shot.crop(r),
            None => shot,
        })
    }

    fn release(&mut self) -> anyhow::Result<()> {
        if !self.delete_on_release {
            return Ok(());
        }
        if let Some(path) = self.current.take() {
            fs::remove_file(&path)?;
            info!("Deleted processed screenshot {}", path.display());
        }
        Ok(())
    }
}
