use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{locate, TesseractPaths};
use crate::config::OcrConfig;

/// Per-call recognition settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OcrRequest {
    /// Tesseract `--oem`.
    pub engine_mode: u8,
    /// Tesseract `--psm`.
    pub page_segmentation: u8,
}

/// Anything that turns a preprocessed image into text.
///
/// Calls are blocking and issued one at a time.
pub trait OcrEngine {
    fn recognize(&self, img: &GrayImage, request: OcrRequest) -> Result<String>;
}

/// Tesseract run as an external process.
#[derive(Clone, Debug)]
pub struct TesseractCli {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    language: String,
    dpi: Option<u32>,
}

impl TesseractCli {
    pub fn new(paths: TesseractPaths, config: &OcrConfig) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
            language: config.language.clone(),
            dpi: config.dpi,
        }
    }

    /// Discovers the installation described by `config`.
    pub fn from_config(config: &OcrConfig) -> Result<Self> {
        Ok(Self::new(locate(config)?, config))
    }

    fn args(&self, input: &Path, request: OcrRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![input.into(), "stdout".into()];
        if let Some(dir) = &self.tessdata {
            args.push("--tessdata-dir".into());
            args.push(dir.into());
        }
        args.push("-l".into());
        args.push(self.language.clone().into());
        args.push("--oem".into());
        args.push(request.engine_mode.to_string().into());
        args.push("--psm".into());
        args.push(request.page_segmentation.to_string().into());
        if let Some(dpi) = self.dpi {
            args.push("--dpi".into());
            args.push(dpi.to_string().into());
        }
        args
    }
}

impl OcrEngine for TesseractCli {
    /// Runs Tesseract on a preprocessed grayscale image and returns plain text.
    fn recognize(&self, img: &GrayImage, request: OcrRequest) -> Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        let output = Command::new(&self.executable)
            .args(self.args(temp_input.path(), request))
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
