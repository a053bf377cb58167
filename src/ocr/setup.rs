//! Tesseract discovery and language data setup.
//!
//! The executable is resolved from config first, then from our data
//! directory, then `PATH`, then common install locations. Language data is
//! optional: when none is found Tesseract falls back to its own default.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

use crate::config::OcrConfig;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

const EXE_NAME: &str = if cfg!(windows) { "tesseract.exe" } else { "tesseract" };

const COMMON_EXECUTABLES: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
];

const COMMON_TESSDATA: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

/// Resolved Tesseract installation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` lets Tesseract use its compiled-in tessdata location.
    pub tessdata: Option<PathBuf>,
}

/// Returns the directory for locally managed Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("powerplay-ocr")
        .join("tesseract")
}

/// Resolves both the executable and the language data directory.
pub fn locate(config: &OcrConfig) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(config)?;
    let tessdata = find_tessdata_dir(config);
    info!(
        "Using Tesseract at {} (tessdata: {})",
        executable.display(),
        tessdata
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "default".to_string())
    );
    Ok(TesseractPaths { executable, tessdata })
}

/// Finds the Tesseract executable.
pub fn find_tesseract_executable(config: &OcrConfig) -> Result<PathBuf> {
    if let Some(path) = &config.executable {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(anyhow!(
            "Configured Tesseract executable does not exist: {}",
            path.display()
        ));
    }

    let local_exe = get_tesseract_dir().join(EXE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    // Check PATH
    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for path in COMMON_EXECUTABLES {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "Tesseract not found. Install Tesseract-OCR, add it to PATH, or set ocr.executable in config.json."
    ))
}

/// Finds a tessdata directory containing the configured language.
pub fn find_tessdata_dir(config: &OcrConfig) -> Option<PathBuf> {
    let has_language = |dir: &Path| dir.join(traineddata_name(&config.language)).exists();

    if let Some(dir) = &config.tessdata_dir {
        if has_language(dir) {
            return Some(dir.clone());
        }
        debug!("Configured tessdata {} lacks {}", dir.display(), config.language);
    }

    let local = get_tesseract_dir().join("tessdata");
    if has_language(&local) {
        return Some(local);
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let prefix = PathBuf::from(prefix);
        for candidate in [prefix.clone(), prefix.join("tessdata")] {
            if has_language(&candidate) {
                return Some(candidate);
            }
        }
    }

    COMMON_TESSDATA
        .iter()
        .map(PathBuf::from)
        .find(|p| has_language(p))
}

/// Makes sure `<language>.traineddata` is available in our local tessdata
/// directory, copying it from a system install or downloading it.
pub fn ensure_tessdata(language: &str) -> Result<PathBuf> {
    let tessdata_dir = get_tesseract_dir().join("tessdata");
    let target = tessdata_dir.join(traineddata_name(language));

    if target.exists() {
        info!("{} already present at {}", language, tessdata_dir.display());
        return Ok(tessdata_dir);
    }

    fs::create_dir_all(&tessdata_dir)
        .with_context(|| format!("Failed to create {}", tessdata_dir.display()))?;

    for dir in COMMON_TESSDATA {
        let source = Path::new(dir).join(traineddata_name(language));
        if source.exists() {
            info!("Copying {} from {}", traineddata_name(language), dir);
            fs::copy(&source, &target)?;
            return Ok(tessdata_dir);
        }
    }

    download_traineddata(language, &target)?;
    Ok(tessdata_dir)
}

fn download_traineddata(language: &str, target: &Path) -> Result<()> {
    let url = format!("{}/{}", TESSDATA_REPO, traineddata_name(language));
    info!("Downloading {}...", url);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "powerplay-ocr")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            traineddata_name(language),
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(target)?;
    file.write_all(&bytes)?;

    info!("Downloaded {} ({} bytes)", traineddata_name(language), bytes.len());
    Ok(())
}

fn traineddata_name(language: &str) -> String {
    format!("{}.traineddata", language)
}
