use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::OutputConfig;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Prefix shared by every timestamped batch archive.
pub const ARCHIVE_PREFIX: &str = "powerplay_auto_capture_";

/// Local-time stamp embedded in archive names.
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// `powerplay_auto_capture_YYYYMMDD_HHMMSS.txt` for a local capture time.
pub fn archive_file_name(captured_at: NaiveDateTime) -> String {
    format!("{}{}.txt", ARCHIVE_PREFIX, captured_at.format(ARCHIVE_TIMESTAMP_FORMAT))
}

/// Recovers the local capture time from an archive path.
///
/// Returns `None` for anything that is not a well-formed archive name.
pub fn parse_archive_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let stem = path.file_stem()?.to_str()?;
    let stamp = stem.strip_prefix(ARCHIVE_PREFIX)?;
    NaiveDateTime::parse_from_str(stamp, ARCHIVE_TIMESTAMP_FORMAT).ok()
}

/// System name made safe for a file name: spaces become `_`, path
/// separators become `-`.
pub fn safe_name(system: &str) -> String {
    system
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' => '-',
            c => c,
        })
        .collect()
}

/// `capture_NNN_<safe name>.png`, numbered from 1.
pub fn screenshot_file_name(index: usize, system: &str) -> String {
    format!("capture_{:03}_{}.png", index, safe_name(system))
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories(output: &OutputConfig) -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(&output.archive_dir)?;
    if output.save_debug {
        std::fs::create_dir_all(&output.debug_dir)?;
    }
    if let Some(parent) = output.main_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_archive_name_round_trip() {
        let at = NaiveDate::from_ymd_opt(2026, 1, 8)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        let name = archive_file_name(at);
        assert_eq!(name, "powerplay_auto_capture_20260108_090503.txt");
        assert_eq!(parse_archive_timestamp(&Path::new("out").join(&name)), Some(at));
    }

    #[test]
    fn test_malformed_archive_names() {
        for name in [
            "powerplay_auto_capture.txt",
            "powerplay_auto_capture_2026010_090503.txt",
            "powerplay_auto_capture_20261308_090503.txt",
            "notes_20260108_090503.txt",
        ] {
            assert_eq!(parse_archive_timestamp(Path::new(name)), None, "{name}");
        }
    }

    #[test]
    fn test_screenshot_file_name() {
        assert_eq!(screenshot_file_name(7, "Col 285 Sector AB/CD"), "capture_007_Col_285_Sector_AB-CD.png");
        assert_eq!(safe_name(r"A\B C"), "A-B_C");
    }
}
