//! Batch output files.
//!
//! The main file and this run's archive are both rewritten in full after
//! every accepted record, so an interrupted run still leaves a complete,
//! sorted file of everything captured so far.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::format::{format_line_as, header};
use super::CaptureBatch;
use crate::config::OutputConfig;
use crate::paths::archive_file_name;

pub struct BatchWriter {
    main_file: PathBuf,
    archive_file: PathBuf,
    include_initial_cp: bool,
}

impl BatchWriter {
    /// Archive name is derived from the batch's capture time in local time.
    pub fn new(output: &OutputConfig, captured_at: DateTime<Local>) -> Self {
        Self {
            main_file: output.main_file.clone(),
            archive_file: output
                .archive_dir
                .join(archive_file_name(captured_at.naive_local())),
            include_initial_cp: output.include_initial_cp,
        }
    }

    pub fn main_file(&self) -> &Path {
        &self.main_file
    }

    pub fn archive_file(&self) -> &Path {
        &self.archive_file
    }

    /// Writes the whole batch to both files.
    pub fn write(&self, batch: &CaptureBatch) -> Result<()> {
        let contents = self.render(batch);
        for path in [&self.main_file, &self.archive_file] {
            write_file(path, &contents)?;
        }
        Ok(())
    }

    fn render(&self, batch: &CaptureBatch) -> String {
        let mut out = header(self.include_initial_cp);
        out.push('\n');
        for (name, record) in batch.records() {
            out.push_str(&format_line_as(record, name, self.include_initial_cp));
            out.push('\n');
        }
        out
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    writer.flush().context("Failed to flush batch file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::cycle::CycleBoundary;
    use crate::batch::format::HEADER;
    use crate::record::{ExtractedRecord, Panel, StandardPanel, SystemStatus};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn record(faction: &str, u: Option<u64>, r: Option<u64>) -> ExtractedRecord {
        ExtractedRecord::new(
            "ocr name",
            Some(SystemStatus::Fortified),
            Panel::Standard(StandardPanel {
                controlling_faction: Some(faction.to_string()),
                undermining_points: u,
                reinforcing_points: r,
                ..Default::default()
            }),
        )
        .with_initial_control_points(Some(400_000))
    }

    fn output(dir: &Path) -> OutputConfig {
        OutputConfig {
            main_file: dir.join("powerplay_auto_capture.txt"),
            archive_dir: dir.join("archive"),
            ..Default::default()
        }
    }

    #[test]
    fn test_writes_main_and_archive_sorted() {
        let dir = tempdir().unwrap();
        let local = Local.with_ymd_and_hms(2026, 1, 8, 9, 5, 3).unwrap();
        let writer = BatchWriter::new(&output(dir.path()), local);
        assert!(writer
            .archive_file()
            .ends_with("archive/powerplay_auto_capture_20260108_090503.txt"));

        let mut batch = CaptureBatch::new(Utc::now(), &CycleBoundary::default());
        batch.insert("Sol", record("Zachary Hudson", Some(10), Some(20)));
        batch.insert("Achenar", record("Aisling Duval", None, Some(0)));
        writer.write(&batch).unwrap();

        let main = fs::read_to_string(writer.main_file()).unwrap();
        let lines: Vec<&str> = main.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "Achenar\tAisling Duval\tFORTIFIED\t\t\t0");
        assert_eq!(lines[2], "Sol\tZachary Hudson\tFORTIFIED\t\t10\t20");
        assert_eq!(fs::read_to_string(writer.archive_file()).unwrap(), main);
    }

    #[test]
    fn test_rewrite_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let writer = BatchWriter::new(&output(dir.path()), Local::now());
        let mut batch = CaptureBatch::new(Utc::now(), &CycleBoundary::default());

        batch.insert("Sol", record("Zachary Hudson", Some(1), Some(1)));
        writer.write(&batch).unwrap();
        batch.insert("Sol", record("Zachary Hudson", Some(2), Some(2)));
        writer.write(&batch).unwrap();

        let main = fs::read_to_string(writer.main_file()).unwrap();
        assert_eq!(main.lines().count(), 2);
        assert!(main.contains("\t2\t2"));
    }

    #[test]
    fn test_initial_cp_column() {
        let dir = tempdir().unwrap();
        let config = OutputConfig {
            include_initial_cp: true,
            ..output(dir.path())
        };
        let writer = BatchWriter::new(&config, Local::now());
        let mut batch = CaptureBatch::new(Utc::now(), &CycleBoundary::default());
        batch.insert("Sol", record("Zachary Hudson", Some(1), Some(2)));
        writer.write(&batch).unwrap();

        let main = fs::read_to_string(writer.main_file()).unwrap();
        assert!(main.lines().next().unwrap().ends_with("\tInitial CP"));
        assert!(main.lines().nth(1).unwrap().ends_with("\t1\t2\t400000"));
    }
}
