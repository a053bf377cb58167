//! Batch run driver.
//!
//! Processes `(system name, screenshot)` pairs strictly in order: extract,
//! validate, write output files, keep debug artifacts. After the batch the
//! new scores are checked against the previous archive of the same cycle.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local, Utc};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::batch::consistency::{check, ConsistencyReport, Thresholds};
use crate::batch::cycle::CycleBoundary;
use crate::batch::format::format_line_as;
use crate::batch::reader::{list_archives, load_prior_sheet, read_archive};
use crate::batch::writer::BatchWriter;
use crate::batch::CaptureBatch;
use crate::capture::ScreenshotSource;
use crate::config::{PipelineConfig, RegionConfig};
use crate::ocr::engine::OcrEngine;
use crate::ocr::region::{crop_subsections, is_empty};
use crate::ocr::{Extraction, Extractor};
use crate::record::{ExtractedRecord, Panel};
use crate::validation::{describe_missing, missing_fields, MissingField};

const RULE_WIDTH: usize = 80;

/// Outcome of one run.
#[derive(Debug)]
pub struct RunSummary {
    pub attempted: usize,
    pub accepted: usize,
    /// Systems whose record was incomplete, with what was missing.
    pub rejected: Vec<(String, Vec<MissingField>)>,
    /// Systems whose capture failed outright, with the error.
    pub failed: Vec<(String, String)>,
    pub consistency: ConsistencyReport,
}

/// Reads system names, one per line. Blank lines are ignored.
pub fn read_system_names(path: &Path) -> Result<Vec<String>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Processes one screenshot per system name, in order.
///
/// Per-capture failures are logged and skipped; only output file errors
/// abort the run.
pub fn run_batch<E: OcrEngine, S: ScreenshotSource>(
    systems: &[String],
    source: &mut S,
    extractor: &Extractor<E>,
    config: &PipelineConfig,
    captured_at: DateTime<Local>,
) -> Result<RunSummary> {
    let output = &config.output;
    let boundary = CycleBoundary::from_config(&config.consistency);
    let writer = BatchWriter::new(output, captured_at);

    // History is read once, before this run's archive exists
    let prior = load_prior_sheet(&output.archive_dir, Some(writer.archive_file()), &boundary);

    let mut batch = CaptureBatch::new(captured_at.with_timezone(&Utc), &boundary);
    writer.write(&batch)?;
    info!("Writing to {} and {}", writer.main_file().display(), writer.archive_file().display());

    let mut summary = RunSummary {
        attempted: systems.len(),
        accepted: 0,
        rejected: Vec::new(),
        failed: Vec::new(),
        consistency: ConsistencyReport::NoPriorBatch,
    };

    for (i, name) in systems.iter().enumerate() {
        let index = i + 1;
        info!("[{}/{}] Processing: {}", index, systems.len(), name);

        let extraction = match source.capture(None).and_then(|shot| extractor.extract(&shot)) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("[{}] {}: {}", index, name, e);
                summary.failed.push((name.clone(), e.to_string()));
                continue;
            }
        };

        if output.save_debug {
            if let Err(e) = save_debug(&output.debug_dir, index, name, &extraction, &config.regions) {
                warn!("Failed to save debug files for {}: {:#}", name, e);
            }
        }

        let record = extraction.record;
        let missing = missing_fields(&record);
        if !missing.is_empty() {
            warn!("[{}] {}: Invalid: Missing {}", index, name, describe_missing(&missing));
            summary.rejected.push((name.clone(), missing));
            continue;
        }

        info!("  -> {}", format_line_as(&record, name, output.include_initial_cp));
        batch.insert(name, record);
        writer.write(&batch)?;
        summary.accepted += 1;

        if let Err(e) = source.release() {
            warn!("Failed to release screenshot for {}: {:#}", name, e);
        }
    }

    info!("Processing complete: parsed {}/{} systems", summary.accepted, summary.attempted);

    summary.consistency = check(&batch.score_sheet(), prior.as_ref(), &Thresholds::from(&config.consistency));
    summary.consistency.log();
    Ok(summary)
}

/// Compares the two most recent archives in `archive_dir`.
pub fn compare_latest(archive_dir: &Path, config: &PipelineConfig) -> Result<ConsistencyReport> {
    let boundary = CycleBoundary::from_config(&config.consistency);
    let archives = list_archives(archive_dir)?;
    let [.., previous, current] = archives.as_slice() else {
        return Err(anyhow!(
            "Need at least 2 capture files in {}, found {}",
            archive_dir.display(),
            archives.len()
        ));
    };
    info!("Previous file: {}", previous.display());
    info!("Current file:  {}", current.display());

    let current = read_archive(current, &boundary)?
        .ok_or_else(|| anyhow!("Cannot read capture time from {}", current.display()))?;
    let previous = read_archive(previous, &boundary)?;

    let report = check(&current, previous.as_ref(), &Thresholds::from(&config.consistency));
    report.log();
    Ok(report)
}

/// Writes the cropped panel, its subsections and a text report for one capture.
fn save_debug(
    dir: &Path,
    index: usize,
    system: &str,
    extraction: &Extraction,
    regions: &RegionConfig,
) -> Result<()> {
    let cropped_dir = dir.join("cropped");
    let text_dir = dir.join("ocr_text");
    fs::create_dir_all(&cropped_dir)?;
    fs::create_dir_all(&text_dir)?;

    if extraction.panel.width() > 0 && extraction.panel.height() > 0 {
        extraction
            .panel
            .save(cropped_dir.join(format!("capture_{:03}.png", index)))
            .context("Failed to save cropped panel")?;

        let layout = extraction.record.layout();
        for (section, crop) in crop_subsections(&extraction.panel, layout, regions) {
            if is_empty(&crop) {
                continue;
            }
            crop.save(cropped_dir.join(format!("capture_{:03}_{}.png", index, section)))
                .with_context(|| format!("Failed to save {} crop", section))?;
        }
    }
    fs::write(
        text_dir.join(format!("capture_{:03}.txt", index)),
        debug_report(index, system, &extraction.record),
    )
    .context("Failed to write OCR debug text")?;
    Ok(())
}

/// Human-readable dump of the raw OCR text, parsed fields and provenance.
pub fn debug_report(index: usize, system: &str, record: &ExtractedRecord) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let quoted = |v: Option<&str>| format!("'{}'", v.unwrap_or_default());
    let points = |v: Option<u64>| v.map(group_thousands).unwrap_or_else(|| "not found".to_string());

    let mut out = String::new();
    let _ = writeln!(out, "{heavy}\nCAPTURE #{index} - {system}\n{heavy}\n");
    let _ = writeln!(out, "RAW OCR TEXT:\n{light}\n{}\n{light}\n", record.diagnostics().raw_text.trim_end());

    let _ = writeln!(out, "PARSED DATA:");
    let _ = writeln!(out, "  System Name: '{}'", record.system_name());
    let _ = writeln!(out, "  Layout: {:?}", record.layout());
    let _ = writeln!(out, "  System Status: {}", quoted(record.status().map(|s| s.keyword())));
    match record.panel() {
        Panel::Standard(p) => {
            let _ = writeln!(out, "  Controlling Power: {}", quoted(p.controlling_faction.as_deref()));
            let _ = writeln!(out, "  Opposing Power: {}", quoted(p.opposing_faction.as_deref()));
        }
        Panel::Competitive(p) => {
            for entry in &p.ranked_factions {
                let _ = writeln!(out, "  Rank {}: {} {}", entry.rank, entry.faction, points(entry.score));
            }
            if let Some(rank) = p.own_rank {
                let _ = writeln!(out, "  Your Rank: {} ({})", rank, p.own_faction.as_deref().unwrap_or("?"));
            }
        }
    }
    if let Some(cp) = record.initial_control_points() {
        let _ = writeln!(out, "  Initial Control Points: {}", group_thousands(cp));
    }
    let _ = writeln!(out, "  Undermining Points: {}", points(record.undermining_points()));
    let _ = writeln!(out, "  Reinforcing Points: {}", points(record.reinforcing_points()));

    let details = record.details();
    if let Some(distance) = details.distance_ly {
        let _ = writeln!(out, "  Distance: {:.2} LY", distance);
    }
    if let Some(age) = &details.last_updated {
        let _ = writeln!(out, "  Last Updated: {}", age);
    }

    let fields = &record.diagnostics().fields;
    if !fields.is_empty() {
        let _ = writeln!(out, "\nFIELD SOURCES:");
        for (field, p) in fields {
            let _ = writeln!(
                out,
                "  {}: {:?} ({:.2}) line {} via {}",
                field, p.method, p.confidence, p.line, p.source
            );
        }
    }

    let missing = missing_fields(record);
    if !missing.is_empty() {
        let _ = writeln!(out, "\nMISSING: {}", describe_missing(&missing));
    }
    out
}

/// `1234567` as `1,234,567`.
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureError, Screenshot};
    use crate::ocr::engine::OcrRequest;
    use crate::paths::archive_file_name;
    use image::{GrayImage, Rgba, RgbaImage};
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// Every call returns the next scripted text.
    struct SequenceEngine(RefCell<Vec<String>>);

    impl SequenceEngine {
        fn new(texts: &[&str]) -> Self {
            Self(RefCell::new(texts.iter().rev().map(|s| s.to_string()).collect()))
        }
    }

    impl OcrEngine for SequenceEngine {
        fn recognize(&self, _img: &GrayImage, _request: OcrRequest) -> Result<String> {
            self.0.borrow_mut().pop().ok_or_else(|| anyhow!("script exhausted"))
        }
    }

    struct FixedShots {
        remaining: usize,
        released: usize,
    }

    impl ScreenshotSource for FixedShots {
        fn capture(&mut self, _region: Option<crate::config::PixelRect>) -> Result<Screenshot, CaptureError> {
            if self.remaining == 0 {
                return Err(CaptureError::Load {
                    path: "memory".to_string(),
                    reason: "exhausted".to_string(),
                });
            }
            self.remaining -= 1;
            Ok(Screenshot::from_image(RgbaImage::from_pixel(512, 144, Rgba([15, 15, 15, 255]))))
        }

        fn release(&mut self) -> Result<()> {
            self.released += 1;
            Ok(())
        }
    }

    const GOOD: &str = "POWERPLAY INFORMATION\nLHS 3447 LAST UPDATED: 2 HOURS AGO\nFORTIFIED\n\
        CONTROLLING POWER\nARCHON DELAINE\n4,000 < CONTROL POINTS > 2,500";
    const NO_SCORES: &str = "POWERPLAY INFORMATION\nWOLF 397 LAST UPDATED: 2 HOURS AGO\nEXPLOITED\n\
        CONTROLLING POWER\nARCHON DELAINE";

    fn config(dir: &Path) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.output.main_file = dir.join("powerplay_auto_capture.txt");
        config.output.archive_dir = dir.join("auto_capture_outputs");
        config.output.debug_dir = dir.join("debug");
        // Panel passes only, so each capture costs exactly two OCR calls
        for list in [
            &mut config.strategies.name,
            &mut config.strategies.status,
            &mut config.strategies.faction,
            &mut config.strategies.scores,
            &mut config.strategies.ranking,
        ] {
            list.truncate(1);
        }
        config
    }

    #[test]
    fn test_run_batch_accepts_and_rejects() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let engine = SequenceEngine::new(&[GOOD, GOOD, NO_SCORES, NO_SCORES]);
        let extractor = Extractor::new(engine, &config).unwrap();
        let mut source = FixedShots { remaining: 2, released: 0 };
        let systems = vec!["LHS 3447".to_string(), "Wolf 397".to_string()];

        let summary = run_batch(&systems, &mut source, &extractor, &config, Local::now()).unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.rejected.len(), 1);
        assert_eq!(
            summary.rejected[0].1,
            vec![MissingField::Undermining, MissingField::Reinforcing]
        );
        assert_eq!(source.released, 1);
        assert_eq!(summary.consistency, ConsistencyReport::NoPriorBatch);

        let main = fs::read_to_string(&config.output.main_file).unwrap();
        assert_eq!(main.lines().nth(1), Some("LHS 3447\tArchon Delaine\tFORTIFIED\t\t4000\t2500"));
        assert_eq!(main.lines().count(), 2);

        let report = fs::read_to_string(dir.path().join("debug/ocr_text/capture_002.txt")).unwrap();
        assert!(report.contains("CAPTURE #2 - Wolf 397"));
        assert!(report.contains("MISSING: Undermining, Reinforcing"));
        assert!(dir.path().join("debug/cropped/capture_001.png").exists());
    }

    #[test]
    fn test_capture_failure_continues() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let extractor = Extractor::new(SequenceEngine::new(&[]), &config).unwrap();
        let mut source = FixedShots { remaining: 0, released: 0 };
        let systems = vec!["A".to_string(), "B".to_string()];

        let summary = run_batch(&systems, &mut source, &extractor, &config, Local::now()).unwrap();
        assert_eq!(summary.failed.len(), 2);
        assert_eq!(summary.accepted, 0);
    }

    #[test]
    fn test_prior_archive_same_cycle_is_compared() {
        let dir = tempdir().unwrap();
        let config = config(dir.path());
        let now = Local::now();

        // A prior archive one minute earlier holding a higher score
        fs::create_dir_all(&config.output.archive_dir).unwrap();
        let earlier = now - chrono::Duration::minutes(1);
        fs::write(
            config.output.archive_dir.join(archive_file_name(earlier.naive_local())),
            "System Name\tPower\tState\t\tUndermining\tReinforcement\n\
             LHS 3447\tArchon Delaine\tFORTIFIED\t\t5000\t2500\n",
        )
        .unwrap();

        let extractor = Extractor::new(SequenceEngine::new(&[GOOD, GOOD]), &config).unwrap();
        let mut source = FixedShots { remaining: 1, released: 0 };
        let summary =
            run_batch(&["LHS 3447".to_string()], &mut source, &extractor, &config, now).unwrap();

        match summary.consistency {
            // A cycle tick can fall inside the minute; that case skips comparison
            ConsistencyReport::DifferentCycle { .. } => {}
            ConsistencyReport::Compared(c) => {
                assert_eq!(c.violations.len(), 1);
                assert_eq!(c.violations[0].delta(), -1_000);
            }
            ConsistencyReport::NoPriorBatch => panic!("prior archive not found"),
        }
    }

    #[test]
    fn test_compare_latest_needs_two_archives() {
        let dir = tempdir().unwrap();
        assert!(compare_latest(dir.path(), &PipelineConfig::default()).is_err());
    }

    #[test]
    fn test_read_system_names() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.txt");
        fs::write(&path, "Sol\n\n  LHS 3447  \n").unwrap();
        assert_eq!(read_system_names(&path).unwrap(), vec!["Sol", "LHS 3447"]);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }
}
