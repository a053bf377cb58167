//! Reads earlier batch archives back for comparison.
//!
//! An archive's capture time comes only from its file name. Archives whose
//! name cannot be turned into an unambiguous UTC instant are unusable and
//! are treated as if there were no prior batch.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::cycle::{local_to_utc, CycleBoundary};
use super::format::parse_line;
use super::{ScorePair, ScoreSheet};
use crate::paths::{parse_archive_timestamp, ARCHIVE_PREFIX};

/// Archive files in `dir`, oldest first (the name sorts chronologically).
pub fn list_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut archives: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ARCHIVE_PREFIX) && n.ends_with(".txt"))
        })
        .collect();
    archives.sort();
    Ok(archives)
}

/// Latest archive strictly before `current` by name, or the latest overall
/// when `current` is `None`.
pub fn latest_archive_before(dir: &Path, current: Option<&Path>) -> Result<Option<PathBuf>> {
    let current_name = current.and_then(|c| c.file_name());
    Ok(list_archives(dir)?
        .into_iter()
        .filter(|p| match current_name {
            Some(name) => p.file_name().is_some_and(|n| n < name),
            None => true,
        })
        .next_back())
}

/// Reads the scores of a batch file. Header, separators, blank and
/// malformed lines are skipped.
pub fn read_scores(path: &Path) -> Result<BTreeMap<String, ScorePair>> {
    let file = File::open(path).with_context(|| format!("Failed to open batch file: {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut scores = BTreeMap::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.context("Failed to read line from batch file")?;

        // Skip header row
        if line_num == 0 {
            continue;
        }

        if let Some(row) = parse_line(&line) {
            scores.insert(
                row.system_name,
                ScorePair {
                    undermining: row.undermining,
                    reinforcing: row.reinforcing,
                },
            );
        }
    }

    Ok(scores)
}

/// Loads an archive as a score sheet, timed by its file name.
///
/// `Ok(None)` when the name has no usable timestamp.
pub fn read_archive(path: &Path, boundary: &CycleBoundary) -> Result<Option<ScoreSheet>> {
    let Some(local) = parse_archive_timestamp(path) else {
        warn!("Cannot read capture time from {}; ignoring it", path.display());
        return Ok(None);
    };
    let Some(captured_at) = local_to_utc(local) else {
        warn!("Capture time of {} is ambiguous in local time; ignoring it", path.display());
        return Ok(None);
    };

    let scores = read_scores(path)?;
    info!("Loaded {} systems from {}", scores.len(), path.display());
    Ok(Some(ScoreSheet {
        captured_at,
        cycle: boundary.cycle_of(captured_at),
        scores,
    }))
}

/// The prior batch to compare against: the latest archive before `current`.
///
/// Any problem reading it is logged and yields `None`; it never stops a run.
pub fn load_prior_sheet(dir: &Path, current: Option<&Path>, boundary: &CycleBoundary) -> Option<ScoreSheet> {
    let loaded = latest_archive_before(dir, current).and_then(|prior| match prior {
        Some(path) => read_archive(&path, boundary),
        None => Ok(None),
    });
    match loaded {
        Ok(sheet) => sheet,
        Err(e) => {
            warn!("Failed to load prior batch: {:#}", e);
            None
        }
    }
}
