//! Batches of captured records and their on-disk history.
//!
//! This module provides:
//! - The tab-separated line format (`format`)
//! - Main file and timestamped archive output (`writer`)
//! - Reading earlier archives back as score sheets (`reader`)
//! - Weekly cycle arithmetic (`cycle`)
//! - Cross-batch plausibility checks (`consistency`)

pub mod consistency;
pub mod cycle;
pub mod format;
pub mod reader;
pub mod writer;

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::record::ExtractedRecord;
use cycle::{CycleBoundary, CycleId};

/// The two point totals of one system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScorePair {
    pub undermining: Option<u64>,
    pub reinforcing: Option<u64>,
}

/// Scores of a batch keyed by system name, with the batch's cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreSheet {
    pub captured_at: DateTime<Utc>,
    pub cycle: CycleId,
    pub scores: BTreeMap<String, ScorePair>,
}

/// Records captured in one run, keyed by the requested system name.
#[derive(Clone, Debug)]
pub struct CaptureBatch {
    captured_at: DateTime<Utc>,
    cycle: CycleId,
    records: BTreeMap<String, ExtractedRecord>,
}

impl CaptureBatch {
    pub fn new(captured_at: DateTime<Utc>, boundary: &CycleBoundary) -> Self {
        Self {
            captured_at,
            cycle: boundary.cycle_of(captured_at),
            records: BTreeMap::new(),
        }
    }

    /// Adds a record. A later capture of the same system replaces the earlier one.
    pub fn insert(&mut self, system_name: &str, record: ExtractedRecord) {
        self.records.insert(system_name.to_string(), record);
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    /// Records sorted by system name.
    pub fn records(&self) -> impl Iterator<Item = (&str, &ExtractedRecord)> {
        self.records.iter().map(|(name, record)| (name.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn score_sheet(&self) -> ScoreSheet {
        ScoreSheet {
            captured_at: self.captured_at,
            cycle: self.cycle,
            scores: self
                .records
                .iter()
                .map(|(name, record)| {
                    let pair = ScorePair {
                        undermining: record.undermining_points(),
                        reinforcing: record.reinforcing_points(),
                    };
                    (name.clone(), pair)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Panel, StandardPanel, SystemStatus};
    use chrono::TimeZone;

    fn record(u: u64, r: u64) -> ExtractedRecord {
        ExtractedRecord::new(
            "X",
            Some(SystemStatus::Exploited),
            Panel::Standard(StandardPanel {
                controlling_faction: Some("Yuri Grom".to_string()),
                undermining_points: Some(u),
                reinforcing_points: Some(r),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_batch_sorted_and_deduplicated() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 12, 0, 0).unwrap();
        let mut batch = CaptureBatch::new(at, &CycleBoundary::default());
        batch.insert("Sol", record(1, 2));
        batch.insert("Achenar", record(3, 4));
        batch.insert("Sol", record(5, 6));

        let names: Vec<&str> = batch.records().map(|(n, _)| n).collect();
        assert_eq!(names, ["Achenar", "Sol"]);

        let sheet = batch.score_sheet();
        assert_eq!(sheet.scores["Sol"], ScorePair { undermining: Some(5), reinforcing: Some(6) });
        assert_eq!(sheet.cycle.start(), Utc.with_ymd_and_hms(2026, 1, 1, 7, 0, 0).unwrap());
    }
}
