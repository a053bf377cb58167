//! Record completeness check.

use std::fmt;

use crate::record::ExtractedRecord;

/// A field that keeps a record from being accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MissingField {
    Name,
    Faction,
    Status,
    Undermining,
    Reinforcing,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingField::Name => "Name",
            MissingField::Faction => "Faction",
            MissingField::Status => "Status",
            MissingField::Undermining => "Undermining",
            MissingField::Reinforcing => "Reinforcing",
        })
    }
}

/// Every field the record lacks, in report order. Empty means valid.
///
/// A score of 0 is present; only an unrecognized score is missing.
pub fn missing_fields(record: &ExtractedRecord) -> Vec<MissingField> {
    let mut missing = Vec::new();
    if record.system_name().trim().is_empty() {
        missing.push(MissingField::Name);
    }
    let has_faction = record.controlling_faction().is_some()
        || record.opposing_faction().is_some()
        || !record.ranked_factions().is_empty();
    if !has_faction {
        missing.push(MissingField::Faction);
    }
    if record.status().is_none() {
        missing.push(MissingField::Status);
    }
    if record.undermining_points().is_none() {
        missing.push(MissingField::Undermining);
    }
    if record.reinforcing_points().is_none() {
        missing.push(MissingField::Reinforcing);
    }
    missing
}

pub fn is_valid(record: &ExtractedRecord) -> bool {
    missing_fields(record).is_empty()
}

/// Joins missing field names for the operator report, e.g. `Status, Undermining`.
pub fn describe_missing(missing: &[MissingField]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
