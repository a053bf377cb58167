//! Tab-separated batch lines for spreadsheet import.
//!
//! Columns: system name, power, state, an intentionally blank column,
//! undermining, reinforcement. Missing values are left blank. Optionally an
//! `Initial CP` column is appended.

use crate::record::{ExtractedRecord, SystemStatus};

pub const HEADER: &str = "System Name\tPower\tState\t\tUndermining\tReinforcement";

const INITIAL_CP_HEADER: &str = "Initial CP";

/// Header line for the given column set.
pub fn header(include_initial_cp: bool) -> String {
    if include_initial_cp {
        format!("{}\t{}", HEADER, INITIAL_CP_HEADER)
    } else {
        HEADER.to_string()
    }
}

/// Formats a record under its own recognized name.
pub fn format_line(record: &ExtractedRecord) -> String {
    format_line_as(record, record.system_name(), false)
}

/// Formats a record under `system_name` (the name the operator asked for).
pub fn format_line_as(record: &ExtractedRecord, system_name: &str, include_initial_cp: bool) -> String {
    let mut columns = vec![
        system_name.to_string(),
        record.primary_faction().unwrap_or_default().to_string(),
        record.status().map(|s| s.keyword().to_string()).unwrap_or_default(),
        String::new(),
        blank_or(record.undermining_points()),
        blank_or(record.reinforcing_points()),
    ];
    if include_initial_cp {
        columns.push(blank_or(record.initial_control_points()));
    }
    columns.join("\t")
}

fn blank_or(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// One batch line read back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormattedRow {
    pub system_name: String,
    pub faction: Option<String>,
    pub status: Option<SystemStatus>,
    pub undermining: Option<u64>,
    pub reinforcing: Option<u64>,
    pub initial_control_points: Option<u64>,
}

/// Parses a batch line. Returns `None` for the header, separators, blank
/// lines and lines with fewer than six columns. Unreadable numbers are
/// treated as blank.
pub fn parse_line(line: &str) -> Option<FormattedRow> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    if trimmed.trim().is_empty()
        || trimmed.starts_with('-')
        || trimmed.starts_with('=')
        || trimmed.starts_with("System Name\t")
    {
        return None;
    }

    let parts: Vec<&str> = trimmed.split('\t').collect();
    if parts.len() < 6 {
        return None;
    }
    let system_name = parts[0].trim();
    if system_name.is_empty() {
        return None;
    }

    Some(FormattedRow {
        system_name: system_name.to_string(),
        faction: Some(parts[1].trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        status: SystemStatus::from_keyword(parts[2]),
        undermining: parse_count(parts[4]),
        reinforcing: parse_count(parts[5]),
        initial_control_points: parts.get(6).and_then(|p| parse_count(p)),
    })
}

fn parse_count(text: &str) -> Option<u64> {
    let digits = text.trim().replace(',', "");
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CompetitivePanel, Panel, RankedFaction, StandardPanel};

    fn standard() -> ExtractedRecord {
        ExtractedRecord::new(
            "COL 285 SECTOR AB-C D1",
            Some(SystemStatus::Stronghold),
            Panel::Standard(StandardPanel {
                controlling_faction: None,
                opposing_faction: Some("Pranav Antal".to_string()),
                undermining_points: Some(0),
                reinforcing_points: Some(45_210),
            }),
        )
        .with_initial_control_points(Some(1_250_000))
    }

    #[test]
    fn test_format_standard_line() {
        assert_eq!(
            format_line(&standard()),
            "COL 285 SECTOR AB-C D1\tPranav Antal\tSTRONGHOLD\t\t0\t45210"
        );
    }

    #[test]
    fn test_format_uses_requested_name_and_initial_cp() {
        let line = format_line_as(&standard(), "Col 285 Sector AB-C d1", true);
        assert_eq!(line, "Col 285 Sector AB-C d1\tPranav Antal\tSTRONGHOLD\t\t0\t45210\t1250000");
        assert_eq!(header(true).split('\t').count(), 7);
    }

    #[test]
    fn test_missing_values_are_blank() {
        let record = ExtractedRecord::new("Sol", None, Panel::Standard(StandardPanel::default()));
        assert_eq!(format_line(&record), "Sol\t\t\t\t\t");
    }

    #[test]
    fn test_competitive_line_uses_leader() {
        let record = ExtractedRecord::new(
            "HIP 1",
            Some(SystemStatus::Unoccupied),
            Panel::Competitive(CompetitivePanel {
                ranked_factions: vec![
                    RankedFaction { rank: 1, faction: "Yuri Grom".to_string(), score: Some(900) },
                    RankedFaction { rank: 2, faction: "Jerome Archer".to_string(), score: Some(300) },
                ],
                own_faction: None,
                own_rank: None,
            }),
        );
        assert_eq!(format_line(&record), "HIP 1\tYuri Grom\tUNOCCUPIED\t\t300\t900");
    }

    #[test]
    fn test_formatted_line_reads_back() {
        let record = standard();
        let row = parse_line(&format_line(&record)).unwrap();
        assert_eq!(row.faction.as_deref(), record.primary_faction());
        assert_eq!(row.status, record.status());
        assert_eq!(row.undermining, record.undermining_points());
        assert_eq!(row.reinforcing, record.reinforcing_points());
        assert_eq!(row.initial_control_points, None);
    }

    #[test]
    fn test_parse_line_skips_non_data() {
        assert_eq!(parse_line(HEADER), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("-----"), None);
        assert_eq!(parse_line("===="), None);
        assert_eq!(parse_line("Sol\tZachary Hudson\tFORTIFIED"), None);
    }

    #[test]
    fn test_parse_line_with_separators_and_garbage() {
        let row = parse_line("Sol\tZachary Hudson\tFortified\t\t12,345\tn/a").unwrap();
        assert_eq!(row.status, Some(SystemStatus::Fortified));
        assert_eq!(row.undermining, Some(12_345));
        assert_eq!(row.reinforcing, None);
    }
}
