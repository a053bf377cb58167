//! Record types produced by panel extraction.
//!
//! An [`ExtractedRecord`] is built once per screenshot and never edited in
//! place. Corrections (for example from a second preprocessing pass) go
//! through the consuming `with_*` builders, which hand back a replacement.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which of the two panel variants a screenshot shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelLayout {
    /// One controlling power with an undermining/reinforcing tug of war.
    Standard,
    /// Several powers competing for the system, shown as a ranking.
    Competitive,
}

/// Control status of a system, ordered by ascending reinforcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SystemStatus {
    Unoccupied,
    Exploited,
    Fortified,
    Stronghold,
}

impl SystemStatus {
    pub const ALL: [SystemStatus; 4] = [
        SystemStatus::Unoccupied,
        SystemStatus::Exploited,
        SystemStatus::Fortified,
        SystemStatus::Stronghold,
    ];

    /// The word the game prints on the panel.
    pub fn keyword(self) -> &'static str {
        match self {
            SystemStatus::Unoccupied => "UNOCCUPIED",
            SystemStatus::Exploited => "EXPLOITED",
            SystemStatus::Fortified => "FORTIFIED",
            SystemStatus::Stronghold => "STRONGHOLD",
        }
    }

    /// Case-insensitive lookup by panel keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let word = word.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.keyword().eq_ignore_ascii_case(word))
    }

    /// Status tier implied by a control point total on the 0..2,000,000 bar.
    ///
    /// Zero means unoccupied; Exploited covers up to 350K, Fortified up to
    /// 1M, Stronghold 1M and above.
    pub fn from_control_points(points: u64) -> Self {
        match points {
            0 => SystemStatus::Unoccupied,
            p if p < 350_000 => SystemStatus::Exploited,
            p if p < 1_000_000 => SystemStatus::Fortified,
            _ => SystemStatus::Stronghold,
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// How a field value was recognized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// Literal keyword or pattern match.
    Exact,
    /// Similarity match tolerating OCR letter substitutions.
    Fuzzy,
    /// Inferred from secondary evidence (description text, labels, lookahead).
    Fallback,
}

/// A parsed value together with where and how it was found.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matched<T> {
    pub value: T,
    pub method: MatchMethod,
    /// 1.0 for exact matches, similarity ratio otherwise.
    pub confidence: f32,
    /// Zero-based index of the OCR line the value came from.
    pub line: usize,
}

impl<T> Matched<T> {
    pub fn exact(value: T, line: usize) -> Self {
        Self { value, method: MatchMethod::Exact, confidence: 1.0, line }
    }

    pub fn fuzzy(value: T, confidence: f32, line: usize) -> Self {
        Self { value, method: MatchMethod::Fuzzy, confidence, line }
    }

    pub fn fallback(value: T, confidence: f32, line: usize) -> Self {
        Self { value, method: MatchMethod::Fallback, confidence, line }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Matched<U> {
        Matched {
            value: f(self.value),
            method: self.method,
            confidence: self.confidence,
            line: self.line,
        }
    }
}

/// Field groups that are extracted (and retried) independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Name,
    Status,
    Faction,
    Scores,
    Ranking,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldKind::Name => "name",
            FieldKind::Status => "status",
            FieldKind::Faction => "faction",
            FieldKind::Scores => "scores",
            FieldKind::Ranking => "ranking",
        };
        f.write_str(s)
    }
}

/// Provenance of one field in the final record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldProvenance {
    pub method: MatchMethod,
    pub confidence: f32,
    pub line: usize,
    /// Strategy label, e.g. `panel/upscale` or `status_line/threshold`.
    pub source: String,
}

/// Debugging information kept alongside a record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// OCR text of the whole panel with the primary preprocessing method.
    pub raw_text: String,
    pub fields: BTreeMap<FieldKind, FieldProvenance>,
}

/// A faction's position in a competitive ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedFaction {
    pub rank: u32,
    pub faction: String,
    pub score: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardPanel {
    pub controlling_faction: Option<String>,
    pub opposing_faction: Option<String>,
    pub undermining_points: Option<u64>,
    pub reinforcing_points: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitivePanel {
    /// Sorted by rank, one entry per rank.
    pub ranked_factions: Vec<RankedFaction>,
    pub own_faction: Option<String>,
    pub own_rank: Option<u32>,
}

/// Layout-specific part of a record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "lowercase")]
pub enum Panel {
    Standard(StandardPanel),
    Competitive(CompetitivePanel),
}

/// Secondary panel lines that are informative but never required.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelDetails {
    pub distance_ly: Option<f64>,
    /// Normalized age of the panel data, e.g. `5 minutes ago`.
    pub last_updated: Option<String>,
    pub status_description: Option<String>,
    pub strength_penalty: Option<String>,
    pub frontline_penalty: Option<String>,
}

/// Structured data for one captured system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    system_name: String,
    status: Option<SystemStatus>,
    panel: Panel,
    initial_control_points: Option<u64>,
    details: PanelDetails,
    diagnostics: Diagnostics,
}

impl ExtractedRecord {
    pub fn new(system_name: impl Into<String>, status: Option<SystemStatus>, panel: Panel) -> Self {
        Self {
            system_name: system_name.into(),
            status,
            panel,
            initial_control_points: None,
            details: PanelDetails::default(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Replaces the initial control points. Ignored for competitive panels,
    /// which have no status bar.
    pub fn with_initial_control_points(mut self, points: Option<u64>) -> Self {
        if self.layout() == PanelLayout::Standard {
            self.initial_control_points = points;
        }
        self
    }

    pub fn with_details(mut self, details: PanelDetails) -> Self {
        self.details = details;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    pub fn status(&self) -> Option<SystemStatus> {
        self.status
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn initial_control_points(&self) -> Option<u64> {
        self.initial_control_points
    }

    pub fn details(&self) -> &PanelDetails {
        &self.details
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn layout(&self) -> PanelLayout {
        match self.panel {
            Panel::Standard(_) => PanelLayout::Standard,
            Panel::Competitive(_) => PanelLayout::Competitive,
        }
    }

    pub fn controlling_faction(&self) -> Option<&str> {
        match &self.panel {
            Panel::Standard(p) => p.controlling_faction.as_deref(),
            Panel::Competitive(_) => None,
        }
    }

    pub fn opposing_faction(&self) -> Option<&str> {
        match &self.panel {
            Panel::Standard(p) => p.opposing_faction.as_deref(),
            Panel::Competitive(_) => None,
        }
    }

    /// Ranked entries; empty for standard panels.
    pub fn ranked_factions(&self) -> &[RankedFaction] {
        match &self.panel {
            Panel::Standard(_) => &[],
            Panel::Competitive(p) => &p.ranked_factions,
        }
    }

    /// The faction shown in the batch file: controlling, else opposing for
    /// standard panels; the leading faction for competitive panels.
    pub fn primary_faction(&self) -> Option<&str> {
        match &self.panel {
            Panel::Standard(p) => p
                .controlling_faction
                .as_deref()
                .or(p.opposing_faction.as_deref()),
            Panel::Competitive(_) => self.ranked(1).map(|r| r.faction.as_str()),
        }
    }

    /// Undermining total. For competitive panels this is the runner-up's score.
    pub fn undermining_points(&self) -> Option<u64> {
        match &self.panel {
            Panel::Standard(p) => p.undermining_points,
            Panel::Competitive(_) => self.ranked(2).and_then(|r| r.score),
        }
    }

    /// Reinforcing total. For competitive panels this is the leader's score.
    pub fn reinforcing_points(&self) -> Option<u64> {
        match &self.panel {
            Panel::Standard(p) => p.reinforcing_points,
            Panel::Competitive(_) => self.ranked(1).and_then(|r| r.score),
        }
    }

    fn ranked(&self, rank: u32) -> Option<&RankedFaction> {
        self.ranked_factions().iter().find(|r| r.rank == rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn competitive() -> ExtractedRecord {
        ExtractedRecord::new(
            "HIP 12345",
            Some(SystemStatus::Unoccupied),
            Panel::Competitive(CompetitivePanel {
                ranked_factions: vec![
                    RankedFaction { rank: 1, faction: "Nakato Kaine".into(), score: Some(52_000) },
                    RankedFaction { rank: 2, faction: "Jerome Archer".into(), score: Some(31_000) },
                ],
                own_faction: None,
                own_rank: None,
            }),
        )
    }

    #[test]
    fn test_status_keyword_lookup() {
        assert_eq!(SystemStatus::from_keyword("fortified"), Some(SystemStatus::Fortified));
        assert_eq!(SystemStatus::from_keyword(" STRONGHOLD "), Some(SystemStatus::Stronghold));
        assert_eq!(SystemStatus::from_keyword("contested"), None);
    }

    #[test]
    fn test_status_from_control_points() {
        assert_eq!(SystemStatus::from_control_points(0), SystemStatus::Unoccupied);
        assert_eq!(SystemStatus::from_control_points(1), SystemStatus::Exploited);
        assert_eq!(SystemStatus::from_control_points(349_999), SystemStatus::Exploited);
        assert_eq!(SystemStatus::from_control_points(350_000), SystemStatus::Fortified);
        assert_eq!(SystemStatus::from_control_points(1_000_000), SystemStatus::Stronghold);
    }

    #[test]
    fn test_status_ordering() {
        assert!(SystemStatus::Stronghold > SystemStatus::Fortified);
        assert!(SystemStatus::Exploited > SystemStatus::Unoccupied);
    }

    #[test]
    fn test_competitive_derived_scores() {
        let record = competitive();
        assert_eq!(record.layout(), PanelLayout::Competitive);
        assert_eq!(record.reinforcing_points(), Some(52_000));
        assert_eq!(record.undermining_points(), Some(31_000));
        assert_eq!(record.primary_faction(), Some("Nakato Kaine"));
        assert_eq!(record.controlling_faction(), None);
    }

    #[test]
    fn test_initial_cp_ignored_for_competitive() {
        let record = competitive().with_initial_control_points(Some(10));
        assert_eq!(record.initial_control_points(), None);
    }

    #[test]
    fn test_standard_primary_faction_falls_back_to_opposing() {
        let record = ExtractedRecord::new(
            "COL 285 SECTOR AB-C D1-2",
            Some(SystemStatus::Exploited),
            Panel::Standard(StandardPanel {
                opposing_faction: Some("Edmund Mahon".into()),
                ..Default::default()
            }),
        )
        .with_initial_control_points(Some(120_000));

        assert_eq!(record.primary_faction(), Some("Edmund Mahon"));
        assert_eq!(record.initial_control_points(), Some(120_000));
        assert!(record.ranked_factions().is_empty());
    }

    #[test]
    fn test_record_serializes_layout_tag() {
        let json = serde_json::to_value(competitive()).unwrap();
        assert_eq!(json["panel"]["layout"], "competitive");
        assert_eq!(json["status"], "UNOCCUPIED");
    }
}
