//! OCR text to structured panel fields.
//!
//! [`PanelParser`] compiles every pattern once and then parses any number of
//! OCR texts. Each field is matched greedily (first hit wins) and carries a
//! [`Matched`] wrapper saying how it was found. Fields that cannot be found
//! are `None`; parsing itself never fails.

pub mod details;
pub mod faction;
pub mod fuzzy;
pub mod name;
pub mod ranked;
pub mod scores;
pub mod status;

use anyhow::Result;

use crate::config::ParserConfig;
use crate::record::{
    CompetitivePanel, Diagnostics, ExtractedRecord, FieldKind, FieldProvenance, MatchMethod,
    Matched, Panel, PanelDetails, PanelLayout, StandardPanel, SystemStatus,
};
use details::DetailMatcher;
use faction::{find_factions, FactionCatalog};
use name::NameMatcher;
use ranked::{RankMatcher, Ranking};
use scores::ScoreMatcher;

/// One non-blank OCR line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    /// Trimmed text as recognized.
    pub text: String,
    pub upper: String,
}

/// Splits OCR output into trimmed, non-blank lines. Line indices used
/// throughout the parser refer to this list.
pub fn split_lines(text: &str) -> Vec<Line> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| Line {
            text: l.to_string(),
            upper: l.to_uppercase(),
        })
        .collect()
}

/// What kind of text is being parsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseMode {
    /// Whole panel: the system name must follow the section header.
    Panel,
    /// A cropped subsection that may not include the header.
    Subsection,
}

/// Every field the parser recognized in one text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedPanel {
    pub system_name: Option<Matched<String>>,
    pub status: Option<Matched<SystemStatus>>,
    pub controlling_faction: Option<Matched<String>>,
    pub opposing_faction: Option<Matched<String>>,
    pub undermining: Option<Matched<u64>>,
    pub reinforcing: Option<Matched<u64>>,
    pub ranking: Option<Matched<Ranking>>,
    pub details: PanelDetails,
}

impl ParsedPanel {
    /// Competitive when at least one ranked entry was found.
    pub fn layout(&self) -> PanelLayout {
        if self.ranking.is_some() {
            PanelLayout::Competitive
        } else {
            PanelLayout::Standard
        }
    }

    /// True when this parse produced a value for `field`.
    pub fn has(&self, field: FieldKind) -> bool {
        self.provenance(field, "").is_some()
    }

    /// Match details for `field`, tagged with the strategy `source`.
    ///
    /// Faction and score groups report their weakest member.
    pub fn provenance(&self, field: FieldKind, source: &str) -> Option<FieldProvenance> {
        let (method, confidence, line) = match field {
            FieldKind::Name => meta(self.system_name.as_ref()?),
            FieldKind::Status => meta(self.status.as_ref()?),
            FieldKind::Faction => weakest(meta_opt(&self.controlling_faction), meta_opt(&self.opposing_faction))?,
            FieldKind::Scores => weakest(meta_opt(&self.undermining), meta_opt(&self.reinforcing))?,
            FieldKind::Ranking => meta(self.ranking.as_ref()?),
        };
        Some(FieldProvenance {
            method,
            confidence,
            line,
            source: source.to_string(),
        })
    }

    /// True when every member of `field` is present. Faction and score
    /// groups need both sides; a single side is only a partial result.
    pub fn is_complete(&self, field: FieldKind) -> bool {
        match field {
            FieldKind::Faction => self.controlling_faction.is_some() && self.opposing_faction.is_some(),
            FieldKind::Scores => self.undermining.is_some() && self.reinforcing.is_some(),
            _ => self.has(field),
        }
    }

    /// Moves the members of `field` that this parse lacks out of `other`.
    /// Members already present are kept. Returns true when anything moved.
    pub fn merge_field(&mut self, other: &mut ParsedPanel, field: FieldKind) -> bool {
        match field {
            FieldKind::Name => fill(&mut self.system_name, &mut other.system_name),
            FieldKind::Status => {
                let moved = fill(&mut self.status, &mut other.status);
                if moved {
                    self.details.status_description = other.details.status_description.take();
                }
                moved
            }
            FieldKind::Faction => {
                // The same power cannot hold both sides
                if same_power(&other.controlling_faction, &self.opposing_faction) {
                    other.controlling_faction = None;
                }
                if same_power(&other.opposing_faction, &self.controlling_faction) {
                    other.opposing_faction = None;
                }
                let controlling = fill(&mut self.controlling_faction, &mut other.controlling_faction);
                let opposing = fill(&mut self.opposing_faction, &mut other.opposing_faction);
                controlling || opposing
            }
            FieldKind::Scores => {
                let undermining = fill(&mut self.undermining, &mut other.undermining);
                let reinforcing = fill(&mut self.reinforcing, &mut other.reinforcing);
                undermining || reinforcing
            }
            FieldKind::Ranking => fill(&mut self.ranking, &mut other.ranking),
        }
    }

    /// Builds the immutable record. The layout follows the ranking: with a
    /// ranking the standard-panel fields are dropped, and vice versa.
    pub fn into_record(self, diagnostics: Diagnostics) -> ExtractedRecord {
        let panel = match self.ranking {
            Some(ranking) => {
                let ranking = ranking.value;
                Panel::Competitive(CompetitivePanel {
                    ranked_factions: ranking.entries,
                    own_faction: ranking.own_faction,
                    own_rank: ranking.own_rank,
                })
            }
            None => Panel::Standard(StandardPanel {
                controlling_faction: self.controlling_faction.map(|m| m.value),
                opposing_faction: self.opposing_faction.map(|m| m.value),
                undermining_points: self.undermining.map(|m| m.value),
                reinforcing_points: self.reinforcing.map(|m| m.value),
            }),
        };

        ExtractedRecord::new(
            self.system_name.map(|m| m.value).unwrap_or_default(),
            self.status.map(|m| m.value),
            panel,
        )
        .with_details(self.details)
        .with_diagnostics(diagnostics)
    }
}

fn fill<T>(slot: &mut Option<T>, source: &mut Option<T>) -> bool {
    if slot.is_some() || source.is_none() {
        return false;
    }
    *slot = source.take();
    true
}

fn same_power(a: &Option<Matched<String>>, b: &Option<Matched<String>>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a.value == b.value)
}

type Meta = (MatchMethod, f32, usize);

fn meta<T>(m: &Matched<T>) -> Meta {
    (m.method, m.confidence, m.line)
}

fn meta_opt<T>(m: &Option<Matched<T>>) -> Option<Meta> {
    m.as_ref().map(meta)
}

fn weakest(a: Option<Meta>, b: Option<Meta>) -> Option<Meta> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.1 < a.1 { b } else { a }),
        (a, b) => a.or(b),
    }
}

/// Parser for Powerplay panel OCR text.
pub struct PanelParser {
    config: ParserConfig,
    names: NameMatcher,
    factions: FactionCatalog,
    scores: ScoreMatcher,
    ranks: RankMatcher,
    details: DetailMatcher,
}

impl PanelParser {
    pub fn new(config: ParserConfig) -> Result<Self> {
        Ok(Self {
            config,
            names: NameMatcher::new()?,
            factions: FactionCatalog::new()?,
            scores: ScoreMatcher::new()?,
            ranks: RankMatcher::new()?,
            details: DetailMatcher::new()?,
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses every field from `text`.
    pub fn parse(&self, text: &str, mode: ParseMode) -> ParsedPanel {
        let lines = split_lines(text);
        let config = &self.config;

        let header = self.names.find_header(&lines, config);
        let body_start = header.map(|(i, _)| i + 1).unwrap_or(0);

        let system_name = match (header, mode) {
            (Some((i, similarity)), _) => {
                self.names
                    .find_name(&lines, i + 1, i + 1 + config.name_window, similarity, config)
            }
            (None, ParseMode::Subsection) => {
                self.names.find_name(&lines, 0, config.name_window + 1, 1.0, config)
            }
            (None, ParseMode::Panel) => None,
        };

        let status = status::find_status(&lines, body_start, config);
        let ranking = self
            .ranks
            .find_ranking(&self.factions, &self.scores, &lines, body_start, config);

        let (factions, score_matches) = if ranking.is_some() {
            Default::default()
        } else {
            (
                find_factions(&self.factions, &lines, body_start, config),
                self.scores.find_scores(&lines, body_start, config),
            )
        };

        let mut details = self.details.find_details(&lines);
        details.status_description = status
            .as_ref()
            .filter(|m| m.method != MatchMethod::Fallback)
            .and_then(|m| status::description_after(&lines, m.line));

        ParsedPanel {
            system_name,
            status,
            controlling_faction: factions.controlling,
            opposing_faction: factions.opposing,
            undermining: score_matches.undermining,
            reinforcing: score_matches.reinforcing,
            ranking,
            details,
        }
    }

    /// Parses a whole-panel text straight into a record.
    pub fn parse_record(&self, text: &str) -> ExtractedRecord {
        let parsed = self.parse(text, ParseMode::Panel);
        let mut diagnostics = Diagnostics {
            raw_text: text.to_string(),
            ..Default::default()
        };
        for field in [
            FieldKind::Name,
            FieldKind::Status,
            FieldKind::Faction,
            FieldKind::Scores,
            FieldKind::Ranking,
        ] {
            if let Some(p) = parsed.provenance(field, "text") {
                diagnostics.fields.insert(field, p);
            }
        }
        parsed.into_record(diagnostics)
    }
}
