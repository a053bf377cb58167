//! Ranking of a competitive (contested) panel.

use anyhow::Result;
use regex::Regex;

use super::faction::FactionCatalog;
use super::scores::ScoreMatcher;
use super::Line;
use crate::config::ParserConfig;
use crate::record::{Matched, RankedFaction};

/// Parsed ranking block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ranking {
    /// Sorted by rank, at most one entry per rank.
    pub entries: Vec<RankedFaction>,
    pub own_faction: Option<String>,
    pub own_rank: Option<u32>,
}

pub struct RankMatcher {
    marker: Regex,
}

impl RankMatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // "I", "L" and "|" are common misreads of "1"
            marker: Regex::new(r"(?:^|[^A-Z0-9])(\d{1,2}|[IL|])\s*(ST|ND|RD|TH)\b")?,
        })
    }

    fn rank_in(&self, upper: &str) -> Option<(u32, usize)> {
        let caps = self.marker.captures(upper)?;
        let digits = caps.get(1)?;
        let rank = match digits.as_str() {
            "I" | "L" | "|" => 1,
            d => d.parse().ok()?,
        };
        let end = caps.get(0)?.end();
        (rank > 0).then_some((rank, end))
    }

    /// Parses ranked entries from `lines[start..]`. Returns `None` when the
    /// text has no ranking, i.e. the panel is not competitive.
    pub fn find_ranking(
        &self,
        catalog: &FactionCatalog,
        scores: &ScoreMatcher,
        lines: &[Line],
        start: usize,
        config: &ParserConfig,
    ) -> Option<Matched<Ranking>> {
        let mut ranking = Ranking::default();
        let mut first_line = None;
        let mut min_confidence = 1.0f32;

        let mut i = start;
        while i < lines.len() {
            let upper = lines[i].upper.as_str();
            let next = lines.get(i + 1).map(|l| l.upper.as_str());

            if upper.contains("YOUR") {
                let rank = self
                    .rank_in(upper)
                    .or_else(|| next.and_then(|n| self.rank_in(n)))
                    .map(|(r, _)| r);
                let faction = catalog
                    .find_in_line(upper, next)
                    .or_else(|| next.and_then(|n| catalog.find_in_line(n, None)))
                    .map(|m| m.name);
                ranking.own_rank = ranking.own_rank.or(rank);
                ranking.own_faction = ranking.own_faction.or(faction);
                i += 1;
                continue;
            }

            let Some((rank, marker_end)) = self.rank_in(upper) else {
                i += 1;
                continue;
            };

            // Faction after the marker on the same line, or on the next line
            let rest = &upper[marker_end..];
            let (faction, score_text, faction_line) = match catalog.find_in_line(rest, next) {
                Some(m) if m.spans_next_line => (m, None, i + 1),
                Some(m) => {
                    let tail = &rest[m.end..];
                    (m, Some(tail), i)
                }
                None => match next.and_then(|n| catalog.find_in_line(n, None).map(|m| (m, n))) {
                    Some((m, n)) => {
                        let tail = &n[m.end..];
                        (m, Some(tail), i + 1)
                    }
                    None => {
                        i += 1;
                        continue;
                    }
                },
            };

            let score = score_text
                .and_then(|t| scores.first_number(t))
                .or_else(|| {
                    let from = faction_line + 1;
                    let to = (from + config.rank_score_lookahead).min(lines.len());
                    (from..to).find_map(|j| scores.standalone_number(&lines[j].upper))
                });

            if !ranking.entries.iter().any(|e| e.rank == rank) {
                min_confidence = min_confidence.min(faction.confidence);
                first_line.get_or_insert(i);
                ranking.entries.push(RankedFaction {
                    rank,
                    faction: faction.name,
                    score,
                });
            }
            i = faction_line + 1;
        }

        let line = first_line?;
        ranking.entries.sort_by_key(|e| e.rank);
        Some(if min_confidence >= 1.0 {
            Matched::exact(ranking, line)
        } else {
            Matched::fuzzy(ranking, min_confidence, line)
        })
    }
}
