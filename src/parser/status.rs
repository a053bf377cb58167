//! System status recognition.
//!
//! The status keyword sits on its own line below the system name, followed
//! by a one-sentence description and the tug-of-war section. Direct matches
//! go through three tiers (whole word, glued noise prefix, per-word
//! similarity); when none of them hits, the description sentence decides.

use super::fuzzy::{best_word_similarity, contains_word, words};
use super::Line;
use crate::config::ParserConfig;
use crate::record::{Matched, SystemStatus};

/// Lines that start the next panel section. Status scanning stops here.
const SECTION_TERMINATORS: &[&str] = &[
    "TUG OF WAR",
    "OF WAR",
    "OPPOSING",
    "CONTROLLING POWER",
    "CONTROL POINTS",
];

/// Lines with these are never the status line itself.
const NON_STATUS_MARKERS: &[&str] = &[
    "PENALTY",
    "POINTS",
    "SYSTEMS",
    "NEARBY",
    "HAVE",
    "MAINTAIN",
    "CONTROL OVER",
];

/// Single glyphs the panel's checkbox icon is often read as, glued to the word.
const GLUED_PREFIXES: &[char] = &['V', 'Y', 'W', 'P'];

/// Description phrases, most specific first.
const DESCRIPTIONS: &[(&str, SystemStatus)] = &[
    ("LOW CONTROL SCORE", SystemStatus::Exploited),
    ("VERY HIGH LEVEL OF REINFORCEMENT", SystemStatus::Stronghold),
    ("HIGH LEVEL OF REINFORCEMENT", SystemStatus::Fortified),
    ("NOT CONTROLLED BY", SystemStatus::Unoccupied),
];

const GLUED_PREFIX_CONFIDENCE: f32 = 0.9;
const DESCRIPTION_CONFIDENCE: f32 = 0.8;

/// Finds the status in `lines[start..]`.
pub fn find_status(lines: &[Line], start: usize, config: &ParserConfig) -> Option<Matched<SystemStatus>> {
    let end = section_end(lines, start);

    for i in start..end {
        if !is_status_candidate(&lines[i]) {
            continue;
        }
        if let Some(found) = match_line(&lines[i].upper, i, config) {
            return Some(found);
        }
    }

    find_by_description(lines, start, end)
}

/// Index of the first line after `start` that belongs to a later section.
pub fn section_end(lines: &[Line], start: usize) -> usize {
    (start..lines.len())
        .find(|&i| SECTION_TERMINATORS.iter().any(|t| lines[i].upper.contains(t)))
        .unwrap_or(lines.len())
}

fn is_status_candidate(line: &Line) -> bool {
    if NON_STATUS_MARKERS.iter().any(|m| line.upper.contains(m)) {
        return false;
    }
    // A legend line names several statuses at once
    let named = SystemStatus::ALL
        .iter()
        .filter(|s| line.upper.contains(s.keyword()))
        .count();
    if named >= 2 {
        return false;
    }
    !is_sentence(&line.text)
}

/// Descriptive sentences are printed in mixed case; status words are not.
fn is_sentence(text: &str) -> bool {
    text.split_whitespace()
        .filter(|w| w.chars().filter(|c| c.is_ascii_lowercase()).count() >= 3)
        .count()
        >= 2
}

fn match_line(upper: &str, index: usize, config: &ParserConfig) -> Option<Matched<SystemStatus>> {
    // Tier 1: whole word
    if let Some(status) = SystemStatus::ALL
        .into_iter()
        .find(|s| contains_word(upper, s.keyword()))
    {
        return Some(Matched::exact(status, index));
    }

    // Tier 2: icon glyph glued to the front of the word
    for word in words(upper) {
        let Some(rest) = word.strip_prefix(GLUED_PREFIXES) else {
            continue;
        };
        if let Some(status) = SystemStatus::from_keyword(rest) {
            return Some(Matched::fuzzy(status, GLUED_PREFIX_CONFIDENCE, index));
        }
    }

    // Tier 3: per-word similarity
    SystemStatus::ALL
        .into_iter()
        .map(|s| (s, best_word_similarity(upper, s.keyword(), config.length_tolerance)))
        .filter(|(_, score)| *score >= config.similarity_threshold)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(s, score)| Matched::fuzzy(s, score as f32, index))
}

fn find_by_description(lines: &[Line], start: usize, end: usize) -> Option<Matched<SystemStatus>> {
    for i in start..end {
        let single = lines[i].upper.as_str();
        let joined = lines
            .get(i + 1)
            .filter(|_| i + 1 < end)
            .map(|next| format!("{} {}", single, next.upper));

        for (phrase, status) in DESCRIPTIONS {
            let hit = single.contains(phrase)
                || joined.as_deref().is_some_and(|j| j.contains(phrase));
            if hit {
                return Some(Matched::fallback(*status, DESCRIPTION_CONFIDENCE, i));
            }
        }
    }
    None
}

/// The description sentence printed under the status line, if any.
pub fn description_after(lines: &[Line], status_line: usize) -> Option<String> {
    const NOT_DESCRIPTION: &[&str] = &["TUG", "WAR", "OPPOSING", "CONTROL", "POWERPLAY"];

    let next = lines.get(status_line + 1)?;
    let plausible = next.text.len() > 20 && !NOT_DESCRIPTION.iter().any(|k| next.upper.contains(k));
    plausible.then(|| next.text.clone())
}
