//! Section header and system name recognition.

use anyhow::Result;
use regex::Regex;

use super::fuzzy::phrase_similarity;
use super::Line;
use crate::config::ParserConfig;
use crate::record::Matched;

pub const HEADER: &str = "POWERPLAY INFORMATION";

/// Leading noise tokens OCR produces from the panel's bullet glyphs.
const NOISE_PREFIXES: &[&str] = &["_ ", "A ", "V ", "> ", "- ", "| "];

/// Words that mark a line as some other part of the panel.
const EXCLUDED_WORDS: &[&str] = &[
    "DISTANCE",
    "MINUTES",
    "HOURS",
    "POWERPLAY",
    "UNOCCUPIED",
    "EXPLOITED",
    "FORTIFIED",
    "STRONGHOLD",
];

pub struct NameMatcher {
    candidate: Regex,
}

impl NameMatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            candidate: Regex::new(
                r"^([A-Z0-9][A-Z0-9\s\-]+?)(?:\s+LAST\s+UPDATED.*|[\s=,._]*)$",
            )?,
        })
    }

    /// Index and similarity of the first line that looks like the section header.
    pub fn find_header(&self, lines: &[Line], config: &ParserConfig) -> Option<(usize, f64)> {
        lines.iter().enumerate().find_map(|(i, line)| {
            let score = phrase_similarity(&line.upper, HEADER);
            (score >= config.similarity_threshold).then_some((i, score))
        })
    }

    /// Finds the system name in `lines[start..end]`.
    ///
    /// `header_confidence` is the similarity of the header match that opened
    /// the window (1.0 when no header was needed).
    pub fn find_name(
        &self,
        lines: &[Line],
        start: usize,
        end: usize,
        header_confidence: f64,
        config: &ParserConfig,
    ) -> Option<Matched<String>> {
        let end = end.min(lines.len());
        (start..end).find_map(|i| {
            let raw = self.candidate_name(&lines[i].upper, config)?;
            let corrected = correct_digit_confusions(&raw);
            let matched = if corrected == raw && header_confidence >= 1.0 {
                Matched::exact(corrected, i)
            } else {
                Matched::fuzzy(corrected, header_confidence as f32, i)
            };
            Some(matched)
        })
    }

    fn candidate_name(&self, upper: &str, config: &ParserConfig) -> Option<String> {
        let mut cleaned = upper.trim();
        for prefix in NOISE_PREFIXES {
            if let Some(rest) = cleaned.strip_prefix(prefix) {
                cleaned = rest.trim();
            }
        }

        let caps = self.candidate.captures(cleaned)?;
        let name = caps.get(1)?.as_str().split_whitespace().collect::<Vec<_>>().join(" ");

        if name.len() <= config.min_name_length {
            return None;
        }
        if name.split_whitespace().any(|w| EXCLUDED_WORDS.contains(&w)) {
            return None;
        }
        Some(name)
    }
}

/// Replaces letters OCR commonly reads in place of digits, but only inside
/// a number: after a digit and before a digit or dash, or after a dash and
/// before a digit (`D7-I9` becomes `D7-19`, `HIP 1S432` becomes `HIP 15432`).
pub fn correct_digit_confusions(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len());

    for (i, &c) in chars.iter().enumerate() {
        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        let in_number = match (prev, next) {
            (Some(p), Some(n)) if p.is_ascii_digit() => n.is_ascii_digit() || n == '-',
            (Some('-'), Some(n)) => n.is_ascii_digit(),
            _ => false,
        };

        let replacement = match c {
            'O' => '0',
            'I' | 'L' => '1',
            'S' => '5',
            'Z' => '2',
            'B' => '8',
            _ => c,
        };
        out.push(if in_number { replacement } else { c });
    }
    out
}
