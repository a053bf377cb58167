//! Undermining / reinforcing control point totals.
//!
//! The panel prints both totals on one line around a "CONTROL POINTS"
//! caption: `12,345 < CONTROL POINTS > 6,789`. That joint line is the
//! authoritative source. The UNDERMINING / REINFORCING labels are a
//! fallback for when the joint line is unreadable.

use anyhow::Result;
use regex::Regex;

use super::fuzzy::best_word_match;
use super::Line;
use crate::config::ParserConfig;
use crate::record::Matched;

const GARBLED_ZERO_CONFIDENCE: f32 = 0.6;
const LABEL_CONFIDENCE: f32 = 0.7;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreMatches {
    pub undermining: Option<Matched<u64>>,
    pub reinforcing: Option<Matched<u64>>,
}

pub struct ScoreMatcher {
    caption: Regex,
    number: Regex,
    standalone: Regex,
    garbled_zero: Regex,
    after_label: Regex,
}

impl ScoreMatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            caption: Regex::new(r"C[O0]NTR[O0]L\s*P[O0]INTS?")?,
            number: Regex::new(r"\d(?:[\d,.]*\d)?")?,
            standalone: Regex::new(r"^\W*(\d(?:[\d,.]*\d)?)\W*$")?,
            // One to three zero-lookalike glyphs with punctuation glued on,
            // not the start of a longer number
            garbled_zero: Regex::new(r"^[^\w]*([0OQD]{1,3})[^\w\s](?:\D|$)")?,
            after_label: Regex::new(r"^\W*(\d(?:[\d,.]*\d)?)")?,
        })
    }

    /// Finds both totals in `lines[start..]`.
    pub fn find_scores(&self, lines: &[Line], start: usize, config: &ParserConfig) -> ScoreMatches {
        let mut found = ScoreMatches {
            undermining: self.find_labelled(lines, start, "UNDERMINING", config),
            reinforcing: self.find_labelled(lines, start, "REINFORCING", config),
        };

        // The joint caption line overrides anything the labels produced
        if let Some(joint) = self.find_joint(lines, start) {
            if joint.undermining.is_some() {
                found.undermining = joint.undermining;
            }
            if joint.reinforcing.is_some() {
                found.reinforcing = joint.reinforcing;
            }
        }
        found
    }

    fn find_joint(&self, lines: &[Line], start: usize) -> Option<ScoreMatches> {
        lines.iter().enumerate().skip(start).find_map(|(i, line)| {
            let caption = self.caption.find(&line.upper)?;
            let before = &line.upper[..caption.start()];
            let after = &line.upper[caption.end()..];

            let left = self.number.find_iter(before).last();
            let right = self.number.find(after);

            let undermining = left
                .and_then(|m| parse_points(m.as_str()))
                .map(|v| Matched::exact(v, i));

            // A lone "0" next to the caption glyphs is often read as a short
            // run of round glyphs with trailing punctuation
            let garbled = self
                .garbled_zero
                .captures(after)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str());
            let reinforcing = match garbled {
                Some("0") => Some(Matched::exact(0, i)),
                Some(_) if undermining.is_some() => Some(Matched::fuzzy(0, GARBLED_ZERO_CONFIDENCE, i)),
                _ => right
                    .and_then(|m| parse_points(m.as_str()))
                    .map(|v| Matched::exact(v, i)),
            };

            if undermining.is_none() && reinforcing.is_none() {
                return None;
            }
            Some(ScoreMatches { undermining, reinforcing })
        })
    }

    /// Label fallback: number after the label on the same line, or a
    /// standalone number within the next `score_lookahead` lines.
    fn find_labelled(&self, lines: &[Line], start: usize, label: &str, config: &ParserConfig) -> Option<Matched<u64>> {
        for i in start..lines.len() {
            let upper = &lines[i].upper;
            let (label_end, confidence) = match upper.find(label) {
                Some(at) => (at + label.len(), LABEL_CONFIDENCE),
                None => match best_word_match(upper, label, config.length_tolerance) {
                    Some((end, similarity)) if similarity >= config.similarity_threshold => {
                        (end, LABEL_CONFIDENCE * similarity as f32)
                    }
                    _ => continue,
                },
            };

            if let Some(value) = self
                .after_label
                .captures(&upper[label_end..])
                .and_then(|c| parse_points(c.get(1)?.as_str()))
            {
                return Some(Matched::fallback(value, confidence, i));
            }

            let lookahead = (i + 1)..(i + 1 + config.score_lookahead).min(lines.len());
            for j in lookahead {
                if let Some(value) = self.standalone_number(&lines[j].upper) {
                    return Some(Matched::fallback(value, confidence, j));
                }
            }
        }
        None
    }

    /// First number token in `text`, if any.
    pub fn first_number(&self, text: &str) -> Option<u64> {
        self.number.find(text).and_then(|m| parse_points(m.as_str()))
    }

    /// Value of a line that holds nothing but a number.
    pub fn standalone_number(&self, upper: &str) -> Option<u64> {
        self.standalone
            .captures(upper)
            .and_then(|c| parse_points(c.get(1)?.as_str()))
    }
}

/// Parses a point total, ignoring thousands separators.
///
/// The game uses `,` but OCR frequently reads it as `.`; neither appears
/// as a decimal point in point totals.
pub fn parse_points(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| *c != ',' && *c != '.').collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::split_lines;
    use crate::record::MatchMethod;

    fn scores(text: &str) -> ScoreMatches {
        ScoreMatcher::new()
            .unwrap()
            .find_scores(&split_lines(text), 0, &ParserConfig::default())
    }

    fn values(m: &ScoreMatches) -> (Option<u64>, Option<u64>) {
        (
            m.undermining.as_ref().map(|v| v.value),
            m.reinforcing.as_ref().map(|v| v.value),
        )
    }

    #[test]
    fn test_parse_points() {
        assert_eq!(parse_points("12,345"), Some(12_345));
        assert_eq!(parse_points("1.234.567"), Some(1_234_567));
        assert_eq!(parse_points("0"), Some(0));
        assert_eq!(parse_points(",."), None);
        assert_eq!(parse_points("12a"), None);
    }

    #[test]
    fn test_joint_caption_variants() {
        for line in [
            "12,345 < CONTROL POINTS > 6,789",
            "12,345 CONTROL POINTS » 6,789",
            "12,345. CONTROL POINTS )) 6,789",
            "12.345 < C0NTROL P0INTS > 6.789",
        ] {
            let m = scores(line);
            assert_eq!(values(&m), (Some(12_345), Some(6_789)), "line: {line}");
            assert_eq!(m.undermining.unwrap().method, MatchMethod::Exact);
        }
    }

    #[test]
    fn test_explicit_zero() {
        assert_eq!(values(&scores("4,120 < CONTROL POINTS > 0")), (Some(4_120), Some(0)));
    }

    #[test]
    fn test_garbled_zero() {
        let m = scores("4,120 < CONTROL POINTS > Q)");
        assert_eq!(values(&m), (Some(4_120), Some(0)));
        assert_eq!(m.reinforcing.unwrap().method, MatchMethod::Fuzzy);
    }

    #[test]
    fn test_round_glyph_zero_variants() {
        for line in ["4,120 < CONTROL POINTS > O)", "4,120 < CONTROL POINTS > 00.", "4,120 < CONTROL POINTS > D,"] {
            let m = scores(line);
            assert_eq!(values(&m), (Some(4_120), Some(0)), "{line}");
            assert_eq!(m.reinforcing.unwrap().method, MatchMethod::Fuzzy, "{line}");
        }
        let m = scores("4,120 < CONTROL POINTS > 0.");
        assert_eq!(m.reinforcing.unwrap().method, MatchMethod::Exact);
    }

    #[test]
    fn test_short_number_with_punctuation_is_kept() {
        assert_eq!(values(&scores("4,120 < CONTROL POINTS > 15.")), (Some(4_120), Some(15)));
        assert_eq!(values(&scores("4,120 < CONTROL POINTS > 8)")), (Some(4_120), Some(8)));
    }

    #[test]
    fn test_fuzzy_label_reads_inline_number() {
        let m = scores("UNDERMINNG 500\n1,234\nREINFORCNG: 2,000");
        assert_eq!(values(&m), (Some(500), Some(2_000)));
        let under = m.undermining.unwrap();
        assert_eq!(under.method, MatchMethod::Fallback);
        assert_eq!(under.line, 0);
        assert!(under.confidence < LABEL_CONFIDENCE);
    }

    #[test]
    fn test_right_only_is_reinforcing() {
        assert_eq!(values(&scores("CONTROL POINTS > 31,337")), (None, Some(31_337)));
    }

    #[test]
    fn test_label_fallback_with_lookahead() {
        let m = scores("UNDERMINING\n\n2,500\nREINFORCING: 1,200");
        assert_eq!(values(&m), (Some(2_500), Some(1_200)));
        assert_eq!(m.undermining.as_ref().unwrap().method, MatchMethod::Fallback);
        assert_eq!(m.undermining.unwrap().line, 1);
    }

    #[test]
    fn test_joint_overrides_labels() {
        let m = scores("UNDERMINING 99\nREINFORCING 98\n12,345 < CONTROL POINTS > 6,789");
        assert_eq!(values(&m), (Some(12_345), Some(6_789)));
    }

    #[test]
    fn test_label_beyond_lookahead_ignored() {
        let m = scores("UNDERMINING\nA\nB\nC\n5,000");
        assert_eq!(values(&m), (None, None));
    }
}
