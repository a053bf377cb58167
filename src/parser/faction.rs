//! Powerplay faction (power) recognition against a fixed catalog.

use anyhow::Result;
use regex::Regex;

use super::Line;
use crate::config::ParserConfig;
use crate::record::Matched;

/// Known powers as (first name, last name).
pub const FACTIONS: &[(&str, &str)] = &[
    ("ARISSA", "LAVIGNY-DUVAL"),
    ("AISLING", "DUVAL"),
    ("ZEMINA", "TORVAL"),
    ("DENTON", "PATREUS"),
    ("ZACHARY", "HUDSON"),
    ("FELICIA", "WINTERS"),
    ("EDMUND", "MAHON"),
    ("LI", "YONG-RUI"),
    ("PRANAV", "ANTAL"),
    ("ARCHON", "DELAINE"),
    ("YURI", "GROM"),
    ("NAKATO", "KAINE"),
    ("JEROME", "ARCHER"),
];

const ABBREVIATED_CONFIDENCE: f32 = 0.9;
const LAST_NAME_CONFIDENCE: f32 = 0.8;

/// Which side of the tug of war a faction is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Controlling,
    Opposing,
}

/// A faction found within a single line.
#[derive(Clone, Debug, PartialEq)]
pub struct LineMatch {
    pub name: String,
    /// Byte offset in the uppercase line just past the matched name.
    pub end: usize,
    /// Set when the last name was found on the following line.
    pub spans_next_line: bool,
    pub confidence: f32,
}

struct FactionPattern {
    display: String,
    full: Regex,
    first_only: Regex,
    last_at_start: Regex,
    abbreviated: Regex,
    last_only: Regex,
}

/// Compiled matchers for every catalog entry, longest last name first so a
/// surname that contains another (`LAVIGNY-DUVAL` / `DUVAL`) wins.
pub struct FactionCatalog {
    patterns: Vec<FactionPattern>,
}

impl FactionCatalog {
    pub fn new() -> Result<Self> {
        let mut entries: Vec<&(&str, &str)> = FACTIONS.iter().collect();
        entries.sort_by_key(|(_, last)| std::cmp::Reverse(last.len()));

        let patterns = entries
            .into_iter()
            .map(|&(first, surname)| {
                // OCR turns the hyphen into a space or a tilde, or drops it
                let last = surname.replace('-', r"[\-~_ ]?");
                let first_initial = &first[..1];
                Ok(FactionPattern {
                    display: display_name(first, surname),
                    full: Regex::new(&format!(r"\b{first}\W*{last}(?:[^A-Z\-]|$)"))?,
                    first_only: Regex::new(&format!(r"\b{first}\W*$"))?,
                    last_at_start: Regex::new(&format!(r"^\W*{last}(?:[^A-Z\-]|$)"))?,
                    abbreviated: Regex::new(&format!(
                        r"(?:^|[^A-Z]){first_initial}[.,]?\s*{last}(?:[^A-Z\-]|$)"
                    ))?,
                    last_only: Regex::new(&format!(r"(?:^|[^A-Z\-]){last}(?:[^A-Z\-]|$)"))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Finds a faction in `upper`, or starting in `upper` and finishing on `next`.
    pub fn find_in_line(&self, upper: &str, next: Option<&str>) -> Option<LineMatch> {
        for p in &self.patterns {
            if let Some(m) = p.full.find(upper) {
                return Some(LineMatch::new(&p.display, trim_end(upper, m.end()), false, 1.0));
            }
            if let (Some(m), Some(next)) = (p.first_only.find(upper), next) {
                if p.last_at_start.is_match(next) {
                    return Some(LineMatch::new(&p.display, m.end(), true, 1.0));
                }
            }
            if let Some(m) = p.abbreviated.find(upper) {
                return Some(LineMatch::new(
                    &p.display,
                    trim_end(upper, m.end()),
                    false,
                    ABBREVIATED_CONFIDENCE,
                ));
            }
        }
        // Surname-only matches are weaker than any fuller match on the line
        for p in &self.patterns {
            if let Some(m) = p.last_only.find(upper) {
                return Some(LineMatch::new(
                    &p.display,
                    trim_end(upper, m.end()),
                    false,
                    LAST_NAME_CONFIDENCE,
                ));
            }
        }
        None
    }
}

impl LineMatch {
    fn new(name: &str, end: usize, spans_next_line: bool, confidence: f32) -> Self {
        Self {
            name: name.to_string(),
            end,
            spans_next_line,
            confidence,
        }
    }
}

/// The trailing boundary character is part of the regex match; step back
/// over it so `end` points just past the name.
fn trim_end(upper: &str, end: usize) -> usize {
    match upper[..end].chars().last() {
        Some(c) if !c.is_ascii_alphabetic() => end - c.len_utf8(),
        _ => end,
    }
}

/// Controlling and opposing factions of a standard panel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FactionMatches {
    pub controlling: Option<Matched<String>>,
    pub opposing: Option<Matched<String>>,
}

/// Finds the first controlling and first opposing faction in `lines[start..]`.
pub fn find_factions(
    catalog: &FactionCatalog,
    lines: &[Line],
    start: usize,
    config: &ParserConfig,
) -> FactionMatches {
    let mut found = FactionMatches::default();

    let mut i = start;
    while i < lines.len() {
        let next = lines.get(i + 1).map(|l| l.upper.as_str());
        let Some(m) = catalog.find_in_line(&lines[i].upper, next) else {
            i += 1;
            continue;
        };

        let matched = if m.confidence >= 1.0 {
            Matched::exact(m.name, i)
        } else {
            Matched::fuzzy(m.name, m.confidence, i)
        };
        let slot = match role_of(lines, i, config.role_window) {
            Role::Controlling => &mut found.controlling,
            Role::Opposing => &mut found.opposing,
        };
        if slot.is_none() {
            *slot = Some(matched);
        }

        if found.controlling.is_some() && found.opposing.is_some() {
            break;
        }
        i += if m.spans_next_line { 2 } else { 1 };
    }

    found
}

/// Role from the nearest CONTROLLING / OPPOSING keyword within `window`
/// lines either side. Ties go to the keyword above the faction; no keyword
/// at all means controlling.
pub fn role_of(lines: &[Line], index: usize, window: usize) -> Role {
    let lo = index.saturating_sub(window);
    let hi = (index + window).min(lines.len().saturating_sub(1));

    let mut best: Option<(usize, bool, Role)> = None;
    for j in lo..=hi {
        let upper = &lines[j].upper;
        let role = if upper.contains("OPPOSING") {
            Role::Opposing
        } else if upper.contains("CONTROLLING") {
            Role::Controlling
        } else {
            continue;
        };
        let distance = index.abs_diff(j);
        let below = j > index;
        let better = match best {
            None => true,
            Some((d, b, _)) => distance < d || (distance == d && b && !below),
        };
        if better {
            best = Some((distance, below, role));
        }
    }

    best.map(|(_, _, role)| role).unwrap_or(Role::Controlling)
}

/// Title-cases a catalog entry: `LAVIGNY-DUVAL` becomes `Lavigny-Duval`.
pub fn display_name(first: &str, last: &str) -> String {
    format!("{} {}", title_case(first), title_case(last))
}

fn title_case(word: &str) -> String {
    word.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(c) => c.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::split_lines;
    use crate::record::MatchMethod;

    fn catalog() -> FactionCatalog {
        FactionCatalog::new().unwrap()
    }

    fn name_in(line: &str) -> Option<String> {
        catalog().find_in_line(line, None).map(|m| m.name)
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_name("ARISSA", "LAVIGNY-DUVAL"), "Arissa Lavigny-Duval");
        assert_eq!(display_name("LI", "YONG-RUI"), "Li Yong-Rui");
    }

    #[test]
    fn test_full_name() {
        assert_eq!(name_in("> NAKATO KAINE").as_deref(), Some("Nakato Kaine"));
        assert_eq!(name_in("LI YONG RUI").as_deref(), Some("Li Yong-Rui"));
    }

    #[test]
    fn test_longer_surname_wins() {
        assert_eq!(name_in("LAVIGNY-DUVAL").as_deref(), Some("Arissa Lavigny-Duval"));
        assert_eq!(name_in("LAVIGNY DUVAL").as_deref(), Some("Arissa Lavigny-Duval"));
        assert_eq!(name_in("AISLING DUVAL").as_deref(), Some("Aisling Duval"));
        assert_eq!(name_in("| DUVAL").as_deref(), Some("Aisling Duval"));
    }

    #[test]
    fn test_abbreviated_first_name() {
        let m = catalog().find_in_line("Z. HUDSON 12,000", None).unwrap();
        assert_eq!(m.name, "Zachary Hudson");
        assert_eq!(m.confidence, ABBREVIATED_CONFIDENCE);
        assert_eq!(&"Z. HUDSON 12,000"[m.end..], " 12,000");
    }

    #[test]
    fn test_name_split_over_two_lines() {
        let m = catalog().find_in_line("FELICIA", Some("WINTERS")).unwrap();
        assert_eq!(m.name, "Felicia Winters");
        assert!(m.spans_next_line);
    }

    #[test]
    fn test_surname_embedded_in_word_rejected() {
        assert!(name_in("GROMBRIDGE 34").is_none());
        assert!(name_in("ARCHERY").is_none());
    }

    #[test]
    fn test_roles_from_section_keywords() {
        let lines = split_lines(
            "TUG OF WAR\nOPPOSING POWERS\nEDMUND MAHON\nCONTROLLING POWER\nJEROME ARCHER",
        );
        let found = find_factions(&catalog(), &lines, 0, &ParserConfig::default());
        assert_eq!(found.opposing.as_ref().unwrap().value, "Edmund Mahon");
        assert_eq!(found.controlling.as_ref().unwrap().value, "Jerome Archer");
        assert_eq!(found.controlling.as_ref().unwrap().method, MatchMethod::Exact);
    }

    #[test]
    fn test_role_defaults_to_controlling() {
        let lines = split_lines("SOMETHING\nDENTON PATREUS");
        let found = find_factions(&catalog(), &lines, 0, &ParserConfig::default());
        assert_eq!(found.controlling.unwrap().value, "Denton Patreus");
        assert!(found.opposing.is_none());
    }
}
