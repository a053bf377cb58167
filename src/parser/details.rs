//! Informational panel lines: distance, data age and penalties.

use anyhow::Result;
use regex::Regex;

use super::Line;
use crate::record::PanelDetails;

pub struct DetailMatcher {
    distance: Regex,
    age: Regex,
    penalty: Regex,
}

impl DetailMatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // "19,812.17LY" and the split-digit misread "19,839.2 1LY"
            distance: Regex::new(r"DISTANCE[:\s]+(\d[\d,.\s]*?)\s*LY")?,
            age: Regex::new(r"(\d+)\s+(SECOND|MINUTE|HOUR|DAY)S?\s+AGO")?,
            penalty: Regex::new(r"PENALTY[:\s]+(\w+)")?,
        })
    }

    /// Collects whatever details are present. `status_description` is left
    /// for the caller, which knows where the status line is.
    pub fn find_details(&self, lines: &[Line]) -> PanelDetails {
        let mut details = PanelDetails::default();

        for line in lines {
            let upper = line.upper.as_str();

            if details.distance_ly.is_none() {
                details.distance_ly = self
                    .distance
                    .captures(upper)
                    .and_then(|c| parse_distance(c.get(1)?.as_str()));
            }

            if details.last_updated.is_none() {
                details.last_updated = self.age.captures(upper).map(|c| {
                    format!("{} {}s ago", &c[1], c[2].to_ascii_lowercase())
                });
            }

            if upper.contains("SYSTEM STRENGTH PENALTY") && details.strength_penalty.is_none() {
                details.strength_penalty = self.penalty.captures(upper).map(|c| c[1].to_string());
            }

            if upper.contains("BEYOND FRONTLINE PENALTY") && details.frontline_penalty.is_none() {
                details.frontline_penalty = self.penalty.captures(upper).map(|c| c[1].to_string());
            }
        }

        details
    }
}

fn parse_distance(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::split_lines;

    fn details(text: &str) -> PanelDetails {
        DetailMatcher::new().unwrap().find_details(&split_lines(text))
    }

    #[test]
    fn test_distance_and_age() {
        let d = details("COL 359 SECTOR EK-L B10-4 LAST UPDATED: 5 MINUTES AGO\nDISTANCE: 19,812.17LY");
        assert_eq!(d.distance_ly, Some(19_812.17));
        assert_eq!(d.last_updated.as_deref(), Some("5 minutes ago"));
    }

    #[test]
    fn test_distance_with_split_digit() {
        let d = details("Distance: 19,839.2 1LY");
        assert_eq!(d.distance_ly, Some(19_839.21));
    }

    #[test]
    fn test_penalties() {
        let d = details("SYSTEM STRENGTH PENALTY: NONE\nBEYOND FRONTLINE PENALTY: HIGH");
        assert_eq!(d.strength_penalty.as_deref(), Some("NONE"));
        assert_eq!(d.frontline_penalty.as_deref(), Some("HIGH"));
    }

    #[test]
    fn test_missing_details_are_none() {
        assert_eq!(details("FORTIFIED"), PanelDetails::default());
    }
}
