//! Per-field OCR retry strategies.
//!
//! Each field has an ordered list of (region, preprocessing) pairs. The
//! extractor walks the list until the field is found, so the cheap
//! whole-panel passes run first and subsection crops only when needed.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::preprocess::PreprocessMethod;
use crate::record::FieldKind;

/// Image region an OCR pass runs on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum StrategySource {
    /// The whole cropped panel.
    Panel,
    /// A named subsection of the cropped panel.
    Subsection { section: String },
}

/// One OCR attempt.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(flatten)]
    pub source: StrategySource,
    pub method: PreprocessMethod,
}

impl Strategy {
    pub fn panel(method: PreprocessMethod) -> Self {
        Self {
            source: StrategySource::Panel,
            method,
        }
    }

    pub fn subsection(section: &str, method: PreprocessMethod) -> Self {
        Self {
            source: StrategySource::Subsection {
                section: section.to_string(),
            },
            method,
        }
    }

    /// Short label recorded in diagnostics, e.g. `panel/upscale` or
    /// `status_line/threshold`.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            StrategySource::Panel => write!(f, "panel/{}", self.method),
            StrategySource::Subsection { section } => write!(f, "{}/{}", section, self.method),
        }
    }
}

/// Ordered strategies for every field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyPlan {
    pub name: Vec<Strategy>,
    pub status: Vec<Strategy>,
    pub faction: Vec<Strategy>,
    pub scores: Vec<Strategy>,
    pub ranking: Vec<Strategy>,
}

impl StrategyPlan {
    pub fn for_field(&self, field: FieldKind) -> &[Strategy] {
        match field {
            FieldKind::Name => &self.name,
            FieldKind::Status => &self.status,
            FieldKind::Faction => &self.faction,
            FieldKind::Scores => &self.scores,
            FieldKind::Ranking => &self.ranking,
        }
    }
}

fn panel_passes_then(section: &str, extra: &[PreprocessMethod]) -> Vec<Strategy> {
    use PreprocessMethod::*;
    let mut list = vec![
        Strategy::panel(Upscale),
        Strategy::panel(Threshold),
        Strategy::panel(Clahe),
    ];
    list.extend(extra.iter().map(|&m| Strategy::subsection(section, m)));
    list
}

impl Default for StrategyPlan {
    fn default() -> Self {
        use PreprocessMethod::*;
        Self {
            name: panel_passes_then("name_line", &[Upscale, Threshold]),
            status: panel_passes_then("status_line", &[Upscale, Threshold, Enhanced]),
            faction: panel_passes_then("power_section", &[Upscale, Clahe]),
            scores: panel_passes_then("control_points", &[Upscale, Threshold, Enhanced]),
            ranking: panel_passes_then("power_ranking", &[Upscale, Enhanced]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(Strategy::panel(PreprocessMethod::Upscale).label(), "panel/upscale");
        assert_eq!(
            Strategy::subsection("status_line", PreprocessMethod::Threshold).label(),
            "status_line/threshold"
        );
    }

    #[test]
    fn test_default_plan_starts_with_panel_passes() {
        let plan = StrategyPlan::default();
        for field in [
            FieldKind::Name,
            FieldKind::Status,
            FieldKind::Faction,
            FieldKind::Scores,
            FieldKind::Ranking,
        ] {
            let list = plan.for_field(field);
            assert_eq!(list[0], Strategy::panel(PreprocessMethod::Upscale));
            assert!(list.len() > 3, "{field} has no subsection fallback");
        }
    }

    #[test]
    fn test_strategy_json_shape() {
        let parsed: Strategy =
            serde_json::from_str(r#"{"source":"subsection","section":"status_line","method":"clahe"}"#).unwrap();
        assert_eq!(parsed, Strategy::subsection("status_line", PreprocessMethod::Clahe));

        let panel: Strategy = serde_json::from_str(r#"{"source":"panel","method":"none"}"#).unwrap();
        assert_eq!(panel, Strategy::panel(PreprocessMethod::None));
    }

    #[test]
    fn test_partial_plan_keeps_other_defaults() {
        let plan: StrategyPlan =
            serde_json::from_str(r#"{"status":[{"source":"panel","method":"threshold"}]}"#).unwrap();
        assert_eq!(plan.status, vec![Strategy::panel(PreprocessMethod::Threshold)]);
        assert_eq!(plan.scores, StrategyPlan::default().scores);
    }
}
