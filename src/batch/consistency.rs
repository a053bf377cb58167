//! Cross-batch plausibility checks.
//!
//! Within a cycle control points only grow. A decrease therefore points at
//! an OCR error in one of the two batches, and so does an increase by a
//! factor of nine or more (typically a digit inserted by OCR). Findings are
//! reported; nothing here rejects data.

use std::fmt;
use tracing::{info, warn};

use super::cycle::CycleId;
use super::{ScorePair, ScoreSheet};
use crate::config::{ConsistencyConfig, DEFAULT_JUMP_RATIO};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    /// `current / previous` at or above which an increase is suspicious.
    pub jump_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            jump_ratio: DEFAULT_JUMP_RATIO,
        }
    }
}

impl From<&ConsistencyConfig> for Thresholds {
    fn from(config: &ConsistencyConfig) -> Self {
        Self {
            jump_ratio: config.jump_ratio,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreField {
    Undermining,
    Reinforcing,
}

impl fmt::Display for ScoreField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScoreField::Undermining => "Undermining",
            ScoreField::Reinforcing => "Reinforcing",
        })
    }
}

/// A score that differs between two batches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoreChange {
    pub system: String,
    pub field: ScoreField,
    pub previous: u64,
    pub current: u64,
}

impl ScoreChange {
    /// Signed change, negative for a decrease. Saturates at the `i64` range.
    pub fn delta(&self) -> i64 {
        let delta = i128::from(self.current) - i128::from(self.previous);
        i64::try_from(delta).unwrap_or(if delta < 0 { i64::MIN } else { i64::MAX })
    }

    /// `current / previous`, undefined for a previous value of zero.
    pub fn ratio(&self) -> Option<f64> {
        (self.previous > 0).then(|| self.current as f64 / self.previous as f64)
    }
}

impl fmt::Display for ScoreChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} -> {} ({:+})",
            self.system,
            self.field,
            self.previous,
            self.current,
            self.delta()
        )?;
        if let Some(ratio) = self.ratio().filter(|r| *r > 1.0) {
            write!(f, " x{:.1}", ratio)?;
        }
        Ok(())
    }
}

/// Result of comparing two batches of the same cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Comparison {
    /// Systems present in both batches.
    pub compared: usize,
    /// Compared systems whose scores did not change.
    pub unchanged: usize,
    /// Decreases.
    pub violations: Vec<ScoreChange>,
    /// Increases by at least the jump ratio.
    pub suspicious_jumps: Vec<ScoreChange>,
    /// Ordinary increases.
    pub increases: Vec<ScoreChange>,
    /// Systems absent from the previous batch.
    pub new_systems: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConsistencyReport {
    NoPriorBatch,
    DifferentCycle { previous: CycleId, current: CycleId },
    Compared(Comparison),
}

/// Compares `current` against `previous`. Pure; never fails.
pub fn check(current: &ScoreSheet, previous: Option<&ScoreSheet>, thresholds: &Thresholds) -> ConsistencyReport {
    let Some(previous) = previous else {
        return ConsistencyReport::NoPriorBatch;
    };
    if previous.cycle != current.cycle {
        return ConsistencyReport::DifferentCycle {
            previous: previous.cycle,
            current: current.cycle,
        };
    }

    let mut comparison = Comparison::default();
    for (system, now) in &current.scores {
        let Some(before) = previous.scores.get(system) else {
            comparison.new_systems.push(system.clone());
            continue;
        };
        comparison.compared += 1;

        let mut changed = false;
        for change in changes(system, before, now) {
            changed = true;
            if change.current < change.previous {
                comparison.violations.push(change);
            } else if change.ratio().is_some_and(|r| r >= thresholds.jump_ratio) {
                comparison.suspicious_jumps.push(change);
            } else {
                comparison.increases.push(change);
            }
        }
        if !changed {
            comparison.unchanged += 1;
        }
    }

    ConsistencyReport::Compared(comparison)
}

/// Field changes where both values are known.
fn changes(system: &str, before: &ScorePair, now: &ScorePair) -> Vec<ScoreChange> {
    [
        (ScoreField::Undermining, before.undermining, now.undermining),
        (ScoreField::Reinforcing, before.reinforcing, now.reinforcing),
    ]
    .into_iter()
    .filter_map(|(field, previous, current)| match (previous, current) {
        (Some(previous), Some(current)) if previous != current => Some(ScoreChange {
            system: system.to_string(),
            field,
            previous,
            current,
        }),
        _ => None,
    })
    .collect()
}

impl ConsistencyReport {
    /// True when something needs manual verification.
    pub fn has_findings(&self) -> bool {
        match self {
            ConsistencyReport::Compared(c) => !c.violations.is_empty() || !c.suspicious_jumps.is_empty(),
            _ => false,
        }
    }

    /// Writes the report to the log. Findings are warnings.
    pub fn log(&self) {
        match self {
            ConsistencyReport::NoPriorBatch => {
                info!("No previous capture to compare against");
            }
            ConsistencyReport::DifferentCycle { previous, current } => {
                info!(
                    "Previous capture is from a different cycle ({} vs {}); CP validation skipped",
                    previous, current
                );
            }
            ConsistencyReport::Compared(c) => {
                info!(
                    "Compared {} systems: {} unchanged, {} increased, {} decreased, {} suspicious, {} new",
                    c.compared,
                    c.unchanged,
                    c.increases.len(),
                    c.violations.len(),
                    c.suspicious_jumps.len(),
                    c.new_systems.len()
                );
                for v in &c.violations {
                    warn!("CP decreased, verify manually: {}", v);
                }
                for j in &c.suspicious_jumps {
                    warn!("Suspicious CP jump, possible extra digit: {}", j);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::cycle::CycleBoundary;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn sheet(day: u32, entries: &[(&str, Option<u64>, Option<u64>)]) -> ScoreSheet {
        let captured_at = Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap();
        ScoreSheet {
            captured_at,
            cycle: CycleBoundary::default().cycle_of(captured_at),
            scores: entries
                .iter()
                .map(|(name, u, r)| {
                    (name.to_string(), ScorePair { undermining: *u, reinforcing: *r })
                })
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn compared(report: ConsistencyReport) -> Comparison {
        match report {
            ConsistencyReport::Compared(c) => c,
            other => panic!("expected comparison, got {other:?}"),
        }
    }

    #[test]
    fn test_no_prior_batch() {
        let current = sheet(2, &[("Sol", Some(1), Some(1))]);
        assert_eq!(check(&current, None, &Thresholds::default()), ConsistencyReport::NoPriorBatch);
    }

    #[test]
    fn test_different_cycle_skips_comparison() {
        let previous = sheet(7, &[("Sol", Some(100), Some(50))]);
        let current = sheet(8, &[("Sol", Some(1), Some(1))]);
        let report = check(&current, Some(&previous), &Thresholds::default());
        assert!(matches!(report, ConsistencyReport::DifferentCycle { .. }));
        assert!(!report.has_findings());
    }

    #[test]
    fn test_decrease_is_single_violation() {
        let previous = sheet(2, &[("Sol", Some(100), Some(50))]);
        let current = sheet(3, &[("Sol", Some(90), Some(50))]);
        let c = compared(check(&current, Some(&previous), &Thresholds::default()));
        assert_eq!(c.violations.len(), 1);
        assert_eq!(c.violations[0].field, ScoreField::Undermining);
        assert_eq!(c.violations[0].delta(), -10);
        assert!(c.increases.is_empty());
        assert_eq!(c.compared, 1);
    }

    #[test]
    fn test_jump_ratio_boundary() {
        let previous = sheet(2, &[("A", Some(1_000), None), ("B", Some(1_000), None)]);
        let current = sheet(3, &[("A", Some(9_500), None), ("B", Some(8_900), None)]);
        let c = compared(check(&current, Some(&previous), &Thresholds::default()));
        assert_eq!(c.suspicious_jumps.len(), 1);
        assert_eq!(c.suspicious_jumps[0].system, "A");
        assert_eq!(c.increases.len(), 1);
        assert_eq!(c.increases[0].system, "B");
    }

    #[test]
    fn test_zero_previous_is_ordinary_increase() {
        let previous = sheet(2, &[("Sol", Some(0), Some(0))]);
        let current = sheet(3, &[("Sol", Some(5_000), Some(0))]);
        let c = compared(check(&current, Some(&previous), &Thresholds::default()));
        assert!(c.suspicious_jumps.is_empty());
        assert_eq!(c.increases.len(), 1);
    }

    #[test]
    fn test_missing_values_and_new_systems() {
        let previous = sheet(2, &[("Sol", None, Some(10)), ("Gone", Some(1), Some(1))]);
        let current = sheet(
            3,
            &[("Sol", Some(5), Some(10)), ("Achenar", Some(1), Some(1))],
        );
        let c = compared(check(&current, Some(&previous), &Thresholds::default()));
        assert_eq!(c.compared, 1);
        assert_eq!(c.unchanged, 1);
        assert_eq!(c.new_systems, vec!["Achenar".to_string()]);
        assert!(c.violations.is_empty());
    }

    #[test]
    fn test_delta_saturates_on_huge_values() {
        let change = |previous, current| ScoreChange {
            system: "Sol".to_string(),
            field: ScoreField::Reinforcing,
            previous,
            current,
        };
        assert_eq!(change(0, u64::MAX).delta(), i64::MAX);
        assert_eq!(change(u64::MAX, 0).delta(), i64::MIN);
        assert_eq!(change(u64::MAX, u64::MAX - 5).delta(), -5);
        assert!(change(u64::MAX, 1).to_string().contains(&i64::MIN.to_string()));
    }

    #[test]
    fn test_custom_jump_ratio() {
        let previous = sheet(2, &[("Sol", Some(100), None)]);
        let current = sheet(3, &[("Sol", Some(500), None)]);
        let thresholds = Thresholds::from(&ConsistencyConfig {
            jump_ratio: 5.0,
            ..Default::default()
        });
        let report = check(&current, Some(&previous), &thresholds);
        assert!(report.has_findings());
    }
}
