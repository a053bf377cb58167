//! Weekly Powerplay cycles.
//!
//! A cycle starts at a fixed weekday and hour (UTC) and lasts seven days.
//! Control points reset at the boundary, so only batches from the same
//! cycle are comparable.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use std::fmt;

use crate::config::ConsistencyConfig;

/// Weekly tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleBoundary {
    pub weekday: Weekday,
    /// UTC hour, 0..=23.
    pub hour: u32,
}

impl Default for CycleBoundary {
    fn default() -> Self {
        Self {
            weekday: Weekday::Thu,
            hour: 7,
        }
    }
}

impl CycleBoundary {
    pub fn from_config(config: &ConsistencyConfig) -> Self {
        let weekday = (0..config.tick_weekday % 7).fold(Weekday::Mon, |day, _| day.succ());
        Self {
            weekday,
            hour: config.tick_hour.min(23),
        }
    }

    /// Latest boundary at or before `ts`. A timestamp exactly on the
    /// boundary is its own cycle start.
    pub fn cycle_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        let days_back = (date.weekday().num_days_from_monday() + 7 - self.weekday.num_days_from_monday()) % 7;
        let tick_time = NaiveTime::from_hms_opt(self.hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        let candidate = (date - Duration::days(days_back as i64)).and_time(tick_time).and_utc();

        if candidate > ts {
            candidate - Duration::days(7)
        } else {
            candidate
        }
    }

    pub fn cycle_of(&self, ts: DateTime<Utc>) -> CycleId {
        CycleId(self.cycle_start(ts))
    }
}

/// Identifies a cycle by its start instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleId(DateTime<Utc>);

impl CycleId {
    pub fn start(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M UTC (%A)"))
    }
}

/// Interprets a naive local wall-clock time, as embedded in archive names.
///
/// `None` when the local time does not exist or is ambiguous (DST changes).
pub fn local_to_utc(local: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&local)
        .single()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_boundary_instant_is_its_own_start() {
        let tick = utc(2026, 1, 1, 7, 0, 0);
        assert_eq!(tick.weekday(), Weekday::Thu);
        assert_eq!(CycleBoundary::default().cycle_start(tick), tick);
    }

    #[test]
    fn test_one_second_before_boundary_is_previous_week() {
        let ts = utc(2026, 1, 1, 6, 59, 59);
        assert_eq!(CycleBoundary::default().cycle_start(ts), utc(2025, 12, 25, 7, 0, 0));
    }

    #[test]
    fn test_midweek_timestamps() {
        let b = CycleBoundary::default();
        // Monday and Wednesday go back to the prior Thursday
        assert_eq!(b.cycle_start(utc(2026, 1, 5, 12, 0, 0)), utc(2026, 1, 1, 7, 0, 0));
        assert_eq!(b.cycle_start(utc(2026, 1, 7, 23, 59, 59)), utc(2026, 1, 1, 7, 0, 0));
        // Saturday after the tick
        assert_eq!(b.cycle_start(utc(2026, 1, 3, 1, 0, 0)), utc(2026, 1, 1, 7, 0, 0));
        // Next Thursday after the tick starts a new cycle
        assert_eq!(b.cycle_start(utc(2026, 1, 8, 7, 0, 1)), utc(2026, 1, 8, 7, 0, 0));
    }

    #[test]
    fn test_same_cycle_comparison() {
        let b = CycleBoundary::default();
        assert_eq!(b.cycle_of(utc(2026, 1, 2, 0, 0, 0)), b.cycle_of(utc(2026, 1, 7, 0, 0, 0)));
        assert_ne!(b.cycle_of(utc(2026, 1, 7, 0, 0, 0)), b.cycle_of(utc(2026, 1, 8, 8, 0, 0)));
    }

    #[test]
    fn test_from_config() {
        let config = ConsistencyConfig {
            tick_weekday: 0,
            tick_hour: 30,
            ..Default::default()
        };
        let b = CycleBoundary::from_config(&config);
        assert_eq!(b.weekday, Weekday::Mon);
        assert_eq!(b.hour, 23);
        assert_eq!(CycleBoundary::from_config(&ConsistencyConfig::default()), CycleBoundary::default());
    }
}
