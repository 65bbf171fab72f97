//! Cron Expiry Module
//!
//! Absolute-time expiry for `get`: an entry is stale when the cron schedule
//! has fired since the entry was last updated.
//!
//! Supports the standard five fields `minute hour day month weekday` with
//! `*`, single values, ranges (`1-5`), steps (`*/15`, `0-30/10`) and lists
//! (`1,15,30`). Weekday 0 and 7 are both Sunday. When both day fields are
//! restricted a date matches if either one does, as in classic cron.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, DurationRound, NaiveDate, Timelike, Utc};
use thiserror::Error;

/// Error type for cron parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CronParseError {
    #[error("Invalid cron expression '{0}': expected 5 fields")]
    FieldCount(String),

    #[error("Invalid {field} field: '{value}'")]
    InvalidField { field: &'static str, value: String },
}

// == Cron Expiry Trait ==
/// Evaluator the engine consults for absolute-time expiry.
pub trait CronExpiry: Send + Sync {
    /// Returns true if the schedule fired in `(since, now]`.
    fn has_more_recent_match_since(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, CronParseError>;
}

// == Cron Expression ==
/// A parsed five-field cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    source: String,
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    weekdays: u64,
    days_restricted: bool,
    weekdays_restricted: bool,
}

impl CronExpression {
    /// Parses a cron expression.
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, day, month, weekday] = parts.as_slice() else {
            return Err(CronParseError::FieldCount(expr.to_string()));
        };

        let mut weekdays = parse_field(weekday, "weekday", 0, 7)?;
        if weekdays & (1 << 7) != 0 {
            weekdays = (weekdays & !(1 << 7)) | 1;
        }

        Ok(Self {
            source: expr.trim().to_string(),
            minutes: parse_field(minute, "minute", 0, 59)?,
            hours: parse_field(hour, "hour", 0, 23)?,
            days: parse_field(day, "day", 1, 31)?,
            months: parse_field(month, "month", 1, 12)?,
            weekdays,
            days_restricted: *day != "*",
            weekdays_restricted: *weekday != "*",
        })
    }

    /// Checks whether the minute containing `at` matches the schedule.
    pub fn matches(&self, at: &DateTime<Utc>) -> bool {
        self.date_matches(at)
            && bit(self.minutes, at.minute())
            && bit(self.hours, at.hour())
            && bit(self.months, at.month())
    }

    fn date_matches(&self, at: &DateTime<Utc>) -> bool {
        let day_ok = bit(self.days, at.day());
        let weekday_ok = bit(self.weekdays, at.weekday().num_days_from_sunday());
        if self.days_restricted && self.weekdays_restricted {
            day_ok || weekday_ok
        } else {
            day_ok && weekday_ok
        }
    }

    // == Backward Search ==
    /// Latest matching minute in `(since, now]`.
    ///
    /// Walks backwards a field at a time: a month that cannot match is
    /// skipped whole, then days, then hours, and the minute is read off the
    /// bitmask. The walk stops as soon as it passes `since`.
    pub fn latest_match_between(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let mut current = now.duration_trunc(Duration::minutes(1)).ok()?;

        while current > since {
            current = if !bit(self.months, current.month()) {
                start_of_month(current)? - Duration::minutes(1)
            } else if !self.date_matches(&current) {
                start_of_day(current)? - Duration::minutes(1)
            } else if !bit(self.hours, current.hour()) {
                current.with_minute(0)? - Duration::minutes(1)
            } else {
                match highest_bit_at_most(self.minutes, current.minute()) {
                    Some(minute) => {
                        let fired = current.with_minute(minute)?;
                        return (fired > since).then_some(fired);
                    }
                    None => current.with_minute(0)? - Duration::minutes(1),
                }
            };
        }
        None
    }
}

impl CronExpiry for CronExpression {
    fn has_more_recent_match_since(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, CronParseError> {
        Ok(self.latest_match_between(since, now).is_some())
    }
}

/// Raw expressions are parsed on every evaluation, so a malformed one only
/// fails when the engine consults it.
impl CronExpiry for String {
    fn has_more_recent_match_since(
        &self,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, CronParseError> {
        CronExpression::parse(self)?.has_more_recent_match_since(since, now)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// == Field Parsing ==
fn bit(mask: u64, value: u32) -> bool {
    mask & (1u64 << value) != 0
}

/// Largest set bit no greater than `value` (at most 59).
fn highest_bit_at_most(mask: u64, value: u32) -> Option<u32> {
    let masked = mask & ((1u64 << (value + 1)) - 1);
    (masked != 0).then(|| 63 - masked.leading_zeros())
}

fn start_of_day(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(at.date_naive().and_hms_opt(0, 0, 0)?.and_utc())
}

fn start_of_month(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let first = NaiveDate::from_ymd_opt(at.year(), at.month(), 1)?;
    Some(first.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Parses one comma-separated field into a bitmask of allowed values.
fn parse_field(raw: &str, field: &'static str, min: u32, max: u32) -> Result<u64, CronParseError> {
    let invalid = || CronParseError::InvalidField {
        field,
        value: raw.to_string(),
    };

    let mut mask = 0u64;
    for part in raw.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, step.parse::<u32>().map_err(|_| invalid())?),
            None => (part, 1),
        };
        if step == 0 {
            return Err(invalid());
        }

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            let lo = lo.parse::<u32>().map_err(|_| invalid())?;
            let hi = hi.parse::<u32>().map_err(|_| invalid())?;
            (lo, hi)
        } else {
            let value = range.parse::<u32>().map_err(|_| invalid())?;
            // "5/15" means "from 5 to the end, every 15"
            if part.contains('/') {
                (value, max)
            } else {
                (value, value)
            }
        };

        if start < min || end > max || start > end {
            return Err(invalid());
        }

        let mut value = start;
        while value <= end {
            mask |= 1u64 << value;
            value += step;
        }
    }
    Ok(mask)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        assert!(matches!(
            CronExpression::parse("* * * *"),
            Err(CronParseError::FieldCount(_))
        ));
        assert!(CronExpression::parse("* * * * * *").is_err());
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        let err = CronExpression::parse("60 * * * *").unwrap_err();
        assert_eq!(
            err,
            CronParseError::InvalidField {
                field: "minute",
                value: "60".into()
            }
        );
        assert!(CronExpression::parse("* * 0 * *").is_err());
        assert!(CronExpression::parse("*/0 * * * *").is_err());
        assert!(CronExpression::parse("5-1 * * * *").is_err());
        assert!(CronExpression::parse("abc * * * *").is_err());
    }

    #[test]
    fn test_matches_fixed_time() {
        let cron = CronExpression::parse("30 9 * * *").unwrap();

        assert!(cron.matches(&at(2024, 3, 4, 9, 30)));
        assert!(!cron.matches(&at(2024, 3, 4, 9, 31)));
    }

    #[test]
    fn test_matches_steps_and_lists() {
        let cron = CronExpression::parse("*/15 8-10 * * 1,3").unwrap();

        // 2024-03-04 is a Monday
        assert!(cron.matches(&at(2024, 3, 4, 8, 45)));
        assert!(!cron.matches(&at(2024, 3, 4, 8, 50)));
        assert!(!cron.matches(&at(2024, 3, 5, 8, 45)));
        assert!(!cron.matches(&at(2024, 3, 4, 11, 0)));
    }

    #[test]
    fn test_sunday_as_seven() {
        let cron = CronExpression::parse("0 0 * * 7").unwrap();
        // 2024-03-03 is a Sunday
        assert!(cron.matches(&at(2024, 3, 3, 0, 0)));
    }

    #[test]
    fn test_day_fields_combine_with_or() {
        let cron = CronExpression::parse("0 0 1 * 1").unwrap();

        // First of the month (a Friday) and any Monday both match
        assert!(cron.matches(&at(2024, 3, 1, 0, 0)));
        assert!(cron.matches(&at(2024, 3, 4, 0, 0)));
        assert!(!cron.matches(&at(2024, 3, 5, 0, 0)));
    }

    #[test]
    fn test_has_more_recent_match_since() {
        let hourly = CronExpression::parse("0 * * * *").unwrap();
        let now = at(2024, 3, 4, 10, 20);

        // Fired at 10:00, after an update at 09:59
        assert!(hourly
            .has_more_recent_match_since(at(2024, 3, 4, 9, 59), now)
            .unwrap());
        // Not fired since an update at 10:05
        assert!(!hourly
            .has_more_recent_match_since(at(2024, 3, 4, 10, 5), now)
            .unwrap());
    }

    #[test]
    fn test_string_evaluator_reports_parse_errors() {
        let raw = "not a cron".to_string();
        let now = at(2024, 3, 4, 10, 0);

        assert!(raw.has_more_recent_match_since(now, now).is_err());
        assert!("0 * * * *"
            .to_string()
            .has_more_recent_match_since(at(2024, 3, 4, 9, 0), now)
            .unwrap());
    }

    #[test]
    fn test_impossible_date_never_matches() {
        let cron = CronExpression::parse("0 0 31 2 *").unwrap();
        let found = cron.latest_match_between(at(1990, 1, 1, 0, 0), at(2024, 3, 4, 10, 0));
        assert!(found.is_none());
    }

    #[test]
    fn test_latest_match_is_exact() {
        let cron = CronExpression::parse("*/15 8-10 * * 1,3").unwrap();

        // Tuesday 09:00 looks back to Monday 10:45
        let found = cron.latest_match_between(at(2024, 3, 1, 0, 0), at(2024, 3, 5, 9, 0));
        assert_eq!(found, Some(at(2024, 3, 4, 10, 45)));

        // Seconds past a matching minute still land on that minute
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 8, 30, 42).unwrap();
        let found = cron.latest_match_between(at(2024, 3, 1, 0, 0), now);
        assert_eq!(found, Some(at(2024, 3, 4, 8, 30)));
    }

    #[test]
    fn test_leap_day_found_beyond_a_year() {
        let cron = CronExpression::parse("0 0 29 2 *").unwrap();
        let now = at(2025, 6, 1, 0, 0);

        // Updated in 2021, last fired on 2024-02-29
        assert_eq!(
            cron.latest_match_between(at(2021, 1, 1, 0, 0), now),
            Some(at(2024, 2, 29, 0, 0))
        );
        assert!(cron
            .has_more_recent_match_since(at(2021, 1, 1, 0, 0), now)
            .unwrap());

        // Updated after the last leap day
        assert!(!cron
            .has_more_recent_match_since(at(2024, 3, 1, 0, 0), now)
            .unwrap());
    }

    #[test]
    fn test_sparse_schedule_search_is_bounded() {
        let yearly = CronExpression::parse("0 0 1 1 *").unwrap();
        let impossible = CronExpression::parse("0 0 30 2 *").unwrap();
        let since = at(2014, 6, 1, 0, 0);
        let now = at(2024, 12, 31, 23, 59);

        let started = std::time::Instant::now();
        for _ in 0..200 {
            assert!(yearly.has_more_recent_match_since(since, now).unwrap());
            assert!(!impossible.has_more_recent_match_since(since, now).unwrap());
        }
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}
