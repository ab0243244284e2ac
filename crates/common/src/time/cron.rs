//! Cron expression parsing and evaluation
//!
//! Standard five-field format: `minute hour day-of-month month day-of-week`.
//! Fields accept `*`, single values, comma lists, `a-b` ranges and
//! `*/n` or `a/n` steps. Evaluation works in any [`TimeZone`], so a schedule
//! stored with an IANA zone fires on local wall-clock time.

use std::fmt;

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use thiserror::Error;

/// Upper bound for the minute-by-minute search in [`CronExpression::next_after`].
const SEARCH_HORIZON_MINUTES: u32 = 4 * 366 * 24 * 60;

/// Error type for cron parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CronParseError {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Too many fields: expected 5, got {0}")]
    TooManyFields(usize),

    #[error("Too few fields: expected 5, got {0}")]
    TooFewFields(usize),
}

/// A parsed cron expression
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use crmsync_common::time::cron::CronExpression;
///
/// // Every Monday at 9am
/// let cron = CronExpression::parse("0 9 * * 1").unwrap();
/// let after = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(); // a Monday
/// let next = cron.next_after(&after).unwrap();
/// assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    minute: CronField,
    hour: CronField,
    day: CronField,
    month: CronField,
    weekday: CronField,
}

impl CronExpression {
    /// Parse a cron expression from a string
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let parts: Vec<&str> = expr.split_whitespace().collect();

        if parts.len() < 5 {
            return Err(CronParseError::TooFewFields(parts.len()));
        }
        if parts.len() > 5 {
            return Err(CronParseError::TooManyFields(parts.len()));
        }

        Ok(Self {
            minute: CronField::parse(parts[0], 0, 59)?,
            hour: CronField::parse(parts[1], 0, 23)?,
            day: CronField::parse(parts[2], 1, 31)?,
            month: CronField::parse(parts[3], 1, 12)?,
            weekday: CronField::parse(parts[4], 0, 6)?,
        })
    }

    /// Check if a datetime matches this cron expression in its own zone.
    pub fn matches<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> bool {
        self.minute.matches(dt.minute())
            && self.hour.matches(dt.hour())
            && self.day.matches(dt.day())
            && self.month.matches(dt.month())
            && self.weekday.matches(dt.weekday().num_days_from_sunday())
    }

    /// First matching minute strictly after `dt`.
    ///
    /// Returns `None` when nothing matches within roughly four years
    /// (e.g. `0 0 31 2 *`).
    pub fn next_after<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let truncated = dt.with_second(0)?.with_nanosecond(0)?;
        let mut current = truncated + chrono::Duration::minutes(1);

        for _ in 0..SEARCH_HORIZON_MINUTES {
            if self.matches(&current) {
                return Some(current);
            }
            current = current + chrono::Duration::minutes(1);
        }

        None
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {} {}", self.minute, self.hour, self.day, self.month, self.weekday)
    }
}

/// A cron field (minute, hour, day, month, weekday)
#[derive(Debug, Clone, PartialEq, Eq)]
enum CronField {
    Any,
    Single(u32),
    List(Vec<u32>),
    Range(u32, u32),
    Step(u32, u32),
}

impl CronField {
    fn parse(s: &str, min: u32, max: u32) -> Result<Self, CronParseError> {
        if s == "*" {
            return Ok(Self::Any);
        }

        if s.contains(',') {
            let values = s
                .split(',')
                .map(|v| parse_value(v.trim(), s, min, max))
                .collect::<Result<Vec<u32>, _>>()?;
            return Ok(Self::List(values));
        }

        if let Some((start, step)) = s.split_once('/') {
            let start = if start == "*" { min } else { parse_value(start, s, min, max)? };
            let step: u32 =
                step.parse().map_err(|_| CronParseError::InvalidField(s.to_string()))?;
            if step == 0 {
                return Err(CronParseError::InvalidField(s.to_string()));
            }
            return Ok(Self::Step(start, step));
        }

        if let Some((start, end)) = s.split_once('-') {
            let start: u32 =
                start.parse().map_err(|_| CronParseError::InvalidField(s.to_string()))?;
            let end: u32 = end.parse().map_err(|_| CronParseError::InvalidField(s.to_string()))?;

            if start < min || end > max || start > end {
                return Err(CronParseError::InvalidRange(format!(
                    "{start}-{end} not valid in range {min}-{max}"
                )));
            }

            return Ok(Self::Range(start, end));
        }

        parse_value(s, s, min, max).map(Self::Single)
    }

    fn matches(&self, value: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Single(v) => *v == value,
            Self::List(values) => values.contains(&value),
            Self::Range(start, end) => value >= *start && value <= *end,
            Self::Step(start, step) => value >= *start && (value - start) % step == 0,
        }
    }
}

fn parse_value(raw: &str, field: &str, min: u32, max: u32) -> Result<u32, CronParseError> {
    let value: u32 = raw.parse().map_err(|_| CronParseError::InvalidField(field.to_string()))?;
    if value < min || value > max {
        return Err(CronParseError::InvalidRange(format!("{value} not in range {min}-{max}")));
    }
    Ok(value)
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Single(v) => write!(f, "{v}"),
            Self::List(values) => {
                let strs: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{}", strs.join(","))
            }
            Self::Range(start, end) => write!(f, "{start}-{end}"),
            Self::Step(start, step) => write!(f, "{start}/{step}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use chrono_tz::America::New_York;

    use super::*;

    #[test]
    fn parses_field_shapes() {
        let cron = CronExpression::parse("*/5 9-17 * * 1,3,5").unwrap();
        assert_eq!(cron.minute, CronField::Step(0, 5));
        assert_eq!(cron.hour, CronField::Range(9, 17));
        assert_eq!(cron.day, CronField::Any);
        assert_eq!(cron.weekday, CronField::List(vec![1, 3, 5]));
    }

    #[test]
    fn matches_specific_time() {
        let cron = CronExpression::parse("30 14 * * *").unwrap();

        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 14, 30, 0).unwrap();
        assert!(cron.matches(&dt));

        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 14, 31, 0).unwrap();
        assert!(!cron.matches(&dt));
    }

    #[test]
    fn next_after_is_strictly_later_and_aligned() {
        let cron = CronExpression::parse("0 0 * * *").unwrap();

        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 45).unwrap();
        let next = cron.next_after(&dt).unwrap();

        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn next_after_respects_timezone() {
        let cron = CronExpression::parse("0 9 * * *").unwrap();

        // 13:00 UTC on 2024-06-03 is 09:00 in New York (EDT); the next run is the day after
        let dt = Utc.with_ymd_and_hms(2024, 6, 3, 13, 0, 0).unwrap().with_timezone(&New_York);
        let next = cron.next_after(&dt).unwrap().with_timezone(&Utc);

        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 4, 13, 0, 0).unwrap());
    }

    #[test]
    fn rejects_invalid_expressions() {
        assert!(CronExpression::parse("invalid").is_err());
        assert!(CronExpression::parse("60 * * * *").is_err());
        assert!(CronExpression::parse("* 25 * * *").is_err());
        assert!(CronExpression::parse("*/0 * * * *").is_err());
        assert_eq!(
            CronExpression::parse("* * * * * *").unwrap_err(),
            CronParseError::TooManyFields(6)
        );
    }

    #[test]
    fn display_round_trips_shape() {
        let cron = CronExpression::parse("15 */2 1-7 * 0").unwrap();
        assert_eq!(cron.to_string(), "15 0/2 1-7 * 0");
    }
}
