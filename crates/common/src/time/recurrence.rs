//! Recurrence expressions for sync schedules
//!
//! Accepted forms:
//! - named: `hourly`, `daily`, `weekly`, `monthly`
//! - fixed interval: `15m`, `6h`, `2d`, optionally prefixed with `every`
//!   (`every 30m`)
//! - five-field cron: `0 */6 * * *`
//!
//! Calendar-based forms (`daily`, `weekly`, `monthly`, cron) are evaluated in
//! the schedule's timezone so they keep their wall-clock time across DST
//! changes. Fixed intervals are plain elapsed durations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, Months, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use super::cron::{CronExpression, CronParseError};

/// Error type for recurrence parsing
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("Empty recurrence expression")]
    Empty,

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error(transparent)]
    Cron(#[from] CronParseError),
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recurrence {
    /// One hour after the previous run.
    Hourly,
    /// Same local time on the next day.
    Daily,
    /// Same local time seven days on.
    Weekly,
    /// Same day next month, clamped to the month length.
    Monthly,
    /// Fixed elapsed interval, always positive.
    Every(chrono::Duration),
    /// Five-field cron expression.
    Cron(CronExpression),
}

impl Recurrence {
    /// Parse a recurrence expression.
    pub fn parse(expr: &str) -> Result<Self, RecurrenceError> {
        let normalized = expr.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(RecurrenceError::Empty);
        }

        match normalized.as_str() {
            "hourly" => return Ok(Self::Hourly),
            "daily" => return Ok(Self::Daily),
            "weekly" => return Ok(Self::Weekly),
            "monthly" => return Ok(Self::Monthly),
            _ => {}
        }

        if normalized.split_whitespace().count() == 5 {
            return Ok(Self::Cron(CronExpression::parse(&normalized)?));
        }

        let interval = normalized.strip_prefix("every").map_or(normalized.as_str(), str::trim);
        parse_interval(interval).map(Self::Every)
    }

    /// Next occurrence strictly after `after`, evaluated in `tz`.
    ///
    /// `None` means the rule never fires again (only possible for cron
    /// expressions with impossible dates).
    pub fn next_after(&self, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&tz);
        let next = match self {
            Self::Hourly => Some(local + chrono::Duration::hours(1)),
            Self::Daily => local.checked_add_days(Days::new(1)),
            Self::Weekly => local.checked_add_days(Days::new(7)),
            Self::Monthly => local.checked_add_months(Months::new(1)),
            Self::Every(interval) => Some(local + *interval),
            Self::Cron(cron) => cron.next_after(&local),
        };
        next.map(|dt| dt.with_timezone(&Utc))
    }
}

impl FromStr for Recurrence {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hourly => write!(f, "hourly"),
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
            Self::Every(interval) => write!(f, "every {}m", interval.num_minutes()),
            Self::Cron(cron) => write!(f, "{cron}"),
        }
    }
}

/// Resolve an IANA timezone name such as `Europe/Berlin`.
pub fn parse_timezone(name: &str) -> Result<Tz, RecurrenceError> {
    name.trim().parse::<Tz>().map_err(|_| RecurrenceError::UnknownTimezone(name.to_string()))
}

fn parse_interval(raw: &str) -> Result<chrono::Duration, RecurrenceError> {
    let invalid = || RecurrenceError::InvalidInterval(raw.to_string());

    let split = raw.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
    let (digits, unit) = raw.split_at(split);
    let value: i64 = digits.parse().map_err(|_| invalid())?;
    if value <= 0 {
        return Err(invalid());
    }

    match unit.trim() {
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(chrono::Duration::minutes(value)),
        "h" | "hr" | "hour" | "hours" => Ok(chrono::Duration::hours(value)),
        "d" | "day" | "days" => Ok(chrono::Duration::days(value)),
        _ => Err(invalid()),
    }
}
