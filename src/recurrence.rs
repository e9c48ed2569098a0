//! Recurrence expressions and next-occurrence arithmetic.
//!
//! An expression is one of five shapes, tried in this order (first match wins):
//!
//! | shape          | examples                         | next occurrence               |
//! |----------------|----------------------------------|-------------------------------|
//! | daily          | `day`, `daily`, `every day`      | anchor + 1 day                |
//! | weekday list   | `mon,wed,fri`, `monday,thursday` | first listed weekday after it |
//! | single weekday | `tue`                            | first such weekday after it   |
//! | monthly        | `15`                             | that day of the month         |
//! | yearly         | `25 dec`, `4 july`               | that day of that month        |
//!
//! `everyday` is read as daily too.
//!
//! Matching is case-insensitive. Every result is strictly later than the
//! anchor and keeps the anchor's time of day. Arithmetic is wall-clock
//! arithmetic in the local time zone.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use thiserror::Error;

const DAILY: [&str; 4] = ["day", "daily", "everyday", "every day"];

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("sun", Weekday::Sun),
    ("mon", Weekday::Mon),
    ("tue", Weekday::Tue),
    ("wed", Weekday::Wed),
    ("thu", Weekday::Thu),
    ("fri", Weekday::Fri),
    ("sat", Weekday::Sat),
];

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Longest each month can be (February in a leap year).
const MAX_MONTH_DAYS: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("unsupported recurrence pattern: {0}")]
    Unsupported(String),

    #[error("recurring task must have either due_date or due_datetime")]
    MissingDue,

    #[error("next occurrence after {0} is outside the supported calendar range")]
    OutOfRange(NaiveDateTime),
}

/// A classified recurrence expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recurrence {
    Daily,
    /// Any of several weekdays. Sorted from Monday, no duplicates.
    Weekdays(Vec<Weekday>),
    Weekly(Weekday),
    /// Day of month, 1-31. Clamped to the month's last day when it is shorter.
    Monthly(u32),
    /// Day and month (1-12). A 29 February rule lands on the 28th in common years.
    Yearly { day: u32, month: u32 },
}

impl Recurrence {
    /// Classifies a non-empty expression.
    pub fn parse(expression: &str) -> Result<Self, RecurrenceError> {
        let unsupported = || RecurrenceError::Unsupported(expression.to_string());
        let expr = expression.trim().to_lowercase();

        if DAILY.contains(&expr.as_str()) {
            return Ok(Self::Daily);
        }

        if expr.contains(',') {
            let mut days = expr
                .split(',')
                .map(|token| weekday_prefix(token.trim()))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(unsupported)?;
            days.sort_by_key(|d| d.num_days_from_monday());
            days.dedup();
            return Ok(Self::Weekdays(days));
        }

        if let Some(day) = weekday_exact(&expr) {
            return Ok(Self::Weekly(day));
        }

        let parts: Vec<&str> = expr.split_whitespace().collect();
        match parts.as_slice() {
            [day] => {
                let day: u32 = day.parse().map_err(|_| unsupported())?;
                if !(1..=31).contains(&day) {
                    return Err(unsupported());
                }
                Ok(Self::Monthly(day))
            }
            [day, month] => {
                let day: u32 = day.parse().map_err(|_| unsupported())?;
                let month = month_prefix(month).ok_or_else(unsupported)?;
                if day == 0 || day > MAX_MONTH_DAYS[month as usize - 1] {
                    return Err(unsupported());
                }
                Ok(Self::Yearly { day, month })
            }
            _ => Err(unsupported()),
        }
    }

    /// First occurrence strictly after `anchor`, at the anchor's time of day.
    ///
    /// `None` only when the result would fall outside chrono's calendar.
    pub fn next_after(&self, anchor: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Self::Daily => anchor.checked_add_days(Days::new(1)),
            Self::Weekdays(days) => next_weekday(anchor, days),
            Self::Weekly(day) => next_weekday(anchor, std::slice::from_ref(day)),
            Self::Monthly(day) => next_monthly(anchor, *day),
            Self::Yearly { day, month } => next_yearly(anchor, *day, *month),
        }
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
            Self::Daily => f.write_str("daily"),
            Self::Weekdays(days) => {
                let names: Vec<&str> = days.iter().map(|d| weekday_name(*d)).collect();
                f.write_str(&names.join(","))
            }
            Self::Weekly(day) => f.write_str(weekday_name(*day)),
            Self::Monthly(day) => write!(f, "{day}"),
            Self::Yearly { day, month } => write!(f, "{day} {}", MONTHS[*month as usize - 1]),
        }
    }
}

/// Next due instant for `expression`, evaluated from `anchor` (or `now` when
/// there is no anchor).
///
/// An empty expression means "no recurrence" and yields `Ok(None)`.
pub fn next_due(
    expression: &str,
    anchor: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<Option<NaiveDateTime>, RecurrenceError> {
    if expression.trim().is_empty() {
        return Ok(None);
    }
    let rule = Recurrence::parse(expression)?;
    let from = anchor.unwrap_or(now);
    rule.next_after(from)
        .map(Some)
        .ok_or(RecurrenceError::OutOfRange(from))
}

/// Accepts the empty expression and anything that evaluates against `now`.
pub fn validate(expression: &str, now: NaiveDateTime) -> Result<(), RecurrenceError> {
    next_due(expression, Some(now), now).map(|_| ())
}

/// Validation for a task about to be stored: a recurring task also needs a due
/// field to advance.
pub fn validate_task_recurrence(
    expression: &str,
    due_date: Option<NaiveDate>,
    due_datetime: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<(), RecurrenceError> {
    if expression.trim().is_empty() {
        return Ok(());
    }
    if due_date.is_none() && due_datetime.is_none() {
        return Err(RecurrenceError::MissingDue);
    }
    validate(expression, now)
}

fn weekday_exact(token: &str) -> Option<Weekday> {
    WEEKDAYS.iter().find(|(name, _)| *name == token).map(|(_, d)| *d)
}

/// Weekday from the first three characters of `token`.
fn weekday_prefix(token: &str) -> Option<Weekday> {
    token.get(..3).and_then(weekday_exact)
}

fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAYS
        .iter()
        .find(|(_, d)| *d == day)
        .map(|(name, _)| *name)
        .unwrap_or("mon")
}

/// Month number (1-12) from the first three characters of `token`.
fn month_prefix(token: &str) -> Option<u32> {
    let prefix = token.get(..3)?;
    MONTHS.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

fn next_weekday(anchor: NaiveDateTime, days: &[Weekday]) -> Option<NaiveDateTime> {
    for offset in 1..=7 {
        let candidate = anchor.checked_add_days(Days::new(offset))?;
        if days.contains(&candidate.weekday()) {
            return Some(candidate);
        }
    }
    anchor.checked_add_days(Days::new(7))
}

fn next_monthly(anchor: NaiveDateTime, day: u32) -> Option<NaiveDateTime> {
    let (mut year, mut month) = (anchor.year(), anchor.month());
    // This month, then next month; the second candidate is always later.
    for _ in 0..2 {
        let candidate = clamped(year, month, day, anchor.time())?;
        if candidate > anchor {
            return Some(candidate);
        }
        (year, month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    }
    clamped(year, month, day, anchor.time())
}

fn next_yearly(anchor: NaiveDateTime, day: u32, month: u32) -> Option<NaiveDateTime> {
    let candidate = clamped(anchor.year(), month, day, anchor.time())?;
    if candidate > anchor {
        return Some(candidate);
    }
    clamped(anchor.year() + 1, month, day, anchor.time())
}

/// `year-month-day` at `time`, with `day` pulled back to the month's last day.
fn clamped(year: i32, month: u32, day: u32, time: NaiveTime) -> Option<NaiveDateTime> {
    let day = day.min(days_in_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.and_time(time))
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|d| d.day())
}
