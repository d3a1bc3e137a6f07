//! Trigger construction
//!
//! Turns a persisted [`Schedule`] into something that can answer "when is
//! the next firing after T". Calendar schedules are compiled into a 7-field
//! expression for the `cron` crate (`sec min hour day month dow year`); the
//! ISO week field has no cron equivalent and is applied as a filter on top.
//! Everything is evaluated in UTC.

use chime_core::domain::schedule::{CronSchedule, IntervalSchedule, Schedule};
use chrono::{DateTime, Datelike, Days, TimeDelta, Utc};
use thiserror::Error;

/// Calendar fields from most to least significant
const FIELD_NAMES: [&str; 8] = [
    "year",
    "month",
    "day",
    "week",
    "day_of_week",
    "hour",
    "minute",
    "second",
];

/// Values for unset fields below the least significant explicit one
const FIELD_DEFAULTS: [&str; 8] = ["*", "1", "1", "*", "*", "0", "0", "0"];

const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Upper bound on whole-week jumps while looking for a matching ISO week
const MAX_WEEK_SKIPS: usize = 53 * 10;

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("cron schedule sets no fields")]
    EmptyCron,

    #[error("invalid {field} value '{value}': {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid cron expression '{expression}': {source}")]
    InvalidCron {
        expression: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("interval must be longer than zero seconds")]
    ZeroInterval,

    #[error("interval is too long")]
    IntervalTooLong,
}

/// A live schedule that yields fire times
#[derive(Debug, Clone)]
pub enum Trigger {
    Cron(CronTrigger),
    Interval(IntervalTrigger),
}

#[derive(Debug, Clone)]
pub struct CronTrigger {
    expression: String,
    schedule: cron::Schedule,
    weeks: Option<WeekFilter>,
}

#[derive(Debug, Clone)]
pub struct IntervalTrigger {
    start: DateTime<Utc>,
    period: TimeDelta,
}

impl Trigger {
    /// Build a trigger; interval triggers are anchored at `now`
    pub fn build(schedule: &Schedule, now: DateTime<Utc>) -> Result<Self, TriggerError> {
        match schedule {
            Schedule::Cron(cron) => CronTrigger::new(cron).map(Trigger::Cron),
            Schedule::Interval(interval) => {
                IntervalTrigger::new(interval, now).map(Trigger::Interval)
            }
        }
    }

    /// Check that a schedule can be turned into a trigger
    pub fn validate(schedule: &Schedule) -> Result<(), TriggerError> {
        Self::build(schedule, Utc::now()).map(|_| ())
    }

    /// First fire time strictly after `after`
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Cron(cron) => cron.next_fire_after(after),
            Trigger::Interval(interval) => interval.next_fire_after(after),
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Cron(cron) => write!(f, "cron[{}]", cron.expression),
            Trigger::Interval(interval) => {
                write!(f, "interval[{}s]", interval.period.num_seconds())
            }
        }
    }
}

impl CronTrigger {
    pub fn new(config: &CronSchedule) -> Result<Self, TriggerError> {
        let [year, month, day, week, day_of_week, hour, minute, second] = resolve_fields(config)?;

        let weeks = if week == "*" {
            None
        } else {
            Some(WeekFilter::parse(&week)?)
        };
        let day_of_week = weekday_expression(&day_of_week)?;

        let expression = format!("{second} {minute} {hour} {day} {month} {day_of_week} {year}");
        let schedule = expression
            .parse::<cron::Schedule>()
            .map_err(|source| TriggerError::InvalidCron {
                expression: expression.clone(),
                source,
            })?;

        Ok(Self {
            expression,
            schedule,
            weeks,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let Some(weeks) = &self.weeks else {
            return self.schedule.after(&after).next();
        };

        let mut cursor = after;
        for _ in 0..MAX_WEEK_SKIPS {
            let candidate = self.schedule.after(&cursor).next()?;
            if weeks.matches(candidate) {
                return Some(candidate);
            }
            // resume just before the next Monday
            cursor = start_of_next_week(candidate)? - TimeDelta::seconds(1);
        }
        None
    }
}

impl IntervalTrigger {
    pub fn new(config: &IntervalSchedule, start: DateTime<Utc>) -> Result<Self, TriggerError> {
        let seconds = config.total_seconds();
        if seconds == 0 {
            return Err(TriggerError::ZeroInterval);
        }

        let period = i64::try_from(seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or(TriggerError::IntervalTooLong)?;

        Ok(Self { start, period })
    }

    fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let period_ms = self.period.num_milliseconds();
        let elapsed_ms = (after - self.start).num_milliseconds();
        let periods = if elapsed_ms < 0 {
            1
        } else {
            elapsed_ms / period_ms + 1
        };

        let offset = TimeDelta::try_milliseconds(period_ms.checked_mul(periods)?)?;
        self.start.checked_add_signed(offset)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Fill unset fields: `*` above the least significant explicit field,
/// field minimums below it
fn resolve_fields(config: &CronSchedule) -> Result<[String; 8], TriggerError> {
    if config.is_empty() {
        return Err(TriggerError::EmptyCron);
    }

    let values = [
        &config.year,
        &config.month,
        &config.day,
        &config.week,
        &config.day_of_week,
        &config.hour,
        &config.minute,
        &config.second,
    ];

    let last_set = values
        .iter()
        .rposition(|value| value.is_some())
        .unwrap_or_default();

    let mut resolved: [String; 8] = Default::default();
    for (index, value) in values.iter().enumerate() {
        resolved[index] = match value {
            Some(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
                    return Err(invalid(FIELD_NAMES[index], raw, "expected a single expression"));
                }
                trimmed.to_string()
            }
            None if index < last_set => "*".to_string(),
            None => FIELD_DEFAULTS[index].to_string(),
        };
    }

    Ok(resolved)
}

/// Normalise a day-of-week expression to cron weekday names
///
/// Accepts `mon`..`sun` or `0`..`6` (Monday is 0) in lists, ranges and
/// steps. Ranges are expanded so that `5-6` or `sat-sun` never wrap.
fn weekday_expression(expr: &str) -> Result<String, TriggerError> {
    if expr == "*" {
        return Ok(expr.to_string());
    }

    let days = parse_set(expr, "day_of_week", 0, 6, parse_weekday)?;
    if days.iter().all(|day| *day) {
        return Ok("*".to_string());
    }

    let names: Vec<String> = days
        .iter()
        .enumerate()
        .filter(|(_, selected)| **selected)
        .map(|(index, _)| capitalize(WEEKDAYS[index]))
        .collect();

    Ok(names.join(","))
}

fn parse_weekday(token: &str) -> Option<u32> {
    let lower = token.to_ascii_lowercase();
    WEEKDAYS
        .iter()
        .position(|name| *name == lower)
        .map(|index| index as u32)
        .or_else(|| token.parse::<u32>().ok())
}

/// Parse a comma-separated list of `*`, `*/n`, `a`, `a/n`, `a-b`, `a-b/n`
fn parse_set(
    expr: &str,
    field: &'static str,
    min: u32,
    max: u32,
    parse_value: fn(&str) -> Option<u32>,
) -> Result<Vec<bool>, TriggerError> {
    let mut selected = vec![false; (max + 1) as usize];

    for token in expr.split(',') {
        let (range, step) = match token.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .ok()
                    .filter(|step| *step > 0)
                    .ok_or_else(|| invalid(field, expr, "step must be a positive number"))?;
                (range, Some(step))
            }
            None => (token, None),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((start, end)) = range.split_once('-') {
            (
                parse_value(start).ok_or_else(|| invalid(field, expr, "unknown value"))?,
                parse_value(end).ok_or_else(|| invalid(field, expr, "unknown value"))?,
            )
        } else {
            let value = parse_value(range).ok_or_else(|| invalid(field, expr, "unknown value"))?;
            (value, if step.is_some() { max } else { value })
        };

        if start < min || end > max {
            return Err(invalid(field, expr, &format!("values must be within {min}-{max}")));
        }
        if start > end {
            return Err(invalid(field, expr, "range start is after its end"));
        }

        let step = step.unwrap_or(1) as usize;
        for value in (start..=end).step_by(step) {
            selected[value as usize] = true;
        }
    }

    Ok(selected)
}

fn start_of_next_week(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let date = at.date_naive();
    let days = 7 - u64::from(date.weekday().num_days_from_monday());
    date.checked_add_days(Days::new(days))?
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn invalid(field: &'static str, value: &str, reason: &str) -> TriggerError {
    TriggerError::InvalidField {
        field,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// ISO week numbers a cron trigger may fire in
#[derive(Debug, Clone)]
struct WeekFilter {
    weeks: Vec<bool>,
}

impl WeekFilter {
    fn parse(expr: &str) -> Result<Self, TriggerError> {
        let weeks = parse_set(expr, "week", 1, 53, |token| token.parse().ok())?;
        Ok(Self { weeks })
    }

    fn matches(&self, at: DateTime<Utc>) -> bool {
        let week = at.iso_week().week() as usize;
        self.weeks.get(week).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn cron(config: CronSchedule) -> Trigger {
        Trigger::build(&Schedule::Cron(config), Utc::now()).unwrap()
    }

    fn expression(trigger: &Trigger) -> &str {
        match trigger {
            Trigger::Cron(cron) => cron.expression(),
            Trigger::Interval(_) => panic!("expected cron trigger"),
        }
    }

    #[test]
    fn test_hour_only_defaults_lower_fields_to_zero() {
        let trigger = cron(CronSchedule {
            hour: Some("3".to_string()),
            ..Default::default()
        });

        assert_eq!(expression(&trigger), "0 0 3 * * * *");
        assert_eq!(
            trigger.next_fire_after(at(2026, 1, 5, 2, 0, 0)),
            Some(at(2026, 1, 5, 3, 0, 0))
        );
        assert_eq!(
            trigger.next_fire_after(at(2026, 1, 5, 3, 0, 0)),
            Some(at(2026, 1, 6, 3, 0, 0))
        );
    }

    #[test]
    fn test_month_only_fires_on_first_day_at_midnight() {
        let trigger = cron(CronSchedule {
            month: Some("1".to_string()),
            ..Default::default()
        });

        assert_eq!(expression(&trigger), "0 0 0 1 1 * *");
        assert_eq!(
            trigger.next_fire_after(at(2026, 3, 1, 0, 0, 0)),
            Some(at(2027, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_minute_step_keeps_higher_fields_open() {
        let trigger = cron(CronSchedule {
            minute: Some("*/15".to_string()),
            ..Default::default()
        });

        assert_eq!(expression(&trigger), "0 */15 * * * * *");
        assert_eq!(
            trigger.next_fire_after(at(2026, 1, 5, 10, 7, 30)),
            Some(at(2026, 1, 5, 10, 15, 0))
        );
    }

    #[test]
    fn test_weekday_names_skip_the_weekend() {
        let trigger = cron(CronSchedule {
            day_of_week: Some("mon-fri".to_string()),
            hour: Some("3".to_string()),
            ..Default::default()
        });

        // 2026-01-09 is a Friday
        assert_eq!(
            trigger.next_fire_after(at(2026, 1, 9, 4, 0, 0)),
            Some(at(2026, 1, 12, 3, 0, 0))
        );
    }

    #[test]
    fn test_numeric_weekdays_start_on_monday() {
        assert_eq!(weekday_expression("0").unwrap(), "Mon");
        assert_eq!(weekday_expression("5-6").unwrap(), "Sat,Sun");
        assert_eq!(weekday_expression("sat,sun").unwrap(), "Sat,Sun");
        assert_eq!(weekday_expression("*/2").unwrap(), "Mon,Wed,Fri,Sun");
        assert_eq!(weekday_expression("0-6").unwrap(), "*");
        assert!(weekday_expression("7").is_err());
        assert!(weekday_expression("fri-mon").is_err());
        assert!(weekday_expression("someday").is_err());
    }

    #[test]
    fn test_week_filter_jumps_to_matching_week() {
        let trigger = cron(CronSchedule {
            week: Some("2".to_string()),
            ..Default::default()
        });

        // ISO week 2 of 2026 starts on Monday 2026-01-05
        assert_eq!(
            trigger.next_fire_after(at(2026, 1, 1, 12, 0, 0)),
            Some(at(2026, 1, 5, 0, 0, 0))
        );
        assert_eq!(
            trigger.next_fire_after(at(2026, 1, 11, 1, 0, 0)),
            Some(at(2027, 1, 11, 0, 0, 0))
        );
    }

    #[test]
    fn test_empty_cron_rejected() {
        let err = Trigger::validate(&Schedule::Cron(CronSchedule::default())).unwrap_err();
        assert!(matches!(err, TriggerError::EmptyCron));
    }

    #[test]
    fn test_out_of_range_field_rejected() {
        let err = Trigger::validate(&Schedule::Cron(CronSchedule {
            hour: Some("25".to_string()),
            ..Default::default()
        }))
        .unwrap_err();
        assert!(matches!(err, TriggerError::InvalidCron { .. }));

        let err = Trigger::validate(&Schedule::Cron(CronSchedule {
            minute: Some("1 2".to_string()),
            ..Default::default()
        }))
        .unwrap_err();
        assert!(matches!(err, TriggerError::InvalidField { field: "minute", .. }));
    }

    #[test]
    fn test_interval_fires_one_period_after_registration() {
        let start = at(2026, 1, 5, 12, 0, 0);
        let trigger = Trigger::build(
            &Schedule::Interval(IntervalSchedule {
                minutes: 10,
                ..Default::default()
            }),
            start,
        )
        .unwrap();

        assert_eq!(trigger.next_fire_after(start), Some(at(2026, 1, 5, 12, 10, 0)));
        assert_eq!(
            trigger.next_fire_after(at(2026, 1, 5, 12, 10, 0)),
            Some(at(2026, 1, 5, 12, 20, 0))
        );
        // a long pause does not produce catch-up fire times
        assert_eq!(
            trigger.next_fire_after(at(2026, 1, 5, 13, 3, 0)),
            Some(at(2026, 1, 5, 13, 10, 0))
        );
    }

    #[test]
    fn test_invalid_intervals_rejected() {
        let zero = Schedule::Interval(IntervalSchedule::default());
        assert!(matches!(Trigger::validate(&zero), Err(TriggerError::ZeroInterval)));

        let huge = Schedule::Interval(IntervalSchedule {
            weeks: u64::MAX,
            ..Default::default()
        });
        assert!(matches!(Trigger::validate(&huge), Err(TriggerError::IntervalTooLong)));
    }
}
