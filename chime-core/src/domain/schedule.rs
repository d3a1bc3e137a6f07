//! Schedule descriptions
//!
//! A job's schedule is either a calendar (cron-like) description with named
//! fields or a fixed interval. The scheduler turns these into live triggers;
//! this module only carries the parameters.

use serde::{Deserialize, Deserializer, Serialize};

/// Schedule attached to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Schedule {
    Cron(CronSchedule),
    Interval(IntervalSchedule),
}

/// Discriminant of a [`Schedule`], persisted next to its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    Cron,
    Interval,
}

/// Calendar schedule with named fields
///
/// Every field is an expression in the usual cron syntax (`*`, lists,
/// ranges, steps). Numbers are accepted in JSON and kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "cron_field")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "cron_field")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "cron_field")]
    pub day: Option<String>,
    /// ISO week number (1-53)
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "cron_field")]
    pub week: Option<String>,
    /// `mon`..`sun` or `0`..`6` with Monday as 0
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "cron_field")]
    pub day_of_week: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "cron_field")]
    pub hour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "cron_field")]
    pub minute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "cron_field")]
    pub second: Option<String>,
}

/// Fixed-period schedule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalSchedule {
    #[serde(default)]
    pub weeks: u64,
    #[serde(default)]
    pub days: u64,
    #[serde(default)]
    pub hours: u64,
    #[serde(default)]
    pub minutes: u64,
    #[serde(default)]
    pub seconds: u64,
}

impl Schedule {
    pub fn schedule_type(&self) -> ScheduleType {
        match self {
            Schedule::Cron(_) => ScheduleType::Cron,
            Schedule::Interval(_) => ScheduleType::Interval,
        }
    }

    /// Parameter set without the type tag
    pub fn config(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Schedule::Cron(cron) => serde_json::to_value(cron),
            Schedule::Interval(interval) => serde_json::to_value(interval),
        }
    }

    /// Rebuild a schedule from its persisted tag and parameter set
    pub fn from_parts(
        schedule_type: ScheduleType,
        config: serde_json::Value,
    ) -> serde_json::Result<Self> {
        match schedule_type {
            ScheduleType::Cron => serde_json::from_value(config).map(Schedule::Cron),
            ScheduleType::Interval => serde_json::from_value(config).map(Schedule::Interval),
        }
    }
}

impl ScheduleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleType::Cron => "cron",
            ScheduleType::Interval => "interval",
        }
    }
}

impl std::fmt::Display for ScheduleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cron" => Ok(ScheduleType::Cron),
            "interval" => Ok(ScheduleType::Interval),
            other => Err(format!("unknown schedule type: {}", other)),
        }
    }
}

impl CronSchedule {
    /// True when no field is set at all
    pub fn is_empty(&self) -> bool {
        self.year.is_none()
            && self.month.is_none()
            && self.day.is_none()
            && self.week.is_none()
            && self.day_of_week.is_none()
            && self.hour.is_none()
            && self.minute.is_none()
            && self.second.is_none()
    }
}

impl IntervalSchedule {
    /// Length of one period in seconds, saturating on overflow
    pub fn total_seconds(&self) -> u64 {
        self.weeks
            .saturating_mul(7 * 24 * 3600)
            .saturating_add(self.days.saturating_mul(24 * 3600))
            .saturating_add(self.hours.saturating_mul(3600))
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.seconds)
    }
}

fn cron_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Text(String),
        Number(i64),
    }

    Ok(Option::<Field>::deserialize(deserializer)?.map(|field| match field {
        Field::Text(text) => text,
        Field::Number(n) => n.to_string(),
    }))
}
