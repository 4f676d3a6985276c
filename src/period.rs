//! Deterministic expansion of relative period tokens into concrete dates.
//!
//! Every function here takes `today` as a parameter; the only clock read in
//! the crate is [`today_in`], which callers use to produce that parameter.

use chrono::{Datelike, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Timezone whose calendar date anchors relative periods by default.
pub const REFERENCE_TIMEZONE: &str = "Europe/Helsinki";

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Period {
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_30_days")]
    Last30Days,
    #[serde(rename = "last_90_days")]
    Last90Days,
    #[serde(rename = "this_month")]
    ThisMonth,
    #[serde(rename = "last_month")]
    LastMonth,
    #[serde(rename = "this_year")]
    ThisYear,
    #[serde(rename = "last_year")]
    LastYear,
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub const ALL: [Period; 7] = [
        Period::Last7Days,
        Period::Last30Days,
        Period::Last90Days,
        Period::ThisMonth,
        Period::LastMonth,
        Period::ThisYear,
        Period::LastYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Last7Days => "last_7_days",
            Period::Last30Days => "last_30_days",
            Period::Last90Days => "last_90_days",
            Period::ThisMonth => "this_month",
            Period::LastMonth => "last_month",
            Period::ThisYear => "this_year",
            Period::LastYear => "last_year",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == token)
    }

    pub fn resolve(&self, today: NaiveDate) -> DateRange {
        let (start, end) = match self {
            Period::Last7Days => (today - Days::new(6), today),
            Period::Last30Days => (today - Days::new(29), today),
            Period::Last90Days => (today - Days::new(89), today),
            Period::ThisMonth => (month_start(today), today),
            Period::LastMonth => {
                let last_prev = month_start(today) - Days::new(1);
                (month_start(last_prev), last_prev)
            }
            Period::ThisYear => (year_start(today), today),
            Period::LastYear => {
                let last_prev = year_start(today) - Days::new(1);
                (year_start(last_prev), last_prev)
            }
        };
        DateRange { start, end }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown period token: {}", s))
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

fn year_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.ordinal0()))
}

/// Current calendar date in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Replaces a `period` token in `args` with `start_date`/`end_date`.
///
/// Absent, null or empty tokens leave `args` untouched. An unrecognised token
/// is set to null and no dates are written, so tools that need a range are
/// rejected later by validation rather than here.
pub fn expand_period(mut args: Map<String, Value>, today: NaiveDate) -> Map<String, Value> {
    let period = match args.get("period") {
        None | Some(Value::Null) => return args,
        Some(Value::String(token)) if token.is_empty() => return args,
        Some(Value::String(token)) => Period::parse(token),
        Some(_) => None,
    };

    let Some(period) = period else {
        args.insert("period".to_string(), Value::Null);
        return args;
    };

    let range = period.resolve(today);
    args.insert(
        "start_date".to_string(),
        Value::String(range.start.format(DATE_FORMAT).to_string()),
    );
    args.insert(
        "end_date".to_string(),
        Value::String(range.end.format(DATE_FORMAT).to_string()),
    );
    args.remove("period");
    args
}
