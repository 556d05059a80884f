use std::{fmt::Display, sync::LazyLock};

use anyhow::{anyhow, Result};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use chrono_english::parse_date_string;
use regex::Regex;
use serde::Deserialize;

/// This is the standard way of converting a date to a string in commitsheet.
pub fn date_to_cell(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

static DAY_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,2})\s*[:.]\s*(\d{1,2})\s*$").unwrap());

/// Parses a time of day written as `9:00` or `9.00`.
pub fn parse_day_start(value: &str) -> Result<NaiveTime> {
    let captures = DAY_START
        .captures(value)
        .ok_or_else(|| anyhow!("Can't parse {value:?} as a time of day, expected something like 9:00"))?;
    let hour = captures[1].parse::<u32>()?;
    let minute = captures[2].parse::<u32>()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| anyhow!("{value:?} is not a valid time of day"))
}

/// Combines the date of a day with the time the workday starts.
pub fn compose_date(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    NaiveDateTime::new(date, time)
}

pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateStyle {
    #[default]
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Parses a date written by a human. The canonical `2025-03-15` form is tried first, then
/// anything `chrono_english` understands, e.g. "15/03/2025", "yesterday", "2 days ago".
pub fn parse_human_date(value: &str, style: DateStyle) -> Result<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(date_time) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(date_time.date());
    }
    parse_date_string(value, Local::now(), style.into())
        .map(|v| v.date_naive())
        .map_err(|e| anyhow!("Can't parse {value:?} as a date: {e}"))
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::{is_workday, parse_day_start, parse_human_date, weekday_name, DateStyle};

    #[test]
    fn day_start_accepts_both_separators() {
        let expected = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        assert_eq!(parse_day_start("9:30").unwrap(), expected);
        assert_eq!(parse_day_start(" 09.30 ").unwrap(), expected);
    }

    #[test]
    fn day_start_rejects_garbage() {
        assert!(parse_day_start("nine").is_err());
        assert!(parse_day_start("25:00").is_err());
        assert!(parse_day_start("9:75").is_err());
    }

    #[test]
    fn human_dates_follow_style() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        assert_eq!(parse_human_date("2025-03-04", DateStyle::Us).unwrap(), date);
        assert_eq!(parse_human_date("2025-03-04 00:00:00", DateStyle::Uk).unwrap(), date);
        assert_eq!(parse_human_date("04/03/2025", DateStyle::Uk).unwrap(), date);
        assert_eq!(parse_human_date("03/04/2025", DateStyle::Us).unwrap(), date);
    }

    #[test]
    fn weekends_are_not_workdays() {
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        assert!(!is_workday(saturday));
        assert!(is_workday(saturday.pred_opt().unwrap()));
        assert_eq!(weekday_name(saturday), "Saturday");
    }
}
