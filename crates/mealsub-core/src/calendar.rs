//! Local-calendar date helpers.
//!
//! Scheduling works on plain calendar dates (`YYYY-MM-DD`) and local times of
//! day (`HH:mm`); no timezone conversion happens anywhere in the engine.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{CoreError, Result};

pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Parse a strict `YYYY-MM-DD` date.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.len() != 10 {
        return Err(CoreError::InvalidDate {
            value: value.to_string(),
        });
    }
    NaiveDate::parse_from_str(trimmed, ISO_DATE_FORMAT).map_err(|_| CoreError::InvalidDate {
        value: value.to_string(),
    })
}

pub fn to_iso(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}

/// Parse an `HH:mm` time of day.
pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).map_err(|_| CoreError::InvalidTime {
        value: value.to_string(),
    })
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

/// Whole days from `from` to `to` (negative when `to` is earlier).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Monday–Friday carry deliveries; weekends never do.
pub fn is_serving_day(date: NaiveDate) -> bool {
    date.weekday().number_from_monday() <= 5
}

/// First serving day strictly after `date`.
pub fn next_serving_day_after(date: NaiveDate) -> NaiveDate {
    let mut candidate = add_days(date, 1);
    while !is_serving_day(candidate) {
        candidate = add_days(candidate, 1);
    }
    candidate
}

/// Signed minutes from `now` until `date` at `time`.
pub fn minutes_until(now: NaiveDateTime, date: NaiveDate, time: NaiveTime) -> i64 {
    (date.and_time(time) - now).num_minutes()
}

/// True when the slot is `cutoff_minutes` or less away (or already past),
/// i.e. too late for a customer change.
pub fn is_within_cutoff(
    now: NaiveDateTime,
    date: NaiveDate,
    time: NaiveTime,
    cutoff_minutes: i64,
) -> bool {
    minutes_until(now, date, time) <= cutoff_minutes
}

/// Human wording for a lead time, e.g. `120` → "2 hours", `90` → "90 minutes".
pub fn lead_time_label(minutes: i64) -> String {
    if minutes > 0 && minutes % 60 == 0 {
        let hours = minutes / 60;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{hours} hours")
        }
    } else if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{minutes} minutes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_iso_date(s).unwrap()
    }

    #[test]
    fn parse_rejects_loose_formats() {
        assert!(parse_iso_date("2024-01-01").is_ok());
        assert!(parse_iso_date("2024-1-1").is_err());
        assert!(parse_iso_date("2024-02-30").is_err());
        assert!(parse_iso_date("01/02/2024").is_err());
    }

    #[test]
    fn weekends_are_not_serving_days() {
        // 2024-01-06 is a Saturday
        assert!(is_serving_day(d("2024-01-05")));
        assert!(!is_serving_day(d("2024-01-06")));
        assert!(!is_serving_day(d("2024-01-07")));
        assert!(is_serving_day(d("2024-01-08")));
    }

    #[test]
    fn next_serving_day_skips_weekend() {
        assert_eq!(next_serving_day_after(d("2024-01-05")), d("2024-01-08"));
        assert_eq!(next_serving_day_after(d("2024-01-02")), d("2024-01-03"));
    }

    #[test]
    fn cutoff_is_inclusive() {
        let now = d("2024-01-03").and_hms_opt(10, 0, 0).unwrap();
        let noon = parse_hhmm("12:00").unwrap();
        let half_past = parse_hhmm("12:30").unwrap();
        assert_eq!(minutes_until(now, d("2024-01-03"), noon), 120);
        assert!(is_within_cutoff(now, d("2024-01-03"), noon, 120));
        assert!(!is_within_cutoff(now, d("2024-01-03"), half_past, 120));
    }

    #[test]
    fn lead_time_wording() {
        assert_eq!(lead_time_label(120), "2 hours");
        assert_eq!(lead_time_label(60), "1 hour");
        assert_eq!(lead_time_label(90), "90 minutes");
    }
}
