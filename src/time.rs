// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions around dates and times.
//!
//! Everything here works on UT unless the name says HST. The pipeline only
//! ever needs whole dates and times of day, so [chrono]'s naive types are used
//! throughout.

use std::time::SystemTime;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use thiserror::Error;

use crate::constants::HST_OFFSET_HOURS;

#[derive(Error, Debug)]
pub enum TimeError {
    #[error("Couldn't parse '{0}' as a UT date; expected YYYY-MM-DD (or YYYY/MM/DD)")]
    BadUtDate(String),

    #[error("Couldn't parse '{0}' as a time of day; expected HH:MM:SS")]
    BadTime(String),
}

/// Parse a user-supplied UT date. Slashes are accepted in place of dashes.
pub fn parse_ut_date(s: &str) -> Result<NaiveDate, TimeError> {
    let s = s.trim().replace('/', "-");
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|_| TimeError::BadUtDate(s.to_string()))
}

/// Today's UT date.
pub fn today_ut() -> NaiveDate {
    Utc::now().date_naive()
}

/// `YYYYMMDD` form of a date.
pub fn compact_date(d: NaiveDate) -> String {
    d.format("%Y%m%d").to_string()
}

/// Parse a time of day like "01:00:00.0", "1:00:00", or "01:00". Fractional
/// seconds are kept.
pub fn parse_time_of_day(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Some(t);
        }
    }
    None
}

/// Whole seconds since midnight; fractions are truncated.
pub fn seconds_of_day(t: NaiveTime) -> u32 {
    t.num_seconds_from_midnight()
}

/// Seconds since midnight including the fractional part.
pub fn fractional_seconds_of_day(t: NaiveTime) -> f64 {
    t.num_seconds_from_midnight() as f64 + t.nanosecond() as f64 * 1e-9
}

/// Normalise the many spellings of DATE-OBS found in raw headers into
/// `YYYY-MM-DD`. Recognised forms are `YYYY-MM-DD`, `YYYY-MM-DDThh:mm:ss`, and
/// the old `dd/mm/yy`, where years below 50 are in the 2000s.
pub fn normalise_date_obs(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let date_part = raw.split('T').next().unwrap_or(raw);

    if let Ok(d) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        return Some(d.format("%Y-%m-%d").to_string());
    }

    let parts: Vec<&str> = date_part.split('/').collect();
    if let [dd, mm, yy] = parts.as_slice() {
        let day: u32 = dd.parse().ok()?;
        let month: u32 = mm.parse().ok()?;
        let mut year: i32 = yy.parse().ok()?;
        if yy.len() <= 2 {
            year += if year < 50 { 2000 } else { 1900 };
        }
        return NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string());
    }

    None
}

/// The observing semester containing a UT date. Semester A runs from Feb 2 to
/// Aug 1 (inclusive); semester B from Aug 2 to Feb 1, and January and Feb 1
/// belong to the previous year's B semester.
pub fn semester(d: NaiveDate) -> String {
    let (year, month, day) = (d.year(), d.month(), d.day());
    let (year, letter) = match (month, day) {
        (1, _) | (2, 1) => (year - 1, 'B'),
        (8, 1) => (year, 'A'),
        (m, _) if m >= 8 => (year, 'B'),
        _ => (year, 'A'),
    };
    format!("{year}{letter}")
}

/// [semester], but from a DATE-OBS string.
pub fn semester_from_str(date_obs: &str) -> Option<String> {
    let normalised = normalise_date_obs(date_obs)?;
    NaiveDate::parse_from_str(&normalised, "%Y-%m-%d")
        .ok()
        .map(semester)
}

/// Convert a UT date and time to HST.
pub fn ut_to_hst(ut: NaiveDateTime) -> NaiveDateTime {
    ut - Duration::hours(HST_OFFSET_HOURS)
}

/// The HST date on which the observing night of a UT date started.
pub fn hst_date(ut_date: NaiveDate) -> NaiveDate {
    ut_date - Duration::days(1)
}

/// The 24-hour window of modification times that belong to a UT date's night:
/// `(ut_date - 1 day at end_time, ut_date at end_time]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl NightWindow {
    pub fn new(ut_date: NaiveDate, end_time: NaiveTime) -> NightWindow {
        let end = ut_date.and_time(end_time);
        NightWindow {
            start: end - Duration::days(1),
            end,
        }
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        t > self.start && t <= self.end
    }

    pub fn contains_system_time(&self, t: SystemTime) -> bool {
        self.contains(system_time_to_ut(t))
    }
}

/// Convert a filesystem timestamp to a naive UT datetime.
pub fn system_time_to_ut(t: SystemTime) -> NaiveDateTime {
    DateTime::<Utc>::from(t).naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_ut_date(s).unwrap()
    }

    #[test]
    fn test_semester_boundaries() {
        assert_eq!(semester(date("2017-08-01")), "2017A");
        assert_eq!(semester(date("2017-08-02")), "2017B");
        assert_eq!(semester(date("2018-01-15")), "2017B");
        assert_eq!(semester(date("2018-02-01")), "2017B");
        assert_eq!(semester(date("2018-02-02")), "2018A");
        assert_eq!(semester(date("2017-07-07")), "2017A");
        assert_eq!(semester(date("2017-12-31")), "2017B");
    }

    #[test]
    fn test_parse_ut_date_accepts_slashes() {
        assert_eq!(date("2017/07/07"), date("2017-07-07"));
        assert!(parse_ut_date("2017-13-07").is_err());
        assert!(parse_ut_date("yesterday").is_err());
    }

    #[test]
    fn test_normalise_date_obs() {
        assert_eq!(normalise_date_obs("2017-07-07").as_deref(), Some("2017-07-07"));
        assert_eq!(
            normalise_date_obs("2017-07-07T01:00:00.5").as_deref(),
            Some("2017-07-07")
        );
        assert_eq!(normalise_date_obs("07/07/17").as_deref(), Some("2017-07-07"));
        assert_eq!(normalise_date_obs("31/12/98").as_deref(), Some("1998-12-31"));
        assert_eq!(normalise_date_obs("1/2/49").as_deref(), Some("2049-02-01"));
        assert!(normalise_date_obs("not a date").is_none());
        assert!(normalise_date_obs("32/01/17").is_none());
    }

    #[test]
    fn test_time_of_day() {
        let t = parse_time_of_day("01:00:00.0").unwrap();
        assert_eq!(seconds_of_day(t), 3600);
        let t = parse_time_of_day("23:59:59.99").unwrap();
        assert_eq!(seconds_of_day(t), 86399);
        let t = parse_time_of_day("12:30").unwrap();
        assert_eq!(seconds_of_day(t), 45000);
        assert!(parse_time_of_day("25:00:00").is_none());
        assert!(parse_time_of_day("").is_none());
    }

    #[test]
    fn test_night_window() {
        let end_time = NaiveTime::from_hms_opt(20, 0, 0).unwrap();
        let window = NightWindow::new(date("2017-07-07"), end_time);
        let at = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        assert!(!window.contains(at("2017-07-06 20:00:00")));
        assert!(window.contains(at("2017-07-06 20:00:01")));
        assert!(window.contains(at("2017-07-07 08:00:00")));
        assert!(window.contains(at("2017-07-07 20:00:00")));
        assert!(!window.contains(at("2017-07-07 20:00:01")));
    }

    #[test]
    fn test_hst() {
        assert_eq!(hst_date(date("2017-07-01")), date("2017-06-30"));
        let ut = NaiveDateTime::parse_from_str("2017-07-07 04:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(
            ut_to_hst(ut),
            NaiveDateTime::parse_from_str("2017-07-06 18:30:00", "%Y-%m-%d %H:%M:%S").unwrap()
        );
    }
}
