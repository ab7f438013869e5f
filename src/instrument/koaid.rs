// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! KOAIDs: `PP.YYYYMMDD.SSSSS.fits`, the archive's name for a raw frame.

use std::fmt::Display;

use chrono::{Duration, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use super::InstrumentDescriptor;
use crate::{
    io::fits::Header,
    time::{normalise_date_obs, parse_time_of_day, seconds_of_day},
};

lazy_static! {
    static ref KOAID_REGEX: Regex = Regex::new(r"^[A-Z]{2}\.\d{8}\.\d{5,}\.fits$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Koaid {
    pub prefix: &'static str,
    pub date: NaiveDate,

    /// Whole UT seconds since midnight of `date`.
    pub seconds: u32,
}

impl Koaid {
    /// Build the KOAID of a raw header.
    pub fn from_header(desc: &InstrumentDescriptor, header: &Header) -> Result<Koaid, KoaidError> {
        let prefix = desc.prefix(header).ok_or(KoaidError::NoPrefix)?;

        let date_field = header.get_str("DATE");
        let date_split = date_field.as_deref().and_then(|d| d.split_once('T'));

        let utc = desc
            .keyword(header, "UTC")
            .or_else(|| header.get_str("UT"))
            .or_else(|| date_split.map(|(_, t)| t.to_string()))
            .ok_or(KoaidError::NoTime)?;
        let time = parse_time_of_day(&utc).ok_or(KoaidError::BadTime(utc))?;

        let date_obs = desc
            .keyword(header, "DATE-OBS")
            .or_else(|| date_split.map(|(d, _)| d.to_string()))
            .ok_or(KoaidError::NoDate)?;
        let date = normalise_date_obs(&date_obs)
            .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
            .ok_or(KoaidError::BadDate(date_obs))?;

        Ok(Koaid {
            prefix,
            date,
            seconds: seconds_of_day(time),
        })
    }

    /// Whether this frame belongs to the night of `ut_date`. Frames dated the
    /// following day count only when taken strictly before the instrument's
    /// end time.
    pub fn belongs_to_night(&self, ut_date: NaiveDate, end_time_secs: u32) -> bool {
        self.date == ut_date
            || (self.date == ut_date + Duration::days(1) && self.seconds < end_time_secs)
    }

    pub fn is_valid(s: &str) -> bool {
        KOAID_REGEX.is_match(s)
    }
}

impl Display for Koaid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{:05}.fits",
            self.prefix,
            self.date.format("%Y%m%d"),
            self.seconds
        )
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum KoaidError {
    #[error("Couldn't determine the KOAID prefix")]
    NoPrefix,

    #[error("No UTC/UT/DATE keyword to take the time from")]
    NoTime,

    #[error("Couldn't parse '{0}' as a UT time")]
    BadTime(String),

    #[error("No DATE-OBS/DATE keyword to take the date from")]
    NoDate,

    #[error("Couldn't parse '{0}' as a date")]
    BadDate(String),
}
