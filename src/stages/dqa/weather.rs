// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The telescope's nightly archive-telemetry files (`envMet.arT`,
//! `envFocus.arT`).
//!
//! Each is a quoted, comma-separated header of column names followed by one
//! row per sample. The first column is the HST time of the sample,
//! `DD-Mon-YYYY HH:MM:SS.ss`.

use std::path::Path;

use chrono::NaiveDateTime;
use log::{debug, warn};

use crate::{
    constants::{FOCUS_MATCH_SECONDS, WEATHER_MATCH_SECONDS},
    io::fits::Header,
};

const TIMESTAMP_FORMAT: &str = "%d-%b-%Y %H:%M:%S%.f";

#[derive(Debug, Clone, Default)]
pub(crate) struct AncTable {
    columns: Vec<String>,
    rows: Vec<(NaiveDateTime, Vec<String>)>,
}

fn unquote(s: &str) -> &str {
    s.trim().trim_matches('"').trim()
}

impl AncTable {
    /// Rows whose timestamp doesn't parse are skipped.
    pub(crate) fn parse(text: &str) -> AncTable {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let Some(header) = lines.next() else {
            return AncTable::default();
        };
        let columns = header.split(',').map(|c| unquote(c).to_string()).collect();
        let rows = lines
            .filter_map(|line| {
                let fields: Vec<String> = line.split(',').map(|f| unquote(f).to_string()).collect();
                let time = NaiveDateTime::parse_from_str(fields.first()?, TIMESTAMP_FORMAT).ok()?;
                Some((time, fields))
            })
            .collect();
        AncTable { columns, rows }
    }

    /// Read a table; a missing or unreadable file is logged and treated as
    /// empty.
    pub(crate) fn read(path: &Path) -> AncTable {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let table = AncTable::parse(&text);
                debug!("Read {} samples from {}", table.rows.len(), path.display());
                table
            }
            Err(e) => {
                warn!("Couldn't read {}: {e}", path.display());
                AncTable::default()
            }
        }
    }

    /// The sample closest to `hst`, if it's within `tolerance` seconds.
    pub(crate) fn nearest(&self, hst: NaiveDateTime, tolerance: f64) -> Option<Sample> {
        self.rows
            .iter()
            .map(|(t, fields)| {
                let offset = (*t - hst).num_milliseconds().abs() as f64 / 1000.0;
                (offset, t, fields)
            })
            .filter(|(offset, ..)| *offset <= tolerance)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, time, fields)| Sample {
                table: self,
                time: *time,
                fields,
            })
    }
}

pub(crate) struct Sample<'a> {
    table: &'a AncTable,
    pub(crate) time: NaiveDateTime,
    fields: &'a [String],
}

impl Sample<'_> {
    pub(crate) fn value(&self, column: &str) -> Option<f64> {
        let i = self.table.columns.iter().position(|c| c == column)?;
        self.fields.get(i)?.parse().ok()
    }
}

/// Weather keywords and the telemetry columns they're read from. `{tel}` is the
/// telescope number.
const WEATHER_KEYWORDS: [(&str, &str, &str); 8] = [
    ("WXOUTTMP", "k0:met:tempRaw", "KOA: Outside temperature (C)"),
    ("WXOUTHUM", "k0:met:humidityRaw", "KOA: Outside humidity (%)"),
    ("WXPRESS", "k0:met:pressureRaw", "KOA: Outside pressure (mB)"),
    ("WXWNDSP", "k0:met:windSpeedRaw", "KOA: Outside wind speed (m/s)"),
    ("WXWNDIR", "k0:met:windAzRaw", "KOA: Outside wind direction (deg)"),
    ("WXDWPT", "k0:met:dewpointRaw", "KOA: Outside dewpoint (C)"),
    ("WXDOMTMP", "k{tel}:met:tempRaw", "KOA: Inside temperature (C)"),
    ("WXDOMHUM", "k{tel}:met:humidityRaw", "KOA: Inside humidity (%)"),
];

fn time_str(t: NaiveDateTime) -> String {
    t.format("%H:%M:%S").to_string()
}

/// Set the weather keywords from the sample nearest the frame. Every keyword is
/// written; those without data are null.
pub(crate) fn set_weather(header: &mut Header, met: &AncTable, telnr: u8, hst: Option<NaiveDateTime>) {
    let sample = hst.and_then(|t| met.nearest(t, WEATHER_MATCH_SECONDS));
    if sample.is_none() {
        debug!("No weather sample within {WEATHER_MATCH_SECONDS} s of {hst:?}");
    }
    for (key, column, comment) in WEATHER_KEYWORDS {
        let column = column.replace("{tel}", &telnr.to_string());
        let value = sample.as_ref().and_then(|s| s.value(&column));
        header.set_f64_or_null(key, value, comment);
    }
    match &sample {
        Some(s) => header.set("WXTIME", time_str(s.time), "KOA: Weather measurement time (HST)"),
        None => header.set_null("WXTIME", "KOA: Weather measurement time (HST)"),
    }
}

/// Set the guider FWHM from the focus sample nearest the frame.
pub(crate) fn set_focus(header: &mut Header, focus: &AncTable, telnr: u8, hst: Option<NaiveDateTime>) {
    let sample = hst.and_then(|t| focus.nearest(t, FOCUS_MATCH_SECONDS));
    let column = format!("k{telnr}:dcs:pnt:cam0:fwhm");
    let fwhm = sample.as_ref().and_then(|s| s.value(&column));
    header.set_f64_or_null("GUIDFWHM", fwhm, "KOA: Guide star FWHM (arcsec)");
    match (&sample, fwhm) {
        (Some(s), Some(_)) => header.set("GUIDTIME", time_str(s.time), "KOA: FWHM measurement time (HST)"),
        _ => header.set_null("GUIDTIME", "KOA: FWHM measurement time (HST)"),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    const MET: &str = indoc! {r#"
        "UNIXDate","k0:met:tempRaw","k0:met:humidityRaw","k1:met:tempRaw"
        "06-Jul-2017 15:00:00.12",4.5,20.1,10.2
        "06-Jul-2017 15:00:40.00",4.6,20.0,10.1
        "garbage",1,2,3
    "#};

    fn hst(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_nearest_sample() {
        let table = AncTable::parse(MET);
        assert_eq!(table.rows.len(), 2);
        let sample = table.nearest(hst("2017-07-06 15:00:25"), 30.0).unwrap();
        assert_eq!(sample.value("k0:met:tempRaw"), Some(4.6));
        assert_eq!(sample.value("missing"), None);
        assert!(table.nearest(hst("2017-07-06 15:02:00"), 30.0).is_none());
    }

    #[test]
    fn test_weather_keywords() {
        let table = AncTable::parse(MET);
        let mut header = Header::new();
        set_weather(&mut header, &table, 1, Some(hst("2017-07-06 15:00:05")));
        assert_eq!(header.get_f64("WXOUTTMP"), Some(4.5));
        assert_eq!(header.get_f64("WXDOMTMP"), Some(10.2));
        assert!(header.get("WXPRESS").unwrap().is_null());
        assert_eq!(header.get_str("WXTIME").as_deref(), Some("15:00:00"));
    }

    #[test]
    fn test_weather_miss_is_all_null() {
        let table = AncTable::parse(MET);
        let mut header = Header::new();
        set_weather(&mut header, &table, 1, Some(hst("2017-07-07 02:00:00")));
        for (key, ..) in WEATHER_KEYWORDS {
            assert!(header.get(key).unwrap().is_null(), "{key}");
        }
        assert!(header.get("WXTIME").unwrap().is_null());

        set_focus(&mut header, &AncTable::default(), 1, None);
        assert!(header.get("GUIDFWHM").unwrap().is_null());
        assert!(header.get("GUIDTIME").unwrap().is_null());
    }
}
