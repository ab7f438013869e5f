// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The remote progress-tracking ("TPX") record of a night.

use log::{debug, warn};
use serde_json::Value;
use strum_macros::{Display, IntoStaticStr};

use super::{json_str, JsonGetter};

/// Columns of the tracking record the pipeline writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TrackingField {
    DepStatus,
    OndiskStat,
    OndiskTime,
    Files,
    FilesArch,
    Size,
    SdataDir,
    ArchStat,
    ArchTime,
}

pub trait ProgressTracker {
    /// Whether a record for this (instrument, UT date) already exists.
    fn record_exists(&self) -> bool;

    /// Set a field. Failures are logged but never fatal.
    fn update(&self, field: TrackingField, value: &str);
}

/// Used when tracking is switched off.
pub struct NullTracker;

impl ProgressTracker for NullTracker {
    fn record_exists(&self) -> bool {
        false
    }

    fn update(&self, field: TrackingField, value: &str) {
        debug!("Not tracking {field}={value}");
    }
}

/// Writes through the archive API's `updateTPX` command.
pub struct HttpTracker {
    http: Box<dyn JsonGetter>,
    url: String,
    instr: String,
    utdate: String,
}

impl HttpTracker {
    pub fn new(http: Box<dyn JsonGetter>, url: &str, instr: &str, utdate: &str) -> HttpTracker {
        HttpTracker {
            http,
            url: url.to_string(),
            instr: instr.to_string(),
            utdate: utdate.to_string(),
        }
    }
}

impl ProgressTracker for HttpTracker {
    fn record_exists(&self) -> bool {
        let params = [
            ("cmd", "getTPX".to_string()),
            ("instr", self.instr.clone()),
            ("utdate", self.utdate.clone()),
        ];
        match self.http.get_json(&self.url, &params) {
            None | Some(Value::Null) => false,
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }

    fn update(&self, field: TrackingField, value: &str) {
        debug!("Tracking {field}={value}");
        let params = [
            ("cmd", "updateTPX".to_string()),
            ("instr", self.instr.clone()),
            ("utdate", self.utdate.clone()),
            ("column", field.to_string()),
            ("value", value.to_string()),
        ];
        match self.http.get_json(&self.url, &params) {
            Some(reply) if json_str(&reply, "stat").as_deref() == Some("OK") => (),
            reply => warn!("Couldn't update tracking field {field} to '{value}': {reply:?}"),
        }
    }
}
