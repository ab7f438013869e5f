// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Find out who was scheduled on the instrument during the night.
//!
//! The telescope schedule is keyed by HST date, the day before the UT date of
//! the run. One line per scheduled block is written to `dep_obtain<INSTR>.txt`;
//! when nothing was scheduled, a single placeholder line is written and
//! `dep_notsched<INSTR>.txt` flags the night.

use std::path::Path;

use log::{debug, error, info, warn};
use serde_json::Value;

use super::{read_lines, write_lines, StageError};
use crate::{
    clients::{json_str, JsonGetter, TrackingField},
    config::ConfigError,
    constants::NONE_PROGRAM,
    pipeline::PipelineContext,
    time::hst_date,
};

/// One scheduled program of the night.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProgramEntry {
    /// `YYYY-MM-DD`.
    pub(crate) hst_date: String,
    pub(crate) oa: String,
    pub(crate) account: String,
    pub(crate) institution: String,

    /// Last name of the principal investigator.
    pub(crate) principal: String,

    pub(crate) proj_code: String,

    /// Comma-separated.
    pub(crate) observers: String,

    /// HST `HH:MM`.
    pub(crate) start_time: Option<String>,
    pub(crate) end_time: Option<String>,
}

impl ProgramEntry {
    /// The placeholder written when nothing was scheduled.
    pub(crate) fn unscheduled(hst_date: &str, oa: &str) -> ProgramEntry {
        ProgramEntry {
            hst_date: hst_date.to_string(),
            oa: oa.to_string(),
            account: NONE_PROGRAM.to_string(),
            institution: NONE_PROGRAM.to_string(),
            principal: NONE_PROGRAM.to_string(),
            proj_code: NONE_PROGRAM.to_string(),
            observers: NONE_PROGRAM.to_string(),
            start_time: None,
            end_time: None,
        }
    }

    pub(crate) fn is_unscheduled(&self) -> bool {
        self.proj_code == NONE_PROGRAM
    }

    pub(crate) fn to_line(&self) -> String {
        let mut fields = vec![
            self.hst_date.as_str(),
            &self.oa,
            &self.account,
            &self.institution,
            &self.principal,
            &self.proj_code,
            &self.observers,
        ];
        if let (Some(start), Some(end)) = (&self.start_time, &self.end_time) {
            fields.push(start);
            fields.push(end);
        }
        fields.join(" ")
    }

    pub(crate) fn from_line(line: &str) -> Option<ProgramEntry> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 7 {
            return None;
        }
        let (start_time, end_time) = match (fields.get(7), fields.get(8)) {
            (Some(start), Some(end)) => (Some(start.to_string()), Some(end.to_string())),
            _ => (None, None),
        };
        Some(ProgramEntry {
            hst_date: fields[0].to_string(),
            oa: fields[1].to_string(),
            account: fields[2].to_string(),
            institution: fields[3].to_string(),
            principal: fields[4].to_string(),
            proj_code: fields[5].to_string(),
            observers: fields[6].to_string(),
            start_time,
            end_time,
        })
    }
}

/// Read `dep_obtain<INSTR>.txt`.
pub(crate) fn read_obtain_file(path: &Path) -> Result<Vec<ProgramEntry>, StageError> {
    read_lines(path)?
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            ProgramEntry::from_line(&line).ok_or_else(|| StageError::BadListLine {
                file: path.to_path_buf(),
                line_num: i + 1,
                line,
            })
        })
        .collect()
}

/// Fields are whitespace-separated on disk, so any whitespace inside a value
/// is removed. Empty values become "none".
fn field(value: Option<String>) -> String {
    let v: String = value
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if v.is_empty() {
        "none".to_string()
    } else {
        v
    }
}

/// Schedule times arrive as `HH:MM` or `HH:MM:SS`; only hours and minutes are
/// kept.
fn hhmm(value: Option<String>) -> Option<String> {
    let v = value?;
    let mut parts = v.trim().split(':');
    let h: u32 = parts.next()?.parse().ok()?;
    let m: u32 = parts.next()?.parse().ok()?;
    (h < 24 && m < 60).then(|| format!("{h:02}:{m:02}"))
}

/// The OA on duty. Replies are a single object or a list of them.
fn night_staff(http: &dyn JsonGetter, url: &str, hst_date: &str, telnr: u8) -> String {
    let params = [
        ("cmd", "getNightStaff".to_string()),
        ("date", hst_date.to_string()),
        ("telnr", telnr.to_string()),
        ("type", "oa".to_string()),
    ];
    http.get_json(url, &params)
        .and_then(|v| json_str(&v, "Alias"))
        .map(|s| field(Some(s)))
        .unwrap_or_else(|| "None".to_string())
}

/// The schedule's name for an instrument.
fn schedule_instr(code: &str) -> &str {
    match code {
        "NIRSPEC" => "NIRSP",
        c => c,
    }
}

fn entry_str(entry: &Value, key: &str) -> Option<String> {
    match entry.get(key)? {
        v @ (Value::String(_) | Value::Number(_)) => json_str(v, key),
        _ => None,
    }
}

pub(crate) fn run(ctx: &PipelineContext) -> Result<(), StageError> {
    let url = ctx
        .config
        .api
        .telapi
        .as_deref()
        .ok_or(ConfigError::MissingKey {
            section: "API",
            key: "TELAPI",
            stage: "obtain",
        })?;
    let http = ctx.clients.http.as_ref();
    let hst = hst_date(ctx.ut_date).format("%Y-%m-%d").to_string();
    info!("Getting the {} schedule for HST date {hst}", ctx.code());

    let oa = night_staff(http, url, &hst, ctx.desc.telnr);
    debug!("OA: {oa}");

    let params = [
        ("cmd", "getSchedule".to_string()),
        ("date", hst.clone()),
        ("instr", schedule_instr(ctx.code()).to_string()),
    ];
    let schedule = match http.get_json(url, &params) {
        Some(Value::Array(list)) => list,
        Some(Value::Null) => vec![],
        Some(obj @ Value::Object(_)) => vec![obj],
        Some(other) => {
            warn!("Unexpected schedule reply: {other}");
            vec![]
        }
        None => {
            // The night can still be archived; its frames are attributed to
            // the placeholder program and fixed up by hand.
            error!("The telescope schedule service didn't answer for {hst}");
            ctx.email_admin(
                &format!("{} DEP: schedule unavailable for {hst}", ctx.code()),
                &format!("getSchedule failed for {} on {hst}; continuing as unscheduled.", ctx.code()),
            );
            ctx.clients.tracker.update(TrackingField::DepStatus, "ERROR");
            vec![]
        }
    };

    let mut entries = vec![];
    for block in &schedule {
        let observers = entry_str(block, "SchedId")
            .and_then(|id| {
                let params = [("cmd", "getObservers".to_string()), ("schedid", id)];
                http.get_json(url, &params)
            })
            .and_then(|v| json_str(&v, "Observers"));
        entries.push(ProgramEntry {
            hst_date: hst.clone(),
            oa: oa.clone(),
            account: field(entry_str(block, "Account")),
            institution: field(entry_str(block, "Institution")),
            principal: field(entry_str(block, "Principal")),
            proj_code: field(entry_str(block, "ProjCode")),
            observers: field(observers),
            start_time: hhmm(entry_str(block, "StartTime")),
            end_time: hhmm(entry_str(block, "EndTime")),
        });
    }

    if entries.is_empty() {
        info!("Nothing was scheduled on {} for {hst}", ctx.code());
        write_lines(
            &ctx.dirs.notsched_file(),
            [format!("{hst} {} not scheduled", ctx.code())],
        )?;
        entries.push(ProgramEntry::unscheduled(&hst, &oa));
    } else {
        info!("{} program(s) scheduled", entries.len());
    }
    write_lines(&ctx.dirs.obtain_file(), entries.iter().map(|e| e.to_line()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::pipeline::testing::{test_context, TestRun};

    #[test]
    fn test_entry_line_round_trip_with_times() {
        let line = "2017-07-06 jsmith KECK UCB Smith C123 Smith,Jones 18:30 00:30";
        let entry = ProgramEntry::from_line(line).unwrap();
        assert_eq!(entry.proj_code, "C123");
        assert_eq!(entry.start_time.as_deref(), Some("18:30"));
        assert_eq!(entry.to_line(), line);

        let entry = ProgramEntry::from_line("2017-07-06 jsmith KECK UCB Smith C123 none").unwrap();
        assert!(entry.start_time.is_none());
        assert!(ProgramEntry::from_line("2017-07-06 jsmith").is_none());
    }

    #[test]
    fn test_field_cleaning() {
        assert_eq!(field(Some("U of Hawaii".to_string())), "UofHawaii");
        assert_eq!(field(Some("  ".to_string())), "none");
        assert_eq!(field(None), "none");
        assert_eq!(hhmm(Some("18:30:00".to_string())).as_deref(), Some("18:30"));
        assert_eq!(hhmm(Some("7:05".to_string())).as_deref(), Some("07:05"));
        assert_eq!(hhmm(Some("later".to_string())), None);
    }

    #[test]
    fn test_scheduled_night() {
        let test = TestRun::new("NIRSPEC", "2017-07-07");
        test.fakes.http.respond("getNightStaff", json!([{"Alias": "jsmith"}]));
        test.fakes.http.respond(
            "getSchedule",
            json!([
                {"SchedId": 11, "Principal": "Smith", "Institution": "UC Berkeley",
                 "ProjCode": "U123", "Account": "nspec1", "StartTime": "18:30", "EndTime": "00:30"},
                {"SchedId": 12, "Principal": "Jones", "Institution": "Caltech",
                 "ProjCode": "C045", "Account": "nspec2", "StartTime": "00:30", "EndTime": "06:00"}
            ]),
        );
        test.fakes.http.respond("getObservers", json!([{"Observers": "Smith, Lee"}]));
        let ctx = test_context(&test);

        run_stage(&ctx);

        let entries = read_obtain_file(&ctx.dirs.obtain_file()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].hst_date, "2017-07-06");
        assert_eq!(entries[0].oa, "jsmith");
        assert_eq!(entries[0].institution, "UCBerkeley");
        assert_eq!(entries[0].observers, "Smith,Lee");
        assert_eq!(entries[1].proj_code, "C045");
        assert_eq!(entries[1].start_time.as_deref(), Some("00:30"));
        assert!(!ctx.dirs.notsched_file().exists());

        let schedule_calls = test.fakes.http.calls_to("getSchedule");
        assert!(schedule_calls[0]
            .1
            .contains(&("instr".to_string(), "NIRSP".to_string())));
        assert_eq!(test.fakes.http.calls_to("getObservers").len(), 2);
    }

    #[test]
    fn test_unscheduled_night() {
        let test = TestRun::new("HIRES", "2017-07-07");
        test.fakes.http.respond("getSchedule", json!([]));
        let ctx = test_context(&test);

        run_stage(&ctx);

        let lines = read_lines(&ctx.dirs.obtain_file()).unwrap();
        assert_eq!(lines, ["2017-07-06 None NONE NONE NONE NONE NONE"]);
        assert!(ctx.dirs.notsched_file().exists());
    }

    #[test]
    fn test_schedule_service_down() {
        let test = TestRun::new("HIRES", "2017-07-07");
        let ctx = test_context(&test);

        run_stage(&ctx);

        let entries = read_obtain_file(&ctx.dirs.obtain_file()).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_unscheduled());
        assert_eq!(test.fakes.mailer.sent().len(), 1);
        assert_eq!(
            test.fakes.tracker.last(TrackingField::DepStatus).as_deref(),
            Some("ERROR")
        );
    }

    fn run_stage(ctx: &PipelineContext) {
        ctx.dirs.create_all().unwrap();
        run(ctx).unwrap();
    }
}
