// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Attribute every frame of a night to a program.
//!
//! The DQA stage writes one [CreateProgRecord] per frame to `createprog.txt`.
//! Engineering and Target-of-Opportunity frames are recognised first. On a
//! night shared by several programs, each output directory is given to the
//! program that took more than 80% of its science frames (or, failing that,
//! to the program slot its `YYYYmonDD_X` name implies); anything left is
//! attributed by time of observation. The result is written to
//! `newproginfo.txt` as one [ProgramInfo] per frame.

mod error;

pub use error::ProgSplitError;

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use chrono::Timelike;
use indexmap::IndexMap;
use itertools::Itertools;
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;

use crate::{
    clients::{json_str, JsonGetter},
    constants::{ENG_INSTITUTION, ENG_PROGID, NONE_PROGRAM, SCI_SHARE_THRESHOLD},
    instrument::{ImageType, InstrumentDescriptor},
    stages::{read_lines, write_lines, ProgramEntry},
    time::parse_time_of_day,
};

lazy_static! {
    static ref TOO_REGEX: Regex = Regex::new(r"_ToO_(\w+)/").unwrap();
    static ref SLOT_REGEX: Regex = Regex::new(r"^\d{4}[a-z]{3}\d{2}(_[a-e])?$").unwrap();
}

const MINUTES_PER_DAY: i64 = 24 * 60;

/// What the DQA stage knows about a frame before its program is known. The
/// `prog*` fields hold whatever was already in the header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct CreateProgRecord {
    pub(crate) file: String,
    pub(crate) date_obs: String,
    pub(crate) utc: String,
    pub(crate) outdir: String,
    pub(crate) observer: String,
    pub(crate) frameno: String,
    pub(crate) imagetype: String,
    pub(crate) progid: String,
    pub(crate) progpi: String,
    pub(crate) proginst: String,
    pub(crate) progtitl: String,
    pub(crate) oa: String,
}

impl CreateProgRecord {
    const NUM_FIELDS: usize = 12;

    pub(crate) fn to_line(&self) -> String {
        [
            &self.file,
            &self.date_obs,
            &self.utc,
            &self.outdir,
            &self.observer,
            &self.frameno,
            &self.imagetype,
            &self.progid,
            &self.progpi,
            &self.proginst,
            &self.progtitl,
            &self.oa,
        ]
        .iter()
        .map(|f| clean(f))
        .join("\t")
    }

    fn from_fields(f: &[&str]) -> CreateProgRecord {
        let s = |i: usize| f[i].to_string();
        CreateProgRecord {
            file: s(0),
            date_obs: s(1),
            utc: s(2),
            outdir: s(3),
            observer: s(4),
            frameno: s(5),
            imagetype: s(6),
            progid: s(7),
            progpi: s(8),
            proginst: s(9),
            progtitl: s(10),
            oa: s(11),
        }
    }

    fn has_progid(&self) -> bool {
        !is_blank(&self.progid) && self.progid != NONE_PROGRAM
    }

    fn is_science(&self) -> bool {
        self.imagetype == ImageType::Object.to_string()
    }
}

/// The program a frame was attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProgramInfo {
    pub(crate) file: String,
    pub(crate) outdir: String,
    pub(crate) institution: String,
    pub(crate) proj_code: String,
    pub(crate) pi: String,
    pub(crate) title: String,
}

impl ProgramInfo {
    const NUM_FIELDS: usize = 6;

    pub(crate) fn to_line(&self) -> String {
        [
            &self.file,
            &self.outdir,
            &self.institution,
            &self.proj_code,
            &self.pi,
            &self.title,
        ]
        .iter()
        .map(|f| clean(f))
        .join("\t")
    }

    fn from_fields(f: &[&str]) -> ProgramInfo {
        ProgramInfo {
            file: f[0].to_string(),
            outdir: f[1].to_string(),
            institution: f[2].to_string(),
            proj_code: f[3].to_string(),
            pi: f[4].to_string(),
            title: f[5].to_string(),
        }
    }
}

/// Tabs and newlines would break the line format.
fn clean(s: &str) -> String {
    s.replace(['\t', '\n', '\r'], " ")
}

fn is_blank(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null")
}

fn read_tsv<T>(
    path: &Path,
    expected: usize,
    parse: fn(&[&str]) -> T,
) -> Result<Vec<T>, ProgSplitError> {
    read_lines(path)?
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() == expected {
                Ok(parse(&fields))
            } else {
                Err(ProgSplitError::BadRecord {
                    file: path.to_path_buf(),
                    line_num: i + 1,
                    expected,
                    line: line.clone(),
                })
            }
        })
        .collect()
}

pub(crate) fn read_createprog(path: &Path) -> Result<Vec<CreateProgRecord>, ProgSplitError> {
    read_tsv(path, CreateProgRecord::NUM_FIELDS, CreateProgRecord::from_fields)
}

pub(crate) fn write_createprog(path: &Path, records: &[CreateProgRecord]) -> Result<(), ProgSplitError> {
    Ok(write_lines(path, records.iter().map(|r| r.to_line()))?)
}

/// The attributions of `newproginfo.txt`, keyed by frame.
pub(crate) fn read_newproginfo(path: &Path) -> Result<HashMap<PathBuf, ProgramInfo>, ProgSplitError> {
    Ok(read_tsv(path, ProgramInfo::NUM_FIELDS, ProgramInfo::from_fields)?
        .into_iter()
        .map(|info| (PathBuf::from(&info.file), info))
        .collect())
}

pub(crate) fn write_newproginfo(path: &Path, infos: &[ProgramInfo]) -> Result<(), ProgSplitError> {
    Ok(write_lines(path, infos.iter().map(|i| i.to_line()))?)
}

/// Lower-case an output directory and drop the sub-directories some
/// instruments write their secondary frames to, so all frames of a program
/// share one key.
pub(crate) fn normalise_outdir(outdir: &str) -> String {
    let mut s = outdir.trim().to_lowercase();
    for sub in ["/fcs", "/scam", "/spec"] {
        s = s.replace(sub, "");
    }
    while s.contains("//") {
        s = s.replace("//", "/");
    }
    s.trim_end_matches('/').to_string()
}

/// Minutes since noon HST of a UT time of day.
fn minutes_since_hst_noon_from_ut(utc: &str) -> Option<i64> {
    let t = parse_time_of_day(utc)?;
    let minutes = (t.num_seconds_from_midnight() / 60) as i64;
    // UT - 10 h - 12 h.
    Some((minutes + 120).rem_euclid(MINUTES_PER_DAY))
}

/// Minutes since noon of an HST `HH:MM`.
fn minutes_since_noon(hst: &str) -> Result<i64, ProgSplitError> {
    let t = parse_time_of_day(hst).ok_or_else(|| ProgSplitError::BadTime(hst.to_string()))?;
    let minutes = (t.num_seconds_from_midnight() / 60) as i64;
    Ok((minutes - 12 * 60).rem_euclid(MINUTES_PER_DAY))
}

/// A scheduled program with its slice of the night, in minutes since noon
/// HST. `start` is inclusive, `end` exclusive.
#[derive(Debug, Clone)]
struct Slot {
    entry: ProgramEntry,
    title: String,
    start: i64,
    end: i64,
}

impl Slot {
    fn contains(&self, t: i64) -> bool {
        self.start <= t && t < self.end
    }

    /// How far outside the slot a time is.
    fn distance(&self, t: i64) -> i64 {
        if t < self.start {
            self.start - t
        } else if t >= self.end {
            t - self.end + 1
        } else {
            0
        }
    }

    fn info(&self, record: &CreateProgRecord) -> ProgramInfo {
        ProgramInfo {
            file: record.file.clone(),
            outdir: record.outdir.clone(),
            institution: self.entry.institution.clone(),
            proj_code: self.entry.proj_code.clone(),
            pi: self.entry.principal.clone(),
            title: self.title.clone(),
        }
    }
}

/// Everything needed to split a night.
pub(crate) struct ProgSplit<'a> {
    pub(crate) desc: &'static InstrumentDescriptor,

    /// The lines of `dep_obtain<INSTR>.txt`.
    pub(crate) programs: &'a [ProgramEntry],

    pub(crate) http: &'a dyn JsonGetter,

    /// The proposals endpoint, for ToO and title lookups.
    pub(crate) propapi: Option<&'a str>,

    /// HST `HH:MM`; used to split nights whose programs have no times.
    pub(crate) sunset: &'a str,
    pub(crate) sunrise: &'a str,
}

impl<'a> ProgSplit<'a> {
    fn lookup(&self, cmd: &str, ktn: &str, key: &str) -> Option<String> {
        let url = self.propapi?;
        let params = [("cmd", cmd.to_string()), ("ktn", ktn.to_string())];
        let reply = self.http.get_json(url, &params);
        if reply.is_none() {
            warn!("The proposals API didn't answer {cmd} for {ktn}");
        }
        reply.and_then(|r| json_str(&r, key))
    }

    fn title(&self, proj_code: &str) -> String {
        self.lookup("getTitle", proj_code, "ProgramTitle")
            .unwrap_or_else(|| proj_code.to_string())
    }

    fn engineering(&self, record: &CreateProgRecord) -> ProgramInfo {
        ProgramInfo {
            file: record.file.clone(),
            outdir: record.outdir.clone(),
            institution: ENG_INSTITUTION.to_string(),
            proj_code: ENG_PROGID.to_string(),
            pi: format!("{}eng", self.desc.code().to_lowercase()),
            title: format!("{} Engineering", self.desc.title_case()),
        }
    }

    /// Engineering frames are recognised by observer name, or by an output
    /// directory named for engineering.
    pub(crate) fn is_engineering(&self, record: &CreateProgRecord) -> bool {
        let observer = record.observer.trim().to_lowercase();
        let eng = self.desc.eng_observers;
        if eng.contains(&observer.as_str()) {
            return true;
        }
        let by_observer = observer
            .split(|c: char| c == ',' || c == ';' || c == '/' || c == '&')
            .map(str::trim)
            .any(|token| eng.contains(&token));
        let instr_eng = format!("{}eng", self.desc.code().to_lowercase());
        let by_outdir = record
            .outdir
            .to_lowercase()
            .split('/')
            .any(|c| c == "eng" || c == "engineering" || c == instr_eng);
        by_observer || by_outdir
    }

    fn target_of_opportunity(&self, record: &CreateProgRecord) -> Option<ProgramInfo> {
        let outdir = format!("{}/", record.outdir.trim_end_matches('/'));
        let ktn = TOO_REGEX.captures(&outdir)?.get(1)?.as_str().to_string();
        info!("{} belongs to ToO program {ktn}", record.file);
        Some(ProgramInfo {
            file: record.file.clone(),
            outdir: record.outdir.clone(),
            institution: self
                .lookup("getAllocInst", &ktn, "AllocInst")
                .unwrap_or_else(|| NONE_PROGRAM.to_string()),
            pi: self
                .lookup("getPI", &ktn, "LastName")
                .unwrap_or_else(|| NONE_PROGRAM.to_string()),
            title: self.title(&ktn),
            proj_code: ktn,
        })
    }

    fn from_header(record: &CreateProgRecord) -> ProgramInfo {
        let or_none = |s: &str| {
            if is_blank(s) {
                NONE_PROGRAM.to_string()
            } else {
                s.to_string()
            }
        };
        ProgramInfo {
            file: record.file.clone(),
            outdir: record.outdir.clone(),
            institution: or_none(&record.proginst),
            proj_code: record.progid.clone(),
            pi: or_none(&record.progpi),
            title: if is_blank(&record.progtitl) {
                record.progid.clone()
            } else {
                record.progtitl.clone()
            },
        }
    }

    /// The night's scheduled programs in time order.
    fn slots(&self) -> Result<Vec<Slot>, ProgSplitError> {
        let scheduled: Vec<&ProgramEntry> =
            self.programs.iter().filter(|p| !p.is_unscheduled()).collect();
        let n = scheduled.len();
        let all_timed = scheduled
            .iter()
            .all(|p| p.start_time.is_some() && p.end_time.is_some());

        let times: Vec<(i64, i64)> = if n <= 1 {
            vec![(0, MINUTES_PER_DAY); n]
        } else if all_timed {
            scheduled
                .iter()
                .map(|p| {
                    let start = minutes_since_noon(p.start_time.as_deref().unwrap_or_default())?;
                    let end = minutes_since_noon(p.end_time.as_deref().unwrap_or_default())?;
                    Ok((start, end))
                })
                .collect::<Result<_, ProgSplitError>>()?
        } else if n == 2 {
            let sunset = minutes_since_noon(self.sunset)?;
            let sunrise = minutes_since_noon(self.sunrise)?;
            let mid = (sunset + sunrise) / 2;
            debug!("Splitting the night at {mid} minutes after noon");
            vec![(sunset, mid), (mid, sunrise)]
        } else {
            return Err(ProgSplitError::MissingTimes(n));
        };

        let mut slots: Vec<Slot> = scheduled
            .into_iter()
            .zip(times)
            .map(|(entry, (start, end))| Slot {
                title: self.title(&entry.proj_code),
                entry: entry.clone(),
                start,
                end,
            })
            .collect();
        slots.sort_by_key(|s| s.start);
        Ok(slots)
    }

    /// The program a frame belongs to by its time of observation; the nearest
    /// program when it falls outside every slot.
    fn by_time<'s>(slots: &'s [Slot], record: &CreateProgRecord) -> &'s Slot {
        let t = minutes_since_hst_noon_from_ut(&record.utc);
        match t {
            Some(t) => slots
                .iter()
                .find(|s| s.contains(t))
                .or_else(|| slots.iter().min_by_key(|s| s.distance(t))),
            None => None,
        }
        .unwrap_or(&slots[0])
    }

    /// Give output directories to programs by where their science frames
    /// fall, then by the directory name.
    fn assign_outdirs(slots: &[Slot], records: &[&CreateProgRecord]) -> HashMap<String, usize> {
        // Science frames per program, per normalised outdir.
        let mut counts: IndexMap<String, Vec<usize>> = IndexMap::new();
        for record in records {
            let counts = counts
                .entry(normalise_outdir(&record.outdir))
                .or_insert_with(|| vec![0; slots.len()]);
            if !record.is_science() {
                continue;
            }
            if let Some(t) = minutes_since_hst_noon_from_ut(&record.utc) {
                if let Some(i) = slots.iter().position(|s| s.contains(t)) {
                    counts[i] += 1;
                }
            }
        }

        let mut assigned = HashMap::new();
        for (outdir, counts) in counts {
            let total: usize = counts.iter().sum();
            let by_count = counts
                .iter()
                .position(|&c| total > 0 && c as f64 / total as f64 > SCI_SHARE_THRESHOLD);
            let by_name = outdir
                .rsplit('/')
                .next()
                .and_then(|last| SLOT_REGEX.captures(last))
                .map(|caps| {
                    caps.get(1)
                        .and_then(|m| m.as_str().chars().nth(1))
                        .map(|c| (c as u8 - b'a') as usize)
                        .unwrap_or(0)
                })
                .filter(|&slot| slot < slots.len());

            let choice = match (by_count, by_name) {
                (Some(c), Some(n)) if c != n => {
                    error!(
                        "Science frames put {outdir} in program {} but its name says {}; using {}",
                        slots[c].entry.proj_code, slots[n].entry.proj_code, slots[c].entry.proj_code
                    );
                    Some(c)
                }
                (Some(c), _) => Some(c),
                (None, n) => n,
            };
            if let Some(i) = choice {
                debug!("{outdir} belongs to {}", slots[i].entry.proj_code);
                assigned.insert(outdir, i);
            }
        }
        assigned
    }

    /// Attribute every record to a program, in order.
    pub(crate) fn assign(&self, records: &[CreateProgRecord]) -> Result<Vec<ProgramInfo>, ProgSplitError> {
        let mut infos: Vec<Option<ProgramInfo>> = vec![None; records.len()];
        let mut remaining = vec![];
        for (i, record) in records.iter().enumerate() {
            infos[i] = if record.has_progid() {
                Some(Self::from_header(record))
            } else if self.is_engineering(record) {
                Some(self.engineering(record))
            } else {
                self.target_of_opportunity(record)
            };
            if infos[i].is_none() {
                remaining.push(i);
            }
        }

        if !remaining.is_empty() {
            let slots = self.slots()?;
            match slots.len() {
                0 => {
                    warn!(
                        "Nothing was scheduled; {} frames are attributed to {NONE_PROGRAM}",
                        remaining.len()
                    );
                    let none = Slot {
                        entry: ProgramEntry::unscheduled("", ""),
                        title: NONE_PROGRAM.to_string(),
                        start: 0,
                        end: MINUTES_PER_DAY,
                    };
                    for i in remaining {
                        infos[i] = Some(none.info(&records[i]));
                    }
                }
                1 => {
                    for i in remaining {
                        infos[i] = Some(slots[0].info(&records[i]));
                    }
                }
                _ => {
                    let unassigned: Vec<&CreateProgRecord> =
                        remaining.iter().map(|&i| &records[i]).collect();
                    let outdirs = Self::assign_outdirs(&slots, &unassigned);
                    for i in remaining {
                        let record = &records[i];
                        let slot = match outdirs.get(&normalise_outdir(&record.outdir)) {
                            Some(&s) => &slots[s],
                            None => Self::by_time(&slots, record),
                        };
                        infos[i] = Some(slot.info(record));
                    }
                }
            }
        }

        Ok(infos.into_iter().flatten().collect())
    }
}
