// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A throwaway run: a temporary ROOTDIR, sdata and nightly tree, a config
//! pointing at them, and fake clients.

use std::path::PathBuf;

use chrono::NaiveDate;
use tempfile::TempDir;

use super::PipelineContext;
use crate::{
    clients::testing::FakeClients,
    config::Config,
    instrument::Instrument,
    io::fits::{testing::s, KeyValue},
};

pub(crate) const TELAPI: &str = "https://telapi.test/telSchedule.php";
pub(crate) const PROPAPI: &str = "https://propapi.test/proposalsAPI.php";
pub(crate) const KOAAPI: &str = "https://koaapi.test/nph-KOAapi";
pub(crate) const ADMIN: &str = "admin@test";

pub(crate) struct TestRun {
    // Kept so the directory outlives the test.
    _tmp: TempDir,
    pub(crate) root: PathBuf,
    pub(crate) sdata: PathBuf,
    pub(crate) nightly: PathBuf,
    pub(crate) instr: Instrument,
    pub(crate) ut_date: NaiveDate,
    pub(crate) fakes: FakeClients,
}

impl TestRun {
    pub(crate) fn new(instr: &str, ut_date: &str) -> TestRun {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("koadata");
        let sdata = tmp.path().join("sdata");
        let nightly = tmp.path().join("nightly");
        for dir in [&root, &sdata, &nightly] {
            std::fs::create_dir_all(dir).unwrap();
        }
        TestRun {
            _tmp: tmp,
            root,
            sdata,
            nightly,
            instr: Instrument::from_code(instr).unwrap(),
            ut_date: NaiveDate::parse_from_str(ut_date, "%Y-%m-%d").unwrap(),
            fakes: FakeClients::new(),
        }
    }

    pub(crate) fn config_yaml(&self) -> String {
        format!(
            "{instr}:\n    ROOTDIR: {root}\n\
             API:\n    TELAPI: {TELAPI}\n    PROPAPI: {PROPAPI}\n    KOAAPI: {KOAAPI}\n\
             REPORT:\n    ADMINEMAIL: {ADMIN}\n\
             KOAXFR:\n    SERVER: koaserver\n    ACCOUNT: koaxfr\n    DIR: /koadata/incoming\n    EMAILTO: koa@test\n\
             CIT:\n    LOCATE_DIR: {sdata}\n    MODTIME: false\n\
             NIGHTLY:\n    ROOT: {nightly}\n",
            instr = self.instr,
            root = self.root.display(),
            sdata = self.sdata.display(),
            nightly = self.nightly.display(),
        )
    }

    pub(crate) fn config(&self) -> Config {
        Config::from_yaml_str(&self.config_yaml()).unwrap()
    }
}

/// A context for the run with tracking enabled.
pub(crate) fn test_context(test: &TestRun) -> PipelineContext {
    PipelineContext::new(
        test.instr,
        test.ut_date,
        test.config(),
        test.fakes.clients(),
        true,
    )
    .unwrap()
}

/// The primary-header cards of a plain HIRES science frame dated 2017-07-07.
pub(crate) fn hires_cards(utc: &str, frameno: u32) -> Vec<(&'static str, KeyValue)> {
    vec![
        ("INSTRUME", s("HIRES: High Resolution Echelle Spectrometer")),
        ("DATE-OBS", s("2017-07-07")),
        ("UTC", s(utc)),
        ("OUTFILE", s("hi")),
        ("FRAMENO", KeyValue::Int(frameno as i64)),
        ("OUTDIR", s("/s/sdata125/hires1/2017jul06/")),
        ("OBSERVER", s("Smith")),
        ("OBSTYPE", s("Object")),
        ("LAMPNAME", s("none")),
        ("AUTOSHUT", KeyValue::Bool(true)),
        ("EXPTIME", KeyValue::Float(300.0)),
        ("XDISPERS", s("RED")),
        ("XDANGL", KeyValue::Float(0.9)),
        ("ECHANGL", KeyValue::Float(0.0)),
        ("DECKNAME", s("C2")),
        ("ROTPOSN", KeyValue::Float(10.0)),
        ("EL", KeyValue::Float(60.0)),
    ]
}
