// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use serde_json::json;

use super::{
    testing::{test_context, TestRun, ADMIN, KOAAPI},
    *,
};
use crate::stages::write_lines;

fn pipeline(test: &TestRun, start: Stage, stop: Stage) -> Pipeline {
    Pipeline::new(test_context(test), start, stop).unwrap()
}

#[test]
fn test_stage_names() {
    assert_eq!("dqa".parse::<Stage>().unwrap(), Stage::Dqa);
    assert_eq!("KOAXFR".parse::<Stage>().unwrap(), Stage::Koaxfr);
    assert!("ingest".parse::<Stage>().is_err());
    assert_eq!(Stage::Obtain.to_string(), "obtain");
}

#[test]
fn test_bad_stage_range() {
    let test = TestRun::new("HIRES", "2017-07-07");
    let result = Pipeline::new(test_context(&test), Stage::Tar, Stage::Locate);
    assert!(matches!(
        result,
        Err(StageError::BadStageRange {
            start: Stage::Tar,
            stop: Stage::Locate
        })
    ));
}

#[test]
fn test_stage_subset() {
    let test = TestRun::new("HIRES", "2017-07-07");
    let p = pipeline(&test, Stage::Locate, Stage::Dqa);
    let stages: Vec<Stage> = p.stages().collect();
    assert_eq!(stages, [Stage::Locate, Stage::Add, Stage::Dqa]);
}

#[test]
fn test_full_run_refused_when_already_processed() {
    let mut test = TestRun::new("HIRES", "2017-07-07");
    test.fakes.tracker.exists = true;
    let p = pipeline(&test, Stage::Obtain, Stage::Koaxfr);
    assert!(matches!(p.run(), Err(StageError::AlreadyProcessed { .. })));
    assert!(test.fakes.tracker.updates().is_empty());

    // A partial run is a repair and is allowed.
    let p = pipeline(&test, Stage::Obtain, Stage::Obtain);
    test.fakes.http.respond("getSchedule", json!([]));
    p.run().unwrap();
}

#[test]
fn test_empty_night_full_run() {
    let test = TestRun::new("HIRES", "2017-07-07");
    let http = &test.fakes.http;
    http.respond("getNightStaff", json!([{"Alias": "jsmith"}]));
    http.respond(
        "getSchedule",
        json!([{
            "SchedId": "1",
            "Account": "hires1",
            "Institution": "UCB",
            "Principal": "Smith",
            "ProjCode": "U123",
            "StartTime": "18:30",
            "EndTime": "05:30"
        }]),
    );
    http.respond(KOAAPI, json!({"stat": "OK"}));

    let p = pipeline(&test, Stage::Obtain, Stage::Koaxfr);
    p.run().unwrap();

    let dirs = &p.context().dirs;
    assert!(read_lines(&dirs.dqa_file()).unwrap().is_empty());
    assert_eq!(std::fs::read_dir(&dirs.lev0).unwrap().count(), 0);
    assert!(dirs.anc_tarball().exists());

    let num_files: Vec<String> = http
        .calls_to(KOAAPI)
        .into_iter()
        .flat_map(|(_, params)| params)
        .filter(|(k, _)| k == "numFiles")
        .map(|(_, v)| v)
        .collect();
    assert_eq!(num_files, ["0"]);
    assert!(test.fakes.mailer.sent().is_empty());

    let tracker = &test.fakes.tracker;
    assert_eq!(
        tracker.last(TrackingField::OndiskStat).as_deref(),
        Some("N/A")
    );
    assert_eq!(tracker.last(TrackingField::DepStatus).as_deref(), Some("DONE"));
}

#[test]
fn test_missing_artifact() {
    let test = TestRun::new("HIRES", "2017-07-07");
    let ctx = test_context(&test);
    ctx.dirs.create_all().unwrap();
    let result = Stage::Locate.post_check(&ctx);
    assert!(matches!(
        result,
        Err(StageError::MissingArtifact {
            stage: Stage::Locate,
            ..
        })
    ));

    // A DQA list with frames requires the lev0 tables.
    write_lines(&ctx.dirs.dqa_file(), ["a b"]).unwrap();
    let result = Stage::Dqa.post_check(&ctx);
    assert!(matches!(
        result,
        Err(StageError::MissingArtifact { stage: Stage::Dqa, path }) if path == ctx.dirs.filelist_table()
    ));
}

#[test]
fn test_add_must_copy_what_the_night_has() {
    let test = TestRun::new("HIRES", "2017-07-07");
    let source = test.nightly.join("s/nightly1/17/07/07");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("envFocus.arT"), "focus").unwrap();
    let ctx = test_context(&test);
    ctx.dirs.create_all().unwrap();

    let expected = ctx.dirs.nightly().join("envFocus.arT");
    assert!(matches!(
        Stage::Add.post_check(&ctx),
        Err(StageError::MissingArtifact { stage: Stage::Add, path }) if path == expected
    ));

    Stage::Add.run(&ctx).unwrap();
    Stage::Add.post_check(&ctx).unwrap();
}

#[test]
fn test_failed_stage_is_fatal() {
    let test = TestRun::new("HIRES", "2017-07-07");
    // DQA without a locate list.
    let p = pipeline(&test, Stage::Dqa, Stage::Dqa);
    assert!(p.run().is_err());

    let sent = test.fakes.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ADMIN);
    assert_eq!(
        test.fakes.tracker.last(TrackingField::DepStatus).as_deref(),
        Some("ERROR")
    );
}
