// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code.
//!
//! Only 3 things should be public in this module: `Dep`, `Dep::run`, and
//! `DepError`.

mod error;
mod printers;

pub use error::DepError;
pub(crate) use printers::{display_warnings, InfoPrinter, Warn};

use std::{
    borrow::Cow,
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Mutex,
};

use chrono::NaiveDate;
use clap::{AppSettings, Parser};
use log::info;

use crate::{
    clients::{
        Clients, HttpClient, HttpTracker, NullTracker, ProcessRunner, ProgressTracker,
        SendmailMailer,
    },
    config::Config,
    instrument::Instrument,
    pipeline::{Pipeline, PipelineContext, Stage},
    time::{parse_ut_date, today_ut},
    PROGRESS_BARS,
};

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

lazy_static::lazy_static! {
    /// The run's logfile, once its directory is known.
    static ref LOGFILE: Mutex<Option<File>> = Mutex::new(None);
}

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = r#"Nightly data evaluation and processing (DEP) for the Keck Observatory Archive.
Finds a night's raw frames for one instrument, assesses and annotates them, and
hands them to the archive."#
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(infer_long_args = true)]
pub struct Dep {
    /// The instrument, e.g. HIRES or nirc2.
    #[clap(name = "INSTR")]
    instr: String,

    /// The UT date of the night (YYYY-MM-DD). The default is today.
    #[clap(name = "UT_DATE")]
    ut_date: Option<String>,

    /// 1 to maintain the archive's progress-tracking record, 0 not to.
    #[clap(name = "TPX", default_value = "1")]
    tpx: u8,

    /// The first stage to run: obtain, locate, add, dqa, tar or koaxfr.
    #[clap(name = "PROCESS_START", default_value = "obtain")]
    process_start: String,

    /// The last stage to run.
    #[clap(name = "PROCESS_STOP", default_value = "koaxfr")]
    process_stop: String,

    /// The configuration file.
    #[clap(short, long, default_value = "config.live.ini")]
    config: PathBuf,

    /// Don't draw progress bars.
    #[clap(long)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    verbosity: u8,
}

fn parse_stage(s: &str) -> Result<Stage, DepError> {
    Stage::from_str(s).map_err(|_| {
        DepError::BadInput(format!(
            "'{s}' is not a stage; expected one of obtain, locate, add, dqa, tar, koaxfr"
        ))
    })
}

/// Everything from the command line, checked.
#[derive(Debug, PartialEq, Eq)]
struct RunArgs {
    instr: Instrument,
    ut_date: NaiveDate,
    tracking: bool,
    start: Stage,
    stop: Stage,
}

impl Dep {
    fn parse_args(&self) -> Result<RunArgs, DepError> {
        let instr = Instrument::from_code(&self.instr)?;
        let ut_date = match &self.ut_date {
            Some(d) => parse_ut_date(d)?,
            None => today_ut(),
        };
        let tracking = match self.tpx {
            0 => false,
            1 => true,
            n => return Err(DepError::BadInput(format!("TPX must be 0 or 1, not {n}"))),
        };
        let start = parse_stage(&self.process_start)?;
        let stop = parse_stage(&self.process_stop)?;
        if stop < start {
            return Err(DepError::BadInput(format!(
                "The stop stage '{stop}' comes before the start stage '{start}'"
            )));
        }
        Ok(RunArgs {
            instr,
            ut_date,
            tracking,
            start,
            stop,
        })
    }

    pub fn run(self) -> Result<(), DepError> {
        let args = self.parse_args()?;
        setup_logging(self.verbosity, args.instr)
            .map_err(|e| DepError::Generic(format!("Failed to initialise logging: {e}")))?;
        // Enable progress bars if the user didn't say "no progress bars".
        if !self.no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        info!("dep {}", env!("CARGO_PKG_VERSION"));

        let config = Config::from_file(&self.config)?;
        warn_about_config(&config, &args);
        let clients = live_clients(&config, &args)?;
        let ctx = PipelineContext::new(args.instr, args.ut_date, config, clients, args.tracking)?;
        attach_logfile(&ctx.dirs.logfile())?;

        let mut printer = InfoPrinter::new(format!("{} DEP for {}", args.instr, ctx.ut_date_str()).into());
        printer.push_block(build_info());
        printer.push_line(format!("Stages: {} to {}", args.start, args.stop).into());
        printer.push_block(vec![
            format!("Root:    {}", ctx.dirs.root.display()).into(),
            format!("Stage:   {}", ctx.dirs.stage.display()).into(),
            format!("Logfile: {}", ctx.dirs.logfile().display()).into(),
        ]);
        printer.push_line(
            if args.tracking {
                "Progress tracking on"
            } else {
                "Progress tracking off"
            }
            .into(),
        );
        printer.display();
        display_warnings();

        let pipeline = Pipeline::new(ctx, args.start, args.stop)?;
        pipeline.run()?;

        info!("dep {} {} complete.", args.instr, pipeline.context().ut_date_str());
        Ok(())
    }
}

/// Configuration that is legal but probably not what the operator wants.
fn warn_about_config(config: &Config, args: &RunArgs) {
    if config.report.admin_email.is_none() {
        "No REPORT/ADMINEMAIL is configured; fatal errors won't be emailed".warn();
    }
    if let Some(cit) = &config.cit {
        let mut block: Vec<Cow<'static, str>> = vec!["CIT test overrides are active".into()];
        if let Some(dir) = &cit.locate_dir {
            block.push(format!("Searching only {}", dir.display()).into());
        }
        if !cit.modtime {
            block.push("Not checking modification times".into());
        }
        block.warn();
    }
    if args.stop == Stage::Koaxfr && config.koaxfr.is_none() {
        "No KOAXFR section; the koaxfr stage will fail if any frames are archived".warn();
    }
    if args.tracking && config.api.koaapi.is_none() {
        "No API/KOAAPI is configured; progress tracking is off".warn();
    }
}

/// The production collaborators. Tracking goes through the archive API when
/// it's switched on and configured.
fn live_clients(config: &Config, args: &RunArgs) -> Result<Clients, DepError> {
    let tracker: Box<dyn ProgressTracker> = match (&config.api.koaapi, args.tracking) {
        (Some(url), true) => Box::new(HttpTracker::new(
            Box::new(HttpClient::new()?),
            url,
            args.instr.into(),
            &args.ut_date.format("%Y-%m-%d").to_string(),
        )),
        _ => Box::new(NullTracker),
    };
    Ok(Clients {
        http: Box::new(HttpClient::new()?),
        mailer: Box::new(SendmailMailer),
        runner: Box::new(ProcessRunner),
        tracker,
    })
}

/// The version recorded in DQA_VERS: the crate version and, when known, the
/// git commit it was built from.
pub(crate) fn dqa_version() -> String {
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => format!("{}-{hash}", env!("CARGO_PKG_VERSION")),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Copies every log line to stdout and, once it's open, the run's logfile.
struct Tee;

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut logfile) = LOGFILE.lock() {
            if let Some(f) = logfile.as_mut() {
                f.write_all(buf)?;
            }
        }
        std::io::stdout().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Ok(mut logfile) = LOGFILE.lock() {
            if let Some(f) = logfile.as_mut() {
                f.flush()?;
            }
        }
        std::io::stdout().flush()
    }
}

/// Start copying log lines into `path`, appending to an earlier run's log.
fn attach_logfile(path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let f = OpenOptions::new().create(true).append(true).open(path)?;
    if let Ok(mut logfile) = LOGFILE.lock() {
        *logfile = Some(f);
    }
    info!("Logging to {}", path.display());
    Ok(())
}

/// The stage a log line comes from, judging by its module path.
fn stage_of(target: &str) -> &str {
    match target.split_once("::stages::") {
        Some((_, rest)) => rest.split("::").next().unwrap_or(rest),
        None if target.contains("::pipeline") => "pipeline",
        None => "dep",
    }
}

/// Activate a logger. All log messages are put onto `stdout` and the run's
/// logfile, prefixed with the instrument and the stage. Source code lines are
/// displayed in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8, instr: Instrument) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Pipe(Box::new(Tee)));
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        _ => builder.filter_level(log::LevelFilter::Trace),
    };
    let with_lines = verbosity >= 3;
    builder.format(move |buf, record| {
        let timestamp = buf.timestamp();
        let level = record.level();
        let stage = stage_of(record.target());
        let message = record.args();
        if with_lines {
            let target = record.target();
            let line = record.line().unwrap_or(0);
            writeln!(buf, "[{timestamp} {level:5} {instr} {stage}] {target}:{line} {message}")
        } else {
            writeln!(buf, "[{timestamp} {level:5} {instr} {stage}] {message}")
        }
    });
    builder.try_init()
}

/// How this executable was compiled, for the run summary.
fn build_info() -> Vec<Cow<'static, str>> {
    let commit = match (GIT_COMMIT_HASH_SHORT, GIT_DIRTY) {
        (Some(hash), Some(true)) => format!("Commit:   {hash} (dirty)"),
        (Some(hash), _) => format!("Commit:   {hash}"),
        (None, _) => "Commit:   <no git info>".to_string(),
    };
    let mut block: Vec<Cow<'static, str>> = vec![commit.into()];
    if let Some(head) = GIT_HEAD_REF {
        block.push(format!("Head ref: {head}").into());
    }
    block.push(format!("Built:    {BUILT_TIME_UTC}").into());
    block.push(format!("Compiler: {RUSTC_VERSION}").into());
    block
}
