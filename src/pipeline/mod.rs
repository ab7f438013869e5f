// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Run a contiguous range of stages for one (instrument, UT date).
//!
//! Each stage communicates with the next only through files in the run's
//! directories. After a stage returns, the files it must have produced are
//! checked; a stage error or a missing artifact is fatal: the admin is
//! emailed, the tracking record is set to `ERROR` and the run stops.

mod context;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use context::PipelineContext;

use std::{path::PathBuf, time::Instant};

use log::{error, info};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    clients::TrackingField,
    stages::{self, read_lines, StageError},
};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Stage {
    Obtain,
    Locate,
    Add,
    Dqa,
    Tar,
    Koaxfr,
}

impl Stage {
    fn run(self, ctx: &PipelineContext) -> Result<(), StageError> {
        match self {
            Stage::Obtain => stages::obtain::run(ctx),
            Stage::Locate => stages::locate::run(ctx),
            Stage::Add => stages::add::run(ctx),
            Stage::Dqa => stages::dqa::run(ctx),
            Stage::Tar => stages::tar::run(ctx),
            Stage::Koaxfr => stages::koaxfr::run(ctx),
        }
    }

    /// Files the stage must leave behind.
    fn artifacts(self, ctx: &PipelineContext) -> Result<Vec<PathBuf>, StageError> {
        let dirs = &ctx.dirs;
        let artifacts = match self {
            Stage::Obtain => vec![dirs.obtain_file()],
            Stage::Locate => vec![dirs.locate_file()],
            Stage::Add => stages::add::expected_copies(ctx),
            Stage::Dqa => {
                let mut artifacts = vec![dirs.dqa_file()];
                // Tables are only written for nights with frames.
                if dirs.dqa_file().exists() && !read_lines(&dirs.dqa_file())?.is_empty() {
                    artifacts.extend([
                        dirs.filelist_table(),
                        dirs.metadata_table(),
                        dirs.fits_md5_table(),
                    ]);
                }
                artifacts
            }
            Stage::Tar => vec![dirs.anc_tarball(), dirs.anc_md5()],
            Stage::Koaxfr => vec![],
        };
        Ok(artifacts)
    }

    fn post_check(self, ctx: &PipelineContext) -> Result<(), StageError> {
        for path in self.artifacts(ctx)? {
            if !path.exists() {
                return Err(StageError::MissingArtifact { stage: self, path });
            }
        }
        Ok(())
    }
}

pub struct Pipeline {
    ctx: PipelineContext,
    start: Stage,
    stop: Stage,
}

impl Pipeline {
    pub fn new(ctx: PipelineContext, start: Stage, stop: Stage) -> Result<Pipeline, StageError> {
        if stop < start {
            return Err(StageError::BadStageRange { start, stop });
        }
        Ok(Pipeline { ctx, start, stop })
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// The stages this pipeline will run, in order.
    pub fn stages(&self) -> impl Iterator<Item = Stage> + '_ {
        Stage::iter().filter(|s| (self.start..=self.stop).contains(s))
    }

    fn is_full_run(&self) -> bool {
        self.start == Stage::Obtain && self.stop == Stage::Koaxfr
    }

    pub fn run(&self) -> Result<(), StageError> {
        let ctx = &self.ctx;
        let tracker = &ctx.clients.tracker;

        // Re-running a whole night would ingest it twice.
        if self.is_full_run() && ctx.tracking && tracker.record_exists() {
            return Err(StageError::AlreadyProcessed {
                instr: ctx.code().to_string(),
                ut_date: ctx.ut_date_str(),
            });
        }

        ctx.dirs.create_all()?;
        tracker.update(TrackingField::DepStatus, "PROCESSING");

        for stage in self.stages() {
            info!("Starting the {stage} stage");
            let start = Instant::now();
            if let Err(e) = stage.run(ctx).and_then(|()| stage.post_check(ctx)) {
                self.fail(stage, &e);
                return Err(e);
            }
            info!("Finished the {stage} stage in {:.1?}", start.elapsed());
        }

        if self.stop == Stage::Koaxfr {
            tracker.update(TrackingField::DepStatus, "DONE");
        }
        Ok(())
    }

    fn fail(&self, stage: Stage, e: &StageError) {
        let ctx = &self.ctx;
        error!("The {stage} stage failed: {e}");
        ctx.email_admin(
            &format!("{} DEP error ({})", ctx.code(), ctx.ut_date_str()),
            &format!(
                "The {stage} stage of the {} DEP run for {} failed:\n\n{e}\n\nLog: {}",
                ctx.code(),
                ctx.ut_date_str(),
                ctx.dirs.logfile().display()
            ),
        );
        ctx.clients.tracker.update(TrackingField::DepStatus, "ERROR");
    }
}
