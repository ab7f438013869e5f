// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use super::dqa::MetadataError;
use crate::{
    clients::ClientError, config::ConfigError, io::fits::FitsError, io::GlobError,
    pipeline::Stage, prog_split::ProgSplitError,
};

/// Errors that stop a stage. Problems with individual frames never end up
/// here; those frames are quarantined instead.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("A DEP record for {instr} on {ut_date} already exists; refusing to run the full pipeline again")]
    AlreadyProcessed { instr: String, ut_date: String },

    #[error("The {stage} stage finished, but {path} is missing")]
    MissingArtifact { stage: Stage, path: PathBuf },

    #[error("The stop stage '{stop}' comes before the start stage '{start}'")]
    BadStageRange { start: Stage, stop: Stage },

    #[error("Couldn't parse line {line_num} of {file}: '{line}'")]
    BadListLine {
        file: PathBuf,
        line_num: usize,
        line: String,
    },

    #[error("Transfer to the archive failed: {0}")]
    Transfer(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error(transparent)]
    ProgSplit(#[from] ProgSplitError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
