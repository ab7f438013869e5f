// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all DEP errors. This should be the *only* error enum that is
//! publicly visible.

use thiserror::Error;

use crate::{
    clients::ClientError,
    config::ConfigError,
    instrument::InstrumentError,
    io::{fits::FitsError, GlobError},
    stages::{MetadataError, StageError},
    time::TimeError,
    ProgSplitError,
};

/// The *only* publicly visible error from the DEP. Each message should say
/// what the operator can do about it, unless it's "generic".
#[derive(Error, Debug)]
pub enum DepError {
    /// Bad command-line input; nothing has been staged.
    #[error("{0}\n\nUsage: dep INSTR [UT_DATE] [TPX] [PROCESS_START] [PROCESS_STOP]")]
    BadInput(String),

    /// A problem with the configuration file.
    #[error("{0}\n\nCheck the configuration file (--config).")]
    Config(String),

    /// A cfitsio error. Because these are usually quite spartan, some
    /// suggestions are provided here.
    #[error("cfitsio error: {0}\n\nIf you don't know what this means, try turning up verbosity (-v or -vv) and maybe disabling progress bars.")]
    Cfitsio(String),

    /// One of the services the pipeline talks to misbehaved.
    #[error("{0}\n\nThe admin has been emailed; the run can be repeated from the failed stage.")]
    ExternalService(String),

    /// A stage finished without leaving behind what the next stage needs.
    #[error("{0}\n\nThe admin has been emailed; the run can be repeated from the failed stage.")]
    PostCheck(String),

    /// The night has been processed before.
    #[error("{0}\n\nRun individual stages (PROCESS_START/PROCESS_STOP) to repair a night.")]
    AlreadyProcessed(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<InstrumentError> for DepError {
    fn from(e: InstrumentError) -> Self {
        Self::BadInput(e.to_string())
    }
}

impl From<TimeError> for DepError {
    fn from(e: TimeError) -> Self {
        Self::BadInput(e.to_string())
    }
}

impl From<ConfigError> for DepError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::NoRootDir(_) | ConfigError::MissingInstrument(_) => {
                Self::BadInput(e.to_string())
            }
            ConfigError::Read { .. } | ConfigError::Parse { .. } | ConfigError::MissingKey { .. } => {
                Self::Config(e.to_string())
            }
        }
    }
}

impl From<FitsError> for DepError {
    fn from(e: FitsError) -> Self {
        Self::Cfitsio(e.to_string())
    }
}

impl From<ClientError> for DepError {
    fn from(e: ClientError) -> Self {
        Self::ExternalService(e.to_string())
    }
}

impl From<MetadataError> for DepError {
    fn from(e: MetadataError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<ProgSplitError> for DepError {
    fn from(e: ProgSplitError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<GlobError> for DepError {
    fn from(e: GlobError) -> Self {
        Self::Generic(e.to_string())
    }
}

impl From<StageError> for DepError {
    fn from(e: StageError) -> Self {
        match e {
            StageError::AlreadyProcessed { .. } => Self::AlreadyProcessed(e.to_string()),
            StageError::BadStageRange { .. } => Self::BadInput(e.to_string()),
            StageError::MissingArtifact { .. } => Self::PostCheck(e.to_string()),
            StageError::Transfer(_) => Self::ExternalService(e.to_string()),
            StageError::Config(e) => Self::from(e),
            StageError::Fits(e) => Self::from(e),
            StageError::Client(e) => Self::from(e),
            StageError::Metadata(e) => Self::from(e),
            StageError::ProgSplit(e) => Self::from(e),
            StageError::Glob(e) => Self::from(e),
            StageError::BadListLine { .. } | StageError::IO(_) => Self::Generic(e.to_string()),
        }
    }
}

impl From<std::io::Error> for DepError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
