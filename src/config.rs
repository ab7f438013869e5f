// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The static DEP configuration.
//!
//! The file is YAML (it has historically been called `config.live.ini`). Each
//! supported instrument has its own section keyed by its upper-case code;
//! everything else is a fixed, named section.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;
use thiserror::Error;
use vec1::Vec1;

use crate::constants::{DEFAULT_PROPINT_MONTHS, DEFAULT_SUNRISE, DEFAULT_SUNSET};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "API", default)]
    pub api: ApiConfig,

    #[serde(rename = "KOAXFR")]
    pub koaxfr: Option<KoaxfrConfig>,

    #[serde(rename = "REPORT", default)]
    pub report: ReportConfig,

    /// Only used by the auxiliary progress-table updater; carried so that the
    /// section doesn't get mistaken for an instrument.
    #[serde(rename = "KOADB")]
    pub koadb: Option<serde_yaml::Value>,

    /// Overrides used when testing the pipeline away from the summit disks.
    #[serde(rename = "CIT")]
    pub cit: Option<CitConfig>,

    #[serde(rename = "NIGHTLY", default)]
    pub nightly: NightlyConfig,

    #[serde(rename = "DQA", default)]
    pub dqa: DqaConfig,

    /// Per-instrument sections.
    #[serde(flatten)]
    pub instruments: IndexMap<String, InstrumentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    #[serde(rename = "ROOTDIR")]
    pub rootdir: PathBuf,

    /// Replaces the instrument's default search roots. An empty list is
    /// rejected.
    #[serde(rename = "SDATA")]
    pub sdata: Option<Vec1<PathBuf>>,

    #[serde(rename = "PSFR")]
    pub psfr: Option<String>,

    #[serde(rename = "PSFR_XFR")]
    pub psfr_xfr: Option<String>,

    #[serde(rename = "DRP")]
    pub drp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    /// The telescope schedule endpoint.
    #[serde(rename = "TELAPI")]
    pub telapi: Option<String>,

    /// The proposals endpoint.
    #[serde(rename = "PROPAPI")]
    pub propapi: Option<String>,

    /// The archive endpoint, used for ingestion notification and progress
    /// tracking.
    #[serde(rename = "KOAAPI")]
    pub koaapi: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KoaxfrConfig {
    #[serde(rename = "SERVER")]
    pub server: String,

    #[serde(rename = "ACCOUNT")]
    pub account: String,

    #[serde(rename = "DIR")]
    pub dir: String,

    #[serde(rename = "EMAILFROM")]
    pub email_from: Option<String>,

    #[serde(rename = "EMAILTO")]
    pub email_to: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportConfig {
    #[serde(rename = "ADMINEMAIL")]
    pub admin_email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CitConfig {
    /// Search this directory instead of the instrument's sdata roots.
    #[serde(rename = "LOCATE_DIR")]
    pub locate_dir: Option<PathBuf>,

    /// Set to `false` to accept files regardless of modification time.
    #[serde(rename = "MODTIME", default = "default_true")]
    pub modtime: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NightlyConfig {
    /// The directory containing the `s` and `h` nightly trees.
    #[serde(rename = "ROOT", default = "default_nightly_root")]
    pub root: PathBuf,
}

impl Default for NightlyConfig {
    fn default() -> Self {
        Self {
            root: default_nightly_root(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DqaConfig {
    /// Directory of `keywords.format.<INSTR>` files. The built-in tables are
    /// used when this isn't given.
    #[serde(rename = "KEYWORD_DIR")]
    pub keyword_dir: Option<PathBuf>,

    /// Proprietary period of science programs [months].
    #[serde(rename = "PROPINT", default = "default_propint")]
    pub propint: u32,

    #[serde(rename = "SUNSET", default = "default_sunset")]
    pub sunset: String,

    #[serde(rename = "SUNRISE", default = "default_sunrise")]
    pub sunrise: String,
}

impl Default for DqaConfig {
    fn default() -> Self {
        Self {
            keyword_dir: None,
            propint: default_propint(),
            sunset: default_sunset(),
            sunrise: default_sunrise(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_nightly_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_propint() -> u32 {
    DEFAULT_PROPINT_MONTHS
}

fn default_sunset() -> String {
    DEFAULT_SUNSET.to_string()
}

fn default_sunrise() -> String {
    DEFAULT_SUNRISE.to_string()
}

impl Config {
    /// Read and parse a configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        debug!("Reading configuration from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            file: path.display().to_string(),
            err: e,
        })?;
        Self::from_yaml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { err, .. } => ConfigError::Parse {
                file: path.display().to_string(),
                err,
            },
            e => e,
        })
    }

    pub fn from_yaml_str(s: &str) -> Result<Config, ConfigError> {
        let mut config: Config = serde_yaml::from_str(s).map_err(|e| ConfigError::Parse {
            file: "<string>".to_string(),
            err: e,
        })?;
        // Instrument sections are looked up case-insensitively.
        config.instruments = config
            .instruments
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        Ok(config)
    }

    /// Get the section of an instrument.
    pub fn instrument(&self, instr: &str) -> Result<&InstrumentConfig, ConfigError> {
        self.instruments
            .get(&instr.to_uppercase())
            .ok_or_else(|| ConfigError::MissingInstrument(instr.to_uppercase()))
    }

    /// Whether the locate stage should check modification times.
    pub fn check_modtime(&self) -> bool {
        self.cit.as_ref().map(|c| c.modtime).unwrap_or(true)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Couldn't read config file {file}: {err}")]
    Read { file: String, err: std::io::Error },

    #[error("Couldn't parse config file {file}: {err}")]
    Parse {
        file: String,
        err: serde_yaml::Error,
    },

    #[error("The config file has no section for instrument {0}")]
    MissingInstrument(String),

    #[error("The ROOTDIR {0} doesn't exist")]
    NoRootDir(PathBuf),

    #[error("The config file has no {section}/{key} entry, which is required for the {stage} stage")]
    MissingKey {
        section: &'static str,
        key: &'static str,
        stage: &'static str,
    },
}
