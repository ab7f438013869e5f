// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Everything a run knows about itself.

use chrono::NaiveDate;
use log::{error, warn};

use crate::{
    clients::Clients,
    config::{Config, ConfigError},
    dirs::NightDirs,
    instrument::{Instrument, InstrumentDescriptor},
};

/// Created once per invocation. Stages only read from it.
pub struct PipelineContext {
    pub desc: &'static InstrumentDescriptor,
    pub ut_date: NaiveDate,
    pub dirs: NightDirs,
    pub config: Config,

    /// Whether the remote progress-tracking record is maintained.
    pub tracking: bool,

    pub clients: Clients,
}

impl PipelineContext {
    /// Resolve the run's directories. The instrument's ROOTDIR must exist.
    pub fn new(
        instr: Instrument,
        ut_date: NaiveDate,
        config: Config,
        clients: Clients,
        tracking: bool,
    ) -> Result<PipelineContext, ConfigError> {
        let desc = instr.descriptor();
        let rootdir = config.instrument(desc.code())?.rootdir.clone();
        if !rootdir.is_dir() {
            return Err(ConfigError::NoRootDir(rootdir));
        }
        Ok(PipelineContext {
            desc,
            ut_date,
            dirs: NightDirs::new(rootdir, desc.code(), ut_date),
            config,
            tracking,
            clients,
        })
    }

    pub fn code(&self) -> &'static str {
        self.desc.code()
    }

    /// `YYYY-MM-DD`.
    pub fn ut_date_str(&self) -> String {
        self.ut_date.format("%Y-%m-%d").to_string()
    }

    /// Email the configured admin. Failures are logged only; there's nobody
    /// else to tell.
    pub fn email_admin(&self, subject: &str, body: &str) {
        let Some(to) = self.config.report.admin_email.as_deref() else {
            warn!("No REPORT/ADMINEMAIL configured; not sending '{subject}'");
            return;
        };
        let from = self
            .config
            .koaxfr
            .as_ref()
            .and_then(|k| k.email_from.as_deref())
            .unwrap_or(to);
        if let Err(e) = self.clients.mailer.send(from, to, subject, body) {
            error!("Couldn't email {to}: {e}");
        }
    }
}
