// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Narrow interfaces to the services the pipeline talks to: HTTP/JSON
//! endpoints, email, subprocesses, and the remote progress-tracking table.
//!
//! Stages only ever see the traits, so tests can swap in fakes.

mod error;
mod http;
mod mail;
mod process;
#[cfg(test)]
pub(crate) mod testing;
mod tracker;

pub use error::ClientError;
pub use http::{json_str, HttpClient, JsonGetter};
pub use mail::{Mailer, SendmailMailer};
pub use process::{CommandOutput, CommandRunner, ProcessRunner};
pub use tracker::{HttpTracker, NullTracker, ProgressTracker, TrackingField};

/// Every collaborator a run needs.
pub struct Clients {
    pub http: Box<dyn JsonGetter>,
    pub mailer: Box<dyn Mailer>,
    pub runner: Box<dyn CommandRunner>,
    pub tracker: Box<dyn ProgressTracker>,
}
