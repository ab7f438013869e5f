// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Couldn't build the HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Couldn't run '{program}': {err}")]
    Spawn {
        program: String,
        err: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("No recipient was configured for email '{0}'")]
    NoRecipient(String),
}
