// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProgSplitError {
    #[error("{0} programs share the night but not all have start and end times; can't split the night")]
    MissingTimes(usize),

    #[error("Couldn't parse '{0}' as an HST time of day")]
    BadTime(String),

    #[error("Line {line_num} of {file} should have {expected} tab-separated fields: '{line}'")]
    BadRecord {
        file: PathBuf,
        line_num: usize,
        expected: usize,
        line: String,
    },

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
