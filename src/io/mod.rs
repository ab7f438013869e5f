// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Code to handle reading from and writing to files.

pub(crate) mod files;
pub(crate) mod fits;
mod glob;

pub use self::glob::GlobError;
pub(crate) use self::glob::{find_files, find_fits_files, get_all_matches_from_glob};
