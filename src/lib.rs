// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Nightly data evaluation and processing (DEP) for the Keck Observatory Archive.

A run takes one instrument's frames from one night through six stages
(obtain, locate, add, dqa, tar and koaxfr), leaving behind level-0 frames,
ancillary tarballs and the tables the archive ingests.
 */

mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod dirs;
pub mod instrument;
pub(crate) mod io;
pub mod pipeline;
pub(crate) mod prog_split;
pub(crate) mod stages;
pub mod time;

use crossbeam_utils::atomic::AtomicCell;

lazy_static::lazy_static! {
    /// Are progress bars being drawn? This should only ever be enabled by CLI
    /// code.
    static ref PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
}

// Re-exports.
pub use cli::{Dep, DepError};
pub use io::GlobError;
pub use prog_split::ProgSplitError;
pub use stages::{MetadataError, StageError};
