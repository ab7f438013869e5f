// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The stages of a nightly run, in the order they execute.

pub(crate) mod add;
pub(crate) mod dqa;
mod error;
pub(crate) mod koaxfr;
pub(crate) mod locate;
pub(crate) mod obtain;
pub(crate) mod tar;

pub use dqa::MetadataError;
pub use error::StageError;
pub(crate) use obtain::{read_obtain_file, ProgramEntry};

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use log::{debug, warn};

use crate::{io::files::copy_into_dir, pipeline::PipelineContext};

/// Copy a rejected frame into `anc/udf`, logging the reason.
pub(crate) fn quarantine(ctx: &PipelineContext, staged: &Path, reason: &str) {
    warn!("Quarantining {}: {reason}", staged.display());
    match copy_into_dir(staged, &ctx.dirs.udf) {
        Ok(copy) => debug!("{} -> {}", staged.display(), copy.display()),
        Err(e) => warn!("Couldn't copy {} into {}: {e}", staged.display(), ctx.dirs.udf.display()),
    }
}

/// Write one line per item to a list file, replacing whatever was there.
pub(crate) fn write_lines<I, S>(path: &Path, lines: I) -> std::io::Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut f = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(f, "{}", line.as_ref())?;
    }
    f.flush()
}

/// Non-blank lines of a list file.
pub(crate) fn read_lines(path: &Path) -> std::io::Result<Vec<String>> {
    let f = BufReader::new(File::open(path)?);
    let mut lines = vec![];
    for line in f.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}
