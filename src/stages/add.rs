// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Copy the night's weather and guider-focus logs into `anc/nightly`.

use std::path::PathBuf;

use chrono::NaiveDate;
use log::{info, warn};

use super::StageError;
use crate::pipeline::PipelineContext;

/// Files copied from the telescope's nightly directory.
pub(crate) const NIGHTLY_FILES: [&str; 2] = ["envMet.arT", "envFocus.arT"];

/// Candidate nightly directories, in order of preference: the `s` tree, then
/// the `h` tree.
fn nightly_dirs(root: &std::path::Path, telnr: u8, ut_date: NaiveDate) -> [PathBuf; 2] {
    let date = ut_date.format("%y/%m/%d").to_string();
    ["s", "h"].map(|tree| {
        root.join(tree)
            .join(format!("nightly{telnr}"))
            .join(&date)
    })
}

/// The nightly directory the files come from, if the night has one.
fn source_dir(ctx: &PipelineContext) -> Result<PathBuf, [PathBuf; 2]> {
    let candidates = nightly_dirs(&ctx.config.nightly.root, ctx.desc.telnr, ctx.ut_date);
    match candidates.iter().find(|d| d.is_dir()) {
        Some(d) => Ok(d.clone()),
        None => Err(candidates),
    }
}

/// The copies `run` must leave in `anc/nightly`: one per nightly file present
/// at the source.
pub(crate) fn expected_copies(ctx: &PipelineContext) -> Vec<PathBuf> {
    let Ok(source) = source_dir(ctx) else {
        return vec![];
    };
    let dest = ctx.dirs.nightly();
    NIGHTLY_FILES
        .iter()
        .filter(|name| source.join(name).is_file())
        .map(|name| dest.join(name))
        .collect()
}

pub(crate) fn run(ctx: &PipelineContext) -> Result<(), StageError> {
    let dest = ctx.dirs.nightly();
    std::fs::create_dir_all(&dest)?;

    let source = match source_dir(ctx) {
        Ok(source) => source,
        Err([s, h]) => {
            warn!(
                "No nightly directory for {} (tried {} and {})",
                ctx.ut_date_str(),
                s.display(),
                h.display()
            );
            return Ok(());
        }
    };

    info!("Copying nightly files from {}", source.display());
    for name in NIGHTLY_FILES {
        let file = source.join(name);
        if file.is_file() {
            // The telescope appends to these all night; always take the latest.
            std::fs::copy(&file, dest.join(name))?;
        } else {
            warn!("{} doesn't exist", file.display());
        }
    }
    Ok(())
}
