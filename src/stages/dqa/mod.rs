// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Data quality assessment.
//!
//! Every frame listed by the locate stage goes through its instrument's check
//! list in two passes. The first pass runs the checks up to program
//! attribution and feeds the night to the program splitter; the second runs
//! the rest. A frame failing any check is quarantined. Survivors are written
//! to `lev0/<KOAID>.fits.gz` with JPEG previews, and the night's file list,
//! metadata and md5 tables are written alongside.

mod checks;
mod jpeg;
mod metadata;
mod stats;
mod weather;

pub use metadata::MetadataError;

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info, trace, warn};

use self::{
    checks::{Checker, Frame, FrameError},
    jpeg::write_previews,
    metadata::{load_definitions, MetadataTable},
    weather::AncTable,
};
use super::{quarantine, read_lines, read_obtain_file, write_lines, StageError};
use crate::{
    cli::dqa_version,
    constants::NULL,
    instrument::{Check, InstrumentDescriptor},
    io::{
        files::{gzip_in_place, md5_line},
        fits::{fits_edit, fits_update_keys},
    },
    pipeline::PipelineContext,
    prog_split::{read_newproginfo, write_createprog, write_newproginfo, CreateProgRecord, ProgSplit},
    PROGRESS_BARS,
};

/// What the program splitter needs to know about a frame.
fn createprog_record(desc: &InstrumentDescriptor, frame: &Frame, oa: &str) -> CreateProgRecord {
    let header = &frame.header;
    let get = |key: &str| header.get_str(key).unwrap_or_default();
    CreateProgRecord {
        file: frame.staged.display().to_string(),
        date_obs: get("DATE-OBS"),
        utc: get("UTC"),
        outdir: desc.keyword(header, "OUTDIR").unwrap_or_default(),
        observer: desc.keyword(header, "OBSERVER").unwrap_or_default(),
        frameno: desc.keyword(header, "FRAMENO").unwrap_or_default(),
        imagetype: get("KOAIMTYP"),
        progid: get("PROGID"),
        progpi: get("PROGPI"),
        proginst: get("PROGINST"),
        progtitl: get("PROGTITL"),
        oa: oa.to_string(),
    }
}

/// A frame written to `lev0`.
struct Archived {
    staged: PathBuf,
    raw: PathBuf,
    koaid: String,
    fits: PathBuf,
    jpegs: Vec<PathBuf>,
}

/// Write the frame with its updated header to `lev0`, compress it and render
/// its previews. Nothing is left in `lev0` if any step fails.
fn archive(ctx: &PipelineContext, frame: &mut Frame, koaid: String) -> Result<Archived, FrameError> {
    let dest = ctx.dirs.lev0.join(&koaid);
    let mut gz_name = dest.as_os_str().to_owned();
    gz_name.push(".gz");
    let gz = PathBuf::from(gz_name);
    for stale in [&dest, &gz] {
        if stale.exists() {
            debug!("Replacing {}", stale.display());
            std::fs::remove_file(stale)?;
        }
    }

    let stem = koaid.trim_end_matches(".fits").to_string();
    let (fits, jpegs) = match write_lev0(frame, &dest, &ctx.dirs.lev0, &stem) {
        Ok(written) => written,
        Err(e) => {
            for orphan in [&dest, &gz] {
                if orphan.exists() {
                    if let Err(e) = std::fs::remove_file(orphan) {
                        warn!("Couldn't remove {}: {e}", orphan.display());
                    }
                }
            }
            return Err(e);
        }
    };
    trace!("{} -> {}", frame.staged.display(), fits.display());

    Ok(Archived {
        staged: frame.staged.clone(),
        raw: frame.raw.clone(),
        koaid,
        fits,
        jpegs,
    })
}

fn write_lev0(
    frame: &mut Frame,
    dest: &Path,
    lev0: &Path,
    stem: &str,
) -> Result<(PathBuf, Vec<PathBuf>), FrameError> {
    std::fs::copy(&frame.staged, dest)?;
    {
        let mut fptr = fits_edit(dest)?;
        fits_update_keys(&mut fptr, 0, &frame.header)?;
    }
    let fits = gzip_in_place(dest)?;
    let jpegs = write_previews(frame.images()?, lev0, stem);
    Ok((fits, jpegs))
}

fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    ProgressBar::new(len as _)
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg:17}: [{wide_bar:.blue}] {pos:2}/{len:2} frames ({elapsed_precise}<{eta_precise})").unwrap()
                .progress_chars("=> "),
        )
        .with_position(0)
        .with_message(message)
}

pub(crate) fn run(ctx: &PipelineContext) -> Result<(), StageError> {
    let dirs = &ctx.dirs;
    let raws: Vec<PathBuf> = read_lines(&dirs.locate_file())?
        .into_iter()
        .map(PathBuf::from)
        .collect();
    info!("{} frame(s) to assess", raws.len());

    let programs = read_obtain_file(&dirs.obtain_file())?;
    let oa = programs
        .first()
        .map(|p| p.oa.clone())
        .unwrap_or_else(|| NULL.to_string());
    let nightly = dirs.nightly();
    let mut checker = Checker::new(
        ctx,
        oa,
        AncTable::read(&nightly.join("envMet.arT")),
        AncTable::read(&nightly.join("envFocus.arT")),
        dqa_version(),
    );
    let definitions = load_definitions(ctx.desc.instr, ctx.config.dqa.keyword_dir.as_deref())?;

    let checks = ctx.desc.checks;
    let split = checks
        .iter()
        .position(|c| matches!(c, Check::ProgInfo))
        .unwrap_or(checks.len());
    let (before, after) = checks.split_at(split);

    let multi_progress = MultiProgress::with_draw_target(if PROGRESS_BARS.load() {
        ProgressDrawTarget::stdout()
    } else {
        ProgressDrawTarget::hidden()
    });
    let check_progress = multi_progress.add(progress_bar(raws.len(), "Checking headers"));
    let archive_progress = multi_progress.add(progress_bar(raws.len(), "Archiving"));

    // First pass: everything the program splitter needs.
    let mut frames = vec![];
    let mut koaids = HashSet::new();
    for raw in raws {
        check_progress.inc(1);
        let staged = dirs.staged_path(&raw);
        let mut frame = match Frame::open(raw, staged.clone()) {
            Ok(f) => f,
            Err(e) => {
                quarantine(ctx, &staged, &format!("unreadable header: {e}"));
                continue;
            }
        };
        if let Err(e) = checker.run_all(&mut frame, before) {
            quarantine(ctx, &staged, &e.to_string());
            continue;
        }
        let Some(koaid) = frame.koaid.as_ref().map(|k| k.to_string()) else {
            quarantine(ctx, &staged, "no KOAID was assigned");
            continue;
        };
        if !koaids.insert(koaid.clone()) {
            quarantine(ctx, &staged, &format!("Duplicate KOAID {koaid}"));
            continue;
        }
        frames.push(frame);
    }
    check_progress.abandon_with_message("Checked headers");

    // Attribute the night's frames to programs.
    let records: Vec<CreateProgRecord> = frames
        .iter()
        .map(|f| createprog_record(ctx.desc, f, &checker.oa))
        .collect();
    write_createprog(&dirs.createprog_file(), &records)?;
    let splitter = ProgSplit {
        desc: ctx.desc,
        programs: &programs,
        http: ctx.clients.http.as_ref(),
        propapi: ctx.config.api.propapi.as_deref(),
        sunset: &ctx.config.dqa.sunset,
        sunrise: &ctx.config.dqa.sunrise,
    };
    let infos = splitter.assign(&records)?;
    write_newproginfo(&dirs.newproginfo_file(), &infos)?;
    checker.programs = read_newproginfo(&dirs.newproginfo_file())?;

    // Second pass: the rest of the checks, then out to lev0.
    let mut table = MetadataTable::new(&definitions, ctx.desc.keyword_skips);
    let mut archived = vec![];
    archive_progress.set_length(frames.len() as _);
    for mut frame in frames {
        archive_progress.inc(1);
        let result = checker
            .run_all(&mut frame, after)
            .and_then(|()| {
                let koaid = frame.header.get_str("KOAID").unwrap_or_default();
                archive(ctx, &mut frame, koaid)
            });
        match result {
            Ok(a) => {
                table.add_row(&frame.header, &a.koaid);
                archived.push(a);
            }
            Err(e) => quarantine(ctx, &frame.staged, &e.to_string()),
        }
    }
    archive_progress.abandon_with_message("Archived frames");
    info!("{} frame(s) archived", archived.len());

    write_lines(
        &dirs.dqa_file(),
        archived
            .iter()
            .map(|a| format!("{} {}", a.staged.display(), a.fits.display())),
    )?;
    if archived.is_empty() {
        return Ok(());
    }

    let mut filelist: Vec<String> = archived
        .iter()
        .map(|a| format!("{} {}", a.raw.display(), a.koaid))
        .collect();
    filelist.push(format!("{} Total FITS files", archived.len()));
    write_lines(&dirs.filelist_table(), filelist)?;

    table.write(&dirs.metadata_table())?;

    let fits_md5s = archived
        .iter()
        .map(|a| md5_line(&a.fits))
        .collect::<Result<Vec<_>, _>>()?;
    write_lines(&dirs.fits_md5_table(), fits_md5s)?;

    let jpeg_md5s = archived
        .iter()
        .flat_map(|a| a.jpegs.iter())
        .map(|j| md5_line(j))
        .collect::<Result<Vec<_>, _>>()?;
    if !jpeg_md5s.is_empty() {
        write_lines(&dirs.jpeg_md5_table(), jpeg_md5s)?;
    }
    Ok(())
}
