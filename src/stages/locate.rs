// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Find the night's raw frames and copy them into the stage tree.
//!
//! Candidates are `.fits` files below the instrument's search roots that were
//! last modified inside the night window. Each candidate is copied into the
//! stage tree (mirroring its absolute path) and the copy is validated; frames
//! that fail are copied into `anc/udf` and left out of `dep_locate<INSTR>.txt`.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use indexmap::IndexSet;
use log::{debug, info, trace, warn};

use super::{quarantine, write_lines, StageError};
use crate::{
    clients::TrackingField,
    constants::LOCATE_EXCLUDED_PATH_PARTS,
    io::{
        files::copy_no_overwrite,
        find_fits_files,
        fits::{fits_edit, fits_update_keys, read_primary_header, Header},
    },
    instrument::Koaid,
    pipeline::PipelineContext,
    time::NightWindow,
};

/// Whether a path below a search root is somewhere raw science frames never
/// live.
fn is_excluded(relative: &Path) -> bool {
    let s = Path::new("/").join(relative).display().to_string();
    LOCATE_EXCLUDED_PATH_PARTS.iter().any(|part| s.contains(part))
}

/// Candidate files below the search roots, in search-root order.
fn candidates(ctx: &PipelineContext) -> Result<IndexSet<PathBuf>, StageError> {
    let window = NightWindow::new(ctx.ut_date, ctx.desc.end_time());
    let check_modtime = ctx.config.check_modtime();
    if !check_modtime {
        info!("Not checking modification times");
    }

    let mut found = IndexSet::new();
    for dir in ctx.desc.search_dirs(&ctx.config) {
        if !dir.is_dir() {
            debug!("Search directory {} doesn't exist", dir.display());
            continue;
        }
        debug!("Searching {}", dir.display());
        for file in find_fits_files(&dir)? {
            if is_excluded(file.strip_prefix(&dir).unwrap_or(&file)) {
                trace!("Skipping excluded {}", file.display());
                continue;
            }
            if check_modtime {
                let modified = std::fs::metadata(&file)?.modified()?;
                if !window.contains_system_time(modified) {
                    continue;
                }
            }
            found.insert(file);
        }
    }
    Ok(found)
}

/// Copy a raw file into the stage tree. An existing copy is kept as is.
fn stage_file(ctx: &PipelineContext, raw: &Path) -> std::io::Result<PathBuf> {
    let staged = ctx.dirs.staged_path(raw);
    if let Some(parent) = staged.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !copy_no_overwrite(raw, &staged)? {
        trace!("{} is already staged", raw.display());
    }
    Ok(staged)
}

/// Read a staged frame's header, filling INSTRUME in the copy when the
/// instrument is allowed to leave it out.
fn staged_header(ctx: &PipelineContext, staged: &Path) -> Result<Header, String> {
    let mut header = read_primary_header(staged).map_err(|e| e.to_string())?;
    if ctx.desc.fill_instrume && header.get_str("INSTRUME").is_none() {
        debug!("Setting INSTRUME in {}", staged.display());
        header.set("INSTRUME", ctx.code(), "KOA: Instrument");
        let mut fptr = fits_edit(staged).map_err(|e| e.to_string())?;
        fits_update_keys(&mut fptr, 0, &header).map_err(|e| e.to_string())?;
    }
    Ok(header)
}

pub(crate) fn run(ctx: &PipelineContext) -> Result<(), StageError> {
    let mut queue: Vec<PathBuf> = candidates(ctx)?.into_iter().collect();
    info!("{} candidate file(s) in the night window", queue.len());

    let mut seen: HashSet<PathBuf> = queue.iter().cloned().collect();
    let mut koaids: HashMap<String, PathBuf> = HashMap::new();
    let mut survivors = vec![];
    let mut sdata_dirs = IndexSet::new();

    // Linked files are appended to the queue as they're discovered.
    let mut i = 0;
    while i < queue.len() {
        let raw = queue[i].clone();
        i += 1;

        let staged = match stage_file(ctx, &raw) {
            Ok(s) => s,
            Err(e) => {
                warn!("Couldn't stage {}: {e}", raw.display());
                continue;
            }
        };

        let header = match staged_header(ctx, &staged) {
            Ok(h) => h,
            Err(e) => {
                quarantine(ctx, &staged, &format!("unreadable header: {e}"));
                continue;
            }
        };

        if let Some(key) = ctx.desc.linked_file_keyword {
            if let Some(linked) = header.get_str(key).map(PathBuf::from) {
                if linked.is_file() && seen.insert(linked.clone()) {
                    debug!("Adding {} (linked from {})", linked.display(), raw.display());
                    queue.push(linked);
                }
            }
        }

        if ctx.desc.raw_fname(&header).is_none() {
            quarantine(ctx, &staged, "couldn't determine the raw file name");
            continue;
        }

        let koaid = match Koaid::from_header(ctx.desc, &header) {
            Ok(k) => k,
            Err(e) => {
                quarantine(ctx, &staged, &format!("bad KOAID: {e}"));
                continue;
            }
        };
        let koaid_str = koaid.to_string();
        if let Some(first) = koaids.get(&koaid_str) {
            quarantine(
                ctx,
                &staged,
                &format!("Duplicate KOAID {koaid_str} (first seen in {})", first.display()),
            );
            continue;
        }
        if !koaid.belongs_to_night(ctx.ut_date, ctx.desc.end_time_secs) {
            quarantine(
                ctx,
                &staged,
                &format!("KOAID {koaid_str} doesn't belong to the night of {}", ctx.ut_date_str()),
            );
            continue;
        }

        trace!("{} -> {koaid_str}", raw.display());
        koaids.insert(koaid_str, raw.clone());
        if let Some(root) = raw.iter().take(3).collect::<PathBuf>().to_str() {
            sdata_dirs.insert(root.to_string());
        }
        survivors.push(raw);
    }

    info!("{} file(s) located", survivors.len());
    write_lines(
        &ctx.dirs.locate_file(),
        survivors.iter().map(|p| p.display().to_string()),
    )?;

    let tracker = &ctx.clients.tracker;
    tracker.update(TrackingField::Files, &survivors.len().to_string());
    if !sdata_dirs.is_empty() {
        let dirs: Vec<String> = sdata_dirs.into_iter().collect();
        tracker.update(TrackingField::SdataDir, &dirs.join(","));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        io::fits::testing::{make_fits, s},
        pipeline::testing::{hires_cards, test_context, TestRun},
        stages::read_lines,
    };

    fn locate(test: &TestRun) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let ctx = test_context(test);
        ctx.dirs.create_all().unwrap();
        run(&ctx).unwrap();
        let located = read_lines(&ctx.dirs.locate_file())
            .unwrap()
            .into_iter()
            .map(PathBuf::from)
            .collect();
        let mut quarantined: Vec<PathBuf> = std::fs::read_dir(&ctx.dirs.udf)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        quarantined.sort();
        (located, quarantined)
    }

    #[test]
    fn test_excluded_paths() {
        assert!(is_excluded(Path::new("deimos1/fcs/ref.fits")));
        assert!(is_excluded(Path::new("/s/sdata125/mira/hi0001.fits")));
        assert!(is_excluded(Path::new("hires1/savier-protected/hi0001.fits")));
        assert!(!is_excluded(Path::new("hires1/hi0001.fits")));
    }

    #[test]
    fn test_single_frame_is_staged() {
        let test = TestRun::new("HIRES", "2017-07-07");
        let raw = test.sdata.join("hires1/2017jul06/hi0001.fits");
        make_fits(&raw, &hires_cards("01:00:00.0", 1), None);

        let (located, quarantined) = locate(&test);
        assert_eq!(located, [raw.clone()]);
        assert!(quarantined.is_empty());
        let ctx = test_context(&test);
        assert!(ctx.dirs.staged_path(&raw).exists());
        assert_eq!(
            test.fakes.tracker.last(TrackingField::Files).as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_duplicate_koaid_quarantined() {
        let test = TestRun::new("HIRES", "2017-07-07");
        let first = test.sdata.join("hires1/a/hi0001.fits");
        let second = test.sdata.join("hires1/b/hi0002.fits");
        make_fits(&first, &hires_cards("01:00:00.0", 1), None);
        make_fits(&second, &hires_cards("01:00:00.4", 2), None);

        let (located, quarantined) = locate(&test);
        assert_eq!(located, [first]);
        assert_eq!(quarantined.len(), 1);
        assert_eq!(quarantined[0].file_name().unwrap(), "hi0002.fits");
    }

    #[test]
    fn test_wrong_night_quarantined() {
        let test = TestRun::new("HIRES", "2017-07-07");
        let raw = test.sdata.join("hires1/hi0001.fits");
        let mut cards = hires_cards("21:00:00.0", 1);
        for (key, value) in cards.iter_mut() {
            if *key == "DATE-OBS" {
                *value = s("2017-07-08");
            }
        }
        make_fits(&raw, &cards, None);
        let tail = test.sdata.join("hires1/hi0002.fits");
        let mut cards = hires_cards("05:00:00.0", 2);
        for (key, value) in cards.iter_mut() {
            if *key == "DATE-OBS" {
                *value = s("2017-07-08");
            }
        }
        make_fits(&tail, &cards, None);

        let (located, quarantined) = locate(&test);
        assert_eq!(located, [tail]);
        assert_eq!(quarantined.len(), 1);
    }

    #[test]
    fn test_same_named_rejects_all_quarantined() {
        let test = TestRun::new("HIRES", "2017-07-07");
        for (i, dir) in ["hires1", "hires2"].into_iter().enumerate() {
            let raw = test.sdata.join(dir).join("hi0001.fits");
            let mut cards = hires_cards("21:00:00.0", i as u32 + 1);
            for (key, value) in cards.iter_mut() {
                if *key == "DATE-OBS" {
                    *value = s("2017-07-08");
                }
            }
            make_fits(&raw, &cards, None);
        }

        let (located, quarantined) = locate(&test);
        assert!(located.is_empty());
        assert_eq!(quarantined.len(), 2);
        let names: Vec<_> = quarantined
            .iter()
            .map(|q| q.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["hi0001.fits", "hi0001_1.fits"]);
    }

    #[test]
    fn test_missing_raw_name_quarantined() {
        let test = TestRun::new("HIRES", "2017-07-07");
        let raw = test.sdata.join("hires1/hi0001.fits");
        let cards: Vec<_> = hires_cards("01:00:00.0", 1)
            .into_iter()
            .filter(|(k, _)| *k != "OUTFILE")
            .collect();
        make_fits(&raw, &cards, None);

        let (located, quarantined) = locate(&test);
        assert!(located.is_empty());
        assert_eq!(quarantined.len(), 1);
    }

    #[test]
    fn test_deimos_fcs_reference_chased() {
        let test = TestRun::new("DEIMOS", "2017-07-07");
        let fcs = test.sdata.join("deimos1/fcs/ref.fits");
        make_fits(
            &fcs,
            &[
                ("INSTRUME", s("DEIMOS")),
                ("DATE-OBS", s("2017-07-07")),
                ("UTC", s("00:59:00.0")),
                ("OUTFILE", s("fcs")),
                ("FRAMENO", s("1")),
                ("OUTDIR", s("/s/sdata1001/deimos1/fcs")),
            ],
            None,
        );
        let science = test.sdata.join("deimos1/2017jul06/d0001.fits");
        make_fits(
            &science,
            &[
                ("INSTRUME", s("DEIMOS")),
                ("DATE-OBS", s("2017-07-07")),
                ("UTC", s("01:00:00.0")),
                ("OUTFILE", s("d")),
                ("FRAMENO", s("1")),
                ("OUTDIR", s("/s/sdata1001/deimos1/2017jul06")),
                ("FCSIMGFI", s(&fcs.display().to_string())),
            ],
            None,
        );

        let (located, quarantined) = locate(&test);
        assert!(quarantined.is_empty());
        assert_eq!(located, [science, fcs.clone()]);
        let ctx = test_context(&test);
        assert!(ctx.dirs.staged_path(&fcs).exists());
    }

    #[test]
    fn test_nirc2_instrume_filled() {
        let test = TestRun::new("NIRC2", "2017-07-07");
        let raw = test.sdata.join("nirc2/n0001.fits");
        make_fits(
            &raw,
            &[
                ("DATE-OBS", s("2017-07-07")),
                ("UTC", s("06:00:00.0")),
                ("OUTFILE", s("n")),
                ("FILENUM", s("1")),
            ],
            None,
        );

        let (located, _) = locate(&test);
        assert_eq!(located, [raw.clone()]);
        let ctx = test_context(&test);
        let header = read_primary_header(ctx.dirs.staged_path(&raw)).unwrap();
        assert_eq!(header.get_str("INSTRUME").as_deref(), Some("NIRC2"));
        let original = read_primary_header(&raw).unwrap();
        assert!(original.get_str("INSTRUME").is_none());
    }
}
