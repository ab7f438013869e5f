// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Canonical directories and files of a single (instrument, UT date) run.
//!
//! Every instrument writes below its own `<root>/<INSTR>/<YYYYMMDD>` and
//! `<root>/stage/<INSTR>/<YYYYMMDD>` trees, so concurrent runs for different
//! instruments never touch the same files.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::debug;

use crate::time::compact_date;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightDirs {
    /// Upper-case instrument code.
    pub instr: String,

    /// `YYYYMMDD`.
    pub date: String,

    pub root: PathBuf,

    /// Scratch copies of the night's raw files and the inter-stage lists.
    pub stage: PathBuf,

    /// `<root>/<INSTR>/<YYYYMMDD>`; the tree transferred to the archive.
    pub process: PathBuf,

    pub lev0: PathBuf,
    pub lev1: PathBuf,
    pub anc: PathBuf,

    /// Quarantined ("unarchived") files.
    pub udf: PathBuf,
}

impl NightDirs {
    pub fn new<P: AsRef<Path>>(root: P, instr: &str, ut_date: NaiveDate) -> NightDirs {
        let root = root.as_ref().to_path_buf();
        let instr = instr.to_uppercase();
        let date = compact_date(ut_date);
        let stage = root.join("stage").join(&instr).join(&date);
        let process = root.join(&instr).join(&date);
        let anc = process.join("anc");
        NightDirs {
            lev0: process.join("lev0"),
            lev1: process.join("lev1"),
            udf: anc.join("udf"),
            anc,
            stage,
            process,
            root,
            date,
            instr,
        }
    }

    /// Create every directory of the run that doesn't already exist.
    pub fn create_all(&self) -> std::io::Result<()> {
        for dir in [
            &self.stage,
            &self.process,
            &self.lev0,
            &self.anc,
            &self.udf,
            &self.nightly(),
        ] {
            if !dir.exists() {
                debug!("Creating directory {}", dir.display());
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(())
    }

    /// Where the ancillary weather and focus files are copied.
    pub fn nightly(&self) -> PathBuf {
        self.anc.join("nightly")
    }

    pub fn logfile(&self) -> PathBuf {
        self.process
            .join(format!("dep_{}_{}.log", self.instr, self.date))
    }

    fn stage_list(&self, kind: &str) -> PathBuf {
        self.stage.join(format!("dep_{kind}{}.txt", self.instr))
    }

    pub fn obtain_file(&self) -> PathBuf {
        self.stage_list("obtain")
    }

    pub fn notsched_file(&self) -> PathBuf {
        self.stage_list("notsched")
    }

    pub fn locate_file(&self) -> PathBuf {
        self.stage_list("locate")
    }

    pub fn dqa_file(&self) -> PathBuf {
        self.stage_list("dqa")
    }

    pub fn createprog_file(&self) -> PathBuf {
        self.stage.join("createprog.txt")
    }

    pub fn newproginfo_file(&self) -> PathBuf {
        self.stage.join("newproginfo.txt")
    }

    /// Where a raw file is mirrored inside the stage tree.
    pub fn staged_path<P: AsRef<Path>>(&self, raw: P) -> PathBuf {
        let raw = raw.as_ref();
        let relative = raw.strip_prefix("/").unwrap_or(raw);
        self.stage.join(relative)
    }

    fn lev0_table(&self, name: &str) -> PathBuf {
        self.lev0.join(format!("{}.{name}", self.date))
    }

    pub fn filelist_table(&self) -> PathBuf {
        self.lev0_table("filelist.table")
    }

    pub fn metadata_table(&self) -> PathBuf {
        self.lev0_table("metadata.table")
    }

    pub fn fits_md5_table(&self) -> PathBuf {
        self.lev0_table("FITS.md5sum.table")
    }

    pub fn jpeg_md5_table(&self) -> PathBuf {
        self.lev0_table("JPEG.md5sum.table")
    }

    pub fn anc_tarball(&self) -> PathBuf {
        self.anc.join(format!("anc{}.tar.gz", self.date))
    }

    pub fn anc_md5(&self) -> PathBuf {
        self.anc.join(format!("anc{}.md5sum", self.date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let d = NaiveDate::from_ymd_opt(2017, 7, 7).unwrap();
        let dirs = NightDirs::new("/koadata", "hires", d);
        assert_eq!(dirs.instr, "HIRES");
        assert_eq!(dirs.stage, PathBuf::from("/koadata/stage/HIRES/20170707"));
        assert_eq!(dirs.lev0, PathBuf::from("/koadata/HIRES/20170707/lev0"));
        assert_eq!(dirs.udf, PathBuf::from("/koadata/HIRES/20170707/anc/udf"));
        assert_eq!(
            dirs.obtain_file(),
            PathBuf::from("/koadata/stage/HIRES/20170707/dep_obtainHIRES.txt")
        );
        assert_eq!(
            dirs.logfile(),
            PathBuf::from("/koadata/HIRES/20170707/dep_HIRES_20170707.log")
        );
        assert_eq!(
            dirs.metadata_table(),
            PathBuf::from("/koadata/HIRES/20170707/lev0/20170707.metadata.table")
        );
        assert_eq!(
            dirs.anc_tarball(),
            PathBuf::from("/koadata/HIRES/20170707/anc/anc20170707.tar.gz")
        );
    }

    #[test]
    fn test_staged_path_mirrors_absolute_path() {
        let d = NaiveDate::from_ymd_opt(2017, 7, 7).unwrap();
        let dirs = NightDirs::new("/koadata", "HIRES", d);
        assert_eq!(
            dirs.staged_path("/s/sdata125/hires1/2017jul06/hi0001.fits"),
            PathBuf::from("/koadata/stage/HIRES/20170707/s/sdata125/hires1/2017jul06/hi0001.fits")
        );
    }
}
