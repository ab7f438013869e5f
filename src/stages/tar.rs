// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Bundle `anc/` into `anc<YYYYMMDD>.tar.gz` with its checksum, then remove
//! the bundled directories.

use std::{fs::File, io::Write};

use flate2::{write::GzEncoder, Compression};
use log::{debug, info};

use super::StageError;
use crate::{io::files::md5_line, pipeline::PipelineContext};

pub(crate) fn run(ctx: &PipelineContext) -> Result<(), StageError> {
    let dirs = &ctx.dirs;
    let tarball = dirs.anc_tarball();
    info!("Creating {}", tarball.display());

    let bundled = [dirs.nightly(), dirs.udf.clone()];
    {
        let encoder = GzEncoder::new(File::create(&tarball)?, Compression::default());
        let mut builder = ::tar::Builder::new(encoder);
        for dir in bundled.iter().filter(|d| d.is_dir()) {
            let name = dir.strip_prefix(&dirs.anc).unwrap_or(dir);
            debug!("Adding {} to the tarball", name.display());
            builder.append_dir_all(name, dir)?;
        }
        builder.into_inner()?.finish()?;
    }

    let mut md5 = File::create(dirs.anc_md5())?;
    writeln!(md5, "{}", md5_line(&tarball)?)?;

    for dir in bundled.iter().filter(|d| d.is_dir()) {
        debug!("Removing {}", dir.display());
        std::fs::remove_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use flate2::read::GzDecoder;

    use super::*;
    use crate::{
        io::files::md5_file,
        pipeline::testing::{test_context, TestRun},
    };

    #[test]
    fn test_tarball_contents() {
        let test = TestRun::new("HIRES", "2017-07-07");
        let ctx = test_context(&test);
        ctx.dirs.create_all().unwrap();
        std::fs::write(ctx.dirs.nightly().join("envMet.arT"), "met").unwrap();
        std::fs::write(ctx.dirs.udf.join("hi0002.fits"), "bad").unwrap();

        run(&ctx).unwrap();

        let tarball = ctx.dirs.anc_tarball();
        let mut names: Vec<String> = ::tar::Archive::new(GzDecoder::new(File::open(&tarball).unwrap()))
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .filter(|n| n.ends_with(".arT") || n.ends_with(".fits"))
            .collect();
        names.sort();
        assert_eq!(names, ["nightly/envMet.arT", "udf/hi0002.fits"]);

        let md5 = std::fs::read_to_string(ctx.dirs.anc_md5()).unwrap();
        assert_eq!(
            md5.trim(),
            format!("{}  anc20170707.tar.gz", md5_file(&tarball).unwrap())
        );
        assert!(!ctx.dirs.nightly().exists());
        assert!(!ctx.dirs.udf.exists());
    }
}
