// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Plain-file helpers: copying without clobbering, gzip, and md5 checksums.

use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use flate2::{write::GzEncoder, Compression};
use log::{debug, trace};
use md5::{Digest, Md5};

/// Copy `src` to `dst`, creating any missing parent directories. Existing
/// destinations are left alone; the return value says whether a copy was made.
pub(crate) fn copy_no_overwrite(src: &Path, dst: &Path) -> std::io::Result<bool> {
    if dst.exists() {
        trace!("{} already exists; not copying", dst.display());
        return Ok(false);
    }
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, dst)?;
    Ok(true)
}

/// Copy a file into a directory, keeping its file name unless a file with
/// different content already holds it; then `<stem>_<n>.<ext>` is used. A copy
/// with identical content is reused. Returns the path of the copy.
pub(crate) fn copy_into_dir(src: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    let name = src.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no file name", src.display()),
        )
    })?;
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut dst = dir.join(name);
    let mut n = 0;
    loop {
        if copy_no_overwrite(src, &dst)? {
            return Ok(dst);
        }
        if md5_file(&dst)? == md5_file(src)? {
            trace!("{} is already in {}", src.display(), dir.display());
            return Ok(dst);
        }
        n += 1;
        dst = dir.join(format!("{stem}_{n}{ext}"));
    }
}

/// Compress a file to `<file>.gz` and remove the original. Returns the path of
/// the compressed file.
pub(crate) fn gzip_in_place(file: &Path) -> std::io::Result<PathBuf> {
    let mut gz_name = file.as_os_str().to_owned();
    gz_name.push(".gz");
    let gz = PathBuf::from(gz_name);
    debug!("Compressing {}", file.display());

    let mut input = BufReader::new(File::open(file)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(&gz)?), Compression::default());
    std::io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    std::fs::remove_file(file)?;
    Ok(gz)
}

/// The hex md5 digest of a file's content.
pub(crate) fn md5_file(file: &Path) -> std::io::Result<String> {
    let mut hasher = Md5::new();
    let mut input = BufReader::new(File::open(file)?);
    std::io::copy(&mut input, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// A `<md5>  <name>` checksum line, as written by `md5sum`.
pub(crate) fn md5_line(file: &Path) -> std::io::Result<String> {
    let digest = md5_file(file)?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(format!("{digest}  {name}"))
}

/// File size in megabytes.
pub(crate) fn size_mb(file: &Path) -> std::io::Result<f64> {
    Ok(std::fs::metadata(file)?.len() as f64 / 1e6)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use flate2::read::GzDecoder;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_copy_no_overwrite() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.fits");
        std::fs::write(&src, b"first").unwrap();
        let dst = tmp.path().join("deep").join("er").join("a.fits");

        assert!(copy_no_overwrite(&src, &dst).unwrap());
        std::fs::write(&src, b"second").unwrap();
        assert!(!copy_no_overwrite(&src, &dst).unwrap());
        assert_eq!(std::fs::read(&dst).unwrap(), b"first");
    }

    #[test]
    fn test_copy_into_dir_keeps_same_named_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("udf");
        let first = tmp.path().join("hires1").join("hi0001.fits");
        let second = tmp.path().join("hires2").join("hi0001.fits");
        for (file, contents) in [(&first, "first"), (&second, "second")] {
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(file, contents).unwrap();
        }

        assert_eq!(copy_into_dir(&first, &dir).unwrap(), dir.join("hi0001.fits"));
        assert_eq!(copy_into_dir(&second, &dir).unwrap(), dir.join("hi0001_1.fits"));
        // Copying the same file again doesn't make another copy.
        assert_eq!(copy_into_dir(&second, &dir).unwrap(), dir.join("hi0001_1.fits"));
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 2);
        assert_eq!(std::fs::read(dir.join("hi0001.fits")).unwrap(), b"first");
    }

    #[test]
    fn test_gzip_in_place() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("HI.20170707.03600.fits");
        File::create(&file)
            .unwrap()
            .write_all(b"SIMPLE  =                    T")
            .unwrap();

        let gz = gzip_in_place(&file).unwrap();
        assert_eq!(gz, tmp.path().join("HI.20170707.03600.fits.gz"));
        assert!(!file.exists());

        let mut contents = String::new();
        GzDecoder::new(File::open(&gz).unwrap())
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "SIMPLE  =                    T");
    }

    #[test]
    fn test_md5() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("empty.txt");
        File::create(&file).unwrap();
        assert_eq!(md5_file(&file).unwrap(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            md5_line(&file).unwrap(),
            "d41d8cd98f00b204e9800998ecf8427e  empty.txt"
        );
    }
}
