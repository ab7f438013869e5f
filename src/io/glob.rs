// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Functions to glob files.

use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use thiserror::Error;

/// Given a glob pattern, get all of the matches from the filesystem.
pub(crate) fn get_all_matches_from_glob(g: &str) -> Result<Vec<PathBuf>, GlobError> {
    let mut entries = vec![];
    for entry in glob(g)? {
        match entry {
            Ok(e) => entries.push(e),
            Err(e) => return Err(GlobError::GlobCrate(e)),
        }
    }
    Ok(entries)
}

/// Recursively find every file below `dir` whose name matches `name_glob`
/// (e.g. "*.fits.gz"). The directory itself is escaped, so odd characters in
/// its path are taken literally. Results are in lexical path order.
pub(crate) fn find_files(dir: &Path, name_glob: &str) -> Result<Vec<PathBuf>, GlobError> {
    let pattern = format!(
        "{}/**/{name_glob}",
        Pattern::escape(&dir.display().to_string())
    );
    let mut entries: Vec<PathBuf> = get_all_matches_from_glob(&pattern)?
        .into_iter()
        .filter(|p| p.is_file())
        .collect();
    entries.sort();
    Ok(entries)
}

/// Recursively find every `.fits` file below `dir`.
pub(crate) fn find_fits_files(dir: &Path) -> Result<Vec<PathBuf>, GlobError> {
    find_files(dir, "*.fits")
}

#[derive(Error, Debug)]
/// Error type associated with glob helper functions.
pub enum GlobError {
    #[error(transparent)]
    GlobCrate(#[from] glob::GlobError),

    #[error(transparent)]
    PatternError(#[from] glob::PatternError),
}

#[cfg(test)]
mod tests {
    use std::fs::{create_dir_all, File};

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn glob_cargo() {
        let result = get_all_matches_from_glob("./Cargo*");
        assert!(result.is_ok());
        let entries = result.unwrap();
        assert!(&entries.contains(&PathBuf::from("Cargo.toml")));
    }

    #[test]
    fn test_find_fits_files_recurses() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("hires1").join("2017jul06");
        create_dir_all(&nested).unwrap();
        File::create(nested.join("hi0002.fits")).unwrap();
        File::create(nested.join("hi0001.fits")).unwrap();
        File::create(nested.join("hi0001.fits.gz")).unwrap();
        File::create(tmp.path().join("top.fits")).unwrap();
        File::create(tmp.path().join("notes.txt")).unwrap();

        let found = find_fits_files(tmp.path()).unwrap();
        assert_eq!(
            found,
            vec![
                nested.join("hi0001.fits"),
                nested.join("hi0002.fits"),
                tmp.path().join("top.fits"),
            ]
        );

        let gz = find_files(tmp.path(), "*.fits.gz").unwrap();
        assert_eq!(gz, vec![nested.join("hi0001.fits.gz")]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let found = find_fits_files(Path::new("/this/does/not/exist")).unwrap();
        assert!(found.is_empty());
    }
}
