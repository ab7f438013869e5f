// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fixtures shared by tests that need real FITS files on disk.

use std::path::Path;

use fitsio::{
    images::{ImageDescription, ImageType},
    FitsFile,
};

use super::{fits_update_keys, Header, KeyValue};

/// Write a FITS file with the given primary-header cards. If `image` is given
/// as `(num_rows, num_cols, pixels)`, it becomes the primary image.
pub(crate) fn make_fits(
    path: &Path,
    cards: &[(&str, KeyValue)],
    image: Option<(usize, usize, Vec<f32>)>,
) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut fptr = match &image {
        Some((num_rows, num_cols, _)) => {
            let description = ImageDescription {
                data_type: ImageType::Float,
                dimensions: &[*num_rows, *num_cols],
            };
            FitsFile::create(path)
                .with_custom_primary(&description)
                .open()
                .unwrap()
        }
        None => FitsFile::create(path).open().unwrap(),
    };
    if let Some((_, _, pixels)) = &image {
        let hdu = fptr.primary_hdu().unwrap();
        hdu.write_image(&mut fptr, pixels).unwrap();
    }

    let mut header = Header::new();
    for (key, value) in cards {
        header.set(key, value.clone(), "");
    }
    fits_update_keys(&mut fptr, 0, &header).unwrap();
}

/// Shorthand for string cards.
pub(crate) fn s(v: &str) -> KeyValue {
    KeyValue::Str(v.to_string())
}
