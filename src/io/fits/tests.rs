// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tempfile::TempDir;

use super::{testing::*, *};

#[test]
fn test_header_round_trip_through_cfitsio() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("hi0001.fits");
    make_fits(
        &path,
        &[
            ("INSTRUME", s("HIRES")),
            ("FRAMENO", KeyValue::Int(1)),
            ("EXPTIME", KeyValue::Float(300.5)),
            ("DARKCLOS", KeyValue::Bool(false)),
        ],
        None,
    );

    let header = read_primary_header(&path).unwrap();
    assert_eq!(header.get_str("INSTRUME").as_deref(), Some("HIRES"));
    assert_eq!(header.get_i64("FRAMENO"), Some(1));
    assert_eq!(header.get_f64("EXPTIME"), Some(300.5));
    assert_eq!(header.get_bool("DARKCLOS"), Some(false));
    // Nothing read from disk counts as modified.
    assert_eq!(header.modified().count(), 0);
}

#[test]
fn test_update_replaces_existing_cards() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("hi0002.fits");
    make_fits(&path, &[("OBJECT", s("bias"))], None);

    let mut header = read_primary_header(&path).unwrap();
    header.set("OBJECT", "HD 1234", "target");
    header.set("KOAID", "HI.20170707.03600.fits", "KOA: Data file name");
    let mut fptr = fits_edit(&path).unwrap();
    fits_update_keys(&mut fptr, 0, &header).unwrap();
    drop(fptr);

    let reread = read_primary_header(&path).unwrap();
    assert_eq!(reread.get_str("OBJECT").as_deref(), Some("HD 1234"));
    assert_eq!(
        reread.get_str("KOAID").as_deref(),
        Some("HI.20170707.03600.fits")
    );
    // Updating must not duplicate the card.
    assert_eq!(reread.iter().filter(|(k, _)| *k == "OBJECT").count(), 1);
}

#[test]
fn test_read_images() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("image.fits");
    let pixels: Vec<f32> = (0..12).map(|i| i as f32).collect();
    make_fits(&path, &[], Some((3, 4, pixels.clone())));

    let images = read_images(&path).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].hdu_num, 0);
    assert_eq!(images[0].num_rows, 3);
    assert_eq!(images[0].num_cols, 4);
    assert_eq!(images[0].data, pixels);
}

#[test]
fn test_open_missing_file() {
    let result = read_primary_header("/does/not/exist.fits");
    assert!(matches!(result, Err(FitsError::Open { .. })));
}
