// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions for reading and writing FITS files.

mod error;
mod header;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

pub use error::FitsError;
pub use header::{Card, Header, KeyValue};

use std::{
    ffi::{CStr, CString},
    os::raw::{c_char, c_int},
    path::Path,
};

use fitsio::{hdu::*, FitsFile};
use log::trace;

// Buffer sizes from fitsio.h.
const FLEN_KEYWORD: usize = 75;
const FLEN_VALUE: usize = 71;
const FLEN_COMMENT: usize = 73;

/// Open a fits file.
#[track_caller]
pub fn fits_open<P: AsRef<Path>>(file: P) -> Result<FitsFile, FitsError> {
    FitsFile::open(file.as_ref()).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Open {
            fits_error: Box::new(e),
            fits_filename: file.as_ref().to_path_buf().into_boxed_path(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })
}

/// Open a fits file for editing.
#[track_caller]
pub fn fits_edit<P: AsRef<Path>>(file: P) -> Result<FitsFile, FitsError> {
    FitsFile::edit(file.as_ref()).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Open {
            fits_error: Box::new(e),
            fits_filename: file.as_ref().to_path_buf().into_boxed_path(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })
}

/// Open a fits file's HDU. This also makes it the current HDU for raw cfitsio
/// calls.
#[track_caller]
pub fn fits_open_hdu(fits_fptr: &mut FitsFile, hdu_num: usize) -> Result<FitsHdu, FitsError> {
    fits_fptr.hdu(hdu_num).map_err(|e| {
        let caller = std::panic::Location::caller();
        FitsError::Fitsio {
            fits_error: Box::new(e),
            fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
            hdu_description: format!("{}", hdu_num + 1).into_boxed_str(),
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        }
    })
}

/// Read every card of a HDU into a [Header]. COMMENT, HISTORY and blank cards
/// are skipped.
#[track_caller]
pub fn fits_read_header(fits_fptr: &mut FitsFile, hdu_num: usize) -> Result<Header, FitsError> {
    fits_open_hdu(fits_fptr, hdu_num)?;

    let mut header = Header::new();
    let mut num_cards: c_int = 0;
    let mut num_free: c_int = 0;
    let mut status: c_int = 0;
    unsafe {
        // ffghsp = fits_get_hdrspace
        fitsio_sys::ffghsp(
            fits_fptr.as_raw(),
            &mut num_cards,
            &mut num_free,
            &mut status,
        );
    }
    if status != 0 {
        let caller = std::panic::Location::caller();
        return Err(FitsError::ReadCard {
            card_num: 0,
            status,
            fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
            hdu_num: hdu_num + 1,
            source_file: caller.file(),
            source_line: caller.line(),
            source_column: caller.column(),
        });
    }

    let mut key_buf = [0 as c_char; FLEN_KEYWORD];
    let mut value_buf = [0 as c_char; FLEN_VALUE];
    let mut comment_buf = [0 as c_char; FLEN_COMMENT];
    for card_num in 1..=num_cards {
        unsafe {
            // ffgkyn = fits_read_keyn
            fitsio_sys::ffgkyn(
                fits_fptr.as_raw(),
                card_num,
                key_buf.as_mut_ptr(),
                value_buf.as_mut_ptr(),
                comment_buf.as_mut_ptr(),
                &mut status,
            );
        }
        if status != 0 {
            let caller = std::panic::Location::caller();
            return Err(FitsError::ReadCard {
                card_num,
                status,
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu_num + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            });
        }

        // cfitsio always NUL-terminates these buffers.
        let (key, value, comment) = unsafe {
            (
                CStr::from_ptr(key_buf.as_ptr()).to_string_lossy(),
                CStr::from_ptr(value_buf.as_ptr()).to_string_lossy(),
                CStr::from_ptr(comment_buf.as_ptr()).to_string_lossy(),
            )
        };
        match key.trim() {
            "" | "COMMENT" | "HISTORY" | "END" => continue,
            _ => header.push_raw(&key, &value, &comment),
        }
    }

    trace!(
        "Read {} cards from {} HDU {}",
        header.len(),
        fits_fptr.file_path().display(),
        hdu_num + 1
    );
    Ok(header)
}

/// Read the primary header of a file.
pub fn read_primary_header<P: AsRef<Path>>(file: P) -> Result<Header, FitsError> {
    let mut fptr = fits_open(file)?;
    fits_read_header(&mut fptr, 0)
}

/// Write every card that was set on `header` since it was read into the
/// current file's HDU. Existing cards are updated in place; new cards are
/// appended.
#[track_caller]
pub fn fits_update_keys(
    fits_fptr: &mut FitsFile,
    hdu_num: usize,
    header: &Header,
) -> Result<(), FitsError> {
    fits_open_hdu(fits_fptr, hdu_num)?;

    for (key, card) in header.modified() {
        let key_c = CString::new(key).map_err(|_| FitsError::Nul(key.to_string()))?;
        let comment_c = CString::new(card.comment.as_str())
            .map_err(|_| FitsError::Nul(card.comment.clone()))?;
        let mut status: c_int = 0;
        unsafe {
            match &card.value {
                KeyValue::Str(s) => {
                    let value_c = CString::new(s.as_str()).map_err(|_| FitsError::Nul(s.clone()))?;
                    // ffukys = fits_update_key_str
                    fitsio_sys::ffukys(
                        fits_fptr.as_raw(),
                        key_c.as_ptr(),
                        value_c.as_ptr(),
                        comment_c.as_ptr(),
                        &mut status,
                    );
                }
                KeyValue::Int(i) => {
                    // ffukyj = fits_update_key_lng
                    fitsio_sys::ffukyj(
                        fits_fptr.as_raw(),
                        key_c.as_ptr(),
                        *i,
                        comment_c.as_ptr(),
                        &mut status,
                    );
                }
                KeyValue::Float(f) => {
                    // ffukyd = fits_update_key_dbl; a negative precision
                    // means "as many significant digits as needed".
                    fitsio_sys::ffukyd(
                        fits_fptr.as_raw(),
                        key_c.as_ptr(),
                        *f,
                        -15,
                        comment_c.as_ptr(),
                        &mut status,
                    );
                }
                KeyValue::Bool(b) => {
                    // ffukyl = fits_update_key_log
                    fitsio_sys::ffukyl(
                        fits_fptr.as_raw(),
                        key_c.as_ptr(),
                        *b as c_int,
                        comment_c.as_ptr(),
                        &mut status,
                    );
                }
            }
        }
        if status != 0 {
            let caller = std::panic::Location::caller();
            return Err(FitsError::WriteKey {
                key: key.to_string().into_boxed_str(),
                status,
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu_num + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            });
        }
    }

    Ok(())
}

/// The pixels of a single image HDU.
#[derive(Debug, Clone)]
pub struct ImageHdu {
    /// 0-indexed HDU number.
    pub hdu_num: usize,

    /// Number of rows (NAXIS2).
    pub num_rows: usize,

    /// Number of columns (NAXIS1).
    pub num_cols: usize,

    /// Row-major pixel values of the first image plane.
    pub data: Vec<f32>,
}

/// Given a FITS file pointer and a HDU, read the associated image.
#[track_caller]
pub fn fits_get_image<T: fitsio::images::ReadImage>(
    fits_fptr: &mut FitsFile,
    hdu: &FitsHdu,
) -> Result<T, FitsError> {
    match &hdu.info {
        HduInfo::ImageInfo { .. } => hdu.read_image(fits_fptr).map_err(|e| {
            let caller = std::panic::Location::caller();
            FitsError::Fitsio {
                fits_error: Box::new(e),
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_description: format!("{}", hdu.number + 1).into_boxed_str(),
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            }
        }),
        _ => {
            let caller = std::panic::Location::caller();
            Err(FitsError::NotImage {
                fits_filename: fits_fptr.file_path().to_path_buf().into_boxed_path(),
                hdu_num: hdu.number + 1,
                source_file: caller.file(),
                source_line: caller.line(),
                source_column: caller.column(),
            })
        }
    }
}

/// Read every non-empty image HDU of a file. Only the first plane of
/// higher-dimensional images is kept.
pub fn read_images<P: AsRef<Path>>(file: P) -> Result<Vec<ImageHdu>, FitsError> {
    let mut fptr = fits_open(file)?;
    let mut hdu_num = 0;
    let mut images = vec![];
    loop {
        let hdu = match fptr.hdu(hdu_num) {
            Ok(hdu) => hdu,
            // Running off the end of the file is how we find the last HDU.
            Err(_) => break,
        };
        if let HduInfo::ImageInfo { shape, .. } = &hdu.info {
            if shape.len() >= 2 && shape.iter().all(|&s| s > 0) {
                let n = shape.len();
                let (num_rows, num_cols) = (shape[n - 2], shape[n - 1]);
                let mut data: Vec<f32> = fits_get_image(&mut fptr, &hdu)?;
                data.truncate(num_rows * num_cols);
                images.push(ImageHdu {
                    hdu_num,
                    num_rows,
                    num_cols,
                    data,
                });
            }
        }
        hdu_num += 1;
    }
    Ok(images)
}
