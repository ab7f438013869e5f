// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pixel statistics and saturation counts.

use ndarray::{s, ArrayView2};

use crate::io::fits::{Header, ImageHdu};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Stats {
    pub(crate) mean: f64,
    pub(crate) median: f64,
    pub(crate) std: f64,
}

/// Mean, median and (population) standard deviation of the finite values.
pub(crate) fn stats<'a, I: IntoIterator<Item = &'a f32>>(values: I) -> Option<Stats> {
    let mut v: Vec<f64> = values
        .into_iter()
        .filter(|x| x.is_finite())
        .map(|&x| x as f64)
        .collect();
    if v.is_empty() {
        return None;
    }
    let n = v.len() as f64;
    let mean = v.iter().sum::<f64>() / n;
    let std = (v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    let median = if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    };
    Some(Stats { mean, median, std })
}

fn view(image: &ImageHdu) -> Option<ArrayView2<f32>> {
    ArrayView2::from_shape((image.num_rows, image.num_cols), &image.data).ok()
}

/// A centred box with sides of half the smaller image dimension.
fn central_box(image: &ImageHdu) -> Option<Stats> {
    let view = view(image)?;
    let (rows, cols) = view.dim();
    let half = (rows.min(cols) / 2).max(1);
    let (r0, c0) = ((rows - half.min(rows)) / 2, (cols - half.min(cols)) / 2);
    stats(view.slice(s![r0..r0 + half.min(rows), c0..c0 + half.min(cols)]).iter())
}

/// The rightmost `width` columns, the postscan region of the CCD instruments.
fn postscan(image: &ImageHdu, width: usize) -> Option<Stats> {
    let view = view(image)?;
    let cols = view.ncols();
    if width == 0 || width >= cols {
        return None;
    }
    stats(view.slice(s![.., cols - width..]).iter())
}

fn round(x: f64) -> f64 {
    (x * 1e3).round() / 1e3
}

fn set_stats(header: &mut Header, keys: [&str; 3], what: &str, stats: Option<Stats>) {
    let values = [
        stats.map(|s| s.mean),
        stats.map(|s| s.median),
        stats.map(|s| s.std),
    ];
    for ((key, value), name) in keys.into_iter().zip(values).zip(["mean", "median", "std dev"]) {
        header.set_f64_or_null(key, value.map(round), &format!("KOA: {what} {name}"));
    }
}

/// Image statistics. A single image gets IMAGE*/PSCAN* keywords; each image
/// extension of a mosaic gets IMnn*/PTnn*.
pub(crate) fn set_image_stats(header: &mut Header, images: &[ImageHdu]) {
    let postpix = header
        .get_i64("POSTPIX")
        .filter(|&p| p > 0)
        .map(|p| p as usize);
    let postscan_stats = |image: &ImageHdu| postpix.and_then(|p| postscan(image, p));

    match images {
        [] => {
            set_stats(header, ["IMAGEMN", "IMAGEMD", "IMAGESD"], "Image data", None);
            set_stats(header, ["PSCANMN", "PSCANMD", "PSCANSD"], "Postscan", None);
        }
        [image] => {
            set_stats(header, ["IMAGEMN", "IMAGEMD", "IMAGESD"], "Image data", central_box(image));
            set_stats(header, ["PSCANMN", "PSCANMD", "PSCANSD"], "Postscan", postscan_stats(image));
        }
        images => {
            for (i, image) in images.iter().enumerate() {
                let nn = format!("{:02}", i + 1);
                let im = [format!("IM{nn}MN"), format!("IM{nn}MD"), format!("IM{nn}SD")];
                let pt = [format!("PT{nn}MN"), format!("PT{nn}MD"), format!("PT{nn}SD")];
                set_stats(
                    header,
                    [im[0].as_str(), im[1].as_str(), im[2].as_str()],
                    &format!("Image {nn} data"),
                    central_box(image),
                );
                set_stats(
                    header,
                    [pt[0].as_str(), pt[1].as_str(), pt[2].as_str()],
                    &format!("Image {nn} postscan"),
                    postscan_stats(image),
                );
            }
        }
    }
}

/// Pixels at or above the threshold, over every image.
pub(crate) fn count_saturated(images: &[ImageHdu], threshold: f64) -> usize {
    images
        .iter()
        .flat_map(|image| image.data.iter())
        .filter(|&&p| p as f64 >= threshold)
        .count()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn image(num_rows: usize, num_cols: usize, f: impl Fn(usize, usize) -> f32) -> ImageHdu {
        let data = (0..num_rows)
            .flat_map(|r| (0..num_cols).map(move |c| (r, c)))
            .map(|(r, c)| f(r, c))
            .collect();
        ImageHdu {
            hdu_num: 0,
            num_rows,
            num_cols,
            data,
        }
    }

    #[test]
    fn test_stats() {
        let s = stats(&[1.0, 2.0, 3.0, 4.0, f32::NAN]).unwrap();
        assert_abs_diff_eq!(s.mean, 2.5);
        assert_abs_diff_eq!(s.median, 2.5);
        assert_abs_diff_eq!(s.std, 1.25f64.sqrt());
        assert!(stats(&[f32::NAN]).is_none());
    }

    #[test]
    fn test_central_box_and_postscan() {
        // A 10x10 image, 100 in the middle 5x5 box, 7 in the rightmost two
        // columns, 1 elsewhere.
        let img = image(10, 10, |r, c| {
            if c >= 8 {
                7.0
            } else if (2..7).contains(&r) && (2..7).contains(&c) {
                100.0
            } else {
                1.0
            }
        });
        let mut header: Header = [("POSTPIX", 2i64)].into_iter().collect();
        set_image_stats(&mut header, &[img]);
        assert_eq!(header.get_f64("IMAGEMN"), Some(100.0));
        assert_eq!(header.get_f64("IMAGESD"), Some(0.0));
        assert_eq!(header.get_f64("PSCANMD"), Some(7.0));
    }

    #[test]
    fn test_mosaic_keywords() {
        let images = [image(4, 4, |_, _| 2.0), image(4, 4, |_, _| 3.0)];
        let mut header = Header::new();
        set_image_stats(&mut header, &images);
        assert_eq!(header.get_f64("IM01MN"), Some(2.0));
        assert_eq!(header.get_f64("IM02MD"), Some(3.0));
        assert!(header.get("PT02SD").unwrap().is_null());
        assert!(!header.contains("IMAGEMN"));
    }

    #[test]
    fn test_count_saturated() {
        let images = [image(2, 2, |r, _| if r == 0 { 65535.0 } else { 10.0 })];
        assert_eq!(count_saturated(&images, 65535.0), 2);
        assert_eq!(count_saturated(&images, 5.0), 4);
    }
}
