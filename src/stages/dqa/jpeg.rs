// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Greyscale JPEG previews of archived frames.

use std::path::{Path, PathBuf};

#[cfg(not(feature = "plotting"))]
use log::trace;
#[cfg(feature = "plotting")]
use log::warn;

use crate::{
    constants::{ZSCALE_CONTRAST, ZSCALE_SAMPLES},
    io::fits::ImageHdu,
};

/// Display limits by the IRAF "zscale" method: fit a line to the sorted
/// sample values, reject outliers once, and scale the slope by the contrast
/// about the median.
#[cfg_attr(not(feature = "plotting"), allow(dead_code))]
pub(crate) fn zscale(data: &[f32]) -> Option<(f64, f64)> {
    let stride = (data.len() / ZSCALE_SAMPLES).max(1);
    let mut samples: Vec<f64> = data
        .iter()
        .step_by(stride)
        .filter(|x| x.is_finite())
        .map(|&x| x as f64)
        .collect();
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f64::total_cmp);
    let (min, max) = (samples[0], samples[samples.len() - 1]);
    let n = samples.len();
    let median = samples[n / 2];
    if n < 5 {
        return Some((min, max));
    }

    let fit = |points: &[(f64, f64)]| -> Option<(f64, f64)> {
        let m = points.len() as f64;
        let sx: f64 = points.iter().map(|p| p.0).sum();
        let sy: f64 = points.iter().map(|p| p.1).sum();
        let sxx: f64 = points.iter().map(|p| p.0 * p.0).sum();
        let sxy: f64 = points.iter().map(|p| p.0 * p.1).sum();
        let denom = m * sxx - sx * sx;
        if denom == 0.0 {
            return None;
        }
        let slope = (m * sxy - sx * sy) / denom;
        Some((slope, (sy - slope * sx) / m))
    };

    let points: Vec<(f64, f64)> = samples.iter().enumerate().map(|(i, &y)| (i as f64, y)).collect();
    let (slope, intercept) = fit(&points)?;
    let residuals: Vec<f64> = points.iter().map(|(x, y)| y - (slope * x + intercept)).collect();
    let sigma = (residuals.iter().map(|r| r * r).sum::<f64>() / n as f64).sqrt();
    let kept: Vec<(f64, f64)> = points
        .iter()
        .zip(&residuals)
        .filter(|(_, r)| r.abs() <= 2.5 * sigma)
        .map(|(p, _)| *p)
        .collect();
    let slope = if kept.len() >= n / 2 {
        fit(&kept).map(|f| f.0).unwrap_or(slope)
    } else {
        slope
    } / ZSCALE_CONTRAST;

    let centre = (n / 2) as f64;
    let z1 = (median - centre * slope).max(min);
    let z2 = (median + (n as f64 - 1.0 - centre) * slope).min(max);
    Some(if z1 < z2 { (z1, z2) } else { (min, max) })
}

/// File names of the previews of a frame: `<stem>.jpg` for a single image,
/// `<stem>_<n>.jpg` for each image of a mosaic.
pub(crate) fn preview_paths(lev0: &Path, stem: &str, num_images: usize) -> Vec<PathBuf> {
    match num_images {
        0 => vec![],
        1 => vec![lev0.join(format!("{stem}.jpg"))],
        n => (1..=n).map(|i| lev0.join(format!("{stem}_{i}.jpg"))).collect(),
    }
}

#[cfg(feature = "plotting")]
fn render(image: &ImageHdu, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    use plotters::prelude::*;

    use crate::constants::JPEG_MAX_PIXELS;

    let Some((z1, z2)) = zscale(&image.data) else {
        return Err("no finite pixels".into());
    };
    let step = (image.num_rows.max(image.num_cols) + JPEG_MAX_PIXELS - 1) / JPEG_MAX_PIXELS;
    let (width, height) = (image.num_cols / step, image.num_rows / step);
    if width == 0 || height == 0 {
        return Err(format!("a {}x{} image is too thin to draw", image.num_rows, image.num_cols).into());
    }
    let root = BitMapBackend::new(path, (width as u32, height as u32)).into_drawing_area();
    for y in 0..height {
        // FITS rows run bottom to top.
        let row = (height - 1 - y) * step;
        for x in 0..width {
            let value = image.data[row * image.num_cols + x * step] as f64;
            let grey = if value.is_finite() {
                (((value - z1) / (z2 - z1)).clamp(0.0, 1.0) * 255.0) as u8
            } else {
                0
            };
            root.draw_pixel((x as i32, y as i32), &RGBColor(grey, grey, grey))?;
        }
    }
    root.present()?;
    Ok(())
}

/// Render every image of a frame. Previews are a convenience; failures are
/// logged and the frame is archived regardless.
pub(crate) fn write_previews(images: &[ImageHdu], lev0: &Path, stem: &str) -> Vec<PathBuf> {
    let paths = preview_paths(lev0, stem, images.len());

    #[cfg(feature = "plotting")]
    {
        images
            .iter()
            .zip(paths)
            .filter_map(|(image, path)| match render(image, &path) {
                Ok(()) => Some(path),
                Err(e) => {
                    warn!("Couldn't write the preview {}: {e}", path.display());
                    None
                }
            })
            .collect()
    }

    #[cfg(not(feature = "plotting"))]
    {
        trace!(
            "Not compiled with the \"plotting\" feature; skipping {} previews",
            paths.len()
        );
        vec![]
    }
}
