// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! KCWI, the integral-field spectrograph on Keck II. Frames come from three
//! cameras (blue, red, and the focal-plane camera), each with its own prefix.

use super::*;

pub(super) static KCWI: InstrumentDescriptor = InstrumentDescriptor {
    instr: Instrument::Kcwi,
    telnr: 2,
    end_time_secs: 20 * 3600,
    sdata_list: &["/s/sdata1400", "/s/sdata1401", "/s/sdata1402"],
    instrume_values: &["KCWI"],
    keyword_map: &[
        ("UTC", &["UTC", "UT"]),
        ("OBSERVER", &["OBSERVER"]),
        ("FRAMENO", &["FRAMENO"]),
    ],
    keyword_skips: &["PSCANMN", "PSCANMD", "PSCANSD"],
    eng_observers: &["kcwieng", "kcwi", "engineering", "eng"],
    linked_file_keyword: None,
    fill_instrume: false,
    coadd_saturation: false,
    prefix,
    raw_fname,
    koaimtyp,
    checks: common_checks![
        Check::Derive("wavelengths", derive_wavelengths),
        Check::Derive("slit values", derive_slit_values),
        Check::Derive("SKYPA", derive_skypa),
    ],
};

fn prefix(header: &Header) -> Option<&'static str> {
    match lower(header, "CAMERA").as_str() {
        "blue" => Some("KB"),
        "red" => Some("KR"),
        "fpc" => Some("KF"),
        _ => None,
    }
}

/// KCWI records its own file name.
fn raw_fname(header: &Header) -> Option<String> {
    header.get_str("OFNAME")
}

fn koaimtyp(header: &Header) -> ImageType {
    match lower(header, "IMTYPE").as_str() {
        "bias" => ImageType::Bias,
        "dark" => ImageType::Dark,
        "arclamp" => ImageType::ArcLamp,
        "flatlamp" => ImageType::FlatLamp,
        "contbars" => ImageType::Calib,
        "domeflat" => ImageType::DmFlat,
        "twiflat" => ImageType::FlatTbd,
        "focus" => ImageType::Focus,
        "object" => ImageType::Object,
        _ => ImageType::Undefined,
    }
}

/// Grating name and bandwidth [Å].
const BLUE_GRATINGS: &[(&str, f64)] = &[
    ("BL", 1700.0),
    ("BM", 860.0),
    ("BH1", 400.0),
    ("BH2", 400.0),
    ("BH3", 400.0),
];

const RED_GRATINGS: &[(&str, f64)] = &[
    ("RL", 2000.0),
    ("RM1", 1000.0),
    ("RM2", 1000.0),
    ("RH1", 480.0),
    ("RH2", 480.0),
    ("RH3", 480.0),
    ("RH4", 480.0),
];

/// (grating keyword, central wavelength keyword, table) for a camera.
fn camera_keys(header: &Header) -> Option<(&'static str, &'static str, &'static [(&'static str, f64)])> {
    match lower(header, "CAMERA").as_str() {
        "blue" => Some(("BGRATNAM", "BCWAVE", BLUE_GRATINGS)),
        "red" => Some(("RGRATNAM", "RCWAVE", RED_GRATINGS)),
        _ => None,
    }
}

fn grating_bandwidth(header: &Header) -> Option<(String, f64)> {
    let (grat_key, _, table) = camera_keys(header)?;
    let name = header.get_str(grat_key)?.to_uppercase();
    table
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, bw)| (name, *bw))
}

fn derive_wavelengths(header: &mut Header) -> Result<(), InstrumentError> {
    let waves = camera_keys(header).and_then(|(_, cwave_key, _)| {
        let (_, bandwidth) = grating_bandwidth(header)?;
        let centre = header.get_f64(cwave_key)?;
        Some(centred(centre, bandwidth))
    });
    set_wavelengths(header, waves);
    Ok(())
}

/// Slicer name, slice width and slice length [arcsec].
const SLICERS: &[(&str, f64, f64)] = &[
    ("LARGE", 1.35, 33.0),
    ("MEDIUM", 0.69, 16.5),
    ("SMALL", 0.35, 8.25),
];

const PIXEL_SCALE: f64 = 0.147;

/// Resolving power with the large slicer; it doubles with each smaller slicer.
fn base_resolution(grating: &str) -> f64 {
    match grating.chars().nth(1) {
        Some('L') => 900.0,
        Some('M') => 2000.0,
        _ => 4500.0,
    }
}

fn derive_slit_values(header: &mut Header) -> Result<(), InstrumentError> {
    let slicer = header.get_str("IFUNAM").map(|s| s.to_uppercase());
    let values = match (
        slicer.and_then(|s| SLICERS.iter().position(|(n, _, _)| *n == s)),
        grating_bandwidth(header),
    ) {
        (Some(i_slicer), Some((grating, _))) => {
            let (_, width, length) = SLICERS[i_slicer];
            Some(SlitValues {
                length,
                width,
                spatscal: PIXEL_SCALE,
                dispscal: width,
                specres: base_resolution(&grating) * 2f64.powi(i_slicer as i32),
            })
        }
        _ => None,
    };
    set_slit_values(header, values);
    Ok(())
}

fn derive_skypa(header: &mut Header) -> Result<(), InstrumentError> {
    let angle = header.get_f64("ROTPOSN");
    set_skypa(header, angle);
    Ok(())
}
