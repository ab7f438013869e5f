// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! DEIMOS, the multi-object spectrograph on Keck II.

use super::*;

pub(super) static DEIMOS: InstrumentDescriptor = InstrumentDescriptor {
    instr: Instrument::Deimos,
    telnr: 2,
    end_time_secs: 20 * 3600,
    sdata_list: &["/s/sdata1001", "/s/sdata1002", "/s/sdata1003"],
    instrume_values: &["DEIMOS"],
    keyword_map: &[("UTC", &["UTC", "UT"]), ("OBSERVER", &["OBSERVER"])],
    keyword_skips: &["PSCANMN", "PSCANMD", "PSCANSD", "SLITLEN", "SLITWIDT"],
    eng_observers: &["deimoseng", "deimos", "engineering", "eng"],
    linked_file_keyword: Some("FCSIMGFI"),
    fill_instrume: false,
    coadd_saturation: false,
    prefix,
    raw_fname: default_raw_fname,
    koaimtyp,
    checks: common_checks![
        Check::Derive("wavelengths", derive_wavelengths),
        Check::Derive("slit values", derive_slit_values),
        Check::Derive("SKYPA", derive_skypa),
    ],
};

/// Flexure-compensation (FCS) frames are written below an `fcs` directory.
fn prefix(header: &Header) -> Option<&'static str> {
    if lower(header, "OUTDIR").contains("/fcs") {
        Some("DF")
    } else {
        Some("DE")
    }
}

const ARC_LAMPS: [&str; 6] = ["ne", "ar", "kr", "xe", "cd", "zn"];

fn koaimtyp(header: &Header) -> ImageType {
    let obstype = lower(header, "OBSTYPE");
    let lamps = lower(header, "LAMPS");

    if obstype == "bias" || header.get_f64("EXPTIME") == Some(0.0) {
        return ImageType::Bias;
    }
    if obstype == "dark" {
        return ImageType::Dark;
    }
    if lamps.contains("qz") || lamps.contains("quartz") {
        return ImageType::FlatLamp;
    }
    if !lamps.is_empty()
        && lamps != "off"
        && lamps
            .split([' ', ','])
            .any(|lamp| ARC_LAMPS.contains(&lamp.trim()))
    {
        return ImageType::ArcLamp;
    }
    if lower(header, "HATCHPOS") == "closed" {
        return ImageType::Dark;
    }
    match obstype.as_str() {
        "dmflat" | "domeflat" => ImageType::DmFlat,
        "skyflat" => ImageType::FlatTbd,
        "focus" => ImageType::Focus,
        "object" | "" => ImageType::Object,
        _ => ImageType::Undefined,
    }
}

const FILTERS: &[(&str, f64, f64, f64)] = &[
    ("B", 3700.0, 4400.0, 5100.0),
    ("V", 4700.0, 5500.0, 6300.0),
    ("R", 5600.0, 6500.0, 7400.0),
    ("I", 7000.0, 8300.0, 9600.0),
    ("Z", 8300.0, 9000.0, 10500.0),
    ("GG400", 4000.0, 7250.0, 10500.0),
    ("GG455", 4550.0, 7500.0, 10500.0),
    ("GG495", 4950.0, 7700.0, 10500.0),
    ("OG550", 5500.0, 8000.0, 10500.0),
];

/// Grating name, coverage [Å] and dispersion [Å/pixel].
const GRATINGS: &[(&str, f64, f64)] = &[
    ("600ZD", 5300.0, 0.65),
    ("830G", 4000.0, 0.47),
    ("900ZD", 3800.0, 0.44),
    ("1200G", 2600.0, 0.33),
    ("1200B", 2600.0, 0.33),
];

const PIXEL_SCALE: f64 = 0.1185;

fn grating(header: &Header) -> Option<(f64, f64)> {
    let name = header.get_str("GRATENAM")?.to_uppercase();
    GRATINGS
        .iter()
        .find(|(n, _, _)| *n == name)
        .map(|(_, coverage, dispersion)| (*coverage, *dispersion))
}

/// The central wavelength of the grating in use; the tilt is recorded per
/// grating slider.
fn central_wavelength(header: &Header) -> Option<f64> {
    match header.get_i64("GRATEPOS")? {
        3 => header.get_f64("G3TLTWAV"),
        4 => header.get_f64("G4TLTWAV"),
        _ => None,
    }
}

fn derive_wavelengths(header: &mut Header) -> Result<(), InstrumentError> {
    let waves = if lower(header, "GRATENAM") == "mirror" {
        header
            .get_str("DWFILNAM")
            .and_then(|f| wave_table(&f, FILTERS))
    } else {
        match (grating(header), central_wavelength(header)) {
            (Some((coverage, _)), Some(centre)) => Some(centred(centre, coverage)),
            _ => None,
        }
    };
    set_wavelengths(header, waves);
    Ok(())
}

/// Only long-slit masks have a single slit to describe.
fn derive_slit_values(header: &mut Header) -> Result<(), InstrumentError> {
    let mask = header.get_str("SLMSKNAM").unwrap_or_default();
    let values = if mask.to_uppercase().starts_with("LVM") || mask.to_lowercase().starts_with("long")
    {
        let width = numbers_in(&mask).into_iter().next();
        match (width, grating(header), central_wavelength(header)) {
            (Some(width), Some((_, dispersion)), Some(centre)) => Some(SlitValues {
                length: 1200.0,
                width,
                spatscal: PIXEL_SCALE,
                dispscal: PIXEL_SCALE,
                specres: round10(centre / (width / PIXEL_SCALE * dispersion)),
            }),
            _ => None,
        }
    } else {
        None
    };
    set_slit_values(header, values);
    Ok(())
}

fn derive_skypa(header: &mut Header) -> Result<(), InstrumentError> {
    let angle = header.get_f64("ROTPOSN").map(|r| r + 90.0);
    set_skypa(header, angle);
    Ok(())
}
