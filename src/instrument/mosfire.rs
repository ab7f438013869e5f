// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! MOSFIRE, the near-infrared multi-object spectrograph on Keck I.

use super::*;

pub(super) static MOSFIRE: InstrumentDescriptor = InstrumentDescriptor {
    instr: Instrument::Mosfire,
    telnr: 1,
    end_time_secs: 19 * 3600,
    sdata_list: &["/s/sdata1300", "/s/sdata1301", "/s/sdata1302"],
    instrume_values: &["MOSFIRE"],
    keyword_map: &[("UTC", &["UTC", "UT"]), ("OBSERVER", &["OBSERVER"])],
    keyword_skips: &["PSCANMN", "PSCANMD", "PSCANSD", "SLITLEN", "SLITWIDT"],
    eng_observers: &["mosfireeng", "mosfire", "moseng", "engineering", "eng"],
    linked_file_keyword: None,
    fill_instrume: false,
    coadd_saturation: false,
    prefix,
    raw_fname: datafile_raw_fname,
    koaimtyp,
    checks: common_checks![
        Check::Derive("wavelengths", derive_wavelengths),
        Check::Derive("slit values", derive_slit_values),
        Check::Derive("SKYPA", derive_skypa),
    ],
};

fn prefix(_: &Header) -> Option<&'static str> {
    Some("MF")
}

fn koaimtyp(header: &Header) -> ImageType {
    if lower(header, "FILTER") == "dark" || lower(header, "MASKNAME").contains("dark") {
        return ImageType::Dark;
    }
    // Neon and argon arc lamp power.
    if is_on(header, "PWSTATA7") || is_on(header, "PWSTATA8") {
        return ImageType::ArcLamp;
    }
    if is_on(header, "FLATSPEC") || is_on(header, "FLIMAGIN") || is_on(header, "FLSPECTR") {
        return ImageType::FlatLamp;
    }
    if lower(header, "OBJECT").contains("flat") && !is_tracking(header) {
        return ImageType::FlatLampOff;
    }
    ImageType::Object
}

const FILTERS: &[(&str, f64, f64, f64)] = &[
    ("Y", 9716.0, 10850.0, 11250.0),
    ("J", 11530.0, 12520.0, 13520.0),
    ("H", 14680.0, 16325.0, 18040.0),
    ("K", 19540.0, 21705.0, 23970.0),
    ("Ks", 19900.0, 21450.0, 23110.0),
    ("J2", 11810.0, 12120.0, 12420.0),
    ("J3", 12250.0, 12540.0, 12830.0),
    ("H1", 14640.0, 15220.0, 15780.0),
    ("H2", 15780.0, 16340.0, 16880.0),
];

fn derive_wavelengths(header: &mut Header) -> Result<(), InstrumentError> {
    let waves = header
        .get_str("FILTER")
        .and_then(|f| wave_table(&f, FILTERS));
    set_wavelengths(header, waves);
    Ok(())
}

const PIXEL_SCALE: f64 = 0.1798;
/// Length of a single configurable slit [arcsec].
const BAR_LENGTH: f64 = 7.01;
/// Slit width × resolving power.
const RESOLUTION_PRODUCT: f64 = 2450.0;

/// Long-slit masks are named like "LONGSLIT-46x0.7": a number of bars and the
/// slit width.
fn derive_slit_values(header: &mut Header) -> Result<(), InstrumentError> {
    let mask = header.get_str("MASKNAME").unwrap_or_default();
    let values = if mask.to_uppercase().starts_with("LONGSLIT") {
        match numbers_in(&mask).as_slice() {
            [bars, width] if *width > 0.0 => Some(SlitValues {
                length: (bars * BAR_LENGTH * 100.0).round() / 100.0,
                width: *width,
                spatscal: PIXEL_SCALE,
                dispscal: PIXEL_SCALE,
                specres: round10(RESOLUTION_PRODUCT / width),
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
    let angle = header.get_f64("ROTPOSN");
    set_skypa(header, angle);
    Ok(())
}
