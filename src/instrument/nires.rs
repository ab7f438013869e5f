// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! NIRES, the near-infrared echellette on Keck II, and its slit-viewing
//! imager.

use super::*;

pub(super) static NIRES: InstrumentDescriptor = InstrumentDescriptor {
    instr: Instrument::Nires,
    telnr: 2,
    end_time_secs: 19 * 3600,
    sdata_list: &["/s/sdata1500", "/s/sdata1501"],
    instrume_values: &["NIRES"],
    keyword_map: &[("UTC", &["UTC", "UT"]), ("OBSERVER", &["OBSERVER"])],
    keyword_skips: &["PSCANMN", "PSCANMD", "PSCANSD"],
    eng_observers: &["nireseng", "nires", "engineering", "eng"],
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

fn is_imager(header: &Header) -> bool {
    lower(header, "INSTR").contains("imag")
}

fn prefix(header: &Header) -> Option<&'static str> {
    let instr = lower(header, "INSTR");
    if instr.contains("imag") {
        Some("NI")
    } else if instr.contains("spec") {
        Some("NR")
    } else {
        None
    }
}

fn koaimtyp(header: &Header) -> ImageType {
    match lower(header, "OBSTYPE").as_str() {
        "bias" => ImageType::Bias,
        "dark" => ImageType::Dark,
        "domeflat" | "flat" => {
            if is_on(header, "FLIMAGIN") || is_on(header, "FLSPECTR") {
                ImageType::FlatLamp
            } else {
                ImageType::FlatLampOff
            }
        }
        "domearc" | "arc" => ImageType::ArcLamp,
        "object" | "standard" | "tellstd" => ImageType::Object,
        _ if is_tracking(header) => ImageType::Object,
        _ => ImageType::Undefined,
    }
}

const SPECTROGRAPH_RANGE: (f64, f64, f64) = (9400.0, 16950.0, 24500.0);
const IMAGER_RANGE: (f64, f64, f64) = (19500.0, 21500.0, 23500.0);

fn derive_wavelengths(header: &mut Header) -> Result<(), InstrumentError> {
    let waves = if is_imager(header) {
        IMAGER_RANGE
    } else {
        SPECTROGRAPH_RANGE
    };
    set_wavelengths(header, Some(waves));
    Ok(())
}

const SPECTROGRAPH_SLIT: SlitValues = SlitValues {
    length: 18.0,
    width: 0.55,
    spatscal: 0.123,
    dispscal: 0.123,
    specres: 2700.0,
};

const IMAGER_SCALE: f64 = 0.15;

fn derive_slit_values(header: &mut Header) -> Result<(), InstrumentError> {
    if is_imager(header) {
        set_slit_values(header, None);
        header.set("SPATSCAL", IMAGER_SCALE, "KOA: Pixel scale (arcsec/pixel)");
    } else {
        set_slit_values(header, Some(SPECTROGRAPH_SLIT));
    }
    Ok(())
}

fn derive_skypa(header: &mut Header) -> Result<(), InstrumentError> {
    let angle = header.get_f64("ROTPOSN");
    set_skypa(header, angle);
    Ok(())
}
