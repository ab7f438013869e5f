// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! NIRSPEC, the near-infrared echelle on Keck II (NIRSPAO behind the AO
//! system). The spectrograph and its slit-viewing camera write to separate
//! directories.

use super::*;

pub(super) static NIRSPEC: InstrumentDescriptor = InstrumentDescriptor {
    instr: Instrument::Nirspec,
    telnr: 2,
    end_time_secs: 19 * 3600,
    sdata_list: &["/s/sdata600", "/s/sdata601", "/s/sdata602"],
    instrume_values: &["NIRSPEC", "NIRSPAO"],
    keyword_map: &[("UTC", &["UTC", "UT"]), ("OBSERVER", &["OBSERVER"])],
    keyword_skips: &["PSCANMN", "PSCANMD", "PSCANSD"],
    eng_observers: &["nirspeceng", "nirspec", "engineering", "eng", "ao staff"],
    linked_file_keyword: None,
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

fn prefix(header: &Header) -> Option<&'static str> {
    let outdir = lower(header, "OUTDIR");
    if outdir.contains("/scam") {
        Some("NC")
    } else if outdir.contains("/spec") {
        Some("NS")
    } else {
        None
    }
}

const ARC_LAMPS: [&str; 4] = ["NEON", "ARGON", "KRYPTON", "XENON"];

fn koaimtyp(header: &Header) -> ImageType {
    if ARC_LAMPS.iter().any(|lamp| is_on(header, lamp)) {
        return ImageType::ArcLamp;
    }
    if is_on(header, "ETALON") {
        return ImageType::Calib;
    }
    if is_on(header, "FLAT") || is_on(header, "FLIMAGIN") || is_on(header, "FLSPECTR") {
        return ImageType::FlatLamp;
    }
    if lower(header, "CALMPOS") == "in" {
        return ImageType::FlatLampOff;
    }
    if lower(header, "IMTYPE") == "dark" || lower(header, "OBSTYPE") == "dark" {
        return ImageType::Dark;
    }
    if is_tracking(header) {
        ImageType::Object
    } else {
        ImageType::TelTbd
    }
}

const FILTERS: &[(&str, f64, f64, f64)] = &[
    ("NIRSPEC-1", 9470.0, 10340.0, 11210.0),
    ("NIRSPEC-2", 10890.0, 11910.0, 12930.0),
    ("NIRSPEC-3", 11430.0, 12590.0, 13750.0),
    ("NIRSPEC-4", 12410.0, 13470.0, 14530.0),
    ("NIRSPEC-5", 14310.0, 15950.0, 17590.0),
    ("NIRSPEC-6", 15580.0, 19370.0, 23150.0),
    ("NIRSPEC-7", 18390.0, 22340.0, 26290.0),
    ("K-AO", 19500.0, 21500.0, 23500.0),
    ("Kp", 19500.0, 21200.0, 22900.0),
    ("H", 14900.0, 16300.0, 17800.0),
    ("J", 11600.0, 12500.0, 13400.0),
];

fn derive_wavelengths(header: &mut Header) -> Result<(), InstrumentError> {
    let waves = ["FILNAME", "SCIFILT"]
        .iter()
        .filter_map(|k| header.get_str(k))
        .find_map(|f| wave_table(&f, FILTERS));
    set_wavelengths(header, waves);
    Ok(())
}

const SPEC_SCALE: f64 = 0.144;
const SCAM_SCALE: f64 = 0.0934;
/// Slit width × resolving power, in echelle and low-dispersion modes.
const ECHELLE_RESOLUTION_PRODUCT: f64 = 10800.0;
const LOW_RESOLUTION_PRODUCT: f64 = 940.0;

/// Slit names are "<width>x<length>" in arcsec.
fn derive_slit_values(header: &mut Header) -> Result<(), InstrumentError> {
    if NIRSPEC.prefix(header) == Some("NC") {
        set_slit_values(header, None);
        header.set("SPATSCAL", SCAM_SCALE, "KOA: Pixel scale (arcsec/pixel)");
        return Ok(());
    }
    let slit = header.get_str("SLITNAME").unwrap_or_default();
    let low_dispersion = lower(header, "ECHLPOS") == "out" || lower(header, "DISPERS") == "low";
    let product = if low_dispersion {
        LOW_RESOLUTION_PRODUCT
    } else {
        ECHELLE_RESOLUTION_PRODUCT
    };
    let values = match numbers_in(&slit).as_slice() {
        [width, length] if *width > 0.0 => Some(SlitValues {
            length: *length,
            width: *width,
            spatscal: SPEC_SCALE,
            dispscal: SPEC_SCALE,
            specres: round10(product / width),
        }),
        _ => None,
    };
    set_slit_values(header, values);
    Ok(())
}

fn derive_skypa(header: &mut Header) -> Result<(), InstrumentError> {
    let angle = header.get_f64("ROTDEST").or_else(|| header.get_f64("ROTPOSN"));
    set_skypa(header, angle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_from_outdir() {
        let h = |outdir: &str| -> Header { [("OUTDIR", outdir)].into_iter().collect() };
        assert_eq!(prefix(&h("/s/sdata600/nspec1/2017jul06/scam")), Some("NC"));
        assert_eq!(prefix(&h("/s/sdata600/nspec1/2017jul06/spec")), Some("NS"));
        assert_eq!(prefix(&h("/s/sdata600/nspec1/2017jul06")), None);
    }

    #[test]
    fn test_slit() {
        let mut header: Header = [
            ("OUTDIR", "/s/sdata600/nspec1/2017jul06/spec"),
            ("SLITNAME", "0.432x24"),
        ]
        .into_iter()
        .collect();
        derive_slit_values(&mut header).unwrap();
        assert_eq!(header.get_f64("SLITWIDT"), Some(0.432));
        assert_eq!(header.get_f64("SLITLEN"), Some(24.0));
        assert_eq!(header.get_f64("SPECRES"), Some(25000.0));
    }
}
