// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! ESI, the echellette spectrograph and imager on Keck II.

use super::*;

pub(super) static ESI: InstrumentDescriptor = InstrumentDescriptor {
    instr: Instrument::Esi,
    telnr: 2,
    end_time_secs: 20 * 3600,
    sdata_list: &["/s/sdata700", "/s/sdata701", "/s/sdata702"],
    instrume_values: &["ESI"],
    keyword_map: &[("UTC", &["UTC", "UT"]), ("OBSERVER", &["OBSERVER"])],
    keyword_skips: &["PSCANMN", "PSCANMD", "PSCANSD"],
    eng_observers: &["esieng", "esi", "engineering", "eng", "staff"],
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

fn prefix(_: &Header) -> Option<&'static str> {
    Some("ES")
}

const ARC_LAMPS: [&str; 6] = ["LAMPAR1", "LAMPCU1", "LAMPNE1", "LAMPNE2", "LAMPXE1", "LAMPHG1"];

fn koaimtyp(header: &Header) -> ImageType {
    let obstype = lower(header, "OBSTYPE");
    if obstype == "bias" || header.get_f64("EXPTIME") == Some(0.0) {
        return ImageType::Bias;
    }
    if obstype == "dark" {
        return ImageType::Dark;
    }
    if is_on(header, "LAMPQTZ1") {
        // The multi-pinhole mask traces the orders.
        if lower(header, "SLMSKNAM").contains("multiholes") {
            return ImageType::Trace;
        }
        return ImageType::FlatLamp;
    }
    if ARC_LAMPS.iter().any(|lamp| is_on(header, lamp)) {
        return ImageType::ArcLamp;
    }
    if lower(header, "HATCHPOS") == "closed" {
        return ImageType::Dark;
    }
    match obstype.as_str() {
        "domeflat" | "dmflat" => ImageType::DmFlat,
        "object" | "" => ImageType::Object,
        _ => ImageType::Undefined,
    }
}

fn is_spectroscopy(header: &Header) -> bool {
    lower(header, "PRISMNAM") == "in"
}

const FILTERS: &[(&str, f64, f64, f64)] = &[
    ("B", 3800.0, 4400.0, 5000.0),
    ("V", 4900.0, 5450.0, 6000.0),
    ("R", 5800.0, 6500.0, 7200.0),
    ("I", 7200.0, 8300.0, 9400.0),
];

const SPECTROSCOPY_RANGE: (f64, f64, f64) = (3900.0, 7400.0, 10900.0);

fn derive_wavelengths(header: &mut Header) -> Result<(), InstrumentError> {
    let waves = if is_spectroscopy(header) {
        Some(SPECTROSCOPY_RANGE)
    } else {
        header
            .get_str("IMFLTNAM")
            .and_then(|f| wave_table(&f, FILTERS))
    };
    set_wavelengths(header, waves);
    Ok(())
}

const PIXEL_SCALE: f64 = 0.1542;
const SLIT_LENGTH: f64 = 20.0;
/// Slit width × resolving power in echellette mode.
const RESOLUTION_PRODUCT: f64 = 4000.0;

fn derive_slit_values(header: &mut Header) -> Result<(), InstrumentError> {
    let values = if is_spectroscopy(header) {
        header
            .get_str("SLMSKNAM")
            .and_then(|mask| numbers_in(&mask).into_iter().next())
            .filter(|width| *width > 0.0)
            .map(|width| SlitValues {
                length: SLIT_LENGTH,
                width,
                spatscal: PIXEL_SCALE,
                dispscal: PIXEL_SCALE,
                specres: round10(RESOLUTION_PRODUCT / width),
            })
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes() {
        let mut spec: Header = [("PRISMNAM", "in"), ("SLMSKNAM", "0.75_arcsec")]
            .into_iter()
            .collect();
        derive_wavelengths(&mut spec).unwrap();
        derive_slit_values(&mut spec).unwrap();
        assert_eq!(spec.get_f64("WAVECNTR"), Some(7400.0));
        assert_eq!(spec.get_f64("SLITWIDT"), Some(0.75));
        assert_eq!(spec.get_f64("SPECRES"), Some(5330.0));

        let mut imaging: Header = [("PRISMNAM", "out"), ("IMFLTNAM", "R")]
            .into_iter()
            .collect();
        derive_wavelengths(&mut imaging).unwrap();
        derive_slit_values(&mut imaging).unwrap();
        assert_eq!(imaging.get_f64("WAVEBLUE"), Some(5800.0));
        assert!(imaging.get("SLITWIDT").unwrap().is_null());
    }

    #[test]
    fn test_koaimtyp() {
        let h = |pairs: &[(&str, &str)]| -> Header { pairs.iter().copied().collect() };
        assert_eq!(koaimtyp(&h(&[("LAMPQTZ1", "on")])), ImageType::FlatLamp);
        assert_eq!(
            koaimtyp(&h(&[("LAMPQTZ1", "on"), ("SLMSKNAM", "MultiHoles")])),
            ImageType::Trace
        );
        assert_eq!(koaimtyp(&h(&[("LAMPCU1", "on")])), ImageType::ArcLamp);
        assert_eq!(koaimtyp(&h(&[("OBSTYPE", "Object")])), ImageType::Object);
    }
}
