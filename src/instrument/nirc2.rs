// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! NIRC2, the adaptive-optics near-infrared camera on Keck II.

use super::*;

pub(super) static NIRC2: InstrumentDescriptor = InstrumentDescriptor {
    instr: Instrument::Nirc2,
    telnr: 2,
    end_time_secs: 19 * 3600,
    sdata_list: &[
        "/s/sdata901",
        "/s/sdata902",
        "/s/sdata903",
        "/s/sdata904",
        "/s/sdata905",
    ],
    instrume_values: &["NIRC2"],
    keyword_map: &[
        ("UTC", &["UTC", "UT"]),
        ("OBSERVER", &["OBSERVER"]),
        ("FRAMENO", &["FILENUM", "FRAMENO"]),
    ],
    keyword_skips: &[
        "PSCANMN", "PSCANMD", "PSCANSD", "SLITLEN", "SLITWIDT", "DISPSCAL", "SPECRES",
    ],
    eng_observers: &["nirc2eng", "nirc2", "engineering", "eng", "ao staff"],
    linked_file_keyword: None,
    fill_instrume: true,
    coadd_saturation: true,
    prefix,
    raw_fname: default_raw_fname,
    koaimtyp,
    checks: common_checks![
        Check::Derive("wavelengths", derive_wavelengths),
        Check::Derive("pixel scale", derive_pixel_scale),
        Check::Derive("SKYPA", derive_skypa),
    ],
};

fn prefix(_: &Header) -> Option<&'static str> {
    Some("N2")
}

const ARC_LAMPS: [&str; 4] = ["ARGONPWR", "XENONPWR", "KRYPTONPWR", "NEONPWR"];
/// Dome flats are taken at this elevation [deg].
const DOME_FLAT_EL: f64 = 45.0;

fn koaimtyp(header: &Header) -> ImageType {
    if lower(header, "SHRNAME") == "closed" {
        return ImageType::Dark;
    }
    if ARC_LAMPS.iter().any(|lamp| is_on(header, lamp)) {
        return ImageType::ArcLamp;
    }
    if is_on(header, "FLIMAGIN") || is_on(header, "FLSPECTR") {
        return ImageType::FlatLamp;
    }
    if is_tracking(header) {
        return ImageType::Object;
    }
    match header.get_f64("EL") {
        Some(el) if (el - DOME_FLAT_EL).abs() < 0.5 => ImageType::FlatLampOff,
        _ => ImageType::TelTbd,
    }
}

const FILTERS: &[(&str, f64, f64, f64)] = &[
    ("J", 11600.0, 12500.0, 13400.0),
    ("H", 14900.0, 16300.0, 17800.0),
    ("K", 20000.0, 21900.0, 23800.0),
    ("Kp", 19500.0, 21200.0, 22900.0),
    ("Ks", 19900.0, 21500.0, 23000.0),
    ("Kcont", 22550.0, 22710.0, 22870.0),
    ("Lp", 34260.0, 37800.0, 41320.0),
    ("Ms", 45460.0, 46700.0, 47900.0),
    ("PAH", 32750.0, 32900.0, 33050.0),
    ("Brgamma", 21550.0, 21690.0, 21810.0),
    ("FeII", 16360.0, 16450.0, 16540.0),
    ("Hcont", 15630.0, 15800.0, 15980.0),
];

/// The filter wheels hold one science filter at a time; the other is open or
/// holds a pupil mask.
fn filter(header: &Header) -> Option<String> {
    ["FWINAME", "FWONAME"]
        .iter()
        .filter_map(|k| header.get_str(k))
        .find(|f| wave_table(f, FILTERS).is_some())
}

fn derive_wavelengths(header: &mut Header) -> Result<(), InstrumentError> {
    let waves = filter(header).and_then(|f| wave_table(&f, FILTERS));
    set_wavelengths(header, waves);
    Ok(())
}

/// Camera name to pixel scale [arcsec/pixel].
const CAMERAS: &[(&str, f64)] = &[
    ("narrow", 0.009942),
    ("medium", 0.019829),
    ("wide", 0.039686),
];

/// NIRC2 is an imager; only the spatial scale means anything.
fn derive_pixel_scale(header: &mut Header) -> Result<(), InstrumentError> {
    let camera = lower(header, "CAMNAME");
    let scale = CAMERAS
        .iter()
        .find(|(name, _)| *name == camera)
        .map(|(_, scale)| *scale);
    set_slit_values(header, None);
    header.set_f64_or_null("SPATSCAL", scale, "KOA: Pixel scale (arcsec/pixel)");
    Ok(())
}

/// In position-angle mode the rotator tracks the sky; SKYPA is the rotator
/// position less the instrument angle.
fn derive_skypa(header: &mut Header) -> Result<(), InstrumentError> {
    let angle = match (header.get_f64("ROTPOSN"), header.get_f64("INSTANGL")) {
        (Some(rotposn), Some(instangl)) => Some(rotposn - instangl),
        _ => None,
    };
    set_skypa(header, angle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_from_either_wheel() {
        let mut header: Header = [("FWINAME", "Kp"), ("FWONAME", "PK50_1.5")]
            .into_iter()
            .collect();
        derive_wavelengths(&mut header).unwrap();
        assert_eq!(header.get_f64("WAVECNTR"), Some(21200.0));

        let mut header: Header = [("FWINAME", "clear"), ("FWONAME", "H")]
            .into_iter()
            .collect();
        derive_wavelengths(&mut header).unwrap();
        assert_eq!(header.get_f64("WAVECNTR"), Some(16300.0));
    }

    #[test]
    fn test_pixel_scale_and_skypa() {
        let mut header: Header = [("CAMNAME", "narrow")].into_iter().collect();
        header.set("ROTPOSN", 10.0, "");
        header.set("INSTANGL", 20.0, "");
        derive_pixel_scale(&mut header).unwrap();
        derive_skypa(&mut header).unwrap();
        assert_eq!(header.get_f64("SPATSCAL"), Some(0.009942));
        assert!(header.get("SLITWIDT").unwrap().is_null());
        assert_eq!(header.get_f64("SKYPA"), Some(350.0));
    }

    #[test]
    fn test_koaimtyp() {
        let h = |pairs: &[(&str, &str)]| -> Header { pairs.iter().copied().collect() };
        assert_eq!(koaimtyp(&h(&[("SHRNAME", "closed")])), ImageType::Dark);
        assert_eq!(koaimtyp(&h(&[("AXESTAT", "tracking")])), ImageType::Object);
        assert_eq!(
            koaimtyp(&h(&[("AXESTAT", "in position"), ("EL", "45.0")])),
            ImageType::FlatLampOff
        );
        assert_eq!(
            koaimtyp(&h(&[("AXESTAT", "in position"), ("EL", "80.0")])),
            ImageType::TelTbd
        );
    }
}
