// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! OSIRIS, the adaptive-optics integral-field spectrograph on Keck I, and its
//! parallel imager.

use super::*;

pub(super) static OSIRIS: InstrumentDescriptor = InstrumentDescriptor {
    instr: Instrument::Osiris,
    telnr: 1,
    end_time_secs: 19 * 3600,
    sdata_list: &["/s/sdata1100", "/s/sdata1101", "/s/sdata1102"],
    instrume_values: &["OSIRIS"],
    keyword_map: &[("UTC", &["UTC", "UT"]), ("OBSERVER", &["OBSERVER"])],
    keyword_skips: &["PSCANMN", "PSCANMD", "PSCANSD"],
    eng_observers: &["osiriseng", "osiris", "engineering", "eng", "ao staff"],
    linked_file_keyword: None,
    fill_instrume: false,
    coadd_saturation: false,
    prefix,
    raw_fname,
    koaimtyp,
    checks: common_checks![
        Check::Derive("wavelengths", derive_wavelengths),
        Check::Derive("pixel scale", derive_pixel_scale),
        Check::Derive("SKYPA", derive_skypa),
        Check::Derive("imaging WCS", derive_wcs),
    ],
};

fn is_imager(header: &Header) -> bool {
    lower(header, "INSTR").contains("imag")
}

fn prefix(header: &Header) -> Option<&'static str> {
    match lower(header, "INSTR").as_str() {
        "imag" => Some("OI"),
        "spec" => Some("OS"),
        _ => None,
    }
}

/// Imager files are written without an extension; spectrograph files already
/// carry one.
fn raw_fname(header: &Header) -> Option<String> {
    let datafile = header.get_str("DATAFILE")?;
    if datafile.starts_with('i') && !datafile.ends_with(".fits") {
        Some(format!("{datafile}.fits"))
    } else {
        Some(datafile)
    }
}

fn filter(header: &Header) -> String {
    let key = if is_imager(header) { "IFILTER" } else { "SFILTER" };
    header.get_str(key).unwrap_or_default()
}

fn koaimtyp(header: &Header) -> ImageType {
    if filter(header).to_lowercase().contains("drk") {
        return ImageType::Dark;
    }
    if is_tracking(header) {
        return ImageType::Object;
    }
    if is_on(header, "FLIMAGIN") || is_on(header, "FLSPECTR") {
        return ImageType::FlatLamp;
    }
    if ["ARGONPWR", "KRYPTONPWR", "NEONPWR", "XENONPWR"]
        .iter()
        .any(|k| is_on(header, k))
    {
        return ImageType::ArcLamp;
    }
    ImageType::Undefined
}

const FILTERS: &[(&str, f64, f64, f64)] = &[
    ("Zbb", 9990.0, 10900.0, 11760.0),
    ("Jbb", 11800.0, 13100.0, 14160.0),
    ("Hbb", 14730.0, 16380.0, 18030.0),
    ("Kbb", 19650.0, 21810.0, 23810.0),
    ("Kcb", 19650.0, 21810.0, 23810.0),
    ("Zn4", 10810.0, 11100.0, 11400.0),
    ("Jn1", 11740.0, 12060.0, 12320.0),
    ("Jn2", 12280.0, 12580.0, 12890.0),
    ("Jn3", 12750.0, 13060.0, 13380.0),
    ("Jn4", 13200.0, 13520.0, 13850.0),
    ("Hn1", 15000.0, 15370.0, 15750.0),
    ("Hn2", 15600.0, 15990.0, 16380.0),
    ("Hn3", 16090.0, 16490.0, 16890.0),
    ("Hn4", 16520.0, 16930.0, 17370.0),
    ("Hn5", 17080.0, 17530.0, 17960.0),
    ("Kn1", 19550.0, 20080.0, 20600.0),
    ("Kn2", 20360.0, 20900.0, 21420.0),
    ("Kn3", 21210.0, 21760.0, 22290.0),
    ("Kn4", 22080.0, 22670.0, 23220.0),
    ("Kn5", 22920.0, 23530.0, 24120.0),
    ("Kp", 19500.0, 21200.0, 22900.0),
    ("Kcont", 22550.0, 22710.0, 22870.0),
    ("Brgamma", 21550.0, 21690.0, 21810.0),
];

/// Filter names carry a suffix after a hyphen ("Kbb-...") on some nights.
fn derive_wavelengths(header: &mut Header) -> Result<(), InstrumentError> {
    let filter = filter(header);
    let name = filter.split('-').next().unwrap_or_default();
    set_wavelengths(header, wave_table(name, FILTERS));
    Ok(())
}

const IMAGER_SCALE: f64 = 0.02;

/// Spectrograph lenslet scales [arcsec] as written in SSCALE.
const LENSLET_SCALES: [f64; 4] = [0.02, 0.035, 0.05, 0.1];

fn derive_pixel_scale(header: &mut Header) -> Result<(), InstrumentError> {
    let scale = if is_imager(header) {
        Some(IMAGER_SCALE)
    } else {
        header
            .get_f64("SSCALE")
            .filter(|s| LENSLET_SCALES.iter().any(|l| (l - s).abs() < 1e-6))
    };
    set_slit_values(header, None);
    header.set_f64_or_null("SPATSCAL", scale, "KOA: Pixel scale (arcsec/pixel)");
    Ok(())
}

fn derive_skypa(header: &mut Header) -> Result<(), InstrumentError> {
    let angle = match (header.get_f64("ROTPOSN"), header.get_f64("INSTANGL")) {
        (Some(rotposn), Some(instangl)) => Some(rotposn - instangl),
        _ => None,
    };
    set_skypa(header, angle);
    Ok(())
}

/// Reference pixel of the imager: the centre of its 2048x2048 detector.
const CRPIX: f64 = 1024.5;

/// Pointing origins and their offsets from the imager centre [arcsec].
const POINTING_ORIGINS: &[(&str, f64, f64)] = &[
    ("OSIMG", 0.0, 0.0),
    ("OSIMGC", 0.0, 0.0),
    ("OSIMG_FLD", 0.0, 0.0),
    ("OSIMG_SPEC", 19.4, 0.0),
    ("OSIMGSPEC", 19.4, 0.0),
    ("REF", 0.0, 0.0),
];

/// Imaging frames taken in position-angle mode get a tangent-plane WCS.
fn derive_wcs(header: &mut Header) -> Result<(), InstrumentError> {
    if !is_imager(header) || !lower(header, "ROTMODE").contains("position") {
        return Ok(());
    }
    let (Some(ra), Some(dec), Some(pa)) = (
        header.get_f64("RA"),
        header.get_f64("DEC"),
        header.get_f64("ROTPOSN"),
    ) else {
        return Ok(());
    };
    let poname = header.get_str("PONAME").unwrap_or_default().to_uppercase();
    let (dx, dy) = POINTING_ORIGINS
        .iter()
        .find(|(name, _, _)| *name == poname)
        .map(|(_, dx, dy)| (*dx, *dy))
        .unwrap_or_default();

    let theta = pa.to_radians();
    let (sin, cos) = theta.sin_cos();
    let cdelt = IMAGER_SCALE / 3600.0;
    let crpix1 = CRPIX - dx / IMAGER_SCALE;
    let crpix2 = CRPIX - dy / IMAGER_SCALE;

    header.set("CTYPE1", "RA---TAN", "KOA: WCS type of the horizontal axis");
    header.set("CTYPE2", "DEC--TAN", "KOA: WCS type of the vertical axis");
    header.set("CRVAL1", ra, "KOA: RA at the reference pixel (deg)");
    header.set("CRVAL2", dec, "KOA: DEC at the reference pixel (deg)");
    header.set("CRPIX1", crpix1, "KOA: Reference pixel on the horizontal axis");
    header.set("CRPIX2", crpix2, "KOA: Reference pixel on the vertical axis");
    header.set("CD1_1", -cdelt * cos, "KOA: WCS coordinate transformation matrix");
    header.set("CD1_2", cdelt * sin, "KOA: WCS coordinate transformation matrix");
    header.set("CD2_1", cdelt * sin, "KOA: WCS coordinate transformation matrix");
    header.set("CD2_2", cdelt * cos, "KOA: WCS coordinate transformation matrix");
    header.set("RADECSYS", "FK5", "KOA: Reference frame");
    Ok(())
}
