// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! LRIS, the low-resolution imager and spectrograph on Keck I. The blue and
//! red sides write separate frames; INSTRUME tells them apart.

use chrono::NaiveDate;

use super::*;

pub(super) static LRIS: InstrumentDescriptor = InstrumentDescriptor {
    instr: Instrument::Lris,
    telnr: 1,
    end_time_secs: 20 * 3600,
    sdata_list: &["/s/sdata241", "/s/sdata242", "/s/sdata243"],
    instrume_values: &["LRIS"],
    keyword_map: &[("UTC", &["UTC", "UT"]), ("OBSERVER", &["OBSERVER"])],
    keyword_skips: &["PSCANMN", "PSCANMD", "PSCANSD"],
    eng_observers: &["lriseng", "lris", "engineering", "eng", "lris staff"],
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

fn is_blue(header: &Header) -> bool {
    lower(header, "INSTRUME") == "lrisblue"
}

fn prefix(header: &Header) -> Option<&'static str> {
    if is_blue(header) {
        Some("LB")
    } else {
        Some("LR")
    }
}

/// LAMPS is a comma-separated list of on/off flags in this order.
const LAMP_ORDER: [&str; 10] = [
    "mercury", "neon", "argon", "cadmium", "zinc", "halogen", "krypton", "xenon", "feargon",
    "deuterium",
];

fn lamps_on(header: &Header) -> Vec<&'static str> {
    let lamps = lower(header, "LAMPS");
    lamps
        .split(',')
        .zip(LAMP_ORDER)
        .filter(|(flag, _)| flag.trim() == "1")
        .map(|(_, lamp)| lamp)
        .collect()
}

fn koaimtyp(header: &Header) -> ImageType {
    if header.get_f64("ELAPTIME").or_else(|| header.get_f64("EXPTIME")) == Some(0.0) {
        return ImageType::Bias;
    }
    let lamps = lamps_on(header);
    if lamps.contains(&"halogen") {
        return ImageType::FlatLamp;
    }
    if !lamps.is_empty() {
        return ImageType::ArcLamp;
    }
    if is_on(header, "FLIMAGIN") || is_on(header, "FLSPECTR") {
        return ImageType::DmFlat;
    }
    match lower(header, "TRAPDOOR").as_str() {
        "closed" => ImageType::Dark,
        "open" => ImageType::Object,
        _ => ImageType::Undefined,
    }
}

const BLUE_FILTERS: &[(&str, f64, f64, f64)] = &[
    ("U", 3050.0, 3450.0, 3850.0),
    ("B", 3900.0, 4370.0, 4900.0),
    ("G", 4000.0, 4730.0, 5460.0),
    ("V", 4700.0, 5450.0, 6200.0),
    ("NB4170", 4140.0, 4170.0, 4200.0),
    ("clear", 3000.0, 4500.0, 6000.0),
];

const RED_FILTERS: &[(&str, f64, f64, f64)] = &[
    ("B", 3900.0, 4370.0, 4900.0),
    ("V", 4700.0, 5450.0, 6200.0),
    ("R", 5700.0, 6450.0, 7300.0),
    ("Rs", 6100.0, 6800.0, 7500.0),
    ("I", 7000.0, 8000.0, 9000.0),
    ("GG495", 4950.0, 7600.0, 10300.0),
    ("OG570", 5700.0, 8000.0, 10300.0),
    ("RG850", 8500.0, 9400.0, 10300.0),
    ("clear", 5500.0, 7900.0, 10300.0),
];

/// Blue grism coverage (blue cut, red cut) [Å], from 2015-05-14 on.
const GRISMS: &[(&str, f64, f64)] = &[
    ("300/5000", 1570.0, 7420.0),
    ("400/3400", 1270.0, 5740.0),
    ("600/4000", 3010.0, 5600.0),
    ("1200/3400", 2910.0, 3890.0),
];

/// Blue grism coverage before the 2015-05-14 detector change.
const GRISMS_OLD: &[(&str, f64, f64)] = &[
    ("300/5000", 1500.0, 7600.0),
    ("400/3400", 1200.0, 5900.0),
    ("600/4000", 2900.0, 5800.0),
    ("1200/3400", 2800.0, 4000.0),
];

/// Red grating coverage [Å] and dispersion [Å/pixel].
const GRATINGS: &[(&str, f64, f64)] = &[
    ("150/7500", 12288.0, 3.0),
    ("300/5000", 7066.0, 1.59),
    ("400/8500", 4915.0, 1.16),
    ("600/5000", 3277.0, 0.8),
    ("600/7500", 3277.0, 0.8),
    ("600/10000", 3277.0, 0.8),
    ("831/8200", 2294.0, 0.58),
    ("900/5500", 2130.0, 0.53),
    ("1200/7500", 1638.0, 0.4),
    ("1200/9000", 1638.0, 0.4),
];

const RED_LIMIT: f64 = 10300.0;
const DETECTOR_CHANGE: (i32, u32, u32) = (2015, 5, 14);

fn observed_before_detector_change(header: &Header) -> bool {
    let (y, m, d) = DETECTOR_CHANGE;
    let date_obs = header.get_str("DATE-OBS").unwrap_or_default();
    match (
        NaiveDate::parse_from_str(&date_obs, "%Y-%m-%d"),
        NaiveDate::from_ymd_opt(y, m, d),
    ) {
        (Ok(obs), Some(change)) => obs < change,
        _ => false,
    }
}

/// The dichroic's cut-on wavelength, e.g. "560" -> 5600 Å.
fn dichroic_cut(header: &Header) -> Option<f64> {
    let name = header.get_str("DICHNAME")?;
    let nm = numbers_in(&name).into_iter().next()?;
    Some(nm * 10.0)
}

fn is_imaging(header: &Header) -> bool {
    if is_blue(header) {
        lower(header, "GRISNAME") == "clear"
    } else {
        lower(header, "GRANAME") == "mirror"
    }
}

fn spectroscopy_wavelengths(header: &Header) -> Option<(f64, f64, f64)> {
    let cut = dichroic_cut(header);
    if is_blue(header) {
        let grism = header.get_str("GRISNAME")?;
        let table = if observed_before_detector_change(header) {
            GRISMS_OLD
        } else {
            GRISMS
        };
        let &(_, blue, mut red) = table.iter().find(|(n, _, _)| *n == grism)?;
        let blue = blue.max(3000.0);
        if let Some(cut) = cut {
            red = red.min(cut);
        }
        Some((round10(blue), round10((blue + red) / 2.0), round10(red)))
    } else {
        let grating = header.get_str("GRANAME")?;
        let (_, coverage, _) = GRATINGS.iter().find(|(n, _, _)| *n == grating)?;
        let centre = header.get_f64("WAVELEN")?;
        let (mut blue, _, mut red) = centred(centre, *coverage);
        if let Some(cut) = cut {
            blue = blue.max(cut);
        }
        red = red.min(RED_LIMIT);
        Some((round10(blue), round10(centre), round10(red)))
    }
}

fn derive_wavelengths(header: &mut Header) -> Result<(), InstrumentError> {
    let waves = if is_imaging(header) {
        if is_blue(header) {
            header
                .get_str("BLUFILT")
                .and_then(|f| wave_table(&f, BLUE_FILTERS))
        } else {
            header
                .get_str("REDFILT")
                .and_then(|f| wave_table(&f, RED_FILTERS))
        }
    } else {
        spectroscopy_wavelengths(header)
    };
    set_wavelengths(header, waves);
    Ok(())
}

const BLUE_PIXEL_SCALE: f64 = 0.135;
const RED_PIXEL_SCALE: f64 = 0.123;
const LONG_SLIT_LENGTH: f64 = 175.0;

fn derive_slit_values(header: &mut Header) -> Result<(), InstrumentError> {
    let slit = lower(header, "SLITNAME");
    let values = if slit.starts_with("long") && !is_imaging(header) {
        let scale = if is_blue(header) {
            BLUE_PIXEL_SCALE
        } else {
            RED_PIXEL_SCALE
        };
        let width = numbers_in(&slit).into_iter().next();
        let dispersion = if is_blue(header) {
            // Approximate dispersion [Å/pixel] from the groove density.
            header
                .get_str("GRISNAME")
                .and_then(|g| numbers_in(&g).into_iter().next())
                .map(|lines| 480.0 / lines)
        } else {
            header.get_str("GRANAME").and_then(|g| {
                GRATINGS
                    .iter()
                    .find(|(n, _, _)| *n == g)
                    .map(|(_, _, disp)| *disp)
            })
        };
        let centre = spectroscopy_wavelengths(header).map(|(_, c, _)| c);
        match (width, dispersion, centre) {
            (Some(width), Some(dispersion), Some(centre)) if width > 0.0 => Some(SlitValues {
                length: LONG_SLIT_LENGTH,
                width,
                spatscal: scale,
                dispscal: scale,
                specres: round10(centre / (width / scale * dispersion)),
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
    let angle = header.get_f64("ROTPOSN").map(|r| r - 90.0);
    set_skypa(header, angle);
    Ok(())
}
