// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! HIRES, the echelle spectrograph on Keck I.

use super::*;

pub(super) static HIRES: InstrumentDescriptor = InstrumentDescriptor {
    instr: Instrument::Hires,
    telnr: 1,
    end_time_secs: 20 * 3600,
    sdata_list: &["/s/sdata125", "/s/sdata126", "/s/sdata127"],
    instrume_values: &["HIRES"],
    keyword_map: &[("UTC", &["UTC", "UT"]), ("OBSERVER", &["OBSERVER"])],
    keyword_skips: &["PSCANMN", "PSCANMD", "PSCANSD"],
    eng_observers: &["hireseng", "hires", "engineering", "eng", "hires staff"],
    linked_file_keyword: None,
    fill_instrume: false,
    coadd_saturation: false,
    prefix,
    raw_fname: default_raw_fname,
    koaimtyp,
    checks: common_checks![
        Check::Derive("PROPINT fan-out", set_propint_per_ccd),
        Check::Derive("wavelengths", derive_wavelengths),
        Check::Derive("slit values", derive_slit_values),
        Check::Derive("SKYPA", derive_skypa),
    ],
};

fn prefix(_: &Header) -> Option<&'static str> {
    Some("HI")
}

fn koaimtyp(header: &Header) -> ImageType {
    let obstype = lower(header, "OBSTYPE");
    let lamp = lower(header, "LAMPNAME");
    let hatch_closed = header.get_bool("HATCLOS").unwrap_or(false);

    if obstype == "bias" || header.get_f64("EXPTIME") == Some(0.0) {
        return ImageType::Bias;
    }
    match obstype.as_str() {
        "dark" => return ImageType::Dark,
        "focus" => return ImageType::Focus,
        _ => (),
    }
    if header.get_bool("AUTOSHUT") == Some(false) {
        return if hatch_closed {
            ImageType::Dark
        } else {
            ImageType::Undefined
        };
    }

    if lamp.starts_with("quartz") || lamp == "wide" {
        // The D5 pinhole is only ever used to trace the orders.
        if lower(header, "DECKNAME") == "d5" {
            return ImageType::Trace;
        }
        return ImageType::FlatLamp;
    }
    if lamp.contains("thar") {
        return ImageType::ArcLamp;
    }
    if lamp.is_empty() || lamp == "none" || lamp == "off" {
        if hatch_closed {
            return ImageType::Dark;
        }
        if obstype.is_empty() || obstype == "object" {
            return ImageType::Object;
        }
    }
    ImageType::Undefined
}

/// The three HIRES CCDs share the program's proprietary period.
fn set_propint_per_ccd(header: &mut Header) -> Result<(), InstrumentError> {
    let propint = header
        .get_i64("PROPINT")
        .ok_or(InstrumentError::MissingKeyword("PROPINT"))?;
    for key in ["PROPINT1", "PROPINT2", "PROPINT3"] {
        header.set(key, propint, "KOA: Proprietary period (months)");
    }
    Ok(())
}

/// The nominal HIRES optical train (Vogt et al. 1994, SPIE 2198, 362), from
/// which the wavelength coverage of a frame is worked out. Angles are in
/// degrees, wavelengths in Angstroms.
struct Optics {
    echelle_grooves_per_mm: f64,
    echelle_blaze_deg: f64,
    /// Out-of-plane angle of the echelle.
    echelle_gamma_deg: f64,
    /// Camera-collimator angle.
    camcol_deg: f64,
    /// Cross-disperser blaze.
    xd_blaze_deg: f64,
    /// Half of the angle subtended by the detector mosaic in the
    /// cross-dispersion direction.
    detector_half_angle_deg: f64,
    /// Wavelengths outside this range are off the detector.
    valid_range: (f64, f64),
}

const OPTICS: Optics = Optics {
    echelle_grooves_per_mm: 52.68,
    echelle_blaze_deg: 70.53,
    echelle_gamma_deg: 5.0,
    camcol_deg: 40.0,
    xd_blaze_deg: -4.38,
    detector_half_angle_deg: 3.46,
    valid_range: (2000.0, 20000.0),
};

struct CrossDisperser {
    /// The XDISPERS value, lower case.
    name: &'static str,
    grooves_per_mm: f64,
    /// Angle between XDANGL zero and the grating normal.
    offset_deg: f64,
}

static CROSS_DISPERSERS: [CrossDisperser; 2] = [
    CrossDisperser {
        name: "red",
        grooves_per_mm: 250.0,
        offset_deg: 27.64,
    },
    CrossDisperser {
        name: "uv",
        grooves_per_mm: 400.0,
        offset_deg: 29.5,
    },
];

fn cross_disperser(name: &str) -> Option<&'static CrossDisperser> {
    CROSS_DISPERSERS.iter().find(|xd| xd.name == name)
}

/// Wavelengths from the cross-disperser and echelle angles. The central
/// wavelength falls on the echelle order closest to the cross-disperser's
/// central wavelength; the blue and red ends are where the detector edges
/// fall on the cross-disperser.
pub(super) fn wavelengths(xdispers: &str, xdangl: f64, echangl: f64) -> Option<(f64, f64, f64)> {
    let xd = cross_disperser(xdispers)?;
    let xd_spacing = 1e7 / xd.grooves_per_mm;
    let alpha = xd.offset_deg + xdangl + OPTICS.xd_blaze_deg;
    let beta = alpha - OPTICS.camcol_deg;
    let xd_wave = |beta: f64| xd_spacing * (alpha.to_radians().sin() + beta.to_radians().sin());
    let xd_centre = xd_wave(beta);
    if xd_centre <= 0.0 {
        return None;
    }

    // mλ = 2 d sinθ cosγ on the echelle.
    let ech_spacing = 1e7 / OPTICS.echelle_grooves_per_mm;
    let ech_const = 2.0
        * ech_spacing
        * (OPTICS.echelle_blaze_deg + echangl).to_radians().sin()
        * OPTICS.echelle_gamma_deg.to_radians().cos();
    let mut order = (ech_const / xd_centre).round().max(1.0);
    let mut centre = ech_const / order;
    for _ in 0..5 {
        // Shift orders until the echelle wavelength is within half a free
        // spectral range of the cross-disperser's.
        let half_fsr = centre / (2.0 * order);
        if centre - xd_centre > half_fsr {
            order += 1.0;
        } else if xd_centre - centre > half_fsr && order > 1.0 {
            order -= 1.0;
        } else {
            break;
        }
        centre = ech_const / order;
    }

    let blue = xd_wave(beta - OPTICS.detector_half_angle_deg);
    let red = xd_wave(beta + OPTICS.detector_half_angle_deg);
    let waves = (round10(blue), round10(centre), round10(red));
    let in_range = |w: f64| w >= OPTICS.valid_range.0 && w <= OPTICS.valid_range.1;
    if in_range(waves.0) && in_range(waves.1) && in_range(waves.2) {
        Some(waves)
    } else {
        None
    }
}

fn derive_wavelengths(header: &mut Header) -> Result<(), InstrumentError> {
    let waves = match (
        header.get_str("XDISPERS"),
        header.get_f64("XDANGL"),
        header.get_f64("ECHANGL"),
    ) {
        (Some(xd), Some(xdangl), Some(echangl)) => {
            wavelengths(&xd.to_lowercase(), xdangl, echangl)
        }
        _ => None,
    };
    set_wavelengths(header, waves);
    Ok(())
}

/// Decker name to slit length and width [arcsec].
const DECKERS: &[(&str, f64, f64)] = &[
    ("B1", 3.5, 0.574),
    ("B2", 7.0, 0.574),
    ("B3", 14.0, 0.574),
    ("B4", 28.0, 0.574),
    ("B5", 3.5, 0.861),
    ("C1", 7.0, 0.861),
    ("C2", 14.0, 0.861),
    ("C3", 28.0, 0.861),
    ("C4", 3.5, 1.148),
    ("C5", 7.0, 1.148),
    ("D1", 14.0, 1.148),
    ("D2", 28.0, 1.148),
    ("D3", 7.0, 1.722),
    ("D4", 14.0, 1.722),
    ("D5", 0.119, 0.179),
    ("E1", 1.0, 0.4),
    ("E2", 3.0, 0.4),
    ("E3", 5.0, 0.4),
    ("E4", 7.0, 0.4),
];

const PIXEL_SCALE: f64 = 0.1195;
/// Slit width × resolving power.
const RESOLUTION_PRODUCT: f64 = 41300.0;

/// BINNING is "<dispersion>,<spatial>".
fn binning(header: &Header) -> (f64, f64) {
    header
        .get_str("BINNING")
        .and_then(|b| {
            let (x, y) = b.split_once(',')?;
            Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
        })
        .unwrap_or((1.0, 1.0))
}

fn derive_slit_values(header: &mut Header) -> Result<(), InstrumentError> {
    let decker = header.get_str("DECKNAME").map(|d| d.to_uppercase());
    let (xbin, ybin) = binning(header);
    let values = decker
        .and_then(|d| DECKERS.iter().find(|(name, _, _)| *name == d))
        .map(|(_, length, width)| SlitValues {
            length: *length,
            width: *width,
            spatscal: PIXEL_SCALE * ybin,
            dispscal: PIXEL_SCALE * xbin,
            specres: round10(RESOLUTION_PRODUCT / width),
        });
    set_slit_values(header, values);
    Ok(())
}

/// SKYPA = 2 IROT2ANG + PARANG + EL + 270.
fn derive_skypa(header: &mut Header) -> Result<(), InstrumentError> {
    let angle = match (
        header.get_f64("IROT2ANG"),
        header.get_f64("PARANG"),
        header.get_f64("EL"),
    ) {
        (Some(irot2ang), Some(parang), Some(el)) => Some(2.0 * irot2ang + parang + el + 270.0),
        _ => None,
    };
    set_skypa(header, angle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::io::fits::KeyValue;

    #[test]
    fn test_koaimtyp() {
        let h = |pairs: &[(&str, &str)]| -> Header { pairs.iter().copied().collect() };
        assert_eq!(koaimtyp(&h(&[("OBSTYPE", "Bias")])), ImageType::Bias);
        assert_eq!(
            koaimtyp(&h(&[("LAMPNAME", "quartz1"), ("DECKNAME", "C5")])),
            ImageType::FlatLamp
        );
        assert_eq!(
            koaimtyp(&h(&[("LAMPNAME", "quartz2"), ("DECKNAME", "D5")])),
            ImageType::Trace
        );
        assert_eq!(koaimtyp(&h(&[("LAMPNAME", "ThAr1")])), ImageType::ArcLamp);
        assert_eq!(
            koaimtyp(&h(&[("LAMPNAME", "none"), ("OBSTYPE", "Object")])),
            ImageType::Object
        );
        assert_eq!(
            koaimtyp(&h(&[("LAMPNAME", "none"), ("HATCLOS", "closed")])),
            ImageType::Dark
        );
        assert_eq!(koaimtyp(&h(&[("OBSTYPE", "Focus")])), ImageType::Focus);
    }

    #[test]
    fn test_wavelengths_are_ordered_and_rounded() {
        let (blue, centre, red) = wavelengths("red", 1.0, 0.0).unwrap();
        assert!(blue < centre && centre < red);
        for w in [blue, centre, red] {
            assert_abs_diff_eq!(w % 10.0, 0.0);
            assert!((2000.0..=20000.0).contains(&w));
        }

        let (uv_blue, _, uv_red) = wavelengths("uv", 0.0, 0.0).unwrap();
        assert!(uv_red < red);
        assert!(uv_blue < blue);
        assert!(wavelengths("green", 0.0, 0.0).is_none());
    }

    #[test]
    fn test_cross_dispersers() {
        assert_eq!(cross_disperser("red").unwrap().grooves_per_mm, 250.0);
        assert_eq!(cross_disperser("uv").unwrap().grooves_per_mm, 400.0);
        // XDISPERS is lower-cased before the lookup.
        assert!(cross_disperser("RED").is_none());
    }

    #[test]
    fn test_wavelengths_out_of_range_are_null() {
        // A silly cross-disperser angle puts everything off the detector.
        assert!(wavelengths("red", -20.0, 0.0).is_none());

        let mut header: Header = [("XDISPERS", "RED")].into_iter().collect();
        header.set("XDANGL", -20.0, "");
        header.set("ECHANGL", 0.0, "");
        derive_wavelengths(&mut header).unwrap();
        assert!(header.get("WAVEBLUE").unwrap().is_null());
    }

    #[test]
    fn test_wavelengths_are_idempotent() {
        let mut header: Header = [("XDISPERS", "RED")].into_iter().collect();
        header.set("XDANGL", 0.8, "");
        header.set("ECHANGL", -0.05, "");
        derive_wavelengths(&mut header).unwrap();
        let first: Vec<_> = ["WAVEBLUE", "WAVECNTR", "WAVERED"]
            .iter()
            .map(|k| header.get(k).cloned())
            .collect();
        derive_wavelengths(&mut header).unwrap();
        let second: Vec<_> = ["WAVEBLUE", "WAVECNTR", "WAVERED"]
            .iter()
            .map(|k| header.get(k).cloned())
            .collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|w| matches!(w, Some(KeyValue::Float(_)))));
    }

    #[test]
    fn test_skypa() {
        let mut header = Header::new();
        header.set("IROT2ANG", 10.0, "");
        header.set("PARANG", 45.0, "");
        header.set("EL", 60.0, "");
        derive_skypa(&mut header).unwrap();
        // 20 + 45 + 60 + 270 = 395 -> 35
        assert_eq!(header.get_f64("SKYPA"), Some(35.0));

        let mut header = Header::new();
        derive_skypa(&mut header).unwrap();
        assert!(header.get("SKYPA").unwrap().is_null());
    }

    #[test]
    fn test_slit_values() {
        let mut header: Header = [("DECKNAME", "c5"), ("BINNING", "2,1")].into_iter().collect();
        derive_slit_values(&mut header).unwrap();
        assert_eq!(header.get_f64("SLITLEN"), Some(7.0));
        assert_eq!(header.get_f64("SLITWIDT"), Some(1.148));
        assert_abs_diff_eq!(header.get_f64("DISPSCAL").unwrap(), 0.239, epsilon = 1e-9);
        assert_abs_diff_eq!(header.get_f64("SPATSCAL").unwrap(), 0.1195, epsilon = 1e-9);
        assert_eq!(header.get_f64("SPECRES"), Some(35980.0));
    }

    #[test]
    fn test_propint_fan_out() {
        let mut header = Header::new();
        header.set("PROPINT", 18i64, "");
        set_propint_per_ccd(&mut header).unwrap();
        for key in ["PROPINT1", "PROPINT2", "PROPINT3"] {
            assert_eq!(header.get_i64(key), Some(18));
        }
    }
}
