// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Per-instrument behaviour.
//!
//! Each supported instrument is described by a static [InstrumentDescriptor]:
//! plain data (telescope, night boundary, search roots, keyword aliases) plus a
//! few functions (KOAID prefix, raw file name, image-type classifier) and the
//! ordered list of [Check]s the DQA stage runs on each of its frames.

mod deimos;
mod error;
mod esi;
mod hires;
mod kcwi;
mod koaid;
mod lris;
mod mosfire;
mod nirc2;
mod nires;
mod nirspec;
mod osiris;

pub use error::InstrumentError;
pub use koaid::{Koaid, KoaidError};

use std::path::PathBuf;

use chrono::NaiveTime;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{config::Config, constants::NULL, io::fits::Header};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Instrument {
    Deimos,
    Esi,
    Hires,
    Kcwi,
    Lris,
    Mosfire,
    Nirc2,
    Nires,
    Nirspec,
    Osiris,
}

impl Instrument {
    /// Parse a user-supplied instrument code, case-insensitively.
    pub fn from_code(code: &str) -> Result<Instrument, InstrumentError> {
        code.trim()
            .parse()
            .map_err(|_| InstrumentError::Unknown(code.to_string()))
    }

    pub fn descriptor(self) -> &'static InstrumentDescriptor {
        match self {
            Instrument::Deimos => &deimos::DEIMOS,
            Instrument::Esi => &esi::ESI,
            Instrument::Hires => &hires::HIRES,
            Instrument::Kcwi => &kcwi::KCWI,
            Instrument::Lris => &lris::LRIS,
            Instrument::Mosfire => &mosfire::MOSFIRE,
            Instrument::Nirc2 => &nirc2::NIRC2,
            Instrument::Nires => &nires::NIRES,
            Instrument::Nirspec => &nirspec::NIRSPEC,
            Instrument::Osiris => &osiris::OSIRIS,
        }
    }
}

/// The canonical `KOAIMTYP` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
pub enum ImageType {
    #[strum(serialize = "object")]
    Object,
    #[strum(serialize = "dark")]
    Dark,
    #[strum(serialize = "bias")]
    Bias,
    #[strum(serialize = "flatlamp")]
    FlatLamp,
    #[strum(serialize = "flatlampoff")]
    FlatLampOff,
    #[strum(serialize = "arclamp")]
    ArcLamp,
    #[strum(serialize = "focus")]
    Focus,
    #[strum(serialize = "trace")]
    Trace,
    #[strum(serialize = "calib")]
    Calib,
    #[strum(serialize = "polcal")]
    PolCal,
    #[strum(serialize = "dmflat")]
    DmFlat,
    #[strum(serialize = "telTBD")]
    TelTbd,
    #[strum(serialize = "flatTBD")]
    FlatTbd,
    #[strum(serialize = "specTBD")]
    SpecTbd,
    #[strum(serialize = "undefined")]
    Undefined,
}

/// A header derivation specific to one instrument.
pub type Derivation = fn(&mut Header) -> Result<(), InstrumentError>;

/// One step of the DQA check list. The common steps are carried out by the DQA
/// stage itself; [Check::Derive] steps belong to the instrument.
#[derive(Debug, Clone, Copy)]
pub enum Check {
    /// Make sure INSTRUME is present and names this instrument.
    Instrument,
    /// Normalise DATE-OBS into `YYYY-MM-DD`.
    DateObs,
    /// Normalise the UT time of day.
    Utc,
    Semester,
    ImageType,
    Koaid,
    Ofname,
    /// Program attribution. Every check from here on runs only after the
    /// program splitter has seen the whole night.
    ProgInfo,
    Propint,
    DataLevel,
    DqaInfo,
    Oa,
    FileSize,
    Weather,
    Focus,
    ImageStats,
    Saturation,
    Derive(&'static str, Derivation),
}

/// Everything the pipeline needs to know about one instrument.
pub struct InstrumentDescriptor {
    pub instr: Instrument,

    /// 1 or 2, for Keck I or Keck II.
    pub telnr: u8,

    /// UT seconds since midnight at which the observing night ends.
    pub end_time_secs: u32,

    /// Default roots searched for the night's raw files.
    pub sdata_list: &'static [&'static str],

    /// Accepted INSTRUME values; anything starting with one of these is this
    /// instrument.
    pub instrume_values: &'static [&'static str],

    /// Logical keyword names mapped to the instrument's own keywords, in order
    /// of preference.
    pub keyword_map: &'static [(&'static str, &'static [&'static str])],

    /// Keywords allowed to be null in the metadata table without comment.
    pub keyword_skips: &'static [&'static str],

    /// Observer names that identify engineering frames.
    pub eng_observers: &'static [&'static str],

    /// A header keyword naming another raw file that must be archived with
    /// the frame (DEIMOS's FCS reference images).
    pub linked_file_keyword: Option<&'static str>,

    /// Whether a missing INSTRUME is filled in rather than rejected; some
    /// instruments have written frames without it.
    pub fill_instrume: bool,

    /// Whether SATURATE is per coadd and must be scaled by COADDS.
    pub coadd_saturation: bool,

    pub prefix: fn(&Header) -> Option<&'static str>,
    pub raw_fname: fn(&Header) -> Option<String>,
    pub koaimtyp: fn(&Header) -> ImageType,
    pub checks: &'static [Check],
}

impl InstrumentDescriptor {
    pub fn code(&self) -> &'static str {
        self.instr.into()
    }

    /// "Hires", "Nirspec", ... as used in program titles.
    pub fn title_case(&self) -> String {
        let code = self.code();
        let mut chars = code.chars();
        match chars.next() {
            Some(first) => first.to_string() + &chars.as_str().to_lowercase(),
            None => String::new(),
        }
    }

    pub fn end_time(&self) -> NaiveTime {
        NaiveTime::from_num_seconds_from_midnight_opt(self.end_time_secs, 0).unwrap_or_default()
    }

    /// Look up a logical keyword through the instrument's aliases, falling back
    /// to the logical name itself.
    pub fn keyword(&self, header: &Header, logical: &str) -> Option<String> {
        self.keyword_map
            .iter()
            .find(|(name, _)| *name == logical)
            .and_then(|(_, aliases)| header.get_first_str(aliases))
            .or_else(|| header.get_str(logical))
    }

    pub fn prefix(&self, header: &Header) -> Option<&'static str> {
        (self.prefix)(header)
    }

    pub fn raw_fname(&self, header: &Header) -> Option<String> {
        (self.raw_fname)(header)
    }

    pub fn koaimtyp(&self, header: &Header) -> ImageType {
        (self.koaimtyp)(header)
    }

    /// Roots to search for raw files. The configuration can replace the
    /// built-in list, and the CIT test override replaces everything.
    pub fn search_dirs(&self, config: &Config) -> Vec<PathBuf> {
        if let Some(dir) = config.cit.as_ref().and_then(|c| c.locate_dir.as_ref()) {
            return vec![dir.clone()];
        }
        if let Some(sdata) = config
            .instrument(self.code())
            .ok()
            .and_then(|i| i.sdata.as_ref())
        {
            return sdata.to_vec();
        }
        self.sdata_list.iter().map(PathBuf::from).collect()
    }

    /// Whether an INSTRUME value belongs to this instrument.
    pub fn matches_instrume(&self, value: &str) -> bool {
        let value = value.trim().to_uppercase();
        self.instrume_values.iter().any(|v| value.starts_with(v))
    }
}

/// The usual raw file name: an output-file root and a frame number padded to
/// four digits.
pub(crate) fn default_raw_fname(header: &Header) -> Option<String> {
    let root = header.get_first_str(&["OUTFILE", "ROOTNAME", "FILENAME"])?;
    let frameno = ["FRAMENO", "FRAMENUM", "IMGNUM", "FILENUM", "FILENUM2"]
        .iter()
        .find_map(|k| header.get_i64(k))?;
    let root = root.strip_suffix(".fits").unwrap_or(&root);
    Some(format!("{root}{frameno:04}.fits"))
}

/// `DATAFILE` with `.fits` appended when it's missing.
pub(crate) fn datafile_raw_fname(header: &Header) -> Option<String> {
    let datafile = header.get_str("DATAFILE")?;
    if datafile.ends_with(".fits") {
        Some(datafile)
    } else {
        Some(format!("{datafile}.fits"))
    }
}

/// A keyword's value, trimmed and lower-cased; empty when missing.
pub(crate) fn lower(header: &Header, key: &str) -> String {
    header
        .get_str(key)
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Round a wavelength to the nearest 10 Å.
pub(crate) fn round10(angstroms: f64) -> f64 {
    (angstroms / 10.0).round() * 10.0
}

/// Write WAVEBLUE, WAVECNTR and WAVERED, or nulls.
pub(crate) fn set_wavelengths(header: &mut Header, waves: Option<(f64, f64, f64)>) {
    match waves {
        Some((blue, cntr, red)) => {
            header.set("WAVEBLUE", blue, "KOA: Blue end wavelength");
            header.set("WAVECNTR", cntr, "KOA: Center wavelength");
            header.set("WAVERED", red, "KOA: Red end wavelength");
        }
        None => {
            header.set_null("WAVEBLUE", "KOA: Blue end wavelength");
            header.set_null("WAVECNTR", "KOA: Center wavelength");
            header.set_null("WAVERED", "KOA: Red end wavelength");
        }
    }
}

/// Slit and spectral-scale keywords.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SlitValues {
    /// Slit length [arcsec].
    pub(crate) length: f64,
    /// Slit width [arcsec].
    pub(crate) width: f64,
    /// Spatial scale [arcsec/pixel].
    pub(crate) spatscal: f64,
    /// Dispersion scale [arcsec/pixel].
    pub(crate) dispscal: f64,
    /// Resolving power.
    pub(crate) specres: f64,
}

pub(crate) fn set_slit_values(header: &mut Header, values: Option<SlitValues>) {
    let keys = [
        ("SLITLEN", "KOA: Slit length projected on sky (arcsec)"),
        ("SLITWIDT", "KOA: Slit width projected on sky (arcsec)"),
        ("SPATSCAL", "KOA: CCD pixel scale (arcsec/pixel), spatial"),
        ("DISPSCAL", "KOA: CCD pixel scale (arcsec/pixel), dispersion"),
        ("SPECRES", "KOA: Nominal spectral resolution"),
    ];
    match values {
        Some(v) => {
            let values = [v.length, v.width, v.spatscal, v.dispscal, v.specres];
            for ((key, comment), value) in keys.into_iter().zip(values) {
                header.set_f64_or_null(key, Some(value), comment);
            }
        }
        None => {
            for (key, comment) in keys {
                header.set_null(key, comment);
            }
        }
    }
}

/// Set SKYPA from an angle, wrapped into [0, 360).
pub(crate) fn set_skypa(header: &mut Header, angle: Option<f64>) {
    let comment = "KOA: Position angle on sky (deg)";
    match angle {
        Some(a) if a.is_finite() => {
            let wrapped = a.rem_euclid(360.0);
            header.set("SKYPA", (wrapped * 1e4).round() / 1e4, comment)
        }
        _ => header.set_null("SKYPA", comment),
    }
}

/// Whether a header value is missing or the null placeholder.
pub(crate) fn is_missing(header: &Header, key: &str) -> bool {
    match header.get_str(key) {
        None => true,
        Some(s) => s == NULL,
    }
}

/// The common head of every check list, up to program attribution.
macro_rules! common_checks {
    ($($extra:expr),* $(,)?) => {
        &[
            Check::Instrument,
            Check::DateObs,
            Check::Utc,
            Check::Semester,
            Check::ImageType,
            Check::Koaid,
            Check::Ofname,
            Check::ProgInfo,
            Check::Propint,
            Check::DataLevel,
            Check::DqaInfo,
            Check::Oa,
            Check::FileSize,
            Check::Weather,
            Check::Focus,
            Check::ImageStats,
            Check::Saturation,
            $($extra),*
        ]
    };
}
pub(crate) use common_checks;

/// Look up a name in a table of (name, blue, centre, red) wavelengths,
/// ignoring case.
pub(crate) fn wave_table(
    name: &str,
    table: &[(&str, f64, f64, f64)],
) -> Option<(f64, f64, f64)> {
    let name = name.trim();
    table
        .iter()
        .find(|(n, _, _, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, b, c, r)| (*b, *c, *r))
}

/// Blue and red ends around a central wavelength.
pub(crate) fn centred(centre: f64, bandwidth: f64) -> (f64, f64, f64) {
    (
        round10(centre - bandwidth / 2.0),
        round10(centre),
        round10(centre + bandwidth / 2.0),
    )
}

/// All the decimal numbers in a name like "long_1.0" or "0.432x24", in order.
pub(crate) fn numbers_in(name: &str) -> Vec<f64> {
    lazy_static::lazy_static! {
        static ref NUMBER: regex::Regex = regex::Regex::new(r"\d+(\.\d+)?").unwrap();
    }
    NUMBER
        .find_iter(name)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Whether a lamp or power keyword says it's on.
pub(crate) fn is_on(header: &Header, key: &str) -> bool {
    header.get_bool(key).unwrap_or(false)
}

/// Whether the telescope was tracking a target.
pub(crate) fn is_tracking(header: &Header) -> bool {
    lower(header, "AXESTAT").contains("tracking")
}
