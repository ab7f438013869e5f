// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The common checks, carried out on one frame at a time.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use log::{debug, trace};
use thiserror::Error;

use super::{
    stats::{count_saturated, set_image_stats},
    weather::{set_focus, set_weather, AncTable},
};
use crate::{
    constants::{DATA_LEVEL, DEFAULT_SATURATION, ENG_PROGID},
    instrument::{Check, InstrumentError, Koaid, KoaidError},
    io::{
        files::size_mb,
        fits::{read_images, read_primary_header, FitsError, Header, ImageHdu},
    },
    pipeline::PipelineContext,
    prog_split::ProgramInfo,
    time::{normalise_date_obs, parse_time_of_day, semester_from_str, system_time_to_ut, ut_to_hst},
};

/// Why a frame is quarantined instead of archived.
#[derive(Error, Debug)]
pub(super) enum FrameError {
    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error("bad KOAID: {0}")]
    Koaid(#[from] KoaidError),

    #[error("KOAID {koaid} doesn't belong to the night of {night}")]
    OtherNight { koaid: String, night: NaiveDate },

    #[error("couldn't determine the UT time")]
    NoUtc,

    #[error("couldn't determine the raw file name")]
    NoRawName,

    #[error("the frame wasn't attributed to a program")]
    NoProgram,

    #[error(transparent)]
    Fits(#[from] FitsError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

/// A frame under DQA: its raw and staged locations and the header that will
/// be written to `lev0`.
pub(super) struct Frame {
    pub(super) raw: PathBuf,
    pub(super) staged: PathBuf,
    pub(super) header: Header,
    pub(super) koaid: Option<Koaid>,

    /// Read on first use; many checks never need pixels.
    images: Option<Vec<ImageHdu>>,
}

impl Frame {
    pub(super) fn open(raw: PathBuf, staged: PathBuf) -> Result<Frame, FitsError> {
        let header = read_primary_header(&staged)?;
        Ok(Frame {
            raw,
            staged,
            header,
            koaid: None,
            images: None,
        })
    }

    pub(super) fn images(&mut self) -> Result<&[ImageHdu], FitsError> {
        if self.images.is_none() {
            self.images = Some(read_images(&self.staged)?);
        }
        Ok(self.images.as_deref().unwrap_or_default())
    }

    /// DATE-OBS and UTC, once both are normalised.
    pub(super) fn ut_datetime(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(&self.header.get_str("DATE-OBS")?, "%Y-%m-%d").ok()?;
        let time = parse_time_of_day(&self.header.get_str("UTC")?)?;
        Some(date.and_time(time))
    }

    /// When the raw file was last written, in UT. The staged copy stands in
    /// for a raw file that has since gone away.
    fn modified(&self) -> std::io::Result<NaiveDateTime> {
        let meta = std::fs::metadata(&self.raw).or_else(|_| std::fs::metadata(&self.staged))?;
        Ok(system_time_to_ut(meta.modified()?))
    }

    fn file_for_size(&self) -> &Path {
        if self.raw.is_file() {
            &self.raw
        } else {
            &self.staged
        }
    }
}

/// `HH:MM:SS.ss`.
fn format_utc(t: NaiveTime) -> String {
    let hundredths = (t.nanosecond() / 10_000_000).min(99);
    format!("{}.{hundredths:02}", t.format("%H:%M:%S"))
}

/// Everything the checks need besides the frame itself.
pub(super) struct Checker<'a> {
    pub(super) ctx: &'a PipelineContext,
    pub(super) oa: String,
    pub(super) met: AncTable,
    pub(super) focus: AncTable,

    /// Program attribution by staged path; empty until the program splitter
    /// has run.
    pub(super) programs: HashMap<PathBuf, ProgramInfo>,

    pub(super) dqa_date: String,
    pub(super) dqa_vers: String,
}

impl<'a> Checker<'a> {
    pub(super) fn new(
        ctx: &'a PipelineContext,
        oa: String,
        met: AncTable,
        focus: AncTable,
        dqa_vers: String,
    ) -> Checker<'a> {
        Checker {
            ctx,
            oa,
            met,
            focus,
            programs: HashMap::new(),
            dqa_date: Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            dqa_vers,
        }
    }

    /// Run `checks` in order, stopping at the first failure.
    pub(super) fn run_all(&self, frame: &mut Frame, checks: &[Check]) -> Result<(), FrameError> {
        for check in checks {
            trace!("{}: {check:?}", frame.staged.display());
            self.run(frame, check)?;
        }
        Ok(())
    }

    fn run(&self, frame: &mut Frame, check: &Check) -> Result<(), FrameError> {
        let desc = self.ctx.desc;
        match check {
            Check::Instrument => match frame.header.get_str("INSTRUME") {
                Some(value) if desc.matches_instrume(&value) => {}
                Some(value) => {
                    return Err(InstrumentError::WrongInstrument {
                        found: value,
                        expected: desc.code(),
                    }
                    .into())
                }
                None if desc.fill_instrume => {
                    frame.header.set("INSTRUME", desc.code(), "KOA: Instrument")
                }
                None => return Err(InstrumentError::MissingKeyword("INSTRUME").into()),
            },

            Check::DateObs => {
                let raw = desc
                    .keyword(&frame.header, "DATE-OBS")
                    .or_else(|| frame.header.get_str("DATE"));
                let date = match raw.as_deref().and_then(normalise_date_obs) {
                    Some(d) => d,
                    None => {
                        debug!(
                            "{}: no usable DATE-OBS; using the modification date",
                            frame.staged.display()
                        );
                        frame.modified()?.format("%Y-%m-%d").to_string()
                    }
                };
                if frame.header.get_str("DATE-OBS").as_deref() != Some(date.as_str()) {
                    frame.header.set("DATE-OBS", date, "KOA: Observing date");
                }
            }

            Check::Utc => {
                let date_time = frame
                    .header
                    .get_str("DATE")
                    .and_then(|d| d.split_once('T').map(|(_, t)| t.to_string()));
                let time = desc
                    .keyword(&frame.header, "UTC")
                    .or(date_time)
                    .and_then(|t| parse_time_of_day(&t));
                let time = match time {
                    Some(t) => t,
                    None => {
                        debug!(
                            "{}: no usable UT time; using the modification time",
                            frame.staged.display()
                        );
                        frame.modified().map_err(|_| FrameError::NoUtc)?.time()
                    }
                };
                let utc = format_utc(time);
                if frame.header.get_str("UTC").as_deref() != Some(utc.as_str()) {
                    frame.header.set("UTC", utc, "KOA: UTC of observation");
                }
            }

            Check::Semester => {
                let semester = frame
                    .header
                    .get_str("DATE-OBS")
                    .and_then(|d| semester_from_str(&d))
                    .ok_or(InstrumentError::MissingKeyword("DATE-OBS"))?;
                frame.header.set("SEMESTER", semester, "KOA: Calculated semester");
            }

            Check::ImageType => {
                let imtype = desc.koaimtyp(&frame.header);
                debug!("{}: KOAIMTYP = {imtype}", frame.staged.display());
                frame
                    .header
                    .set("KOAIMTYP", imtype.to_string(), "KOA: Image type");
            }

            Check::Koaid => {
                let koaid = Koaid::from_header(desc, &frame.header)?;
                if !koaid.belongs_to_night(self.ctx.ut_date, desc.end_time_secs) {
                    return Err(FrameError::OtherNight {
                        koaid: koaid.to_string(),
                        night: self.ctx.ut_date,
                    });
                }
                frame.header.set("KOAID", koaid.to_string(), "KOA: Data file name");
                frame.koaid = Some(koaid);
            }

            Check::Ofname => {
                let ofname = desc.raw_fname(&frame.header).ok_or(FrameError::NoRawName)?;
                frame.header.set("OFNAME", ofname, "KOA: Original file name");
            }

            Check::ProgInfo => {
                let info = self
                    .programs
                    .get(&frame.staged)
                    .ok_or(FrameError::NoProgram)?;
                let header = &mut frame.header;
                header.set("PROGID", info.proj_code.as_str(), "KOA: Program ID");
                header.set("PROGPI", info.pi.as_str(), "KOA: Program principal investigator");
                header.set("PROGINST", info.institution.as_str(), "KOA: Program institution");
                header.set("PROGTITL", info.title.as_str(), "KOA: Program title");
            }

            Check::Propint => {
                let months = match frame.header.get_str("PROGID") {
                    Some(p) if p == ENG_PROGID => 0,
                    _ => self.ctx.config.dqa.propint,
                };
                frame
                    .header
                    .set("PROPINT", months, "KOA: Proprietary period (months)");
                frame
                    .header
                    .set("PROPMIN", months, "KOA: Minimum proprietary period (months)");
            }

            Check::DataLevel => frame.header.set("DATLEVEL", DATA_LEVEL, "KOA: Data reduction level"),

            Check::DqaInfo => {
                frame
                    .header
                    .set("DQA_DATE", self.dqa_date.as_str(), "KOA: Data quality assessment time");
                frame
                    .header
                    .set("DQA_VERS", self.dqa_vers.as_str(), "KOA: Data quality assessment version");
            }

            Check::Oa => frame.header.set("OA", self.oa.as_str(), "KOA: Observing assistant"),

            Check::FileSize => {
                let mb = size_mb(frame.file_for_size())?;
                frame
                    .header
                    .set("FILESIZE", (mb * 1e6).round() / 1e6, "KOA: Raw file size (MB)");
            }

            Check::Weather => {
                let hst = frame.ut_datetime().map(ut_to_hst);
                set_weather(&mut frame.header, &self.met, desc.telnr, hst);
            }

            Check::Focus => {
                let hst = frame.ut_datetime().map(ut_to_hst);
                set_focus(&mut frame.header, &self.focus, desc.telnr, hst);
            }

            Check::ImageStats => {
                frame.images()?;
                let Frame { header, images, .. } = frame;
                set_image_stats(header, images.as_deref().unwrap_or_default());
            }

            Check::Saturation => {
                let mut threshold = frame.header.get_f64("SATURATE").unwrap_or(DEFAULT_SATURATION);
                if desc.coadd_saturation {
                    threshold *= frame.header.get_f64("COADDS").unwrap_or(1.0);
                }
                let num_saturated = count_saturated(frame.images()?, threshold);
                frame
                    .header
                    .set("NPIXSAT", num_saturated, "KOA: Number of saturated pixels");
            }

            Check::Derive(name, derive) => {
                trace!("{}: deriving {name}", frame.staged.display());
                derive(&mut frame.header)?;
            }
        }
        Ok(())
    }
}
