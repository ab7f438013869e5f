// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

Anything that is written into a FITS header or a table consumed by the archive
should be defined here, so that the archive-facing vocabulary lives in one
place.
 */

/// The literal written for any keyword whose value couldn't be derived.
pub const NULL: &str = "null";

/// Hawaii Standard Time is this many hours behind UT.
pub const HST_OFFSET_HOURS: i64 = 10;

/// A weather row must be within this many seconds of a frame's timestamp to be
/// used for the frame.
pub const WEATHER_MATCH_SECONDS: f64 = 30.0;

/// A focus (guider FWHM) row must be within this many seconds of a frame's
/// timestamp to be used for the frame.
pub const FOCUS_MATCH_SECONDS: f64 = 2.5;

/// An output directory is attributed to a program when more than this fraction
/// of its science frames fall inside that program's time range.
pub const SCI_SHARE_THRESHOLD: f64 = 0.8;

/// Pixel value considered saturated when a frame doesn't say otherwise.
pub const DEFAULT_SATURATION: f64 = 65535.0;

/// Default proprietary period for science programs [months].
pub const DEFAULT_PROPINT_MONTHS: u32 = 18;

/// The data level of everything the DEP writes.
pub const DATA_LEVEL: i64 = 0;

/// Default sunset and sunrise (HST) used when scheduled programs don't carry
/// their own start/end times.
pub const DEFAULT_SUNSET: &str = "18:00";
pub const DEFAULT_SUNRISE: &str = "06:00";

/// Program ID given to engineering frames.
pub const ENG_PROGID: &str = "ENG";

/// Placeholder used for every program field when nothing is scheduled.
pub const NONE_PROGRAM: &str = "NONE";

/// Institution given to engineering frames.
pub const ENG_INSTITUTION: &str = "KECK";

/// Paths containing any of these are never considered raw science data.
pub const LOCATE_EXCLUDED_PATH_PARTS: [&str; 4] = ["/fcs", "mira", "savier-protected", "idf"];

/// Frames are rendered no bigger than this many pixels on a side in JPEG
/// previews.
pub const JPEG_MAX_PIXELS: usize = 2048;

/// z-scale contrast used for JPEG previews.
pub const ZSCALE_CONTRAST: f64 = 0.25;

/// Maximum number of pixels sampled by the z-scale algorithm.
pub const ZSCALE_SAMPLES: usize = 1000;
