// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("'{0}' is not a supported instrument; expected one of DEIMOS, ESI, HIRES, KCWI, LRIS, MOSFIRE, NIRC2, NIRES, NIRSPEC, OSIRIS")]
    Unknown(String),

    #[error("INSTRUME is '{found}', but this is a {expected} run")]
    WrongInstrument { found: String, expected: &'static str },

    #[error("Keyword {0} is missing")]
    MissingKeyword(&'static str),

    #[error("Keyword {key} has an unusable value '{value}'")]
    BadValue { key: &'static str, value: String },
}
