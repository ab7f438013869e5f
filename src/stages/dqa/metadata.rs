// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The night's metadata table.
//!
//! Which keywords appear, and how wide their columns are, comes from a
//! `keywords.format.<INSTR>` file: one `keyword datatype width nullable
//! [units]` line per column, `#` starting a comment. The table has four
//! `|`-delimited header rows (names, data types, units, null placeholder)
//! followed by one space-separated row per archived frame.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use strum_macros::{Display, EnumString};
use thiserror::Error;

use crate::{
    constants::NULL,
    instrument::Instrument,
    io::fits::{Header, KeyValue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub(crate) enum DataType {
    Char,
    Int,
    #[strum(serialize = "double", serialize = "float", serialize = "real")]
    Double,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeywordDefinition {
    pub(crate) name: String,
    pub(crate) datatype: DataType,

    /// The column width; never less than the widest header cell.
    pub(crate) width: usize,

    pub(crate) nullable: bool,
    pub(crate) units: String,
}

impl KeywordDefinition {
    fn parse(line: &str) -> Option<KeywordDefinition> {
        let mut fields = line.split_whitespace();
        let name = fields.next()?.to_uppercase();
        let datatype: DataType = fields.next()?.parse().ok()?;
        let width: usize = fields.next()?.parse().ok()?;
        let nullable = match fields.next()?.to_uppercase().as_str() {
            "Y" | "YES" => true,
            "N" | "NO" => false,
            _ => return None,
        };
        let units = fields.collect::<Vec<_>>().join(" ");
        let width = [
            width,
            name.len(),
            datatype.to_string().len(),
            units.len(),
            NULL.len(),
        ]
        .into_iter()
        .max()
        .unwrap_or(width);
        Some(KeywordDefinition {
            name,
            datatype,
            width,
            nullable,
            units,
        })
    }
}

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Couldn't read keyword definitions from {file}: {err}")]
    Read { file: PathBuf, err: std::io::Error },

    #[error("Line {line_num} of the {source_name} keyword definitions is malformed: '{line}'")]
    BadLine {
        source_name: String,
        line_num: usize,
        line: String,
    },

    #[error("The {0} keyword definitions are empty")]
    Empty(String),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

fn builtin_definitions(instr: Instrument) -> &'static str {
    match instr {
        Instrument::Deimos => include_str!("../../../keywords/keywords.format.DEIMOS"),
        Instrument::Esi => include_str!("../../../keywords/keywords.format.ESI"),
        Instrument::Hires => include_str!("../../../keywords/keywords.format.HIRES"),
        Instrument::Kcwi => include_str!("../../../keywords/keywords.format.KCWI"),
        Instrument::Lris => include_str!("../../../keywords/keywords.format.LRIS"),
        Instrument::Mosfire => include_str!("../../../keywords/keywords.format.MOSFIRE"),
        Instrument::Nirc2 => include_str!("../../../keywords/keywords.format.NIRC2"),
        Instrument::Nires => include_str!("../../../keywords/keywords.format.NIRES"),
        Instrument::Nirspec => include_str!("../../../keywords/keywords.format.NIRSPEC"),
        Instrument::Osiris => include_str!("../../../keywords/keywords.format.OSIRIS"),
    }
}

pub(crate) fn parse_definitions(
    text: &str,
    source_name: &str,
) -> Result<Vec<KeywordDefinition>, MetadataError> {
    let mut defs = vec![];
    for (i, line) in text.lines().enumerate() {
        let content = line.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let def = KeywordDefinition::parse(content).ok_or_else(|| MetadataError::BadLine {
            source_name: source_name.to_string(),
            line_num: i + 1,
            line: line.to_string(),
        })?;
        defs.push(def);
    }
    if defs.is_empty() {
        return Err(MetadataError::Empty(source_name.to_string()));
    }
    Ok(defs)
}

/// The keyword definitions of an instrument: `keywords.format.<INSTR>` from
/// `dir` if given, otherwise the built-in table.
pub(crate) fn load_definitions(
    instr: Instrument,
    dir: Option<&Path>,
) -> Result<Vec<KeywordDefinition>, MetadataError> {
    match dir {
        Some(dir) => {
            let file = dir.join(format!("keywords.format.{instr}"));
            debug!("Reading keyword definitions from {}", file.display());
            let text = std::fs::read_to_string(&file).map_err(|err| MetadataError::Read {
                file: file.clone(),
                err,
            })?;
            parse_definitions(&text, &file.display().to_string())
        }
        None => parse_definitions(builtin_definitions(instr), &format!("built-in {instr}")),
    }
}

/// Fit a float into a column, giving up decimal places as needed.
fn format_float(v: f64, width: usize) -> String {
    let s = v.to_string();
    if s.len() <= width {
        return s;
    }
    (0..=10)
        .rev()
        .map(|p| format!("{v:.p$}"))
        .find(|s| s.len() <= width)
        .unwrap_or(s)
}

/// Builds the table in memory, one row per archived frame.
pub(crate) struct MetadataTable<'a> {
    defs: &'a [KeywordDefinition],

    /// Keywords that may be null without a warning.
    skips: &'a [&'static str],

    rows: Vec<String>,
}

impl<'a> MetadataTable<'a> {
    pub(crate) fn new(defs: &'a [KeywordDefinition], skips: &'a [&'static str]) -> Self {
        Self {
            defs,
            skips,
            rows: vec![],
        }
    }

    pub(crate) fn header_rows(&self) -> [String; 4] {
        let row = |cell: &dyn Fn(&KeywordDefinition) -> String| {
            let mut s = String::from("|");
            for def in self.defs {
                s.push_str(&format!("{:<width$}|", cell(def), width = def.width));
            }
            s
        };
        [
            row(&|d| d.name.clone()),
            row(&|d| d.datatype.to_string()),
            row(&|d| d.units.clone()),
            row(&|_| NULL.to_string()),
        ]
    }

    fn cell(&self, def: &KeywordDefinition, value: Option<&KeyValue>, koaid: &str) -> String {
        let value = value.filter(|v| !v.is_null() && !v.to_string().trim().is_empty());
        let Some(value) = value else {
            if !def.nullable && !self.skips.contains(&def.name.as_str()) {
                warn!("{koaid}: {} is null but isn't allowed to be", def.name);
            }
            return NULL.to_string();
        };

        let formatted = match def.datatype {
            DataType::Int => value
                .as_i64()
                .or_else(|| value.as_f64().map(|f| f.round() as i64))
                .map(|i| i.to_string()),
            DataType::Double => value.as_f64().map(|f| format_float(f, def.width)),
            DataType::Char | DataType::Date => Some(value.to_string().trim().to_string()),
        };
        let Some(s) = formatted else {
            warn!("{koaid}: {} = '{value}' isn't a valid {}", def.name, def.datatype);
            return NULL.to_string();
        };
        if s.chars().count() > def.width {
            warn!(
                "{koaid}: {} = '{s}' is wider than its column ({}); truncating",
                def.name, def.width
            );
            return s.chars().take(def.width).collect();
        }
        s
    }

    pub(crate) fn add_row(&mut self, header: &Header, koaid: &str) {
        let cells: Vec<String> = self
            .defs
            .iter()
            .map(|def| {
                let cell = self.cell(def, header.get(&def.name), koaid);
                format!("{cell:>width$}", width = def.width)
            })
            .collect();
        self.rows.push(format!(" {}", cells.join(" ")));
    }

    pub(crate) fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn write(&self, path: &Path) -> Result<(), MetadataError> {
        let mut f = BufWriter::new(File::create(path)?);
        for line in self.header_rows().iter().chain(&self.rows) {
            writeln!(f, "{line}")?;
        }
        f.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use strum::IntoEnumIterator;

    use super::*;

    const DEFS: &str = indoc! {"
        # keyword  type   width null units
        KOAID      char   24    N
        EXPTIME    double 8     Y    sec
        FRAMENO    int    4     Y
        OBJECT     char   6     Y
    "};

    #[test]
    fn test_parse_definitions() {
        let defs = parse_definitions(DEFS, "test").unwrap();
        assert_eq!(defs.len(), 4);
        assert_eq!(defs[1].datatype, DataType::Double);
        assert_eq!(defs[1].units, "sec");
        // Widened to fit "FRAMENO".
        assert_eq!(defs[2].width, 7);
        assert!(!defs[0].nullable);

        assert!(matches!(
            parse_definitions("KOAID char wide N", "test"),
            Err(MetadataError::BadLine { line_num: 1, .. })
        ));
        assert!(matches!(
            parse_definitions("# nothing\n", "test"),
            Err(MetadataError::Empty(_))
        ));
    }

    #[test]
    fn test_rows_use_column_widths() {
        let defs = parse_definitions(DEFS, "test").unwrap();
        let mut table = MetadataTable::new(&defs, &[]);
        let header: Header = [
            ("KOAID", KeyValue::from("HI.20170707.03600.fits")),
            ("EXPTIME", KeyValue::from(1.0 / 3.0)),
            ("OBJECT", KeyValue::from("Andromeda")),
        ]
        .into_iter()
        .collect();
        table.add_row(&header, "HI.20170707.03600.fits");

        let rows = table.header_rows();
        assert_eq!(
            rows[0],
            "|KOAID                   |EXPTIME |FRAMENO|OBJECT|"
        );
        assert_eq!(
            rows[3],
            "|null                    |null    |null   |null  |"
        );
        assert_eq!(
            table.rows[0],
            "   HI.20170707.03600.fits 0.333333    null Androm"
        );
        for row in rows.iter() {
            assert_eq!(row.len(), table.rows[0].len() + 1);
        }
    }

    #[test]
    fn test_builtin_definitions_parse() {
        for instr in Instrument::iter() {
            let defs = load_definitions(instr, None).unwrap();
            assert!(defs.iter().any(|d| d.name == "KOAID"), "{instr}");
            assert!(defs.iter().any(|d| d.name == "PROGID"), "{instr}");
        }
    }
}
