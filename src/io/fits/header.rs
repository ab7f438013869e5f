// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! An in-memory FITS header.
//!
//! Raw instrument headers are read once into a [Header]; every derivation
//! works against it, and only the cards that were set during processing are
//! written back out.

use std::fmt::Display;

use indexmap::{IndexMap, IndexSet};

use crate::constants::NULL;

/// The value of a header card.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl KeyValue {
    /// Parse the value field of a raw header card, as handed out by cfitsio.
    pub fn parse_raw(raw: &str) -> KeyValue {
        let raw = raw.trim();
        if let Some(stripped) = raw.strip_prefix('\'') {
            let inner = stripped.strip_suffix('\'').unwrap_or(stripped);
            return KeyValue::Str(inner.replace("''", "'").trim_end().to_string());
        }
        match raw {
            "T" => return KeyValue::Bool(true),
            "F" => return KeyValue::Bool(false),
            _ => (),
        }
        if let Ok(i) = raw.parse::<i64>() {
            return KeyValue::Int(i);
        }
        if let Ok(f) = raw.replace(['D', 'd'], "E").parse::<f64>() {
            return KeyValue::Float(f);
        }
        KeyValue::Str(raw.to_string())
    }

    /// The value as a float, parsing strings if necessary.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KeyValue::Int(i) => Some(*i as f64),
            KeyValue::Float(f) => Some(*f),
            KeyValue::Str(s) => s.trim().parse().ok(),
            KeyValue::Bool(_) => None,
        }
    }

    /// The value as an integer. Floats are only accepted when they're whole.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KeyValue::Int(i) => Some(*i),
            KeyValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            KeyValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Cards holding the literal null placeholder.
    pub fn is_null(&self) -> bool {
        matches!(self, KeyValue::Str(s) if s == NULL)
    }
}

impl Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyValue::Str(s) => write!(f, "{s}"),
            KeyValue::Int(i) => write!(f, "{i}"),
            KeyValue::Float(v) => write!(f, "{v}"),
            KeyValue::Bool(true) => write!(f, "T"),
            KeyValue::Bool(false) => write!(f, "F"),
        }
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::Str(s.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(s: String) -> Self {
        KeyValue::Str(s)
    }
}

impl From<i64> for KeyValue {
    fn from(i: i64) -> Self {
        KeyValue::Int(i)
    }
}

impl From<u32> for KeyValue {
    fn from(i: u32) -> Self {
        KeyValue::Int(i as i64)
    }
}

impl From<usize> for KeyValue {
    fn from(i: usize) -> Self {
        KeyValue::Int(i as i64)
    }
}

impl From<f64> for KeyValue {
    fn from(f: f64) -> Self {
        KeyValue::Float(f)
    }
}

impl From<bool> for KeyValue {
    fn from(b: bool) -> Self {
        KeyValue::Bool(b)
    }
}

/// A keyword's value with its comment.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub value: KeyValue,
    pub comment: String,
}

#[derive(Debug, Clone, Default)]
pub struct Header {
    cards: IndexMap<String, Card>,

    /// Keys set since the header was read, in the order they were set.
    modified: IndexSet<String>,
}

impl Header {
    pub fn new() -> Header {
        Header::default()
    }

    /// Add a card read from a file. This doesn't count as a modification.
    pub fn push_raw(&mut self, key: &str, raw_value: &str, comment: &str) {
        self.cards.insert(
            key.trim().to_uppercase(),
            Card {
                value: KeyValue::parse_raw(raw_value),
                comment: comment.trim().to_string(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cards.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&KeyValue> {
        self.cards.get(key).map(|c| &c.value)
    }

    /// The value of a key as a trimmed string. Empty strings count as
    /// missing.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.to_string().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(KeyValue::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(KeyValue::as_i64)
    }

    /// Interpret a key as a boolean. Instruments are inconsistent, so logical
    /// cards, integers, and strings like "closed"/"open" are all accepted.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            KeyValue::Bool(b) => Some(*b),
            KeyValue::Int(i) => Some(*i != 0),
            KeyValue::Float(f) => Some(*f != 0.0),
            KeyValue::Str(s) => match s.trim().to_lowercase().as_str() {
                "t" | "true" | "yes" | "on" | "in" | "closed" | "1" => Some(true),
                "f" | "false" | "no" | "off" | "out" | "open" | "0" => Some(false),
                _ => None,
            },
        }
    }

    /// The first of several keys that has a value.
    pub fn get_first_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get_str(k))
    }

    /// Set a card, keeping the existing comment when none is given.
    pub fn set<V: Into<KeyValue>>(&mut self, key: &str, value: V, comment: &str) {
        let key = key.to_uppercase();
        let comment = if comment.is_empty() {
            self.cards
                .get(&key)
                .map(|c| c.comment.clone())
                .unwrap_or_default()
        } else {
            comment.to_string()
        };
        self.cards.insert(
            key.clone(),
            Card {
                value: value.into(),
                comment,
            },
        );
        self.modified.insert(key);
    }

    /// Set a card to the null placeholder.
    pub fn set_null(&mut self, key: &str, comment: &str) {
        self.set(key, NULL, comment);
    }

    /// Set a float, or null if it's not available.
    pub fn set_f64_or_null(&mut self, key: &str, value: Option<f64>, comment: &str) {
        match value {
            Some(v) if v.is_finite() => self.set(key, v, comment),
            _ => self.set_null(key, comment),
        }
    }

    /// Cards set since the header was read.
    pub fn modified(&self) -> impl Iterator<Item = (&str, &Card)> {
        self.modified
            .iter()
            .filter_map(|k| self.cards.get(k).map(|c| (k.as_str(), c)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Card)> {
        self.cards.iter().map(|(k, c)| (k.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Build a header from key-value pairs. Handy for tests; nothing is marked as
/// modified.
impl<K: AsRef<str>, V: Into<KeyValue>> FromIterator<(K, V)> for Header {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut header = Header::new();
        for (k, v) in iter {
            header.cards.insert(
                k.as_ref().to_uppercase(),
                Card {
                    value: v.into(),
                    comment: String::new(),
                },
            );
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_values() {
        assert_eq!(
            KeyValue::parse_raw("'HIRES   '"),
            KeyValue::Str("HIRES".to_string())
        );
        assert_eq!(
            KeyValue::parse_raw("'O''Meara'"),
            KeyValue::Str("O'Meara".to_string())
        );
        assert_eq!(KeyValue::parse_raw("T"), KeyValue::Bool(true));
        assert_eq!(KeyValue::parse_raw("  42"), KeyValue::Int(42));
        assert_eq!(KeyValue::parse_raw("-4.38"), KeyValue::Float(-4.38));
        assert_eq!(KeyValue::parse_raw("1.5D+03"), KeyValue::Float(1500.0));
    }

    #[test]
    fn test_set_tracks_modifications() {
        let mut header: Header = [("INSTRUME", "HIRES"), ("OUTFILE", "hi")]
            .into_iter()
            .collect();
        assert_eq!(header.modified().count(), 0);
        header.set("koaid", "HI.20170707.03600.fits", "KOA: Data file name");
        header.set_null("WAVERED", "");
        let modified: Vec<&str> = header.modified().map(|(k, _)| k).collect();
        assert_eq!(modified, ["KOAID", "WAVERED"]);
        assert!(header.get("WAVERED").unwrap().is_null());
        assert_eq!(
            header.get_str("KOAID").as_deref(),
            Some("HI.20170707.03600.fits")
        );
    }

    #[test]
    fn test_typed_getters() {
        let mut header = Header::new();
        header.push_raw("EXPTIME", "  300.0", "");
        header.push_raw("DARKCLOS", "'closed'", "");
        header.push_raw("FRAMENO", "'12'", "");
        header.push_raw("OBJECT", "''", "");
        assert_eq!(header.get_i64("EXPTIME"), Some(300));
        assert_eq!(header.get_i64("FRAMENO"), Some(12));
        assert_eq!(header.get_bool("DARKCLOS"), Some(true));
        assert_eq!(header.get_str("OBJECT"), None);
        assert_eq!(
            header.get_first_str(&["OBJECT", "FRAMENO"]).as_deref(),
            Some("12")
        );
    }
}
