// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tree-style summaries of a run, and warnings collected while the run is set
//! up.

use std::{borrow::Cow, sync::Mutex};

use log::Level;

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

lazy_static::lazy_static! {
    static ref WARNINGS: Mutex<Vec<Vec<Cow<'static, str>>>> = Mutex::new(vec![]);
}

/// Log blocks of lines under a title, joined by box-drawing characters.
fn draw(level: Level, title: &str, blocks: &[Vec<Cow<'static, str>>]) {
    log::log!(level, "{}", console::style(title).bold());
    let num_blocks = blocks.len();
    for (i_block, block) in blocks.iter().enumerate() {
        let num_lines = block.len();
        for (i_line, line) in block.iter().enumerate() {
            let symbol = match (i_line, i_line + 1 == num_lines, i_block + 1 == num_blocks) {
                (0, false, _) | (0, _, false) => VERTICAL_AND_RIGHT,
                (0, true, true) => UP_AND_RIGHT,
                _ => VERTICAL,
            };
            log::log!(level, "{symbol} {line}");
        }
    }
    log::log!(level, "");
}

pub(crate) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Vec<Cow<'static, str>>>,
}

impl InfoPrinter {
    pub(crate) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: vec![],
        }
    }

    pub(crate) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(crate) fn push_block(&mut self, block: Vec<Cow<'static, str>>) {
        self.blocks.push(block);
    }

    pub(crate) fn display(self) {
        draw(Level::Info, &self.title, &self.blocks);
    }
}

pub(crate) trait Warn {
    fn warn(self);
}

fn push(block: Vec<Cow<'static, str>>) {
    if let Ok(mut warnings) = WARNINGS.lock() {
        warnings.push(block);
    }
}

impl Warn for &'static str {
    fn warn(self) {
        push(vec![self.into()]);
    }
}

impl Warn for String {
    fn warn(self) {
        push(vec![self.into()]);
    }
}

impl Warn for Vec<Cow<'static, str>> {
    fn warn(self) {
        push(self);
    }
}

/// Print out any warnings that have been collected while the run was set up.
/// Nothing is printed if there are none.
pub(crate) fn display_warnings() {
    log::debug!("Displaying warnings");
    let Ok(mut warnings) = WARNINGS.lock() else {
        return;
    };
    if warnings.is_empty() {
        return;
    }
    draw(Level::Warn, "Warnings", &warnings);
    warnings.clear();
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn num_warnings() -> usize {
        WARNINGS.lock().unwrap().len()
    }

    #[test]
    #[serial]
    fn test_warnings_are_collected_then_flushed() {
        display_warnings();
        "first".warn();
        format!("second {}", 2).warn();
        let block: Vec<Cow<'static, str>> = vec!["a block".into(), "of two lines".into()];
        block.warn();
        assert_eq!(num_warnings(), 3);

        display_warnings();
        assert_eq!(num_warnings(), 0);
    }

    #[test]
    #[serial]
    fn test_no_warnings_is_quiet() {
        display_warnings();
        display_warnings();
        assert_eq!(num_warnings(), 0);
    }
}
