// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fast line scanner using SIMD-accelerated byte searching
//!
//! Splits LDraw content on `\n`, dropping a trailing `\r`, so both `\r\n`
//! and `\n` terminated files yield the same lines.

use memchr::memchr;

/// Iterator over the lines of a document with their zero-based index
pub struct LineScanner<'a> {
    content: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> LineScanner<'a> {
    /// Create a new scanner for the given content
    pub fn new(content: &'a str) -> Self {
        // A UTF-8 byte order mark is not part of the first line.
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        Self {
            content,
            pos: 0,
            line: 0,
        }
    }

    /// Number of lines in the content
    pub fn count_lines(content: &str) -> usize {
        LineScanner::new(content).count()
    }
}

impl<'a> Iterator for LineScanner<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.content.as_bytes();
        if self.pos >= bytes.len() {
            return None;
        }

        let start = self.pos;
        let end = match memchr(b'\n', &bytes[start..]) {
            Some(offset) => {
                self.pos = start + offset + 1;
                start + offset
            }
            None => {
                self.pos = bytes.len();
                bytes.len()
            }
        };

        let mut line = &self.content[start..end];
        if let Some(stripped) = line.strip_suffix('\r') {
            line = stripped;
        }
        let idx = self.line;
        self.line += 1;
        Some((idx, line))
    }
}
