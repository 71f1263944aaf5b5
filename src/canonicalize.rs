// dkimsign – DKIM signing of outgoing email messages
// Copyright © 2022–2023 David Bürgin <dbuergin@gluet.ch>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Canonicalization utilities.

use crate::{
    header::HeaderField,
    parse::{self, CRLF},
    signature::CanonicalizationAlgorithm,
};

const SP: u8 = b' ';

/// Canonicalizes a single header field.
///
/// The result carries no line terminator.
pub fn canonicalize_header(
    algorithm: CanonicalizationAlgorithm,
    name: impl AsRef<str>,
    value: impl AsRef<str>,
) -> String {
    let name = name.as_ref();
    let value = value.as_ref();

    match algorithm {
        CanonicalizationAlgorithm::Simple => {
            let mut result = String::with_capacity(name.len() + value.len() + 2);
            result.push_str(name);
            result.push_str(": ");
            result.push_str(value);
            result
        }
        CanonicalizationAlgorithm::Relaxed => {
            let mut result = name.trim().to_ascii_lowercase();
            result.push(':');
            canonicalize_header_relaxed(&mut result, value);
            result
        }
    }
}

fn canonicalize_header_relaxed(result: &mut String, value: &str) {
    fn is_space(c: char) -> bool {
        matches!(c, ' ' | '\t' | '\r' | '\n')
    }

    let value = value.trim_matches(is_space);

    let mut compressing = false;
    for c in value.chars() {
        if is_space(c) {
            if !compressing {
                result.push(' ');
                compressing = true;
            }
        } else {
            result.push(c);
            compressing = false;
        }
    }
}

/// Produces the header canonicalization result for the given header fields,
/// each line terminated with CRLF, in the order given.
pub fn canonicalize_headers<'a, I>(algorithm: CanonicalizationAlgorithm, headers: I) -> String
where
    I: IntoIterator<Item = &'a HeaderField>,
{
    let mut result = String::new();

    for (name, value) in headers {
        result.push_str(&canonicalize_header(algorithm, name, value));
        result.push_str(CRLF);
    }

    result
}

/// A canonicalizer using the body canonicalization algorithm.
///
/// Input is consumed line by line. Empty lines are held back until a
/// non-empty line follows, so that trailing empty lines never reach the
/// output.
pub struct BodyCanonicalizer {
    kind: CanonicalizationAlgorithm,
    result: Vec<u8>,
    empty_lines: usize,
    any_content: bool,
}

impl BodyCanonicalizer {
    pub fn new(kind: CanonicalizationAlgorithm) -> Self {
        Self {
            kind,
            result: vec![],
            empty_lines: 0,
            any_content: false,
        }
    }

    /// Feeds one line, given without its line terminator.
    pub fn canon_line(&mut self, line: &[u8]) {
        let line = match self.kind {
            CanonicalizationAlgorithm::Simple => line.to_vec(),
            CanonicalizationAlgorithm::Relaxed => {
                // first drop whitespace at end of line, then compress the rest
                let line = strip_trailing_wsp(line);
                compress_wsp(line)
            }
        };

        if line.is_empty() {
            self.empty_lines += 1;
            return;
        }

        for _ in 0..self.empty_lines {
            self.result.extend(CRLF.bytes());
        }
        self.empty_lines = 0;
        self.any_content = true;

        self.result.extend(line);
        self.result.extend(CRLF.bytes());
    }

    pub fn finish_canon(self) -> Vec<u8> {
        if self.any_content {
            return self.result;
        }

        match self.kind {
            // empty body is CRLF
            CanonicalizationAlgorithm::Simple => CRLF.into(),
            CanonicalizationAlgorithm::Relaxed => vec![],
        }
    }
}

/// Canonicalizes a complete message body.
///
/// Line breaks are first normalized to CRLF, so that lone CR and LF count as
/// line breaks.
pub fn canonicalize_body(algorithm: CanonicalizationAlgorithm, body: &[u8]) -> Vec<u8> {
    let body = parse::normalize_line_breaks(body);

    let mut canon = BodyCanonicalizer::new(algorithm);

    if !body.is_empty() {
        // a final line without line break counts as a line
        let body = body.strip_suffix(b"\r\n").unwrap_or(&body);
        for line in body.split(|&b| b == b'\n') {
            canon.canon_line(line.strip_suffix(b"\r").unwrap_or(line));
        }
    }

    canon.finish_canon()
}

fn is_wsp(b: u8) -> bool {
    matches!(b, b' ' | b'\t')
}

fn strip_trailing_wsp(line: &[u8]) -> &[u8] {
    let len = line.iter().rposition(|&b| !is_wsp(b)).map_or(0, |i| i + 1);
    &line[..len]
}

fn compress_wsp(line: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(line.len());

    let mut compressing = false;
    for &b in line {
        if is_wsp(b) {
            if !compressing {
                result.push(SP);
                compressing = true;
            }
        } else {
            result.push(b);
            compressing = false;
        }
    }

    result
}
