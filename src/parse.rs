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

//! Common parsing utilities.

pub const CRLF: &str = "\r\n";

pub fn strip_suffix<'a>(s: &'a str, suffix: &str) -> &'a str {
    debug_assert!(s.ends_with(suffix));
    &s[..(s.len() - suffix.len())]
}

// FWS = ([*WSP CRLF] 1*WSP)

/// Strips one occurrence of folding whitespace.
pub fn strip_fws(input: &str) -> Option<&str> {
    if let Some(s) = strip_wsp(input) {
        s.strip_prefix(CRLF).and_then(strip_wsp).or(Some(s))
    } else {
        input.strip_prefix(CRLF).and_then(strip_wsp)
    }
}

fn strip_wsp(input: &str) -> Option<&str> {
    input
        .strip_prefix(is_wsp)
        .map(|s| s.trim_start_matches(is_wsp))
}

// RFC 5234, appendix B.1
pub fn is_wsp(c: char) -> bool {
    matches!(c, ' ' | '\t')
}

/// Converts all line breaks (CRLF, lone LF, lone CR) to CRLF.
pub fn normalize_line_breaks(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len() + input.len() / 32);

    let mut bytes = input.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        match b {
            b'\r' => {
                bytes.next_if_eq(&b'\n');
                result.extend(CRLF.bytes());
            }
            b'\n' => result.extend(CRLF.bytes()),
            b => result.push(b),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_fws_ok() {
        assert_eq!(strip_fws(""), None);
        assert_eq!(strip_fws("x"), None);
        assert_eq!(strip_fws(" x"), Some("x"));
        assert_eq!(strip_fws("\r\n"), None);
        assert_eq!(strip_fws(" \r\n"), Some("\r\n"));
        assert_eq!(strip_fws(" \r\n x"), Some("x"));
        assert_eq!(strip_fws("\r\nx"), None);
        assert_eq!(strip_fws("\r\n x"), Some("x"));
    }

    #[test]
    fn normalize_line_breaks_ok() {
        assert_eq!(normalize_line_breaks(b""), b"");
        assert_eq!(normalize_line_breaks(b"a\nb"), b"a\r\nb");
        assert_eq!(normalize_line_breaks(b"a\r\nb\r\n"), b"a\r\nb\r\n");
        assert_eq!(normalize_line_breaks(b"a\rb\n\r"), b"a\r\nb\r\n\r\n");
        assert_eq!(normalize_line_breaks(b"\n\r\n\r"), b"\r\n\r\n\r\n");
    }
}
