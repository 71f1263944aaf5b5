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

//! DKIM-Quoted-Printable encoding.
//!
//! See RFC 6376, section 2.11.

use std::fmt::Write;

/// Encodes bytes as a DKIM-Quoted-Printable string.
///
/// The output is ASCII only: non-ASCII bytes, and ASCII characters that are
/// not safe in a tag value (`;`, `=`, whitespace, controls) are written as
/// `=XX` hex octets.
pub fn encode(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len());

    for &b in bytes {
        if is_dkim_safe_char(b) {
            result.push(b.into());
        } else {
            let _ = write!(result, "={b:02X}");
        }
    }

    result
}

fn is_dkim_safe_char(b: u8) -> bool {
    // printable ASCII without ; and =
    matches!(b, b'!'..=b':' | b'<' | b'>'..=b'~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_basic() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"me@example.com"), "me@example.com");
        assert_eq!(encode(b"abc|; d=e"), "abc|=3B=20d=3De");
    }

    #[test]
    fn encode_non_ascii() {
        assert_eq!(encode("我".as_bytes()), "=E6=88=91");
        assert_eq!(encode(b"a\xfe\r\n\tb"), "a=FE=0D=0A=09b");
    }
}
