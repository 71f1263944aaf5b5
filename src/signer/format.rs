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

use crate::{
    header::FieldName,
    quoted_printable,
    signature::{Identity, DKIM_SIGNATURE_NAME},
    signer::SigningConfig,
    util::{self, CanonicalStr},
};

// Note: Careful with offsets: formatting works with *characters*, not bytes!

/// The default maximum line width of the formatted header.
pub const LINE_WIDTH: usize = 67;

// Continuation lines start with tab and space, counted as two columns.
const FOLD: &str = "\r\n\t ";
const INDENT_WIDTH: usize = 2;

/// The ordered tag set of a DKIM signature under construction.
///
/// Tags are kept as a list in output order `v, a, c, d, s, t, [i], bh, h`.
/// The *b=* tag is not part of the set: it is appended empty when formatting,
/// and the signature is later appended as literal text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignatureTagSet {
    tags: Vec<(&'static str, String)>,
}

impl SignatureTagSet {
    pub fn build<T>(
        config: &SigningConfig<T>,
        signed_headers: &[FieldName],
        body_hash: &[u8],
        timestamp: i64,
    ) -> Self {
        debug_assert!(!signed_headers.is_empty());

        let domain = select_str_form(&config.domain, config.domain.to_ascii());
        let selector = select_str_form(&config.selector, config.selector.to_ascii());

        let mut tags = Vec::with_capacity(9);

        tags.push(("v", "1".into()));
        tags.push(("a", config.algorithm.canonical_str().into()));
        tags.push(("c", config.canonicalization.canonical_str().into()));
        tags.push(("d", domain.into()));
        tags.push(("s", selector.into()));
        tags.push(("t", timestamp.to_string()));
        if let Some(identity) = &config.identity {
            tags.push(("i", format_identity(identity)));
        }
        tags.push(("bh", util::encode_base64(body_hash)));

        let names: Vec<_> = signed_headers.iter().map(|n| n.as_ref()).collect();
        tags.push(("h", names.join(":")));

        Self { tags }
    }

    pub fn tags(&self) -> &[(&'static str, String)] {
        &self.tags
    }

    /// Formats the header value, folded at the given width, ending in an
    /// empty *b=* tag on a line of its own.
    pub fn format_without_signature(&self, line_width: usize) -> String {
        // the value starts after "DKIM-Signature: "
        let mut folder = Folder::new(line_width, DKIM_SIGNATURE_NAME.len() + 2);

        for (name, value) in &self.tags {
            if *name == "h" {
                folder.push_tag_h(value);
            } else {
                folder.push(TAG_SEPARATOR, &format!("{name}={value};"), 0);
            }
        }

        folder.fold();
        folder.push_raw("b=");

        folder.out
    }
}

/// Appends the Base64-encoded signature to a header value produced by
/// [`SignatureTagSet::format_without_signature`].
pub fn append_signature(formatted: String, signature_data: &[u8], line_width: usize) -> String {
    debug_assert!(formatted.ends_with("\r\n\t b="));

    let mut folder = Folder {
        out: formatted,
        column: INDENT_WIDTH + 2,
        width: line_width,
        line_start: false,
    };

    folder.push_chunks(&util::encode_base64(signature_data));

    folder.out
}

fn format_identity(identity: &Identity) -> String {
    let domain = &identity.domain_part;
    let d = select_str_form(domain, domain.to_ascii());

    match &identity.local_part {
        Some(l) => format!("{}@{d}", quoted_printable::encode(l.as_bytes())),
        None => format!("@{d}"),
    }
}

// Pick A-label form only if it differs from the original further than in
// ASCII case.
fn select_str_form<'a>(orig: &'a impl AsRef<str>, ascii: &'a str) -> &'a str {
    if orig.as_ref().eq_ignore_ascii_case(ascii) {
        orig.as_ref()
    } else {
        ascii
    }
}

/// What goes between two atoms: `inline` if both stay on the same line,
/// `at_break` at the end of the line if a fold is needed.
#[derive(Clone, Copy)]
struct Separator {
    inline: &'static str,
    at_break: &'static str,
}

const TAG_SEPARATOR: Separator = Separator { inline: " ", at_break: "" };
const NAME_SEPARATOR: Separator = Separator { inline: ":", at_break: ":" };

/// Greedy line packing of atoms that are never split.
struct Folder {
    out: String,
    column: usize,
    width: usize,
    line_start: bool,
}

impl Folder {
    fn new(width: usize, column: usize) -> Self {
        Self {
            out: String::new(),
            column,
            width,
            line_start: true,
        }
    }

    /// Appends an atom. `reserve` columns are kept free behind the atom for
    /// a separator that must stay on the same line.
    fn push(&mut self, sep: Separator, atom: &str, reserve: usize) {
        let len = atom.chars().count();

        if self.line_start {
            self.push_raw(atom);
        } else if self.column + sep.inline.len() + len + reserve <= self.width {
            self.push_raw(sep.inline);
            self.push_raw(atom);
        } else {
            self.push_raw(sep.at_break);
            self.fold();
            self.push_raw(atom);
        }
    }

    fn push_tag_h(&mut self, value: &str) {
        let mut names = value.split(':');

        if let Some(first) = names.next() {
            self.push(TAG_SEPARATOR, &format!("h={first}"), 1);
        }
        for name in names {
            self.push(NAME_SEPARATOR, name, 1);
        }

        self.push_raw(";");
    }

    /// Appends a string that may be broken anywhere, filling lines.
    fn push_chunks(&mut self, mut s: &str) {
        debug_assert!(s.is_ascii());

        while !s.is_empty() {
            if !self.line_start && self.column >= self.width {
                self.fold();
            }

            // no empty chunks
            let room = self.width.saturating_sub(self.column).max(1);
            let (chunk, rest) = s.split_at(room.min(s.len()));
            self.push_raw(chunk);
            s = rest;
        }
    }

    fn push_raw(&mut self, s: &str) {
        if !s.is_empty() {
            self.out.push_str(s);
            self.column += s.chars().count();
            self.line_start = false;
        }
    }

    fn fold(&mut self) {
        self.out.push_str(FOLD);
        self.column = INDENT_WIDTH;
        self.line_start = true;
    }
}
