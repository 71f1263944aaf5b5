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

//! Representation of email header data.
//!
//! Header fields are kept in logical form: a name, and a value that follows the
//! `": "` separator of the transmitted header line. A value may contain folding
//! line breaks (CRLF followed by whitespace), but no other CR or LF characters.

use crate::parse::{is_wsp, CRLF};
use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

/// A header field, consisting of a name and a value.
pub type HeaderField = (FieldName, FieldBody);

/// An error that occurs when constructing header data.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct HeaderFieldError;

impl Display for HeaderFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid header field")
    }
}

impl Error for HeaderFieldError {}

/// An ordered, non-empty collection of header fields.
///
/// Order is significant and is never changed: the order determines both the
/// order of header lines on the wire and the order of signed headers.
/// Duplicate names are allowed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeaderFields(Vec<HeaderField>);

impl HeaderFields {
    pub fn new(value: impl Into<Vec<HeaderField>>) -> Result<Self, HeaderFieldError> {
        let value = value.into();
        if value.is_empty() {
            return Err(HeaderFieldError);
        }
        Ok(Self(value))
    }

    pub fn from_vec(value: Vec<(String, String)>) -> Result<Self, HeaderFieldError> {
        let value: Vec<_> = value
            .into_iter()
            .map(|(name, value)| {
                let name = FieldName::new(name)?;
                let body = FieldBody::new(value)?;
                Ok((name, body))
            })
            .collect::<Result<_, _>>()?;
        Self::new(value)
    }

    /// Returns the value of the first header field with the given name.
    pub fn get(&self, name: &str) -> Option<&FieldBody> {
        self.0
            .iter()
            .find_map(|(n, v)| if *n == name { Some(v) } else { None })
    }

    /// Appends a header field at the end.
    pub fn push(&mut self, field: HeaderField) {
        self.0.push(field);
    }

    /// Replaces the header field at the given position, returning the old
    /// field, or `None` if there is no such position.
    pub fn replace(&mut self, index: usize, field: HeaderField) -> Option<HeaderField> {
        self.0.get_mut(index).map(|f| std::mem::replace(f, field))
    }
}

impl AsRef<[HeaderField]> for HeaderFields {
    fn as_ref(&self) -> &[HeaderField] {
        &self.0
    }
}

impl From<HeaderFields> for Vec<HeaderField> {
    fn from(header_fields: HeaderFields) -> Self {
        header_fields.0
    }
}

impl FromStr for HeaderFields {
    type Err = HeaderFieldError;

    /// Parses a header block, with either CRLF or LF line endings.
    ///
    /// Continuation lines of folded header fields are recorded with CRLF line
    /// breaks in the field value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields: Vec<(FieldName, String)> = vec![];

        let s = s.strip_suffix('\n').unwrap_or(s);
        let s = s.strip_suffix('\r').unwrap_or(s);

        for line in s.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);

            if line.starts_with(is_wsp) {
                let (_, value) = fields.last_mut().ok_or(HeaderFieldError)?;
                value.push_str(CRLF);
                value.push_str(line);
            } else {
                let (name, value) = line.split_once(':').ok_or(HeaderFieldError)?;
                let name = FieldName::new(name)?;
                let value = value.strip_prefix(' ').unwrap_or(value);
                fields.push((name, value.into()));
            }
        }

        let fields: Vec<_> = fields
            .into_iter()
            .map(|(name, value)| Ok((name, FieldBody::new(value)?)))
            .collect::<Result<_, _>>()?;

        Self::new(fields)
    }
}

/// A header field name.
///
/// Comparison is case-insensitive.
#[derive(Clone, Eq)]
pub struct FieldName(Box<str>);

impl FieldName {
    pub fn new(value: impl Into<Box<str>>) -> Result<Self, HeaderFieldError> {
        let value = value.into();
        if value.is_empty() {
            return Err(HeaderFieldError);
        }
        // ';' is a legal header name character, but cannot be listed in h=
        if !value.chars().all(|c| c.is_ascii_graphic() && c != ':' && c != ';') {
            return Err(HeaderFieldError);
        }
        Ok(Self(value))
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for FieldName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl PartialEq for FieldName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl PartialEq<&str> for FieldName {
    fn eq(&self, other: &&str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl PartialEq<str> for FieldName {
    fn eq(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl Hash for FieldName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

/// A header field value.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct FieldBody(Box<str>);

impl FieldBody {
    pub fn new(value: impl Into<Box<str>>) -> Result<Self, HeaderFieldError> {
        let value = value.into();

        // no stray CR and LF
        if value.split(CRLF).any(|line| line.contains(['\r', '\n'])) {
            return Err(HeaderFieldError);
        }
        // only folded continuation lines, no trailing CRLF
        if !value.split(CRLF).skip(1).all(|line| line.starts_with(is_wsp)) {
            return Err(HeaderFieldError);
        }

        Ok(Self(value))
    }
}

impl AsRef<str> for FieldBody {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for FieldBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for FieldBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldBody").field(&self.0).finish()
    }
}
