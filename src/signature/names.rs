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

use crate::tag_list;
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseDomainError;

impl Display for ParseDomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "could not parse domain name")
    }
}

impl Error for ParseDomainError {}

/// An agent or user identifier.
///
/// This type is used to wrap addresses as used in the i= tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    // [ Local-part ] "@" domain-name
    pub local_part: Option<Box<str>>,
    pub domain_part: DomainName,
}

impl Identity {
    pub fn new(ident: &str) -> Result<Self, ParseDomainError> {
        let (local_part, domain) = ident.rsplit_once('@').ok_or(ParseDomainError)?;

        let local_part = if local_part.is_empty() {
            None
        } else {
            if !is_local_part(local_part) {
                return Err(ParseDomainError);
            }
            Some(local_part.into())
        };

        let domain_part = DomainName::new(domain)?;

        Ok(Self { local_part, domain_part })
    }

    pub fn from_domain(domain_part: DomainName) -> Self {
        Self {
            local_part: None,
            domain_part,
        }
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(local_part) = &self.local_part {
            f.write_str(local_part)?;
        }
        write!(f, "@{}", self.domain_part)
    }
}

// ‘local-part’ is defined in RFC 5321, §4.1.2. Modifications for
// internationalisation are in RFC 6531, §3.3.
fn is_local_part(s: &str) -> bool {
    // See RFC 5321, §4.5.3.1.1.
    if s.len() > 64 {
        return false;
    }

    if s.starts_with('"') {
        is_quoted_string(s)
    } else {
        is_dot_string(s)
    }
}

fn is_quoted_string(s: &str) -> bool {
    fn is_qtext_smtp(c: char) -> bool {
        c == ' ' || c.is_ascii_graphic() && !matches!(c, '"' | '\\') || !c.is_ascii()
    }

    if !(s.len() >= 2 && s.starts_with('"') && s.ends_with('"')) {
        return false;
    }

    let mut escaped = false;
    for c in s[1..(s.len() - 1)].chars() {
        if escaped {
            if !(c == ' ' || c.is_ascii_graphic()) {
                return false;
            }
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if !is_qtext_smtp(c) {
            return false;
        }
    }
    !escaped
}

fn is_dot_string(s: &str) -> bool {
    // See RFC 5322, §3.2.3, with the modifications in RFC 6531, §3.3.
    fn is_atext(c: char) -> bool {
        c.is_ascii_alphanumeric()
            || matches!(
                c,
                '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '/' | '=' | '?' | '^' | '_'
                | '`' | '{' | '|' | '}' | '~'
            )
            || !c.is_ascii()
    }

    s.split('.').all(|atom| !atom.is_empty() && atom.chars().all(is_atext))
}

/// A domain name.
///
/// This type is used to wrap domain names as used in the d= and i= tags.
/// Equivalence comparison is case-insensitive.
#[derive(Clone, Eq)]
pub struct DomainName {
    name: Box<str>,
    ascii: Box<str>,
}

impl DomainName {
    /// Creates a new domain name from the given string.
    ///
    /// The string is validated and then encapsulated as-is. Internationalised
    /// names must be convertible to A-label form.
    pub fn new(s: &str) -> Result<Self, ParseDomainError> {
        if s.ends_with('.') || !is_valid_dns_name(s) {
            return Err(ParseDomainError);
        }

        let ascii = idna::domain_to_ascii(s).map_err(|_| ParseDomainError)?;

        Ok(Self {
            name: s.into(),
            ascii: ascii.into(),
        })
    }

    /// Returns the name in A-label (ASCII) form.
    pub fn to_ascii(&self) -> &str {
        &self.ascii
    }

    /// Returns whether this domain is the given domain or one of its
    /// subdomains, comparing in case-insensitive and IDNA-aware manner.
    pub fn eq_or_subdomain_of(&self, other: &DomainName) -> bool {
        let name = &self.ascii;
        let other = &other.ascii;

        if name.len() == other.len() {
            name.eq_ignore_ascii_case(other)
        } else if name.len() > other.len() {
            let len = name.len() - other.len();
            matches!(name.get(len..), Some(s) if s.eq_ignore_ascii_case(other))
                && matches!(name.get(..len), Some(s) if s.ends_with('.'))
        } else {
            false
        }
    }
}

impl Display for DomainName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &self.name)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl PartialEq for DomainName {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Hash for DomainName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_ascii_lowercase().hash(state);
    }
}

fn is_valid_dns_name(s: &str) -> bool {
    fn is_tld(s: &str) -> bool {
        is_label(s) && !s.chars().all(|c: char| c.is_ascii_digit())
    }

    if !matches!(s.len(), 1..=MAX_DOMAIN_LENGTH) {
        return false;
    }

    let mut labels = s.split('.').rev().peekable();

    if matches!(labels.next(), Some(l) if !is_tld(l)) {
        return false;
    }
    if labels.peek().is_none() {
        return false;
    }

    labels.all(is_label)
}

// tval-char forbids ';', which would end the tag in the signature.
fn is_label(s: &str) -> bool {
    matches!(s.len(), 1..=63)
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.chars().all(|c| tag_list::is_tval_char(c) && c != '.')
}

const MAX_DOMAIN_LENGTH: usize = 253;

/// A selector.
///
/// This type is used to wrap a sequence of labels as used in the s= tag.
/// Equivalence comparison is case-insensitive.
#[derive(Clone, Eq)]
pub struct Selector {
    name: Box<str>,
    ascii: Box<str>,
}

impl Selector {
    /// Creates a new selector from the given string.
    pub fn new(s: &str) -> Result<Self, ParseDomainError> {
        // lenient: allows labels such as "dkim_123"
        if !s.split('.').all(is_label) {
            return Err(ParseDomainError);
        }

        let ascii = idna::domain_to_ascii(s).map_err(|_| ParseDomainError)?;

        Ok(Self {
            name: s.into(),
            ascii: ascii.into(),
        })
    }

    /// Returns the selector in A-label (ASCII) form.
    pub fn to_ascii(&self) -> &str {
        &self.ascii
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &self.name)
    }
}

impl AsRef<str> for Selector {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Hash for Selector {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_ascii_lowercase().hash(state);
    }
}
