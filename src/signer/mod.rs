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

//! Signer and supporting types.

mod config;
mod format;
mod sign;

pub use crate::signer::{
    config::SigningConfig,
    format::{SignatureTagSet, LINE_WIDTH},
    sign::{select_signed_headers, sign},
};

use crate::{
    crypto::CryptoError,
    header::FieldName,
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// An error caused by unusable signing configuration or message input.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ConfigurationError {
    MissingDomain,
    InvalidDomain,
    MissingSelector,
    InvalidSelector,
    InvalidIdentity,
    InvalidHeaderName,
    /// The *i=* domain is neither the *d=* domain nor a subdomain of it.
    IdentityDomainMismatch,
    MissingKey,
    /// No *From* header among the headers to be signed.
    MissingFromHeader,
    /// No parseable *Date* header from which to take the timestamp.
    MissingDate,
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingDomain => write!(f, "no signing domain"),
            Self::InvalidDomain => write!(f, "invalid signing domain"),
            Self::MissingSelector => write!(f, "no selector"),
            Self::InvalidSelector => write!(f, "invalid selector"),
            Self::InvalidIdentity => write!(f, "invalid agent or user identifier"),
            Self::InvalidHeaderName => write!(f, "invalid header name"),
            Self::IdentityDomainMismatch => {
                write!(f, "identity domain not equal to or subdomain of signing domain")
            }
            Self::MissingKey => write!(f, "no signing key"),
            Self::MissingFromHeader => write!(f, "no From header to sign"),
            Self::MissingDate => write!(f, "no valid Date header"),
        }
    }
}

impl Error for ConfigurationError {}

/// An error that occurs when signing a message.
#[derive(Debug)]
pub enum SigningError {
    Configuration(ConfigurationError),
    Crypto(CryptoError),
}

impl Display for SigningError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration error: {e}"),
            Self::Crypto(e) => write!(f, "cryptographic error: {e}"),
        }
    }
}

impl Error for SigningError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::Crypto(e) => Some(e),
        }
    }
}

impl From<ConfigurationError> for SigningError {
    fn from(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }
}

impl From<CryptoError> for SigningError {
    fn from(error: CryptoError) -> Self {
        Self::Crypto(error)
    }
}

/// The result of a successful signing operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningResult {
    /// The header name, always `DKIM-Signature`.
    pub header_name: String,
    /// The folded header value, without the leading space.
    ///
    /// The value is meant to follow the header name and a `": "` separator,
    /// as in [`SigningResult::format_header`].
    pub header_value: String,
    pub signature_data: Box<[u8]>,
    pub body_hash: Box<[u8]>,
    pub signed_headers: Box<[FieldName]>,
    pub timestamp: i64,
}

impl SigningResult {
    /// Formats the complete header line, without final CRLF.
    pub fn format_header(&self) -> String {
        format!("{}: {}", self.header_name, self.header_value)
    }
}
