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

//! Pre-send check of the public key published in DNS.
//!
//! Before putting a signing key into service it is useful to confirm that the
//! key record at `<selector>._domainkey.<domain>` actually holds the public
//! half of that key. The signer itself never performs DNS lookups.

#[cfg(feature = "hickory-resolver")]
mod hickory_resolver;

use crate::{
    crypto::{self, CryptoError, SigningKey},
    record::{DkimKeyRecord, DkimKeyRecordParseError},
    signer::SigningConfig,
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    future::Future,
    io::{self, ErrorKind},
    time::Duration,
};
use tokio::time;
use tracing::{debug, trace};

/// A trait for looking up DNS TXT records containing DKIM public key records.
///
/// The error type used here is `std::io::Error`. The following error kinds on
/// the query result are recognised and receive special treatment.
///
/// * `ErrorKind::NotFound` on the query: NXDOMAIN, no key record found
/// * `ErrorKind::TimedOut` on the query: timeout
///
/// The inner, per-record `std::io::Error` can be used to signal errors
/// (parsing, encoding) with individual TXT records.
pub trait LookupTxt: Send + Sync {
    /// The answer consisting of TXT records found.
    type Answer: IntoIterator<Item = io::Result<Vec<u8>>>;
    /// The future resolving to the query’s answer.
    type Query<'a>: Future<Output = io::Result<Self::Answer>> + Send + 'a
    where
        Self: 'a;

    /// Looks up the domain’s TXT records in DNS.
    ///
    /// The domain is passed as an absolute name in A-label (ASCII) format (eg
    /// `selector._domainkey.example.com.`).
    fn lookup_txt(&self, domain: &str) -> Self::Query<'_>;
}

/// An error that occurs when checking the published public key.
#[derive(Debug)]
pub enum KeyCheckError {
    Lookup(io::Error),
    Timeout,
    NoKeyRecord,
    InvalidRecord(DkimKeyRecordParseError),
    /// The record does not allow use of the key for email.
    UnsupportedServiceType,
    InvalidKey(CryptoError),
    /// The published key is not the public half of the signing key.
    KeyMismatch,
}

impl Display for KeyCheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lookup(_) => write!(f, "DNS lookup failed"),
            Self::Timeout => write!(f, "DNS lookup timed out"),
            Self::NoKeyRecord => write!(f, "no key record found"),
            Self::InvalidRecord(_) => write!(f, "invalid key record"),
            Self::UnsupportedServiceType => write!(f, "key record not for use with email"),
            Self::InvalidKey(_) => write!(f, "invalid published key"),
            Self::KeyMismatch => write!(f, "published key does not match signing key"),
        }
    }
}

impl Error for KeyCheckError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Lookup(e) => Some(e),
            Self::InvalidRecord(e) => Some(e),
            Self::InvalidKey(e) => Some(e),
            _ => None,
        }
    }
}

/// Checks that the key record published in DNS for the configured domain and
/// selector contains the public half of the configured signing key.
///
/// On success, the published key record is returned.
pub async fn check_published_key<R, T>(
    resolver: &R,
    config: &SigningConfig<T>,
    timeout: Duration,
) -> Result<DkimKeyRecord, KeyCheckError>
where
    R: LookupTxt + ?Sized,
    T: AsRef<SigningKey>,
{
    // Note the trailing dot: only absolute queries.
    let dname = format!(
        "{}._domainkey.{}.",
        config.selector.to_ascii(),
        config.domain.to_ascii()
    );

    debug!(%dname, "looking up DKIM public key record");

    let txts = match time::timeout(timeout, resolver.lookup_txt(&dname)).await {
        Ok(Ok(txts)) => txts,
        Ok(Err(e)) => {
            return Err(match e.kind() {
                ErrorKind::NotFound => KeyCheckError::NoKeyRecord,
                ErrorKind::TimedOut => KeyCheckError::Timeout,
                _ => KeyCheckError::Lookup(e),
            });
        }
        Err(_) => {
            debug!(%dname, "DNS lookup timed out");
            return Err(KeyCheckError::Timeout);
        }
    };

    let record = select_key_record(txts)?;

    if !record.allows_email() {
        return Err(KeyCheckError::UnsupportedServiceType);
    }

    let published_key =
        crypto::read_rsa_public_key(&record.key_data).map_err(KeyCheckError::InvalidKey)?;

    if published_key != config.key().public_key() {
        return Err(KeyCheckError::KeyMismatch);
    }

    debug!(%dname, "published key matches signing key");

    Ok(record)
}

// Selects the first well-formed key record. If there is none, the error of the
// first ill-formed record is reported.
fn select_key_record<I>(txts: I) -> Result<DkimKeyRecord, KeyCheckError>
where
    I: IntoIterator<Item = io::Result<Vec<u8>>>,
{
    let mut first_error = None;

    for txt in txts {
        let txt = match txt.and_then(|s| {
            String::from_utf8(s).map_err(|_| io::Error::from(ErrorKind::InvalidData))
        }) {
            Ok(txt) => txt,
            Err(e) => {
                trace!("skipping unusable TXT record: {e}");
                continue;
            }
        };

        match txt.parse() {
            Ok(record) => return Ok(record),
            Err(e) => {
                trace!("skipping invalid key record: {e}");
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.map_or(KeyCheckError::NoKeyRecord, KeyCheckError::InvalidRecord))
}
