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
    crypto::SigningKey,
    header::FieldName,
    signature::{
        Canonicalization, CanonicalizationAlgorithm, DomainName, Identity, Selector,
        SignatureAlgorithm,
    },
    signer::{format::LINE_WIDTH, ConfigurationError, SigningError},
};
use std::collections::HashSet;

/// Configuration for creating DKIM signatures.
///
/// The signing key is held through `T`, so one key may be shared read-only
/// between configurations, for example as `Arc<SigningKey>`.
pub struct SigningConfig<T> {
    /// The key to use for producing the cryptographic signature.
    pub signing_key: T,

    /// The signature algorithm to use in the *a=* tag.
    pub algorithm: SignatureAlgorithm,
    /// The canonicalization to use in the *c=* tag.
    pub canonicalization: Canonicalization,
    /// The signing domain to use in the *d=* tag.
    pub domain: DomainName,
    /// The selector to use in the *s=* tag.
    pub selector: Selector,
    /// The agent or user identifier to use in the *i=* tag.
    pub identity: Option<Identity>,
    /// Names of headers never to sign. Comparison is case-insensitive.
    pub excluded_headers: HashSet<FieldName>,
    /// The maximum line width in characters of the formatted signature header.
    pub line_width: usize,
}

impl<T> SigningConfig<T> {
    pub fn new(domain: &str, selector: &str, signing_key: T) -> Result<Self, SigningError> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(ConfigurationError::MissingDomain.into());
        }
        let domain = DomainName::new(domain).map_err(|_| ConfigurationError::InvalidDomain)?;

        let selector = selector.trim();
        if selector.is_empty() {
            return Err(ConfigurationError::MissingSelector.into());
        }
        let selector = Selector::new(selector).map_err(|_| ConfigurationError::InvalidSelector)?;

        Ok(Self {
            signing_key,

            algorithm: SignatureAlgorithm::RsaSha256,
            canonicalization: Canonicalization {
                header: CanonicalizationAlgorithm::Relaxed,
                body: CanonicalizationAlgorithm::Relaxed,
            },
            domain,
            selector,
            identity: None,
            excluded_headers: HashSet::new(),
            line_width: LINE_WIDTH,
        })
    }

    /// Sets the *i=* identity, which must be in the signing domain or one of
    /// its subdomains.
    pub fn with_identity(mut self, identity: &str) -> Result<Self, SigningError> {
        let identity = Identity::new(identity).map_err(|_| ConfigurationError::InvalidIdentity)?;
        self.identity = Some(identity);
        self.validate()?;
        Ok(self)
    }

    /// Adds header names to the set of headers excluded from signing.
    pub fn exclude_headers<I, S>(mut self, names: I) -> Result<Self, SigningError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Box<str>>,
    {
        for name in names {
            let name = FieldName::new(name).map_err(|_| ConfigurationError::InvalidHeaderName)?;
            self.excluded_headers.insert(name);
        }
        Ok(self)
    }

    /// Checks the relations between the configured values.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let Some(identity) = &self.identity {
            if !identity.domain_part.eq_or_subdomain_of(&self.domain) {
                return Err(ConfigurationError::IdentityDomainMismatch);
            }
        }
        Ok(())
    }
}

impl<T: AsRef<SigningKey>> SigningConfig<T> {
    /// Returns the signing key.
    pub fn key(&self) -> &SigningKey {
        self.signing_key.as_ref()
    }
}
