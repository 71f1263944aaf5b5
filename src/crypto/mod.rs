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

//! Cryptographic utilities.
//!
//! # RSA public keys in DNS
//!
//! RFC 6376, section 3.6.1 states that the p= tag of a key record contains an
//! RSA public key in format RSAPublicKey (RFC 3447). However, the example in
//! appendix C installs a key in format SubjectPublicKeyInfo (RFC 5280), and it
//! is the second format that implementers have taken up. Public keys are
//! therefore read as SubjectPublicKeyInfo first, with RSAPublicKey as a
//! fallback.

mod hash;
mod rsa;

pub use self::{
    hash::digest_slices,
    rsa::{get_public_key_size, read_rsa_public_key, sign_rsa, MIN_KEY_BITS},
};

use crate::{
    signer::{ConfigurationError, SigningError},
    util::CanonicalStr,
};
use ::rsa::{
    pkcs1::DecodeRsaPrivateKey, pkcs8::DecodePrivateKey, RsaPrivateKey, RsaPublicKey,
};
use pkcs8::{der::pem::PemLabel, Document, PrivateKeyInfo};
use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
};
use tracing::trace;

const PKCS1_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";

/// An RSA private key used for signing.
pub struct SigningKey {
    private_key: RsaPrivateKey,
}

impl SigningKey {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }

    /// Reads a private key from a PEM document, either in PKCS#8 format
    /// (`PRIVATE KEY`) or in PKCS#1 format (`RSA PRIVATE KEY`).
    pub fn from_pem(s: &str) -> Result<Self, SigningError> {
        if s.trim().is_empty() {
            return Err(ConfigurationError::MissingKey.into());
        }

        let (label, der) = Document::from_pem(s.trim())
            .map_err(|e| CryptoError::with_source(CryptoErrorKind::InvalidKey, e))?;

        trace!(label, "reading private key PEM document");

        let private_key = if label == PKCS1_PRIVATE_KEY_LABEL {
            RsaPrivateKey::from_pkcs1_der(der.as_bytes())
                .map_err(|e| CryptoError::with_source(CryptoErrorKind::InvalidKey, e))?
        } else {
            // the label error type carries no std::error::Error impl
            PrivateKeyInfo::validate_pem_label(label)
                .map_err(|_| CryptoError::new(CryptoErrorKind::InvalidKey))?;
            RsaPrivateKey::from_pkcs8_der(der.as_bytes())
                .map_err(|e| CryptoError::with_source(CryptoErrorKind::InvalidKey, e))?
        };

        Ok(Self::new(private_key))
    }

    /// Reads a private key from a PEM document in PKCS#8 format.
    pub fn from_pkcs8_pem(s: &str) -> Result<Self, SigningError> {
        if s.trim().is_empty() {
            return Err(ConfigurationError::MissingKey.into());
        }

        let private_key = RsaPrivateKey::from_pkcs8_pem(s.trim())
            .map_err(|e| CryptoError::with_source(CryptoErrorKind::InvalidKey, e))?;

        Ok(Self::new(private_key))
    }

    /// Reads a private key from a PEM document in PKCS#1 format.
    pub fn from_pkcs1_pem(s: &str) -> Result<Self, SigningError> {
        if s.trim().is_empty() {
            return Err(ConfigurationError::MissingKey.into());
        }

        let private_key = RsaPrivateKey::from_pkcs1_pem(s.trim())
            .map_err(|e| CryptoError::with_source(CryptoErrorKind::InvalidKey, e))?;

        Ok(Self::new(private_key))
    }

    /// Returns the key size in bits.
    pub fn key_size(&self) -> usize {
        get_public_key_size(&self.public_key())
    }

    /// Returns the public half of this key.
    pub fn public_key(&self) -> RsaPublicKey {
        self.private_key.to_public_key()
    }

    /// Signs the given digest.
    pub fn sign(&self, hash_alg: HashAlgorithm, digest: &[u8]) -> Result<Vec<u8>, CryptoError> {
        sign_rsa(hash_alg, &self.private_key, digest)
    }
}

impl AsRef<SigningKey> for SigningKey {
    fn as_ref(&self) -> &SigningKey {
        self
    }
}

impl From<RsaPrivateKey> for SigningKey {
    fn from(private_key: RsaPrivateKey) -> Self {
        Self::new(private_key)
    }
}

impl Debug for SigningKey {
    // never print private key material
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_size", &self.key_size())
            .finish_non_exhaustive()
    }
}

/// A hash algorithm.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HashAlgorithm {
    Sha256,
}

impl CanonicalStr for HashAlgorithm {
    fn canonical_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

/// The kind of a cryptographic failure.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CryptoErrorKind {
    InvalidKey,
    InsufficientKeySize,
    SigningFailure,
}

impl Display for CryptoErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey => write!(f, "invalid key data"),
            Self::InsufficientKeySize => write!(f, "key too small"),
            Self::SigningFailure => write!(f, "signing failed"),
        }
    }
}

/// An error that occurs in a cryptographic operation.
///
/// The underlying cause, if any, is available as the error source.
#[derive(Debug)]
pub struct CryptoError {
    pub kind: CryptoErrorKind,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl CryptoError {
    pub fn new(kind: CryptoErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub fn with_source<E>(kind: CryptoErrorKind, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }
}

impl Display for CryptoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.kind, f)
    }
}

impl Error for CryptoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}
