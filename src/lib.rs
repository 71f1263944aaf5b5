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

//! A library for signing outgoing email messages with *DomainKeys Identified
//! Mail* (DKIM) signatures, as described in [RFC 6376].
//!
//! The signing pipeline takes a composed [`Message`] and a [`SigningConfig`]
//! and produces the exact wire bytes of the signed message, with the
//! *DKIM-Signature* header placed first. Signatures use the *rsa-sha256*
//! algorithm with *simple* or *relaxed* header and body canonicalization.
//!
//! The building blocks of the pipeline are public too: canonicalization in
//! module `canonicalize`, the tag set and signature computation in module
//! `signer`. Module `keycheck` offers a separate, asynchronous check that the
//! public key published in DNS matches the signing key.
//!
//! # Usage
//!
//! ```
//! use dkimsign::{message, Message, SigningConfig, SigningKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pem = std::fs::read_to_string("tests/keys/rsa2048.pem")?;
//! let key = SigningKey::from_pem(&pem)?;
//!
//! let config = SigningConfig::new("example.com", "sel1", key)?;
//!
//! let message = Message::parse(b"From: me@example.com\r\n\
//!     To: you@example.org\r\n\
//!     Subject: Thursday 8pm\r\n\
//!     \r\n\
//!     Ready for tonight?\r\n")?;
//!
//! let signed = message::serialize(&message, Some(&config))?;
//!
//! assert!(signed.starts_with(b"DKIM-Signature: v=1; a=rsa-sha256; c=relaxed/relaxed;"));
//! # Ok(())
//! # }
//! ```
//!
//! # Cargo features
//!
//! The feature **`hickory-resolver`** makes an implementation of
//! [`LookupTxt`][crate::keycheck::LookupTxt] available for the Hickory DNS
//! resolver.
//!
//! [RFC 6376]: https://www.rfc-editor.org/rfc/rfc6376

pub mod canonicalize;
pub mod crypto;
pub mod header;
pub mod keycheck;
pub mod message;
mod parse;
pub mod quoted_printable;
pub mod record;
pub mod signature;
pub mod signer;
mod tag_list;
mod util;

pub use crate::{
    crypto::SigningKey,
    header::{FieldBody, FieldName, HeaderField, HeaderFields},
    message::Message,
    signature::{Canonicalization, CanonicalizationAlgorithm, DomainName, Selector},
    signer::{ConfigurationError, SigningConfig, SigningError, SigningResult},
    util::{decode_base64, encode_base64, Base64Error, CanonicalStr},
};
