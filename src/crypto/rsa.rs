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

use crate::crypto::{CryptoError, CryptoErrorKind, HashAlgorithm};
use rsa::{
    pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, traits::PublicKeyParts, Pkcs1v15Sign,
    RsaPrivateKey, RsaPublicKey,
};
use sha2::Sha256;

/// The minimum RSA key size in bits, see RFC 8301, section 3.2.
pub const MIN_KEY_BITS: usize = 1024;

pub fn get_public_key_size(public_key: &RsaPublicKey) -> usize {
    public_key.n().bits()
}

/// Reads an RSA public key as found in the p= tag of a key record.
pub fn read_rsa_public_key(key_data: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    // first try reading data as SubjectPublicKeyInfo, the de facto format in
    // DNS, then as RSAPublicKey
    RsaPublicKey::from_public_key_der(key_data)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(key_data))
        .map_err(|e| CryptoError::with_source(CryptoErrorKind::InvalidKey, e))
}

/// Signs a message digest with PKCS#1 v1.5 padding.
///
/// The signature is deterministic: the same key and digest always produce the
/// same signature bytes.
pub fn sign_rsa(
    hash_alg: HashAlgorithm,
    private_key: &RsaPrivateKey,
    digest: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let public_key = private_key.to_public_key();
    if get_public_key_size(&public_key) < MIN_KEY_BITS {
        return Err(CryptoError::new(CryptoErrorKind::InsufficientKeySize));
    }

    let result = match hash_alg {
        HashAlgorithm::Sha256 => private_key.sign(Pkcs1v15Sign::new::<Sha256>(), digest),
    };

    result.map_err(|e| CryptoError::with_source(CryptoErrorKind::SigningFailure, e))
}
