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
    canonicalize,
    crypto::{self, SigningKey},
    header::{FieldName, HeaderField, HeaderFields},
    message,
    signature::DKIM_SIGNATURE_NAME,
    signer::{
        format::{self, SignatureTagSet},
        ConfigurationError, SigningConfig, SigningError, SigningResult,
    },
};
use tracing::trace;

/// Selects the headers to sign: all headers except excluded ones and
/// existing *DKIM-Signature* headers, in their original order.
pub fn select_signed_headers<'a, T>(
    config: &SigningConfig<T>,
    headers: &'a HeaderFields,
) -> Vec<&'a HeaderField> {
    headers
        .as_ref()
        .iter()
        .filter(|(name, _)| *name != DKIM_SIGNATURE_NAME && !config.excluded_headers.contains(name))
        .collect()
}

/// Computes a DKIM signature for a message.
///
/// `canonical_body` is the message body after body canonicalization with the
/// configured algorithm. The timestamp of the *t=* tag is taken from the
/// *Date* header, which must be present.
pub fn sign<T>(
    config: &SigningConfig<T>,
    headers: &HeaderFields,
    canonical_body: &[u8],
) -> Result<SigningResult, SigningError>
where
    T: AsRef<SigningKey>,
{
    config.validate()?;

    let selected_headers = select_signed_headers(config, headers);

    if !selected_headers.iter().any(|(name, _)| *name == "From") {
        return Err(ConfigurationError::MissingFromHeader.into());
    }

    let timestamp = headers
        .get("Date")
        .and_then(|date| message::parse_date(date.as_ref()))
        .ok_or(ConfigurationError::MissingDate)?
        .timestamp();

    let signed_headers: Vec<FieldName> = selected_headers
        .iter()
        .map(|(name, _)| name.clone())
        .collect();

    trace!(?signed_headers, "selected headers to sign");

    let hash_alg = config.algorithm.hash_algorithm();
    let canon_alg = config.canonicalization.header;

    let body_hash = crypto::digest_slices(hash_alg, [canonical_body]);

    let tag_set = SignatureTagSet::build(config, &signed_headers, &body_hash, timestamp);
    let unsigned_value = tag_set.format_without_signature(config.line_width);

    // signed headers, each with CRLF, then the signature header itself without
    let mut data = canonicalize::canonicalize_headers(canon_alg, selected_headers);
    data.push_str(&canonicalize::canonicalize_header(
        canon_alg,
        DKIM_SIGNATURE_NAME,
        &unsigned_value,
    ));

    let data_hash = crypto::digest_slices(hash_alg, [data.as_bytes()]);

    let signature_data = match config.key().sign(hash_alg, &data_hash) {
        Ok(s) => {
            trace!("RSA signing successful");
            s
        }
        Err(e) => {
            trace!("RSA signing failed: {e}");
            return Err(e.into());
        }
    };

    let header_value = format::append_signature(unsigned_value, &signature_data, config.line_width);

    Ok(SigningResult {
        header_name: DKIM_SIGNATURE_NAME.into(),
        header_value,
        signature_data: signature_data.into(),
        body_hash,
        signed_headers: signed_headers.into(),
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{CryptoError, CryptoErrorKind};

    const PRIVATE_KEY: &str = include_str!("../../tests/keys/rsa2048.pem");
    const SMALL_KEY: &str = include_str!("../../tests/keys/rsa512.pem");

    fn make_config(key: &str) -> SigningConfig<SigningKey> {
        let key = SigningKey::from_pem(key).unwrap();
        SigningConfig::new("example.com", "sel1", key).unwrap()
    }

    fn make_headers(headers: &[(&str, &str)]) -> HeaderFields {
        HeaderFields::from_vec(
            headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn select_signed_headers_ok() {
        let mut config = SigningConfig::new("example.com", "sel1", ()).unwrap();
        config.excluded_headers.insert(FieldName::new("received").unwrap());

        let headers = make_headers(&[
            ("DKIM-Signature", "v=1; old"),
            ("Received", "from a"),
            ("From", "me@example.com"),
            ("To", "you@example.org"),
            ("Received", "from b"),
            ("to", "them@example.org"),
        ]);

        let names: Vec<_> = select_signed_headers(&config, &headers)
            .into_iter()
            .map(|(n, _)| n.as_ref())
            .collect();

        assert_eq!(names, ["From", "To", "to"]);
    }

    #[test]
    fn sign_ok() {
        let config = make_config(PRIVATE_KEY);
        let headers = make_headers(&[
            ("From", "me@example.com"),
            ("Date", "Fri, 9 Jun 2023 16:13:12 +0200"),
        ]);

        let result = sign(&config, &headers, b"").unwrap();

        assert_eq!(result.header_name, "DKIM-Signature");
        assert_eq!(result.timestamp, 1686319992);
        assert_eq!(result.signature_data.len(), 256);
        assert!(result.header_value.starts_with(
            "v=1; a=rsa-sha256; c=relaxed/relaxed;\r\n\t d=example.com; s=sel1; t=1686319992;"
        ));
        assert!(result.header_value.contains("h=From:Date;\r\n\t b="));
        assert_eq!(
            util_b64(&result.body_hash),
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
    }

    #[test]
    fn sign_missing_from() {
        let config = make_config(PRIVATE_KEY);
        let headers = make_headers(&[
            ("To", "you@example.org"),
            ("Date", "Fri, 9 Jun 2023 16:13:12 +0200"),
        ]);

        let result = sign(&config, &headers, b"");

        assert!(matches!(
            result,
            Err(SigningError::Configuration(ConfigurationError::MissingFromHeader))
        ));
    }

    #[test]
    fn sign_excluded_from() {
        let mut config = make_config(PRIVATE_KEY);
        config.excluded_headers.insert(FieldName::new("FROM").unwrap());
        let headers = make_headers(&[
            ("From", "me@example.com"),
            ("Date", "Fri, 9 Jun 2023 16:13:12 +0200"),
        ]);

        let result = sign(&config, &headers, b"");

        assert!(matches!(
            result,
            Err(SigningError::Configuration(ConfigurationError::MissingFromHeader))
        ));
    }

    #[test]
    fn sign_missing_date() {
        let config = make_config(PRIVATE_KEY);
        let headers = make_headers(&[("From", "me@example.com"), ("Date", "yesterday")]);

        let result = sign(&config, &headers, b"");

        assert!(matches!(
            result,
            Err(SigningError::Configuration(ConfigurationError::MissingDate))
        ));
    }

    #[test]
    fn sign_small_key() {
        let config = make_config(SMALL_KEY);
        let headers = make_headers(&[
            ("From", "me@example.com"),
            ("Date", "Fri, 9 Jun 2023 16:13:12 +0200"),
        ]);

        let result = sign(&config, &headers, b"");

        assert!(matches!(
            result,
            Err(SigningError::Crypto(CryptoError {
                kind: CryptoErrorKind::InsufficientKeySize,
                ..
            }))
        ));
    }

    fn util_b64(bytes: &[u8]) -> String {
        crate::util::encode_base64(bytes)
    }
}
