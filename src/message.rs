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

//! Composed messages and their serialization to wire bytes.
//!
//! [`serialize`] is the signing pipeline: given a message and a signing
//! configuration it produces the signed message, with the *DKIM-Signature*
//! header first. Without configuration the message is written unsigned.

use crate::{
    canonicalize,
    crypto::SigningKey,
    header::{FieldBody, FieldName, HeaderFieldError, HeaderFields},
    parse::CRLF,
    signature::DKIM_SIGNATURE_NAME,
    signer::{self, SigningConfig, SigningError},
};
use chrono::{DateTime, FixedOffset, Utc};
use std::str;
use tracing::{debug, trace};

const DATE_NAME: &str = "Date";

/// A composed message: an ordered header and the transfer-encoded body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub headers: HeaderFields,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new(headers: HeaderFields, body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers,
            body: body.into(),
        }
    }

    /// Parses a message, splitting header and body at the first empty line.
    ///
    /// The header must be UTF-8. The body is taken as-is.
    pub fn parse(input: &[u8]) -> Result<Self, HeaderFieldError> {
        let (header, body) = split_at_empty_line(input);

        let header = str::from_utf8(header).map_err(|_| HeaderFieldError)?;
        let headers = header.parse()?;

        Ok(Self::new(headers, body))
    }

    /// Returns this message with a valid *Date* header.
    ///
    /// A missing *Date* header is appended, an unparseable one is replaced at
    /// its position. A valid *Date* header is left alone.
    pub fn with_date(self, now: DateTime<Utc>) -> Self {
        Self {
            headers: ensure_date(self.headers, now),
            body: self.body,
        }
    }

    /// Writes the message to wire bytes, each header as `Name: value`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.body.len() + 1024);

        for (name, value) in self.headers.as_ref() {
            write_header_line(&mut result, name.as_ref(), value.as_ref());
        }

        result.extend(CRLF.bytes());
        result.extend(&self.body);

        result
    }
}

fn ensure_date(mut headers: HeaderFields, now: DateTime<Utc>) -> HeaderFields {
    let date_index = headers
        .as_ref()
        .iter()
        .position(|(name, _)| *name == DATE_NAME);

    if let Some(i) = date_index {
        if parse_date(headers.as_ref()[i].1.as_ref()).is_some() {
            return headers;
        }
    }

    let date = match (FieldName::new(DATE_NAME), FieldBody::new(format_date(now))) {
        (Ok(name), Ok(body)) => (name, body),
        _ => return headers,
    };

    match date_index {
        Some(i) => {
            debug!(date = %date.1, "replacing unparseable Date header");
            headers.replace(i, date);
        }
        None => {
            debug!(date = %date.1, "adding missing Date header");
            headers.push(date);
        }
    }

    headers
}

fn split_at_empty_line(input: &[u8]) -> (&[u8], &[u8]) {
    let mut i = 0;

    loop {
        let rest = &input[i..];

        if rest.starts_with(b"\r\n") {
            return (&input[..i], &input[(i + 2)..]);
        }
        if rest.starts_with(b"\n") {
            return (&input[..i], &input[(i + 1)..]);
        }

        match rest.iter().position(|&b| b == b'\n') {
            Some(n) => i += n + 1,
            None => return (input, &input[input.len()..]),
        }
    }
}

fn write_header_line(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend(name.bytes());
    out.extend(b": ");
    out.extend(value.bytes());
    out.extend(CRLF.bytes());
}

/// Parses the value of a *Date* header.
///
/// Folding whitespace and a trailing comment such as `(UTC)` are accepted.
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");

    let value = match value.rfind('(') {
        Some(i) if value.ends_with(')') => value[..i].trim_end(),
        _ => value.as_str(),
    };

    DateTime::parse_from_rfc2822(value).ok()
}

/// Formats a *Date* header value in RFC 2822 format.
pub fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc2822()
}

/// Serializes a message to wire bytes, signing it when a configuration is
/// given.
///
/// The current time is used for a missing *Date* header. See
/// [`serialize_at`].
pub fn serialize<T>(
    message: &Message,
    config: Option<&SigningConfig<T>>,
) -> Result<Vec<u8>, SigningError>
where
    T: AsRef<SigningKey>,
{
    serialize_at(message, config, Utc::now())
}

/// Serializes a message to wire bytes, signing it when a configuration is
/// given, using `now` for a missing or invalid *Date* header.
///
/// The signed output consists of the *DKIM-Signature* header, the remaining
/// headers in original order (minus excluded headers and older
/// *DKIM-Signature* headers), an empty line, and the unchanged body. On error
/// nothing is produced.
pub fn serialize_at<T>(
    message: &Message,
    config: Option<&SigningConfig<T>>,
    now: DateTime<Utc>,
) -> Result<Vec<u8>, SigningError>
where
    T: AsRef<SigningKey>,
{
    let config = match config {
        Some(config) => config,
        None => {
            trace!("no signing configuration, writing message unsigned");
            return Ok(message.to_bytes());
        }
    };

    config.validate()?;

    // assign Date before anything is canonicalized
    let headers = ensure_date(message.headers.clone(), now);

    let canonical_body = canonicalize::canonicalize_body(config.canonicalization.body, &message.body);

    let result = signer::sign(config, &headers, &canonical_body)?;

    let mut out = Vec::with_capacity(message.body.len() + 2048);

    write_header_line(&mut out, &result.header_name, &result.header_value);

    for (name, value) in headers.as_ref() {
        if *name == DKIM_SIGNATURE_NAME || config.excluded_headers.contains(name) {
            continue;
        }
        write_header_line(&mut out, name.as_ref(), value.as_ref());
    }

    out.extend(CRLF.bytes());
    out.extend(&message.body);

    debug!(domain = %config.domain, selector = %config.selector, "message signed");

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 19, 14, 13, 12).unwrap()
    }

    #[test]
    fn parse_date_ok() {
        let t = parse_date("Fri, 9 Jun 2023 16:13:12 +0200").unwrap();
        assert_eq!(t.timestamp(), 1686319992);

        let t = parse_date(" Fri, 9 Jun 2023\r\n 16:13:12 +0200 (CEST)").unwrap();
        assert_eq!(t.timestamp(), 1686319992);

        assert!(parse_date("").is_none());
        assert!(parse_date("tomorrow").is_none());
    }

    #[test]
    fn format_date_ok() {
        assert_eq!(format_date(now()), "Mon, 19 Jun 2023 14:13:12 +0000");
        assert_eq!(parse_date(&format_date(now())).unwrap(), now());
    }

    #[test]
    fn message_parse_ok() {
        let message = Message::parse(b"From: me\r\nSubject: hi\r\n\tthere\r\n\r\nbody\r\n\r\nmore\r\n")
            .unwrap();

        assert_eq!(message.headers.as_ref().len(), 2);
        assert_eq!(message.headers.get("subject").unwrap().as_ref(), "hi\r\n\tthere");
        assert_eq!(message.body, b"body\r\n\r\nmore\r\n");

        let message = Message::parse(b"From: me\n\nbody\n").unwrap();
        assert_eq!(message.body, b"body\n");

        let message = Message::parse(b"From: me\r\n").unwrap();
        assert!(message.body.is_empty());
    }

    #[test]
    fn message_with_date() {
        let message = Message::parse(b"From: me\r\nTo: you\r\n\r\n").unwrap().with_date(now());
        let names: Vec<_> = message.headers.as_ref().iter().map(|(n, _)| n.as_ref()).collect();
        assert_eq!(names, ["From", "To", "Date"]);
        assert_eq!(
            message.headers.get("Date").unwrap().as_ref(),
            "Mon, 19 Jun 2023 14:13:12 +0000"
        );

        let message = Message::parse(b"Date: garbage\r\nFrom: me\r\n\r\n").unwrap().with_date(now());
        let names: Vec<_> = message.headers.as_ref().iter().map(|(n, _)| n.as_ref()).collect();
        assert_eq!(names, ["Date", "From"]);
        assert_eq!(
            message.headers.get("Date").unwrap().as_ref(),
            "Mon, 19 Jun 2023 14:13:12 +0000"
        );

        let original = Message::parse(b"From: me\r\nDate: Thu, 1 Jun 2023 08:00:00 +0200\r\n\r\n").unwrap();
        assert_eq!(original.clone().with_date(now()), original);
    }

    #[test]
    fn serialize_unsigned() {
        let message = Message::parse(b"From: me\nSubject:x\n\nbody\n").unwrap();

        let bytes = serialize::<SigningKey>(&message, None).unwrap();

        assert_eq!(bytes, b"From: me\r\nSubject: x\r\n\r\nbody\n");
    }
}
