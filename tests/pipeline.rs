pub mod common;

use chrono::{DateTime, TimeZone, Utc};
use dkimsign::{message, Message, SigningConfig, SigningKey};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 19, 14, 13, 12).unwrap()
}

fn make_config() -> SigningConfig<SigningKey> {
    let key = common::read_signing_key("tests/keys/rsa2048.pem");
    SigningConfig::new("example.com", "sel1", key).unwrap()
}

fn header_names(message: &Message) -> Vec<String> {
    message
        .headers
        .as_ref()
        .iter()
        .map(|(name, _)| name.to_string())
        .collect()
}

#[test]
fn pipeline_signature_header_first() {
    let _ = tracing_subscriber::fmt::try_init();

    let config = make_config();
    let public_key = config.key().public_key();

    let message = Message::parse(
        b"From: me@example.com\r\n\
        To: you@example.org\r\n\
        Subject: hello\r\n\
        Date: Fri, 9 Jun 2023 16:13:12 +0200\r\n\
        \r\n\
        Hello.\r\n",
    )
    .unwrap();

    let signed = message::serialize_at(&message, Some(&config), now()).unwrap();

    assert!(signed.starts_with(b"DKIM-Signature: v=1; a=rsa-sha256;"));

    let signed_message = Message::parse(&signed).unwrap();
    assert_eq!(
        header_names(&signed_message),
        ["DKIM-Signature", "From", "To", "Subject", "Date"]
    );

    assert_eq!(common::verify_signed_message(&signed, &public_key), Ok(()));
}

#[test]
fn pipeline_drops_excluded_and_old_signature_headers() {
    let config = make_config()
        .exclude_headers(["bcc", "Return-Path"])
        .unwrap();
    let public_key = config.key().public_key();

    let message = Message::parse(
        b"Return-Path: <bounce@example.com>\r\n\
        DKIM-Signature: v=1; a=rsa-sha256; d=old.example; s=x; b=; bh=; h=From\r\n\
        From: me@example.com\r\n\
        To: you@example.org\r\n\
        BCC: hidden@example.org\r\n\
        Date: Fri, 9 Jun 2023 16:13:12 +0200\r\n\
        \r\n\
        Hello.\r\n",
    )
    .unwrap();

    let signed = message::serialize_at(&message, Some(&config), now()).unwrap();

    let signed_message = Message::parse(&signed).unwrap();
    assert_eq!(header_names(&signed_message), ["DKIM-Signature", "From", "To", "Date"]);

    let tags = common::parse_tags(signed_message.headers.as_ref()[0].1.as_ref());
    assert_eq!(common::get_tag(&tags, "h"), Some("From:To:Date"));
    assert_eq!(common::get_tag(&tags, "d"), Some("example.com"));

    assert_eq!(common::verify_signed_message(&signed, &public_key), Ok(()));
}

#[test]
fn pipeline_adds_missing_date() {
    let config = make_config();
    let public_key = config.key().public_key();

    let message = Message::parse(b"From: me@example.com\r\nSubject: no date\r\n\r\nHi\r\n").unwrap();

    let signed = message::serialize_at(&message, Some(&config), now()).unwrap();

    let signed_message = Message::parse(&signed).unwrap();
    assert_eq!(
        header_names(&signed_message),
        ["DKIM-Signature", "From", "Subject", "Date"]
    );
    assert_eq!(
        signed_message.headers.get("Date").unwrap().as_ref(),
        "Mon, 19 Jun 2023 14:13:12 +0000"
    );

    let tags = common::parse_tags(signed_message.headers.as_ref()[0].1.as_ref());
    assert_eq!(common::get_tag(&tags, "t"), Some(now().timestamp().to_string().as_str()));
    assert_eq!(common::get_tag(&tags, "h"), Some("From:Subject:Date"));

    assert_eq!(common::verify_signed_message(&signed, &public_key), Ok(()));
}

#[test]
fn pipeline_replaces_invalid_date_in_place() {
    let config = make_config();

    let message = Message::parse(
        b"Date: sometime last week\r\nFrom: me@example.com\r\n\r\nHi\r\n",
    )
    .unwrap();

    let signed = message::serialize_at(&message, Some(&config), now()).unwrap();

    let signed_message = Message::parse(&signed).unwrap();
    assert_eq!(header_names(&signed_message), ["DKIM-Signature", "Date", "From"]);
    assert_eq!(
        signed_message.headers.get("Date").unwrap().as_ref(),
        "Mon, 19 Jun 2023 14:13:12 +0000"
    );
}

#[test]
fn pipeline_keeps_existing_date() {
    let config = make_config();

    let message = Message::parse(
        b"From: me@example.com\r\nDate: Fri, 9 Jun 2023 16:13:12 +0200\r\n\r\nHi\r\n",
    )
    .unwrap();

    let signed = message::serialize_at(&message, Some(&config), now()).unwrap();

    let signed_message = Message::parse(&signed).unwrap();
    assert_eq!(
        signed_message.headers.get("Date").unwrap().as_ref(),
        "Fri, 9 Jun 2023 16:13:12 +0200"
    );

    let tags = common::parse_tags(signed_message.headers.as_ref()[0].1.as_ref());
    assert_eq!(common::get_tag(&tags, "t"), Some("1686319992"));
}

#[test]
fn pipeline_body_unchanged() {
    let config = make_config();

    let body: &[u8] = b"Line with trailing space  \r\n\r\n\tindented\r\nbare LF\nend\r\n\r\n\r\n";

    let mut input = b"From: me@example.com\r\nDate: Fri, 9 Jun 2023 16:13:12 +0200\r\n\r\n".to_vec();
    input.extend(body);

    let message = Message::parse(&input).unwrap();

    let signed = message::serialize_at(&message, Some(&config), now()).unwrap();

    assert!(signed.ends_with(body));

    let signed_message = Message::parse(&signed).unwrap();
    assert_eq!(signed_message.body, body);
}

#[test]
fn pipeline_without_config_is_unsigned() {
    let message = Message::parse(
        b"From: me@example.com\r\nSubject: plain\r\n\r\nHello.\r\n",
    )
    .unwrap();

    let bytes = message::serialize::<SigningKey>(&message, None).unwrap();

    assert_eq!(bytes, b"From: me@example.com\r\nSubject: plain\r\n\r\nHello.\r\n");
}

#[test]
fn pipeline_empty_body() {
    let config = make_config();
    let public_key = config.key().public_key();

    let message = Message::parse(b"From: me@example.com\r\nDate: Fri, 9 Jun 2023 16:13:12 +0200\r\n\r\n").unwrap();

    let signed = message::serialize_at(&message, Some(&config), now()).unwrap();

    assert!(signed.ends_with(b"\r\nDate: Fri, 9 Jun 2023 16:13:12 +0200\r\n\r\n"));

    let tags = common::parse_tags(Message::parse(&signed).unwrap().headers.as_ref()[0].1.as_ref());
    // SHA-256 of the empty string
    assert_eq!(
        common::get_tag(&tags, "bh"),
        Some("47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=")
    );

    assert_eq!(common::verify_signed_message(&signed, &public_key), Ok(()));
}
