use dkimsign::{keycheck::LookupTxt, SigningKey};
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::{future::Future, io, pin::Pin, sync::Arc};
use tokio::fs;

pub type LookupOutput = Vec<io::Result<Vec<u8>>>;
pub type LookupFuture<'a> = Pin<Box<dyn Future<Output = io::Result<LookupOutput>> + Send + 'a>>;

#[derive(Clone)]
pub struct MockLookup(Arc<dyn Fn(&str) -> LookupFuture<'_> + Send + Sync>);

impl MockLookup {
    pub fn new(f: impl Fn(&str) -> LookupFuture<'_> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }
}

impl LookupTxt for MockLookup {
    type Answer = LookupOutput;
    type Query<'a> = Pin<Box<dyn Future<Output = io::Result<Self::Answer>> + Send + 'a>>;

    fn lookup_txt(&self, domain: &str) -> Self::Query<'_> {
        let domain = domain.to_owned();

        Box::pin(async move { self.0(&domain).await })
    }
}

/// Reads the Base64 content of a PEM file, as it would appear in a p= tag.
pub async fn read_public_key_file_base64(file_name: &str) -> io::Result<String> {
    let s = fs::read_to_string(file_name).await?;
    let mut key_base64: Vec<_> = s.lines().skip(1).collect();
    key_base64.pop();
    Ok(key_base64.join(""))
}

pub async fn read_signing_key_from_file(file_name: &str) -> io::Result<SigningKey> {
    let s = fs::read_to_string(file_name).await?;
    Ok(SigningKey::from_pem(&s).unwrap())
}

pub fn read_signing_key(file_name: &str) -> SigningKey {
    let s = std::fs::read_to_string(file_name).unwrap();
    SigningKey::from_pem(&s).unwrap()
}

/// Parses the tags of a DKIM-Signature header value, with all whitespace
/// removed from the values.
pub fn parse_tags(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter(|spec| !spec.trim().is_empty())
        .map(|spec| {
            let (name, value) = spec.split_once('=').unwrap();
            let value: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            (name.trim().to_owned(), value)
        })
        .collect()
}

pub fn get_tag<'a>(tags: &'a [(String, String)], name: &str) -> Option<&'a str> {
    tags.iter()
        .find_map(|(n, v)| if n == name { Some(v.as_str()) } else { None })
}

/// Verifies the DKIM-Signature header at the top of a signed message.
///
/// Works on the raw message bytes with its own RFC 6376 canonicalization, so
/// that it shares no code with the signer.
pub fn verify_signed_message(bytes: &[u8], public_key: &RsaPublicKey) -> Result<(), String> {
    let split = find_crlf(bytes, b"\r\n\r\n").ok_or("no header/body separator")?;
    let header = std::str::from_utf8(&bytes[..(split + 2)]).map_err(|e| e.to_string())?;
    let body = &bytes[(split + 4)..];

    let fields = split_raw_fields(header);

    let sig_field = fields.first().ok_or("no header fields")?;
    let (sig_name, sig_value) = sig_field.split_once(':').ok_or("malformed header")?;
    if !sig_name.eq_ignore_ascii_case("DKIM-Signature") {
        return Err(format!("first header is {sig_name}"));
    }

    let tags = parse_tags(sig_value);
    let tag = |name: &str| get_tag(&tags, name).ok_or(format!("no {name}= tag"));

    let (header_relaxed, body_relaxed) = match tag("c")?.split_once('/') {
        Some((h, b)) => (h == "relaxed", b == "relaxed"),
        None => (tag("c")? == "relaxed", false),
    };

    let body_hash = Sha256::digest(canonicalize_body_rfc(body_relaxed, body));
    if dkimsign::encode_base64(body_hash) != tag("bh")? {
        return Err("body hash mismatch".into());
    }

    // signed headers are selected bottom-up, RFC 6376, section 5.4.2
    let mut remaining: Vec<&str> = fields[1..].to_vec();
    let mut data = String::new();
    for name in tag("h")?.split(':') {
        let found = remaining.iter().rposition(|field| {
            matches!(field.split_once(':'), Some((n, _)) if n.trim().eq_ignore_ascii_case(name))
        });
        if let Some(i) = found {
            data.push_str(&canonicalize_header_rfc(header_relaxed, remaining.remove(i)));
            data.push_str("\r\n");
        }
    }

    // b= is the last tag: drop its value
    let b_index = sig_field.rfind(" b=").ok_or("no b= tag")?;
    let sig_field_unsigned = &sig_field[..(b_index + 3)];
    data.push_str(&canonicalize_header_rfc(header_relaxed, sig_field_unsigned));

    let data_hash = Sha256::digest(data.as_bytes());

    let signature = dkimsign::decode_base64(tag("b")?).map_err(|e| e.to_string())?;

    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &data_hash, &signature)
        .map_err(|e| e.to_string())
}

fn find_crlf(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// Splits a raw header block into fields, each including its folded
// continuation lines but without the final CRLF.
fn split_raw_fields(header: &str) -> Vec<&str> {
    let mut fields = vec![];
    let mut start = 0;
    let mut pos = 0;

    while let Some(i) = header[pos..].find("\r\n") {
        let end = pos + i;
        let next = end + 2;
        pos = next;
        if !header[next..].starts_with([' ', '\t']) {
            fields.push(&header[start..end]);
            start = next;
        }
    }

    fields
}

fn canonicalize_header_rfc(relaxed: bool, field: &str) -> String {
    if !relaxed {
        return field.to_owned();
    }

    let (name, value) = field.split_once(':').unwrap_or((field, ""));
    let value = value.replace("\r\n", "");
    let words: Vec<_> = value.split([' ', '\t']).filter(|w| !w.is_empty()).collect();

    format!("{}:{}", name.trim().to_ascii_lowercase(), words.join(" "))
}

fn canonicalize_body_rfc(relaxed: bool, body: &[u8]) -> Vec<u8> {
    let mut lines = vec![];
    let mut rest = body;
    while let Some(i) = find_crlf(rest, b"\r\n") {
        lines.push(rest[..i].to_vec());
        rest = &rest[(i + 2)..];
    }
    if !rest.is_empty() {
        lines.push(rest.to_vec());
    }

    if relaxed {
        for line in &mut lines {
            let mut relaxed_line = vec![];
            for &b in line.iter() {
                if matches!(b, b' ' | b'\t') {
                    if relaxed_line.last() != Some(&b' ') {
                        relaxed_line.push(b' ');
                    }
                } else {
                    relaxed_line.push(b);
                }
            }
            if relaxed_line.last() == Some(&b' ') {
                relaxed_line.pop();
            }
            *line = relaxed_line;
        }
    }

    while lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }

    if lines.is_empty() {
        return if relaxed { vec![] } else { b"\r\n".to_vec() };
    }

    lines
        .into_iter()
        .flat_map(|mut line| {
            line.extend(b"\r\n");
            line
        })
        .collect()
}
