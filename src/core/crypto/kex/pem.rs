//! PEM framing for X25519 keys.
//!
//! The in-process backend emits exactly what `openssl pkey -pubout` prints
//! for an X25519 key, so level 1 and level 2 public keys share one text
//! format.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use zeroize::Zeroizing;

use crate::core::constants::sizes::x25519::{KEY_BYTES, PKCS8_PREFIX, SPKI_PREFIX};
use crate::core::error::{BackendError, Result};

pub const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

const LINE_WIDTH: usize = 64;

/// Wrap DER bytes in PEM armor
pub fn encode(label: &str, der: &[u8]) -> Zeroizing<String> {
    let body = Zeroizing::new(STANDARD.encode(der));
    let mut out = Zeroizing::new(String::with_capacity(body.len() + 2 * label.len() + 40));
    out.push_str(&format!("-----BEGIN {}-----\n", label));
    for chunk in body.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----", label));
    out
}

/// Strip PEM armor and decode the body.
///
/// Whitespace inside the body is ignored, so keys that had their newlines
/// flattened in transit still decode.
pub fn decode(label: &str, text: &str) -> Result<Zeroizing<Vec<u8>>> {
    let begin = format!("-----BEGIN {}-----", label);
    let end = format!("-----END {}-----", label);

    let start = text
        .find(&begin)
        .ok_or_else(|| BackendError::Decode(format!("missing {} header", label)))?
        + begin.len();
    let stop = text[start..]
        .find(&end)
        .ok_or_else(|| BackendError::Decode(format!("missing {} footer", label)))?
        + start;

    let body: Zeroizing<String> = Zeroizing::new(
        text[start..stop]
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect(),
    );
    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| BackendError::Decode(format!("bad {} body: {}", label, e)))?;
    Ok(Zeroizing::new(der))
}

/// Whether `text` carries a PEM public key
pub fn is_public_key(text: &str) -> bool {
    let text = text.trim();
    text.starts_with("-----BEGIN PUBLIC KEY-----") && text.ends_with("-----END PUBLIC KEY-----")
}

/// SubjectPublicKeyInfo PEM for a raw X25519 public key
pub fn x25519_public_to_pem(key: &[u8; KEY_BYTES]) -> String {
    let mut der = Vec::with_capacity(SPKI_PREFIX.len() + KEY_BYTES);
    der.extend_from_slice(&SPKI_PREFIX);
    der.extend_from_slice(key);
    encode(PUBLIC_KEY_LABEL, &der).to_string()
}

/// Raw X25519 public key from SubjectPublicKeyInfo PEM
pub fn x25519_public_from_pem(text: &str) -> Result<[u8; KEY_BYTES]> {
    let der = decode(PUBLIC_KEY_LABEL, text)?;
    strip_prefix(&der, &SPKI_PREFIX, "X25519 public key")
}

/// PKCS#8 PEM for a raw X25519 private key
pub fn x25519_private_to_pem(key: &[u8; KEY_BYTES]) -> Zeroizing<String> {
    let mut der = Zeroizing::new(Vec::with_capacity(PKCS8_PREFIX.len() + KEY_BYTES));
    der.extend_from_slice(&PKCS8_PREFIX);
    der.extend_from_slice(key);
    encode(PRIVATE_KEY_LABEL, &der)
}

/// Raw X25519 private key from PKCS#8 PEM
pub fn x25519_private_from_pem(text: &str) -> Result<Zeroizing<[u8; KEY_BYTES]>> {
    let der = decode(PRIVATE_KEY_LABEL, text)?;
    strip_prefix(&der, &PKCS8_PREFIX, "X25519 private key").map(Zeroizing::new)
}

fn strip_prefix(der: &[u8], prefix: &[u8], what: &str) -> Result<[u8; KEY_BYTES]> {
    if der.len() != prefix.len() + KEY_BYTES || !der.starts_with(prefix) {
        return Err(BackendError::Decode(format!("not an {}", what)).into());
    }
    let mut key = [0u8; KEY_BYTES];
    key.copy_from_slice(&der[prefix.len()..]);
    Ok(key)
}
