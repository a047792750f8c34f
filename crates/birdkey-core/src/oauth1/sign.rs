//! ============================================================================
//! OAuth 1.0a Request Signing (HMAC-SHA1)
//! ============================================================================
//! Parameter encoding, signature base string construction, and HMAC-SHA1
//! signing per RFC 5849. Nonce and timestamp are regenerated for every
//! request: a signed request is valid exactly once, so a retry must re-sign
//! rather than resend the same bytes.
//! ============================================================================

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha1::Sha1;

use crate::types::{AuthError, AuthResult};

type HmacSha1 = Hmac<Sha1>;

/// RFC 5849 section 3.6: encode everything except ALPHA / DIGIT / - . _ ~
const OAUTH_RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a parameter key, value, or URL for signing.
pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, OAUTH_RESERVED).to_string()
}

/// Random 32-hex-char nonce, fresh per request.
pub fn nonce() -> String {
    (0..16)
        .map(|_| format!("{:02x}", rand::random::<u8>()))
        .collect()
}

/// Seconds since the epoch, as the protocol wants it: a decimal string.
pub fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

/// Build the signature base string: uppercase method, encoded URL, and the
/// encoded, lexicographically sorted parameter string.
pub fn signature_base_string(method: &str, url: &str, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&normalized)
    )
}

/// HMAC-SHA1 over the base string, keyed by the encoded consumer secret and
/// token secret (empty token secret for the request-token leg).
pub fn sign(
    base_string: &str,
    consumer_secret: &str,
    token_secret: &str,
) -> AuthResult<String> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| AuthError::Configuration(format!("HMAC init failed: {e}")))?;
    mac.update(base_string.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Assemble the `Authorization: OAuth ...` header from protocol parameters.
pub fn authorization_header(params: &[(String, String)]) -> String {
    let fields = params
        .iter()
        .map(|(k, v)| format!(r#"{}="{}""#, percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("OAuth {fields}")
}
