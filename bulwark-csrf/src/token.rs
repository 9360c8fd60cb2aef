//! Self-contained signed CSRF tokens.
//!
//! Wire format: `base64url(nonce) "." issued_at_millis "." base64url(hmac)`,
//! unpadded. The MAC is HMAC-SHA256 over the first two segments exactly as
//! transmitted, so the token carries everything needed to verify it.

use crate::clock::duration_millis;
use crate::error::{CsrfError, Result, VerifyError};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per token.
pub const NONCE_LEN: usize = 32;

/// Longest token string we bother parsing.
const MAX_TOKEN_LEN: usize = 256;

const DELIMITER: char = '.';

/// A parsed, verified (or freshly issued) CSRF token.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken {
    nonce: [u8; NONCE_LEN],
    issued_at: i64,
    encoded: String,
}

impl CsrfToken {
    /// Issue time in Unix epoch milliseconds
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    /// Serialized form, valid as a cookie, header or form value
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn into_string(self) -> String {
        self.encoded
    }

    /// Whether the token is older than `timeout` at `now`
    pub fn is_expired(&self, now: i64, timeout: Duration) -> bool {
        now.saturating_sub(self.issued_at) > duration_millis(timeout)
    }
}

impl fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfToken")
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

/// Issues and verifies tokens with one process secret.
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(CsrfError::MissingSecret);
        }

        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| CsrfError::InvalidConfig(e.to_string()))?;
        Ok(Self { mac })
    }

    /// Issue a new token stamped with `now` (epoch millis).
    pub fn issue(&self, now: i64) -> CsrfToken {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let payload = format!("{}{}{}", URL_SAFE_NO_PAD.encode(nonce), DELIMITER, now);
        let signature = self.sign(&payload);

        CsrfToken {
            nonce,
            issued_at: now,
            encoded: format!("{}{}{}", payload, DELIMITER, signature),
        }
    }

    /// Parse `token`, check its signature, then its age.
    pub fn verify(
        &self,
        token: &str,
        now: i64,
        timeout: Duration,
    ) -> std::result::Result<CsrfToken, VerifyError> {
        let parsed = parse(token)?;

        let payload = &token[..parsed.payload_len];
        let expected = self.sign(payload);
        if !bool::from(expected.as_bytes().ct_eq(parsed.signature.as_bytes())) {
            return Err(VerifyError::BadSignature);
        }

        let token = CsrfToken {
            nonce: parsed.nonce,
            issued_at: parsed.issued_at,
            encoded: token.to_string(),
        };

        if token.is_expired(now, timeout) {
            return Err(VerifyError::Expired);
        }

        Ok(token)
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSigner { .. }")
    }
}

struct Parsed<'a> {
    nonce: [u8; NONCE_LEN],
    issued_at: i64,
    signature: &'a str,
    payload_len: usize,
}

fn parse(token: &str) -> std::result::Result<Parsed<'_>, VerifyError> {
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
        return Err(VerifyError::Malformed);
    }

    let mut segments = token.split(DELIMITER);
    let (Some(nonce), Some(issued_at), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(VerifyError::Malformed);
    };

    if signature.is_empty() {
        return Err(VerifyError::Malformed);
    }

    let mut nonce_bytes = [0u8; NONCE_LEN];
    match URL_SAFE_NO_PAD.decode(nonce) {
        Ok(bytes) if bytes.len() == NONCE_LEN => nonce_bytes.copy_from_slice(&bytes),
        _ => return Err(VerifyError::Malformed),
    }

    if issued_at.is_empty() || !issued_at.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VerifyError::Malformed);
    }
    let issued_at_millis = issued_at
        .parse::<i64>()
        .map_err(|_| VerifyError::Malformed)?;

    Ok(Parsed {
        nonce: nonce_bytes,
        issued_at: issued_at_millis,
        signature,
        payload_len: nonce.len() + 1 + issued_at.len(),
    })
}
