//! Gateway webhook signature verification.
//!
//! The gateway signs the raw request body with HMAC-SHA256 and sends the
//! digest, hex or base64 encoded and optionally prefixed with `sha256=`, in
//! one of several header names. Verification always runs over the raw bytes;
//! re-serialized JSON is not byte-identical.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Header names that may carry the signature, in lookup order.
pub const SIGNATURE_HEADERS: [&str; 6] = [
    "asaas-signature",
    "asaas-signature-256",
    "x-asaas-signature",
    "x-asaas-signature-256",
    "x-hub-signature",
    "x-hub-signature-256",
];

const DIGEST_LEN: usize = 32;

/// Why a delivery failed authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Signature header missing")]
    Missing,

    #[error("Signature is neither hex nor base64")]
    Undecodable,

    #[error("Signature has wrong length: {0} bytes")]
    WrongLength(usize),

    #[error("Signature mismatch")]
    Mismatch,
}

/// Verifies webhook signatures for one signing secret.
pub struct WebhookSignatureVerifier {
    secret: SecretString,
}

impl WebhookSignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Checks `signature` against the HMAC of `raw_body`.
    pub fn verify(&self, raw_body: &[u8], signature: Option<&str>) -> Result<(), SignatureError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(SignatureError::Missing)?;

        let provided = decode_signature(strip_prefix(signature))?;
        if provided.len() != DIGEST_LEN {
            return Err(SignatureError::WrongLength(provided.len()));
        }

        let expected = hmac_sha256(self.secret.expose_secret().as_bytes(), raw_body);
        if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> String {
    hex::encode(hmac_sha256(secret.as_bytes(), body))
}

fn hmac_sha256(key: &[u8], body: &[u8]) -> Vec<u8> {
    // HMAC is defined for keys of any length, including empty.
    let mut mac = match Hmac::<Sha256>::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

fn strip_prefix(signature: &str) -> &str {
    match signature.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("sha256=") => &signature[7..],
        _ => signature,
    }
}

fn decode_signature(encoded: &str) -> Result<Vec<u8>, SignatureError> {
    if encoded.len() == DIGEST_LEN * 2 && encoded.chars().all(|c| c.is_ascii_hexdigit()) {
        return hex::decode(encoded).map_err(|_| SignatureError::Undecodable);
    }
    STANDARD
        .decode(encoded)
        .map_err(|_| SignatureError::Undecodable)
}
