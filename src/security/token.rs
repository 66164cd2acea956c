//! Signed bearer tokens (PASETO `v4.public`).
//!
//! # Format
//! ```text
//! v4.public.<base64url(message || signature)>[.<base64url(footer)>]
//! ```
//!
//! The Ed25519 signature covers the pre-authentication encoding of the
//! header, message, footer and an empty implicit assertion. Base64 is the
//! URL-safe alphabet without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SIGNATURE_LENGTH};
use rand::RngCore;
use thiserror::Error;

/// Version and purpose prefix every accepted token carries.
pub const HEADER: &str = "v4.public.";

/// Token or key rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("token is not a v4.public token")]
    UnsupportedVersion,

    #[error("token is malformed: {0}")]
    Malformed(&'static str),

    #[error("token signature is invalid")]
    BadSignature,
}

/// Ed25519 public key used to verify tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parse a 32-byte key from hex.
    pub fn from_hex(hex_key: &str) -> Result<Self, TokenError> {
        let bytes = decode_key_hex(hex_key)?;
        VerifyingKey::from_bytes(&bytes)
            .map(PublicKey)
            .map_err(|e| TokenError::InvalidKey(e.to_string()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.as_bytes())
    }

    /// Verify `token` and return its message (the JSON claims).
    pub fn verify(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        let body = token
            .strip_prefix(HEADER)
            .ok_or(TokenError::UnsupportedVersion)?;

        let (payload, footer) = match body.split_once('.') {
            Some((payload, footer)) => (payload, decode_b64(footer)?),
            None => (body, Vec::new()),
        };

        let raw = decode_b64(payload)?;
        if raw.len() < SIGNATURE_LENGTH {
            return Err(TokenError::Malformed("payload shorter than a signature"));
        }
        let (message, signature) = raw.split_at(raw.len() - SIGNATURE_LENGTH);
        let signature =
            Signature::from_slice(signature).map_err(|_| TokenError::Malformed("bad signature bytes"))?;

        let signed = pae(&[HEADER.as_bytes(), message, &footer, b""]);
        self.0
            .verify(&signed, &signature)
            .map_err(|_| TokenError::BadSignature)?;

        Ok(message.to_vec())
    }
}

/// Ed25519 signing key used to mint tokens.
pub struct SecretKey(SigningKey);

impl SecretKey {
    /// Fresh random key.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        SecretKey(SigningKey::from_bytes(&seed))
    }

    /// Parse a 32-byte seed from hex.
    pub fn from_hex(hex_key: &str) -> Result<Self, TokenError> {
        Ok(SecretKey(SigningKey::from_bytes(&decode_key_hex(hex_key)?)))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Sign `message` into a `v4.public` token. An empty footer is omitted.
    pub fn sign(&self, message: &[u8], footer: &[u8]) -> String {
        let signed = pae(&[HEADER.as_bytes(), message, footer, b""]);
        let signature = self.0.sign(&signed);

        let mut raw = Vec::with_capacity(message.len() + SIGNATURE_LENGTH);
        raw.extend_from_slice(message);
        raw.extend_from_slice(&signature.to_bytes());

        let mut token = format!("{}{}", HEADER, URL_SAFE_NO_PAD.encode(raw));
        if !footer.is_empty() {
            token.push('.');
            token.push_str(&URL_SAFE_NO_PAD.encode(footer));
        }
        token
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretKey").field(&"<redacted>").finish()
    }
}

fn decode_key_hex(hex_key: &str) -> Result<[u8; 32], TokenError> {
    let bytes = hex::decode(hex_key.trim()).map_err(|e| TokenError::InvalidKey(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| TokenError::InvalidKey(format!("expected 32 bytes, got {}", b.len())))
}

fn decode_b64(segment: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed("invalid base64url"))
}

/// Little-endian u64 with the top bit cleared.
fn le64(n: u64) -> [u8; 8] {
    (n & (u64::MAX >> 1)).to_le_bytes()
}

/// Pre-authentication encoding.
fn pae(pieces: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + pieces.iter().map(|p| 8 + p.len()).sum::<usize>());
    out.extend_from_slice(&le64(pieces.len() as u64));
    for piece in pieces {
        out.extend_from_slice(&le64(piece.len() as u64));
        out.extend_from_slice(piece);
    }
    out
}
