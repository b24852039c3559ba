//! Deterministic reflection identity derived from an email address.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use thiserror::Error;

const PREFIX: &str = "GLYPH-";
const ENCODED_CHARS: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReflectionIdError {
    #[error("email required for reflection id")]
    EmptyEmail,
}

/// `GLYPH-` followed by the first 16 characters of the unpadded url-safe
/// base64 SHA-256 digest of the lower-cased email.
pub fn reflection_id_for_email(email: &str) -> Result<String, ReflectionIdError> {
    if email.trim().is_empty() {
        return Err(ReflectionIdError::EmptyEmail);
    }

    let digest = Sha256::digest(email.to_lowercase().as_bytes());
    let encoded = URL_SAFE_NO_PAD.encode(digest);
    Ok(format!("{PREFIX}{}", &encoded[..ENCODED_CHARS]))
}
