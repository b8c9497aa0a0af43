use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, TryRngCore};
use thiserror::Error;

/// Random bytes behind every code, 48 bits of entropy
pub const SHORT_CODE_BYTES: usize = 6;
/// Length of the encoded code, base64 without padding
pub const SHORT_CODE_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum ShortCodeError {
    #[error("operating system randomness unavailable: {0}")]
    Entropy(String),
}

/// Generates a URL-safe short code from the OS random source
pub fn generate_short_code() -> Result<String, ShortCodeError> {
    let mut bytes = [0u8; SHORT_CODE_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| ShortCodeError::Entropy(e.to_string()))?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Whether `candidate` could have been produced by [`generate_short_code`]
pub fn is_short_code(candidate: &str) -> bool {
    candidate.len() == SHORT_CODE_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
