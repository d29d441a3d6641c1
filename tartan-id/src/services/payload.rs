//! Base64 upload decoding
//!
//! Clients send audio and images either as bare base64 or as a data URI
//! (`data:image/png;base64,...`).

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Empty payload")]
    Empty,

    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Strip an optional data-URI prefix and decode the base64 body
pub fn decode_base64_payload(payload: &str) -> Result<Vec<u8>, PayloadError> {
    let body = strip_data_uri(payload).trim();
    if body.is_empty() {
        return Err(PayloadError::Empty);
    }

    let bytes = STANDARD.decode(body)?;
    if bytes.is_empty() {
        return Err(PayloadError::Empty);
    }
    Ok(bytes)
}

/// Base64 body of a payload, without any data-URI prefix
pub fn strip_data_uri(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        _ => payload,
    }
}

/// Encode bytes as a data URI
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}
