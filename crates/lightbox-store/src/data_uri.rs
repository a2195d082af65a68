use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;

use crate::RetrievalError;

/// Inline `bytes` as a base64 `data:` URI.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Decode a `data:` URI. Only base64 payloads are decoded; any other
/// payload is returned verbatim.
pub fn decode_data_uri(uri: &str) -> Result<Bytes, RetrievalError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| RetrievalError::InvalidLocator(truncate(uri)))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| RetrievalError::InvalidLocator(truncate(uri)))?;

    if header.ends_with(";base64") {
        STANDARD
            .decode(payload)
            .map(Bytes::from)
            .map_err(|e| RetrievalError::InvalidLocator(format!("base64: {e}")))
    } else {
        Ok(Bytes::copy_from_slice(payload.as_bytes()))
    }
}

// data: URIs can be megabytes long; keep error messages readable.
fn truncate(uri: &str) -> String {
    uri.chars().take(48).collect()
}
