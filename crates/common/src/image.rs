// PNG payload decoding for the image save endpoints.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Prefix the browser puts in front of `canvas.toDataURL("image/png")`.
pub const PNG_DATA_URI_PREFIX: &[u8] = b"data:image/png;base64,";

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image payload is empty")]
    Empty,

    #[error("invalid base64 image payload: {0}")]
    Base64(String),
}

/// Turn a request body into raw PNG bytes.
///
/// Accepts a `data:image/png;base64,` URI, a bare base64 string, or raw PNG
/// bytes (recognised by the PNG signature).
pub fn decode_png_payload(body: &[u8]) -> Result<Vec<u8>, ImageError> {
    if let Some(encoded) = body.strip_prefix(PNG_DATA_URI_PREFIX) {
        return decode_base64(encoded);
    }
    if body.starts_with(PNG_SIGNATURE) {
        return Ok(body.to_vec());
    }
    decode_base64(body)
}

fn decode_base64(encoded: &[u8]) -> Result<Vec<u8>, ImageError> {
    let trimmed = encoded.trim_ascii();
    if trimmed.is_empty() {
        return Err(ImageError::Empty);
    }
    STANDARD.decode(trimmed).map_err(|error| ImageError::Base64(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png() -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R', 0, 0, 0, 1]);
        bytes
    }

    #[test]
    fn data_uri_and_bare_base64_decode_identically() {
        let png = tiny_png();
        let encoded = STANDARD.encode(&png);
        let with_prefix = [PNG_DATA_URI_PREFIX, encoded.as_bytes()].concat();

        assert_eq!(decode_png_payload(&with_prefix).unwrap(), png);
        assert_eq!(decode_png_payload(encoded.as_bytes()).unwrap(), png);
    }

    #[test]
    fn raw_png_bytes_pass_through() {
        let png = tiny_png();
        assert_eq!(decode_png_payload(&png).unwrap(), png);
    }

    #[test]
    fn trailing_newline_is_ignored() {
        let png = tiny_png();
        let encoded = format!("{}\n", STANDARD.encode(&png));
        assert_eq!(decode_png_payload(encoded.as_bytes()).unwrap(), png);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(decode_png_payload(b"not base64!!"), Err(ImageError::Base64(_))));
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert_eq!(decode_png_payload(b""), Err(ImageError::Empty));
        assert_eq!(decode_png_payload(PNG_DATA_URI_PREFIX), Err(ImageError::Empty));
    }
}
