#![forbid(unsafe_code)]

//! Base64 helpers tolerant of the whitespace MIME and XML producers insert.

use base64::Engine;
use osci_core::Error;

/// Decode base64, ignoring any embedded whitespace.
pub fn decode(data: &[u8]) -> Result<Vec<u8>, Error> {
    let filtered: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(&filtered)
        .map_err(|e| Error::Base64(e.to_string()))
}

/// Decode a base64 string value from XML text content.
pub fn decode_str(text: &str) -> Result<Vec<u8>, Error> {
    decode(text.as_bytes())
}

/// Encode to standard base64 without line breaks.
pub fn encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        assert_eq!(decode(encode(b"hello").as_bytes()).unwrap(), b"hello");
    }

    #[test]
    fn whitespace_tolerated() {
        assert_eq!(decode(b"aGVs\r\n bG8=\n").unwrap(), b"hello");
    }

    #[test]
    fn invalid_input_rejected() {
        assert!(decode(b"!!not base64!!").is_err());
    }
}
