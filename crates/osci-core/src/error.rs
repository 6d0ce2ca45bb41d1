#![forbid(unsafe_code)]

use crate::codes;

/// Errors produced by the OSCI-Transport message pipeline.
///
/// Variants group into the protocol's failure families: structural parse
/// errors, protocol-state errors, role errors, signature errors and
/// attachment-reference errors.  [`Error::protocol_code`] maps a variant to
/// the numeric OSCI error code where the specification assigns one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Structural / parse errors ────────────────────────────────────
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("unexpected element: {0}")]
    UnexpectedElement(String),

    #[error("unexpected end tag: {0}")]
    UnexpectedEndTag(String),

    #[error("unexpected character data: {0}")]
    StrayText(String),

    #[error("duplicate element: {0}")]
    DuplicateElement(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    // ── Protocol-state errors ────────────────────────────────────────
    #[error("required part {part} missing for message type {message_type}")]
    MissingRequiredPart {
        message_type: String,
        part: &'static str,
    },

    #[error("protocol state error: {0}")]
    ProtocolState(String),

    // ── Role errors ──────────────────────────────────────────────────
    #[error("incompatible certificates for role: {0}")]
    IncompatibleRole(String),

    #[error("no role matches: {0}")]
    NoMatchingRole(String),

    // ── Signature errors ─────────────────────────────────────────────
    #[error("signature coverage violation: {0}")]
    SignatureCoverage(String),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    // ── Attachment-reference errors ──────────────────────────────────
    #[error("attachment reference mismatch: expected content id {expected}, found {found}")]
    AttachmentMismatch { expected: String, found: String },

    // ── Crypto / key / certificate errors ────────────────────────────
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("decryption error: {0}")]
    Decryption(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    // ── Transport framing ────────────────────────────────────────────
    #[error("MIME framing error: {0}")]
    Mime(String),

    #[error("decryption recursion limit reached (depth {0})")]
    RecursionLimit(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map this error to the OSCI numeric protocol code, if one applies.
    ///
    /// Callers producing SOAP faults use the code with the localized text
    /// from their own resource lookup; [`crate::codes::default_text`]
    /// provides the fallback wording.
    pub fn protocol_code(&self) -> Option<&'static str> {
        match self {
            Error::SignatureInvalid(_) => Some(codes::SIGNATURE_INVALID),
            Error::SignatureCoverage(_) => Some(codes::SIGNATURE_COVERAGE),
            Error::XmlParse(_)
            | Error::XmlStructure(_)
            | Error::UnexpectedElement(_)
            | Error::UnexpectedEndTag(_)
            | Error::StrayText(_)
            | Error::DuplicateElement(_)
            | Error::MissingElement(_)
            | Error::MissingAttribute(_) => Some(codes::NOT_WELL_FORMED),
            Error::MissingRequiredPart { .. } | Error::ProtocolState(_) => {
                Some(codes::PROTOCOL_VIOLATION)
            }
            Error::AttachmentMismatch { .. } => Some(codes::PROTOCOL_VIOLATION),
            Error::Decryption(_) | Error::RecursionLimit(_) => Some(codes::DECRYPTION_FAILED),
            Error::IncompatibleRole(_) | Error::NoMatchingRole(_) => Some(codes::INTERNAL_ERROR),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_errors_carry_protocol_codes() {
        assert_eq!(
            Error::SignatureInvalid("bad".into()).protocol_code(),
            Some("9601")
        );
        assert_eq!(
            Error::SignatureCoverage("missing ref".into()).protocol_code(),
            Some("9602")
        );
    }

    #[test]
    fn parse_errors_map_to_not_well_formed() {
        assert_eq!(
            Error::UnexpectedElement("Foo".into()).protocol_code(),
            Some("9600")
        );
    }

    #[test]
    fn crypto_errors_have_no_protocol_code() {
        assert_eq!(Error::Crypto("x".into()).protocol_code(), None);
    }
}
