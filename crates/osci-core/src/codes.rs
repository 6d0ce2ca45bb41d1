#![forbid(unsafe_code)]

//! OSCI protocol error and feedback codes.
//!
//! The numeric codes come from the OSCI-Transport 1.2 specification's fixed
//! code table.  Localized wording is the job of the embedding application's
//! resource lookup; [`default_text`] carries the English fallback only.

/// Request executed without errors.
pub const OK: &str = "0800";

/// Request executed, non-fatal warnings present.
pub const OK_WITH_WARNINGS: &str = "0801";

/// Message is not well-formed or violates the schema.
pub const NOT_WELL_FORMED: &str = "9600";

/// Signature value could not be verified cryptographically.
pub const SIGNATURE_INVALID: &str = "9601";

/// Signature coverage is incomplete or inconsistent with the parsed message.
pub const SIGNATURE_COVERAGE: &str = "9602";

/// Protocol sequence violated (dialog state, required parts, encryption policy).
pub const PROTOCOL_VIOLATION: &str = "9202";

/// Encrypted transport payload could not be decrypted.
pub const DECRYPTION_FAILED: &str = "9203";

/// Internal error of the processing party.
pub const INTERNAL_ERROR: &str = "9700";

/// English fallback text for a protocol code.
pub fn default_text(code: &str) -> Option<&'static str> {
    match code {
        OK => Some("Request executed"),
        OK_WITH_WARNINGS => Some("Request executed, warnings occurred"),
        NOT_WELL_FORMED => Some("Message is not well-formed"),
        SIGNATURE_INVALID => Some("Signature could not be verified"),
        SIGNATURE_COVERAGE => Some("Signature does not cover the message"),
        PROTOCOL_VIOLATION => Some("Message violates the protocol sequence"),
        DECRYPTION_FAILED => Some("Message could not be decrypted"),
        INTERNAL_ERROR => Some("Internal processing error"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_text() {
        assert!(default_text(OK).is_some());
        assert!(default_text(SIGNATURE_INVALID).is_some());
        assert!(default_text("1234").is_none());
    }
}
