#![forbid(unsafe_code)]

//! Signature verification over a parsed message.
//!
//! Coverage comes first: every element marked signature-relevant during the
//! parse must be hashed, the reference count must match the digest count
//! exactly, and after matching no hashed element may remain unreferenced.
//! Only then the signer certificate is resolved, its key usage checked, and
//! the captured `SignedInfo` bytes verified against the signature value.
//! Failures report as protocol codes 9602 (coverage) and 9601
//! (cryptographic); diagnostic detail stays in the log.

use crate::dialog::DialogHandler;
use osci_core::{Error, Result};
use osci_keys::OsciCertificate;
use osci_message::OsciMessage;

/// Verify the message's signature header.  `Ok(())` means the signature is
/// valid and covers the message exactly.
pub fn verify_signature(msg: &OsciMessage, dialog: Option<&DialogHandler>) -> Result<()> {
    let signature = msg
        .signature
        .as_ref()
        .ok_or_else(|| Error::SignatureCoverage("message carries no signature".into()))?;

    // 1. Every tracked element must have been hashed.
    for id in &msg.signed_element_ids {
        if !msg.digests.contains_key(id) {
            return Err(Error::SignatureCoverage(format!(
                "element {id} was never hashed"
            )));
        }
    }

    // 2. Reference count and digest count must match exactly.
    if msg.digests.len() != signature.references.len() {
        return Err(Error::SignatureCoverage(format!(
            "{} references for {} hashed elements",
            signature.references.len(),
            msg.digests.len()
        )));
    }

    // 3. Byte-exact digest comparison, consuming entries as they match.
    let mut remaining = msg.digests.clone();
    for reference in &signature.references {
        match remaining.remove(&reference.id) {
            None => {
                return Err(Error::SignatureCoverage(format!(
                    "reference {} has no parsed digest",
                    reference.id
                )));
            }
            Some(parsed) => {
                if parsed != reference.digest_value {
                    tracing::debug!(reference = %reference.id, "digest mismatch");
                    return Err(Error::SignatureInvalid("signature invalid".into()));
                }
            }
        }
    }

    // 4. No hashed-but-unreferenced elements may remain.
    if !remaining.is_empty() {
        return Err(Error::SignatureCoverage(
            "unsigned extra elements present".into(),
        ));
    }

    // 5. Resolve the signer certificate and check its key usage.
    let cert = resolve_signer_cert(msg, dialog)?;
    if !cert.allows_signing()? {
        return Err(Error::Certificate(
            "signer certificate does not permit signing".into(),
        ));
    }

    // 6. Verify SignedInfo against the signature value.  Errors at the
    // crypto boundary convert to a plain failure.
    let signed_info = signature
        .signed_info
        .as_deref()
        .ok_or_else(|| Error::SignatureCoverage("SignedInfo bytes not captured".into()))?;
    let valid = osci_crypto::sign::from_uri(&signature.algorithm)
        .and_then(|alg| {
            let key = cert.public_key()?;
            alg.verify(&key, signed_info, &signature.value)
        })
        .unwrap_or(false);
    if !valid {
        tracing::debug!(algorithm = %signature.algorithm, "SignedInfo verification failed");
        return Err(Error::SignatureInvalid("signature invalid".into()));
    }
    Ok(())
}

/// Resolve the signer certificate: by value from `KeyInfo`, via a
/// retrieval reference into the certificate headers, or from the dialog
/// partner (supplier for responses, client for requests).
fn resolve_signer_cert(
    msg: &OsciMessage,
    dialog: Option<&DialogHandler>,
) -> Result<OsciCertificate> {
    let signature = msg
        .signature
        .as_ref()
        .ok_or_else(|| Error::SignatureCoverage("message carries no signature".into()))?;

    if let Some(der) = &signature.certificate_der {
        return OsciCertificate::from_der(der.clone());
    }

    if let Some(uri) = &signature.retrieval_uri {
        let wanted = uri.strip_prefix('#').unwrap_or(uri);
        for header in msg
            .non_intermediary_certificates
            .iter()
            .chain(msg.intermediary_certificates.iter())
        {
            for entry in &header.entries {
                if entry.id == wanted {
                    return OsciCertificate::from_der(entry.der.clone());
                }
            }
        }
        return Err(Error::Certificate(format!(
            "retrieval reference {uri} resolves to no certificate"
        )));
    }

    if let Some(dialog) = dialog {
        let role = if msg.message_type.is_response() {
            &dialog.supplier
        } else {
            &dialog.client
        };
        if let Some(cert) = role.signature_cert() {
            return Ok(cert.clone());
        }
    }
    Err(Error::Certificate("no signer certificate available".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use osci_core::algorithm;
    use osci_message::msg::OsciMessageType;
    use osci_message::signature::{SignatureHeader, SignatureReference};

    fn signed_message() -> OsciMessage {
        let mut msg = OsciMessage::new(OsciMessageType::StoreDelivery);
        msg.digests
            .insert("controlblock".into(), vec![1, 2, 3]);
        msg.signed_element_ids = vec!["controlblock".into()];
        msg.signature = Some(SignatureHeader {
            algorithm: algorithm::RSA_SHA256.into(),
            references: vec![SignatureReference {
                id: "controlblock".into(),
                digest_uri: algorithm::SHA256.into(),
                digest_value: vec![1, 2, 3],
            }],
            ..Default::default()
        });
        msg
    }

    #[test]
    fn unhashed_tracked_element_fails_with_coverage_error() {
        let mut msg = signed_message();
        msg.signed_element_ids.push("body".into());
        let err = verify_signature(&msg, None).unwrap_err();
        assert!(matches!(err, Error::SignatureCoverage(_)));
        assert_eq!(err.protocol_code(), Some("9602"));
    }

    #[test]
    fn reference_count_mismatch_fails_closed() {
        let mut msg = signed_message();
        msg.digests.insert("body".into(), vec![9]);
        msg.signed_element_ids.push("body".into());
        let err = verify_signature(&msg, None).unwrap_err();
        assert!(matches!(err, Error::SignatureCoverage(_)));
    }

    #[test]
    fn digest_mismatch_is_a_9601_failure() {
        let mut msg = signed_message();
        msg.digests.insert("controlblock".into(), vec![9, 9, 9]);
        let err = verify_signature(&msg, None).unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid(_)));
        assert_eq!(err.protocol_code(), Some("9601"));
    }

    #[test]
    fn unknown_reference_fails_with_coverage_error() {
        let mut msg = signed_message();
        msg.digests.remove("controlblock");
        msg.digests.insert("other".into(), vec![1, 2, 3]);
        msg.signed_element_ids = vec!["other".into()];
        let err = verify_signature(&msg, None).unwrap_err();
        assert!(matches!(err, Error::SignatureCoverage(_)));
    }
}
