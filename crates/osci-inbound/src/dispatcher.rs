#![forbid(unsafe_code)]

//! The incoming message dispatcher.
//!
//! Splits the MIME stream, parses the XML skeleton, unwraps transport
//! encryption by recursing on the decrypted stream (bounded depth), binds
//! out-of-band attachments by content id and runs signature verification.
//!
//! Without a dialog context the dispatcher acts as a passive recipient:
//! encryption recipients are matched against the configured default
//! supplier roles instead of a known dialog partner.

use crate::dialog::DialogHandler;
use crate::mime::{read_mime, MimePart};
use crate::verify;
use osci_core::{Error, OsciConfig, Result};
use osci_keys::role::Decrypter;
use osci_keys::Role;
use osci_message::content::{CipherSource, EncryptedDataOsci, EncryptedKeyOsci};
use osci_message::msg::OsciMessageType;
use osci_message::{Attachment, OsciMessage};
use std::sync::Arc;

pub struct IncomingDispatcher<'a> {
    cfg: &'a OsciConfig,
    default_suppliers: Vec<Role>,
}

impl<'a> IncomingDispatcher<'a> {
    pub fn new(cfg: &'a OsciConfig) -> Self {
        Self {
            cfg,
            default_suppliers: Vec::new(),
        }
    }

    /// Roles tried as decryption recipients when no dialog is given.
    pub fn with_default_suppliers(mut self, roles: Vec<Role>) -> Self {
        self.default_suppliers = roles;
        self
    }

    /// Process a raw transport stream into a typed message.
    pub fn process(&self, data: &[u8], dialog: Option<&mut DialogHandler>) -> Result<OsciMessage> {
        self.process_inner(data, dialog, 0)
    }

    fn process_inner(
        &self,
        data: &[u8],
        mut dialog: Option<&mut DialogHandler>,
        depth: u32,
    ) -> Result<OsciMessage> {
        if depth > self.cfg.max_decryption_depth {
            return Err(Error::RecursionLimit(depth));
        }

        let parts = read_mime(data)?;
        let skeleton = parts
            .first()
            .ok_or_else(|| Error::Mime("stream contains no MIME parts".into()))?;
        let mut msg = osci_parser::parse_message(self.cfg, &skeleton.body)?;

        if msg.message_type == OsciMessageType::SoapMessageEncrypted {
            let enc = msg.body.encrypted_data.first().ok_or_else(|| {
                Error::MissingElement("EncryptedData in encrypted envelope".into())
            })?;
            let (key_entry, decrypter) = self.resolve_recipient(enc, dialog.as_deref())?;
            let session_key = decrypter.unwrap_key(
                &key_entry.transport_uri,
                &key_entry.oaep_params(),
                &key_entry.cipher_value,
            )?;

            let ciphertext = self.locate_ciphertext(enc, &parts)?;
            let cipher = osci_crypto::cipher::from_uri(&enc.enc_method_uri)?;
            let plaintext = cipher.decrypt(&session_key, &ciphertext)?;
            let enc_method = enc.enc_method_uri.clone();
            tracing::debug!(depth, cipher = %enc_method, "transport envelope decrypted, re-reading");

            if let Some(d) = dialog.as_deref_mut() {
                d.encrypted = true;
            }
            let mut inner = self.process_inner(&plaintext, dialog, depth + 1)?;
            inner.transport_cipher = Some(enc_method);
            return Ok(inner);
        }

        // Once a dialog went encrypted, plaintext replies are refused.
        // SOAP faults are the one exemption.
        if depth == 0 {
            if let Some(d) = dialog.as_deref() {
                if d.encrypted && msg.message_type != OsciMessageType::SoapFault {
                    return Err(Error::ProtocolState(
                        "unencrypted message on an encrypted dialog".into(),
                    ));
                }
            }
        }

        self.bind_attachments(&mut msg, &parts[1..])?;

        if msg.is_signed() && self.cfg.check_signatures {
            verify::verify_signature(&msg, dialog.as_deref())?;
        }

        if msg.message_type.is_response() {
            if let (Some(d), Some(cb)) = (dialog.as_deref_mut(), msg.control_block.as_ref()) {
                d.check_response(cb)?;
            }
        }
        Ok(msg)
    }

    /// Locate the transport ciphertext: inline cipher value, or the MIME
    /// part the cipher reference names.  The referenced content id must
    /// match the next part exactly.
    fn locate_ciphertext(
        &self,
        enc: &EncryptedDataOsci,
        parts: &[MimePart],
    ) -> Result<Vec<u8>> {
        match &enc.cipher {
            CipherSource::Value(bytes) => Ok(bytes.clone()),
            CipherSource::Reference(_) => {
                let cid = enc
                    .cipher_reference_cid()
                    .ok_or_else(|| Error::MissingElement("CipherReference URI".into()))?;
                let part = parts
                    .get(1)
                    .ok_or_else(|| Error::Mime("ciphertext MIME part missing".into()))?;
                let found = part.content_id.as_deref().unwrap_or("");
                if found != cid {
                    return Err(Error::AttachmentMismatch {
                        expected: cid.to_owned(),
                        found: found.to_owned(),
                    });
                }
                part.decoded_body()
            }
        }
    }

    /// Match an encrypted key against the dialog's roles or the default
    /// supplier list by comparing the embedded certificate.
    fn resolve_recipient(
        &self,
        enc: &EncryptedDataOsci,
        dialog: Option<&DialogHandler>,
    ) -> Result<(EncryptedKeyOsci, Arc<dyn Decrypter>)> {
        let mut candidates: Vec<&Role> = Vec::new();
        if let Some(d) = dialog {
            candidates.push(&d.supplier);
            candidates.push(&d.client);
        }
        candidates.extend(self.default_suppliers.iter());

        for key in &enc.keys {
            let Some(der) = &key.recipient_cert_der else {
                continue;
            };
            for role in &candidates {
                if role.matches_cipher_cert(der) {
                    if let Some(decrypter) = role.decrypter() {
                        return Ok((key.clone(), Arc::clone(decrypter)));
                    }
                }
            }
        }
        Err(Error::NoMatchingRole(
            "no configured role matches the encryption certificate".into(),
        ))
    }

    /// Bind raw MIME parts to the attachment placeholders declared in the
    /// content tree.  Parts without a matching declaration are kept as
    /// opaque attachments.
    fn bind_attachments(&self, msg: &mut OsciMessage, parts: &[MimePart]) -> Result<()> {
        let declared = msg.attachment_refs();
        for part in parts {
            let cid = part.content_id.clone().unwrap_or_default();
            let data = part.decoded_body()?;
            let mut attachment = Attachment::from_bytes(&cid, data);
            attachment.base64_encoded = part.is_base64();
            if !declared.contains(&cid) {
                tracing::debug!(content_id = %cid, "MIME part has no content reference, kept opaque");
            }
            msg.body.attachments.push(attachment);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osci_message::compose;
    use osci_message::msg::OsciMessageType;
    use osci_message::parts::ControlBlock;
    use osci_message::ContentContainer;

    fn cfg() -> OsciConfig {
        OsciConfig::default()
    }

    fn store_delivery_with_attachment() -> OsciMessage {
        let mut msg = OsciMessage::new(OsciMessageType::StoreDelivery);
        msg.control_block = Some(ControlBlock {
            challenge: Some("c".into()),
            conversation_id: Some("conv".into()),
            sequence_number: Some(0),
            response: None,
        });
        let mut container = ContentContainer::new();
        container.add_inline("hello");
        container.add_attachment_ref("att-1");
        msg.body.containers.push(container);
        msg.body
            .attachments
            .push(Attachment::from_bytes("att-1", b"binary payload \x00\x01".to_vec()));
        msg
    }

    #[test]
    fn mime_roundtrip_binds_attachments_byte_exact() {
        let mut msg = store_delivery_with_attachment();
        let mime = compose::serialize(&mut msg).unwrap();

        let dispatcher = IncomingDispatcher::new(&cfg());
        let parsed = dispatcher.process(&mime, None).unwrap();
        assert_eq!(parsed.message_type, OsciMessageType::StoreDelivery);
        assert_eq!(parsed.body.containers[0].inline_text(), Some("hello"));
        let attachment = parsed.attachment("att-1").unwrap();
        assert_eq!(attachment.data().unwrap(), b"binary payload \x00\x01");
    }

    #[test]
    fn plaintext_rejected_on_encrypted_dialog() {
        use osci_keys::RoleKind;
        let mut msg = store_delivery_with_attachment();
        let mime = compose::serialize(&mut msg).unwrap();

        let mut dialog = DialogHandler::new(
            Role::originator("client"),
            Role::new(RoleKind::Intermediary, "supplier"),
        );
        dialog.encrypted = true;
        let dispatcher = IncomingDispatcher::new(&cfg());
        let err = dispatcher.process(&mime, Some(&mut dialog)).unwrap_err();
        assert!(matches!(err, Error::ProtocolState(_)));
    }

    #[test]
    fn soap_fault_exempt_from_encryption_policy() {
        use osci_keys::RoleKind;
        let mut msg = OsciMessage::new(OsciMessageType::SoapFault);
        msg.body.fault = Some(osci_message::SoapFaultInfo {
            code: "soap:Server".into(),
            text: "rejected".into(),
            osci_code: Some("9601".into()),
        });
        let mime = compose::serialize(&mut msg).unwrap();

        let mut dialog = DialogHandler::new(
            Role::originator("client"),
            Role::new(RoleKind::Intermediary, "supplier"),
        );
        dialog.encrypted = true;
        let dispatcher = IncomingDispatcher::new(&cfg());
        let parsed = dispatcher.process(&mime, Some(&mut dialog)).unwrap();
        assert_eq!(parsed.message_type, OsciMessageType::SoapFault);
    }
}
