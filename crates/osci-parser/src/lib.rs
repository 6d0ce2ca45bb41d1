#![forbid(unsafe_code)]

pub mod dispatcher;
pub mod handlers;
pub mod tracker;

use dispatcher::{run_dispatcher, ParseContext};
use handlers::{BuiltPart, MessageBuilder};
use osci_core::{Error, OsciConfig, Result};
use osci_keys::{OsciCertificate, Role, RoleKind};
use osci_message::msg::STATE_PARSED;
use osci_message::parts::CertificatesHeader;
use osci_message::OsciMessage;

/// Parse one SOAP envelope (the XML skeleton of a MIME message) into a
/// typed message.
///
/// On success the digest map and tracked-id list are populated from the
/// canonizer, the captured `SignedInfo` bytes are attached to the signature
/// header, roles are bound from the certificate headers, and the message
/// carries the `Parsed` state flag.
pub fn parse_message(cfg: &OsciConfig, data: &[u8]) -> Result<OsciMessage> {
    let mut ctx = ParseContext::new(cfg)?;
    let part = run_dispatcher(data, Box::new(MessageBuilder::new()), &mut ctx)?;
    let BuiltPart::Message(mut msg) = part else {
        return Err(Error::XmlStructure("parse produced no message".into()));
    };

    msg.digests = ctx.canonizer.take_digests();
    msg.signed_element_ids = ctx.tracker.ids().to_vec();
    if let Some(signature) = &mut msg.signature {
        signature.signed_info = ctx.canonizer.next_signed_info();
    }
    bind_roles(&mut msg)?;
    msg.state |= STATE_PARSED;
    tracing::debug!(
        message_type = msg.message_type.name(),
        signed = msg.is_signed(),
        tracked = msg.signed_element_ids.len(),
        "parsed OSCI message"
    );
    Ok(*msg)
}

/// Parse a skeleton from a reader while teeing every consumed byte into a
/// `store` sink (for archival or diagnostics).  The sink never affects the
/// parse result.
pub fn parse_message_stored<R, W>(cfg: &OsciConfig, input: R, store: W) -> Result<(OsciMessage, W)>
where
    R: std::io::Read,
    W: std::io::Write,
{
    let mut tee = osci_stream::storeio::StoreInputStream::new(input, store);
    let data = osci_stream::storeio::read_all(&mut tee)?;
    let msg = parse_message(cfg, &data)?;
    let (_, store) = tee.into_parts()?;
    Ok((msg, store))
}

/// Build role bindings from the certificate headers.
///
/// Two certificate entries binding divergent certificates to the same
/// logical role are rejected; the parse never silently picks one.
fn bind_roles(msg: &mut OsciMessage) -> Result<()> {
    let headers: Vec<CertificatesHeader> = msg
        .non_intermediary_certificates
        .iter()
        .chain(msg.intermediary_certificates.iter())
        .cloned()
        .collect();

    for header in headers {
        for entry in &header.entries {
            let cert = OsciCertificate::from_der(entry.der.clone())?;
            let cipher = entry.role_tag.starts_with("CipherCertificate");
            let kind = match entry.role_tag.as_str() {
                t if t.ends_with("Originator") => RoleKind::Originator,
                t if t.ends_with("Addressee") => RoleKind::Addressee,
                t if t.ends_with("Intermediary") => RoleKind::Intermediary,
                t if t.ends_with("OtherAuthor") => RoleKind::Author,
                t if t.ends_with("OtherReader") => RoleKind::Reader,
                other => {
                    return Err(Error::XmlStructure(format!(
                        "unknown certificate entry: {other}"
                    )));
                }
            };
            let role = match kind {
                RoleKind::Originator => msg
                    .originator
                    .get_or_insert_with(|| Role::originator(entry.id.clone())),
                RoleKind::Addressee => msg
                    .addressee
                    .get_or_insert_with(|| Role::addressee(entry.id.clone())),
                _ => {
                    if let Some(pos) = msg
                        .other_roles
                        .iter()
                        .position(|r| r.kind == kind && r.id == entry.id)
                    {
                        &mut msg.other_roles[pos]
                    } else {
                        msg.other_roles.push(Role::new(kind, entry.id.clone()));
                        msg.other_roles.last_mut().expect("just pushed")
                    }
                }
            };
            if cipher {
                role.assign_cipher_cert(cert)?;
            } else {
                role.assign_signature_cert(cert)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use osci_message::msg::OsciMessageType;
    use osci_message::parts::ControlBlock;
    use osci_message::{compose, ContentContainer, OsciMessage};

    fn cfg() -> OsciConfig {
        OsciConfig::default()
    }

    fn basic_message(t: OsciMessageType) -> OsciMessage {
        let mut msg = OsciMessage::new(t);
        msg.control_block = Some(ControlBlock {
            challenge: Some("c".into()),
            conversation_id: Some("conv".into()),
            sequence_number: Some(0),
            response: None,
        });
        msg
    }

    #[test]
    fn parse_store_delivery_roundtrip() {
        let mut msg = basic_message(OsciMessageType::StoreDelivery);
        let mut container = ContentContainer::new();
        container.add_inline("hello");
        msg.body.containers.push(container);

        let xml = compose::envelope_xml(&msg).unwrap();
        let parsed = parse_message(&cfg(), &xml).unwrap();
        assert_eq!(parsed.message_type, OsciMessageType::StoreDelivery);
        assert!(parsed.is_parsed());
        assert_eq!(
            parsed.body.containers[0].inline_text(),
            Some("hello")
        );
        assert_eq!(
            parsed.control_block.as_ref().unwrap().challenge.as_deref(),
            Some("c")
        );
        // Header parts with ids plus the body were tracked and digested.
        assert!(parsed.digests.contains_key("controlblock"));
        assert!(parsed.digests.contains_key("body"));
        assert_eq!(parsed.signed_element_ids.len(), parsed.digests.len());
    }

    #[test]
    fn store_tee_receives_exact_input_bytes() {
        let msg = basic_message(OsciMessageType::InitDialog);
        let xml = compose::envelope_xml(&msg).unwrap();
        let (parsed, store) =
            parse_message_stored(&cfg(), xml.as_slice(), Vec::new()).unwrap();
        assert_eq!(parsed.message_type, OsciMessageType::InitDialog);
        assert_eq!(store, xml);
    }

    #[test]
    fn parse_rejects_garbage_root() {
        let err = parse_message(&cfg(), b"<foo:Bar xmlns:foo=\"urn:x\"></foo:Bar>").unwrap_err();
        assert!(matches!(err, Error::UnexpectedElement(_)));
    }

    #[test]
    fn response_without_feedback_is_rejected() {
        let msg = basic_message(OsciMessageType::ResponseToInitDialog);
        let xml = compose::envelope_xml(&msg).unwrap();
        let err = parse_message(&cfg(), &xml).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingRequiredPart { part: "Feedback", .. }
        ));
    }

    #[test]
    fn stray_text_in_header_is_rejected() {
        let xml = format!(
            "<soap:Envelope xmlns:soap=\"{soap}\" xmlns:osci=\"{osci}\" xmlns:xsi=\"{xsi}\" \
             xsi:schemaLocation=\"{osci} soapInitDialog.xsd\">\
             <soap:Header>loose text</soap:Header><soap:Body></soap:Body></soap:Envelope>",
            soap = osci_core::ns::SOAP,
            osci = osci_core::ns::OSCI,
            xsi = osci_core::ns::XSI,
        );
        let err = parse_message(&cfg(), xml.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::StrayText(_)));
    }

    #[test]
    fn fetch_process_card_response_collects_all_bundles() {
        use osci_message::parts::{FeedbackEntry, ProcessCardBundle};
        let mut msg = basic_message(OsciMessageType::ResponseToFetchProcessCard);
        msg.feedback
            .push(FeedbackEntry::new("de", osci_core::codes::OK, "ok"));
        msg.quantity_limit = Some(2);
        for i in 0..3 {
            msg.process_cards.push(ProcessCardBundle {
                message_id: Some(format!("msg-{i}")),
                ..Default::default()
            });
        }
        let xml = compose::envelope_xml(&msg).unwrap();
        let parsed = parse_message(&cfg(), &xml).unwrap();
        // Server-side limiting is not client-enforced: all three bundles
        // survive, and the declared limit is exposed.
        assert_eq!(parsed.process_cards.len(), 3);
        assert_eq!(parsed.quantity_limit, Some(2));
        assert_eq!(
            parsed.process_cards[2].message_id.as_deref(),
            Some("msg-2")
        );
    }

    #[test]
    fn custom_header_captured_verbatim_and_tracked() {
        let xml = format!(
            "<soap:Envelope xmlns:soap=\"{soap}\" xmlns:osci=\"{osci}\" xmlns:xsi=\"{xsi}\" \
             xsi:schemaLocation=\"{osci} soapInitDialog.xsd\">\
             <soap:Header>\
             <osci:ControlBlock Id=\"controlblock\"><osci:Challenge>x</osci:Challenge></osci:ControlBlock>\
             <app:Routing xmlns:app=\"urn:app\" Id=\"routing\"><app:Hop>relay-1</app:Hop></app:Routing>\
             </soap:Header><soap:Body Id=\"body\"></soap:Body></soap:Envelope>",
            soap = osci_core::ns::SOAP,
            osci = osci_core::ns::OSCI,
            xsi = osci_core::ns::XSI,
        );
        let parsed = parse_message(&cfg(), xml.as_bytes()).unwrap();
        assert_eq!(parsed.custom_headers.len(), 1);
        let custom = &parsed.custom_headers[0];
        assert_eq!(custom.id.as_deref(), Some("routing"));
        let captured = String::from_utf8(custom.xml.clone()).unwrap();
        assert!(captured.contains("<app:Hop>relay-1</app:Hop>"));
        assert!(captured.contains("xmlns:app=\"urn:app\""));
        assert!(parsed.digests.contains_key("routing"));
    }

    #[test]
    fn duplicate_header_part_is_rejected() {
        let xml = format!(
            "<soap:Envelope xmlns:soap=\"{soap}\" xmlns:osci=\"{osci}\" xmlns:xsi=\"{xsi}\" \
             xsi:schemaLocation=\"{osci} soapInitDialog.xsd\">\
             <soap:Header>\
             <osci:ControlBlock Id=\"controlblock\"></osci:ControlBlock>\
             <osci:ControlBlock Id=\"controlblock\"></osci:ControlBlock>\
             </soap:Header><soap:Body Id=\"body\"></soap:Body></soap:Envelope>",
            soap = osci_core::ns::SOAP,
            osci = osci_core::ns::OSCI,
            xsi = osci_core::ns::XSI,
        );
        let err = parse_message(&cfg(), xml.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::DuplicateElement(_)));
    }

    #[test]
    fn soap_fault_recognized_without_schema_location() {
        let xml = format!(
            "<soap:Envelope xmlns:soap=\"{soap}\">\
             <soap:Header></soap:Header>\
             <soap:Body><soap:Fault><faultcode>soap:Server</faultcode>\
             <faultstring>internal</faultstring></soap:Fault></soap:Body></soap:Envelope>",
            soap = osci_core::ns::SOAP,
        );
        let parsed = parse_message(&cfg(), xml.as_bytes()).unwrap();
        assert_eq!(parsed.message_type, OsciMessageType::SoapFault);
        let fault = parsed.body.fault.as_ref().unwrap();
        assert_eq!(fault.code, "soap:Server");
        assert_eq!(fault.text, "internal");
    }
}
