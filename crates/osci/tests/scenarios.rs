//! End-to-end scenarios over the full pipeline: compose, sign, serialize,
//! MIME split, transport encryption, parse, verify.

mod common;

use common::rsa_identity;
use osci::core::{algorithm, Error, OsciConfig};
use osci::inbound::{verify, DialogHandler, IncomingDispatcher};
use osci::keys::RoleKind;
use osci::message::compose;
use osci::message::msg::OsciMessageType;
use osci::message::parts::ControlBlock;
use osci::message::{Attachment, ContentContainer, OsciMessage};

fn cfg() -> OsciConfig {
    OsciConfig::default()
}

fn store_delivery_hello() -> OsciMessage {
    let mut msg = OsciMessage::new(OsciMessageType::StoreDelivery);
    msg.control_block = Some(ControlBlock {
        challenge: Some("challenge-1".into()),
        conversation_id: Some("conv-1".into()),
        sequence_number: Some(0),
        response: None,
    });
    let mut container = ContentContainer::new();
    container.add_inline("hello");
    msg.body.containers.push(container);
    msg
}

// ── Scenario A: sign, serialize, parse back, verify ──────────────────

#[test]
fn signed_store_delivery_roundtrip_verifies() {
    let cfg = cfg();
    let originator = rsa_identity(RoleKind::Originator, "originator");

    let mut msg = store_delivery_hello();
    compose::sign_message(&mut msg, &originator.role, &cfg).unwrap();
    let mime = compose::serialize(&mut msg).unwrap();

    let dispatcher = IncomingDispatcher::new(&cfg);
    let parsed = dispatcher.process(&mime, None).unwrap();

    assert_eq!(parsed.message_type, OsciMessageType::StoreDelivery);
    assert!(parsed.is_signed());
    assert_eq!(parsed.body.containers[0].inline_text(), Some("hello"));

    // Verifying an unmodified message twice yields the same outcome.
    verify::verify_signature(&parsed, None).unwrap();
    verify::verify_signature(&parsed, None).unwrap();

    // Digest coverage invariant.
    for id in &parsed.signed_element_ids {
        assert!(parsed.digests.contains_key(id));
    }
    assert_eq!(
        parsed.digests.len(),
        parsed.signature.as_ref().unwrap().references.len()
    );
}

#[test]
fn single_flipped_body_bit_fails_verification() {
    let cfg = cfg();
    let originator = rsa_identity(RoleKind::Originator, "originator");

    let mut msg = store_delivery_hello();
    compose::sign_message(&mut msg, &originator.role, &cfg).unwrap();
    let mut mime = compose::serialize(&mut msg).unwrap();

    // Flip one character of the base64 body content, keeping it valid
    // base64 so the failure is the digest check, not decoding.
    let marker = b"Base64Content>";
    let pos = mime
        .windows(marker.len())
        .position(|w| w == marker)
        .expect("body content present")
        + marker.len();
    mime[pos] = if mime[pos] == b'a' { b'b' } else { b'a' };

    let dispatcher = IncomingDispatcher::new(&cfg);
    let err = dispatcher.process(&mime, None).unwrap_err();
    assert!(matches!(err, Error::SignatureInvalid(_)));
    assert_eq!(err.protocol_code(), Some("9601"));
}

// ── Transport encryption: decrypt-and-recurse ────────────────────────

#[test]
fn encrypted_envelope_unwraps_within_one_recursion() {
    let cfg = cfg();
    let originator = rsa_identity(RoleKind::Originator, "originator");
    let supplier = rsa_identity(RoleKind::Intermediary, "supplier");

    let mut msg = store_delivery_hello();
    compose::sign_message(&mut msg, &originator.role, &cfg).unwrap();
    let plain_mime = compose::serialize(&mut msg).unwrap();

    let encrypted = compose::encrypt_transport(
        &plain_mime,
        &supplier.role,
        algorithm::AES256_CBC,
        algorithm::RSA_OAEP,
    )
    .unwrap();

    // Passive recipient: no dialog context, recipient resolved against the
    // default supplier list.
    let dispatcher =
        IncomingDispatcher::new(&cfg).with_default_suppliers(vec![supplier.role.clone()]);
    let parsed = dispatcher.process(&encrypted, None).unwrap();

    assert_eq!(parsed.message_type, OsciMessageType::StoreDelivery);
    assert_eq!(parsed.transport_cipher.as_deref(), Some(algorithm::AES256_CBC));
    assert_eq!(parsed.body.containers[0].inline_text(), Some("hello"));
}

#[test]
fn encrypted_envelope_marks_dialog_encrypted() {
    let cfg = cfg();
    let originator = rsa_identity(RoleKind::Originator, "originator");
    let supplier = rsa_identity(RoleKind::Intermediary, "supplier");

    let mut msg = store_delivery_hello();
    let plain_mime = compose::serialize(&mut msg).unwrap();
    let encrypted = compose::encrypt_transport(
        &plain_mime,
        &supplier.role,
        algorithm::AES128_GCM,
        algorithm::RSA_PKCS1,
    )
    .unwrap();

    let mut dialog = DialogHandler::new(originator.role.clone(), supplier.role.clone());
    let dispatcher = IncomingDispatcher::new(&cfg);
    let parsed = dispatcher.process(&encrypted, Some(&mut dialog)).unwrap();
    assert!(dialog.encrypted);
    assert_eq!(parsed.transport_cipher.as_deref(), Some(algorithm::AES128_GCM));
}

#[test]
fn unknown_recipient_certificate_is_a_role_error() {
    let cfg = cfg();
    let supplier = rsa_identity(RoleKind::Intermediary, "supplier");
    let stranger = rsa_identity(RoleKind::Intermediary, "stranger");

    let mut msg = store_delivery_hello();
    let plain_mime = compose::serialize(&mut msg).unwrap();
    let encrypted = compose::encrypt_transport(
        &plain_mime,
        &supplier.role,
        algorithm::AES256_CBC,
        algorithm::RSA_PKCS1,
    )
    .unwrap();

    let dispatcher =
        IncomingDispatcher::new(&cfg).with_default_suppliers(vec![stranger.role.clone()]);
    let err = dispatcher.process(&encrypted, None).unwrap_err();
    assert!(matches!(err, Error::NoMatchingRole(_)));
}

// ── Scenario B: cipher-reference content-id mismatch ─────────────────

#[test]
fn cipher_reference_content_id_mismatch_is_fatal() {
    let cfg = cfg();
    let supplier = rsa_identity(RoleKind::Intermediary, "supplier");

    let mut msg = store_delivery_hello();
    let plain_mime = compose::serialize(&mut msg).unwrap();
    let encrypted = compose::encrypt_transport(
        &plain_mime,
        &supplier.role,
        algorithm::AES256_CBC,
        algorithm::RSA_PKCS1,
    )
    .unwrap();

    // Rename the ciphertext part so the CipherReference URI no longer
    // matches the Content-ID of the second MIME part.
    let text = String::from_utf8(encrypted).unwrap();
    let tampered = text.replace("Content-ID: <osci_enc>", "Content-ID: <attachment-2>");
    assert_ne!(text, tampered);

    let dispatcher =
        IncomingDispatcher::new(&cfg).with_default_suppliers(vec![supplier.role.clone()]);
    let err = dispatcher.process(tampered.as_bytes(), None).unwrap_err();
    assert!(matches!(err, Error::AttachmentMismatch { .. }));
}

// ── Scenario D: duplicate signature reference ids ────────────────────

#[test]
fn duplicate_signature_reference_rejected_at_parse_time() {
    let cfg = cfg();
    let originator = rsa_identity(RoleKind::Originator, "originator");

    let mut msg = store_delivery_hello();
    compose::sign_message(&mut msg, &originator.role, &cfg).unwrap();
    let mime = compose::serialize(&mut msg).unwrap();

    // Duplicate the controlblock Reference element inside SignedInfo.
    let text = String::from_utf8(mime).unwrap();
    let start = text.find("<ds:Reference URI=\"#controlblock\">").unwrap();
    let end = text[start..].find("</ds:Reference>").unwrap() + start + "</ds:Reference>".len();
    let reference = text[start..end].to_owned();
    let tampered = format!("{}{}{}", &text[..end], reference, &text[end..]);

    let dispatcher = IncomingDispatcher::new(&cfg);
    let err = dispatcher.process(tampered.as_bytes(), None).unwrap_err();
    assert!(matches!(err, Error::DuplicateElement(_)));
}

// ── Attachments ──────────────────────────────────────────────────────

#[test]
fn attachment_payload_roundtrip_is_byte_exact() {
    let cfg = cfg();
    let payload: Vec<u8> = (0u16..600).map(|i| (i % 251) as u8).collect();

    let mut msg = store_delivery_hello();
    msg.body.containers[0].add_attachment_ref("doc-1");
    msg.body
        .attachments
        .push(Attachment::from_bytes("doc-1", payload.clone()));
    let mime = compose::serialize(&mut msg).unwrap();

    let dispatcher = IncomingDispatcher::new(&cfg);
    let parsed = dispatcher.process(&mime, None).unwrap();
    let attachment = parsed.attachment("doc-1").unwrap();
    assert_eq!(attachment.data().unwrap(), payload.as_slice());
}

// ── Role binding ─────────────────────────────────────────────────────

#[test]
fn divergent_certificates_for_one_role_are_rejected() {
    use osci::message::parts::{CertificateEntry, CertificatesHeader};

    let cfg = cfg();
    let a = rsa_identity(RoleKind::Originator, "originator");
    let b = rsa_identity(RoleKind::Originator, "originator");

    let mut msg = store_delivery_hello();
    msg.non_intermediary_certificates = Some(CertificatesHeader {
        id: "nonintermediarycertificates".into(),
        entries: vec![
            CertificateEntry {
                role_tag: "CipherCertificateOriginator".into(),
                id: "originator_cipher".into(),
                der: a.role.cipher_cert().unwrap().der().to_vec(),
            },
            CertificateEntry {
                role_tag: "CipherCertificateOriginator".into(),
                id: "originator_cipher".into(),
                der: b.role.cipher_cert().unwrap().der().to_vec(),
            },
        ],
    });
    let xml = compose::envelope_xml(&msg).unwrap();
    let err = osci::parser::parse_message(&cfg, &xml).unwrap_err();
    assert!(matches!(err, Error::IncompatibleRole(_)));
}
