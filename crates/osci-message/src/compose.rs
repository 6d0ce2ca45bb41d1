#![forbid(unsafe_code)]

//! Compose path: canonical serialization, signing and MIME framing.
//!
//! Every signature-relevant fragment is rendered with the full standard
//! prefix set declared on its root, which is also the namespace scope the
//! parse-side canonicalizer hoists onto tracked subtrees.  Digests computed
//! here therefore agree byte for byte with digests recomputed during parse.

use crate::content::{CipherSource, EncryptedDataOsci, EncryptedKeyOsci};
use crate::msg::{MessageBody, OsciMessage, OsciMessageType, STATE_COMPOSED, STATE_SIGNED};
use crate::parts::write_feedback;
use crate::signature::{SignatureHeader, SignatureReference};
use osci_core::{ns, Error, OsciConfig, Result};
use osci_crypto::digest::DigestSuite;
use osci_keys::Role;
use osci_stream::{b64, CanonicalWriter};

/// Content id of the first MIME part (the XML skeleton).
const SKELETON_CID: &str = "osci@message";

/// Content id of the ciphertext part of an encrypted envelope.
pub const TRANSPORT_CIPHER_CID: &str = "osci_enc";

/// Sign the message's signature-relevant parts with the given role.
pub fn sign_message(msg: &mut OsciMessage, signer_role: &Role, cfg: &OsciConfig) -> Result<()> {
    let signer = signer_role
        .signer()
        .ok_or_else(|| Error::Key(format!("role {} has no signer", signer_role.id)))?;
    let suite = DigestSuite::from_uri(&cfg.digest_uri)?;

    let mut references = Vec::new();
    for (ref_id, bytes) in signable_fragments(msg)? {
        references.push(SignatureReference {
            id: ref_id,
            digest_uri: suite.uri().to_owned(),
            digest_value: suite.hash(&bytes),
        });
    }

    let mut header = SignatureHeader {
        algorithm: signer.algorithm().to_owned(),
        references,
        ..Default::default()
    };
    let signed_info = header.render_signed_info(ns::STANDARD_PREFIXES);
    header.value = signer.sign(&signed_info)?;
    header.signed_info = Some(signed_info);
    header.certificate_der = signer_role.signature_cert().map(|c| c.der().to_vec());

    msg.signature = Some(header);
    msg.state |= STATE_SIGNED;
    Ok(())
}

/// Serialize the message as a MIME multipart stream.
pub fn serialize(msg: &mut OsciMessage) -> Result<Vec<u8>> {
    let envelope = envelope_xml(msg)?;
    let boundary = msg.boundary.clone();

    let mut out = Vec::new();
    push_str(&mut out, "MIME-Version: 1.0\r\n");
    push_str(
        &mut out,
        &format!("Content-Type: multipart/related; boundary=\"{boundary}\"; type=\"text/xml\"\r\n"),
    );
    push_str(&mut out, "\r\n");

    push_str(&mut out, &format!("--{boundary}\r\n"));
    push_str(&mut out, "Content-Type: text/xml; charset=UTF-8\r\n");
    push_str(&mut out, "Content-Transfer-Encoding: 8bit\r\n");
    push_str(&mut out, &format!("Content-ID: <{SKELETON_CID}>\r\n"));
    push_str(&mut out, "\r\n");
    out.extend_from_slice(&envelope);
    push_str(&mut out, "\r\n");

    for attachment in &msg.body.attachments {
        let data = attachment.data()?;
        push_str(&mut out, &format!("--{boundary}\r\n"));
        push_str(&mut out, "Content-Type: application/octet-stream\r\n");
        let encoding = if attachment.base64_encoded { "base64" } else { "8bit" };
        push_str(
            &mut out,
            &format!("Content-Transfer-Encoding: {encoding}\r\n"),
        );
        push_str(
            &mut out,
            &format!("Content-ID: <{}>\r\n", attachment.content_id),
        );
        push_str(&mut out, "\r\n");
        if attachment.base64_encoded {
            push_str(&mut out, &b64::encode(data));
        } else {
            out.extend_from_slice(data);
        }
        push_str(&mut out, "\r\n");
    }

    push_str(&mut out, &format!("--{boundary}--\r\n"));
    msg.state |= STATE_COMPOSED;
    Ok(out)
}

/// Wrap an already-serialized MIME message in a transport-encryption
/// envelope addressed to the recipient's cipher certificate.
pub fn encrypt_transport(
    plain_mime: &[u8],
    recipient: &Role,
    cipher_uri: &str,
    transport_uri: &str,
) -> Result<Vec<u8>> {
    use rand::RngCore;

    let cert = recipient
        .cipher_cert()
        .ok_or_else(|| Error::Key(format!("role {} has no cipher certificate", recipient.id)))?;

    let cipher = osci_crypto::cipher::from_uri(cipher_uri)?;
    let mut session_key = vec![0u8; cipher.key_size()];
    rand::thread_rng().fill_bytes(&mut session_key);
    let ciphertext = cipher.encrypt(&session_key, plain_mime)?;

    let transport = osci_crypto::keytransport::from_uri(transport_uri)?;
    let wrapped = transport.encrypt(&cert.rsa_public_key()?, &session_key)?;

    let enc = EncryptedDataOsci {
        id: None,
        enc_method_uri: cipher_uri.to_owned(),
        keys: vec![EncryptedKeyOsci {
            transport_uri: transport_uri.to_owned(),
            digest_uri: None,
            mgf_uri: None,
            recipient_cert_der: Some(cert.der().to_vec()),
            cipher_value: wrapped,
        }],
        cipher: CipherSource::Reference(format!("cid:{TRANSPORT_CIPHER_CID}")),
    };

    let schema = format!(
        "{} {}",
        ns::OSCI,
        OsciMessageType::SoapMessageEncrypted.schema_file()
    );
    let mut w = CanonicalWriter::new();
    w.start_with_decls(
        "soap:Envelope",
        ns::STANDARD_PREFIXES,
        &[("xsi:schemaLocation", schema.as_str())],
    );
    w.start("soap:Header", &[]);
    w.end();
    w.start_with_decls(
        "soap:Body",
        ns::STANDARD_PREFIXES,
        &[(ns::attr::ID, "body")],
    );
    enc.write_xml(&mut w);
    w.end();
    w.end();
    let envelope = w.into_bytes();

    let boundary = "MIME_boundary";
    let mut out = Vec::new();
    push_str(&mut out, "MIME-Version: 1.0\r\n");
    push_str(
        &mut out,
        &format!("Content-Type: multipart/related; boundary=\"{boundary}\"; type=\"text/xml\"\r\n"),
    );
    push_str(&mut out, "\r\n");
    push_str(&mut out, &format!("--{boundary}\r\n"));
    push_str(&mut out, "Content-Type: text/xml; charset=UTF-8\r\n");
    push_str(&mut out, "Content-Transfer-Encoding: 8bit\r\n");
    push_str(&mut out, &format!("Content-ID: <{SKELETON_CID}>\r\n"));
    push_str(&mut out, "\r\n");
    out.extend_from_slice(&envelope);
    push_str(&mut out, "\r\n");
    push_str(&mut out, &format!("--{boundary}\r\n"));
    push_str(&mut out, "Content-Type: text/base64\r\n");
    push_str(&mut out, "Content-Transfer-Encoding: base64\r\n");
    push_str(&mut out, &format!("Content-ID: <{TRANSPORT_CIPHER_CID}>\r\n"));
    push_str(&mut out, "\r\n");
    push_str(&mut out, &b64::encode(&ciphertext));
    push_str(&mut out, "\r\n");
    push_str(&mut out, &format!("--{boundary}--\r\n"));
    Ok(out)
}

/// Pick the transport cipher for the response to a decrypted request.
///
/// Upgrade-only: a CBC request is answered with GCM when the peer
/// advertised GCM support and the toggle allows it; a GCM request is never
/// downgraded.
pub fn response_cipher_uri(cfg: &OsciConfig, request: &OsciMessage) -> String {
    use osci_core::algorithm;
    let Some(request_cipher) = request.transport_cipher.as_deref() else {
        return cfg.cipher_uri.clone();
    };
    if algorithm::is_gcm(request_cipher) {
        return request_cipher.to_owned();
    }
    let peer_supports_gcm = request
        .feature_description
        .as_ref()
        .is_some_and(|fd| fd.supports_gcm());
    if cfg.gcm_upgrade && peer_supports_gcm && algorithm::is_cbc(request_cipher) {
        tracing::debug!(from = request_cipher, "upgrading transport cipher to GCM");
        return algorithm::AES256_GCM.to_owned();
    }
    request_cipher.to_owned()
}

// ── Fragment rendering ───────────────────────────────────────────────

/// All header and body fragments, in envelope order.  Fragments with a
/// reference id participate in the signature.
fn all_fragments(msg: &OsciMessage) -> Result<Vec<(Option<String>, Vec<u8>)>> {
    let decls = ns::STANDARD_PREFIXES;
    let mut fragments: Vec<(Option<String>, Vec<u8>)> = Vec::new();

    if let Some(cb) = &msg.control_block {
        let mut w = CanonicalWriter::new();
        cb.write_xml(&mut w, decls);
        fragments.push((Some(crate::parts::ControlBlock::ID.to_owned()), w.into_bytes()));
    }
    if let Some(dl) = &msg.desired_languages {
        let mut w = CanonicalWriter::new();
        dl.write_xml(&mut w, decls);
        fragments.push((Some(dl.id.clone()), w.into_bytes()));
    }
    for qots in [
        &msg.quality_of_timestamp_creation,
        &msg.quality_of_timestamp_reception,
    ]
    .into_iter()
    .flatten()
    {
        let mut w = CanonicalWriter::new();
        qots.write_xml(&mut w, decls);
        fragments.push((Some(qots.id().to_owned()), w.into_bytes()));
    }
    if let Some(ci) = &msg.chunk_information {
        let mut w = CanonicalWriter::new();
        ci.write_xml(&mut w, decls);
        fragments.push((Some(crate::parts::ChunkInformation::ID.to_owned()), w.into_bytes()));
    }
    if let Some(fragment) = delivery_header_fragment(msg)? {
        fragments.push(fragment);
    }
    if !msg.feedback.is_empty() {
        let mut w = CanonicalWriter::new();
        write_feedback(&msg.feedback, &mut w, decls);
        fragments.push((Some("feedback".to_owned()), w.into_bytes()));
    }
    if let Some(fd) = &msg.feature_description {
        let mut w = CanonicalWriter::new();
        fd.write_xml(&mut w, decls);
        fragments.push((Some(fd.id.clone()), w.into_bytes()));
    }
    if let Some(certs) = &msg.intermediary_certificates {
        let mut w = CanonicalWriter::new();
        certs.write_xml(&mut w, "osci:IntermediaryCertificates", decls);
        fragments.push((Some(certs.id.clone()), w.into_bytes()));
    }
    if let Some(certs) = &msg.non_intermediary_certificates {
        let mut w = CanonicalWriter::new();
        certs.write_xml(&mut w, "osci:NonIntermediaryCertificates", decls);
        fragments.push((Some(certs.id.clone()), w.into_bytes()));
    }
    for custom in &msg.custom_headers {
        fragments.push((custom.id.clone(), custom.xml.clone()));
    }
    Ok(fragments)
}

/// The message-specific header fragment, when the type has one.
fn delivery_header_fragment(msg: &OsciMessage) -> Result<Option<(Option<String>, Vec<u8>)>> {
    let Some(local) = msg.message_type.header_element() else {
        return Ok(None);
    };
    let header = msg
        .delivery_header
        .clone()
        .unwrap_or_else(|| crate::parts::DeliveryHeader::for_type(local));

    let mut w = CanonicalWriter::new();
    w.start_with_decls(
        &format!("osci:{local}"),
        ns::STANDARD_PREFIXES,
        &[(ns::attr::ID, header.id.as_str())],
    );
    if let Some(id) = &header.message_id {
        w.element("osci:MessageId", &[], id);
    }
    if let Some(subject) = &header.subject {
        w.element("osci:Subject", &[], subject);
    }
    if let Some(rule) = &header.selection_rule {
        w.element("osci:SelectionRule", &[], rule);
    }
    if let Some(limit) = msg.quantity_limit {
        let limit = limit.to_string();
        w.start("osci:Quantity", &[(ns::attr::LIMIT, limit.as_str())]);
        w.end();
    }
    for card in &msg.process_cards {
        card.write_xml(&mut w);
    }
    w.end();
    Ok(Some((Some(header.id.clone()), w.into_bytes())))
}

fn body_fragment(body: &MessageBody) -> Vec<u8> {
    let mut w = CanonicalWriter::new();
    w.start_with_decls(
        "soap:Body",
        ns::STANDARD_PREFIXES,
        &[(ns::attr::ID, body.id.as_str())],
    );
    if let Some(fault) = &body.fault {
        w.start("soap:Fault", &[]);
        w.element("faultcode", &[], &fault.code);
        w.element("faultstring", &[], &fault.text);
        w.end();
    } else if !body.containers.is_empty() || !body.encrypted_data.is_empty() {
        w.start("osci:ContentPackage", &[]);
        for container in &body.containers {
            container.write_xml(&mut w);
        }
        for enc in &body.encrypted_data {
            enc.write_xml(&mut w);
        }
        w.end();
    }
    w.end();
    w.into_bytes()
}

/// Fragments participating in the signature, in reference order.
fn signable_fragments(msg: &OsciMessage) -> Result<Vec<(String, Vec<u8>)>> {
    let mut signable = Vec::new();
    for (ref_id, bytes) in all_fragments(msg)? {
        if let Some(ref_id) = ref_id {
            signable.push((ref_id, bytes));
        }
    }
    signable.push((msg.body.id.clone(), body_fragment(&msg.body)));
    Ok(signable)
}

/// Render the complete SOAP envelope.
pub fn envelope_xml(msg: &OsciMessage) -> Result<Vec<u8>> {
    use osci_stream::writer::{render_end, render_start};

    let schema = format!("{} {}", ns::OSCI, msg.message_type.schema_file());
    let mut out = Vec::new();
    render_start(
        &mut out,
        "soap:Envelope",
        ns::STANDARD_PREFIXES,
        &[("xsi:schemaLocation", schema.as_str())],
    );
    render_start(&mut out, "soap:Header", &[], &[]);

    let mut fragments = all_fragments(msg)?;
    // The signature header follows the ControlBlock.
    if let Some(signature) = &msg.signature {
        let mut w = CanonicalWriter::new();
        signature.write_xml(&mut w, msg.message_type.is_response(), ns::STANDARD_PREFIXES);
        let position = if fragments.is_empty() { 0 } else { 1 };
        fragments.insert(position, (None, w.into_bytes()));
    }
    for (_, bytes) in &fragments {
        out.extend_from_slice(bytes);
    }

    render_end(&mut out, "soap:Header");
    out.extend_from_slice(&body_fragment(&msg.body));
    render_end(&mut out, "soap:Envelope");
    Ok(out)
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentContainer;
    use crate::parts::{ControlBlock, Feature, FeatureDescription, FEATURE_GCM};
    use osci_core::algorithm;

    fn store_delivery() -> OsciMessage {
        let mut msg = OsciMessage::new(OsciMessageType::StoreDelivery);
        msg.control_block = Some(ControlBlock {
            challenge: Some("ch-1".into()),
            conversation_id: Some("conv-1".into()),
            sequence_number: Some(0),
            response: None,
        });
        let mut container = ContentContainer::new();
        container.add_inline("hello");
        msg.body.containers.push(container);
        msg
    }

    #[test]
    fn envelope_contains_schema_location_and_body() {
        let msg = store_delivery();
        let xml = String::from_utf8(envelope_xml(&msg).unwrap()).unwrap();
        assert!(xml.contains("soapStoreDelivery.xsd"));
        assert!(xml.contains("<soap:Body"));
        assert!(xml.contains("osci:ContentPackage"));
    }

    #[test]
    fn serialize_produces_multipart_mime() {
        let mut msg = store_delivery();
        let mime = serialize(&mut msg).unwrap();
        let text = String::from_utf8_lossy(&mime);
        assert!(text.starts_with("MIME-Version: 1.0"));
        assert!(text.contains("--MIME_boundary\r\n"));
        assert!(text.contains("--MIME_boundary--"));
        assert_ne!(msg.state & STATE_COMPOSED, 0);
    }

    #[test]
    fn signable_fragments_cover_header_parts_and_body() {
        let msg = store_delivery();
        let ids: Vec<String> = signable_fragments(&msg)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["controlblock", "storedelivery", "body"]);
    }

    #[test]
    fn response_cipher_upgrade_only() {
        let cfg = OsciConfig::default();
        let mut request = OsciMessage::new(OsciMessageType::StoreDelivery);
        request.transport_cipher = Some(algorithm::AES256_CBC.to_owned());

        // Peer silent about GCM: stay on CBC.
        assert_eq!(response_cipher_uri(&cfg, &request), algorithm::AES256_CBC);

        // Peer advertises GCM: upgrade.
        request.feature_description = Some(FeatureDescription {
            features: vec![Feature {
                key: FEATURE_GCM.to_owned(),
                version: None,
            }],
            ..Default::default()
        });
        assert_eq!(response_cipher_uri(&cfg, &request), algorithm::AES256_GCM);

        // Toggle off: no upgrade.
        let mut cfg_off = OsciConfig::default();
        cfg_off.gcm_upgrade = false;
        assert_eq!(
            response_cipher_uri(&cfg_off, &request),
            algorithm::AES256_CBC
        );

        // GCM request is never downgraded, flag or not.
        request.transport_cipher = Some(algorithm::AES128_GCM.to_owned());
        assert_eq!(
            response_cipher_uri(&cfg_off, &request),
            algorithm::AES128_GCM
        );
    }
}
