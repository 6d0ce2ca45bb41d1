#![forbid(unsafe_code)]

//! Header part types: ControlBlock, Feedback, ProcessCardBundle,
//! ChunkInformation, FeatureDescription and the smaller parts.

use osci_core::ns;
use osci_stream::CanonicalWriter;

/// Feature key a peer advertises when it accepts GCM transport encryption.
pub const FEATURE_GCM: &str = "GCMPaddingModus";

/// Session/dialog continuity token.
///
/// Challenge, response and sequence number must be threaded consistently
/// across a request/response pair within one dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlBlock {
    pub response: Option<String>,
    pub challenge: Option<String>,
    pub conversation_id: Option<String>,
    pub sequence_number: Option<u64>,
}

impl ControlBlock {
    pub const ID: &'static str = "controlblock";

    pub fn write_xml(&self, w: &mut CanonicalWriter, decls: &[(&str, &str)]) {
        let seq = self.sequence_number.map(|n| n.to_string());
        let mut attrs: Vec<(&str, &str)> = vec![(ns::attr::ID, Self::ID)];
        if let Some(conv) = &self.conversation_id {
            attrs.push((ns::attr::CONVERSATION_ID, conv.as_str()));
        }
        if let Some(seq) = &seq {
            attrs.push((ns::attr::SEQUENCE_NUMBER, seq.as_str()));
        }
        w.start_with_decls("osci:ControlBlock", decls, &attrs);
        if let Some(response) = &self.response {
            w.element("osci:Response", &[], response);
        }
        if let Some(challenge) = &self.challenge {
            w.element("osci:Challenge", &[], challenge);
        }
        w.end();
    }
}

/// One localized feedback entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackEntry {
    pub language: String,
    pub code: String,
    pub text: String,
}

impl FeedbackEntry {
    pub fn new(language: &str, code: &str, text: &str) -> Self {
        Self {
            language: language.to_owned(),
            code: code.to_owned(),
            text: text.to_owned(),
        }
    }
}

pub fn write_feedback(entries: &[FeedbackEntry], w: &mut CanonicalWriter, decls: &[(&str, &str)]) {
    w.start_with_decls("osci:Feedback", decls, &[(ns::attr::ID, "feedback")]);
    for entry in entries {
        w.start("osci:Entry", &[("xml:lang", entry.language.as_str())]);
        w.element("osci:Code", &[], &entry.code);
        w.element("osci:Text", &[], &entry.text);
        w.end();
    }
    w.end();
}

/// Languages the client would like feedback in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredLanguages {
    pub id: String,
    pub languages: Vec<String>,
}

impl DesiredLanguages {
    pub const ID: &'static str = "desiredlanguages";

    pub fn new(languages: &[&str]) -> Self {
        Self {
            id: Self::ID.to_owned(),
            languages: languages.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    pub fn write_xml(&self, w: &mut CanonicalWriter, decls: &[(&str, &str)]) {
        let list = self.languages.join(" ");
        w.start_with_decls(
            "osci:DesiredLanguages",
            decls,
            &[(ns::attr::ID, self.id.as_str()), (ns::attr::LANGUAGES_LIST, list.as_str())],
        );
        w.end();
    }
}

/// Requested timestamp quality for creation or reception of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityOfTimestamp {
    /// `false` = creation, `true` = reception.
    pub reception: bool,
    pub cryptographic: bool,
}

impl QualityOfTimestamp {
    pub fn id(&self) -> &'static str {
        if self.reception {
            "qualityoftimestamp_reception"
        } else {
            "qualityoftimestamp_creation"
        }
    }

    pub fn write_xml(&self, w: &mut CanonicalWriter, decls: &[(&str, &str)]) {
        let service = if self.reception { "reception" } else { "creation" };
        let quality = if self.cryptographic { "cryptographic" } else { "plain" };
        w.start_with_decls(
            "osci:QualityOfTimestamp",
            decls,
            &[
                (ns::attr::ID, self.id()),
                (ns::attr::QUALITY, quality),
                (ns::attr::SERVICE, service),
            ],
        );
        w.end();
    }
}

/// A timestamp in a process card, plain or cryptographic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    pub cryptographic: bool,
    pub value: String,
}

/// Certificate inspection result inside a process card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    pub subject: Option<String>,
    pub cert_type: Option<String>,
    pub math_result: Option<String>,
    pub offline_result: Option<String>,
}

/// The audit trail ("Laufzettel") of a delivery.  Read-only once parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessCardBundle {
    pub message_id: Option<String>,
    pub recent_modification: Option<String>,
    pub creation: Option<Timestamp>,
    pub forwarding: Option<Timestamp>,
    pub reception: Option<Timestamp>,
    pub subject: Option<String>,
    pub inspections: Vec<Inspection>,
}

impl ProcessCardBundle {
    pub fn write_xml(&self, w: &mut CanonicalWriter) {
        let attrs: Vec<(&str, &str)> = self
            .recent_modification
            .as_deref()
            .map(|m| vec![(ns::attr::RECENT_MODIFICATION, m)])
            .unwrap_or_default();
        w.start("osci:ProcessCardBundle", &[]);
        if let Some(id) = &self.message_id {
            w.element("osci:MessageId", &[], id);
        }
        w.start("osci:ProcessCard", &attrs);
        write_timestamp(w, "osci:Creation", self.creation.as_ref());
        write_timestamp(w, "osci:Forwarding", self.forwarding.as_ref());
        write_timestamp(w, "osci:Reception", self.reception.as_ref());
        if let Some(subject) = &self.subject {
            w.element("osci:Subject", &[], subject);
        }
        w.end();
        if !self.inspections.is_empty() {
            w.start("osci:InspectionReport", &[]);
            for inspection in &self.inspections {
                w.start("osci:Inspection", &[]);
                if let Some(s) = &inspection.subject {
                    w.element("osci:X509SubjectName", &[], s);
                }
                if let Some(t) = &inspection.cert_type {
                    w.element("osci:CertType", &[], t);
                }
                if let Some(r) = &inspection.math_result {
                    w.element("osci:MathResult", &[], r);
                }
                if let Some(r) = &inspection.offline_result {
                    w.element("osci:OfflineResult", &[], r);
                }
                w.end();
            }
            w.end();
        }
        w.end();
    }
}

fn write_timestamp(w: &mut CanonicalWriter, qname: &str, ts: Option<&Timestamp>) {
    let Some(ts) = ts else { return };
    w.start(qname, &[]);
    w.start("osci:Timestamp", &[]);
    if ts.cryptographic {
        w.element("osci:Cryptographic", &[], &ts.value);
    } else {
        w.element("osci:Plain", &[], &ts.value);
    }
    w.end();
    w.end();
}

/// Metadata for one fragment of a partial (chunked) message exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkInformation {
    pub chunk_number: Option<u64>,
    pub total_chunk_numbers: Option<u64>,
    pub total_message_size: Option<u64>,
    pub chunk_size: Option<u64>,
}

impl ChunkInformation {
    pub const ID: &'static str = "chunkinformation";

    pub fn write_xml(&self, w: &mut CanonicalWriter, decls: &[(&str, &str)]) {
        let values: Vec<(&str, Option<String>)> = vec![
            (ns::attr::CHUNK_NUMBER, self.chunk_number.map(|v| v.to_string())),
            (
                ns::attr::CHUNK_SIZE,
                self.chunk_size.map(|v| v.to_string()),
            ),
            (
                ns::attr::TOTAL_CHUNK_NUMBERS,
                self.total_chunk_numbers.map(|v| v.to_string()),
            ),
            (
                ns::attr::TOTAL_MESSAGE_SIZE,
                self.total_message_size.map(|v| v.to_string()),
            ),
        ];
        let mut attrs: Vec<(&str, &str)> = vec![(ns::attr::ID, Self::ID)];
        for (key, value) in &values {
            if let Some(value) = value {
                attrs.push((*key, value.as_str()));
            }
        }
        w.start_with_decls("osci:ChunkInformation", decls, &attrs);
        w.end();
    }
}

/// One advertised protocol feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub key: String,
    pub version: Option<String>,
}

/// Capabilities a peer advertises, used among other things to decide the
/// one-directional CBC→GCM transport upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureDescription {
    pub id: String,
    pub features: Vec<Feature>,
}

impl Default for FeatureDescription {
    fn default() -> Self {
        Self {
            id: Self::ID.to_owned(),
            features: Vec::new(),
        }
    }
}

impl FeatureDescription {
    pub const ID: &'static str = "featuredescription";

    pub fn supports(&self, key: &str) -> bool {
        self.features.iter().any(|f| f.key == key)
    }

    pub fn supports_gcm(&self) -> bool {
        self.supports(FEATURE_GCM)
    }

    pub fn write_xml(&self, w: &mut CanonicalWriter, decls: &[(&str, &str)]) {
        w.start_with_decls(
            "osci:FeatureDescription",
            decls,
            &[(ns::attr::ID, self.id.as_str())],
        );
        if !self.features.is_empty() {
            w.start("osci:SupportedFeatures", &[]);
            for feature in &self.features {
                let mut attrs: Vec<(&str, &str)> = vec![(ns::attr::KEY, feature.key.as_str())];
                if let Some(version) = &feature.version {
                    attrs.push((ns::attr::VERSION, version.as_str()));
                }
                w.start("osci:Feature", &attrs);
                w.end();
            }
            w.end();
        }
        w.end();
    }
}

/// Which role a certificate entry belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateEntry {
    /// Element local name, e.g. `CipherCertificateOriginator`.
    pub role_tag: String,
    pub id: String,
    pub der: Vec<u8>,
}

/// An `IntermediaryCertificates` or `NonIntermediaryCertificates` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificatesHeader {
    pub id: String,
    pub entries: Vec<CertificateEntry>,
}

impl CertificatesHeader {
    pub fn write_xml(&self, w: &mut CanonicalWriter, qname: &str, decls: &[(&str, &str)]) {
        w.start_with_decls(qname, decls, &[(ns::attr::ID, self.id.as_str())]);
        for entry in &self.entries {
            w.start(
                &format!("osci:{}", entry.role_tag),
                &[(ns::attr::ID, entry.id.as_str())],
            );
            w.start("ds:X509Data", &[]);
            w.element(
                "ds:X509Certificate",
                &[],
                &osci_stream::b64::encode(&entry.der),
            );
            w.end();
            w.end();
        }
        w.end();
    }
}

/// Message-specific header element (`storeDelivery`, `fetchProcessCard`,
/// `responseToFetchProcessCard`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryHeader {
    /// Element local name.
    pub name: String,
    pub id: String,
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub selection_rule: Option<String>,
}

impl DeliveryHeader {
    pub fn for_type(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            id: name.to_lowercase(),
            ..Self::default()
        }
    }
}

/// An unrecognized SOAP header, preserved verbatim so it can be part of the
/// signature scope as an opaque block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomHeader {
    pub qname: String,
    pub id: Option<String>,
    pub xml: Vec<u8>,
}

/// Fault information from a SOAP fault response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoapFaultInfo {
    pub code: String,
    pub text: String,
    pub osci_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<F: FnOnce(&mut CanonicalWriter)>(f: F) -> String {
        let mut w = CanonicalWriter::new();
        f(&mut w);
        String::from_utf8(w.into_bytes()).unwrap()
    }

    #[test]
    fn control_block_serialization() {
        let cb = ControlBlock {
            response: Some("r1".into()),
            challenge: Some("c1".into()),
            conversation_id: Some("conv".into()),
            sequence_number: Some(3),
        };
        let xml = render(|w| cb.write_xml(w, &[]));
        assert_eq!(
            xml,
            "<osci:ControlBlock ConversationId=\"conv\" Id=\"controlblock\" \
             SequenceNumber=\"3\"><osci:Response>r1</osci:Response>\
             <osci:Challenge>c1</osci:Challenge></osci:ControlBlock>"
        );
    }

    #[test]
    fn feature_description_gcm_flag() {
        let mut fd = FeatureDescription::default();
        assert!(!fd.supports_gcm());
        fd.features.push(Feature {
            key: FEATURE_GCM.to_owned(),
            version: None,
        });
        assert!(fd.supports_gcm());
    }

    #[test]
    fn quality_of_timestamp_ids() {
        let creation = QualityOfTimestamp {
            reception: false,
            cryptographic: false,
        };
        let reception = QualityOfTimestamp {
            reception: true,
            cryptographic: true,
        };
        assert_ne!(creation.id(), reception.id());
        let xml = render(|w| reception.write_xml(w, &[]));
        assert!(xml.contains("Quality=\"cryptographic\""));
        assert!(xml.contains("Service=\"reception\""));
    }

    #[test]
    fn process_card_roundtrip_fields() {
        let pcb = ProcessCardBundle {
            message_id: Some("msg-1".into()),
            creation: Some(Timestamp {
                cryptographic: false,
                value: "2026-08-04T10:00:00".into(),
            }),
            subject: Some("subject".into()),
            ..Default::default()
        };
        let xml = render(|w| pcb.write_xml(w));
        assert!(xml.contains("<osci:MessageId>msg-1</osci:MessageId>"));
        assert!(xml.contains("<osci:Plain>2026-08-04T10:00:00</osci:Plain>"));
    }
}
