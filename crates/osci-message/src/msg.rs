#![forbid(unsafe_code)]

//! The typed message envelope.

use crate::content::{Attachment, ContentContainer, EncryptedDataOsci};
use crate::parts::{
    CertificatesHeader, ChunkInformation, ControlBlock, CustomHeader, DeliveryHeader,
    DesiredLanguages, FeatureDescription, FeedbackEntry, ProcessCardBundle, QualityOfTimestamp,
    SoapFaultInfo,
};
use crate::signature::SignatureHeader;
use osci_keys::Role;
use std::collections::HashMap;

/// The message kinds of OSCI-Transport 1.2, identified on the wire by the
/// `xsi:schemaLocation` of the SOAP envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsciMessageType {
    InitDialog,
    ResponseToInitDialog,
    ExitDialog,
    ResponseToExitDialog,
    GetMessageId,
    ResponseToGetMessageId,
    StoreDelivery,
    ResponseToStoreDelivery,
    FetchDelivery,
    ResponseToFetchDelivery,
    FetchProcessCard,
    ResponseToFetchProcessCard,
    ForwardDelivery,
    ResponseToForwardDelivery,
    AcceptDelivery,
    ResponseToAcceptDelivery,
    ProcessDelivery,
    ResponseToProcessDelivery,
    MediateDelivery,
    ResponseToMediateDelivery,
    PartialStoreDelivery,
    ResponseToPartialStoreDelivery,
    PartialFetchDelivery,
    ResponseToPartialFetchDelivery,
    SoapMessageEncrypted,
    SoapFault,
}

impl OsciMessageType {
    /// The message name as it appears in the schema file reference.
    pub fn name(&self) -> &'static str {
        use OsciMessageType::*;
        match self {
            InitDialog => "InitDialog",
            ResponseToInitDialog => "ResponseToInitDialog",
            ExitDialog => "ExitDialog",
            ResponseToExitDialog => "ResponseToExitDialog",
            GetMessageId => "GetMessageId",
            ResponseToGetMessageId => "ResponseToGetMessageId",
            StoreDelivery => "StoreDelivery",
            ResponseToStoreDelivery => "ResponseToStoreDelivery",
            FetchDelivery => "FetchDelivery",
            ResponseToFetchDelivery => "ResponseToFetchDelivery",
            FetchProcessCard => "FetchProcessCard",
            ResponseToFetchProcessCard => "ResponseToFetchProcessCard",
            ForwardDelivery => "ForwardDelivery",
            ResponseToForwardDelivery => "ResponseToForwardDelivery",
            AcceptDelivery => "AcceptDelivery",
            ResponseToAcceptDelivery => "ResponseToAcceptDelivery",
            ProcessDelivery => "ProcessDelivery",
            ResponseToProcessDelivery => "ResponseToProcessDelivery",
            MediateDelivery => "MediateDelivery",
            ResponseToMediateDelivery => "ResponseToMediateDelivery",
            PartialStoreDelivery => "PartialStoreDelivery",
            ResponseToPartialStoreDelivery => "ResponseToPartialStoreDelivery",
            PartialFetchDelivery => "PartialFetchDelivery",
            ResponseToPartialFetchDelivery => "ResponseToPartialFetchDelivery",
            SoapMessageEncrypted => "SoapMessageEncrypted",
            SoapFault => "SoapFault",
        }
    }

    /// Schema file token carried in `xsi:schemaLocation`.
    pub fn schema_file(&self) -> &'static str {
        use OsciMessageType::*;
        match self {
            InitDialog => "soapInitDialog.xsd",
            ResponseToInitDialog => "soapResponseToInitDialog.xsd",
            ExitDialog => "soapExitDialog.xsd",
            ResponseToExitDialog => "soapResponseToExitDialog.xsd",
            GetMessageId => "soapGetMessageId.xsd",
            ResponseToGetMessageId => "soapResponseToGetMessageId.xsd",
            StoreDelivery => "soapStoreDelivery.xsd",
            ResponseToStoreDelivery => "soapResponseToStoreDelivery.xsd",
            FetchDelivery => "soapFetchDelivery.xsd",
            ResponseToFetchDelivery => "soapResponseToFetchDelivery.xsd",
            FetchProcessCard => "soapFetchProcessCard.xsd",
            ResponseToFetchProcessCard => "soapResponseToFetchProcessCard.xsd",
            ForwardDelivery => "soapForwardDelivery.xsd",
            ResponseToForwardDelivery => "soapResponseToForwardDelivery.xsd",
            AcceptDelivery => "soapAcceptDelivery.xsd",
            ResponseToAcceptDelivery => "soapResponseToAcceptDelivery.xsd",
            ProcessDelivery => "soapProcessDelivery.xsd",
            ResponseToProcessDelivery => "soapResponseToProcessDelivery.xsd",
            MediateDelivery => "soapMediateDelivery.xsd",
            ResponseToMediateDelivery => "soapResponseToMediateDelivery.xsd",
            PartialStoreDelivery => "soapPartialStoreDelivery.xsd",
            ResponseToPartialStoreDelivery => "soapResponseToPartialStoreDelivery.xsd",
            PartialFetchDelivery => "soapPartialFetchDelivery.xsd",
            ResponseToPartialFetchDelivery => "soapResponseToPartialFetchDelivery.xsd",
            SoapMessageEncrypted => "soapMessageEncrypted.xsd",
            SoapFault => "soapFault.xsd",
        }
    }

    /// Recognize a message type from the schema file token.
    pub fn from_schema_file(token: &str) -> Option<Self> {
        use OsciMessageType::*;
        let all = [
            InitDialog,
            ResponseToInitDialog,
            ExitDialog,
            ResponseToExitDialog,
            GetMessageId,
            ResponseToGetMessageId,
            StoreDelivery,
            ResponseToStoreDelivery,
            FetchDelivery,
            ResponseToFetchDelivery,
            FetchProcessCard,
            ResponseToFetchProcessCard,
            ForwardDelivery,
            ResponseToForwardDelivery,
            AcceptDelivery,
            ResponseToAcceptDelivery,
            ProcessDelivery,
            ResponseToProcessDelivery,
            MediateDelivery,
            ResponseToMediateDelivery,
            PartialStoreDelivery,
            ResponseToPartialStoreDelivery,
            PartialFetchDelivery,
            ResponseToPartialFetchDelivery,
            SoapMessageEncrypted,
            SoapFault,
        ];
        let file = token.rsplit('/').next().unwrap_or(token);
        all.into_iter().find(|t| t.schema_file() == file)
    }

    /// Local name of the message-specific header element.
    pub fn header_element(&self) -> Option<&'static str> {
        use OsciMessageType::*;
        Some(match self {
            InitDialog => "initDialog",
            ResponseToInitDialog => "responseToInitDialog",
            ExitDialog => "exitDialog",
            ResponseToExitDialog => "responseToExitDialog",
            GetMessageId => "getMessageId",
            ResponseToGetMessageId => "responseToGetMessageId",
            StoreDelivery => "storeDelivery",
            ResponseToStoreDelivery => "responseToStoreDelivery",
            FetchDelivery => "fetchDelivery",
            ResponseToFetchDelivery => "responseToFetchDelivery",
            FetchProcessCard => "fetchProcessCard",
            ResponseToFetchProcessCard => "responseToFetchProcessCard",
            ForwardDelivery => "forwardDelivery",
            ResponseToForwardDelivery => "responseToForwardDelivery",
            AcceptDelivery => "acceptDelivery",
            ResponseToAcceptDelivery => "responseToAcceptDelivery",
            ProcessDelivery => "processDelivery",
            ResponseToProcessDelivery => "responseToProcessDelivery",
            MediateDelivery => "mediateDelivery",
            ResponseToMediateDelivery => "responseToMediateDelivery",
            PartialStoreDelivery => "partialStoreDelivery",
            ResponseToPartialStoreDelivery => "responseToPartialStoreDelivery",
            PartialFetchDelivery => "partialFetchDelivery",
            ResponseToPartialFetchDelivery => "responseToPartialFetchDelivery",
            SoapMessageEncrypted | SoapFault => return None,
        })
    }

    /// Whether this is a response (supplier-side) message.
    pub fn is_response(&self) -> bool {
        use OsciMessageType::*;
        matches!(
            self,
            ResponseToInitDialog
                | ResponseToExitDialog
                | ResponseToGetMessageId
                | ResponseToStoreDelivery
                | ResponseToFetchDelivery
                | ResponseToFetchProcessCard
                | ResponseToForwardDelivery
                | ResponseToAcceptDelivery
                | ResponseToProcessDelivery
                | ResponseToMediateDelivery
                | ResponseToPartialStoreDelivery
                | ResponseToPartialFetchDelivery
        )
    }

    /// Responses report the outcome of the operation via Feedback.
    pub fn requires_feedback(&self) -> bool {
        self.is_response()
    }

    /// Deliveries handed over for processing carry their audit trail.
    pub fn requires_process_card(&self) -> bool {
        use OsciMessageType::*;
        matches!(
            self,
            AcceptDelivery | ProcessDelivery | ResponseToStoreDelivery
        )
    }

    /// Dialog continuity is mandatory for every real protocol exchange.
    pub fn requires_control_block(&self) -> bool {
        !matches!(
            self,
            OsciMessageType::SoapMessageEncrypted | OsciMessageType::SoapFault
        )
    }
}

// ── Message state bits ───────────────────────────────────────────────

pub const STATE_COMPOSED: u8 = 0b001;
pub const STATE_SIGNED: u8 = 0b010;
pub const STATE_PARSED: u8 = 0b100;

/// The message body: content containers, encrypted-data entries,
/// attachments and (for fault responses) fault information.
#[derive(Debug, Default)]
pub struct MessageBody {
    pub id: String,
    pub containers: Vec<ContentContainer>,
    pub encrypted_data: Vec<EncryptedDataOsci>,
    pub attachments: Vec<Attachment>,
    pub fault: Option<SoapFaultInfo>,
}

impl MessageBody {
    pub fn new() -> Self {
        Self {
            id: "body".to_owned(),
            ..Self::default()
        }
    }
}

/// A typed OSCI message envelope.
///
/// Built either by the parse pipeline (handlers fill the fields while the
/// document streams through) or by application code before sending.
pub struct OsciMessage {
    pub message_type: OsciMessageType,
    pub control_block: Option<ControlBlock>,
    pub signature: Option<SignatureHeader>,
    pub desired_languages: Option<DesiredLanguages>,
    pub quality_of_timestamp_creation: Option<QualityOfTimestamp>,
    pub quality_of_timestamp_reception: Option<QualityOfTimestamp>,
    pub intermediary_certificates: Option<CertificatesHeader>,
    pub non_intermediary_certificates: Option<CertificatesHeader>,
    pub feature_description: Option<FeatureDescription>,
    pub chunk_information: Option<ChunkInformation>,
    pub delivery_header: Option<DeliveryHeader>,
    pub feedback: Vec<FeedbackEntry>,
    pub process_cards: Vec<ProcessCardBundle>,
    pub quantity_limit: Option<u64>,
    pub custom_headers: Vec<CustomHeader>,
    pub body: MessageBody,
    /// Role bindings recovered from certificate headers or set by the
    /// application.
    pub originator: Option<Role>,
    pub addressee: Option<Role>,
    pub other_roles: Vec<Role>,
    /// Namespace prefix bindings seen on the envelope.
    pub ns_prefixes: Vec<(String, String)>,
    /// MIME boundary for serialization.
    pub boundary: String,
    pub state: u8,
    /// Digests of signature-relevant subtrees, keyed by reference id.
    pub digests: HashMap<String, Vec<u8>>,
    /// Reference ids registered as signature-relevant during parse.
    pub signed_element_ids: Vec<String>,
    /// Transport cipher this message arrived under, when it was unwrapped
    /// from an encrypted envelope.
    pub transport_cipher: Option<String>,
}

impl OsciMessage {
    pub fn new(message_type: OsciMessageType) -> Self {
        Self {
            message_type,
            control_block: None,
            signature: None,
            desired_languages: None,
            quality_of_timestamp_creation: None,
            quality_of_timestamp_reception: None,
            intermediary_certificates: None,
            non_intermediary_certificates: None,
            feature_description: None,
            chunk_information: None,
            delivery_header: None,
            feedback: Vec::new(),
            process_cards: Vec::new(),
            quantity_limit: None,
            custom_headers: Vec::new(),
            body: MessageBody::new(),
            originator: None,
            addressee: None,
            other_roles: Vec::new(),
            ns_prefixes: Vec::new(),
            boundary: "MIME_boundary".to_owned(),
            state: 0,
            digests: HashMap::new(),
            signed_element_ids: Vec::new(),
            transport_cipher: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn is_parsed(&self) -> bool {
        self.state & STATE_PARSED != 0
    }

    /// All attachment placeholders in the content tree, by content id.
    pub fn attachment_refs(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for container in &self.body.containers {
            container.collect_attachment_refs(&mut ids);
        }
        ids
    }

    /// Find a bound attachment by content id.
    pub fn attachment(&self, content_id: &str) -> Option<&Attachment> {
        self.body
            .attachments
            .iter()
            .find(|a| a.content_id == content_id)
    }
}

impl std::fmt::Debug for OsciMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsciMessage")
            .field("message_type", &self.message_type)
            .field("signed", &self.is_signed())
            .field("state", &self.state)
            .field("containers", &self.body.containers.len())
            .field("attachments", &self.body.attachments.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_file_roundtrip() {
        let t = OsciMessageType::StoreDelivery;
        assert_eq!(
            OsciMessageType::from_schema_file(t.schema_file()),
            Some(t)
        );
        assert_eq!(
            OsciMessageType::from_schema_file("soapMessageEncrypted.xsd"),
            Some(OsciMessageType::SoapMessageEncrypted)
        );
        assert_eq!(OsciMessageType::from_schema_file("soapNope.xsd"), None);
    }

    #[test]
    fn response_classification() {
        assert!(OsciMessageType::ResponseToStoreDelivery.is_response());
        assert!(!OsciMessageType::StoreDelivery.is_response());
        assert!(OsciMessageType::ResponseToStoreDelivery.requires_feedback());
        assert!(OsciMessageType::AcceptDelivery.requires_process_card());
        assert!(!OsciMessageType::SoapMessageEncrypted.requires_control_block());
    }

    #[test]
    fn header_element_names() {
        assert_eq!(
            OsciMessageType::StoreDelivery.header_element(),
            Some("storeDelivery")
        );
        assert_eq!(OsciMessageType::SoapFault.header_element(), None);
    }
}
