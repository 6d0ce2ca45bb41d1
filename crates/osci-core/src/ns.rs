#![forbid(unsafe_code)]

//! XML namespace and element name constants used across the library.

/// SOAP 1.1 envelope namespace
pub const SOAP: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// OSCI-Transport 1.2 namespace
pub const OSCI: &str = "http://www.osci.de/2002/04/osci";

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML Encryption namespace
pub const XENC: &str = "http://www.w3.org/2001/04/xmlenc#";

/// XML Encryption 1.1 namespace
pub const XENC11: &str = "http://www.w3.org/2009/xmlenc11#";

/// XML Schema instance namespace
pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// The prefix bindings every composed message declares, sorted by prefix.
pub const STANDARD_PREFIXES: &[(&str, &str)] = &[
    ("ds", DSIG),
    ("osci", OSCI),
    ("soap", SOAP),
    ("xenc", XENC),
    ("xenc11", XENC11),
    ("xsi", XSI),
];

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // SOAP elements
    pub const ENVELOPE: &str = "Envelope";
    pub const HEADER: &str = "Header";
    pub const BODY: &str = "Body";
    pub const FAULT: &str = "Fault";
    pub const FAULT_CODE: &str = "faultcode";
    pub const FAULT_STRING: &str = "faultstring";

    // OSCI header elements
    pub const CONTROL_BLOCK: &str = "ControlBlock";
    pub const RESPONSE: &str = "Response";
    pub const CHALLENGE: &str = "Challenge";
    pub const CLIENT_SIGNATURE: &str = "ClientSignature";
    pub const SUPPLIER_SIGNATURE: &str = "SupplierSignature";
    pub const DESIRED_LANGUAGES: &str = "DesiredLanguages";
    pub const QUALITY_OF_TIMESTAMP: &str = "QualityOfTimestamp";
    pub const FEEDBACK: &str = "Feedback";
    pub const ENTRY: &str = "Entry";
    pub const CODE: &str = "Code";
    pub const TEXT: &str = "Text";
    pub const INTERMEDIARY_CERTIFICATES: &str = "IntermediaryCertificates";
    pub const NON_INTERMEDIARY_CERTIFICATES: &str = "NonIntermediaryCertificates";
    pub const FEATURE_DESCRIPTION: &str = "FeatureDescription";
    pub const SUPPORTED_FEATURES: &str = "SupportedFeatures";
    pub const FEATURE: &str = "Feature";
    pub const CHUNK_INFORMATION: &str = "ChunkInformation";

    // Process card elements
    pub const PROCESS_CARD_BUNDLE: &str = "ProcessCardBundle";
    pub const PROCESS_CARD: &str = "ProcessCard";
    pub const MESSAGE_ID: &str = "MessageId";
    pub const CREATION: &str = "Creation";
    pub const FORWARDING: &str = "Forwarding";
    pub const RECEPTION: &str = "Reception";
    pub const TIMESTAMP: &str = "Timestamp";
    pub const PLAIN: &str = "Plain";
    pub const SUBJECT: &str = "Subject";
    pub const INSPECTION_REPORT: &str = "InspectionReport";
    pub const INSPECTION: &str = "Inspection";
    pub const X509_SUBJECT_NAME: &str = "X509SubjectName";
    pub const CERT_TYPE: &str = "CertType";
    pub const MATH_RESULT: &str = "MathResult";
    pub const OFFLINE_RESULT: &str = "OfflineResult";

    // Delivery header children
    pub const SELECTION_RULE: &str = "SelectionRule";
    pub const QUANTITY: &str = "Quantity";

    // Body / content elements
    pub const CONTENT_PACKAGE: &str = "ContentPackage";
    pub const CONTENT_CONTAINER: &str = "ContentContainer";
    pub const CONTENT: &str = "Content";
    pub const BASE64_CONTENT: &str = "Base64Content";

    // Certificate header children
    pub const CIPHER_CERT_ORIGINATOR: &str = "CipherCertificateOriginator";
    pub const CIPHER_CERT_ADDRESSEE: &str = "CipherCertificateAddressee";
    pub const CIPHER_CERT_INTERMEDIARY: &str = "CipherCertificateIntermediary";
    pub const CIPHER_CERT_OTHER_AUTHOR: &str = "CipherCertificateOtherAuthor";
    pub const CIPHER_CERT_OTHER_READER: &str = "CipherCertificateOtherReader";
    pub const SIGNATURE_CERT_ORIGINATOR: &str = "SignatureCertificateOriginator";
    pub const SIGNATURE_CERT_ADDRESSEE: &str = "SignatureCertificateAddressee";
    pub const SIGNATURE_CERT_INTERMEDIARY: &str = "SignatureCertificateIntermediary";
    pub const SIGNATURE_CERT_OTHER_AUTHOR: &str = "SignatureCertificateOtherAuthor";

    // DSig elements
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const REFERENCE: &str = "Reference";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_NAME: &str = "KeyName";
    pub const RETRIEVAL_METHOD: &str = "RetrievalMethod";
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";
    pub const MGF: &str = "MGF";

    // Encryption elements
    pub const ENCRYPTED_DATA: &str = "EncryptedData";
    pub const ENCRYPTED_KEY: &str = "EncryptedKey";
    pub const ENCRYPTION_METHOD: &str = "EncryptionMethod";
    pub const CIPHER_DATA: &str = "CipherData";
    pub const CIPHER_VALUE: &str = "CipherValue";
    pub const CIPHER_REFERENCE: &str = "CipherReference";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ID: &str = "Id";
    pub const URI: &str = "URI";
    pub const ALGORITHM: &str = "Algorithm";
    pub const SCHEMA_LOCATION: &str = "schemaLocation";
    pub const CONVERSATION_ID: &str = "ConversationId";
    pub const SEQUENCE_NUMBER: &str = "SequenceNumber";
    pub const LANGUAGES_LIST: &str = "LanguagesList";
    pub const SERVICE: &str = "Service";
    pub const QUALITY: &str = "Quality";
    pub const NAME: &str = "Name";
    pub const HREF: &str = "href";
    pub const LIMIT: &str = "Limit";
    pub const KEY: &str = "Key";
    pub const VERSION: &str = "Version";
    pub const RECENT_MODIFICATION: &str = "RecentModification";
    pub const CHUNK_NUMBER: &str = "ChunkNumber";
    pub const TOTAL_CHUNK_NUMBERS: &str = "TotalChunkNumbers";
    pub const TOTAL_MESSAGE_SIZE: &str = "TotalMessageSize";
    pub const CHUNK_SIZE: &str = "ChunkSize";
    pub const LANG: &str = "lang";
}
