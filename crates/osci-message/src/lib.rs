#![forbid(unsafe_code)]

pub mod compose;
pub mod content;
pub mod msg;
pub mod parts;
pub mod signature;

pub use content::{Attachment, Content, ContentContainer, EncryptedDataOsci, EncryptedKeyOsci};
pub use msg::{MessageBody, OsciMessage, OsciMessageType};
pub use parts::{
    CertificateEntry, CertificatesHeader, ChunkInformation, ControlBlock, CustomHeader,
    DeliveryHeader, DesiredLanguages, Feature, FeatureDescription, FeedbackEntry, Inspection,
    ProcessCardBundle, QualityOfTimestamp, SoapFaultInfo, Timestamp,
};
pub use signature::{SignatureHeader, SignatureReference};
