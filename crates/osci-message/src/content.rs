#![forbid(unsafe_code)]

//! The payload tree: content containers, inline content, attachment
//! references and encrypted-data entries.

use osci_core::{ns, Error, Result};
use osci_crypto::keytransport::OaepParams;
use osci_stream::{b64, CanonicalWriter};
use std::collections::HashMap;

/// One content item inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Inline data, transported base64-encoded.
    Inline { id: Option<String>, data: String },
    /// A nested container.
    Container(ContentContainer),
    /// Reference to an out-of-band MIME attachment by content id.
    AttachmentRef { id: Option<String>, content_id: String },
}

/// A named bundle of content items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentContainer {
    pub name: Option<String>,
    pub contents: Vec<Content>,
    /// End-to-end encrypted entries carried inside this container.
    pub encrypted_data: Vec<EncryptedDataOsci>,
}

impl ContentContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_inline(&mut self, data: &str) {
        self.contents.push(Content::Inline {
            id: None,
            data: data.to_owned(),
        });
    }

    pub fn add_attachment_ref(&mut self, content_id: &str) {
        self.contents.push(Content::AttachmentRef {
            id: None,
            content_id: content_id.to_owned(),
        });
    }

    /// First inline text content, if any.
    pub fn inline_text(&self) -> Option<&str> {
        self.contents.iter().find_map(|c| match c {
            Content::Inline { data, .. } => Some(data.as_str()),
            _ => None,
        })
    }

    pub(crate) fn collect_attachment_refs(&self, ids: &mut Vec<String>) {
        for content in &self.contents {
            match content {
                Content::AttachmentRef { content_id, .. } => ids.push(content_id.clone()),
                Content::Container(inner) => inner.collect_attachment_refs(ids),
                Content::Inline { .. } => {}
            }
        }
    }

    pub fn write_xml(&self, w: &mut CanonicalWriter) {
        let attrs: Vec<(&str, &str)> = self
            .name
            .as_deref()
            .map(|n| vec![(ns::attr::NAME, n)])
            .unwrap_or_default();
        w.start("osci:ContentContainer", &attrs);
        for content in &self.contents {
            match content {
                Content::Inline { id, data } => {
                    let attrs: Vec<(&str, &str)> =
                        id.as_deref().map(|i| vec![(ns::attr::ID, i)]).unwrap_or_default();
                    w.start("osci:Content", &attrs);
                    w.element("osci:Base64Content", &[], &b64::encode(data.as_bytes()));
                    w.end();
                }
                Content::Container(inner) => {
                    w.start("osci:Content", &[]);
                    inner.write_xml(w);
                    w.end();
                }
                Content::AttachmentRef { id, content_id } => {
                    let href = format!("cid:{content_id}");
                    let mut attrs: Vec<(&str, &str)> = vec![(ns::attr::HREF, href.as_str())];
                    if let Some(id) = id.as_deref() {
                        attrs.push((ns::attr::ID, id));
                    }
                    w.start("osci:Content", &attrs);
                    w.end();
                }
            }
        }
        for enc in &self.encrypted_data {
            enc.write_xml(w);
        }
        w.end();
    }
}

/// An out-of-band MIME attachment.
///
/// Created as a placeholder while parsing `Content` elements; the raw bytes
/// are bound later, when the MIME reader reaches the matching content id.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub content_id: String,
    /// Raw payload bytes, bound lazily.
    data: Option<Vec<u8>>,
    /// Whether the MIME part is base64 transfer-encoded.
    pub base64_encoded: bool,
    /// Cached digests keyed by algorithm URI.
    digest_cache: HashMap<String, Vec<u8>>,
}

impl Attachment {
    pub fn placeholder(content_id: &str) -> Self {
        Self {
            content_id: content_id.to_owned(),
            data: None,
            base64_encoded: true,
            digest_cache: HashMap::new(),
        }
    }

    pub fn from_bytes(content_id: &str, data: Vec<u8>) -> Self {
        Self {
            content_id: content_id.to_owned(),
            data: Some(data),
            base64_encoded: true,
            digest_cache: HashMap::new(),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    /// Bind the raw MIME part bytes.
    pub fn bind(&mut self, data: Vec<u8>) {
        self.data = Some(data);
        self.digest_cache.clear();
    }

    pub fn data(&self) -> Result<&[u8]> {
        self.data
            .as_deref()
            .ok_or_else(|| Error::Mime(format!("attachment {} not bound", self.content_id)))
    }

    pub fn len(&self) -> usize {
        self.data.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Digest of the payload under the given algorithm, cached per URI.
    pub fn digest(&mut self, algorithm_uri: &str) -> Result<Vec<u8>> {
        if let Some(cached) = self.digest_cache.get(algorithm_uri) {
            return Ok(cached.clone());
        }
        let data = self
            .data
            .as_deref()
            .ok_or_else(|| Error::Mime(format!("attachment {} not bound", self.content_id)))?;
        let value = osci_crypto::digest::DigestSuite::from_uri(algorithm_uri)?.hash(data);
        self.digest_cache
            .insert(algorithm_uri.to_owned(), value.clone());
        Ok(value)
    }
}

/// Where the ciphertext of an encrypted-data entry lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherSource {
    /// Inline base64 ciphertext.
    Value(Vec<u8>),
    /// `cid:` reference to a sibling MIME part.
    Reference(String),
}

/// A per-recipient wrapped content-encryption key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKeyOsci {
    pub transport_uri: String,
    pub digest_uri: Option<String>,
    pub mgf_uri: Option<String>,
    /// The recipient's cipher certificate, by value.
    pub recipient_cert_der: Option<Vec<u8>>,
    pub cipher_value: Vec<u8>,
}

impl EncryptedKeyOsci {
    pub fn oaep_params(&self) -> OaepParams {
        OaepParams {
            digest_uri: self.digest_uri.clone(),
            mgf_uri: self.mgf_uri.clone(),
        }
    }
}

/// An `xenc:EncryptedData` entry: the transport envelope's body or an
/// end-to-end encrypted container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedDataOsci {
    pub id: Option<String>,
    pub enc_method_uri: String,
    pub keys: Vec<EncryptedKeyOsci>,
    pub cipher: CipherSource,
}

impl EncryptedDataOsci {
    pub fn write_xml(&self, w: &mut CanonicalWriter) {
        let attrs: Vec<(&str, &str)> = self
            .id
            .as_deref()
            .map(|i| vec![(ns::attr::ID, i)])
            .unwrap_or_default();
        w.start("xenc:EncryptedData", &attrs);
        w.start("xenc:EncryptionMethod", &[(ns::attr::ALGORITHM, self.enc_method_uri.as_str())]);
        w.end();
        if !self.keys.is_empty() {
            w.start("ds:KeyInfo", &[]);
            for key in &self.keys {
                w.start("xenc:EncryptedKey", &[]);
                w.start(
                    "xenc:EncryptionMethod",
                    &[(ns::attr::ALGORITHM, key.transport_uri.as_str())],
                );
                if let Some(digest_uri) = &key.digest_uri {
                    w.start("ds:DigestMethod", &[(ns::attr::ALGORITHM, digest_uri.as_str())]);
                    w.end();
                }
                if let Some(mgf_uri) = &key.mgf_uri {
                    w.start("xenc11:MGF", &[(ns::attr::ALGORITHM, mgf_uri.as_str())]);
                    w.end();
                }
                w.end();
                if let Some(der) = &key.recipient_cert_der {
                    w.start("ds:KeyInfo", &[]);
                    w.start("ds:X509Data", &[]);
                    w.element("ds:X509Certificate", &[], &b64::encode(der));
                    w.end();
                    w.end();
                }
                w.start("xenc:CipherData", &[]);
                w.element("xenc:CipherValue", &[], &b64::encode(&key.cipher_value));
                w.end();
                w.end();
            }
            w.end();
        }
        w.start("xenc:CipherData", &[]);
        match &self.cipher {
            CipherSource::Value(bytes) => {
                w.element("xenc:CipherValue", &[], &b64::encode(bytes));
            }
            CipherSource::Reference(uri) => {
                w.start("xenc:CipherReference", &[(ns::attr::URI, uri.as_str())]);
                w.end();
            }
        }
        w.end();
        w.end();
    }

    /// Content id the cipher reference points at, if any.
    pub fn cipher_reference_cid(&self) -> Option<&str> {
        match &self.cipher {
            CipherSource::Reference(uri) => uri.strip_prefix("cid:").or(Some(uri.as_str())),
            CipherSource::Value(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_digest_is_cached() {
        use osci_core::algorithm;
        let mut att = Attachment::from_bytes("att-1", b"payload".to_vec());
        let d1 = att.digest(algorithm::SHA256).unwrap();
        let d2 = att.digest(algorithm::SHA256).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 32);
    }

    #[test]
    fn unbound_attachment_rejects_access() {
        let att = Attachment::placeholder("att-1");
        assert!(!att.is_bound());
        assert!(att.data().is_err());
    }

    #[test]
    fn attachment_refs_collected_recursively() {
        let mut inner = ContentContainer::new();
        inner.add_attachment_ref("deep");
        let mut outer = ContentContainer::new();
        outer.add_attachment_ref("shallow");
        outer.contents.push(Content::Container(inner));
        let mut ids = Vec::new();
        outer.collect_attachment_refs(&mut ids);
        assert_eq!(ids, vec!["shallow".to_owned(), "deep".to_owned()]);
    }

    #[test]
    fn cipher_reference_cid_strips_scheme() {
        let enc = EncryptedDataOsci {
            id: None,
            enc_method_uri: "u".into(),
            keys: Vec::new(),
            cipher: CipherSource::Reference("cid:osci_enc".into()),
        };
        assert_eq!(enc.cipher_reference_cid(), Some("osci_enc"));
    }
}
