#![forbid(unsafe_code)]

use super::{capture_or_whitespace, BuiltPart, CustomHeaderBuilder, ElementHandler, TextCapture, Transition};
use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::{ns, Error, Result};
use osci_message::content::{CipherSource, Content, ContentContainer, EncryptedDataOsci, EncryptedKeyOsci};
use osci_message::msg::MessageBody;
use osci_message::parts::SoapFaultInfo;
use osci_stream::b64;

/// Builder for the SOAP body: content package, encrypted-data entries or a
/// fault.
pub struct BodyBuilder {
    body: MessageBody,
    in_package: bool,
}

impl BodyBuilder {
    pub fn new(ev: &StartEvent<'_>) -> Self {
        let mut body = MessageBody::new();
        if let Some(id) = ev.id() {
            body.id = id.to_owned();
        }
        Self {
            body,
            in_package: false,
        }
    }
}

impl ElementHandler for BodyBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match (ev.ns, ev.local) {
            (ns::OSCI, ns::node::CONTENT_PACKAGE) => {
                self.in_package = true;
                Ok(Transition::Stay)
            }
            (ns::OSCI, ns::node::CONTENT_CONTAINER) if self.in_package => Ok(Transition::Push(
                Box::new(ContentContainerBuilder::new(ev)),
            )),
            (ns::XENC, ns::node::ENCRYPTED_DATA) => {
                Ok(Transition::Push(Box::new(EncryptedDataBuilder::new(ev))))
            }
            (ns::SOAP, ns::node::FAULT) => Ok(Transition::Push(Box::new(FaultBuilder::new()))),
            _ => Err(Error::UnexpectedElement(ev.qname.to_owned())),
        }
    }

    fn end_element(
        &mut self,
        _qname: &str,
        local: &str,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match local {
            ns::node::CONTENT_PACKAGE => {
                self.in_package = false;
                Ok(Transition::Stay)
            }
            ns::node::BODY => Ok(Transition::Pop(BuiltPart::Body(Box::new(std::mem::take(
                &mut self.body,
            ))))),
            _ => Err(Error::UnexpectedEndTag(local.to_owned())),
        }
    }

    fn child_complete(&mut self, part: BuiltPart, _ctx: &mut ParseContext<'_>) -> Result<()> {
        match part {
            BuiltPart::Container(container) => self.body.containers.push(*container),
            BuiltPart::EncryptedData(enc) => self.body.encrypted_data.push(*enc),
            BuiltPart::Fault(fault) => self.body.fault = Some(fault),
            _ => return Err(Error::XmlStructure("unexpected child in body".into())),
        }
        Ok(())
    }
}

// ── ContentContainer ─────────────────────────────────────────────────

struct PendingContent {
    id: Option<String>,
    href: Option<String>,
    inline: Option<String>,
    nested: bool,
}

/// Builder for a `ContentContainer` subtree.
pub struct ContentContainerBuilder {
    container: ContentContainer,
    pending: Option<PendingContent>,
    capture: TextCapture,
}

impl ContentContainerBuilder {
    pub fn new(ev: &StartEvent<'_>) -> Self {
        Self {
            container: ContentContainer {
                name: ev.attr(ns::attr::NAME).map(str::to_owned),
                ..Default::default()
            },
            pending: None,
            capture: TextCapture::default(),
        }
    }
}

impl ElementHandler for ContentContainerBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match (ev.ns, ev.local) {
            (ns::OSCI, ns::node::CONTENT) => {
                self.pending = Some(PendingContent {
                    id: ev.id().map(str::to_owned),
                    href: ev.attr(ns::attr::HREF).map(str::to_owned),
                    inline: None,
                    nested: false,
                });
                Ok(Transition::Stay)
            }
            (ns::OSCI, ns::node::BASE64_CONTENT) => {
                self.capture.open();
                Ok(Transition::Stay)
            }
            (ns::OSCI, ns::node::CONTENT_CONTAINER) => {
                Ok(Transition::Push(Box::new(ContentContainerBuilder::new(ev))))
            }
            (ns::XENC, ns::node::ENCRYPTED_DATA) => {
                Ok(Transition::Push(Box::new(EncryptedDataBuilder::new(ev))))
            }
            _ => Err(Error::UnexpectedElement(ev.qname.to_owned())),
        }
    }

    fn end_element(
        &mut self,
        _qname: &str,
        local: &str,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match local {
            ns::node::BASE64_CONTENT => {
                let text = self.capture.take().unwrap_or_default();
                let bytes = b64::decode_str(&text)?;
                let data = String::from_utf8(bytes).map_err(|e| {
                    Error::XmlStructure(format!("Base64Content is not UTF-8: {e}"))
                })?;
                if let Some(pending) = &mut self.pending {
                    pending.inline = Some(data);
                }
                Ok(Transition::Stay)
            }
            ns::node::CONTENT => {
                let pending = self
                    .pending
                    .take()
                    .ok_or_else(|| Error::UnexpectedEndTag(local.to_owned()))?;
                if let Some(href) = pending.href {
                    let content_id = href.strip_prefix("cid:").unwrap_or(&href).to_owned();
                    self.container.contents.push(Content::AttachmentRef {
                        id: pending.id,
                        content_id,
                    });
                } else if let Some(data) = pending.inline {
                    self.container.contents.push(Content::Inline {
                        id: pending.id,
                        data,
                    });
                } else if !pending.nested {
                    return Err(Error::MissingElement(format!(
                        "content data in Content{}",
                        pending.id.map(|i| format!(" {i}")).unwrap_or_default()
                    )));
                }
                Ok(Transition::Stay)
            }
            ns::node::CONTENT_CONTAINER => Ok(Transition::Pop(BuiltPart::Container(Box::new(
                std::mem::take(&mut self.container),
            )))),
            _ => Err(Error::UnexpectedEndTag(local.to_owned())),
        }
    }

    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        capture_or_whitespace(&mut self.capture, text)
    }

    fn child_complete(&mut self, part: BuiltPart, _ctx: &mut ParseContext<'_>) -> Result<()> {
        match part {
            BuiltPart::Container(inner) => {
                match &mut self.pending {
                    Some(pending) => {
                        pending.nested = true;
                        self.container.contents.push(Content::Container(*inner));
                    }
                    None => {
                        return Err(Error::XmlStructure(
                            "ContentContainer outside Content".into(),
                        ));
                    }
                }
                Ok(())
            }
            BuiltPart::EncryptedData(enc) => {
                self.container.encrypted_data.push(*enc);
                Ok(())
            }
            _ => Err(Error::XmlStructure("unexpected child in container".into())),
        }
    }
}

// ── EncryptedData ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdState {
    Root,
    KeyInfo,
    EncKey,
    EncKeyMethod,
    EncKeyKeyInfo,
    EncKeyX509,
    EncKeyCipherData,
    CipherData,
}

/// Builder for an `xenc:EncryptedData` entry: the transport envelope's body
/// or an end-to-end encrypted container.
pub struct EncryptedDataBuilder {
    data: EncryptedDataOsci,
    state: EdState,
    current_key: Option<EncryptedKeyOsci>,
    capture: TextCapture,
    cipher_seen: bool,
}

impl EncryptedDataBuilder {
    pub fn new(ev: &StartEvent<'_>) -> Self {
        Self {
            data: EncryptedDataOsci {
                id: ev.id().map(str::to_owned),
                enc_method_uri: String::new(),
                keys: Vec::new(),
                cipher: CipherSource::Value(Vec::new()),
            },
            state: EdState::Root,
            current_key: None,
            capture: TextCapture::default(),
            cipher_seen: false,
        }
    }
}

impl ElementHandler for EncryptedDataBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match (self.state, ev.ns, ev.local) {
            (EdState::Root, ns::XENC, ns::node::ENCRYPTION_METHOD) => {
                self.data.enc_method_uri = ev.required_attr(ns::attr::ALGORITHM)?.to_owned();
            }
            (EdState::Root, ns::DSIG, ns::node::KEY_INFO) => self.state = EdState::KeyInfo,
            (EdState::KeyInfo, ns::XENC, ns::node::ENCRYPTED_KEY) => {
                self.current_key = Some(EncryptedKeyOsci {
                    transport_uri: String::new(),
                    digest_uri: None,
                    mgf_uri: None,
                    recipient_cert_der: None,
                    cipher_value: Vec::new(),
                });
                self.state = EdState::EncKey;
            }
            (EdState::EncKey, ns::XENC, ns::node::ENCRYPTION_METHOD) => {
                if let Some(key) = &mut self.current_key {
                    key.transport_uri = ev.required_attr(ns::attr::ALGORITHM)?.to_owned();
                }
                self.state = EdState::EncKeyMethod;
            }
            (EdState::EncKeyMethod, ns::DSIG, ns::node::DIGEST_METHOD) => {
                if let Some(key) = &mut self.current_key {
                    key.digest_uri = Some(ev.required_attr(ns::attr::ALGORITHM)?.to_owned());
                }
            }
            (EdState::EncKeyMethod, _, ns::node::MGF) => {
                if let Some(key) = &mut self.current_key {
                    key.mgf_uri = Some(ev.required_attr(ns::attr::ALGORITHM)?.to_owned());
                }
            }
            (EdState::EncKey, ns::DSIG, ns::node::KEY_INFO) => self.state = EdState::EncKeyKeyInfo,
            (EdState::EncKeyKeyInfo, ns::DSIG, ns::node::X509_DATA) => {
                self.state = EdState::EncKeyX509;
            }
            (EdState::EncKeyX509, ns::DSIG, ns::node::X509_CERTIFICATE) => self.capture.open(),
            (EdState::EncKey, ns::XENC, ns::node::CIPHER_DATA) => {
                self.state = EdState::EncKeyCipherData;
            }
            (EdState::EncKeyCipherData, ns::XENC, ns::node::CIPHER_VALUE) => self.capture.open(),
            (EdState::Root, ns::XENC, ns::node::CIPHER_DATA) => self.state = EdState::CipherData,
            (EdState::CipherData, ns::XENC, ns::node::CIPHER_VALUE) => self.capture.open(),
            (EdState::CipherData, ns::XENC, ns::node::CIPHER_REFERENCE) => {
                self.data.cipher =
                    CipherSource::Reference(ev.required_attr(ns::attr::URI)?.to_owned());
                self.cipher_seen = true;
            }
            _ => return Err(Error::UnexpectedElement(ev.qname.to_owned())),
        }
        Ok(Transition::Stay)
    }

    fn end_element(
        &mut self,
        _qname: &str,
        local: &str,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match (self.state, local) {
            (EdState::EncKeyX509, ns::node::X509_CERTIFICATE) => {
                let text = self.capture.take().unwrap_or_default();
                if let Some(key) = &mut self.current_key {
                    key.recipient_cert_der = Some(b64::decode_str(&text)?);
                }
            }
            (EdState::EncKeyX509, ns::node::X509_DATA) => self.state = EdState::EncKeyKeyInfo,
            (EdState::EncKeyKeyInfo, ns::node::KEY_INFO) => self.state = EdState::EncKey,
            (EdState::EncKeyMethod, ns::node::ENCRYPTION_METHOD) => self.state = EdState::EncKey,
            (EdState::EncKeyMethod, _) => {}
            (EdState::EncKeyCipherData, ns::node::CIPHER_VALUE) => {
                let text = self.capture.take().unwrap_or_default();
                if let Some(key) = &mut self.current_key {
                    key.cipher_value = b64::decode_str(&text)?;
                }
            }
            (EdState::EncKeyCipherData, ns::node::CIPHER_DATA) => self.state = EdState::EncKey,
            (EdState::EncKey, ns::node::ENCRYPTED_KEY) => {
                let key = self
                    .current_key
                    .take()
                    .ok_or_else(|| Error::UnexpectedEndTag(local.to_owned()))?;
                self.data.keys.push(key);
                self.state = EdState::KeyInfo;
            }
            (EdState::KeyInfo, ns::node::KEY_INFO) => self.state = EdState::Root,
            (EdState::CipherData, ns::node::CIPHER_VALUE) => {
                let text = self.capture.take().unwrap_or_default();
                self.data.cipher = CipherSource::Value(b64::decode_str(&text)?);
                self.cipher_seen = true;
            }
            (EdState::CipherData, ns::node::CIPHER_REFERENCE) => {}
            (EdState::CipherData, ns::node::CIPHER_DATA) => self.state = EdState::Root,
            (EdState::Root, ns::node::ENCRYPTION_METHOD) => {}
            (EdState::Root, ns::node::ENCRYPTED_DATA) => {
                if self.data.enc_method_uri.is_empty() {
                    return Err(Error::MissingElement("EncryptionMethod".into()));
                }
                if !self.cipher_seen {
                    return Err(Error::MissingElement("CipherData".into()));
                }
                let data = std::mem::replace(
                    &mut self.data,
                    EncryptedDataOsci {
                        id: None,
                        enc_method_uri: String::new(),
                        keys: Vec::new(),
                        cipher: CipherSource::Value(Vec::new()),
                    },
                );
                return Ok(Transition::Pop(BuiltPart::EncryptedData(Box::new(data))));
            }
            _ => return Err(Error::UnexpectedEndTag(local.to_owned())),
        }
        Ok(Transition::Stay)
    }

    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        capture_or_whitespace(&mut self.capture, text)
    }
}

// ── SOAP fault ───────────────────────────────────────────────────────

enum FaultField {
    Code,
    Text,
    OsciCode,
}

/// Builder for a `soap:Fault` body.
pub struct FaultBuilder {
    fault: SoapFaultInfo,
    capture: TextCapture,
    field: Option<FaultField>,
}

impl FaultBuilder {
    pub fn new() -> Self {
        Self {
            fault: SoapFaultInfo::default(),
            capture: TextCapture::default(),
            field: None,
        }
    }
}

impl ElementHandler for FaultBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match ev.local {
            ns::node::FAULT_CODE => {
                self.capture.open();
                self.field = Some(FaultField::Code);
            }
            ns::node::FAULT_STRING => {
                self.capture.open();
                self.field = Some(FaultField::Text);
            }
            ns::node::CODE if ev.ns == ns::OSCI => {
                self.capture.open();
                self.field = Some(FaultField::OsciCode);
            }
            // detail and friends are preserved structurally but not typed
            _ => return Ok(Transition::Push(Box::new(CustomHeaderBuilder::new(ev, ctx)))),
        }
        Ok(Transition::Stay)
    }

    fn end_element(
        &mut self,
        _qname: &str,
        local: &str,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        if self.capture.is_open() {
            let text = self.capture.take().unwrap_or_default();
            match self.field.take() {
                Some(FaultField::Code) => self.fault.code = text,
                Some(FaultField::Text) => self.fault.text = text,
                Some(FaultField::OsciCode) => self.fault.osci_code = Some(text),
                None => {}
            }
            return Ok(Transition::Stay);
        }
        if local == ns::node::FAULT {
            return Ok(Transition::Pop(BuiltPart::Fault(std::mem::take(
                &mut self.fault,
            ))));
        }
        Ok(Transition::Stay)
    }

    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        capture_or_whitespace(&mut self.capture, text)
    }

    fn child_complete(&mut self, _part: BuiltPart, _ctx: &mut ParseContext<'_>) -> Result<()> {
        Ok(())
    }
}
