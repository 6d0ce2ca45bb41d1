#![forbid(unsafe_code)]

use super::{capture_or_whitespace, BuiltPart, ElementHandler, TextCapture, Transition};
use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::{ns, Error, Result};
use osci_message::signature::{SignatureHeader, SignatureReference};
use osci_stream::b64;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Wrapper,
    Signature,
    SignedInfo,
    Reference,
    KeyInfo,
    X509Data,
}

struct PartialReference {
    id: String,
    digest_uri: Option<String>,
    digest_value: Option<Vec<u8>>,
}

/// Builder for `ClientSignature` / `SupplierSignature` headers: the
/// XML-DSig structure binding part digests to one signature value.
pub struct SignatureBuilder {
    wrapper_local: String,
    header: SignatureHeader,
    seen_refs: HashSet<String>,
    state: State,
    capture: TextCapture,
    current_ref: Option<PartialReference>,
}

impl SignatureBuilder {
    pub fn new(ev: &StartEvent<'_>) -> Self {
        Self {
            wrapper_local: ev.local.to_owned(),
            header: SignatureHeader::default(),
            seen_refs: HashSet::new(),
            state: State::Wrapper,
            capture: TextCapture::default(),
            current_ref: None,
        }
    }

}

impl ElementHandler for SignatureBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        if ev.ns != ns::DSIG {
            return Err(Error::UnexpectedElement(ev.qname.to_owned()));
        }
        match (self.state, ev.local) {
            (State::Wrapper, ns::node::SIGNATURE) => {
                self.state = State::Signature;
            }
            (State::Signature, ns::node::SIGNED_INFO) => {
                ctx.canonizer.begin_signed_info()?;
                self.state = State::SignedInfo;
            }
            (State::SignedInfo, ns::node::CANONICALIZATION_METHOD) => {}
            (State::SignedInfo, ns::node::SIGNATURE_METHOD) => {
                self.header.algorithm = ev.required_attr(ns::attr::ALGORITHM)?.to_owned();
            }
            (State::SignedInfo, ns::node::REFERENCE) => {
                let uri = ev.required_attr(ns::attr::URI)?;
                let id = uri.strip_prefix('#').unwrap_or(uri).to_owned();
                if !self.seen_refs.insert(id.clone()) {
                    return Err(Error::DuplicateElement(format!("Reference {uri}")));
                }
                self.current_ref = Some(PartialReference {
                    id,
                    digest_uri: None,
                    digest_value: None,
                });
                self.state = State::Reference;
            }
            (State::Reference, ns::node::DIGEST_METHOD) => {
                if let Some(r) = &mut self.current_ref {
                    r.digest_uri = Some(ev.required_attr(ns::attr::ALGORITHM)?.to_owned());
                }
            }
            (State::Reference, ns::node::DIGEST_VALUE) => self.capture.open(),
            (State::Signature, ns::node::SIGNATURE_VALUE) => self.capture.open(),
            (State::Signature, ns::node::KEY_INFO) => self.state = State::KeyInfo,
            (State::KeyInfo, ns::node::X509_DATA) => self.state = State::X509Data,
            (State::KeyInfo, ns::node::RETRIEVAL_METHOD) => {
                self.header.retrieval_uri =
                    Some(ev.required_attr(ns::attr::URI)?.to_owned());
            }
            (State::X509Data, ns::node::X509_CERTIFICATE) => self.capture.open(),
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
            (State::Reference, ns::node::DIGEST_VALUE) => {
                let text = self.capture.take().unwrap_or_default();
                if let Some(r) = &mut self.current_ref {
                    r.digest_value = Some(b64::decode_str(&text)?);
                }
            }
            (State::Reference, ns::node::DIGEST_METHOD) => {}
            (State::Reference, ns::node::REFERENCE) => {
                let partial = self
                    .current_ref
                    .take()
                    .ok_or_else(|| Error::UnexpectedEndTag(local.to_owned()))?;
                self.header.references.push(SignatureReference {
                    digest_uri: partial
                        .digest_uri
                        .ok_or_else(|| Error::MissingElement("DigestMethod".into()))?,
                    digest_value: partial
                        .digest_value
                        .ok_or_else(|| Error::MissingElement("DigestValue".into()))?,
                    id: partial.id,
                });
                self.state = State::SignedInfo;
            }
            (State::SignedInfo, ns::node::SIGNED_INFO) => self.state = State::Signature,
            (State::SignedInfo, _) => {}
            (State::Signature, ns::node::SIGNATURE_VALUE) => {
                let text = self.capture.take().unwrap_or_default();
                self.header.value = b64::decode_str(&text)?;
            }
            (State::X509Data, ns::node::X509_CERTIFICATE) => {
                let text = self.capture.take().unwrap_or_default();
                self.header.certificate_der = Some(b64::decode_str(&text)?);
            }
            (State::X509Data, ns::node::X509_DATA) => self.state = State::KeyInfo,
            (State::KeyInfo, ns::node::KEY_INFO) => self.state = State::Signature,
            (State::KeyInfo, ns::node::RETRIEVAL_METHOD) => {}
            (State::Signature, ns::node::SIGNATURE) => self.state = State::Wrapper,
            (State::Wrapper, _) if local == self.wrapper_local => {
                if self.header.algorithm.is_empty() {
                    return Err(Error::MissingElement("SignatureMethod".into()));
                }
                return Ok(Transition::Pop(BuiltPart::Signature(Box::new(
                    std::mem::take(&mut self.header),
                ))));
            }
            _ => return Err(Error::UnexpectedEndTag(local.to_owned())),
        }
        Ok(Transition::Stay)
    }

    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        capture_or_whitespace(&mut self.capture, text)
    }
}
