#![forbid(unsafe_code)]

use super::{capture_or_whitespace, BuiltPart, ElementHandler, TextCapture, Transition};
use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::{ns, Error, Result};
use osci_message::parts::{CertificateEntry, CertificatesHeader};
use osci_stream::b64;

/// Builder for `IntermediaryCertificates` / `NonIntermediaryCertificates`.
pub struct CertificatesBuilder {
    intermediary: bool,
    header: CertificatesHeader,
    current: Option<(String, String)>,
    der: Option<Vec<u8>>,
    capture: TextCapture,
}

impl CertificatesBuilder {
    pub fn new(ev: &StartEvent<'_>, intermediary: bool) -> Self {
        let mut header = CertificatesHeader::default();
        header.id = ev.id().unwrap_or(if intermediary {
            "intermediarycertificates"
        } else {
            "nonintermediarycertificates"
        })
        .to_owned();
        Self {
            intermediary,
            header,
            current: None,
            der: None,
            capture: TextCapture::default(),
        }
    }
}

fn is_certificate_entry(local: &str) -> bool {
    local.starts_with("CipherCertificate") || local.starts_with("SignatureCertificate")
}

impl ElementHandler for CertificatesBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match (ev.ns, ev.local) {
            (ns::OSCI, local) if is_certificate_entry(local) => {
                let id = ev.id().unwrap_or(&local.to_lowercase()).to_owned();
                self.current = Some((local.to_owned(), id));
                self.der = None;
            }
            (ns::DSIG, ns::node::X509_DATA) => {}
            (ns::DSIG, ns::node::X509_CERTIFICATE) => self.capture.open(),
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
        match local {
            ns::node::X509_CERTIFICATE => {
                let text = self.capture.take().unwrap_or_default();
                self.der = Some(b64::decode_str(&text)?);
            }
            ns::node::X509_DATA => {}
            ns::node::INTERMEDIARY_CERTIFICATES | ns::node::NON_INTERMEDIARY_CERTIFICATES => {
                return Ok(Transition::Pop(BuiltPart::Certificates {
                    intermediary: self.intermediary,
                    header: std::mem::take(&mut self.header),
                }));
            }
            local if is_certificate_entry(local) => {
                let (role_tag, id) = self
                    .current
                    .take()
                    .ok_or_else(|| Error::UnexpectedEndTag(local.to_owned()))?;
                let der = self.der.take().ok_or_else(|| {
                    Error::MissingElement(format!("X509Certificate in {role_tag}"))
                })?;
                self.header.entries.push(CertificateEntry { role_tag, id, der });
            }
            _ => return Err(Error::UnexpectedEndTag(local.to_owned())),
        }
        Ok(Transition::Stay)
    }

    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        capture_or_whitespace(&mut self.capture, text)
    }
}
