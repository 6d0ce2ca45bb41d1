#![forbid(unsafe_code)]

//! The XML-DSig signature header binding part digests to one signature value.

use osci_core::ns;
use osci_stream::{b64, CanonicalWriter};

/// One `ds:Reference`: reference id, digest algorithm and expected value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureReference {
    /// Reference id without the leading `#`.
    pub id: String,
    pub digest_uri: String,
    pub digest_value: Vec<u8>,
}

/// The parsed or composed signature header (`ClientSignature` on requests,
/// `SupplierSignature` on responses).
#[derive(Debug, Clone, Default)]
pub struct SignatureHeader {
    /// Signature algorithm URI.
    pub algorithm: String,
    /// Ordered reference list.
    pub references: Vec<SignatureReference>,
    pub value: Vec<u8>,
    /// Signer certificate carried by value in `KeyInfo`.
    pub certificate_der: Option<Vec<u8>>,
    /// `RetrievalMethod` URI pointing at a certificate elsewhere in the
    /// message.
    pub retrieval_uri: Option<String>,
    /// Exact canonical bytes of `SignedInfo`, captured during parse or
    /// produced during compose.
    pub signed_info: Option<Vec<u8>>,
}

impl SignatureHeader {
    pub fn header_name(is_response: bool) -> &'static str {
        if is_response {
            ns::node::SUPPLIER_SIGNATURE
        } else {
            ns::node::CLIENT_SIGNATURE
        }
    }

    pub fn header_id(is_response: bool) -> &'static str {
        if is_response {
            "suppliersignature"
        } else {
            "clientsignature"
        }
    }

    /// Reference by id, if present.
    pub fn reference(&self, id: &str) -> Option<&SignatureReference> {
        self.references.iter().find(|r| r.id == id)
    }

    /// Render the canonical `SignedInfo` block for this header's references.
    pub fn render_signed_info(&self, decls: &[(&str, &str)]) -> Vec<u8> {
        let mut w = CanonicalWriter::new();
        w.start_with_decls("ds:SignedInfo", decls, &[]);
        w.start(
            "ds:CanonicalizationMethod",
            &[(ns::attr::ALGORITHM, osci_core::algorithm::C14N)],
        );
        w.end();
        w.start("ds:SignatureMethod", &[(ns::attr::ALGORITHM, self.algorithm.as_str())]);
        w.end();
        for reference in &self.references {
            let uri = format!("#{}", reference.id);
            w.start("ds:Reference", &[(ns::attr::URI, uri.as_str())]);
            w.start(
                "ds:DigestMethod",
                &[(ns::attr::ALGORITHM, reference.digest_uri.as_str())],
            );
            w.end();
            w.element("ds:DigestValue", &[], &b64::encode(&reference.digest_value));
            w.end();
        }
        w.end();
        w.into_bytes()
    }

    /// Render the full signature header element.
    pub fn write_xml(&self, w: &mut CanonicalWriter, is_response: bool, decls: &[(&str, &str)]) {
        let qname = format!("osci:{}", Self::header_name(is_response));
        w.start_with_decls(
            &qname,
            decls,
            &[(ns::attr::ID, Self::header_id(is_response))],
        );
        w.start("ds:Signature", &[]);
        match &self.signed_info {
            Some(bytes) => w.raw(bytes),
            None => w.raw(&self.render_signed_info(&[])),
        }
        w.element("ds:SignatureValue", &[], &b64::encode(&self.value));
        w.start("ds:KeyInfo", &[]);
        if let Some(der) = &self.certificate_der {
            w.start("ds:X509Data", &[]);
            w.element("ds:X509Certificate", &[], &b64::encode(der));
            w.end();
        } else if let Some(uri) = &self.retrieval_uri {
            w.start("ds:RetrievalMethod", &[(ns::attr::URI, uri.as_str())]);
            w.end();
        }
        w.end();
        w.end();
        w.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osci_core::algorithm;

    #[test]
    fn signed_info_lists_references_in_order() {
        let header = SignatureHeader {
            algorithm: algorithm::RSA_SHA256.to_owned(),
            references: vec![
                SignatureReference {
                    id: "controlblock".into(),
                    digest_uri: algorithm::SHA256.into(),
                    digest_value: vec![1, 2, 3],
                },
                SignatureReference {
                    id: "body".into(),
                    digest_uri: algorithm::SHA256.into(),
                    digest_value: vec![4, 5, 6],
                },
            ],
            ..Default::default()
        };
        let xml = String::from_utf8(header.render_signed_info(&[])).unwrap();
        let cb = xml.find("#controlblock").unwrap();
        let body = xml.find("#body").unwrap();
        assert!(cb < body);
        assert!(xml.contains(algorithm::RSA_SHA256));
    }

    #[test]
    fn header_name_depends_on_direction() {
        assert_eq!(SignatureHeader::header_name(false), "ClientSignature");
        assert_eq!(SignatureHeader::header_name(true), "SupplierSignature");
    }
}
