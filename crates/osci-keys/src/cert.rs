#![forbid(unsafe_code)]

//! X.509 certificate wrapper.
//!
//! Holds the DER blob alongside the parsed certificate; equality and role
//! matching are defined over the DER bytes.

use der::oid::AssociatedOid;
use der::{Decode, Encode};
use osci_core::{Error, Result};
use osci_crypto::sign::SignKey;
use x509_cert::ext::pkix::{KeyUsage, KeyUsages};
use x509_cert::Certificate;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_P384: &str = "1.3.132.0.34";

/// A parsed X.509 certificate bound to a protocol role.
#[derive(Clone)]
pub struct OsciCertificate {
    der: Vec<u8>,
    cert: Certificate,
}

impl OsciCertificate {
    /// Parse a DER-encoded certificate.
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let cert = Certificate::from_der(&der)
            .map_err(|e| Error::Certificate(format!("failed to parse certificate: {e}")))?;
        Ok(Self { der, cert })
    }

    /// The DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The parsed certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.cert
    }

    /// RFC 4514 subject name.
    pub fn subject(&self) -> String {
        self.cert.tbs_certificate.subject.to_string()
    }

    /// Extract the subject public key as signature-verification key material.
    pub fn public_key(&self) -> Result<SignKey> {
        use spki::DecodePublicKey;

        let spki = &self.cert.tbs_certificate.subject_public_key_info;
        let spki_der = spki
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))?;

        match spki.algorithm.oid.to_string().as_str() {
            OID_RSA_ENCRYPTION => {
                let key = rsa::RsaPublicKey::from_public_key_der(&spki_der)
                    .map_err(|e| Error::Certificate(format!("invalid RSA public key: {e}")))?;
                Ok(SignKey::RsaPublic(key))
            }
            OID_EC_PUBLIC_KEY => {
                let curve = spki
                    .algorithm
                    .parameters
                    .as_ref()
                    .and_then(|p| {
                        p.decode_as::<der::asn1::ObjectIdentifier>()
                            .ok()
                            .or_else(|| der::asn1::ObjectIdentifier::from_der(p.value()).ok())
                    })
                    .map(|oid| oid.to_string())
                    .unwrap_or_default();
                match curve.as_str() {
                    OID_CURVE_P256 => {
                        let key = p256::ecdsa::VerifyingKey::from_public_key_der(&spki_der)
                            .map_err(|e| {
                                Error::Certificate(format!("invalid P-256 public key: {e}"))
                            })?;
                        Ok(SignKey::EcP256Public(key))
                    }
                    OID_CURVE_P384 => {
                        let key = p384::ecdsa::VerifyingKey::from_public_key_der(&spki_der)
                            .map_err(|e| {
                                Error::Certificate(format!("invalid P-384 public key: {e}"))
                            })?;
                        Ok(SignKey::EcP384Public(key))
                    }
                    other => Err(Error::Certificate(format!("unsupported EC curve: {other}"))),
                }
            }
            other => Err(Error::Certificate(format!(
                "unsupported public key algorithm: {other}"
            ))),
        }
    }

    /// Extract the subject public key as an RSA encryption key.
    pub fn rsa_public_key(&self) -> Result<rsa::RsaPublicKey> {
        match self.public_key()? {
            SignKey::RsaPublic(key) => Ok(key),
            _ => Err(Error::Certificate(
                "certificate does not carry an RSA key".into(),
            )),
        }
    }

    fn key_usage(&self) -> Result<Option<KeyUsage>> {
        let Some(extensions) = &self.cert.tbs_certificate.extensions else {
            return Ok(None);
        };
        for ext in extensions {
            if ext.extn_id == KeyUsage::OID {
                let usage = KeyUsage::from_der(ext.extn_value.as_bytes())
                    .map_err(|e| Error::Certificate(format!("invalid KeyUsage: {e}")))?;
                return Ok(Some(usage));
            }
        }
        Ok(None)
    }

    /// Whether the declared key usage permits signing.  A certificate
    /// without a KeyUsage extension places no restriction.
    pub fn allows_signing(&self) -> Result<bool> {
        Ok(match self.key_usage()? {
            Some(usage) => {
                usage.0.contains(KeyUsages::DigitalSignature)
                    || usage.0.contains(KeyUsages::NonRepudiation)
            }
            None => true,
        })
    }

    /// Whether the declared key usage permits key or data encipherment.
    pub fn allows_encryption(&self) -> Result<bool> {
        Ok(match self.key_usage()? {
            Some(usage) => {
                usage.0.contains(KeyUsages::KeyEncipherment)
                    || usage.0.contains(KeyUsages::DataEncipherment)
            }
            None => true,
        })
    }
}

impl PartialEq for OsciCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for OsciCertificate {}

impl std::fmt::Debug for OsciCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OsciCertificate({})", self.subject())
    }
}
