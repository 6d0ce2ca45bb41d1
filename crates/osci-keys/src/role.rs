#![forbid(unsafe_code)]

//! Protocol role identities and their key capabilities.
//!
//! A role binds an id to at most one signature certificate and one cipher
//! certificate, plus optional private-key capabilities.  Certificates are
//! shared by reference across a message; binding a second, different
//! certificate to the same logical role is an error.

use crate::cert::OsciCertificate;
use osci_core::{Error, Result};
use osci_crypto::keytransport::OaepParams;
use osci_crypto::sign::SignKey;
use std::sync::Arc;

/// The five OSCI role kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Originator,
    Addressee,
    Author,
    Reader,
    Intermediary,
}

impl RoleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RoleKind::Originator => "Originator",
            RoleKind::Addressee => "Addressee",
            RoleKind::Author => "Author",
            RoleKind::Reader => "Reader",
            RoleKind::Intermediary => "Intermediary",
        }
    }
}

/// Signing capability of a role holding a private key.
pub trait Signer: Send + Sync {
    /// Signature algorithm URI this signer produces.
    fn algorithm(&self) -> &str;
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Decryption capability of a role holding a private key: unwraps a
/// transport-encrypted symmetric content key.
pub trait Decrypter: Send + Sync {
    fn unwrap_key(&self, transport_uri: &str, params: &OaepParams, wrapped: &[u8])
        -> Result<Vec<u8>>;
}

/// A protocol role identity.
#[derive(Clone)]
pub struct Role {
    pub kind: RoleKind,
    pub id: String,
    signature_cert: Option<OsciCertificate>,
    cipher_cert: Option<OsciCertificate>,
    signer: Option<Arc<dyn Signer>>,
    decrypter: Option<Arc<dyn Decrypter>>,
}

impl Role {
    pub fn new(kind: RoleKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            signature_cert: None,
            cipher_cert: None,
            signer: None,
            decrypter: None,
        }
    }

    pub fn originator(id: impl Into<String>) -> Self {
        Self::new(RoleKind::Originator, id)
    }

    pub fn addressee(id: impl Into<String>) -> Self {
        Self::new(RoleKind::Addressee, id)
    }

    pub fn intermediary(id: impl Into<String>) -> Self {
        Self::new(RoleKind::Intermediary, id)
    }

    pub fn with_signature_cert(mut self, cert: OsciCertificate) -> Self {
        self.signature_cert = Some(cert);
        self
    }

    pub fn with_cipher_cert(mut self, cert: OsciCertificate) -> Self {
        self.cipher_cert = Some(cert);
        self
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_decrypter(mut self, decrypter: Arc<dyn Decrypter>) -> Self {
        self.decrypter = Some(decrypter);
        self
    }

    pub fn signature_cert(&self) -> Option<&OsciCertificate> {
        self.signature_cert.as_ref()
    }

    pub fn cipher_cert(&self) -> Option<&OsciCertificate> {
        self.cipher_cert.as_ref()
    }

    pub fn signer(&self) -> Option<&Arc<dyn Signer>> {
        self.signer.as_ref()
    }

    pub fn decrypter(&self) -> Option<&Arc<dyn Decrypter>> {
        self.decrypter.as_ref()
    }

    /// Bind a signature certificate, rejecting a divergent rebind.
    pub fn assign_signature_cert(&mut self, cert: OsciCertificate) -> Result<()> {
        match &self.signature_cert {
            Some(existing) if *existing != cert => Err(Error::IncompatibleRole(format!(
                "{} {}: divergent signature certificates",
                self.kind.name(),
                self.id
            ))),
            _ => {
                self.signature_cert = Some(cert);
                Ok(())
            }
        }
    }

    /// Bind a cipher certificate, rejecting a divergent rebind.
    pub fn assign_cipher_cert(&mut self, cert: OsciCertificate) -> Result<()> {
        match &self.cipher_cert {
            Some(existing) if *existing != cert => Err(Error::IncompatibleRole(format!(
                "{} {}: divergent cipher certificates",
                self.kind.name(),
                self.id
            ))),
            _ => {
                self.cipher_cert = Some(cert);
                Ok(())
            }
        }
    }

    /// Whether this role can decrypt a key wrapped for `recipient_cert_der`.
    pub fn matches_cipher_cert(&self, recipient_cert_der: &[u8]) -> bool {
        self.cipher_cert
            .as_ref()
            .is_some_and(|c| c.der() == recipient_cert_der)
    }
}

impl std::fmt::Debug for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Role")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("signature_cert", &self.signature_cert)
            .field("cipher_cert", &self.cipher_cert)
            .field("signer", &self.signer.is_some())
            .field("decrypter", &self.decrypter.is_some())
            .finish()
    }
}

// ── Private-key capability implementations ───────────────────────────

/// Signer backed by an in-memory private key.
pub struct PrivateKeySigner {
    key: SignKey,
    algorithm: String,
}

impl PrivateKeySigner {
    pub fn new(key: SignKey, algorithm_uri: impl Into<String>) -> Self {
        Self {
            key,
            algorithm: algorithm_uri.into(),
        }
    }

    pub fn rsa(key: rsa::RsaPrivateKey, algorithm_uri: impl Into<String>) -> Self {
        Self::new(SignKey::Rsa(key), algorithm_uri)
    }

    pub fn ecdsa_p256(key: p256::ecdsa::SigningKey, algorithm_uri: impl Into<String>) -> Self {
        Self::new(SignKey::EcP256(key), algorithm_uri)
    }
}

impl Signer for PrivateKeySigner {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        osci_crypto::sign::from_uri(&self.algorithm)?.sign(&self.key, data)
    }
}

/// Decrypter backed by an in-memory RSA private key.
pub struct RsaKeyDecrypter {
    key: rsa::RsaPrivateKey,
}

impl RsaKeyDecrypter {
    pub fn new(key: rsa::RsaPrivateKey) -> Self {
        Self { key }
    }
}

impl Decrypter for RsaKeyDecrypter {
    fn unwrap_key(
        &self,
        transport_uri: &str,
        params: &OaepParams,
        wrapped: &[u8],
    ) -> Result<Vec<u8>> {
        osci_crypto::keytransport::from_uri_with_params(transport_uri, params.clone())?
            .decrypt(&self.key, wrapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_kind_names() {
        assert_eq!(RoleKind::Originator.name(), "Originator");
        assert_eq!(RoleKind::Intermediary.name(), "Intermediary");
    }

    #[test]
    fn signer_roundtrip() {
        use osci_core::algorithm;
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let verify_key = *sk.verifying_key();
        let signer = PrivateKeySigner::ecdsa_p256(sk, algorithm::ECDSA_SHA256);
        let sig = signer.sign(b"data").unwrap();
        let alg = osci_crypto::sign::from_uri(algorithm::ECDSA_SHA256).unwrap();
        assert!(alg
            .verify(&SignKey::EcP256Public(verify_key), b"data", &sig)
            .unwrap());
    }

    #[test]
    fn decrypter_unwraps_wrapped_key() {
        use osci_core::algorithm;
        let private = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let public = private.to_public_key();
        let transport = osci_crypto::keytransport::from_uri(algorithm::RSA_PKCS1).unwrap();
        let session = [9u8; 32];
        let wrapped = transport.encrypt(&public, &session).unwrap();
        let decrypter = RsaKeyDecrypter::new(private);
        let unwrapped = decrypter
            .unwrap_key(algorithm::RSA_PKCS1, &OaepParams::default(), &wrapped)
            .unwrap();
        assert_eq!(unwrapped, session);
    }
}
