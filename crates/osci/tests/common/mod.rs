//! Shared test fixtures: in-memory RSA identities with self-signed
//! certificates carrying signing and encipherment key usage.

use der::{Decode, Encode};
use osci_core::algorithm;
use osci_keys::role::{PrivateKeySigner, RsaKeyDecrypter};
use osci_keys::{OsciCertificate, Role, RoleKind};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub struct TestIdentity {
    pub role: Role,
    pub private: rsa::RsaPrivateKey,
}

/// Generate an RSA key pair with a self-signed leaf certificate and wire it
/// into a role with signer and decrypter capabilities.
pub fn rsa_identity(kind: RoleKind, id: &str) -> TestIdentity {
    let private = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("RSA keygen");
    let cert_der = self_signed_cert(&private, id);
    let cert = OsciCertificate::from_der(cert_der).expect("test certificate parses");

    let role = Role::new(kind, id)
        .with_signature_cert(cert.clone())
        .with_cipher_cert(cert)
        .with_signer(Arc::new(PrivateKeySigner::rsa(
            private.clone(),
            algorithm::RSA_SHA256,
        )))
        .with_decrypter(Arc::new(RsaKeyDecrypter::new(private.clone())));

    TestIdentity { role, private }
}

/// Build a self-signed leaf certificate (digitalSignature + keyEncipherment).
pub fn self_signed_cert(private: &rsa::RsaPrivateKey, cn: &str) -> Vec<u8> {
    use x509_cert::builder::{Builder, CertificateBuilder, Profile};
    use x509_cert::name::Name;
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::spki::SubjectPublicKeyInfoOwned;
    use x509_cert::time::Validity;

    let signer = rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(private.clone());
    let public = private.to_public_key();

    use rsa::pkcs8::EncodePublicKey;
    let spki_der = public.to_public_key_der().expect("SPKI encoding");
    let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes()).expect("SPKI parses");

    let name = Name::from_str(&format!("CN={cn}")).expect("subject name");
    let profile = Profile::Leaf {
        issuer: name.clone(),
        enable_key_agreement: false,
        enable_key_encipherment: true,
    };
    let builder = CertificateBuilder::new(
        profile,
        SerialNumber::new(&[1]).expect("serial"),
        Validity::from_now(Duration::from_secs(24 * 3600)).expect("validity"),
        name,
        spki,
        &signer,
    )
    .expect("certificate builder");
    let cert = builder
        .build::<rsa::pkcs1v15::Signature>()
        .expect("certificate build");
    cert.to_der().expect("certificate DER")
}
