#![forbid(unsafe_code)]

//! PKCS#8 private-key loading into role capabilities.

use crate::role::{PrivateKeySigner, RsaKeyDecrypter};
use osci_core::{algorithm, Error, Result};
use osci_crypto::sign::SignKey;

/// Load a signer from a PKCS#8 DER private key.
///
/// RSA and EC P-256/P-384 keys are recognized; the signature algorithm URI
/// must match the key type.
pub fn signer_from_pkcs8_der(der: &[u8], algorithm_uri: &str) -> Result<PrivateKeySigner> {
    let key = sign_key_from_pkcs8_der(der)?;
    check_key_matches(&key, algorithm_uri)?;
    Ok(PrivateKeySigner::new(key, algorithm_uri))
}

/// Load a signer from a PKCS#8 PEM private key.
pub fn signer_from_pkcs8_pem(pem: &str, algorithm_uri: &str) -> Result<PrivateKeySigner> {
    let key = sign_key_from_pkcs8_pem(pem)?;
    check_key_matches(&key, algorithm_uri)?;
    Ok(PrivateKeySigner::new(key, algorithm_uri))
}

/// Load an RSA decrypter from a PKCS#8 DER private key.
pub fn decrypter_from_pkcs8_der(der: &[u8]) -> Result<RsaKeyDecrypter> {
    use rsa::pkcs8::DecodePrivateKey;
    let key = rsa::RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| Error::Key(format!("PKCS#8 RSA key: {e}")))?;
    Ok(RsaKeyDecrypter::new(key))
}

/// Load an RSA decrypter from a PKCS#8 PEM private key.
pub fn decrypter_from_pkcs8_pem(pem: &str) -> Result<RsaKeyDecrypter> {
    use rsa::pkcs8::DecodePrivateKey;
    let key = rsa::RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|e| Error::Key(format!("PKCS#8 RSA key: {e}")))?;
    Ok(RsaKeyDecrypter::new(key))
}

fn sign_key_from_pkcs8_der(der: &[u8]) -> Result<SignKey> {
    {
        use rsa::pkcs8::DecodePrivateKey;
        if let Ok(key) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(SignKey::Rsa(key));
        }
    }
    {
        use p256::pkcs8::DecodePrivateKey;
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
            return Ok(SignKey::EcP256(key));
        }
    }
    {
        use p384::pkcs8::DecodePrivateKey;
        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_der(der) {
            return Ok(SignKey::EcP384(key));
        }
    }
    Err(Error::Key("unrecognized PKCS#8 private key".into()))
}

fn sign_key_from_pkcs8_pem(pem: &str) -> Result<SignKey> {
    {
        use rsa::pkcs8::DecodePrivateKey;
        if let Ok(key) = rsa::RsaPrivateKey::from_pkcs8_pem(pem) {
            return Ok(SignKey::Rsa(key));
        }
    }
    {
        use p256::pkcs8::DecodePrivateKey;
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(SignKey::EcP256(key));
        }
    }
    {
        use p384::pkcs8::DecodePrivateKey;
        if let Ok(key) = p384::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(SignKey::EcP384(key));
        }
    }
    Err(Error::Key("unrecognized PKCS#8 private key".into()))
}

fn check_key_matches(key: &SignKey, algorithm_uri: &str) -> Result<()> {
    let ok = match key {
        SignKey::Rsa(_) | SignKey::RsaPublic(_) => matches!(
            algorithm_uri,
            algorithm::RSA_SHA1
                | algorithm::RSA_SHA256
                | algorithm::RSA_SHA384
                | algorithm::RSA_SHA512
        ),
        SignKey::EcP256(_) | SignKey::EcP256Public(_) => {
            algorithm_uri == algorithm::ECDSA_SHA256
        }
        SignKey::EcP384(_) | SignKey::EcP384Public(_) => matches!(
            algorithm_uri,
            algorithm::ECDSA_SHA384 | algorithm::ECDSA_SHA512
        ),
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Key(format!(
            "key type does not match signature algorithm {algorithm_uri}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Signer;

    #[test]
    fn pkcs8_p256_signer_roundtrip() {
        use p256::pkcs8::EncodePrivateKey;
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let der = sk.to_pkcs8_der().unwrap();
        let signer =
            signer_from_pkcs8_der(der.as_bytes(), algorithm::ECDSA_SHA256).unwrap();
        assert_eq!(signer.algorithm(), algorithm::ECDSA_SHA256);
        assert_eq!(signer.sign(b"x").unwrap().len(), 64);
    }

    #[test]
    fn mismatched_algorithm_rejected() {
        use p256::pkcs8::EncodePrivateKey;
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let der = sk.to_pkcs8_der().unwrap();
        assert!(signer_from_pkcs8_der(der.as_bytes(), algorithm::RSA_SHA256).is_err());
    }
}
