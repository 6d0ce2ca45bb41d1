#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA PKCS#1 v1.5, ECDSA).
//!
//! ECDSA signature values arrive as a raw `r || s` concatenation.  Some peer
//! implementations strip leading zero bytes from `r` or `s`, which makes the
//! split point ambiguous whenever the total length is odd.  Verification
//! therefore tries the canonical even split first and then four shifted
//! splits before giving up.

use osci_core::{algorithm, Error};
use signature::SignatureEncoding;

/// Key material for signature operations.
pub enum SignKey {
    Rsa(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
    EcP256(p256::ecdsa::SigningKey),
    EcP256Public(p256::ecdsa::VerifyingKey),
    EcP384(p384::ecdsa::SigningKey),
    EcP384Public(p384::ecdsa::VerifyingKey),
}

/// Trait for signature algorithms, selected by URI.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SignKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &SignKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA1, hash: HashType::Sha1 })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA256, hash: HashType::Sha256 })),
        algorithm::RSA_SHA384 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA384, hash: HashType::Sha384 })),
        algorithm::RSA_SHA512 => Ok(Box::new(RsaPkcs1v15 { uri: algorithm::RSA_SHA512, hash: HashType::Sha512 })),

        algorithm::ECDSA_SHA256 => Ok(Box::new(EcdsaP256 { uri: algorithm::ECDSA_SHA256 })),
        algorithm::ECDSA_SHA384 => Ok(Box::new(EcdsaP384 { uri: algorithm::ECDSA_SHA384 })),
        algorithm::ECDSA_SHA512 => Ok(Box::new(EcdsaP384 { uri: algorithm::ECDSA_SHA512 })),

        _ => Err(Error::UnsupportedAlgorithm(format!("signature algorithm: {uri}"))),
    }
}

#[derive(Debug, Clone, Copy)]
enum HashType { Sha1, Sha256, Sha384, Sha512 }

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 { uri: &'static str, hash: HashType }

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SignKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SignKey::Rsa(private_key) = key else {
            return Err(Error::Key("RSA private key required".into()));
        };
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
                Ok(sk.sign(data).to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
            HashType::Sha384 => do_sign!(sha2::Sha384),
            HashType::Sha512 => do_sign!(sha2::Sha512),
        }
    }

    fn verify(&self, key: &SignKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let pubk = match key {
            SignKey::Rsa(pk) => pk.to_public_key(),
            SignKey::RsaPublic(pk) => pk.clone(),
            _ => return Err(Error::Key("RSA key required".into())),
        };
        let sig = match rsa::pkcs1v15::Signature::try_from(sig_bytes) {
            Ok(sig) => sig,
            Err(_) => return Ok(false),
        };
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(pubk);
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
            HashType::Sha384 => do_verify!(sha2::Sha384),
            HashType::Sha512 => do_verify!(sha2::Sha512),
        }
    }
}

// ── ECDSA split-point candidates ─────────────────────────────────────

/// Candidate byte offsets for splitting an `r || s` value of `len` bytes.
///
/// The canonical split (half the length, rounded down) comes first; if the
/// length is not exactly two field widths, the boundary may have shifted by
/// stripped leading zeros, so offsets shifted by one and two bytes in either
/// direction are tried as well.
pub fn split_candidates(len: usize, field_len: usize) -> Vec<usize> {
    if len == 2 * field_len {
        return vec![field_len];
    }
    let mid = len / 2;
    [mid, mid.wrapping_sub(1), mid + 1, mid.wrapping_sub(2), mid + 2]
        .into_iter()
        .filter(|&p| p >= 1 && p < len && p <= field_len && len - p <= field_len)
        .collect()
}

fn left_pad(bytes: &[u8], width: usize) -> Option<Vec<u8>> {
    if bytes.len() > width {
        return None;
    }
    let mut out = vec![0u8; width - bytes.len()];
    out.extend_from_slice(bytes);
    Some(out)
}

// ── ECDSA P-256 ──────────────────────────────────────────────────────

struct EcdsaP256 { uri: &'static str }

/// Serialize a P-256 signature as the raw `r || s` concatenation.
pub fn p256_to_rs(sig: &p256::ecdsa::Signature) -> Vec<u8> {
    let (r, s) = sig.split_bytes();
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}

impl SignatureAlgorithm for EcdsaP256 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SignKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SignKey::EcP256(sk) = key else {
            return Err(Error::Key("P-256 signing key required".into()));
        };
        let sig: p256::ecdsa::Signature = sk.sign(data);
        Ok(p256_to_rs(&sig))
    }

    fn verify(&self, key: &SignKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let vk = match key {
            SignKey::EcP256(sk) => *sk.verifying_key(),
            SignKey::EcP256Public(vk) => *vk,
            _ => return Err(Error::Key("P-256 key required".into())),
        };
        for split in split_candidates(sig_bytes.len(), 32) {
            let (Some(r), Some(s)) = (
                left_pad(&sig_bytes[..split], 32),
                left_pad(&sig_bytes[split..], 32),
            ) else {
                continue;
            };
            let r = *p256::FieldBytes::from_slice(&r);
            let s = *p256::FieldBytes::from_slice(&s);
            let Ok(sig) = p256::ecdsa::Signature::from_scalars(r, s) else {
                continue;
            };
            if vk.verify(data, &sig).is_ok() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ── ECDSA P-384 ──────────────────────────────────────────────────────

struct EcdsaP384 { uri: &'static str }

/// Serialize a P-384 signature as the raw `r || s` concatenation.
pub fn p384_to_rs(sig: &p384::ecdsa::Signature) -> Vec<u8> {
    let (r, s) = sig.split_bytes();
    let mut out = Vec::with_capacity(96);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    out
}

impl SignatureAlgorithm for EcdsaP384 {
    fn uri(&self) -> &'static str { self.uri }

    fn sign(&self, key: &SignKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        let SignKey::EcP384(sk) = key else {
            return Err(Error::Key("P-384 signing key required".into()));
        };
        let sig: p384::ecdsa::Signature = sk.sign(data);
        Ok(p384_to_rs(&sig))
    }

    fn verify(&self, key: &SignKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        use signature::Verifier;
        let vk = match key {
            SignKey::EcP384(sk) => *sk.verifying_key(),
            SignKey::EcP384Public(vk) => *vk,
            _ => return Err(Error::Key("P-384 key required".into())),
        };
        for split in split_candidates(sig_bytes.len(), 48) {
            let (Some(r), Some(s)) = (
                left_pad(&sig_bytes[..split], 48),
                left_pad(&sig_bytes[split..], 48),
            ) else {
                continue;
            };
            let r = *p384::FieldBytes::from_slice(&r);
            let s = *p384::FieldBytes::from_slice(&s);
            let Ok(sig) = p384::ecdsa::Signature::from_scalars(r, s) else {
                continue;
            };
            if vk.verify(data, &sig).is_ok() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_candidates_even_length() {
        assert_eq!(split_candidates(64, 32), vec![32]);
        assert_eq!(split_candidates(96, 48), vec![48]);
    }

    #[test]
    fn split_candidates_odd_length() {
        // 63 bytes: one leading zero stripped from r or s.
        let c = split_candidates(63, 32);
        assert!(c.contains(&31));
        assert!(c.contains(&32));
        assert!(c.len() <= 5);
        for &p in &c {
            assert!(p <= 32 && 63 - p <= 32);
        }
    }

    #[test]
    fn rsa_sign_verify_roundtrip() {
        let mut rng = rand::thread_rng();
        let private = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let alg = from_uri(algorithm::RSA_SHA256).unwrap();
        let key = SignKey::Rsa(private);
        let sig = alg.sign(&key, b"payload").unwrap();
        assert!(alg.verify(&key, b"payload", &sig).unwrap());
        assert!(!alg.verify(&key, b"tampered", &sig).unwrap());
    }

    #[test]
    fn ecdsa_p256_sign_verify_roundtrip() {
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let alg = from_uri(algorithm::ECDSA_SHA256).unwrap();
        let key = SignKey::EcP256(sk);
        let sig = alg.sign(&key, b"payload").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(alg.verify(&key, b"payload", &sig).unwrap());
        assert!(!alg.verify(&key, b"other", &sig).unwrap());
    }

    #[test]
    fn ecdsa_odd_length_split_fallback() {
        use signature::Signer;
        let sk = p256::ecdsa::SigningKey::random(&mut rand::thread_rng());
        let alg = from_uri(algorithm::ECDSA_SHA256).unwrap();
        let key = SignKey::EcP256(sk.clone());

        // Find a message whose signature has a leading zero in r or s, then
        // strip it to produce an ambiguous odd-length encoding.
        let mut found = false;
        for i in 0..4096u32 {
            let data = format!("probe-{i}").into_bytes();
            let sig: p256::ecdsa::Signature = sk.sign(&data);
            let rs = p256_to_rs(&sig);
            let stripped: Vec<u8> = if rs[0] == 0 {
                rs[1..].to_vec()
            } else if rs[32] == 0 {
                let mut v = rs[..32].to_vec();
                v.extend_from_slice(&rs[33..]);
                v
            } else {
                continue;
            };
            assert_eq!(stripped.len(), 63);
            assert!(alg.verify(&key, &data, &stripped).unwrap());

            // A tampered odd-length signature must fail all five splits.
            let mut bad = stripped;
            bad[10] ^= 0xFF;
            assert!(!alg.verify(&key, &data, &bad).unwrap());
            found = true;
            break;
        }
        assert!(found, "no signature with a stripped leading zero found");
    }
}
