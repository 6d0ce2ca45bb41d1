#![forbid(unsafe_code)]

//! RSA key transport (PKCS#1 v1.5 and OAEP) for wrapped content-encryption keys.

use osci_core::{algorithm, Error};

/// Trait for key transport algorithms.
pub trait KeyTransportAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn encrypt(&self, public_key: &rsa::RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>, Error>;
    fn decrypt(&self, private_key: &rsa::RsaPrivateKey, encrypted: &[u8])
        -> Result<Vec<u8>, Error>;
}

/// RSA-OAEP mask/digest parameters taken from the encrypted-key envelope.
#[derive(Debug, Clone, Default)]
pub struct OaepParams {
    /// Digest algorithm URI (default: SHA-1).
    pub digest_uri: Option<String>,
    /// MGF algorithm URI (default depends on the transport URI).
    pub mgf_uri: Option<String>,
}

/// Create a key transport algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn KeyTransportAlgorithm>, Error> {
    from_uri_with_params(uri, OaepParams::default())
}

/// Create a key transport algorithm from its URI with OAEP parameters.
pub fn from_uri_with_params(
    uri: &str,
    params: OaepParams,
) -> Result<Box<dyn KeyTransportAlgorithm>, Error> {
    match uri {
        algorithm::RSA_PKCS1 => Ok(Box::new(RsaPkcs1Transport)),
        algorithm::RSA_OAEP => Ok(Box::new(RsaOaepTransport {
            uri: algorithm::RSA_OAEP,
            params,
        })),
        algorithm::RSA_OAEP_ENC11 => Ok(Box::new(RsaOaepTransport {
            uri: algorithm::RSA_OAEP_ENC11,
            params,
        })),
        _ => Err(Error::UnsupportedAlgorithm(format!("key transport: {uri}"))),
    }
}

struct RsaPkcs1Transport;

impl KeyTransportAlgorithm for RsaPkcs1Transport {
    fn uri(&self) -> &'static str {
        algorithm::RSA_PKCS1
    }

    fn encrypt(&self, public_key: &rsa::RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>, Error> {
        use rsa::Pkcs1v15Encrypt;
        let mut rng = rand::thread_rng();
        public_key
            .encrypt(&mut rng, Pkcs1v15Encrypt, key_data)
            .map_err(|e| Error::Encryption(format!("RSA PKCS#1 encrypt: {e}")))
    }

    fn decrypt(
        &self,
        private_key: &rsa::RsaPrivateKey,
        encrypted: &[u8],
    ) -> Result<Vec<u8>, Error> {
        use rsa::Pkcs1v15Encrypt;
        private_key
            .decrypt(Pkcs1v15Encrypt, encrypted)
            .map_err(|e| Error::Decryption(format!("RSA PKCS#1 decrypt: {e}")))
    }
}

struct RsaOaepTransport {
    uri: &'static str,
    params: OaepParams,
}

/// Resolve the digest URI to a hash identifier.
fn resolve_digest(uri: Option<&str>) -> &'static str {
    match uri {
        Some(algorithm::SHA256) => "sha256",
        Some(algorithm::SHA384) => "sha384",
        Some(algorithm::SHA512) => "sha512",
        _ => "sha1",
    }
}

/// Resolve an explicit MGF URI to a hash identifier.
fn resolve_mgf(uri: Option<&str>) -> Option<&'static str> {
    match uri {
        Some(algorithm::MGF1_SHA1) => Some("sha1"),
        Some(algorithm::MGF1_SHA256) => Some("sha256"),
        Some(algorithm::MGF1_SHA384) => Some("sha384"),
        Some(algorithm::MGF1_SHA512) => Some("sha512"),
        _ => None,
    }
}

/// Resolve the MGF hash for OAEP.
///
/// For `rsa-oaep-mgf1p` (XML Enc 1.0) MGF1 always uses SHA-1 unless an
/// explicit MGF element overrides it; the DigestMethod only controls the
/// label hash.  For `rsa-oaep` (XML Enc 1.1) the MGF defaults to the same
/// hash as the DigestMethod.
fn resolve_oaep_mgf(uri: &str, params: &OaepParams, digest: &'static str) -> &'static str {
    if let Some(mgf) = resolve_mgf(params.mgf_uri.as_deref()) {
        return mgf;
    }
    if uri == algorithm::RSA_OAEP {
        return "sha1";
    }
    digest
}

macro_rules! oaep_encrypt {
    ($public_key:expr, $key_data:expr, $digest:ty, $mgf:ty) => {{
        let mut rng = rand::thread_rng();
        let padding = rsa::Oaep::new_with_mgf_hash::<$digest, $mgf>();
        $public_key
            .encrypt(&mut rng, padding, $key_data)
            .map_err(|e| Error::Encryption(format!("RSA-OAEP encrypt: {e}")))
    }};
}

macro_rules! oaep_decrypt {
    ($private_key:expr, $encrypted:expr, $digest:ty, $mgf:ty) => {{
        let padding = rsa::Oaep::new_with_mgf_hash::<$digest, $mgf>();
        $private_key
            .decrypt(padding, $encrypted)
            .map_err(|e| Error::Decryption(format!("RSA-OAEP decrypt: {e}")))
    }};
}

macro_rules! oaep_dispatch {
    ($op:ident, $key:expr, $data:expr, $digest:expr, $mgf:expr) => {{
        macro_rules! with_mgf {
            ($d:ty) => {
                match $mgf {
                    "sha256" => $op!($key, $data, $d, sha2::Sha256),
                    "sha384" => $op!($key, $data, $d, sha2::Sha384),
                    "sha512" => $op!($key, $data, $d, sha2::Sha512),
                    _ => $op!($key, $data, $d, sha1::Sha1),
                }
            };
        }
        match $digest {
            "sha256" => with_mgf!(sha2::Sha256),
            "sha384" => with_mgf!(sha2::Sha384),
            "sha512" => with_mgf!(sha2::Sha512),
            _ => with_mgf!(sha1::Sha1),
        }
    }};
}

impl KeyTransportAlgorithm for RsaOaepTransport {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn encrypt(&self, public_key: &rsa::RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>, Error> {
        let digest = resolve_digest(self.params.digest_uri.as_deref());
        let mgf = resolve_oaep_mgf(self.uri, &self.params, digest);
        oaep_dispatch!(oaep_encrypt, public_key, key_data, digest, mgf)
    }

    fn decrypt(
        &self,
        private_key: &rsa::RsaPrivateKey,
        encrypted: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let digest = resolve_digest(self.params.digest_uri.as_deref());
        let mgf = resolve_oaep_mgf(self.uri, &self.params, digest);
        oaep_dispatch!(oaep_decrypt, private_key, encrypted, digest, mgf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> rsa::RsaPrivateKey {
        rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap()
    }

    #[test]
    fn pkcs1_roundtrip() {
        let private = test_key();
        let public = private.to_public_key();
        let transport = from_uri(algorithm::RSA_PKCS1).unwrap();
        let session_key = [0x17u8; 32];
        let wrapped = transport.encrypt(&public, &session_key).unwrap();
        assert_eq!(transport.decrypt(&private, &wrapped).unwrap(), session_key);
    }

    #[test]
    fn oaep_roundtrip_with_params() {
        let private = test_key();
        let public = private.to_public_key();
        let params = OaepParams {
            digest_uri: Some(algorithm::SHA256.to_owned()),
            mgf_uri: Some(algorithm::MGF1_SHA256.to_owned()),
        };
        let transport = from_uri_with_params(algorithm::RSA_OAEP_ENC11, params).unwrap();
        let session_key = [0x2Au8; 32];
        let wrapped = transport.encrypt(&public, &session_key).unwrap();
        assert_eq!(transport.decrypt(&private, &wrapped).unwrap(), session_key);
    }

    #[test]
    fn oaep_mgf_defaults() {
        // XML Enc 1.0 OAEP defaults MGF1 to SHA-1 even with a SHA-256 digest.
        let p = OaepParams {
            digest_uri: Some(algorithm::SHA256.to_owned()),
            mgf_uri: None,
        };
        assert_eq!(resolve_oaep_mgf(algorithm::RSA_OAEP, &p, "sha256"), "sha1");
        // XML Enc 1.1 OAEP follows the digest.
        assert_eq!(
            resolve_oaep_mgf(algorithm::RSA_OAEP_ENC11, &p, "sha256"),
            "sha256"
        );
    }
}
