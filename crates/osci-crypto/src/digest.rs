#![forbid(unsafe_code)]

//! Message digest selection.
//!
//! OSCI negotiates one digest per message: the configured algorithm URI is
//! resolved to a [`DigestSuite`] once, at the start of a parse or compose
//! pass, and the canonicalizer opens one [`PartDigest`] per
//! signature-relevant subtree from that suite.  Attachment hashing resolves
//! per reference, since `DigestMethod` may name a different algorithm there.

use digest::Digest;
use osci_core::{algorithm, Error};

/// The digest algorithms OSCI 1.2 accepts for signature references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestSuite {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    Sha3_384,
    Sha3_512,
}

impl DigestSuite {
    /// Resolve a suite from an algorithm URI: the configured message
    /// default, or the `Algorithm` attribute of a `DigestMethod`.
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        match uri {
            algorithm::SHA1 => Ok(Self::Sha1),
            algorithm::SHA256 => Ok(Self::Sha256),
            algorithm::SHA384 => Ok(Self::Sha384),
            algorithm::SHA512 => Ok(Self::Sha512),
            algorithm::SHA3_256 => Ok(Self::Sha3_256),
            algorithm::SHA3_384 => Ok(Self::Sha3_384),
            algorithm::SHA3_512 => Ok(Self::Sha3_512),
            _ => Err(Error::UnsupportedAlgorithm(format!(
                "digest algorithm: {uri}"
            ))),
        }
    }

    /// The algorithm URI written into `DigestMethod` elements.
    pub fn uri(self) -> &'static str {
        match self {
            Self::Sha1 => algorithm::SHA1,
            Self::Sha256 => algorithm::SHA256,
            Self::Sha384 => algorithm::SHA384,
            Self::Sha512 => algorithm::SHA512,
            Self::Sha3_256 => algorithm::SHA3_256,
            Self::Sha3_384 => algorithm::SHA3_384,
            Self::Sha3_512 => algorithm::SHA3_512,
        }
    }

    /// Hash output width in bytes.
    pub fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 | Self::Sha3_256 => 32,
            Self::Sha384 | Self::Sha3_384 => 48,
            Self::Sha512 | Self::Sha3_512 => 64,
        }
    }

    /// Open a running digest for one subtree.
    pub fn start(self) -> PartDigest {
        PartDigest(match self {
            Self::Sha1 => Inner::Sha1(sha1::Sha1::new()),
            Self::Sha256 => Inner::Sha256(sha2::Sha256::new()),
            Self::Sha384 => Inner::Sha384(sha2::Sha384::new()),
            Self::Sha512 => Inner::Sha512(sha2::Sha512::new()),
            Self::Sha3_256 => Inner::Sha3_256(sha3::Sha3_256::new()),
            Self::Sha3_384 => Inner::Sha3_384(sha3::Sha3_384::new()),
            Self::Sha3_512 => Inner::Sha3_512(sha3::Sha3_512::new()),
        })
    }

    /// Hash a complete buffer in one step.
    pub fn hash(self, data: &[u8]) -> Vec<u8> {
        let mut part = self.start();
        part.update(data);
        part.finish()
    }
}

enum Inner {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha384(sha2::Sha384),
    Sha512(sha2::Sha512),
    Sha3_256(sha3::Sha3_256),
    Sha3_384(sha3::Sha3_384),
    Sha3_512(sha3::Sha3_512),
}

/// A running digest over one signature-relevant subtree.
pub struct PartDigest(Inner);

impl PartDigest {
    /// Feed canonical bytes into the hash.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.0 {
            Inner::Sha1(h) => h.update(data),
            Inner::Sha256(h) => h.update(data),
            Inner::Sha384(h) => h.update(data),
            Inner::Sha512(h) => h.update(data),
            Inner::Sha3_256(h) => h.update(data),
            Inner::Sha3_384(h) => h.update(data),
            Inner::Sha3_512(h) => h.update(data),
        }
    }

    /// Close the subtree and take the hash value.
    pub fn finish(self) -> Vec<u8> {
        match self.0 {
            Inner::Sha1(h) => h.finalize().to_vec(),
            Inner::Sha256(h) => h.finalize().to_vec(),
            Inner::Sha384(h) => h.finalize().to_vec(),
            Inner::Sha512(h) => h.finalize().to_vec(),
            Inner::Sha3_256(h) => h.finalize().to_vec(),
            Inner::Sha3_384(h) => h.finalize().to_vec(),
            Inner::Sha3_512(h) => h.finalize().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_value() {
        let result = DigestSuite::Sha256.hash(b"hello");
        let hex: String = result.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(
            hex,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn incremental_equals_one_shot() {
        let mut part = DigestSuite::Sha512.start();
        part.update(b"hel");
        part.update(b"lo");
        assert_eq!(part.finish(), DigestSuite::Sha512.hash(b"hello"));
    }

    #[test]
    fn uri_resolution_roundtrips() {
        for suite in [
            DigestSuite::Sha1,
            DigestSuite::Sha256,
            DigestSuite::Sha384,
            DigestSuite::Sha512,
            DigestSuite::Sha3_256,
            DigestSuite::Sha3_384,
            DigestSuite::Sha3_512,
        ] {
            assert_eq!(DigestSuite::from_uri(suite.uri()).unwrap(), suite);
            assert_eq!(suite.hash(b"x").len(), suite.output_len());
        }
    }

    #[test]
    fn unknown_uri_rejected() {
        assert!(DigestSuite::from_uri("http://example.com/fake-digest").is_err());
    }
}
