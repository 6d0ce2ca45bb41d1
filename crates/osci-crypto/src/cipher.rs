#![forbid(unsafe_code)]

//! Symmetric transport-cipher implementations (AES-CBC, AES-GCM, 3DES-CBC).
//!
//! Wire framing follows XML Encryption: CBC ciphertexts carry the IV as a
//! prefix and use the last-byte padding-length convention; GCM ciphertexts
//! carry the 12-byte nonce as a prefix with the authentication tag appended
//! by the AEAD implementation.  Decryption of a GCM payload always verifies
//! the tag before any plaintext is released.

use osci_core::{algorithm, Error};

/// Trait for symmetric cipher algorithms.
pub trait CipherAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn key_size(&self) -> usize;
    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error>;
    fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Create a cipher algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn CipherAlgorithm>, Error> {
    match uri {
        algorithm::AES128_CBC => Ok(Box::new(AesCbc { key_size: 16, uri: algorithm::AES128_CBC })),
        algorithm::AES192_CBC => Ok(Box::new(AesCbc { key_size: 24, uri: algorithm::AES192_CBC })),
        algorithm::AES256_CBC => Ok(Box::new(AesCbc { key_size: 32, uri: algorithm::AES256_CBC })),
        algorithm::AES128_GCM => Ok(Box::new(AesGcmCipher { key_size: 16, uri: algorithm::AES128_GCM })),
        algorithm::AES192_GCM => Ok(Box::new(AesGcmCipher { key_size: 24, uri: algorithm::AES192_GCM })),
        algorithm::AES256_GCM => Ok(Box::new(AesGcmCipher { key_size: 32, uri: algorithm::AES256_GCM })),
        algorithm::TRIPLEDES_CBC => Ok(Box::new(TripleDesCbc)),
        _ => Err(Error::UnsupportedAlgorithm(format!("cipher: {uri}"))),
    }
}

/// Key length in bytes required by a cipher URI.
pub fn key_length(uri: &str) -> Result<usize, Error> {
    Ok(from_uri(uri)?.key_size())
}

fn check_key(expected: usize, key: &[u8]) -> Result<(), Error> {
    if key.len() != expected {
        return Err(Error::Crypto(format!(
            "expected {expected} byte key, got {}",
            key.len()
        )));
    }
    Ok(())
}

// ── AES-CBC ──────────────────────────────────────────────────────────

struct AesCbc {
    key_size: usize,
    uri: &'static str,
}

impl CipherAlgorithm for AesCbc {
    fn uri(&self) -> &'static str {
        self.uri
    }
    fn key_size(&self) -> usize {
        self.key_size
    }

    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        use cbc::cipher::{BlockEncryptMut, KeyIvInit};
        use rand::RngCore;

        check_key(self.key_size, key)?;
        let mut iv = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut buf = pad_block(plaintext, 16);
        let buf_len = buf.len();

        macro_rules! run {
            ($aes:ty) => {{
                let enc = cbc::Encryptor::<$aes>::new_from_slices(key, &iv)
                    .map_err(|e| Error::Crypto(format!("AES-CBC init: {e}")))?;
                enc.encrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf, buf_len)
                    .map_err(|e| Error::Crypto(format!("AES-CBC encrypt: {e}")))?;
            }};
        }
        match self.key_size {
            16 => run!(aes::Aes128),
            24 => run!(aes::Aes192),
            32 => run!(aes::Aes256),
            _ => return Err(Error::Crypto("unsupported AES key size".into())),
        }

        let mut out = Vec::with_capacity(16 + buf.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&buf);
        Ok(out)
    }

    fn decrypt(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        use cbc::cipher::{BlockDecryptMut, KeyIvInit};

        check_key(self.key_size, key)?;
        if data.len() < 32 || data.len() % 16 != 0 {
            return Err(Error::Crypto("AES-CBC data has invalid length".into()));
        }

        let iv = &data[..16];
        let mut buf = data[16..].to_vec();

        macro_rules! run {
            ($aes:ty) => {{
                let dec = cbc::Decryptor::<$aes>::new_from_slices(key, iv)
                    .map_err(|e| Error::Crypto(format!("AES-CBC init: {e}")))?;
                dec.decrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf)
                    .map_err(|e| Error::Crypto(format!("AES-CBC decrypt: {e}")))?;
            }};
        }
        match self.key_size {
            16 => run!(aes::Aes128),
            24 => run!(aes::Aes192),
            32 => run!(aes::Aes256),
            _ => return Err(Error::Crypto("unsupported AES key size".into())),
        }

        unpad_block(&buf, 16)
    }
}

// ── AES-GCM ──────────────────────────────────────────────────────────

struct AesGcmCipher {
    key_size: usize,
    uri: &'static str,
}

impl CipherAlgorithm for AesGcmCipher {
    fn uri(&self) -> &'static str {
        self.uri
    }
    fn key_size(&self) -> usize {
        self.key_size
    }

    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        use aes_gcm::{aead::Aead, KeyInit, Nonce};
        use rand::RngCore;

        check_key(self.key_size, key)?;
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        macro_rules! run {
            ($cipher:ty) => {{
                let cipher = <$cipher>::new_from_slice(key)
                    .map_err(|e| Error::Crypto(format!("AES-GCM init: {e}")))?;
                cipher
                    .encrypt(nonce, plaintext)
                    .map_err(|e| Error::Crypto(format!("AES-GCM encrypt: {e}")))?
            }};
        }
        let ct = match self.key_size {
            16 => run!(aes_gcm::Aes128Gcm),
            24 => {
                use aes_gcm::aead::consts::U12;
                run!(aes_gcm::AesGcm::<aes::Aes192, U12>)
            }
            32 => run!(aes_gcm::Aes256Gcm),
            _ => return Err(Error::Crypto("unsupported AES key size".into())),
        };

        let mut out = Vec::with_capacity(12 + ct.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ct);
        Ok(out)
    }

    fn decrypt(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        use aes_gcm::{aead::Aead, KeyInit, Nonce};

        check_key(self.key_size, key)?;
        if data.len() < 12 + 16 {
            return Err(Error::Crypto("AES-GCM data too short".into()));
        }
        let nonce = Nonce::from_slice(&data[..12]);
        let ct_and_tag = &data[12..];

        macro_rules! run {
            ($cipher:ty) => {{
                let cipher = <$cipher>::new_from_slice(key)
                    .map_err(|e| Error::Crypto(format!("AES-GCM init: {e}")))?;
                cipher
                    .decrypt(nonce, ct_and_tag)
                    .map_err(|e| Error::Crypto(format!("AES-GCM decrypt: {e}")))
            }};
        }
        match self.key_size {
            16 => run!(aes_gcm::Aes128Gcm),
            24 => {
                use aes_gcm::aead::consts::U12;
                run!(aes_gcm::AesGcm::<aes::Aes192, U12>)
            }
            32 => run!(aes_gcm::Aes256Gcm),
            _ => Err(Error::Crypto("unsupported AES key size".into())),
        }
    }
}

// ── 3DES-CBC ─────────────────────────────────────────────────────────

struct TripleDesCbc;

impl CipherAlgorithm for TripleDesCbc {
    fn uri(&self) -> &'static str {
        algorithm::TRIPLEDES_CBC
    }
    fn key_size(&self) -> usize {
        24
    }

    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        use cbc::cipher::{BlockEncryptMut, KeyIvInit};
        use rand::RngCore;

        check_key(24, key)?;
        let mut iv = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut buf = pad_block(plaintext, 8);
        let buf_len = buf.len();
        let enc = cbc::Encryptor::<des::TdesEde3>::new_from_slices(key, &iv)
            .map_err(|e| Error::Crypto(format!("3DES init: {e}")))?;
        enc.encrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf, buf_len)
            .map_err(|e| Error::Crypto(format!("3DES encrypt: {e}")))?;

        let mut out = Vec::with_capacity(8 + buf.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&buf);
        Ok(out)
    }

    fn decrypt(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        use cbc::cipher::{BlockDecryptMut, KeyIvInit};

        check_key(24, key)?;
        if data.len() < 16 || data.len() % 8 != 0 {
            return Err(Error::Crypto("3DES data has invalid length".into()));
        }

        let iv = &data[..8];
        let mut buf = data[8..].to_vec();
        let dec = cbc::Decryptor::<des::TdesEde3>::new_from_slices(key, iv)
            .map_err(|e| Error::Crypto(format!("3DES init: {e}")))?;
        dec.decrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf)
            .map_err(|e| Error::Crypto(format!("3DES decrypt: {e}")))?;

        unpad_block(&buf, 8)
    }
}

// ── XML Encryption block padding ─────────────────────────────────────

fn pad_block(data: &[u8], block_size: usize) -> Vec<u8> {
    let pad_len = block_size - (data.len() % block_size);
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.extend(std::iter::repeat(pad_len as u8).take(pad_len));
    padded
}

/// Remove XML Encryption padding.  Only the last byte carries the padding
/// length, which accepts both PKCS#7-style and ISO 10126-style filler.
fn unpad_block(data: &[u8], block_size: usize) -> Result<Vec<u8>, Error> {
    let Some(&pad_byte) = data.last() else {
        return Ok(Vec::new());
    };
    let pad_len = pad_byte as usize;
    if pad_len == 0 || pad_len > block_size || pad_len > data.len() {
        return Err(Error::Crypto("invalid padding".into()));
    }
    Ok(data[..data.len() - pad_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_roundtrip() {
        let padded = pad_block(b"hello", 16);
        assert_eq!(padded.len(), 16);
        assert_eq!(unpad_block(&padded, 16).unwrap(), b"hello");
    }

    #[test]
    fn iso10126_style_unpad() {
        let mut data = b"hello world!".to_vec();
        data.extend_from_slice(&[0xAB, 0xCD, 0xEF, 0x04]);
        assert_eq!(unpad_block(&data, 16).unwrap(), b"hello world!");
    }

    #[test]
    fn all_cipher_uris_roundtrip() {
        let cases: &[(&str, usize)] = &[
            (algorithm::AES128_CBC, 16),
            (algorithm::AES192_CBC, 24),
            (algorithm::AES256_CBC, 32),
            (algorithm::AES128_GCM, 16),
            (algorithm::AES192_GCM, 24),
            (algorithm::AES256_GCM, 32),
            (algorithm::TRIPLEDES_CBC, 24),
        ];
        let pt = b"a MIME message body that spans multiple cipher blocks for testing";
        for &(uri, key_size) in cases {
            let key: Vec<u8> = (0..key_size).map(|i| i as u8).collect();
            let cipher = from_uri(uri).unwrap();
            assert_eq!(cipher.key_size(), key_size);
            let ct = cipher.encrypt(&key, pt).unwrap();
            assert_eq!(cipher.decrypt(&key, &ct).unwrap(), pt, "roundtrip: {uri}");
        }
    }

    #[test]
    fn gcm_tag_tamper_detected() {
        let key = [0x42u8; 32];
        let cipher = from_uri(algorithm::AES256_GCM).unwrap();
        let mut ct = cipher.encrypt(&key, b"authenticated payload").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xFF;
        assert!(cipher.decrypt(&key, &ct).is_err());
    }

    #[test]
    fn unknown_cipher_rejected() {
        assert!(from_uri("http://example.com/fake-cipher").is_err());
    }
}
