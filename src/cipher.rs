//! AES-256-GCM sealing for container payloads
//!
//! Provides authenticated encryption with:
//! - AES-256-GCM (Galois/Counter Mode) for confidentiality
//! - 96-bit random nonces (12 bytes) for uniqueness
//! - 128-bit authentication tags for integrity
//! - Associated-data binding of the container header
//!
//! A fresh random nonce is drawn from the OS RNG on every seal, so a nonce
//! is never reused for a given key across the file's lifetime. `open` fails
//! closed: any bit flip in nonce, ciphertext, tag, or associated data yields
//! `AuthenticationFailed` and no plaintext.

use crate::error::{Result, StoreError};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

/// Key size for AES-256 (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Nonce size for AES-GCM (96 bits / 12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;

/// Encryption key (32 bytes for AES-256)
pub type EncryptionKey = [u8; KEY_SIZE];

/// Result of sealing a plaintext: ciphertext plus detached tag.
#[derive(Debug, Clone)]
pub struct SealedPayload {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
}

/// Authenticated encryption contract.
///
/// The caller supplies the nonce and must never reuse one for a given key;
/// the container upholds this by drawing a fresh [`generate_nonce`] value
/// per record. `aad` is bound into the authentication tag: `open` must be
/// called with the exact associated data used at seal time.
pub trait Cipher: Send + Sync {
    fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8], aad: &[u8])
        -> Result<SealedPayload>;

    fn open(&self, nonce: &[u8], ciphertext: &[u8], tag: &[u8], aad: &[u8]) -> Result<Vec<u8>>;
}

/// Draw a fresh random 96-bit nonce from the OS RNG.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// AES-256-GCM cipher over a fixed key.
#[derive(Clone)]
pub struct Aes256GcmCipher {
    key: EncryptionKey,
}

impl Aes256GcmCipher {
    pub fn new(key: EncryptionKey) -> Self {
        Aes256GcmCipher { key }
    }

    /// Build a cipher from raw key bytes, validating the length before any
    /// cryptographic operation runs.
    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(StoreError::InvalidKey {
                expected: KEY_SIZE,
                got: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Aes256GcmCipher { key })
    }
}

impl Cipher for Aes256GcmCipher {
    fn seal(
        &self,
        nonce: &[u8; NONCE_SIZE],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<SealedPayload> {
        let cipher = Aes256Gcm::new((&self.key).into());

        // aes-gcm appends the tag to the ciphertext; split it back out so
        // the container can place it in its own header field.
        let mut sealed = cipher
            .encrypt(
                Nonce::from_slice(nonce),
                Payload { msg: plaintext, aad },
            )
            .map_err(|_| StoreError::AuthenticationFailed)?;

        let tag_start = sealed.len() - TAG_SIZE;
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&sealed[tag_start..]);
        sealed.truncate(tag_start);

        Ok(SealedPayload {
            ciphertext: sealed,
            tag,
        })
    }

    fn open(&self, nonce: &[u8], ciphertext: &[u8], tag: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != NONCE_SIZE || tag.len() != TAG_SIZE {
            return Err(StoreError::CorruptPayload(format!(
                "bad nonce/tag length: {}/{}",
                nonce.len(),
                tag.len()
            )));
        }

        let cipher = Aes256Gcm::new((&self.key).into());
        let nonce = Nonce::from_slice(nonce);

        let mut combined = Vec::with_capacity(ciphertext.len() + TAG_SIZE);
        combined.extend_from_slice(ciphertext);
        combined.extend_from_slice(tag);

        cipher
            .decrypt(nonce, Payload { msg: &combined, aad })
            .map_err(|_| StoreError::AuthenticationFailed)
    }
}

/// Encryption configuration for the engine
///
/// There is deliberately no `Default`: writing plaintext to disk must be an
/// explicit choice via [`EncryptionConfig::disabled`].
#[derive(Clone)]
pub struct EncryptionConfig {
    key: Option<EncryptionKey>,
}

impl EncryptionConfig {
    /// Encrypt with the provided key
    pub fn new(key: EncryptionKey) -> Self {
        EncryptionConfig { key: Some(key) }
    }

    /// Encrypt with raw key bytes; wrong-length keys fail with `InvalidKey`
    pub fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        Aes256GcmCipher::from_key_bytes(bytes).map(|c| EncryptionConfig { key: Some(c.key) })
    }

    /// Explicitly opt out of encryption (plaintext on disk)
    pub fn disabled() -> Self {
        EncryptionConfig { key: None }
    }

    /// Generate a random encryption key
    pub fn generate_key() -> EncryptionKey {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Check if encryption is enabled
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    pub(crate) fn cipher(&self) -> Option<Aes256GcmCipher> {
        self.key.map(Aes256GcmCipher::new)
    }
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.debug_struct("EncryptionConfig")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key1 = EncryptionConfig::generate_key();
        let key2 = EncryptionConfig::generate_key();

        assert_ne!(key1, key2);
        assert_eq!(key1.len(), KEY_SIZE);
    }

    #[test]
    fn test_seal_open_round_trip() {
        let cipher = Aes256GcmCipher::new(EncryptionConfig::generate_key());
        let plaintext = b"Hello, World! This is a secret message.";
        let aad = b"header bytes";
        let nonce = generate_nonce();

        let sealed = cipher.seal(&nonce, plaintext, aad).unwrap();
        let opened = cipher
            .open(&nonce, &sealed.ciphertext, &sealed.tag, aad)
            .unwrap();

        assert_eq!(plaintext.as_slice(), opened.as_slice());
        assert_eq!(sealed.ciphertext.len(), plaintext.len());
        assert_ne!(sealed.ciphertext.as_slice(), plaintext.as_slice());
    }

    #[test]
    fn test_wrong_key_fails() {
        let cipher1 = Aes256GcmCipher::new(EncryptionConfig::generate_key());
        let cipher2 = Aes256GcmCipher::new(EncryptionConfig::generate_key());
        let nonce = generate_nonce();

        let sealed = cipher1.seal(&nonce, b"secret", b"").unwrap();
        assert!(matches!(
            cipher2.open(&nonce, &sealed.ciphertext, &sealed.tag, b""),
            Err(StoreError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let cipher = Aes256GcmCipher::new(EncryptionConfig::generate_key());
        let nonce = generate_nonce();
        let sealed = cipher.seal(&nonce, b"important data", b"aad").unwrap();

        let mut tampered = sealed.ciphertext.clone();
        tampered[3] ^= 0x01;

        assert!(matches!(
            cipher.open(&nonce, &tampered, &sealed.tag, b"aad"),
            Err(StoreError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_tampered_tag_fails() {
        let cipher = Aes256GcmCipher::new(EncryptionConfig::generate_key());
        let nonce = generate_nonce();
        let sealed = cipher.seal(&nonce, b"important data", b"aad").unwrap();

        let mut tag = sealed.tag;
        tag[0] ^= 0x80;

        assert!(matches!(
            cipher.open(&nonce, &sealed.ciphertext, &tag, b"aad"),
            Err(StoreError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let cipher = Aes256GcmCipher::new(EncryptionConfig::generate_key());
        let nonce = generate_nonce();
        let sealed = cipher.seal(&nonce, b"important data", b"aad").unwrap();

        let mut flipped = nonce;
        flipped[11] ^= 0x01;

        assert!(matches!(
            cipher.open(&flipped, &sealed.ciphertext, &sealed.tag, b"aad"),
            Err(StoreError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_wrong_aad_fails() {
        let cipher = Aes256GcmCipher::new(EncryptionConfig::generate_key());
        let nonce = generate_nonce();
        let sealed = cipher.seal(&nonce, b"payload", b"header v1").unwrap();

        assert!(matches!(
            cipher.open(&nonce, &sealed.ciphertext, &sealed.tag, b"header v2"),
            Err(StoreError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(matches!(
            Aes256GcmCipher::from_key_bytes(&[0u8; 16]),
            Err(StoreError::InvalidKey {
                expected: 32,
                got: 16
            })
        ));
        assert!(Aes256GcmCipher::from_key_bytes(&[0u8; 32]).is_ok());
        assert!(matches!(
            EncryptionConfig::from_key_bytes(&[0u8; 33]),
            Err(StoreError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_nonce_uniqueness() {
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn test_empty_plaintext() {
        let cipher = Aes256GcmCipher::new(EncryptionConfig::generate_key());
        let nonce = generate_nonce();
        let sealed = cipher.seal(&nonce, b"", b"aad").unwrap();
        let opened = cipher
            .open(&nonce, &sealed.ciphertext, &sealed.tag, b"aad")
            .unwrap();

        assert!(sealed.ciphertext.is_empty());
        assert!(opened.is_empty());
    }

    #[test]
    fn test_config_debug_hides_key() {
        let config = EncryptionConfig::new(EncryptionConfig::generate_key());
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("enabled"));
        assert!(!rendered.contains("key:"));
    }
}
