//! Tamper-detection tests for the sealed container file
//!
//! An encrypted store file must fail closed on any modification: the
//! header is bound to the ciphertext as associated data, so no single-bit
//! flip anywhere in the record may yield wrong data.

use sealstore::{
    CompressionConfig, EncryptionConfig, Engine, EngineOptions, StoreError,
};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

fn write_store(path: &std::path::Path, key: [u8; 32]) {
    let engine = Engine::open(
        path,
        EngineOptions::new(EncryptionConfig::new(key))
            .compression(CompressionConfig::zstd(3))
            .sync_writes(true),
    )
    .unwrap();

    let mut docs = sealstore::DocumentSet::new();
    docs.insert("1".to_string(), json!({"owner": "alice", "balance": 100}));
    docs.insert("2".to_string(), json!({"owner": "bob", "balance": 250}));
    engine.write(docs).unwrap();
}

#[test]
fn test_every_single_bit_flip_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db.seal");
    let key = EncryptionConfig::generate_key();
    write_store(&path, key);

    let original = fs::read(&path).unwrap();

    for idx in 0..original.len() {
        for bit in [0x01u8, 0x80u8] {
            let mut tampered = original.clone();
            tampered[idx] ^= bit;
            fs::write(&path, &tampered).unwrap();

            let result = Engine::open(&path, EngineOptions::new(EncryptionConfig::new(key)));
            assert!(
                result.is_err(),
                "bit flip at byte {} (mask {:#04x}) was accepted",
                idx,
                bit
            );
        }
    }
}

#[test]
fn test_ciphertext_and_tag_flips_fail_authentication() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db.seal");
    let key = EncryptionConfig::generate_key();
    write_store(&path, key);

    let original = fs::read(&path).unwrap();
    // Layout: magic(4) version(1) flags(1) nonce_len(1) nonce(12)
    // tag_len(1) tag(16) payload_len(8) payload(..)
    let tag_byte = 4 + 1 + 1 + 1 + 12 + 1 + 3;
    let payload_byte = original.len() - 1;

    for idx in [tag_byte, payload_byte] {
        let mut tampered = original.clone();
        tampered[idx] ^= 0x40;
        fs::write(&path, &tampered).unwrap();

        assert!(matches!(
            Engine::open(&path, EngineOptions::new(EncryptionConfig::new(key))),
            Err(StoreError::AuthenticationFailed)
        ));
    }
}

#[test]
fn test_unknown_version_is_typed_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db.seal");
    let key = EncryptionConfig::generate_key();
    write_store(&path, key);

    let mut bytes = fs::read(&path).unwrap();
    bytes[4] = 255;
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        Engine::open(&path, EngineOptions::new(EncryptionConfig::new(key))),
        Err(StoreError::UnsupportedVersion(255))
    ));
}

#[test]
fn test_truncated_file_is_corrupt_not_partial() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db.seal");
    let key = EncryptionConfig::generate_key();
    write_store(&path, key);

    let original = fs::read(&path).unwrap();
    for keep in [3, 10, original.len() / 2, original.len() - 1] {
        fs::write(&path, &original[..keep]).unwrap();
        let result = Engine::open(&path, EngineOptions::new(EncryptionConfig::new(key)));
        assert!(result.is_err(), "truncation to {} bytes was accepted", keep);
    }
}

#[test]
fn test_lenient_mode_never_exposes_tampered_data() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("db.seal");
    let key = EncryptionConfig::generate_key();
    write_store(&path, key);

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    // Lenient hydration starts empty instead of surfacing wrong content.
    let engine = Engine::open(
        &path,
        EngineOptions::new(EncryptionConfig::new(key)).strict_hydration(false),
    )
    .unwrap();
    assert!(engine.read().is_empty());
}
