//! # sealstore - Encrypted, Compressed Document Store
//!
//! `sealstore` keeps a JSON document set fully in memory and mirrors it to
//! one durable, optionally compressed, optionally encrypted container file.
//! Reads never touch disk; durable writes run on a single background thread
//! that commits via atomic file replacement.
//!
//! ## Features
//!
//! - **In-memory reads**: `read()` is an O(1) snapshot handoff, never I/O
//! - **Asynchronous durability**: `write()` returns once enqueued; a
//!   `JobHandle` (or `sync_writes`) gives the durable outcome
//! - **AES-256-GCM sealing** with the container header bound as associated
//!   data, so tampering anywhere in the record fails closed
//! - **LZ4 / Zstd compression** selected per store
//! - **Crash safety** via write-fsync-rename: the file on disk is always a
//!   complete, valid record
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sealstore::{Engine, EngineOptions, EncryptionConfig};
//! use serde_json::json;
//!
//! # fn main() -> sealstore::Result<()> {
//! let key = EncryptionConfig::generate_key();
//! let mut engine = Engine::open(
//!     "data.seal",
//!     EngineOptions::new(EncryptionConfig::new(key)),
//! )?;
//!
//! let mut docs = engine.read().as_ref().clone();
//! docs.insert("42".to_string(), json!({"name": "alice"}));
//! engine.write(docs)?;
//!
//! // Readers see the new set immediately; disk catches up in the
//! // background. close() drains everything still queued.
//! engine.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Pipeline
//!
//! ```text
//! write: DocumentSet -> encode (JSON) -> compress (LZ4/Zstd)
//!        -> seal (AES-256-GCM) -> container record -> tmp file
//!        -> fsync -> rename
//! read:  container record -> open -> decompress -> decode
//!        (hydration at Engine::open only)
//! ```
//!
//! One engine instance per file path is a caller precondition; see
//! [`Engine`] for the concurrency contract.

pub mod cipher;
pub mod codec;
pub mod compression;
pub mod container;
pub mod engine;
pub mod error;
pub mod writer;

pub use cipher::{Cipher, EncryptionConfig, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use codec::{Codec, Document, DocumentSet, JsonCodec};
pub use compression::{CompressionConfig, CompressionMethod, Compressor};
pub use container::{Container, MAGIC, VERSION};
pub use engine::{Engine, EngineOptions};
pub use error::{Result, StoreError};
pub use writer::{ErrorObserver, JobHandle};
