//! Transparent payload compression
//!
//! Provides LZ4 and Zstd compression for container payloads. The method id
//! is carried in the container flags so the read path can pick the right
//! decompressor regardless of the engine's current configuration.
//!
//! Compression is deterministic: identical input and level always produce
//! byte-identical output.

use crate::error::{Result, StoreError};

/// Zstd level range accepted by [`CompressionConfig::validate`].
pub const MIN_LEVEL: i32 = 1;
pub const MAX_LEVEL: i32 = 9;

/// Upper bound for a decompressed payload (guards against corrupted
/// length fields blowing up memory).
const MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

/// Compression method for container payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMethod {
    /// No compression
    None = 0,
    /// LZ4 compression (fast, moderate ratio)
    Lz4 = 1,
    /// Zstd compression (slower, better ratio)
    Zstd = 2,
}

impl CompressionMethod {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionMethod::None),
            1 => Some(CompressionMethod::Lz4),
            2 => Some(CompressionMethod::Zstd),
            _ => None,
        }
    }
}

/// Compression configuration for the write path
#[derive(Debug, Clone)]
pub struct CompressionConfig {
    /// Compression method to use
    pub method: CompressionMethod,

    /// Zstd compression level (1-9). Ignored by None and Lz4
    /// (lz4_flex has a single fixed level).
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig {
            method: CompressionMethod::Lz4,
            level: 3,
        }
    }
}

impl CompressionConfig {
    /// Create config with no compression
    pub fn none() -> Self {
        CompressionConfig {
            method: CompressionMethod::None,
            level: 3,
        }
    }

    /// Create config with LZ4 compression
    pub fn lz4() -> Self {
        CompressionConfig::default()
    }

    /// Create config with Zstd compression at the given level (1-9)
    pub fn zstd(level: i32) -> Self {
        CompressionConfig {
            method: CompressionMethod::Zstd,
            level,
        }
    }

    /// Check the level is in range for the selected method
    pub fn validate(&self) -> Result<()> {
        if self.method == CompressionMethod::Zstd
            && !(MIN_LEVEL..=MAX_LEVEL).contains(&self.level)
        {
            return Err(StoreError::InvalidConfig(format!(
                "zstd level {} out of range {}-{}",
                self.level, MIN_LEVEL, MAX_LEVEL
            )));
        }
        Ok(())
    }
}

/// Byte-stream compression contract.
pub trait Compressor: Send + Sync {
    /// Method id written into the container flags
    fn method(&self) -> CompressionMethod;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// LZ4 via `lz4_flex`, size-prepended framing
#[derive(Debug, Default)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Lz4
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(data)
            .map_err(|e| StoreError::CorruptPayload(format!("LZ4 decompression failed: {}", e)))
    }
}

/// Zstd via the `zstd` bulk API
#[derive(Debug)]
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        ZstdCompressor { level }
    }
}

impl Compressor for ZstdCompressor {
    fn method(&self) -> CompressionMethod {
        CompressionMethod::Zstd
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(data, self.level)
            .map_err(|e| StoreError::CorruptPayload(format!("Zstd compression failed: {}", e)))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::decompress(data, MAX_DECOMPRESSED_SIZE)
            .map_err(|e| StoreError::CorruptPayload(format!("Zstd decompression failed: {}", e)))
    }
}

/// Build the compressor for a method id parsed from a container header.
///
/// Returns `None` for `CompressionMethod::None` (the payload is stored raw).
pub fn compressor_for(method: CompressionMethod, level: i32) -> Option<Box<dyn Compressor>> {
    match method {
        CompressionMethod::None => None,
        CompressionMethod::Lz4 => Some(Box::new(Lz4Compressor)),
        CompressionMethod::Zstd => Some(Box::new(ZstdCompressor::new(level))),
    }
}
