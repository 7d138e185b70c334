//! On-disk container format
//!
//! One container record holds the whole document set, as a versioned header
//! followed by the (optionally compressed, optionally sealed) payload:
//!
//! ```text
//! magic "SEAL" (4) | version (1) | flags (1) | nonce_len (1) | nonce
//! | tag_len (1) | tag | payload_len (8, big-endian) | payload
//! ```
//!
//! flags: bit0 = compressed, bit1 = encrypted, bits 2-3 = compression
//! method id. nonce_len and tag_len are zero for plaintext records.
//!
//! When encrypted, the associated data is every header byte except the tag
//! itself (the tag cannot authenticate its own bytes):
//! magic | version | flags | nonce_len | nonce | tag_len | payload_len.
//! Tampering with the flags to desync algorithm selection from the payload
//! therefore fails authentication, not just decoding.

use crate::cipher::{Aes256GcmCipher, Cipher, NONCE_SIZE, TAG_SIZE};
use crate::codec::{Codec, DocumentSet};
use crate::compression::{compressor_for, CompressionConfig, CompressionMethod};
use crate::error::{Result, StoreError};

/// Magic number identifying a sealstore container
pub const MAGIC: [u8; 4] = *b"SEAL";

/// Current container format version
pub const VERSION: u8 = 1;

const FLAG_COMPRESSED: u8 = 0b0000_0001;
const FLAG_ENCRYPTED: u8 = 0b0000_0010;
const METHOD_SHIFT: u8 = 2;
const METHOD_MASK: u8 = 0b0000_1100;

/// Bundles the codec, compression config, and optional cipher into the
/// record build/parse pipeline. The container depends only on the
/// [`Codec`]/[`Cipher`]/`Compressor` contracts, not concrete libraries.
pub struct Container {
    codec: Box<dyn Codec>,
    compression: CompressionConfig,
    cipher: Option<Aes256GcmCipher>,
}

impl Container {
    pub fn new(
        codec: Box<dyn Codec>,
        compression: CompressionConfig,
        cipher: Option<Aes256GcmCipher>,
    ) -> Result<Self> {
        compression.validate()?;
        Ok(Container {
            codec,
            compression,
            cipher,
        })
    }

    /// Build a complete on-disk record: encode -> compress -> seal -> assemble.
    pub fn build_record(&self, documents: &DocumentSet) -> Result<Vec<u8>> {
        let encoded = self.codec.encode(documents)?;

        let (payload, method) = match compressor_for(self.compression.method, self.compression.level)
        {
            Some(comp) => (comp.compress(&encoded)?, comp.method()),
            None => (encoded, CompressionMethod::None),
        };

        let mut flags = (method as u8) << METHOD_SHIFT;
        if method != CompressionMethod::None {
            flags |= FLAG_COMPRESSED;
        }

        match &self.cipher {
            Some(cipher) => {
                flags |= FLAG_ENCRYPTED;
                // Ciphertext length equals plaintext length for GCM, so the
                // full header (and with it the associated data) is known
                // before sealing. Nonce uniqueness is this module's
                // responsibility: one fresh random nonce per record.
                let nonce = crate::cipher::generate_nonce();
                let aad = header_aad(
                    flags,
                    NONCE_SIZE as u8,
                    &nonce,
                    TAG_SIZE as u8,
                    payload.len(),
                );
                let sealed = cipher.seal(&nonce, &payload, &aad)?;
                Ok(assemble(
                    flags,
                    Some(&nonce),
                    Some(&sealed.tag),
                    &sealed.ciphertext,
                ))
            }
            None => Ok(assemble(flags, None, None, &payload)),
        }
    }

    /// Parse an on-disk record: header -> open -> decompress -> decode.
    ///
    /// Any failing step aborts the whole read with a typed error; no partial
    /// result is ever returned.
    pub fn parse_record(&self, bytes: &[u8]) -> Result<DocumentSet> {
        let record = RawRecord::parse(bytes)?;

        let method = CompressionMethod::from_u8((record.flags & METHOD_MASK) >> METHOD_SHIFT)
            .ok_or_else(|| {
                StoreError::CorruptPayload(format!(
                    "unknown compression method id {}",
                    (record.flags & METHOD_MASK) >> METHOD_SHIFT
                ))
            })?;
        let compressed = record.flags & FLAG_COMPRESSED != 0;
        let encrypted = record.flags & FLAG_ENCRYPTED != 0;

        if compressed != (method != CompressionMethod::None) {
            return Err(StoreError::CorruptPayload(
                "compression flag disagrees with method id".to_string(),
            ));
        }

        let payload = if encrypted {
            let cipher = self.cipher.as_ref().ok_or_else(|| {
                StoreError::InvalidConfig(
                    "file is encrypted but no encryption key was provided".to_string(),
                )
            })?;
            let aad = header_aad(
                record.flags,
                record.nonce.len() as u8,
                record.nonce,
                record.tag.len() as u8,
                record.payload.len(),
            );
            cipher.open(record.nonce, record.payload, record.tag, &aad)?
        } else {
            if self.cipher.is_some() {
                tracing::warn!("opening plaintext record while an encryption key is configured");
            }
            record.payload.to_vec()
        };

        let decompressed = match compressor_for(method, self.compression.level) {
            Some(comp) => comp.decompress(&payload)?,
            None => payload,
        };

        self.codec.decode(&decompressed)
    }
}

/// Header fields of a parsed record, borrowing from the input buffer.
struct RawRecord<'a> {
    flags: u8,
    nonce: &'a [u8],
    tag: &'a [u8],
    payload: &'a [u8],
}

impl<'a> RawRecord<'a> {
    fn parse(bytes: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(bytes);

        let magic = r.take(4)?;
        if magic != MAGIC {
            return Err(StoreError::InvalidMagic);
        }

        let version = r.take_u8()?;
        if version != VERSION {
            return Err(StoreError::UnsupportedVersion(version));
        }

        let flags = r.take_u8()?;
        let encrypted = flags & FLAG_ENCRYPTED != 0;

        let nonce_len = r.take_u8()? as usize;
        let nonce = r.take(nonce_len)?;
        let tag_len = r.take_u8()? as usize;
        let tag = r.take(tag_len)?;

        if encrypted && (nonce_len != NONCE_SIZE || tag_len != TAG_SIZE) {
            return Err(StoreError::CorruptPayload(format!(
                "bad nonce/tag length: {}/{}",
                nonce_len, tag_len
            )));
        }
        if !encrypted && (nonce_len != 0 || tag_len != 0) {
            return Err(StoreError::CorruptPayload(
                "plaintext record carries nonce or tag".to_string(),
            ));
        }

        let payload_len = r.take_u64_be()?;
        let payload_len = usize::try_from(payload_len)
            .map_err(|_| StoreError::CorruptPayload("payload length overflow".to_string()))?;
        let payload = r.take(payload_len)?;

        if !r.is_empty() {
            return Err(StoreError::CorruptPayload(format!(
                "{} trailing bytes after payload",
                r.remaining()
            )));
        }

        Ok(RawRecord {
            flags,
            nonce,
            tag,
            payload,
        })
    }
}

/// Associated data for the authenticated cipher: every header byte except
/// the tag itself, in on-disk order. The tag is excluded because it is the
/// authenticator; the nonce is covered both here and intrinsically by GCM.
fn header_aad(flags: u8, nonce_len: u8, nonce: &[u8], tag_len: u8, payload_len: usize) -> Vec<u8> {
    let mut aad = Vec::with_capacity(4 + 1 + 1 + 1 + NONCE_SIZE + 1 + 8);
    aad.extend_from_slice(&MAGIC);
    aad.push(VERSION);
    aad.push(flags);
    aad.push(nonce_len);
    aad.extend_from_slice(nonce);
    aad.push(tag_len);
    aad.extend_from_slice(&(payload_len as u64).to_be_bytes());
    aad
}

fn assemble(flags: u8, nonce: Option<&[u8]>, tag: Option<&[u8]>, payload: &[u8]) -> Vec<u8> {
    let nonce = nonce.unwrap_or(&[]);
    let tag = tag.unwrap_or(&[]);

    let mut out = Vec::with_capacity(4 + 1 + 1 + 1 + nonce.len() + 1 + tag.len() + 8 + payload.len());
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.push(flags);
    out.push(nonce.len() as u8);
    out.extend_from_slice(nonce);
    out.push(tag.len() as u8);
    out.extend_from_slice(tag);
    out.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Bounds-checked cursor over a record buffer
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(StoreError::CorruptPayload(format!(
                "truncated record: wanted {} bytes, {} left",
                n,
                self.remaining()
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take_u64_be(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}
