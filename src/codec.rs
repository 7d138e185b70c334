//! Document codec boundary
//!
//! Serializes the in-memory document set to a byte payload and back.
//! The container format depends only on the [`Codec`] trait, so the
//! concrete serialization library can be swapped without touching the
//! write/read pipeline.

use crate::error::{Result, StoreError};
use serde_json::Value;

/// A single document value (arbitrary nested object/array/scalar tree).
pub type Document = Value;

/// The complete document set: document id -> document.
///
/// Keys are unique by construction; iteration order is not significant.
pub type DocumentSet = serde_json::Map<String, Value>;

/// Serialization contract for the document set.
pub trait Codec: Send + Sync {
    /// Serialize the document set to a byte payload.
    fn encode(&self, documents: &DocumentSet) -> Result<Vec<u8>>;

    /// Deserialize a byte payload back into a document set.
    fn decode(&self, bytes: &[u8]) -> Result<DocumentSet>;
}

/// JSON codec backed by `serde_json`.
///
/// Round-trips every value `serde_json::Value` can represent, including
/// the full `u64`/`i64` integer range. Non-finite floats (NaN, ±Inf) are
/// not representable in JSON; `Value` cannot hold them, and callers
/// converting raw floats should go through [`number_from_f64`] which
/// rejects them instead of silently mapping to null.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, documents: &DocumentSet) -> Result<Vec<u8>> {
        serde_json::to_vec(documents).map_err(StoreError::Encode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DocumentSet> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| StoreError::Decode(e.to_string()))?;
        match value {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Decode(format!(
                "top-level value must be an object, got {}",
                type_name(&other)
            ))),
        }
    }
}

/// Convert a raw float into a JSON number, rejecting non-finite values.
pub fn number_from_f64(value: f64) -> Result<Value> {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| {
            StoreError::UnsupportedValue(format!("non-finite float {} has no JSON form", value))
        })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
