use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid magic number in container header")]
    InvalidMagic,

    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid encryption key: expected {expected} bytes, got {got}")]
    InvalidKey { expected: usize, got: usize },

    #[error("Value not representable by the codec: {0}")]
    UnsupportedValue(String),

    #[error("Encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("Authentication failed: header or payload was tampered with")]
    AuthenticationFailed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store is opened read-only")]
    ReadOnly,

    #[error("Engine is closed")]
    EngineClosed,

    #[error("Write job {0} dropped during close")]
    DroppedOnClose(u64),

    #[error("Fatal engine error: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
