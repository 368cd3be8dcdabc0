//! Error types for the Tasklock persistence core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key file unreadable: {0}")]
    KeyIo(String),

    #[error("cannot persist generated key: {0}")]
    KeyPersist(String),

    #[error("sealed blob too short: {len} bytes, need at least {min}")]
    MalformedBlob { len: usize, min: usize },

    #[error("authentication failed: blob tampered or sealed under a different key")]
    Authentication,

    #[error("encode error: {0}")]
    Encode(serde_json::Error),

    #[error("decode error: {0}")]
    Decode(serde_json::Error),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("backup failed: {0}")]
    BackupIo(String),

    #[error("invalid document name: {0}")]
    InvalidName(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
