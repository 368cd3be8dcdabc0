//! Tasklock persistence core
//!
//! Encrypted local storage for the Tasklock desktop app: named collections
//! are serialized, sealed with XChaCha20-Poly1305 under a single long-lived
//! key, and written with an atomic-replace discipline. A backup service
//! snapshots the document directory into timestamped tar.gz archives.

pub mod backup;
pub mod cipher;
pub mod codec;
pub mod error;
pub mod keys;
pub mod models;
pub mod paths;
pub mod store;

pub use backup::BackupService;
pub use error::{Result, StoreError};
pub use keys::{EncryptionKey, KeyManager, KEY_LEN};
pub use models::{Tag, TagColor, TodoItem};
pub use store::DocumentStore;
