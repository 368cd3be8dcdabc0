//! Schema-free record serialization, decoupled from encryption.
//!
//! JSON keeps the store schema-agnostic: any record built from numbers,
//! strings, booleans, sequences, string-keyed maps, options and nested
//! structs round-trips. Field order is not stable, so equality lives at
//! the value level, never at the byte level.

use crate::error::{Result, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(StoreError::Encode)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(StoreError::Decode)
}
