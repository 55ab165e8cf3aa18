//! Record encoding for bucket values.
//!
//! Values are bincode with fixed-width integers and trailing-byte rejection,
//! so a value either decodes completely or is reported as corrupt.
//!
//! A bucket key that was never written reads back as an empty byte string.
//! [`decode_list`] maps that to an empty list; [`decode`] for single records
//! refuses it, since an absent single record is the caller's `NotFound`.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::Bucket;
use crate::error::{StoreError, StoreResult};

/// Why a stored value failed to decode.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("empty value")]
    Empty,

    #[error("{0}")]
    Malformed(#[from] bincode::Error),
}

impl CodecError {
    /// Attach the location of the bad value.
    pub fn corrupt(self, bucket: Bucket, key: impl Into<String>) -> StoreError {
        StoreError::CorruptRecord {
            bucket: bucket.name(),
            key: key.into(),
            reason: self.to_string(),
        }
    }
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode a record, or a list of records, for storage.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> StoreResult<Vec<u8>> {
    options()
        .serialize(value)
        .map_err(|e| StoreError::Encode(e.to_string()))
}

/// Decode a single record. Empty input is an error.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(options().deserialize(bytes)?)
}

/// Decode a list of records. Empty input is an empty list.
pub fn decode_list<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, CodecError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(options().deserialize(bytes)?)
}
