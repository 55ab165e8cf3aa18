use std::path::PathBuf;
use std::time::Duration;

/// Errors from store, repository, and ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Bytes are present under a key but do not decode into the expected shape.
    #[error("corrupt record {bucket}/{key}: {reason}")]
    CorruptRecord {
        bucket: &'static str,
        key: String,
        reason: String,
    },

    /// The requested record does not exist.
    #[error("not found: {bucket}/{key}")]
    NotFound { bucket: &'static str, key: String },

    /// The charge would push the user's usage above the cap. Nothing was written.
    #[error("upload quota exceeded for {username}: {used} used + {requested} requested > {cap}")]
    OverQuota {
        username: String,
        requested: u64,
        used: u64,
        cap: u64,
    },

    /// A write was refused because the resulting record would be invalid.
    #[error("invalid record: {0}")]
    Invalid(#[from] teian_types::TypeError),

    /// Underlying database, transaction, or commit failure.
    #[error("storage unavailable: {0}")]
    Storage(#[from] redb::Error),

    /// Filesystem failure outside the database itself.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The database file stayed locked by another process past the open timeout.
    #[error("database {} still locked after {timeout:?}", .path.display())]
    Locked { path: PathBuf, timeout: Duration },

    /// A transaction referenced a bucket that was never created.
    #[error("unknown bucket: {0}")]
    UnknownBucket(&'static str),

    /// The bucket's sequence reached `u64::MAX`.
    #[error("sequence exhausted for bucket {0}")]
    SequenceExhausted(&'static str),

    /// A value could not be encoded for storage.
    #[error("encode error: {0}")]
    Encode(String),

    /// A daily reset time could not be parsed or resolved.
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// `close` was called while other store handles were still alive.
    #[error("store still has {0} outstanding handle(s)")]
    HandlesOutstanding(usize),
}

macro_rules! storage_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for StoreError {
                fn from(e: $ty) -> Self {
                    Self::Storage(e.into())
                }
            }
        )*
    };
}

storage_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
