//! Error types for the in-flight transaction manager.

use thiserror::Error;

use crate::inflight::TxId;

/// Faults surfaced by a [`crate::storage::StorageEngine`] implementation.
///
/// Kept generic over a `String` message rather than wrapping concrete
/// backend error types directly, so the manager doesn't need to know which
/// `StorageEngine` is plugged in. Concrete engines (`InMemoryEngine`,
/// `SledEngine`) convert their own error types into this one with `#[from]`
/// or `.map_err`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to begin storage transaction: {0}")]
    Begin(String),

    #[error("failed to allocate synctag: {0}")]
    Synctag(String),

    #[error("failed to commit storage transaction: {0}")]
    Commit(String),

    #[error("document operation failed: {0}")]
    Operation(String),
}

#[cfg(feature = "sled-engine")]
impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Operation(err.to_string())
    }
}

#[cfg(feature = "sled-engine")]
impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Operation(err.to_string())
    }
}

/// Errors surfaced by the public [`crate::inflight::Handle`] API.
///
/// Matches the taxonomy in the specification: `UnknownTransaction` is a
/// programmer error (a stale or foreign `TxId`), `Storage`/`CommitFailed`
/// wrap faults from the storage engine. Nothing here is swallowed; staged
/// state is left intact on `CommitFailed` so the caller can retry
/// `complete`.
#[derive(Error, Debug)]
pub enum InflightError {
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TxId),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("commit failed, transaction {txid} left open: {source}")]
    CommitFailed { txid: TxId, source: StorageError },
}

pub type Result<T> = std::result::Result<T, InflightError>;
