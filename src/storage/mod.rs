//! Storage engine seam.
//!
//! The specification scopes the durable key/value storage engine and the
//! document codec out as external collaborators, "interfaces only." This
//! module defines that interface as a single Rust trait so the in-flight
//! manager is generic over whatever backs it, and provides two concrete
//! implementations: [`memory::InMemoryEngine`] (always available, the
//! default for tests and demos) and, behind the `sled-engine` feature,
//! [`sled_engine::SledEngine`] (a real durable backend, modeled on a
//! tree-per-concern write-ahead log).

pub mod memory;
#[cfg(feature = "sled-engine")]
pub mod sled_engine;

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::document::{DocId, DocumentBody, DocumentMetadata, Metadata};
use crate::error::StorageError;

pub use memory::InMemoryEngine;
#[cfg(feature = "sled-engine")]
pub use sled_engine::SledEngine;

/// A document as it is recorded once it leaves the in-flight manager:
/// either a live document, or a conflict record (the spec's
/// `store-conflict`, used both for add-conflicts and delete-conflicts, the
/// latter storing a deleted-sentinel in place of a body).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StoredDocument {
    Live {
        body: DocumentBody,
        metadata: Metadata,
    },
    Deleted {
        metadata: Metadata,
    },
    Conflict {
        body: Option<DocumentBody>,
        metadata: Metadata,
    },
}

impl StoredDocument {
    pub fn history_metadata(&self) -> &Metadata {
        match self {
            StoredDocument::Live { metadata, .. } => metadata,
            StoredDocument::Deleted { metadata } => metadata,
            StoredDocument::Conflict { metadata, .. } => metadata,
        }
    }
}

/// The storage engine and document-layer contracts, consumed (not owned) by
/// the in-flight manager:
///
/// - `begin`/`commit` are the storage engine's transaction primitive.
/// - `next_synctag` allocates a fresh globally monotonic synctag.
/// - `store_document`/`delete_document`/`store_conflict` are the document
///   codec, each threading the transaction handle through by value and
///   returning the (possibly updated) handle, mirroring the original's
///   functional `tx -> tx'` shape.
/// - `load_document_metadata` is a plain read, used only to recover the
///   last-known history for a document the in-flight state doesn't already
///   have an opinion about.
pub trait StorageEngine: Send + Sync {
    /// The underlying storage transaction handle.
    type Tx: Send;

    fn begin(&self) -> Result<Self::Tx, StorageError>;

    fn next_synctag(&self) -> Result<u64, StorageError>;

    fn commit(&self, tx: Self::Tx) -> Result<(), StorageError>;

    fn load_document_metadata(
        &self,
        id: &DocId,
    ) -> Result<Option<DocumentMetadata>, StorageError>;

    fn store_document(
        &self,
        tx: Self::Tx,
        id: &DocId,
        document: &DocumentBody,
        metadata: &Metadata,
    ) -> Result<Self::Tx, StorageError>;

    fn delete_document(
        &self,
        tx: Self::Tx,
        id: &DocId,
        metadata: &Metadata,
    ) -> Result<Self::Tx, StorageError>;

    fn store_conflict(
        &self,
        tx: Self::Tx,
        id: &DocId,
        document: Option<&DocumentBody>,
        metadata: &Metadata,
    ) -> Result<Self::Tx, StorageError>;
}

/// Helper shared by both engine implementations: fold arbitrary user
/// metadata plus the recognized `history`/`synctag` fields into the
/// `Map<String, Value>` a `DocumentMetadata` carries.
pub(crate) fn metadata_extra(metadata: &Metadata) -> Map<String, serde_json::Value> {
    metadata.extra.clone()
}
