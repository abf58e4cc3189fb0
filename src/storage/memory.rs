//! An in-process `StorageEngine`, the default backend used by the crate's
//! own tests and demos.
//!
//! Generalizes the `Engine` trait shape used by `rust-us-kv-rs`'s in-memory
//! engine (`storage/memory.rs` there) from raw bytes to whole documents: a
//! `Mutex`-guarded map plus an atomic synctag counter. The storage
//! transaction handle is just a buffer of pending writes, applied to the
//! map in one lock acquisition on commit, the same "stage writes, apply on
//! commit" shape a write-ahead transaction log uses, minus persistence.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::document::{DocId, DocumentBody, DocumentMetadata, Metadata};
use crate::error::StorageError;

use super::{metadata_extra, StorageEngine, StoredDocument};

/// A buffered write, applied to the map when the transaction commits.
type PendingWrite = (DocId, StoredDocument);

#[derive(Default)]
pub struct InMemoryEngine {
    documents: Mutex<HashMap<DocId, StoredDocument>>,
    next_synctag: AtomicU64,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/demo helper: read back whatever is currently committed for
    /// `id`, bypassing the in-flight layer entirely.
    pub fn get(&self, id: &DocId) -> Option<StoredDocument> {
        self.documents.lock().unwrap().get(id).cloned()
    }
}

impl StorageEngine for InMemoryEngine {
    type Tx = Vec<PendingWrite>;

    fn begin(&self) -> Result<Self::Tx, StorageError> {
        Ok(Vec::new())
    }

    fn next_synctag(&self) -> Result<u64, StorageError> {
        Ok(self.next_synctag.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn commit(&self, tx: Self::Tx) -> Result<(), StorageError> {
        let mut documents = self.documents.lock().unwrap();
        for (id, doc) in tx {
            documents.insert(id, doc);
        }
        Ok(())
    }

    fn load_document_metadata(
        &self,
        id: &DocId,
    ) -> Result<Option<DocumentMetadata>, StorageError> {
        let documents = self.documents.lock().unwrap();
        Ok(documents.get(id).map(|doc| {
            let metadata = doc.history_metadata();
            DocumentMetadata {
                history: metadata.history.clone().unwrap_or_default(),
                extra: metadata_extra(metadata),
            }
        }))
    }

    fn store_document(
        &self,
        mut tx: Self::Tx,
        id: &DocId,
        document: &DocumentBody,
        metadata: &Metadata,
    ) -> Result<Self::Tx, StorageError> {
        tx.push((
            id.clone(),
            StoredDocument::Live {
                body: document.clone(),
                metadata: metadata.clone(),
            },
        ));
        Ok(tx)
    }

    fn delete_document(
        &self,
        mut tx: Self::Tx,
        id: &DocId,
        metadata: &Metadata,
    ) -> Result<Self::Tx, StorageError> {
        tx.push((
            id.clone(),
            StoredDocument::Deleted {
                metadata: metadata.clone(),
            },
        ));
        Ok(tx)
    }

    fn store_conflict(
        &self,
        mut tx: Self::Tx,
        id: &DocId,
        document: Option<&DocumentBody>,
        metadata: &Metadata,
    ) -> Result<Self::Tx, StorageError> {
        tx.push((
            id.clone(),
            StoredDocument::Conflict {
                body: document.cloned(),
                metadata: metadata.clone(),
            },
        ));
        Ok(tx)
    }
}
