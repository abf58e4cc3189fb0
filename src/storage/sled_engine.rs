//! A `sled`-backed `StorageEngine`, using a tree-per-concern layout: one
//! tree for live documents, one for conflict records, and a db-wide counter
//! tree for synctag allocation. This engine does not itself provide crash
//! recovery or replay, durability here means only "survives a process
//! restart," which is as far as the manager's own non-goals (spec'd as out
//! of scope) require.

use std::path::Path;

use serde_json;
use sled::{Config, Db, Mode, Tree};

use crate::document::{DocId, DocumentBody, DocumentMetadata, Metadata};
use crate::error::StorageError;

use super::{metadata_extra, StorageEngine, StoredDocument};

const SYNCTAG_KEY: &[u8] = b"synctag";

/// A pending write, buffered until `commit` flushes it to the right tree.
enum PendingWrite {
    Document(DocId, StoredDocument),
    Conflict(DocId, StoredDocument),
}

pub struct SledEngine {
    #[allow(dead_code)]
    db: Db,
    documents: Tree,
    conflicts: Tree,
    counters: Tree,
}

impl SledEngine {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let config = Config::new()
            .path(path)
            .flush_every_ms(Some(100))
            .cache_capacity(64 * 1024 * 1024)
            .mode(Mode::HighThroughput);

        let db = config.open()?;
        let documents = db.open_tree("documents")?;
        let conflicts = db.open_tree("conflicts")?;
        let counters = db.open_tree("counters")?;

        Ok(Self {
            db,
            documents,
            conflicts,
            counters,
        })
    }

    fn read(tree: &Tree, id: &DocId) -> Result<Option<StoredDocument>, StorageError> {
        match tree.get(id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(tree: &Tree, id: &DocId, doc: &StoredDocument) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(doc)?;
        tree.insert(id.as_str().as_bytes(), bytes)?;
        Ok(())
    }
}

impl StorageEngine for SledEngine {
    type Tx = Vec<PendingWrite>;

    fn begin(&self) -> Result<Self::Tx, StorageError> {
        Ok(Vec::new())
    }

    fn next_synctag(&self) -> Result<u64, StorageError> {
        fn decode(bytes: &[u8]) -> u64 {
            u64::from_be_bytes(bytes.try_into().unwrap_or([0; 8]))
        }

        let previous = self.counters.fetch_and_update(SYNCTAG_KEY, |old| {
            let current = old.map(decode).unwrap_or(0);
            Some((current + 1).to_be_bytes().to_vec())
        })?;
        Ok(previous.map(|bytes| decode(&bytes)).unwrap_or(0) + 1)
    }

    fn commit(&self, tx: Self::Tx) -> Result<(), StorageError> {
        for write in tx {
            match write {
                PendingWrite::Document(id, doc) => {
                    Self::write(&self.documents, &id, &doc)?;
                    self.conflicts.remove(id.as_str().as_bytes())?;
                }
                PendingWrite::Conflict(id, doc) => {
                    Self::write(&self.conflicts, &id, &doc)?;
                }
            }
        }
        self.documents.flush()?;
        self.conflicts.flush()?;
        self.counters.flush()?;
        Ok(())
    }

    fn load_document_metadata(
        &self,
        id: &DocId,
    ) -> Result<Option<DocumentMetadata>, StorageError> {
        let stored = match Self::read(&self.documents, id)? {
            Some(doc) => Some(doc),
            None => Self::read(&self.conflicts, id)?,
        };
        Ok(stored.map(|doc| {
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
        tx.push(PendingWrite::Document(
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
        tx.push(PendingWrite::Document(
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
        tx.push(PendingWrite::Conflict(
            id.clone(),
            StoredDocument::Conflict {
                body: document.cloned(),
                metadata: metadata.clone(),
            },
        ));
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_temp() -> (SledEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let engine = SledEngine::open(dir.path()).unwrap();
        (engine, dir)
    }

    #[test]
    fn commit_persists_a_live_document() {
        let (engine, _dir) = open_temp();
        let id = DocId::from("doc-1");
        let tx = engine.begin().unwrap();
        let tx = engine
            .store_document(tx, &id, &json!({"v": 1}), &Metadata::new())
            .unwrap();
        engine.commit(tx).unwrap();

        let loaded = engine.load_document_metadata(&id).unwrap();
        assert!(loaded.is_some());
    }

    #[test]
    fn synctags_are_monotonic_across_calls() {
        let (engine, _dir) = open_temp();
        let a = engine.next_synctag().unwrap();
        let b = engine.next_synctag().unwrap();
        let c = engine.next_synctag().unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn conflict_record_is_readable_back() {
        let (engine, _dir) = open_temp();
        let id = DocId::from("doc-2");
        let tx = engine.begin().unwrap();
        let tx = engine
            .store_conflict(tx, &id, Some(&json!({"v": 1})), &Metadata::new())
            .unwrap();
        engine.commit(tx).unwrap();

        let loaded = engine.load_document_metadata(&id).unwrap();
        assert!(loaded.is_some());
    }
}
