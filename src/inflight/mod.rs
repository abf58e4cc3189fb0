//! The in-flight transaction manager: the staging layer between
//! clients/replication streams and a durable [`crate::storage::StorageEngine`].
//!
//! [`Handle`] is the single entry point. It owns the monotonic transaction
//! counter, the staging map, and the event broadcast channel, all driven by
//! caller threads. There are no background tasks of its own.

mod commit;
mod events;
mod staging;
mod transaction;

pub use events::Event;
pub use staging::{DocumentStaging, InflightState};
pub use transaction::{OperationKind, OperationRecord, Source, Status, TransactionRecord, TxId};

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;

use crate::document::{DocId, DocumentBody, Metadata};
use crate::error::Result;
use crate::storage::StorageEngine;

const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The outer container described in the data model: `server_id`, a
/// reference to the storage engine, the inflight state behind a single
/// lock, and the event fan-out.
pub struct Handle<E: StorageEngine> {
    server_id: String,
    db: Arc<E>,
    state: Mutex<InflightState<E>>,
    events: broadcast::Sender<Event>,
}

impl<E: StorageEngine> Handle<E> {
    /// Returns a fresh handle with empty state. The event channel is
    /// immediately live and may be subscribed to before any transaction
    /// opens.
    pub fn create(db: E, server_id: impl Into<String>) -> Self {
        Self::create_with_capacity(db, server_id, DEFAULT_EVENT_CHANNEL_CAPACITY)
    }

    pub fn create_with_capacity(db: E, server_id: impl Into<String>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Handle {
            server_id: server_id.into(),
            db: Arc::new(db),
            state: Mutex::new(InflightState::new()),
            events,
        }
    }

    /// Allocates a fresh `TxId`, begins a storage transaction, and installs
    /// an empty transaction record under it, as one atomic step.
    pub fn open(&self, source: Source) -> Result<TxId> {
        let tx = self.db.begin()?;
        let mut state = self.state.lock().unwrap();
        let txid = state.allocate_txid();
        state
            .transactions
            .insert(txid, TransactionRecord::new(tx, source));
        debug!(%txid, ?source, "opened transaction");
        Ok(txid)
    }

    pub fn add_document(
        &self,
        txid: TxId,
        id: impl Into<DocId>,
        document: DocumentBody,
        metadata: Metadata,
    ) -> Result<Status> {
        let mut state = self.state.lock().unwrap();
        staging::apply(
            &mut state,
            &self.db,
            &self.server_id,
            txid,
            OperationKind::Add,
            id.into(),
            Some(document),
            metadata,
        )
    }

    pub fn delete_document(
        &self,
        txid: TxId,
        id: impl Into<DocId>,
        metadata: Metadata,
    ) -> Result<Status> {
        let mut state = self.state.lock().unwrap();
        staging::apply(
            &mut state,
            &self.db,
            &self.server_id,
            txid,
            OperationKind::Delete,
            id.into(),
            None,
            metadata,
        )
    }

    /// Folds the transaction's staged ops into storage, commits, and cleans
    /// up. Each `doc-added`/`doc-deleted` event is published as its op
    /// folds, before the storage commit is even attempted, so a failed
    /// commit does not leave subscribers without them (see `commit::complete`).
    /// `committed` is published last, only once the commit succeeds.
    pub fn complete(&self, txid: TxId) -> Result<()> {
        let sender = self.events.clone();
        let mut state = self.state.lock().unwrap();
        commit::complete(&mut state, &self.db, txid, move |event| {
            let _ = sender.send(event);
        })
    }

    /// Discards the transaction's staged ops and storage handle without
    /// committing anything, and publishes `Event::Aborted`.
    pub fn abort(&self, txid: TxId) -> Result<()> {
        let event = {
            let mut state = self.state.lock().unwrap();
            commit::abort(&mut state, txid)?
        };
        self.publish(vec![event]);
        Ok(())
    }

    pub fn is_registered(&self, id: &DocId) -> bool {
        self.state.lock().unwrap().is_registered(id)
    }

    /// Direct access to the underlying storage engine, for callers (and
    /// tests) that need to read back what was actually committed rather
    /// than going through the in-flight staging layer.
    pub fn storage(&self) -> &E {
        &self.db
    }

    pub fn is_txid(&self, txid: TxId) -> bool {
        self.state.lock().unwrap().is_txid(txid)
    }

    /// Attaches a new subscriber; it receives every event emitted from this
    /// call forward.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    fn publish(&self, events: Vec<Event>) {
        for event in events {
            // A send error only means there are currently no subscribers;
            // the manager has nothing useful to do with that information.
            let _ = self.events.send(event);
        }
    }
}

impl<E: StorageEngine> std::fmt::Debug for Handle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("server_id", &self.server_id)
            .finish_non_exhaustive()
    }
}
