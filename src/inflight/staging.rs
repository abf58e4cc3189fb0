//! The write-request pipeline: `ensure history` → `classify` → `update
//! metadata` → `update log`, all applied as one step under the state lock.
//! This is the "hard part" the manager exists for, everything else is
//! plumbing around this classifier.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::document::{DocId, DocumentBody, Metadata};
use crate::error::{InflightError, Result};
use crate::storage::StorageEngine;
use crate::vclock::VClock;

use super::transaction::{OperationKind, OperationRecord, Source, Status, TransactionRecord, TxId};

/// Per-document state tracked while at least one open transaction
/// references it. `current_history` is set once, when the record is
/// created by the first op ever staged against this `DocId`. Later ops,
/// even ones classified `write`, leave it untouched (see `apply` below);
/// this follows the classification table's "first op in any transaction to
/// touch id" condition literally.
pub struct DocumentStaging {
    pub current_history: VClock,
    pub refs: HashSet<TxId>,
}

/// The two mappings the spec calls the inflight state, updated atomically
/// together under `Handle`'s single lock.
pub struct InflightState<E: StorageEngine> {
    next_tx_id: u64,
    pub transactions: HashMap<TxId, TransactionRecord<E>>,
    pub documents: HashMap<DocId, DocumentStaging>,
}

impl<E: StorageEngine> InflightState<E> {
    pub fn new() -> Self {
        InflightState {
            next_tx_id: 1,
            transactions: HashMap::new(),
            documents: HashMap::new(),
        }
    }

    pub fn allocate_txid(&mut self) -> TxId {
        let id = TxId(self.next_tx_id);
        self.next_tx_id += 1;
        id
    }

    pub fn is_registered(&self, id: &DocId) -> bool {
        self.documents.contains_key(id)
    }

    pub fn is_txid(&self, txid: TxId) -> bool {
        self.transactions.contains_key(&txid)
    }
}

/// `same?`/`descends?` dispatch from the classification table in §4.3(b).
fn classify(source: Source, current: Option<&VClock>, supplied: &VClock) -> Status {
    match (source, current) {
        (Source::Client, None) => Status::Write,
        (Source::Client, Some(current)) => {
            if supplied.is_same(current) || supplied.descends(current) {
                Status::Write
            } else {
                Status::Conflict
            }
        }
        (Source::Replication, None) => Status::Write,
        (Source::Replication, Some(current)) => {
            if supplied.is_same(current) {
                Status::Skip
            } else if supplied.descends(current) {
                Status::Write
            } else if current.descends(supplied) {
                Status::Skip
            } else {
                Status::Conflict
            }
        }
    }
}

/// Runs the full write-request pipeline for one `add-document` /
/// `delete-document` call, mutating `state` in place. Caller holds the
/// state lock for the duration; `db` calls here only ever touch
/// process-local or local-`sled` state (see `DESIGN.md`), so doing them
/// under the lock keeps the pipeline trivially atomic instead of needing a
/// CAS-style retry.
#[allow(clippy::too_many_arguments)]
pub fn apply<E: StorageEngine>(
    state: &mut InflightState<E>,
    db: &E,
    server_id: &str,
    txid: TxId,
    request: OperationKind,
    id: DocId,
    document: Option<DocumentBody>,
    mut metadata: Metadata,
) -> Result<Status> {
    let source = state
        .transactions
        .get(&txid)
        .ok_or(InflightError::UnknownTransaction(txid))?
        .source;

    let persisted = db.load_document_metadata(&id)?;

    // (a) ensure history
    let ensured = metadata.history.clone().unwrap_or_else(|| {
        state
            .transactions
            .get(&txid)
            .and_then(|tx| tx.ops.get(&id))
            .and_then(|op| op.metadata.history.clone())
            .or_else(|| persisted.as_ref().map(|p| p.history.clone()))
            .unwrap_or_default()
    });

    // (b) classify against existing
    let current_history = state
        .documents
        .get(&id)
        .map(|staging| staging.current_history.clone())
        .or_else(|| persisted.as_ref().map(|p| p.history.clone()));

    let status = classify(source, current_history.as_ref(), &ensured);

    // (c) update written metadata
    metadata.history = Some(match source {
        Source::Client => ensured.advance(&format!("{server_id}:{txid}")),
        Source::Replication => ensured.clone(),
    });
    metadata.synctag = Some(db.next_synctag()?);

    debug!(
        %txid, %id, ?source, ?status,
        "staged operation"
    );

    // (d) update log
    let first_touch = !state.documents.contains_key(&id);
    let staging = state.documents.entry(id.clone()).or_insert_with(|| DocumentStaging {
        current_history: current_history.clone().unwrap_or_default(),
        refs: HashSet::new(),
    });
    if first_touch && status == Status::Write {
        staging.current_history = metadata.history.clone().expect("set in step (c)");
    }
    staging.refs.insert(txid);

    let op = OperationRecord {
        request,
        id: id.clone(),
        document,
        metadata,
        status,
    };

    state
        .transactions
        .get_mut(&txid)
        .ok_or(InflightError::UnknownTransaction(txid))?
        .ops
        .insert(id, op);

    Ok(status)
}

/// Build the fold order for `complete`: ascending `DocId`, per the
/// DocId-sorted resolution of the unspecified fold-order question.
pub fn ordered_ops(ops: BTreeMap<DocId, OperationRecord>) -> Vec<OperationRecord> {
    ops.into_values().collect()
}
