//! Commit fold, clean-up, and the `abort` extension.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::document::DocId;
use crate::error::{InflightError, Result, StorageError};
use crate::storage::StorageEngine;

use super::events::Event;
use super::staging::{ordered_ops, InflightState};
use super::transaction::{OperationKind, OperationRecord, Status, TxId};

/// Folds a transaction's staged ops into the storage transaction in
/// `DocId`-sorted order and commits it, running clean-up on success.
///
/// `publish` is invoked once per emitted event, in emission order, as each
/// op folds, not batched and returned at the end. Per spec.md section 4.4
/// step 3, `doc-added`/`doc-deleted` events precede commit confirmation and
/// are not rescinded if the subsequent commit fails; calling `publish`
/// inline during the fold is what makes that true regardless of how the
/// fold or the final `commit` turns out. `Committed` is only published
/// after a successful `commit`.
///
/// Storage calls happen with the state lock held, see the note in
/// `staging::apply`.
pub fn complete<E: StorageEngine>(
    state: &mut InflightState<E>,
    db: &E,
    txid: TxId,
    mut publish: impl FnMut(Event),
) -> Result<()> {
    let record = state
        .transactions
        .get_mut(&txid)
        .ok_or(InflightError::UnknownTransaction(txid))?;

    let mut storage_tx = record.tx.take().ok_or_else(|| InflightError::CommitFailed {
        txid,
        source: StorageError::Commit("transaction has no live storage handle".into()),
    })?;
    let ops = std::mem::take(&mut record.ops);

    let mut folded = 0usize;
    for op in ordered_ops(ops.clone()) {
        storage_tx = match fold_one(db, storage_tx, &op, &mut publish) {
            Ok(tx) => tx,
            Err(err) => {
                restore(state, txid, ops);
                return Err(InflightError::CommitFailed { txid, source: err });
            }
        };
        folded += 1;
    }

    if let Err(err) = db.commit(storage_tx) {
        warn!(%txid, error = %err, "storage commit failed, transaction left open");
        restore(state, txid, ops);
        return Err(InflightError::CommitFailed { txid, source: err });
    }

    cleanup(state, txid, ops.keys());
    info!(%txid, ops = folded, "transaction committed");
    publish(Event::Committed(txid));
    Ok(())
}

/// Discards a transaction's storage handle without folding any ops into
/// it, runs the same clean-up `complete` does, and reports `Aborted`.
pub fn abort<E: StorageEngine>(state: &mut InflightState<E>, txid: TxId) -> Result<Event> {
    let record = state
        .transactions
        .remove(&txid)
        .ok_or(InflightError::UnknownTransaction(txid))?;

    cleanup(state, txid, record.ops.keys());
    info!(%txid, "transaction aborted");
    Ok(Event::Aborted(txid))
}

fn fold_one<E: StorageEngine>(
    db: &E,
    tx: E::Tx,
    op: &OperationRecord,
    publish: &mut impl FnMut(Event),
) -> std::result::Result<E::Tx, StorageError> {
    match (op.status, op.request) {
        (Status::Skip, _) => Ok(tx),
        (Status::Write, OperationKind::Add) => {
            let body = op.document.as_ref().expect("add op carries a body");
            let tx = db.store_document(tx, &op.id, body, &op.metadata)?;
            publish(Event::DocAdded(op.id.clone()));
            Ok(tx)
        }
        (Status::Write, OperationKind::Delete) => {
            let tx = db.delete_document(tx, &op.id, &op.metadata)?;
            publish(Event::DocDeleted(op.id.clone()));
            Ok(tx)
        }
        (Status::Conflict, OperationKind::Add) => {
            let tx = db.store_conflict(tx, &op.id, op.document.as_ref(), &op.metadata)?;
            publish(Event::DocAdded(op.id.clone()));
            Ok(tx)
        }
        (Status::Conflict, OperationKind::Delete) => {
            let tx = db.store_conflict(tx, &op.id, None, &op.metadata)?;
            publish(Event::DocDeleted(op.id.clone()));
            Ok(tx)
        }
    }
}

/// Puts a transaction's ops back after a failed fold/commit, since the
/// storage handle itself cannot be recovered once consumed by value.
fn restore<E: StorageEngine>(state: &mut InflightState<E>, txid: TxId, ops: BTreeMap<DocId, OperationRecord>) {
    if let Some(record) = state.transactions.get_mut(&txid) {
        record.ops = ops;
    }
}

fn cleanup<'a, E: StorageEngine>(
    state: &mut InflightState<E>,
    txid: TxId,
    ids: impl Iterator<Item = &'a DocId>,
) {
    for id in ids {
        let mut drop_entry = false;
        if let Some(staging) = state.documents.get_mut(id) {
            staging.refs.remove(&txid);
            drop_entry = staging.refs.is_empty();
        }
        if drop_entry {
            state.documents.remove(id);
        }
    }
    state.transactions.remove(&txid);
}
