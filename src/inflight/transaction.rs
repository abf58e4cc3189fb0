//! Transaction-scoped types: identifiers, the record staged per operation,
//! and the record staged per open transaction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{DocId, DocumentBody, Metadata};
use crate::storage::StorageEngine;

/// A process-local, monotonically increasing transaction identifier.
/// Never reused for the lifetime of a [`super::Handle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxId(pub(crate) u64);

impl TxId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin of a transaction. Client writes are classified strictly;
/// replication writes are classified tolerantly (see the dispatch table in
/// `staging`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Client,
    Replication,
}

/// Which operation an [`OperationRecord`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Add,
    Delete,
}

/// The outcome of classifying a staged operation's supplied history against
/// the document's last-known history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Write,
    Skip,
    Conflict,
}

/// A single staged operation, keyed by `DocId` within its transaction's
/// `ops` map. A second stage against the same id overwrites this record.
#[derive(Clone, Debug)]
pub struct OperationRecord {
    pub request: OperationKind,
    pub id: DocId,
    pub document: Option<DocumentBody>,
    pub metadata: Metadata,
    pub status: Status,
}

/// Everything tracked for one open transaction. `tx` is `Some` for the
/// lifetime of the transaction and taken (`Option::take`) only inside
/// `complete`/`abort`, since the storage handle is consumed by value as
/// operations fold into it.
pub struct TransactionRecord<E: StorageEngine> {
    pub tx: Option<E::Tx>,
    pub ops: std::collections::BTreeMap<DocId, OperationRecord>,
    pub source: Source,
}

impl<E: StorageEngine> TransactionRecord<E> {
    pub fn new(tx: E::Tx, source: Source) -> Self {
        TransactionRecord {
            tx: Some(tx),
            ops: std::collections::BTreeMap::new(),
            source,
        }
    }
}
