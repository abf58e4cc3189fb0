//! The lifecycle event stream. `DocAdded`/`DocDeleted` are emitted during
//! the commit fold, before the underlying storage transaction is confirmed
//! committed; `Committed` follows once it is. `Aborted` is a fourth,
//! additive variant for the explicit abort path, since there is no partial
//! fold to report events for on that path.

use serde::{Deserialize, Serialize};

use crate::document::DocId;

use super::transaction::TxId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Event {
    DocAdded(DocId),
    DocDeleted(DocId),
    Committed(TxId),
    Aborted(TxId),
}
