//! Document identifiers, payload bodies, and the metadata map that rides
//! along with every staged operation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::vclock::VClock;

/// Opaque document identifier. A thin `String` newtype so the manager's
/// maps are keyed on something with a clear causal-history/commit identity
/// rather than a bare `String` that could be confused with any other text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(String);

impl DocId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocId {
    fn from(value: &str) -> Self {
        DocId(value.to_string())
    }
}

impl From<String> for DocId {
    fn from(value: String) -> Self {
        DocId(value)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The payload body of a document. Left as an opaque JSON value, since the
/// in-flight manager never inspects document contents, it only ferries them
/// to the storage engine.
pub type DocumentBody = Value;

/// The metadata map attached to an operation: the two recognized entries
/// (`history`, `synctag`) plus whatever arbitrary user metadata the caller
/// passed through. `history` starts `None` when the caller hasn't supplied
/// one yet; the staging pipeline's "ensure history" step fills it in before
/// classification ever runs, so by the time an `OperationRecord` is folded
/// into storage it is always `Some`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<VClock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synctag: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: VClock) -> Self {
        Metadata {
            history: Some(history),
            ..Default::default()
        }
    }
}

/// What the storage engine reports back about a document that already
/// exists on disk: just enough for the classifier to determine last-known
/// history. `extra` carries whatever else the document layer persists,
/// passed through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub history: VClock,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
