//! In-flight transaction manager for a document-oriented, multi-master
//! database with vector-clock causality.
//!
//! This crate is the staging layer between clients (or inbound replication
//! streams) and a durable storage engine. It multiplexes concurrent write
//! transactions over a single storage backend, classifies each staged
//! operation against the document's most recently staged causal history,
//! stamps new history onto client writes, and publishes an ordered event
//! stream to any number of subscribers.
//!
//! The entry point is [`inflight::Handle`]:
//!
//! ```
//! use inflight::document::Metadata;
//! use inflight::inflight::{Handle, Source};
//! use inflight::storage::InMemoryEngine;
//! use serde_json::json;
//!
//! let handle = Handle::create(InMemoryEngine::new(), "node-1");
//! let mut events = handle.subscribe();
//!
//! let txid = handle.open(Source::Client).unwrap();
//! handle
//!     .add_document(txid, "doc-1", json!({"title": "hello"}), Metadata::new())
//!     .unwrap();
//! handle.complete(txid).unwrap();
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod inflight;
pub mod logging;
pub mod storage;
pub mod vclock;

pub use document::{DocId, DocumentBody, DocumentMetadata, Metadata};
pub use error::{InflightError, Result, StorageError};
pub use inflight::{Event, Handle, OperationKind, Source, Status, TxId};
pub use vclock::VClock;
