//! Shared test harness: a ready-to-use [`Handle`] over an [`InMemoryEngine`]
//! plus small helpers for draining the event stream synchronously.

use inflight::inflight::{Event, Handle};
use inflight::storage::InMemoryEngine;
use tokio::sync::broadcast;

pub const SERVER_ID: &str = "test-node";

/// A fresh handle with empty state, ready for a test to open transactions
/// against.
pub fn test_handle() -> Handle<InMemoryEngine> {
    Handle::create(InMemoryEngine::new(), SERVER_ID)
}

/// Drains every event currently buffered on `rx` without blocking. Intended
/// for use right after a synchronous `complete`/`abort` call, since
/// `publish` posts events before the call returns.
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(_) => break,
        }
    }
    events
}
