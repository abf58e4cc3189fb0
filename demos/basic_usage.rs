//! End-to-end walkthrough: open a client transaction, stage a write, commit
//! it, then show a replication peer racing against the result.
//!
//! Run with `cargo run --example basic_usage`.

use inflight::document::Metadata;
use inflight::inflight::{Handle, Source};
use inflight::storage::InMemoryEngine;
use serde_json::json;

fn main() {
    inflight::logging::init_tracing();

    let handle = Handle::create(InMemoryEngine::new(), "node-1");
    let mut events = handle.subscribe();

    let t1 = handle.open(Source::Client).expect("open t1");
    let status = handle
        .add_document(t1, "doc-1", json!({"title": "hello"}), Metadata::new())
        .expect("stage add");
    println!("t1 staged doc-1 as {status:?}");
    handle.complete(t1).expect("complete t1");

    while let Ok(event) = events.try_recv() {
        println!("event: {event:?}");
    }

    // A replication peer echoes back the same history it just received.
    // This should classify as `skip` and commit an empty storage
    // transaction.
    let r1 = handle.open(Source::Replication).expect("open r1");
    let status = handle
        .add_document(r1, "doc-1", json!({"title": "hello"}), Metadata::new())
        .expect("stage replication echo");
    println!("r1 staged doc-1 as {status:?}");
    handle.complete(r1).expect("complete r1");

    while let Ok(event) = events.try_recv() {
        println!("event: {event:?}");
    }

    let doc_id = inflight::DocId::from("doc-1");
    println!("is-registered(doc-1) = {}", handle.is_registered(&doc_id));
}
