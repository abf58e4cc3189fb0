//! Property-based tests for the invariants listed in the specification's
//! testable-properties section (P1, P2, P4, P5, P6, P8). Concurrency
//! invariants that need real threads (none of P1-P8 strictly require
//! preemption to observe) are checked here against sequential call
//! interleavings, which is sufficient since every public operation commits
//! atomically under the single state lock.

mod common;

use inflight::document::Metadata;
use inflight::inflight::{Event, Source, Status};
use inflight::storage::StoredDocument;
use inflight::vclock::VClock;
use proptest::prelude::*;
use serde_json::json;

use common::{drain, test_handle, SERVER_ID};

fn arb_tag() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

fn arb_vclock(max_ticks: usize) -> impl Strategy<Value = VClock> {
    prop::collection::vec(arb_tag(), 0..max_ticks).prop_map(|tags| {
        tags.into_iter()
            .fold(VClock::new(), |clock, tag| clock.advance(&tag))
    })
}

fn stored_history(handle: &inflight::Handle<inflight::storage::InMemoryEngine>, id: &str) -> Option<VClock> {
    handle
        .storage()
        .get(&id.into())
        .and_then(|doc| match doc {
            StoredDocument::Live { metadata, .. } => metadata.history,
            StoredDocument::Deleted { metadata } => metadata.history,
            StoredDocument::Conflict { metadata, .. } => metadata.history,
        })
}

proptest! {
    /// P1: for a sequence of N opens on one handle, the returned TxIds are
    /// pairwise distinct and strictly positive.
    #[test]
    fn p1_monotonic_ids(n in 1usize..50) {
        let handle = test_handle();
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            ids.push(handle.open(Source::Client).unwrap());
        }
        for id in &ids {
            prop_assert!(id.get() > 0);
        }
        let mut sorted = ids.clone();
        sorted.sort_by_key(|id| id.get());
        sorted.dedup();
        prop_assert_eq!(sorted.len(), ids.len(), "ids must be pairwise distinct");
        for window in sorted.windows(2) {
            prop_assert!(window[0].get() < window[1].get());
        }
    }

    /// P2 / P3: with `n` open client transactions all staging the same
    /// document, completing any `k` of them leaves the document registered
    /// iff at least one transaction still references it.
    #[test]
    fn p2_ref_accounting_tracks_open_transactions(n in 1usize..6, complete_first in 0usize..6) {
        let handle = test_handle();
        let complete_first = complete_first.min(n);

        let mut txs = Vec::with_capacity(n);
        for i in 0..n {
            let txid = handle.open(Source::Client).unwrap();
            handle
                .add_document(txid, "shared", json!({"writer": i}), Metadata::new())
                .unwrap();
            txs.push(txid);
        }
        prop_assert!(handle.is_registered(&"shared".into()));

        for &txid in &txs[..complete_first] {
            handle.complete(txid).unwrap();
        }

        let still_open = complete_first < n;
        prop_assert_eq!(handle.is_registered(&"shared".into()), still_open);

        for &txid in &txs[complete_first..] {
            handle.complete(txid).unwrap();
        }
        prop_assert!(!handle.is_registered(&"shared".into()));
    }

    /// P4: a client add on a brand-new document advances the ensured
    /// history by exactly one tick under `server_id:txid`, regardless of
    /// what history the caller supplied.
    #[test]
    fn p4_client_history_advances_by_one_tick(supplied in arb_vclock(4)) {
        let handle = test_handle();
        let txid = handle.open(Source::Client).unwrap();
        let status = handle
            .add_document(txid, "doc", json!({}), Metadata::with_history(supplied.clone()))
            .unwrap();
        prop_assert_eq!(status, Status::Write);
        handle.complete(txid).unwrap();

        let expected = supplied.advance(&format!("{SERVER_ID}:{txid}"));
        let actual = stored_history(&handle, "doc").expect("history stamped");
        prop_assert_eq!(actual, expected);
    }

    /// P5: a replication add on a brand-new document stores the supplied
    /// history unchanged.
    #[test]
    fn p5_replication_history_unchanged_on_fresh_doc(supplied in arb_vclock(4)) {
        let handle = test_handle();
        let txid = handle.open(Source::Replication).unwrap();
        let status = handle
            .add_document(txid, "doc", json!({}), Metadata::with_history(supplied.clone()))
            .unwrap();
        prop_assert_eq!(status, Status::Write);
        handle.complete(txid).unwrap();

        let actual = stored_history(&handle, "doc").expect("history stamped");
        prop_assert_eq!(actual, supplied);
    }

    /// P6: the classification table holds for every combination of source
    /// and vector-clock relation, varying the node tags used to build the
    /// base history.
    #[test]
    fn p6_classification_table(base_tag in arb_tag(), other_tag in arb_tag()) {
        prop_assume!(base_tag != other_tag);

        for source in [Source::Client, Source::Replication] {
            // Establish a known persisted history by completing a client
            // add against a fresh doc id unique to this case.
            let setup = |doc: &str, history: Option<VClock>| -> (inflight::Handle<inflight::storage::InMemoryEngine>, VClock) {
                let handle = test_handle();
                let setup_tx = handle.open(Source::Client).unwrap();
                let metadata = match history {
                    Some(h) => Metadata::with_history(h),
                    None => Metadata::new(),
                };
                handle.add_document(setup_tx, doc, json!({}), metadata).unwrap();
                handle.complete(setup_tx).unwrap();
                let current = stored_history(&handle, doc).unwrap();
                (handle, current)
            };

            // same: supplied == current
            {
                let (handle, current) = setup("same", Some(VClock::new().advance(&base_tag)));
                let tx = handle.open(source).unwrap();
                let status = handle
                    .add_document(tx, "same", json!({}), Metadata::with_history(current))
                    .unwrap();
                let expected = match source {
                    Source::Client => Status::Write,
                    Source::Replication => Status::Skip,
                };
                prop_assert_eq!(status, expected, "source={:?} relation=same", source);
            }

            // supplied descends current (strictly ahead)
            {
                let (handle, current) = setup("ahead", Some(VClock::new().advance(&base_tag)));
                let ahead = current.advance(&other_tag);
                let tx = handle.open(source).unwrap();
                let status = handle
                    .add_document(tx, "ahead", json!({}), Metadata::with_history(ahead))
                    .unwrap();
                prop_assert_eq!(status, Status::Write, "source={:?} relation=descends", source);
            }

            // current descends supplied (peer is behind, supplied empty)
            {
                let (handle, _current) = setup("behind", Some(VClock::new().advance(&base_tag)));
                let tx = handle.open(source).unwrap();
                let status = handle
                    .add_document(tx, "behind", json!({}), Metadata::with_history(VClock::new()))
                    .unwrap();
                let expected = match source {
                    Source::Client => Status::Conflict,
                    Source::Replication => Status::Skip,
                };
                prop_assert_eq!(status, expected, "source={:?} relation=current-descends-supplied", source);
            }

            // concurrent / incomparable
            {
                let (handle, _current) = setup("concurrent", Some(VClock::new().advance(&base_tag)));
                let incomparable = VClock::new().advance(&other_tag);
                let tx = handle.open(source).unwrap();
                let status = handle
                    .add_document(tx, "concurrent", json!({}), Metadata::with_history(incomparable))
                    .unwrap();
                prop_assert_eq!(status, Status::Conflict, "source={:?} relation=concurrent", source);
            }
        }
    }

    /// P8: a replication op classified `skip` leaves the stored document
    /// byte-for-byte unchanged and emits no `doc-added`/`doc-deleted`
    /// event, only `committed`.
    #[test]
    fn p8_skip_is_a_no_op(extra in arb_tag()) {
        let handle = test_handle();

        let t0 = handle.open(Source::Client).unwrap();
        handle
            .add_document(t0, "doc", json!({"v": 1, "tag": extra}), Metadata::new())
            .unwrap();
        handle.complete(t0).unwrap();

        let before = handle.storage().get(&"doc".into()).unwrap();
        let current = stored_history(&handle, "doc").unwrap();

        let mut events = handle.subscribe();
        let r1 = handle.open(Source::Replication).unwrap();
        let status = handle
            .add_document(r1, "doc", json!({"v": 2}), Metadata::with_history(current))
            .unwrap();
        prop_assert_eq!(status, Status::Skip);
        handle.complete(r1).unwrap();

        let after = handle.storage().get(&"doc".into()).unwrap();
        prop_assert_eq!(before, after, "skip must not touch storage");
        prop_assert_eq!(drain(&mut events), vec![Event::Committed(r1)]);
    }
}
