//! End-to-end reconciliation against the in-memory store.

use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use postmirror_core::{Document, DocumentSource, MarkdownDirectory, Scope, SourceError};
use postmirror_engine::{Outcome, Phase, Reconciler, TaskAggregator};
use postmirror_remote::{MemoryDirectory, StoreEvent};
use tempfile::TempDir;

fn scope() -> Scope {
    Scope::new("octo", "blog")
}

fn aggregator(limit: usize) -> TaskAggregator {
    TaskAggregator::new(NonZeroUsize::new(limit).expect("non-zero"))
}

fn posts(docs: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    for (title, body) in docs {
        fs::write(dir.path().join(format!("{title}.md")), body).expect("write post");
    }
    dir
}

fn reconciler(store: &Arc<MemoryDirectory>, dir: &TempDir, limit: usize) -> Reconciler {
    Reconciler::new(
        store.clone(),
        Arc::new(MarkdownDirectory::new(dir.path(), "md")),
        aggregator(limit),
    )
}

fn contents(store: &MemoryDirectory) -> BTreeMap<String, String> {
    store
        .records(&scope())
        .into_iter()
        .map(|r| (r.title, r.body))
        .collect()
}

/// A source that always fails, for the document-listing failure path.
struct BrokenSource;

impl DocumentSource for BrokenSource {
    fn list(&self) -> Result<Vec<Document>, SourceError> {
        Err(SourceError::Read {
            path: "content/posts/broken.md".into(),
            source: std::io::Error::other("disk on fire"),
        })
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn full_run_replaces_every_record() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    let old_ids = store.seed(&scope(), [("old-a", "x"), ("old-b", "y"), ("old-c", "z")]);
    let dir = posts(&[("one", "first"), ("two", "second"), ("three", "third"), ("four", "4")]);

    let outcome = reconciler(&store, &dir, 4).run(&scope()).await;

    let summary = outcome.into_result().expect("completed");
    assert_eq!(summary.deleted, 3);
    assert_eq!(summary.created.len(), 4);

    let remote = contents(&store);
    let expected: BTreeMap<String, String> = [
        ("one", "first"),
        ("two", "second"),
        ("three", "third"),
        ("four", "4"),
    ]
    .into_iter()
    .map(|(t, b)| (t.to_owned(), b.to_owned()))
    .collect();
    assert_eq!(remote, expected);

    let remaining_ids: Vec<_> = store.records(&scope()).into_iter().map(|r| r.id).collect();
    assert!(old_ids.iter().all(|id| !remaining_ids.contains(id)));
}

#[tokio::test(flavor = "multi_thread")]
async fn nothing_to_do_completes() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    let dir = posts(&[]);

    let summary = reconciler(&store, &dir, 2)
        .run(&scope())
        .await
        .into_result()
        .expect("completed");

    assert_eq!(summary.deleted, 0);
    assert!(summary.created.is_empty());
    assert!(store.journal().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn every_delete_finishes_before_any_create_starts() {
    let store = Arc::new(MemoryDirectory::new("octo").with_latency(Duration::from_millis(5)));
    let seeded: Vec<(String, String)> = (0..12).map(|i| (format!("old-{i}"), String::new())).collect();
    store.seed(&scope(), seeded.iter().map(|(t, b)| (t.as_str(), b.as_str())));
    let dir = posts(&[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4"), ("e", "5"), ("f", "6")]);

    let outcome = reconciler(&store, &dir, 4).run(&scope()).await;
    assert!(outcome.is_completed(), "got: {outcome:?}");

    let journal = store.journal();
    let last_delete = journal.iter().rposition(StoreEvent::is_delete).expect("deletes");
    let first_create = journal.iter().position(StoreEvent::is_create).expect("creates");
    assert!(
        last_delete < first_create,
        "create started at {first_create} before delete ended at {last_delete}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_failures_stop_the_run_before_creation() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    let ids = store.seed(&scope(), [("a", ""), ("b", ""), ("c", ""), ("d", ""), ("e", "")]);
    store.fail_delete_of(&ids[1]);
    store.fail_delete_of(&ids[3]);
    let dir = posts(&[("new", "body")]);

    let outcome = reconciler(&store, &dir, 3).run(&scope()).await;

    let Outcome::Failed(err) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(err.phase, Phase::Deleting);
    assert_eq!(err.failures.len(), 2, "one slot per failing task");
    assert_eq!(err.succeeded, 3);

    let mut failed: Vec<_> = err.failures.iter().map(|f| f.task.clone()).collect();
    failed.sort();
    let mut expected = vec![ids[1].to_string(), ids[3].to_string()];
    expected.sort();
    assert_eq!(failed, expected);

    assert!(!store.journal().iter().any(StoreEvent::is_create));
    // Successful deletes are not rolled back.
    assert_eq!(store.records(&scope()).len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn listing_failure_attempts_no_mutation() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    store.seed(&scope(), [("a", "")]);
    store.fail_listing();
    let dir = posts(&[("new", "body")]);

    let outcome = reconciler(&store, &dir, 2).run(&scope()).await;

    let err = outcome.into_result().unwrap_err();
    assert_eq!(err.phase, Phase::ListingRecords);
    assert_eq!(err.failures.len(), 1);
    assert!(store.journal().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn document_listing_failure_comes_after_deletes() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    store.seed(&scope(), [("a", ""), ("b", "")]);
    let reconciler = Reconciler::new(store.clone(), Arc::new(BrokenSource), aggregator(2));

    let err = reconciler.run(&scope()).await.into_result().unwrap_err();

    assert_eq!(err.phase, Phase::ListingDocuments);
    assert!(err.failures[0].message.contains("disk on fire"));
    assert!(store.records(&scope()).is_empty(), "deletes already happened");
    assert!(!store.journal().iter().any(StoreEvent::is_create));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreadable_document_fails_before_any_create() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    let dir = posts(&[("fine", "ok")]);
    fs::write(dir.path().join("bad.md"), [0xff, 0xfe, 0xfd]).expect("write bad post");

    let err = reconciler(&store, &dir, 2)
        .run(&scope())
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(err.phase, Phase::ListingDocuments);
    assert!(store.records(&scope()).is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn create_failures_are_aggregated() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    store.fail_create_of("two");
    store.fail_create_of("four");
    let dir = posts(&[("one", "1"), ("two", "2"), ("three", "3"), ("four", "4")]);

    let err = reconciler(&store, &dir, 4)
        .run(&scope())
        .await
        .into_result()
        .unwrap_err();

    assert_eq!(err.phase, Phase::Creating);
    assert_eq!(err.failures.len(), 2);
    assert_eq!(err.succeeded, 2);
    let remote = contents(&store);
    assert_eq!(remote.keys().collect::<Vec<_>>(), vec!["one", "three"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn records_added_while_listing_do_not_break_the_run() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    store.seed(&scope(), [("a", ""), ("b", ""), ("c", "")]);
    store.set_listing_drift(2);
    let dir = posts(&[("new", "body")]);

    let summary = reconciler(&store, &dir, 2)
        .run(&scope())
        .await
        .into_result()
        .expect("completed");

    assert_eq!(summary.deleted, 3);
    // The two records that appeared after the count survive this run.
    assert_eq!(store.records(&scope()).len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn records_removed_while_listing_do_not_break_the_run() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    store.seed(&scope(), [("a", ""), ("b", ""), ("c", "")]);
    store.set_listing_drift(-2);
    let dir = posts(&[("new", "body")]);

    let summary = reconciler(&store, &dir, 2)
        .run(&scope())
        .await
        .into_result()
        .expect("completed");

    assert_eq!(summary.deleted, 1);
    assert_eq!(contents(&store).keys().collect::<Vec<_>>(), vec!["new"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn in_flight_operations_stay_within_the_limit() {
    let store = Arc::new(MemoryDirectory::new("octo").with_latency(Duration::from_millis(15)));
    let seeded: Vec<String> = (0..10).map(|i| format!("old-{i}")).collect();
    store.seed(&scope(), seeded.iter().map(|t| (t.as_str(), "")));
    let dir = posts(&[("a", ""), ("b", ""), ("c", ""), ("d", ""), ("e", "")]);

    let outcome = reconciler(&store, &dir, 2).run(&scope()).await;

    assert!(outcome.is_completed());
    assert!(store.peak_in_flight() <= 2, "peak was {}", store.peak_in_flight());
}

#[tokio::test(flavor = "multi_thread")]
async fn other_scopes_are_untouched() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    let other = Scope::new("octo", "notes");
    store.seed(&other, [("keep", "me")]);
    store.seed(&scope(), [("drop", "me")]);
    let dir = posts(&[("new", "body")]);

    reconciler(&store, &dir, 2)
        .run(&scope())
        .await
        .into_result()
        .expect("completed");

    assert_eq!(store.records(&other).len(), 1);
    assert_eq!(store.records(&other)[0].title, "keep");
}

#[tokio::test(flavor = "multi_thread")]
async fn plan_lists_both_sides_without_mutating() {
    let store = Arc::new(MemoryDirectory::new("octo"));
    store.seed(&scope(), [("a", ""), ("b", "")]);
    let dir = posts(&[("x", "1"), ("y", "2"), ("z", "3")]);

    let job = reconciler(&store, &dir, 2).plan(&scope()).await.expect("plan");

    assert_eq!(job.stale.len(), 2);
    assert_eq!(job.documents.len(), 3);
    assert!(store.journal().is_empty());
    assert_eq!(store.records(&scope()).len(), 2);
}
