//! End-to-end cycle behaviour against in-process stores

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use timetable_sync::{
    CycleOutcome, MemoryStore, Publisher, SyncError, SyncOrchestrator, SyncStage, DAY_KEY,
};
use timetable_test_utils::{
    headerless_rows, memory_orchestrator, rows_from, sample_rows, sample_rows_padded, FailingSource,
    FlakyStore, SlowSource, SlowStore, StaticSource,
};

#[tokio::test]
async fn first_cycle_writes_one_document_per_entity() {
    let (orchestrator, store) = memory_orchestrator(Arc::new(StaticSource::new(sample_rows())));

    let report = orchestrator.run_cycle().await;
    assert!(report.committed());
    assert_eq!(report.header_row, Some(1));
    assert_eq!(report.entities, 3);
    assert_eq!(store.commit_count(), 1);
    assert_eq!(store.len(), 3);

    let doc = store.document("10A").unwrap();
    let today = &doc.schedule[DAY_KEY];
    assert_eq!(today.get("9:00 AM"), Some("Math"));
    assert_eq!(today.get("10:00 AM"), None);
    assert_eq!(today.get("11:00 AM"), Some("Science"));
    assert!(doc.last_updated.is_some());
}

#[tokio::test]
async fn slash_in_identifier_becomes_hyphen() {
    let (orchestrator, store) = memory_orchestrator(Arc::new(StaticSource::new(sample_rows())));
    orchestrator.run_cycle().await;

    assert!(store.document("10-B").is_some());
    assert!(store.document("10/B").is_none());
}

#[tokio::test]
async fn identical_content_commits_once() {
    let source = Arc::new(StaticSource::new(sample_rows()));
    let (orchestrator, store) = memory_orchestrator(source.clone());

    orchestrator.run_cycle().await;
    let second = orchestrator.run_cycle().await;

    assert!(matches!(second.outcome, CycleOutcome::Unchanged { .. }));
    assert_eq!(source.fetch_count(), 2);
    assert_eq!(store.commit_count(), 1);
}

#[tokio::test]
async fn whitespace_only_edits_are_not_changes() {
    let source = Arc::new(StaticSource::new(sample_rows()));
    let (orchestrator, store) = memory_orchestrator(source.clone());

    orchestrator.run_cycle().await;
    source.set_rows(sample_rows_padded());
    let second = orchestrator.run_cycle().await;

    assert!(matches!(second.outcome, CycleOutcome::Unchanged { .. }));
    assert_eq!(store.commit_count(), 1);
}

#[tokio::test]
async fn edited_cell_is_published() {
    let source = Arc::new(StaticSource::new(sample_rows()));
    let (orchestrator, store) = memory_orchestrator(source.clone());
    orchestrator.run_cycle().await;
    let first = orchestrator.last_fingerprint().await;

    let mut rows = sample_rows();
    rows[2] = ["10A", "Chemistry", "", "Science"].into();
    source.set_rows(rows);
    let second = orchestrator.run_cycle().await;

    assert!(second.committed());
    assert_ne!(orchestrator.last_fingerprint().await, first);
    assert_eq!(store.commit_count(), 2);
    assert_eq!(
        store.document("10A").unwrap().schedule[DAY_KEY].get("9:00 AM"),
        Some("Chemistry")
    );
}

#[tokio::test]
async fn headerless_sheet_never_reaches_store() {
    let (orchestrator, store) = memory_orchestrator(Arc::new(StaticSource::new(headerless_rows())));

    let report = orchestrator.run_cycle().await;
    assert_eq!(report.header_row, None);
    assert_eq!(report.rows_fetched, 10);
    assert!(!report.is_failure());
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test]
async fn single_row_sheet_is_empty() {
    let (orchestrator, store) = memory_orchestrator(Arc::new(StaticSource::new(rows_from(&[&[
        "Class", "9:00",
    ]]))));

    let report = orchestrator.run_cycle().await;
    assert_eq!(report.entities, 0);
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test]
async fn emptied_sheet_is_a_change_without_store_call() {
    let source = Arc::new(StaticSource::new(sample_rows()));
    let (orchestrator, store) = memory_orchestrator(source.clone());
    orchestrator.run_cycle().await;

    source.set_rows(headerless_rows());
    let emptied = orchestrator.run_cycle().await;
    assert!(matches!(
        emptied.outcome,
        CycleOutcome::Published { documents: 0, committed: false, .. }
    ));
    assert_eq!(store.commit_count(), 1);
    // documents are never deleted
    assert_eq!(store.len(), 3);

    let again = orchestrator.run_cycle().await;
    assert!(matches!(again.outcome, CycleOutcome::Unchanged { .. }));
}

#[tokio::test]
async fn duplicate_identifiers_keep_last_row() {
    let rows = rows_from(&[
        &["Room", "P1", "P2"],
        &["Lab", "Physics", "Chemistry"],
        &["Lab", "Biology"],
    ]);
    let (orchestrator, store) = memory_orchestrator(Arc::new(StaticSource::new(rows)));

    let report = orchestrator.run_cycle().await;
    assert_eq!(report.stats.duplicate_entities, vec!["Lab".to_string()]);

    let lab = store.document("Lab").unwrap();
    assert_eq!(lab.schedule[DAY_KEY].get("P1"), Some("Biology"));
    assert_eq!(lab.schedule[DAY_KEY].get("P2"), None);
}

#[tokio::test]
async fn failed_commit_is_retried_next_cycle() {
    let store = Arc::new(FlakyStore::failing(1));
    let orchestrator = SyncOrchestrator::new(
        Arc::new(StaticSource::new(sample_rows())),
        Publisher::new(store.clone()),
    );

    let failed = orchestrator.run_cycle().await;
    match &failed.outcome {
        CycleOutcome::Failed { stage, error } => {
            assert_eq!(*stage, SyncStage::Publishing);
            assert!(error.is_transient());
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(store.inner.is_empty());

    let retried = orchestrator.run_cycle().await;
    assert!(retried.committed());
    assert_eq!(store.attempts(), 2);
    assert_eq!(store.inner.len(), 3);
}

#[tokio::test]
async fn fetch_failure_leaves_store_untouched() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = SyncOrchestrator::new(
        Arc::new(FailingSource { status: 500 }),
        Publisher::new(store.clone()),
    );

    let report = orchestrator.run_cycle().await;
    assert!(matches!(
        report.outcome,
        CycleOutcome::Failed { stage: SyncStage::Fetching, .. }
    ));
    assert_eq!(report.exit_code(true), 1);
    assert_eq!(report.exit_code(false), 0);
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out() {
    let source = SlowSource {
        delay: Duration::from_secs(60),
        rows: sample_rows(),
    };
    let (orchestrator, store) = memory_orchestrator(Arc::new(source));
    let orchestrator = Arc::try_unwrap(orchestrator)
        .unwrap()
        .with_timeouts(Duration::from_secs(5), Duration::from_secs(5));

    let report = orchestrator.run_cycle().await;
    assert!(matches!(
        report.outcome,
        CycleOutcome::Failed {
            stage: SyncStage::Fetching,
            error: SyncError::Timeout { secs: 5, .. }
        }
    ));
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn slow_commit_times_out_and_keeps_fingerprint() {
    let store = Arc::new(SlowStore {
        delay: Duration::from_secs(60),
        inner: MemoryStore::new(),
    });
    let orchestrator = SyncOrchestrator::new(
        Arc::new(StaticSource::new(sample_rows())),
        Publisher::new(store.clone()),
    )
    .with_timeouts(Duration::from_secs(5), Duration::from_secs(10));

    let report = orchestrator.run_cycle().await;
    assert!(matches!(
        report.outcome,
        CycleOutcome::Failed {
            stage: SyncStage::Publishing,
            error: SyncError::Timeout { secs: 10, .. }
        }
    ));
    assert!(orchestrator.last_fingerprint().await.is_none());
    assert_eq!(store.inner.commit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn overlapping_cycle_is_dropped() {
    let source = SlowSource {
        delay: Duration::from_secs(10),
        rows: sample_rows(),
    };
    let (orchestrator, store) = memory_orchestrator(Arc::new(source));

    let (first, second) = tokio::join!(orchestrator.run_cycle(), async {
        tokio::task::yield_now().await;
        orchestrator.run_cycle().await
    });

    assert!(first.committed());
    assert!(matches!(second.outcome, CycleOutcome::Busy));
    assert_eq!(store.commit_count(), 1);
}
