//! Testing utilities for the timetable workspace
//!
//! Sheet fixtures, scripted sources and stores with injectable failures
//! and delays.

#![allow(missing_docs)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use timetable_grid::RawRow;
use timetable_sync::{
    CommitReceipt, DocumentStore, FetchError, MemoryStore, PublishError, PublishedDocument, Publisher,
    SheetSource, SyncOrchestrator, WriteBatch,
};

/// Build rows from string slices
pub fn rows_from(rows: &[&[&str]]) -> Vec<RawRow> {
    rows.iter()
        .map(|row| row.iter().copied().collect::<RawRow>())
        .collect()
}

/// A sheet with a title row above the header and three classes
pub fn sample_rows() -> Vec<RawRow> {
    rows_from(&[
        &["Weekly timetable", "", "", ""],
        &["Class", "9:00 AM", "10:00 AM", "11:00 AM"],
        &["10A", "Math", "", "Science"],
        &["10/B", "English", "History", "Art"],
        &["9C", "PE", "Math"],
    ])
}

/// [`sample_rows`] with padding and blank cells changed, content unchanged
pub fn sample_rows_padded() -> Vec<RawRow> {
    rows_from(&[
        &["Weekly timetable"],
        &[" Class ", " 9:00 AM", "10:00 AM ", "11:00 AM"],
        &[" 10A", "Math  ", "   ", " Science"],
        &["10/B ", " English", "History", "Art "],
        &["9C", "PE", " Math", ""],
    ])
}

/// Ten rows, none of which looks like a header
pub fn headerless_rows() -> Vec<RawRow> {
    (0..10)
        .map(|i| RawRow::from(vec![format!("Week {i}"), "notes".to_string()]))
        .collect()
}

/// Source serving rows that tests can swap between cycles
#[derive(Debug, Default)]
pub struct StaticSource {
    rows: Mutex<Vec<RawRow>>,
    fetches: AtomicUsize,
}

impl StaticSource {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_rows(&self, rows: Vec<RawRow>) {
        *self.rows.lock() = rows;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SheetSource for StaticSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().clone())
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// Source that always answers with an HTTP error status
#[derive(Debug, Clone, Copy)]
pub struct FailingSource {
    pub status: u16,
}

#[async_trait::async_trait]
impl SheetSource for FailingSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, FetchError> {
        Err(FetchError::Status {
            url: self.describe(),
            status: self.status,
        })
    }

    fn describe(&self) -> String {
        "https://sheets.invalid/export.csv".to_string()
    }
}

/// Source that sleeps before serving rows
#[derive(Debug)]
pub struct SlowSource {
    pub delay: Duration,
    pub rows: Vec<RawRow>,
}

#[async_trait::async_trait]
impl SheetSource for SlowSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, FetchError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.rows.clone())
    }

    fn describe(&self) -> String {
        format!("slow({}ms)", self.delay.as_millis())
    }
}

/// Store that rejects the first `failures` commits, then delegates
#[derive(Debug, Default)]
pub struct FlakyStore {
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
    pub inner: MemoryStore,
}

impl FlakyStore {
    pub fn failing(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
            inner: MemoryStore::new(),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentStore for FlakyStore {
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, PublishError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PublishError::Rejected {
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }
        self.inner.commit(batch).await
    }

    async fn list_documents(&self) -> Result<Vec<PublishedDocument>, PublishError> {
        self.inner.list_documents().await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Store that sleeps before every commit
#[derive(Debug, Default)]
pub struct SlowStore {
    pub delay: Duration,
    pub inner: MemoryStore,
}

#[async_trait::async_trait]
impl DocumentStore for SlowStore {
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, PublishError> {
        tokio::time::sleep(self.delay).await;
        self.inner.commit(batch).await
    }

    async fn list_documents(&self) -> Result<Vec<PublishedDocument>, PublishError> {
        self.inner.list_documents().await
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Orchestrator over `source` writing to a fresh [`MemoryStore`]
pub fn memory_orchestrator(source: Arc<dyn SheetSource>) -> (Arc<SyncOrchestrator>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = SyncOrchestrator::new(source, Publisher::new(store.clone()));
    (Arc::new(orchestrator), store)
}
