use super::{CommitReceipt, DocumentBody, DocumentStore, PublishedDocument, WriteBatch};
use crate::error::PublishError;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-process document store
///
/// Used by `preview` runs and tests. Counts commits so callers can assert
/// how often the store was actually written.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, DocumentBody>>,
    commits: AtomicUsize,
}

impl MemoryStore {
    /// Empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful commits
    #[inline]
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Document `id`, if present
    #[must_use]
    pub fn document(&self, id: &str) -> Option<DocumentBody> {
        self.documents.read().get(id).cloned()
    }

    /// Number of stored documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// True if nothing has been stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, PublishError> {
        let now = Utc::now();
        let documents = batch.len();
        {
            let mut guard = self.documents.write();
            for write in batch.writes() {
                guard.insert(
                    write.id.clone(),
                    DocumentBody::new(batch.day_key(), write.schedule.clone(), Some(now)),
                );
            }
        }
        self.commits.fetch_add(1, Ordering::SeqCst);

        Ok(CommitReceipt {
            documents,
            commit_time: Some(now),
        })
    }

    async fn list_documents(&self) -> Result<Vec<PublishedDocument>, PublishError> {
        Ok(self
            .documents
            .read()
            .iter()
            .map(|(id, body)| PublishedDocument {
                id: id.clone(),
                body: body.clone(),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
