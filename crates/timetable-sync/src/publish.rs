//! Publisher
//!
//! Turns a [`ScheduleSnapshot`] into one [`WriteBatch`] and commits it in a
//! single call. Document ids are the entity identifiers with `/` replaced,
//! since `/` separates path segments in the store's key space.

use crate::error::PublishError;
use crate::store::{DocumentStore, DocumentWrite, WriteBatch};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use timetable_grid::ScheduleSnapshot;

/// Logical day every schedule is nested under
pub const DAY_KEY: &str = "Today";

/// Document id for an entity identifier
#[must_use]
pub fn document_id(entity: &str) -> String {
    entity.replace('/', "-").trim().to_string()
}

/// What a publish did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReceipt {
    /// Documents written
    pub documents: usize,
    /// False when the snapshot was empty and nothing was sent
    pub committed: bool,
    /// Store-side commit time, when reported
    pub commit_time: Option<DateTime<Utc>>,
    /// Document ids shared by more than one entity
    pub collisions: Vec<String>,
}

/// Writes snapshots to a document store
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn DocumentStore>,
    day_key: String,
}

impl Publisher {
    /// Publisher writing to `store`
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            day_key: DAY_KEY.to_string(),
        }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Build the batch for `snapshot`
    ///
    /// Returns the batch and any document ids that more than one entity
    /// mapped to; for those the entity sorting last wins.
    #[must_use]
    pub fn build_batch(&self, snapshot: &ScheduleSnapshot) -> (WriteBatch, Vec<String>) {
        let mut by_id = BTreeMap::new();
        let mut collisions = Vec::new();

        for (entity, schedule) in snapshot.iter() {
            let id = document_id(entity);
            if by_id.insert(id.clone(), schedule.clone()).is_some() {
                collisions.push(id);
            }
        }

        let mut batch = WriteBatch::new(self.day_key.clone());
        for (id, schedule) in by_id {
            batch.push(DocumentWrite { id, schedule });
        }
        (batch, collisions)
    }

    /// Publish `snapshot` as one atomic commit
    ///
    /// An empty snapshot succeeds without contacting the store: documents
    /// are never deleted, so there is nothing to write.
    ///
    /// # Errors
    /// Returns [`PublishError`] if the commit fails; no document of the
    /// batch is written in that case.
    pub async fn publish(&self, snapshot: &ScheduleSnapshot) -> Result<PublishReceipt, PublishError> {
        let (batch, collisions) = self.build_batch(snapshot);
        for id in &collisions {
            tracing::warn!(document = %id, "several entities map to one document id, keeping the last");
        }

        if batch.is_empty() {
            tracing::info!(store = self.store.name(), "snapshot is empty, nothing to commit");
            return Ok(PublishReceipt {
                collisions,
                ..PublishReceipt::default()
            });
        }

        let receipt = self.store.commit(batch).await?;
        tracing::info!(
            store = self.store.name(),
            documents = receipt.documents,
            "batch committed"
        );

        Ok(PublishReceipt {
            documents: receipt.documents,
            committed: true,
            commit_time: receipt.commit_time,
            collisions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CommitReceipt, MockDocumentStore};
    use timetable_grid::EntitySchedule;

    fn snapshot(ids: &[&str]) -> ScheduleSnapshot {
        ids.iter()
            .map(|id| (*id, [("9:00", *id)].into_iter().collect::<EntitySchedule>()))
            .collect()
    }

    #[test]
    fn slash_becomes_hyphen() {
        assert_eq!(document_id("10/A"), "10-A");
        assert_eq!(document_id("Lab/2/B"), "Lab-2-B");
        assert_eq!(document_id(" 10 A "), "10 A");
    }

    #[test]
    fn batch_uses_sanitized_ids() {
        let publisher = Publisher::new(Arc::new(MockDocumentStore::new()));
        let (batch, collisions) = publisher.build_batch(&snapshot(&["10/A", "9B"]));

        assert!(collisions.is_empty());
        assert_eq!(batch.ids().collect::<Vec<_>>(), vec!["10-A", "9B"]);
        assert_eq!(batch.day_key(), DAY_KEY);
    }

    #[test]
    fn colliding_ids_keep_last_entity() {
        let publisher = Publisher::new(Arc::new(MockDocumentStore::new()));
        let (batch, collisions) = publisher.build_batch(&snapshot(&["10-A", "10/A"]));

        assert_eq!(collisions, vec!["10-A".to_string()]);
        assert_eq!(batch.len(), 1);
        // "10/A" sorts after "10-A"
        assert_eq!(batch.writes()[0].schedule.get("9:00"), Some("10/A"));
    }

    #[tokio::test]
    async fn one_commit_per_publish() {
        let mut store = MockDocumentStore::new();
        store.expect_name().return_const("mock");
        store
            .expect_commit()
            .times(1)
            .withf(|batch| batch.len() == 2)
            .returning(|batch| {
                Ok(CommitReceipt {
                    documents: batch.len(),
                    commit_time: None,
                })
            });

        let publisher = Publisher::new(Arc::new(store));
        let receipt = publisher.publish(&snapshot(&["10A", "10B"])).await.unwrap();
        assert!(receipt.committed);
        assert_eq!(receipt.documents, 2);
    }

    #[tokio::test]
    async fn empty_snapshot_skips_store() {
        let mut store = MockDocumentStore::new();
        store.expect_name().return_const("mock");
        store.expect_commit().never();

        let publisher = Publisher::new(Arc::new(store));
        let receipt = publisher.publish(&ScheduleSnapshot::new()).await.unwrap();
        assert!(!receipt.committed);
        assert_eq!(receipt.documents, 0);
    }

    #[tokio::test]
    async fn commit_failure_propagates() {
        let mut store = MockDocumentStore::new();
        store.expect_name().return_const("mock");
        store.expect_commit().returning(|_| {
            Err(PublishError::Rejected {
                status: 503,
                message: "unavailable".into(),
            })
        });

        let publisher = Publisher::new(Arc::new(store));
        let err = publisher.publish(&snapshot(&["10A"])).await.unwrap_err();
        assert!(matches!(err, PublishError::Rejected { status: 503, .. }));
    }
}
