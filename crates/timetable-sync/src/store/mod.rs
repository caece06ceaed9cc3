//! Document store abstraction
//!
//! The store is a remote key-value sink with one write primitive: an atomic
//! multi-document commit. Every document is written whole; nothing is ever
//! field-merged or deleted from here.
//!
//! Adapters:
//! - [`FirestoreStore`]: Firestore REST `documents:commit`
//! - [`JsonFileStore`]: single JSON file on disk
//! - [`MemoryStore`]: in-process map

mod file;
mod firestore;
mod memory;

pub use file::JsonFileStore;
pub use firestore::{FirestoreConfig, FirestoreStore, DEFAULT_FIRESTORE_BASE_URL};
pub use memory::MemoryStore;

use crate::error::PublishError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use timetable_grid::EntitySchedule;

/// Full overwrite of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentWrite {
    /// Sanitized document id
    pub id: String,
    /// Schedule stored under the day key
    pub schedule: EntitySchedule,
}

/// Writes committed together or not at all
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    day_key: String,
    writes: Vec<DocumentWrite>,
}

impl WriteBatch {
    /// Empty batch nesting schedules under `day_key`
    #[inline]
    #[must_use]
    pub fn new(day_key: impl Into<String>) -> Self {
        Self {
            day_key: day_key.into(),
            writes: Vec::new(),
        }
    }

    /// Append a document write
    #[inline]
    pub fn push(&mut self, write: DocumentWrite) {
        self.writes.push(write);
    }

    /// Logical day key the schedules are nested under
    #[inline]
    #[must_use]
    pub fn day_key(&self) -> &str {
        &self.day_key
    }

    /// Number of documents
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// True if the batch writes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Writes in commit order
    #[inline]
    #[must_use]
    pub fn writes(&self) -> &[DocumentWrite] {
        &self.writes
    }

    /// Document ids in commit order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.writes.iter().map(|w| w.id.as_str())
    }
}

/// Store acknowledgement of a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Documents written
    pub documents: usize,
    /// Store-side commit time, when reported
    pub commit_time: Option<DateTime<Utc>>,
}

/// Stored document body
///
/// `{ "schedule": { "<day>": { "<time>": "<activity>" } }, "lastUpdated": … }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBody {
    /// Schedules keyed by logical day
    #[serde(default)]
    pub schedule: BTreeMap<String, EntitySchedule>,
    /// Server-assigned write time
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl DocumentBody {
    /// Body holding `schedule` under `day_key`
    #[must_use]
    pub fn new(day_key: &str, schedule: EntitySchedule, last_updated: Option<DateTime<Utc>>) -> Self {
        Self {
            schedule: BTreeMap::from([(day_key.to_string(), schedule)]),
            last_updated,
        }
    }
}

/// A document read back from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedDocument {
    /// Document id
    pub id: String,
    /// Document content
    #[serde(flatten)]
    pub body: DocumentBody,
}

impl PublishedDocument {
    /// Schedule stored under `day_key`
    #[inline]
    #[must_use]
    pub fn day(&self, day_key: &str) -> Option<&EntitySchedule> {
        self.body.schedule.get(day_key)
    }
}

/// Remote sink for published schedules
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Atomically write every document in `batch`
    ///
    /// # Errors
    /// Returns [`PublishError`] if any write fails; in that case none of
    /// the batch is visible.
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, PublishError>;

    /// Read every document in the collection
    ///
    /// # Errors
    /// Returns [`PublishError`] if the collection cannot be read
    async fn list_documents(&self) -> Result<Vec<PublishedDocument>, PublishError>;

    /// Store name for logs
    fn name(&self) -> &'static str;
}

/// Order ids the way people read class names: `"9B" < "10A"`
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_number(&mut left);
                let rn = take_number(&mut right);
                let ord = compare_digits(&ln, &rn);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Sort documents in natural id order
pub fn sort_documents(documents: &mut [PublishedDocument]) {
    documents.sort_by(|a, b| natural_cmp(&a.id, &b.id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_order_handles_numbers() {
        let mut ids = vec!["10A", "9B", "9A", "11", "1"];
        ids.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(ids, vec!["1", "9A", "9B", "10A", "11"]);
    }

    #[test]
    fn natural_order_is_case_insensitive_then_exact() {
        assert_eq!(natural_cmp("room a", "Room B"), Ordering::Less);
        assert_eq!(natural_cmp("a", "A"), "a".cmp("A"));
        assert_eq!(natural_cmp("007", "7"), "007".cmp("7"));
    }

    #[test]
    fn document_body_shape() {
        let schedule: EntitySchedule = [("9:00 AM", "Math")].into_iter().collect();
        let body = DocumentBody::new("Today", schedule, None);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "schedule": { "Today": { "9:00 AM": "Math" } } }));
    }

    #[test]
    fn published_document_flattens_body() {
        let json = serde_json::json!({
            "id": "10A",
            "schedule": { "Today": { "9:00 AM": "Math" } },
            "lastUpdated": "2024-05-01T08:00:00Z"
        });
        let doc: PublishedDocument = serde_json::from_value(json).unwrap();
        assert_eq!(doc.id, "10A");
        assert_eq!(doc.day("Today").unwrap().get("9:00 AM"), Some("Math"));
        assert!(doc.body.last_updated.is_some());
    }

    #[test]
    fn batch_preserves_order() {
        let mut batch = WriteBatch::new("Today");
        for id in ["b", "a"] {
            batch.push(DocumentWrite {
                id: id.into(),
                schedule: EntitySchedule::new(),
            });
        }
        assert_eq!(batch.ids().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(batch.day_key(), "Today");
    }
}
