//! JSON file store
//!
//! Keeps the whole collection in one file so a static site can serve it
//! directly:
//!
//! ```json
//! {
//!   "metadata": { "collection": "timetables", "lastUpdated": "…" },
//!   "documents": { "10A": { "schedule": { "Today": { … } }, "lastUpdated": "…" } }
//! }
//! ```
//!
//! A commit rewrites the file through a sibling temp file and a rename, so
//! readers see either the old or the new collection, never half of one.

use super::{CommitReceipt, DocumentBody, DocumentStore, PublishedDocument, WriteBatch};
use crate::error::PublishError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Metadata {
    #[serde(default)]
    collection: String,
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionFile {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    documents: BTreeMap<String, DocumentBody>,
}

/// Document store backed by a single JSON file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    collection: String,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store writing `collection` to `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, collection: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            collection: collection.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Target file
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<CollectionFile, PublishError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(CollectionFile::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CollectionFile::default()),
            Err(e) => Err(PublishError::io(&self.path, e)),
        }
    }

    async fn store(&self, file: &CollectionFile) -> Result<(), PublishError> {
        let bytes = serde_json::to_vec_pretty(file)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PublishError::io(parent, e))?;
        }
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| PublishError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PublishError::io(&self.path, e))
    }
}

#[async_trait::async_trait]
impl DocumentStore for JsonFileStore {
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, PublishError> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now();

        let mut file = self.load().await?;
        for write in batch.writes() {
            file.documents.insert(
                write.id.clone(),
                DocumentBody::new(batch.day_key(), write.schedule.clone(), Some(now)),
            );
        }
        file.metadata = Metadata {
            collection: self.collection.clone(),
            last_updated: Some(now),
        };
        self.store(&file).await?;

        tracing::debug!(path = %self.path.display(), documents = batch.len(), "wrote collection file");
        Ok(CommitReceipt {
            documents: batch.len(),
            commit_time: Some(now),
        })
    }

    async fn list_documents(&self) -> Result<Vec<PublishedDocument>, PublishError> {
        let file = self.load().await?;
        Ok(file
            .documents
            .into_iter()
            .map(|(id, body)| PublishedDocument { id, body })
            .collect())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
