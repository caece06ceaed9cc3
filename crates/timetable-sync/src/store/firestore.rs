//! Firestore REST adapter
//!
//! `commit` maps a [`WriteBatch`] onto one `documents:commit` call. Each
//! write is an `update` without a field mask, which replaces the whole
//! document, plus a transform that sets `lastUpdated` to the request time
//! on the server. Firestore applies all writes of a commit atomically.

use super::{CommitReceipt, DocumentBody, DocumentStore, PublishedDocument, WriteBatch};
use crate::error::PublishError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use timetable_grid::EntitySchedule;

/// Public Firestore REST endpoint
pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

const LAST_UPDATED_FIELD: &str = "lastUpdated";
const SCHEDULE_FIELD: &str = "schedule";
const LIST_PAGE_SIZE: usize = 300;

/// Connection settings
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project id
    pub project_id: String,
    /// Collection holding one document per entity
    pub collection: String,
    /// REST base URL (emulator or public endpoint)
    pub base_url: String,
    /// OAuth bearer token; the emulator accepts requests without one
    pub access_token: Option<String>,
    /// Per-request ceiling
    pub timeout: Duration,
}

impl FirestoreConfig {
    /// Settings for `project_id` / `collection` against the public endpoint
    #[must_use]
    pub fn new(project_id: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            collection: collection.into(),
            base_url: DEFAULT_FIRESTORE_BASE_URL.to_string(),
            access_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// With bearer token
    #[inline]
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// With REST base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// With per-request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    /// Full resource name of document `id`
    #[must_use]
    pub fn document_name(&self, id: &str) -> String {
        format!("{}/documents/{}/{}", self.database_path(), self.collection, id)
    }
}

/// Firestore-backed document store
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: reqwest::Client,
    config: FirestoreConfig,
}

impl FirestoreStore {
    /// Create a store
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: FirestoreConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Connection settings
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    /// JSON body of a `documents:commit` request for `batch`
    #[must_use]
    pub fn commit_body(&self, batch: &WriteBatch) -> Value {
        let writes: Vec<Value> = batch
            .writes()
            .iter()
            .map(|write| {
                json!({
                    "update": {
                        "name": self.config.document_name(&write.id),
                        "fields": {
                            SCHEDULE_FIELD: {
                                "mapValue": {
                                    "fields": {
                                        batch.day_key(): encode_schedule(&write.schedule)
                                    }
                                }
                            }
                        }
                    },
                    "updateTransforms": [{
                        "fieldPath": LAST_UPDATED_FIELD,
                        "setToServerValue": "REQUEST_TIME"
                    }]
                })
            })
            .collect();

        json!({ "writes": writes })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for FirestoreStore {
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, PublishError> {
        let url = format!(
            "{}/{}/documents:commit",
            self.config.base_url,
            self.config.database_path()
        );
        tracing::debug!(documents = batch.len(), %url, "committing firestore batch");

        let response = self
            .authorized(self.client.post(&url))
            .json(&self.commit_body(&batch))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: CommitResponse = serde_json::from_str(&text)?;
        Ok(CommitReceipt {
            documents: batch.len(),
            commit_time: parsed.commit_time.as_deref().and_then(parse_timestamp),
        })
    }

    async fn list_documents(&self) -> Result<Vec<PublishedDocument>, PublishError> {
        let url = format!(
            "{}/{}/documents/{}",
            self.config.base_url,
            self.config.database_path(),
            self.config.collection
        );
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }

            let response = self
                .authorized(self.client.get(&url))
                .query(&query)
                .send()
                .await?;
            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(PublishError::Rejected {
                    status: status.as_u16(),
                    message: error_message(&text),
                });
            }

            let page = decode_list_page(&text)?;
            documents.extend(page.documents);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    fn name(&self) -> &'static str {
        "firestore"
    }
}

fn encode_schedule(schedule: &EntitySchedule) -> Value {
    let fields: Map<String, Value> = schedule
        .iter()
        .map(|(label, activity)| (label.to_string(), json!({ "stringValue": activity })))
        .collect();
    json!({ "mapValue": { "fields": fields } })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitResponse {
    commit_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<RawDocument>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    string_value: Option<String>,
    timestamp_value: Option<String>,
    map_value: Option<MapValue>,
}

#[derive(Debug, Default, Deserialize)]
struct MapValue {
    #[serde(default)]
    fields: BTreeMap<String, FieldValue>,
}

/// One decoded page of a collection listing
#[derive(Debug, Default)]
struct DecodedPage {
    documents: Vec<PublishedDocument>,
    next_page_token: Option<String>,
}

fn decode_list_page(text: &str) -> Result<DecodedPage, PublishError> {
    let raw: ListResponse = serde_json::from_str(text)?;
    let documents = raw
        .documents
        .into_iter()
        .map(decode_document)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DecodedPage {
        documents,
        next_page_token: raw.next_page_token,
    })
}

fn decode_document(raw: RawDocument) -> Result<PublishedDocument, PublishError> {
    let id = raw
        .name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| PublishError::MalformedResponse(format!("bad document name {:?}", raw.name)))?
        .to_string();

    let mut fields = raw.fields;
    let mut schedule = BTreeMap::new();
    if let Some(days) = fields.remove(SCHEDULE_FIELD).and_then(|v| v.map_value) {
        for (day, value) in days.fields {
            let slots = value.map_value.unwrap_or_default();
            let entity: EntitySchedule = slots
                .fields
                .into_iter()
                .filter_map(|(label, v)| v.string_value.map(|activity| (label, activity)))
                .collect();
            schedule.insert(day, entity);
        }
    }

    let last_updated = fields
        .remove(LAST_UPDATED_FIELD)
        .and_then(|v| v.timestamp_value)
        .as_deref()
        .and_then(parse_timestamp);

    Ok(PublishedDocument {
        id,
        body: DocumentBody {
            schedule,
            last_updated,
        },
    })
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorDetail,
    }
    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentWrite;

    fn store() -> FirestoreStore {
        FirestoreStore::new(FirestoreConfig::new("demo", "timetables")).unwrap()
    }

    #[test]
    fn document_name_layout() {
        let config = FirestoreConfig::new("demo", "timetables");
        assert_eq!(
            config.document_name("10-A"),
            "projects/demo/databases/(default)/documents/timetables/10-A"
        );
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let config = FirestoreConfig::new("demo", "t").with_base_url("http://localhost:8080/v1/");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn commit_body_overwrites_with_server_timestamp() {
        let mut batch = WriteBatch::new("Today");
        batch.push(DocumentWrite {
            id: "10A".into(),
            schedule: [("9:00 AM", "Math")].into_iter().collect(),
        });

        let body = store().commit_body(&batch);
        let expected = json!({
            "writes": [{
                "update": {
                    "name": "projects/demo/databases/(default)/documents/timetables/10A",
                    "fields": {
                        "schedule": { "mapValue": { "fields": {
                            "Today": { "mapValue": { "fields": {
                                "9:00 AM": { "stringValue": "Math" }
                            } } }
                        } } }
                    }
                },
                "updateTransforms": [{
                    "fieldPath": "lastUpdated",
                    "setToServerValue": "REQUEST_TIME"
                }]
            }]
        });
        pretty_assertions::assert_eq!(body, expected);
        assert!(body["writes"][0].get("updateMask").is_none());
    }

    #[test]
    fn empty_schedule_encodes_empty_map() {
        let value = encode_schedule(&EntitySchedule::new());
        assert_eq!(value, json!({ "mapValue": { "fields": {} } }));
    }

    #[test]
    fn decode_listing() {
        let text = r#"{
            "documents": [{
                "name": "projects/demo/databases/(default)/documents/timetables/10A",
                "fields": {
                    "schedule": { "mapValue": { "fields": {
                        "Today": { "mapValue": { "fields": {
                            "9:00 AM": { "stringValue": "Math" },
                            "10:00 AM": { "integerValue": "4" }
                        } } }
                    } } },
                    "lastUpdated": { "timestampValue": "2024-05-01T08:00:00.123456Z" }
                },
                "createTime": "2024-05-01T08:00:00Z"
            }],
            "nextPageToken": "abc"
        }"#;

        let page = decode_list_page(text).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
        let doc = &page.documents[0];
        assert_eq!(doc.id, "10A");
        let today = doc.day("Today").unwrap();
        assert_eq!(today.get("9:00 AM"), Some("Math"));
        assert_eq!(today.len(), 1);
        assert!(doc.body.last_updated.is_some());
    }

    #[test]
    fn decode_empty_listing() {
        let page = decode_list_page("{}").unwrap();
        assert!(page.documents.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn error_message_prefers_envelope() {
        let body = r#"{"error":{"code":403,"message":"Missing or insufficient permissions.","status":"PERMISSION_DENIED"}}"#;
        assert_eq!(error_message(body), "Missing or insufficient permissions.");
        assert_eq!(error_message(" upstream down \n"), "upstream down");
    }
}
