//! Service configuration
//!
//! Settings come from the process environment (after loading a `.env`
//! file, if any) and can be overridden field by field with the `with_*`
//! builders. The factories at the bottom turn a validated config into the
//! source and store the orchestrator runs against.

use crate::error::ConfigError;
use crate::source::{FileCsvSource, HttpCsvSource, SheetSource};
use crate::store::{DocumentStore, FirestoreConfig, FirestoreStore, JsonFileStore, MemoryStore, DEFAULT_FIRESTORE_BASE_URL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use timetable_grid::{HeaderRules, HEADER_KEYWORDS};

/// Environment variable names
pub mod env {
    /// CSV URL or local path
    pub const SHEET_URL: &str = "SHEET_URL";
    /// Store backend
    pub const STORE: &str = "TIMETABLE_STORE";
    /// Firestore project id
    pub const FIRESTORE_PROJECT_ID: &str = "FIRESTORE_PROJECT_ID";
    /// Firestore bearer token
    pub const FIRESTORE_ACCESS_TOKEN: &str = "FIRESTORE_ACCESS_TOKEN";
    /// Firestore REST base URL
    pub const FIRESTORE_BASE_URL: &str = "FIRESTORE_BASE_URL";
    /// `host:port` of a local Firestore emulator
    pub const FIRESTORE_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";
    /// Collection name
    pub const COLLECTION: &str = "TIMETABLE_COLLECTION";
    /// Output file of the file store
    pub const OUTPUT: &str = "TIMETABLE_OUTPUT";
    /// Trigger period
    pub const INTERVAL_SECS: &str = "SYNC_INTERVAL_SECS";
    /// Fetch ceiling
    pub const FETCH_TIMEOUT_SECS: &str = "FETCH_TIMEOUT_SECS";
    /// Commit ceiling
    pub const COMMIT_TIMEOUT_SECS: &str = "COMMIT_TIMEOUT_SECS";
    /// Comma-separated header keywords
    pub const HEADER_KEYWORDS: &str = "TIMETABLE_HEADER_KEYWORDS";
}

/// Default collection name
pub const DEFAULT_COLLECTION: &str = "timetables";
/// Default output file of the file store
pub const DEFAULT_OUTPUT: &str = "timetable.json";
/// Default trigger period
pub const DEFAULT_INTERVAL_SECS: u64 = 300;
/// Default fetch and commit ceiling
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Document store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Firestore REST
    #[default]
    Firestore,
    /// Local JSON file
    File,
    /// In-process map, nothing persisted
    Memory,
}

impl StoreKind {
    /// Lower-case name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Firestore => "firestore",
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "file" | "json" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::invalid(
                env::STORE,
                s,
                "expected firestore, file or memory",
            )),
        }
    }
}

/// Sync service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// CSV URL (`http://`, `https://`) or local path
    pub sheet_location: Option<String>,
    /// Store backend
    pub store: StoreKind,
    /// Collection name
    pub collection: String,
    /// Firestore project id
    pub firestore_project: Option<String>,
    /// Firestore bearer token
    #[serde(skip_serializing, default)]
    pub firestore_token: Option<String>,
    /// Firestore REST base URL
    pub firestore_base_url: String,
    /// Output file of the file store
    pub output_path: PathBuf,
    /// Seconds between scheduled cycles
    pub interval_secs: u64,
    /// Fetch ceiling in seconds
    pub fetch_timeout_secs: u64,
    /// Commit ceiling in seconds
    pub commit_timeout_secs: u64,
    /// Header keywords, matched case-insensitively
    pub header_keywords: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sheet_location: None,
            store: StoreKind::default(),
            collection: DEFAULT_COLLECTION.to_string(),
            firestore_project: None,
            firestore_token: None,
            firestore_base_url: DEFAULT_FIRESTORE_BASE_URL.to_string(),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            interval_secs: DEFAULT_INTERVAL_SECS,
            fetch_timeout_secs: DEFAULT_TIMEOUT_SECS,
            commit_timeout_secs: DEFAULT_TIMEOUT_SECS,
            header_keywords: HEADER_KEYWORDS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl SyncConfig {
    /// Defaults with no sheet configured
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the process environment, reading `.env` first
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a variable is present but unusable
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through `lookup`, treating blank values as unset
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a variable is present but unusable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        config.sheet_location = get(env::SHEET_URL);
        if let Some(store) = get(env::STORE) {
            config.store = store.parse()?;
        }
        if let Some(collection) = get(env::COLLECTION) {
            config.collection = collection;
        }
        config.firestore_project = get(env::FIRESTORE_PROJECT_ID);
        config.firestore_token = get(env::FIRESTORE_ACCESS_TOKEN);
        if let Some(url) = get(env::FIRESTORE_BASE_URL) {
            config.firestore_base_url = url;
        } else if let Some(host) = get(env::FIRESTORE_EMULATOR_HOST) {
            config.firestore_base_url = format!("http://{host}/v1");
        }
        if let Some(output) = get(env::OUTPUT) {
            config.output_path = PathBuf::from(output);
        }
        if let Some(v) = get(env::INTERVAL_SECS) {
            config.interval_secs = parse_secs(env::INTERVAL_SECS, &v)?;
        }
        if let Some(v) = get(env::FETCH_TIMEOUT_SECS) {
            config.fetch_timeout_secs = parse_secs(env::FETCH_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(env::COMMIT_TIMEOUT_SECS) {
            config.commit_timeout_secs = parse_secs(env::COMMIT_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(env::HEADER_KEYWORDS) {
            config.header_keywords = v
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        Ok(config)
    }

    /// Set the sheet location
    #[must_use]
    pub fn with_sheet(mut self, location: impl Into<String>) -> Self {
        self.sheet_location = Some(location.into());
        self
    }

    /// Set the store backend
    #[must_use]
    pub fn with_store(mut self, store: StoreKind) -> Self {
        self.store = store;
        self
    }

    /// Set the collection name
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Set the Firestore project
    #[must_use]
    pub fn with_firestore_project(mut self, project: impl Into<String>) -> Self {
        self.firestore_project = Some(project.into());
        self
    }

    /// Set the file store output path
    #[must_use]
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Set the trigger period
    #[must_use]
    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Set the header keywords
    #[must_use]
    pub fn with_header_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Trigger period
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Fetch ceiling
    #[inline]
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Commit ceiling
    #[inline]
    #[must_use]
    pub fn commit_timeout(&self) -> Duration {
        Duration::from_secs(self.commit_timeout_secs)
    }

    /// Header detection rules built from the keyword list
    #[must_use]
    pub fn header_rules(&self) -> HeaderRules {
        HeaderRules::new(self.header_keywords.iter().map(String::as_str))
    }

    /// Check that the settings describe a runnable service
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sheet_location.is_none() {
            return Err(ConfigError::Missing(env::SHEET_URL));
        }
        if self.store == StoreKind::Firestore && self.firestore_project.is_none() {
            return Err(ConfigError::Missing(env::FIRESTORE_PROJECT_ID));
        }
        if self.collection.contains('/') {
            return Err(ConfigError::invalid(
                env::COLLECTION,
                &self.collection,
                "collection name must not contain '/'",
            ));
        }
        for (key, secs) in [
            (env::INTERVAL_SECS, self.interval_secs),
            (env::FETCH_TIMEOUT_SECS, self.fetch_timeout_secs),
            (env::COMMIT_TIMEOUT_SECS, self.commit_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::invalid(key, "0", "must be at least 1"));
            }
        }
        if self.header_rules().keywords().is_empty() {
            return Err(ConfigError::invalid(
                env::HEADER_KEYWORDS,
                self.header_keywords.join(","),
                "at least one keyword is required",
            ));
        }
        Ok(())
    }

    /// Source for the configured sheet location
    ///
    /// Locations starting with `http://` or `https://` are fetched over
    /// HTTP; anything else is read as a local file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if no location is set or the client fails
    pub fn build_source(&self) -> Result<Arc<dyn SheetSource>, ConfigError> {
        let location = self
            .sheet_location
            .as_deref()
            .ok_or(ConfigError::Missing(env::SHEET_URL))?;

        if location.starts_with("http://") || location.starts_with("https://") {
            Ok(Arc::new(HttpCsvSource::new(location, self.fetch_timeout())?))
        } else {
            Ok(Arc::new(FileCsvSource::new(location)))
        }
    }

    /// Store for the configured backend
    ///
    /// # Errors
    /// Returns [`ConfigError`] if Firestore is selected without a project
    /// or the client fails
    pub fn build_store(&self) -> Result<Arc<dyn DocumentStore>, ConfigError> {
        match self.store {
            StoreKind::Firestore => {
                let project = self
                    .firestore_project
                    .as_deref()
                    .ok_or(ConfigError::Missing(env::FIRESTORE_PROJECT_ID))?;
                let mut config = FirestoreConfig::new(project, &self.collection)
                    .with_base_url(&self.firestore_base_url)
                    .with_timeout(self.commit_timeout());
                if let Some(token) = &self.firestore_token {
                    config = config.with_access_token(token);
                }
                Ok(Arc::new(FirestoreStore::new(config)?))
            }
            StoreKind::File => Ok(Arc::new(JsonFileStore::new(&self.output_path, &self.collection))),
            StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        }
    }
}

fn parse_secs(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse::<u64>()
        .map_err(|e| ConfigError::invalid(key, value, e.to_string()))
}
