//! Error types for timetable synchronization
//!
//! Provides error handling for:
//! - Fetching the sheet (transport, HTTP status, CSV decoding)
//! - Publishing to the document store (transport, rejected commits)
//! - Configuration loading
//! - The orchestrator boundary, where every stage failure is tagged
//!
//! A sheet without a header or without usable rows is not an error; those
//! outcomes travel as an empty snapshot.

use crate::state::SyncStage;
use std::path::PathBuf;

/// Errors reaching the data source
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport failure (DNS, connect, timeout, body read)
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    /// Local file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Body is not decodable as CSV
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
}

impl FetchError {
    /// Create transport error for `url`
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Create IO error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors committing to or reading from the document store
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Transport failure talking to the store
    #[error("store transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Store rejected the batch
    #[error("store rejected commit (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Local store file could not be read or written
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document encoding/decoding failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store answered with something we cannot interpret
    #[error("malformed store response: {0}")]
    MalformedResponse(String),
}

impl PublishError {
    /// Create IO error for `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required setting absent
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// Setting present but unusable
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// HTTP client could not be constructed
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl ConfigError {
    /// Create invalid-value error
    pub fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of one synchronization cycle
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Fetching the sheet failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Publishing the snapshot failed
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    /// A network stage exceeded its ceiling
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: SyncStage, secs: u64 },
}

impl SyncError {
    /// Expected to clear up by the next scheduled cycle
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(FetchError::Csv(_)) => false,
            Self::Publish(PublishError::Serialization(_)) => false,
            Self::Publish(PublishError::Rejected { status, .. }) => *status >= 500 || *status == 429,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_stage() {
        let err = SyncError::Timeout {
            stage: SyncStage::Fetching,
            secs: 30,
        };
        assert_eq!(err.to_string(), "fetching timed out after 30s");
        assert!(err.is_transient());
    }

    #[test]
    fn rejected_classification() {
        let auth = SyncError::from(PublishError::Rejected {
            status: 403,
            message: "denied".into(),
        });
        let unavailable = SyncError::from(PublishError::Rejected {
            status: 503,
            message: "unavailable".into(),
        });
        assert!(!auth.is_transient());
        assert!(unavailable.is_transient());
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::invalid("SYNC_INTERVAL_SECS", "abc", "not a number");
        assert_eq!(
            err.to_string(),
            "invalid value \"abc\" for SYNC_INTERVAL_SECS: not a number"
        );
    }
}
