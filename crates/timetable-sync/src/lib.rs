//! Timetable Sync - keeps a document store in step with a timetable sheet
//!
//! Each cycle pulls the sheet as CSV, extracts per-entity schedules with
//! [`timetable_grid`], and commits them as one atomic batch, but only when
//! the content fingerprint differs from the last successful publish.
//!
//! Components:
//! - [`source`]: where rows come from (HTTP CSV export, local file)
//! - [`detect`]: fingerprint comparison against the last publish
//! - [`publish`] and [`store`]: batch building and store adapters
//! - [`orchestrator`]: the cycle itself, with failures as tagged outcomes
//! - [`trigger`]: interval and one-shot runners
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use timetable_sync::{FileCsvSource, MemoryStore, Publisher, SyncOrchestrator};
//!
//! # async fn demo() {
//! let orchestrator = SyncOrchestrator::new(
//!     Arc::new(FileCsvSource::new("timetable.csv")),
//!     Publisher::new(Arc::new(MemoryStore::new())),
//! );
//! let report = orchestrator.run_cycle().await;
//! println!("{} entities", report.entities);
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod detect;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod publish;
pub mod source;
pub mod state;
pub mod store;
pub mod trigger;

pub use config::{StoreKind, SyncConfig};
pub use detect::{ChangeDecision, ChangeDetector};
pub use error::{ConfigError, FetchError, PublishError, SyncError};
pub use orchestrator::{CycleId, CycleOutcome, CycleReport, SyncOrchestrator};
pub use publish::{document_id, PublishReceipt, Publisher, DAY_KEY};
pub use source::{parse_csv, FileCsvSource, HttpCsvSource, SheetSource};
pub use state::{CycleMachine, SyncStage, SyncState};
pub use store::{
    natural_cmp, sort_documents, CommitReceipt, DocumentBody, DocumentStore, DocumentWrite,
    FirestoreConfig, FirestoreStore, JsonFileStore, MemoryStore, PublishedDocument, WriteBatch,
};
pub use trigger::{run_interval, run_once};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
