//! Sync orchestrator
//!
//! Runs one cycle: fetch, normalize, extract, detect, publish. Every
//! failure is caught here and reported as a tagged [`CycleOutcome`]; the
//! caller never sees a propagated error or a panic.
//!
//! Concurrency:
//! - the change detector sits behind an async mutex that doubles as the
//!   in-flight flag
//! - a cycle that cannot take it returns [`CycleOutcome::Busy`] at once
//! - fetch and commit are the only suspension points, each under a timeout

use crate::config::SyncConfig;
use crate::detect::{ChangeDecision, ChangeDetector};
use crate::error::{ConfigError, SyncError};
use crate::publish::Publisher;
use crate::source::SheetSource;
use crate::state::{CycleMachine, SyncStage, SyncState};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use timetable_grid::{extract_from_header, normalize_with, ExtractionStats, Fingerprint, HeaderRules};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::Instrument;
use ulid::Ulid;

/// Default fetch and commit ceiling
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Unique cycle identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CycleId(pub Ulid);

impl CycleId {
    /// Generate new cycle ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a cycle ended
#[derive(Debug)]
pub enum CycleOutcome {
    /// Snapshot differed and was published
    Published {
        /// Fingerprint now recorded as published
        fingerprint: Fingerprint,
        /// Documents written
        documents: usize,
        /// False if the snapshot was empty and the store was not contacted
        committed: bool,
    },
    /// Snapshot matched the last publish
    Unchanged {
        /// Fingerprint of the snapshot
        fingerprint: Fingerprint,
    },
    /// Another cycle was in flight; nothing was done
    Busy,
    /// A stage failed; the fingerprint was left untouched
    Failed {
        /// Stage that failed
        stage: SyncStage,
        /// Cause
        error: SyncError,
    },
}

impl CycleOutcome {
    /// Short label used in logs
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::Unchanged { .. } => "unchanged",
            Self::Busy => "busy",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Everything known about one cycle
#[derive(Debug)]
pub struct CycleReport {
    /// Cycle id, also attached to the cycle's log span
    pub cycle_id: CycleId,
    /// How the cycle ended
    pub outcome: CycleOutcome,
    /// Rows returned by the source
    pub rows_fetched: usize,
    /// Index of the header row, if one was found
    pub header_row: Option<usize>,
    /// Number of time-slot columns
    pub time_slots: usize,
    /// Extraction diagnostics
    pub stats: ExtractionStats,
    /// Entities in the snapshot
    pub entities: usize,
    /// States visited, starting and ending with `Idle`
    pub transitions: Vec<SyncState>,
    /// Wall time spent
    pub elapsed: Duration,
}

impl CycleReport {
    fn new(cycle_id: CycleId) -> Self {
        Self {
            cycle_id,
            outcome: CycleOutcome::Busy,
            rows_fetched: 0,
            header_row: None,
            time_slots: 0,
            stats: ExtractionStats::default(),
            entities: 0,
            transitions: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// True if a stage failed
    #[inline]
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Failed { .. })
    }

    /// True if the store received a commit
    #[inline]
    #[must_use]
    pub fn committed(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Published { committed: true, .. })
    }

    /// Process exit status for a one-shot run
    ///
    /// Only a failed cycle under `strict` is non-zero.
    #[inline]
    #[must_use]
    pub fn exit_code(&self, strict: bool) -> i32 {
        i32::from(strict && self.is_failure())
    }
}

/// Drives sync cycles against one source and one store
pub struct SyncOrchestrator {
    source: Arc<dyn SheetSource>,
    publisher: Publisher,
    rules: HeaderRules,
    detector: Mutex<ChangeDetector>,
    fetch_timeout: Duration,
    commit_timeout: Duration,
}

impl SyncOrchestrator {
    /// Orchestrator with default header rules and timeouts
    #[must_use]
    pub fn new(source: Arc<dyn SheetSource>, publisher: Publisher) -> Self {
        Self {
            source,
            publisher,
            rules: HeaderRules::default(),
            detector: Mutex::new(ChangeDetector::new()),
            fetch_timeout: DEFAULT_STAGE_TIMEOUT,
            commit_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    /// Build source, store and rules from `config`
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the config is invalid or a client fails
    pub fn from_config(config: &SyncConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let source = config.build_source()?;
        let store = config.build_store()?;
        Ok(Self::new(source, Publisher::new(store))
            .with_rules(config.header_rules())
            .with_timeouts(config.fetch_timeout(), config.commit_timeout()))
    }

    /// Use `rules` for header detection
    #[must_use]
    pub fn with_rules(mut self, rules: HeaderRules) -> Self {
        self.rules = rules;
        self
    }

    /// Set fetch and commit ceilings
    #[must_use]
    pub fn with_timeouts(mut self, fetch: Duration, commit: Duration) -> Self {
        self.fetch_timeout = fetch;
        self.commit_timeout = commit;
        self
    }

    /// Row source
    #[inline]
    #[must_use]
    pub fn source(&self) -> &Arc<dyn SheetSource> {
        &self.source
    }

    /// Publisher
    #[inline]
    #[must_use]
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Header rules
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &HeaderRules {
        &self.rules
    }

    /// Fingerprint of the last successful publish
    ///
    /// Waits for an in-flight cycle to finish.
    pub async fn last_fingerprint(&self) -> Option<Fingerprint> {
        self.detector.lock().await.last_published()
    }

    /// Run one cycle
    ///
    /// Returns [`CycleOutcome::Busy`] without doing anything if another
    /// cycle is in flight.
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::new(CycleId::new());

        let Ok(mut detector) = self.detector.try_lock() else {
            tracing::warn!(cycle = %report.cycle_id, "previous cycle still running, trigger dropped");
            report.transitions.push(SyncState::Idle);
            report.elapsed = started.elapsed();
            return report;
        };

        let span = tracing::info_span!("sync_cycle", cycle = %report.cycle_id);
        async {
            let mut machine = CycleMachine::new();
            let result = self.execute(&mut detector, &mut machine, &mut report).await;
            report.outcome = match result {
                Ok(outcome) => {
                    step(machine.finish());
                    outcome
                }
                Err(error) => {
                    let stage = machine.fail();
                    tracing::error!(
                        %stage,
                        rows = report.rows_fetched,
                        entities = report.entities,
                        transient = error.is_transient(),
                        error = %error,
                        "sync cycle failed"
                    );
                    CycleOutcome::Failed { stage, error }
                }
            };
            report.transitions = machine.trail().to_vec();
            report.elapsed = started.elapsed();
            tracing::info!(
                outcome = report.outcome.label(),
                elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                "sync cycle finished"
            );
        }
        .instrument(span)
        .await;

        report
    }

    async fn execute(
        &self,
        detector: &mut ChangeDetector,
        machine: &mut CycleMachine,
        report: &mut CycleReport,
    ) -> Result<CycleOutcome, SyncError> {
        step(machine.enter(SyncStage::Fetching));
        let rows = bounded(SyncStage::Fetching, self.fetch_timeout, self.source.fetch_rows()).await?;
        report.rows_fetched = rows.len();
        tracing::info!(source = %self.source.describe(), rows = rows.len(), "sheet fetched");

        step(machine.enter(SyncStage::Normalizing));
        let header = normalize_with(&rows, &self.rules);
        match &header {
            Some(found) => {
                report.header_row = Some(found.row_index);
                report.time_slots = found.time_slots.len();
                tracing::info!(
                    header_row = found.row_index,
                    time_slots = found.time_slots.len(),
                    "header located"
                );
            }
            None => tracing::warn!(
                rows = rows.len(),
                scanned = self.rules.scan_limit(),
                "no header row found, treating sheet as empty"
            ),
        }

        step(machine.enter(SyncStage::Extracting));
        let extraction = extract_from_header(&rows, header);
        report.entities = extraction.snapshot.len();
        report.stats = extraction.stats.clone();
        if !extraction.stats.duplicate_entities.is_empty() {
            tracing::warn!(
                duplicates = ?extraction.stats.duplicate_entities,
                "repeated identifiers, later rows replace earlier ones"
            );
        }
        if extraction.is_empty_below_header() {
            tracing::warn!(data_rows = extraction.stats.data_rows, "no entity rows below header");
        }
        tracing::info!(
            entities = report.entities,
            data_rows = extraction.stats.data_rows,
            skipped = extraction.stats.skipped_rows,
            "schedules extracted"
        );

        step(machine.enter(SyncStage::Detecting));
        let fingerprint = match detector.evaluate(&extraction.snapshot) {
            ChangeDecision::Unchanged(fingerprint) => {
                tracing::info!(fingerprint = %fingerprint.short(), "no changes detected");
                return Ok(CycleOutcome::Unchanged { fingerprint });
            }
            ChangeDecision::Changed(fingerprint) => fingerprint,
        };
        tracing::info!(fingerprint = %fingerprint.short(), "changes detected");

        step(machine.enter(SyncStage::Publishing));
        let receipt = bounded(
            SyncStage::Publishing,
            self.commit_timeout,
            self.publisher.publish(&extraction.snapshot),
        )
        .await?;
        detector.mark_published(fingerprint);

        Ok(CycleOutcome::Published {
            fingerprint,
            documents: receipt.documents,
            committed: receipt.committed,
        })
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("source", &self.source.describe())
            .field("store", &self.publisher.store().name())
            .field("rules", &self.rules)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("commit_timeout", &self.commit_timeout)
            .finish_non_exhaustive()
    }
}

fn step(result: Result<(), crate::state::TransitionError>) {
    if let Err(err) = result {
        tracing::error!(error = %err, "cycle state machine out of order");
    }
}

async fn bounded<T, E, F>(stage: SyncStage, limit: Duration, fut: F) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, E>>,
    SyncError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(SyncError::from),
        Err(_) => Err(SyncError::Timeout {
            stage,
            secs: limit.as_secs(),
        }),
    }
}
