//! Cycle triggers
//!
//! - [`run_interval`]: one cycle at startup, then one per period until
//!   shutdown
//! - [`run_once`]: a single cycle, for external schedulers and CI jobs

use crate::orchestrator::{CycleReport, SyncOrchestrator};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Run cycles every `period` until `shutdown` resolves
///
/// The first cycle starts immediately. A cycle that overruns the period
/// swallows the ticks it missed rather than triggering a burst. Returns
/// the number of cycles started.
pub async fn run_interval<S>(orchestrator: Arc<SyncOrchestrator>, period: Duration, shutdown: S) -> u64
where
    S: Future<Output = ()>,
{
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    tracing::info!(period_secs = period.as_secs(), "interval trigger started");
    let mut cycles = 0_u64;
    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => {
                tracing::info!(cycles, "interval trigger received shutdown signal");
                break;
            }
            _ = timer.tick() => {
                cycles += 1;
                let report = orchestrator.run_cycle().await;
                tracing::debug!(cycle = %report.cycle_id, outcome = report.outcome.label(), "scheduled cycle done");
            }
        }
    }
    cycles
}

/// Run exactly one cycle
pub async fn run_once(orchestrator: &SyncOrchestrator) -> CycleReport {
    tracing::info!("running single cycle");
    orchestrator.run_cycle().await
}
