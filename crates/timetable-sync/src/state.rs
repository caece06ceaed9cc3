//! Cycle state machine
//!
//! `Idle → Fetching → Normalizing → Extracting → Detecting → Publishing → Idle`,
//! with `Failed(stage)` reachable from every stage. A failed cycle only
//! returns to `Idle`; nothing survives into the next cycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A working stage of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStage {
    /// Pulling rows from the sheet
    Fetching,
    /// Locating the header and time slots
    Normalizing,
    /// Building entity schedules
    Extracting,
    /// Comparing fingerprints
    Detecting,
    /// Committing the batch
    Publishing,
}

impl SyncStage {
    /// Stable lower-case name used in logs
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Extracting => "extracting",
            Self::Detecting => "detecting",
            Self::Publishing => "publishing",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "stage")]
pub enum SyncState {
    /// Waiting for a trigger
    Idle,
    /// Working on a stage
    Running(SyncStage),
    /// Cycle aborted in a stage
    Failed(SyncStage),
}

/// Illegal transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal sync transition {from:?} -> {to:?}")]
pub struct TransitionError {
    /// State before
    pub from: SyncState,
    /// Rejected target
    pub to: SyncState,
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: SyncState) -> Vec<SyncState> {
    use SyncStage::*;
    use SyncState::*;
    match from {
        Idle => vec![Running(Fetching)],
        Running(Fetching) => vec![Running(Normalizing), Failed(Fetching)],
        Running(Normalizing) => vec![Running(Extracting), Failed(Normalizing)],
        Running(Extracting) => vec![Running(Detecting), Failed(Extracting)],
        // unchanged snapshots go straight back to Idle
        Running(Detecting) => vec![Running(Publishing), Idle, Failed(Detecting)],
        Running(Publishing) => vec![Idle, Failed(Publishing)],
        Failed(_) => vec![Idle],
    }
}

/// Validates a state transition
///
/// # Errors
/// Returns [`TransitionError`] if `to` is not reachable from `from`
pub fn validate_transition(from: SyncState, to: SyncState) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Tracks the states visited by one cycle
#[derive(Debug, Clone)]
pub struct CycleMachine {
    current: SyncState,
    trail: Vec<SyncState>,
}

impl CycleMachine {
    /// Start in `Idle`
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: SyncState::Idle,
            trail: vec![SyncState::Idle],
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn current(&self) -> SyncState {
        self.current
    }

    /// Every state visited so far, starting with `Idle`
    #[inline]
    #[must_use]
    pub fn trail(&self) -> &[SyncState] {
        &self.trail
    }

    /// Move to `to`
    ///
    /// # Errors
    /// Returns [`TransitionError`] and stays put if the move is illegal
    pub fn advance(&mut self, to: SyncState) -> Result<(), TransitionError> {
        validate_transition(self.current, to)?;
        self.current = to;
        self.trail.push(to);
        Ok(())
    }

    /// Enter `stage`
    ///
    /// # Errors
    /// See [`CycleMachine::advance`]
    #[inline]
    pub fn enter(&mut self, stage: SyncStage) -> Result<(), TransitionError> {
        self.advance(SyncState::Running(stage))
    }

    /// Abort in the current stage and return to `Idle`
    ///
    /// Returns the stage the cycle failed in; failing while `Idle` is
    /// attributed to fetching, the first stage.
    pub fn fail(&mut self) -> SyncStage {
        let stage = match self.current {
            SyncState::Running(stage) | SyncState::Failed(stage) => stage,
            SyncState::Idle => SyncStage::Fetching,
        };
        if self.current != SyncState::Failed(stage) {
            self.current = SyncState::Failed(stage);
            self.trail.push(self.current);
        }
        self.current = SyncState::Idle;
        self.trail.push(SyncState::Idle);
        stage
    }

    /// Finish a successful cycle
    ///
    /// # Errors
    /// See [`CycleMachine::advance`]
    #[inline]
    pub fn finish(&mut self) -> Result<(), TransitionError> {
        self.advance(SyncState::Idle)
    }
}

impl Default for CycleMachine {
    fn default() -> Self {
        Self::new()
    }
}
