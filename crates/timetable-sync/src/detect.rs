//! Change detection
//!
//! Holds the fingerprint of the last successfully published snapshot. The
//! fingerprint lives only in memory: a fresh process always publishes once.

use timetable_grid::{Fingerprint, ScheduleSnapshot};

/// Result of comparing a snapshot with the last published one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// Content differs (or nothing was published yet)
    Changed(Fingerprint),
    /// Content matches the last publish
    Unchanged(Fingerprint),
}

impl ChangeDecision {
    /// Fingerprint of the evaluated snapshot
    #[inline]
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        match self {
            Self::Changed(fp) | Self::Unchanged(fp) => *fp,
        }
    }

    /// True if the snapshot should be published
    #[inline]
    #[must_use]
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Remembers what was last delivered to the store
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector {
    published: Option<Fingerprint>,
}

impl ChangeDetector {
    /// Detector with no publish history
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `snapshot` with the last published fingerprint
    ///
    /// Does not update state; call [`ChangeDetector::mark_published`] once
    /// the store has accepted the snapshot.
    #[must_use]
    pub fn evaluate(&self, snapshot: &ScheduleSnapshot) -> ChangeDecision {
        let fingerprint = Fingerprint::of(snapshot);
        if self.published == Some(fingerprint) {
            ChangeDecision::Unchanged(fingerprint)
        } else {
            ChangeDecision::Changed(fingerprint)
        }
    }

    /// True if `snapshot` differs from the last publish
    #[inline]
    #[must_use]
    pub fn should_publish(&self, snapshot: &ScheduleSnapshot) -> bool {
        self.evaluate(snapshot).is_changed()
    }

    /// Record a successful publish
    #[inline]
    pub fn mark_published(&mut self, fingerprint: Fingerprint) {
        self.published = Some(fingerprint);
    }

    /// Fingerprint of the last successful publish
    #[inline]
    #[must_use]
    pub fn last_published(&self) -> Option<Fingerprint> {
        self.published
    }

    /// Forget publish history, forcing the next cycle to publish
    #[inline]
    pub fn reset(&mut self) {
        self.published = None;
    }
}
