//! Schedule types
//!
//! - [`TimeSlot`]: a header column labelled with a period of the day
//! - [`EntitySchedule`]: time label → activity for one entity
//! - [`ScheduleSnapshot`]: every entity's schedule from one extraction pass

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A header-derived column representing one labelled period
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Position in the header row (always >= 1)
    pub column_index: usize,
    /// Trimmed, non-empty header text
    pub label: String,
}

impl TimeSlot {
    /// Create a new time slot
    #[inline]
    #[must_use]
    pub fn new(column_index: usize, label: impl Into<String>) -> Self {
        Self {
            column_index,
            label: label.into(),
        }
    }
}

/// Activities of a single entity keyed by time label
///
/// Keeps the left-to-right slot order of the sheet. Slots with no activity
/// are absent rather than stored as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitySchedule(IndexMap<String, String>);

impl EntitySchedule {
    /// Create an empty schedule
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an activity, returning the previous one for this label
    #[inline]
    pub fn insert(&mut self, label: impl Into<String>, activity: impl Into<String>) -> Option<String> {
        self.0.insert(label.into(), activity.into())
    }

    /// Activity at `label`
    #[inline]
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    /// Number of occupied slots
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no slot is occupied
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(label, activity)` in sheet order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EntitySchedule {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// The complete result of one extraction pass
///
/// Keyed by trimmed entity identifier; iteration is always in sorted
/// identifier order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleSnapshot(BTreeMap<String, EntitySchedule>);

impl ScheduleSnapshot {
    /// Create an empty snapshot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an entity's schedule, replacing (not merging) any previous one
    #[inline]
    pub fn insert(&mut self, entity: impl Into<String>, schedule: EntitySchedule) -> Option<EntitySchedule> {
        self.0.insert(entity.into(), schedule)
    }

    /// Schedule of `entity`
    #[inline]
    #[must_use]
    pub fn get(&self, entity: &str) -> Option<&EntitySchedule> {
        self.0.get(entity)
    }

    /// Number of entities
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the snapshot holds no entity
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(entity, schedule)` in sorted entity order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntitySchedule)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entity identifiers in sorted order
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, EntitySchedule)> for ScheduleSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, EntitySchedule)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl IntoIterator for ScheduleSnapshot {
    type Item = (String, EntitySchedule);
    type IntoIter = std::collections::btree_map::IntoIter<String, EntitySchedule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_keeps_sheet_order() {
        let schedule: EntitySchedule = [("11:00 AM", "Art"), ("9:00 AM", "Math")]
            .into_iter()
            .collect();
        let labels: Vec<_> = schedule.iter().map(|(label, _)| label).collect();
        assert_eq!(labels, vec!["11:00 AM", "9:00 AM"]);
    }

    #[test]
    fn snapshot_insert_replaces_whole_schedule() {
        let mut snapshot = ScheduleSnapshot::new();
        snapshot.insert("10A", [("9:00 AM", "Math")].into_iter().collect());
        let previous = snapshot.insert("10A", [("10:00 AM", "Art")].into_iter().collect());

        assert_eq!(previous.unwrap().get("9:00 AM"), Some("Math"));
        let current = snapshot.get("10A").unwrap();
        assert_eq!(current.get("9:00 AM"), None);
        assert_eq!(current.get("10:00 AM"), Some("Art"));
    }

    #[test]
    fn snapshot_iterates_sorted() {
        let snapshot: ScheduleSnapshot = [("9B", EntitySchedule::new()), ("10A", EntitySchedule::new())]
            .into_iter()
            .collect();
        let ids: Vec<_> = snapshot.entities().collect();
        assert_eq!(ids, vec!["10A", "9B"]);
    }

    #[test]
    fn snapshot_serializes_as_nested_objects() {
        let mut snapshot = ScheduleSnapshot::new();
        snapshot.insert("10A", [("9:00 AM", "Math")].into_iter().collect());
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"{"10A":{"9:00 AM":"Math"}}"#);
    }
}
