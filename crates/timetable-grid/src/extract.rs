//! Schedule extraction
//!
//! Reads every row below the header into an [`EntitySchedule`] keyed by the
//! row's column-0 identifier. A blank cell and a missing cell mean the same
//! thing downstream: no activity in that slot.
//!
//! When an identifier repeats, the later row replaces the earlier one in
//! full. Repeats are counted in [`ExtractionStats`] so they show up in logs.

use crate::normalize::{normalize_with, GridHeader, HeaderRules};
use crate::row::RawRow;
use crate::schedule::{EntitySchedule, ScheduleSnapshot, TimeSlot};
use serde::{Deserialize, Serialize};

/// Row counts gathered during one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Rows handed to the extractor, header and preamble included
    pub rows_total: usize,
    /// Rows below the header
    pub data_rows: usize,
    /// Data rows dropped for a blank identifier
    pub skipped_rows: usize,
    /// Identifiers seen more than once (one entry per repeat)
    pub duplicate_entities: Vec<String>,
}

/// Outcome of normalizing and extracting one grid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Detected header, `None` if the grid had none
    pub header: Option<GridHeader>,
    /// Extracted schedules
    pub snapshot: ScheduleSnapshot,
    /// Diagnostics
    pub stats: ExtractionStats,
}

impl Extraction {
    /// True if a header row was found
    #[inline]
    #[must_use]
    pub fn header_found(&self) -> bool {
        self.header.is_some()
    }

    /// True if rows existed below a header but none yielded an entity
    #[inline]
    #[must_use]
    pub fn is_empty_below_header(&self) -> bool {
        self.header.is_some() && self.snapshot.is_empty()
    }
}

/// Extract schedules from the rows strictly after `header_index`
#[must_use]
pub fn extract(rows: &[RawRow], header_index: usize, time_slots: &[TimeSlot]) -> ScheduleSnapshot {
    let mut stats = ExtractionStats::default();
    extract_into(rows, header_index, time_slots, &mut stats)
}

/// Normalize `rows` and extract every entity schedule
///
/// A grid without a header yields an empty snapshot; that is a valid
/// result, not an error.
#[must_use]
pub fn extract_grid(rows: &[RawRow], rules: &HeaderRules) -> Extraction {
    extract_from_header(rows, normalize_with(rows, rules))
}

/// Extract below an already located header
///
/// `None` produces the empty "no header found" extraction.
#[must_use]
pub fn extract_from_header(rows: &[RawRow], header: Option<GridHeader>) -> Extraction {
    let mut stats = ExtractionStats {
        rows_total: rows.len(),
        ..ExtractionStats::default()
    };

    let Some(header) = header else {
        return Extraction {
            header: None,
            snapshot: ScheduleSnapshot::new(),
            stats,
        };
    };

    let snapshot = extract_into(rows, header.row_index, &header.time_slots, &mut stats);
    Extraction {
        header: Some(header),
        snapshot,
        stats,
    }
}

fn extract_into(
    rows: &[RawRow],
    header_index: usize,
    time_slots: &[TimeSlot],
    stats: &mut ExtractionStats,
) -> ScheduleSnapshot {
    let mut snapshot = ScheduleSnapshot::new();

    for row in rows.iter().skip(header_index + 1) {
        stats.data_rows += 1;

        let Some(entity) = row.trimmed_cell(0) else {
            stats.skipped_rows += 1;
            continue;
        };

        let schedule: EntitySchedule = time_slots
            .iter()
            .filter_map(|slot| {
                row.trimmed_cell(slot.column_index)
                    .map(|activity| (slot.label.as_str(), activity))
            })
            .collect();

        if snapshot.insert(entity, schedule).is_some() {
            stats.duplicate_entities.push(entity.to_string());
        }
    }

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header() -> RawRow {
        RawRow::from(["Class", "9:00 AM", "10:00 AM", "11:00 AM"])
    }

    fn slots() -> Vec<TimeSlot> {
        crate::normalize::classify_time_slots(&header())
    }

    #[test]
    fn blank_cell_is_omitted() {
        let rows = vec![header(), RawRow::from(["10A", "Math", "", "Science"])];
        let snapshot = extract(&rows, 0, &slots());

        let expected: ScheduleSnapshot = [(
            "10A",
            [("9:00 AM", "Math"), ("11:00 AM", "Science")]
                .into_iter()
                .collect::<EntitySchedule>(),
        )]
        .into_iter()
        .collect();
        assert_eq!(snapshot, expected);
    }

    #[test]
    fn short_row_reads_absent_cells() {
        let rows = vec![header(), RawRow::from(["10B", "Art"])];
        let snapshot = extract(&rows, 0, &slots());
        let schedule = snapshot.get("10B").unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.get("9:00 AM"), Some("Art"));
    }

    #[test]
    fn blank_identifier_rows_are_skipped() {
        let rows = vec![
            header(),
            RawRow::from(["", "Math"]),
            RawRow::from(["   ", "Math"]),
            RawRow::default(),
            RawRow::from([" 10C ", " PE "]),
        ];
        let extraction = extract_grid(&rows, &HeaderRules::default());
        assert_eq!(extraction.snapshot.len(), 1);
        assert_eq!(extraction.snapshot.get("10C").unwrap().get("9:00 AM"), Some("PE"));
        assert_eq!(extraction.stats.data_rows, 4);
        assert_eq!(extraction.stats.skipped_rows, 3);
    }

    #[test]
    fn entity_with_no_activities_is_kept() {
        let rows = vec![header(), RawRow::from(["10D", "", ""])];
        let snapshot = extract(&rows, 0, &slots());
        assert!(snapshot.get("10D").unwrap().is_empty());
    }

    #[test]
    fn later_duplicate_replaces_earlier_row() {
        let rows = vec![
            header(),
            RawRow::from(["10A", "Math", "Art"]),
            RawRow::from(["10A", "", "", "Music"]),
        ];
        let extraction = extract_grid(&rows, &HeaderRules::default());
        let schedule = extraction.snapshot.get("10A").unwrap();

        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.get("11:00 AM"), Some("Music"));
        assert_eq!(extraction.stats.duplicate_entities, vec!["10A".to_string()]);
    }

    #[test]
    fn rows_above_header_are_ignored() {
        let rows = vec![
            RawRow::from(["Timetable for today"]),
            RawRow::from(["Room", "9:00"]),
            RawRow::from(["101", "Chem"]),
        ];
        let extraction = extract_grid(&rows, &HeaderRules::default());
        assert_eq!(extraction.header.as_ref().unwrap().row_index, 1);
        assert_eq!(extraction.snapshot.entities().collect::<Vec<_>>(), vec!["101"]);
    }

    #[test]
    fn missing_header_is_empty_not_error() {
        let rows: Vec<RawRow> = (0..10).map(|i| RawRow::from(vec![format!("r{i}")])).collect();
        let extraction = extract_grid(&rows, &HeaderRules::default());
        assert!(!extraction.header_found());
        assert!(extraction.snapshot.is_empty());
        assert_eq!(extraction.stats.rows_total, 10);
        assert_eq!(extraction.stats.data_rows, 0);
    }

    #[test]
    fn header_with_only_blank_rows_below() {
        let rows = vec![header(), RawRow::from(["", "Math"])];
        let extraction = extract_grid(&rows, &HeaderRules::default());
        assert!(extraction.is_empty_below_header());
    }

    #[test]
    fn header_index_past_end_yields_nothing() {
        let rows = vec![header()];
        assert!(extract(&rows, 5, &slots()).is_empty());
    }
}
