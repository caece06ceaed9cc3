//! Grid normalization
//!
//! Spreadsheet exports carry titles, notes and blank lines above the real
//! header, so the header row is found heuristically: the first of the
//! leading rows whose text mentions a header keyword. Column 0 always holds
//! the entity identifier; every other non-blank header cell is a time slot.

use crate::row::RawRow;
use crate::schedule::TimeSlot;
use serde::{Deserialize, Serialize};

/// Keywords that mark a header row (matched case-insensitively as substrings)
pub const HEADER_KEYWORDS: [&str; 3] = ["room", "class", "grade"];

/// Number of leading rows searched for the header
pub const HEADER_SCAN_LIMIT: usize = 5;

/// A grid needs a header and at least one data row
pub const MIN_GRID_ROWS: usize = 2;

/// Header detection rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRules {
    keywords: Vec<String>,
    scan_limit: usize,
}

impl HeaderRules {
    /// Rules matching any of `keywords`
    ///
    /// Keywords are lower-cased and trimmed; blank keywords are dropped since
    /// an empty substring would match every row.
    #[must_use]
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            scan_limit: HEADER_SCAN_LIMIT,
        }
    }

    /// Override the number of leading rows searched
    #[inline]
    #[must_use]
    pub fn with_scan_limit(mut self, scan_limit: usize) -> Self {
        self.scan_limit = scan_limit;
        self
    }

    /// Configured keywords (lower case)
    #[inline]
    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Configured scan limit
    #[inline]
    #[must_use]
    pub fn scan_limit(&self) -> usize {
        self.scan_limit
    }

    /// True if `row` looks like a header under these rules
    #[must_use]
    pub fn matches(&self, row: &RawRow) -> bool {
        let text = row.joined().to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// Index of the first header-like row within the scan limit
    #[must_use]
    pub fn locate(&self, rows: &[RawRow]) -> Option<usize> {
        rows.iter()
            .take(self.scan_limit)
            .position(|row| self.matches(row))
    }
}

impl Default for HeaderRules {
    fn default() -> Self {
        Self::new(HEADER_KEYWORDS)
    }
}

/// Where the header sits and which columns are time slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridHeader {
    /// Zero-based index of the header row
    pub row_index: usize,
    /// Time-slot columns, left to right
    pub time_slots: Vec<TimeSlot>,
}

/// Find the header row using the default keywords
#[inline]
#[must_use]
pub fn locate_header(rows: &[RawRow]) -> Option<usize> {
    HeaderRules::default().locate(rows)
}

/// Classify header cells after column 0 into time slots
///
/// Blank header cells are skipped silently; trailing empty columns are
/// routine in exported sheets.
#[must_use]
pub fn classify_time_slots(header: &RawRow) -> Vec<TimeSlot> {
    (1..header.len())
        .filter_map(|index| {
            header
                .trimmed_cell(index)
                .map(|label| TimeSlot::new(index, label))
        })
        .collect()
}

/// Normalize with the default rules
#[inline]
#[must_use]
pub fn normalize(rows: &[RawRow]) -> Option<GridHeader> {
    normalize_with(rows, &HeaderRules::default())
}

/// Locate the header and classify its time slots
///
/// Returns `None` when there are fewer than [`MIN_GRID_ROWS`] rows (no scan
/// is attempted) or when no header-like row is found.
#[must_use]
pub fn normalize_with(rows: &[RawRow], rules: &HeaderRules) -> Option<GridHeader> {
    if rows.len() < MIN_GRID_ROWS {
        return None;
    }

    let row_index = rules.locate(rows)?;
    Some(GridHeader {
        row_index,
        time_slots: classify_time_slots(&rows[row_index]),
    })
}
