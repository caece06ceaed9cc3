//! Positional spreadsheet rows
//!
//! A [`RawRow`] is exactly what the CSV source yields: an ordered list of
//! cells with no column names. Rows are ragged; reading past the end of a
//! row yields an absent cell rather than an error.

use serde::{Deserialize, Serialize};

/// One row of header-less tabular input
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRow(Vec<String>);

impl RawRow {
    /// Create a row from its cells
    #[inline]
    #[must_use]
    pub fn new(cells: Vec<String>) -> Self {
        Self(cells)
    }

    /// All cells, left to right
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[String] {
        &self.0
    }

    /// Number of cells present in this row
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the row has no cells at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw cell at `index`, `None` when the row is shorter
    #[inline]
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Trimmed cell at `index`, `None` when absent or blank
    #[inline]
    #[must_use]
    pub fn trimmed_cell(&self, index: usize) -> Option<&str> {
        self.cell(index)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// All cells joined with a single space
    #[must_use]
    pub fn joined(&self) -> String {
        self.0.join(" ")
    }

    /// Consume the row, returning its cells
    #[inline]
    #[must_use]
    pub fn into_cells(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for RawRow {
    fn from(cells: Vec<String>) -> Self {
        Self(cells)
    }
}

impl From<Vec<&str>> for RawRow {
    fn from(cells: Vec<&str>) -> Self {
        cells.into_iter().collect()
    }
}

impl<const N: usize> From<[&str; N]> for RawRow {
    fn from(cells: [&str; N]) -> Self {
        cells.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for RawRow {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_past_end_is_absent() {
        let row = RawRow::from(["10A", "Math"]);
        assert_eq!(row.cell(1), Some("Math"));
        assert_eq!(row.cell(2), None);
    }

    #[test]
    fn trimmed_cell_filters_blank() {
        let row = RawRow::from(["  10A ", "   ", ""]);
        assert_eq!(row.trimmed_cell(0), Some("10A"));
        assert_eq!(row.trimmed_cell(1), None);
        assert_eq!(row.trimmed_cell(2), None);
        assert_eq!(row.trimmed_cell(7), None);
    }

    #[test]
    fn joined_uses_single_space() {
        let row = RawRow::from(["Class", "", "9:00"]);
        assert_eq!(row.joined(), "Class  9:00");
    }

    #[test]
    fn serde_is_a_plain_array() {
        let row = RawRow::from(["a", "b"]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["a","b"]"#);
    }
}
