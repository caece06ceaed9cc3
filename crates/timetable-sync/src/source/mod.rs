//! Sheet sources
//!
//! A source yields the sheet as header-less, ragged rows. Nothing about the
//! layout is assumed here; finding the header is the grid normalizer's job.

mod file;
mod http;

pub use file::FileCsvSource;
pub use http::HttpCsvSource;

use crate::error::FetchError;
use timetable_grid::RawRow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Where rows come from
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SheetSource: Send + Sync {
    /// Fetch every row of the sheet
    ///
    /// # Errors
    /// Returns [`FetchError`] on transport, status or decoding failure
    async fn fetch_rows(&self) -> Result<Vec<RawRow>, FetchError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Decode CSV bytes into raw rows
///
/// No row is treated as a header and rows may differ in length. Invalid
/// UTF-8 is replaced rather than rejected; a leading byte-order mark is
/// dropped.
///
/// # Errors
/// Returns [`FetchError::Csv`] if the input is not parseable as CSV
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<RawRow>, FetchError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows: Vec<RawRow> = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| String::from_utf8_lossy(cell).into_owned())
                .collect(),
        );
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_rows_are_kept() {
        let rows = parse_csv(b"Class,9:00,10:00\n10A,Math\n10B,,Art,extra\n").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], RawRow::from(["10A", "Math"]));
        assert_eq!(rows[2], RawRow::from(["10B", "", "Art", "extra"]));
    }

    #[test]
    fn first_row_is_data() {
        let rows = parse_csv(b"a,b\n").unwrap();
        assert_eq!(rows, vec![RawRow::from(["a", "b"])]);
    }

    #[test]
    fn quoted_cells_and_bom() {
        let rows = parse_csv(b"\xEF\xBB\xBFClass,\"9:00, AM\"\n\"10/A\",\"Math \"\"H\"\"\"\n").unwrap();
        assert_eq!(rows[0], RawRow::from(["Class", "9:00, AM"]));
        assert_eq!(rows[1], RawRow::from(["10/A", "Math \"H\""]));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let rows = parse_csv(b"Class,\xFF\n").unwrap();
        assert_eq!(rows[0].cell(1), Some("\u{FFFD}"));
    }

    #[test]
    fn empty_input_has_no_rows() {
        assert!(parse_csv(b"").unwrap().is_empty());
    }
}
