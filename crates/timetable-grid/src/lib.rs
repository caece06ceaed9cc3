//! Timetable Grid - spreadsheet rows to per-entity schedules
//!
//! Turns the raw, header-less rows of a human-edited spreadsheet into a
//! [`ScheduleSnapshot`]:
//! - Locates the header row among the first few rows by keyword
//! - Classifies header cells into identifier and time-slot columns
//! - Maps ragged data rows into per-entity schedules
//! - Fingerprints snapshots for change detection
//!
//! # Example
//!
//! ```rust
//! use timetable_grid::{extract_grid, HeaderRules, RawRow};
//!
//! let rows = vec![
//!     RawRow::from(["Class", "9:00 AM", "10:00 AM"]),
//!     RawRow::from(["10A", "Math", "Physics"]),
//! ];
//!
//! let extraction = extract_grid(&rows, &HeaderRules::default());
//! let schedule = extraction.snapshot.get("10A").unwrap();
//! assert_eq!(schedule.get("9:00 AM"), Some("Math"));
//! ```

#![warn(unreachable_pub)]

pub mod extract;
pub mod fingerprint;
pub mod normalize;
pub mod row;
pub mod schedule;

pub use extract::{extract, extract_from_header, extract_grid, Extraction, ExtractionStats};
pub use fingerprint::{Fingerprint, FingerprintError};
pub use normalize::{
    classify_time_slots, locate_header, normalize, normalize_with, GridHeader, HeaderRules,
    HEADER_KEYWORDS, HEADER_SCAN_LIMIT, MIN_GRID_ROWS,
};
pub use row::RawRow;
pub use schedule::{EntitySchedule, ScheduleSnapshot, TimeSlot};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
