//! Roster import from spreadsheet files.
//!
//! A roster is read as rows of text, its headers are matched to participant
//! fields, and each data row becomes a participant. Rows without a name or
//! e-mail are skipped and IDs are deduplicated case-insensitively.

mod columns;
mod import;
mod reader;

pub use columns::{normalize_column_name, ColumnMatcher, RosterField};
pub use import::{import_file, import_rows, split_full_name, ImportReport};
pub use reader::read_rows;
