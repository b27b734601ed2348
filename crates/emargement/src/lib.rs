//! `emargement` - Event attendance tracking
//!
//! This library provides the core functionality for managing events, importing
//! participant rosters from spreadsheets, checking participants in and
//! exporting attendance sheets, with all data kept in a local `SQLite` database.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod attendance;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod export;
pub mod format;
pub mod logging;
pub mod participant;
pub mod roster;
pub mod storage;
pub mod tracker;

pub use attendance::{AttendanceStats, ScanOutcome};
pub use config::Config;
pub use error::{Error, Result};
pub use event::{Event, EventDraft, EventStatus, EventUpdate};
pub use export::ExportFormat;
pub use logging::init_logging;
pub use participant::{Participant, ParticipantDraft, ParticipantFilter, Source, ValidationMode};
pub use roster::{ColumnMatcher, ImportReport, RosterField};
pub use storage::{BackupImport, Storage, StorageStats};
pub use tracker::Tracker;
