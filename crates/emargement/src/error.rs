//! Error types for emargement.
//!
//! This module defines all error types used throughout the emargement crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for emargement operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Event Errors ===
    /// No event with the given ID exists.
    #[error("event not found: {id}")]
    EventNotFound {
        /// The requested event ID.
        id: String,
    },

    /// Event data failed validation.
    #[error("invalid event: {message}")]
    InvalidEvent {
        /// Description of the validation failure.
        message: String,
    },

    // === Participant Errors ===
    /// No participant with the given ID exists in the event.
    #[error("participant '{participant_id}' not found in event {event_id}")]
    ParticipantNotFound {
        /// The event that was searched.
        event_id: String,
        /// The requested participant ID.
        participant_id: String,
    },

    /// A participant with the same ID is already registered.
    #[error("participant '{participant_id}' is already registered for event {event_id}")]
    DuplicateParticipant {
        /// The event the participant was added to.
        event_id: String,
        /// The conflicting participant ID.
        participant_id: String,
    },

    /// Participant data failed validation.
    #[error("invalid participant: {message}")]
    InvalidParticipant {
        /// Description of the validation failure.
        message: String,
    },

    /// A blank participant ID was submitted for check-in.
    #[error("participant ID is empty")]
    EmptyParticipantId,

    /// A simulated scan found no absent participant left.
    #[error("all participants are already present")]
    AllPresent,

    // === Roster Errors ===
    /// The roster file has no data rows.
    #[error("roster file is empty or has no data rows")]
    RosterEmpty,

    /// The roster file extension is not supported.
    #[error("unsupported roster format: {path}")]
    UnsupportedFormat {
        /// Path of the rejected file.
        path: PathBuf,
    },

    /// A spreadsheet could not be read.
    #[error("failed to read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// A CSV file could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Export Errors ===
    /// The selection to export is empty.
    #[error("no participants to export")]
    NothingToExport,

    /// Writing the XLSX workbook failed.
    #[error("failed to write workbook: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for emargement operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an event-not-found error.
    #[must_use]
    pub fn event_not_found(id: impl Into<String>) -> Self {
        Self::EventNotFound { id: id.into() }
    }

    /// Create an invalid event error.
    #[must_use]
    pub fn invalid_event(message: impl Into<String>) -> Self {
        Self::InvalidEvent {
            message: message.into(),
        }
    }

    /// Create an invalid participant error.
    #[must_use]
    pub fn invalid_participant(message: impl Into<String>) -> Self {
        Self::InvalidParticipant {
            message: message.into(),
        }
    }

    /// Create a participant-not-found error.
    #[must_use]
    pub fn participant_not_found(
        event_id: impl Into<String>,
        participant_id: impl Into<String>,
    ) -> Self {
        Self::ParticipantNotFound {
            event_id: event_id.into(),
            participant_id: participant_id.into(),
        }
    }

    /// Create a duplicate participant error.
    #[must_use]
    pub fn duplicate_participant(
        event_id: impl Into<String>,
        participant_id: impl Into<String>,
    ) -> Self {
        Self::DuplicateParticipant {
            event_id: event_id.into(),
            participant_id: participant_id.into(),
        }
    }

    /// Check if this error means a lookup found nothing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EventNotFound { .. } | Self::ParticipantNotFound { .. }
        )
    }

    /// Check if this error is a user-facing warning rather than a failure.
    ///
    /// These are the conditions the check-in and export screens report as
    /// warnings: nothing left to scan, or nothing to export.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::AllPresent | Self::NothingToExport)
    }
}
