//! `SQLite` schema definitions for emargement.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the events table.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    date TEXT NOT NULL,
    location TEXT,
    capacity INTEGER,
    description TEXT,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the participants table.
///
/// IDs are unique per event, compared case-insensitively.
pub const CREATE_PARTICIPANTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS participants (
    event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
    id TEXT NOT NULL COLLATE NOCASE,
    position INTEGER NOT NULL,
    nom TEXT NOT NULL DEFAULT '',
    prenom TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    company TEXT NOT NULL DEFAULT '',
    manager TEXT NOT NULL DEFAULT '',
    source TEXT NOT NULL,
    is_present INTEGER NOT NULL DEFAULT 0,
    presence_date TEXT,
    validation_mode TEXT,
    PRIMARY KEY (event_id, id)
)
";

/// SQL statement to create an index on event dates for listing.
pub const CREATE_EVENT_DATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_date ON events(date)
";

/// SQL statement to create an index keeping rosters in registration order.
pub const CREATE_PARTICIPANT_POSITION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_participants_position ON participants(event_id, position)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_EVENTS_TABLE,
    CREATE_PARTICIPANTS_TABLE,
    CREATE_EVENT_DATE_INDEX,
    CREATE_PARTICIPANT_POSITION_INDEX,
    CREATE_METADATA_TABLE,
];
