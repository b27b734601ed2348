//! Storage layer for emargement.
//!
//! This module provides `SQLite`-based persistent storage for events and
//! their rosters, plus JSON backups in the browser application's layout.

pub mod migrations;
pub mod schema;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::event::{Event, EVENT_DATE_FORMAT};
use crate::participant::{Participant, Source, ValidationMode};

/// Storage engine for events and participants.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Events ===

    /// Insert an event together with its roster.
    ///
    /// # Errors
    ///
    /// Returns an error if the event ID is taken or the database operation fails.
    pub fn insert_event(&mut self, event: &Event) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_event_rows(&tx, event)?;
        tx.commit()?;

        debug!(event_id = %event.id, participants = event.participants.len(), "Inserted event");
        Ok(())
    }

    /// Get an event and its roster.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let event = self
            .conn
            .query_row(
                r"
                SELECT id, name, date, location, capacity, description, created_at
                FROM events WHERE id = ?1
                ",
                [id],
                Self::row_to_event,
            )
            .optional()?;

        match event {
            Some(mut event) => {
                event.participants = self.load_participants(&event.id)?;
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    /// Get an event, failing if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventNotFound`] if there is no such event.
    pub fn require_event(&self, id: &str) -> Result<Event> {
        self.get_event(id)?
            .ok_or_else(|| Error::event_not_found(id))
    }

    /// List every event with its roster, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_events(&self) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, name, date, location, capacity, description, created_at
            FROM events ORDER BY created_at ASC, rowid ASC
            ",
        )?;

        let mut events = stmt
            .query_map([], Self::row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for event in &mut events {
            event.participants = self.load_participants(&event.id)?;
        }
        Ok(events)
    }

    /// Update an event's details; the roster is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventNotFound`] if there is no such event.
    pub fn update_event(&self, event: &Event) -> Result<()> {
        let affected = self.conn.execute(
            r"
            UPDATE events SET name = ?2, date = ?3, location = ?4, capacity = ?5, description = ?6
            WHERE id = ?1
            ",
            params![
                event.id,
                event.name,
                event.date.format(EVENT_DATE_FORMAT).to_string(),
                event.location,
                event.capacity,
                event.description,
            ],
        )?;

        if affected == 0 {
            return Err(Error::event_not_found(&event.id));
        }
        debug!(event_id = %event.id, "Updated event");
        Ok(())
    }

    /// Delete an event and its roster.
    ///
    /// Returns `true` if an event was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_event(&self, id: &str) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    // === Participants ===

    /// Append participants to an event's roster, in order.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventNotFound`] if there is no such event, or a query
    /// error if an ID is already on the roster (nothing is written then).
    pub fn insert_participants(
        &mut self,
        event_id: &str,
        participants: &[Participant],
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;

        let exists: bool = tx
            .query_row("SELECT 1 FROM events WHERE id = ?1", [event_id], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(Error::event_not_found(event_id));
        }

        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM participants WHERE event_id = ?1",
            [event_id],
            |row| row.get(0),
        )?;
        for (position, participant) in (next..).zip(participants) {
            insert_participant_row(&tx, event_id, position, participant)?;
        }
        tx.commit()?;

        debug!(event_id, count = participants.len(), "Inserted participants");
        Ok(participants.len())
    }

    /// Persist a participant's details and presence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParticipantNotFound`] if the participant is not on the roster.
    pub fn save_participant(&self, event_id: &str, participant: &Participant) -> Result<()> {
        let affected = self.conn.execute(
            r"
            UPDATE participants SET
                nom = ?3, prenom = ?4, email = ?5, company = ?6, manager = ?7,
                source = ?8, is_present = ?9, presence_date = ?10, validation_mode = ?11
            WHERE event_id = ?1 AND id = ?2
            ",
            params![
                event_id,
                participant.id,
                participant.last_name,
                participant.first_name,
                participant.email,
                participant.company,
                participant.manager,
                participant.source.to_string(),
                participant.is_present,
                participant.presence_date.map(|d| d.to_rfc3339()),
                participant.validation_mode.map(|m| m.to_string()),
            ],
        )?;

        if affected == 0 {
            return Err(Error::participant_not_found(event_id, &participant.id));
        }
        Ok(())
    }

    /// Remove a participant from a roster.
    ///
    /// Returns `true` if a participant was removed, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_participant(&self, event_id: &str, participant_id: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "DELETE FROM participants WHERE event_id = ?1 AND id = ?2",
            [event_id, participant_id],
        )?;
        Ok(affected > 0)
    }

    fn load_participants(&self, event_id: &str) -> Result<Vec<Participant>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, nom, prenom, email, company, manager, source,
                   is_present, presence_date, validation_mode
            FROM participants WHERE event_id = ?1 ORDER BY position ASC
            ",
        )?;

        let participants = stmt
            .query_map([event_id], Self::row_to_participant)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(participants)
    }

    // === Maintenance ===

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let events: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        let (participants, present): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(is_present), 0) FROM participants",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            events,
            participants,
            present,
            db_size_bytes,
        })
    }

    /// Dump every event as JSON, in the browser application's storage layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation or serialization fails.
    pub fn export_json(&self) -> Result<String> {
        let events = self.list_events()?;
        Ok(serde_json::to_string_pretty(&events)?)
    }

    /// Merge a JSON dump into the database.
    ///
    /// Events whose ID already exists are skipped. Within an event, a
    /// participant ID repeated (ignoring case) keeps its first occurrence.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the database operation
    /// fails; nothing is written then.
    pub fn import_json(&mut self, json: &str) -> Result<BackupImport> {
        let events: Vec<Event> = serde_json::from_str(json)?;
        let mut summary = BackupImport::default();

        let tx = self.conn.transaction()?;
        for mut event in events {
            let exists: bool = tx
                .query_row("SELECT 1 FROM events WHERE id = ?1", [&event.id], |_| Ok(true))
                .optional()?
                .unwrap_or(false);
            if exists {
                debug!(event_id = %event.id, "Skipping existing event");
                summary.skipped_events += 1;
                continue;
            }

            event.location = event.location.filter(|l| !l.trim().is_empty());
            event.description = event.description.filter(|d| !d.trim().is_empty());

            let before = event.participants.len();
            let mut seen = HashSet::new();
            event
                .participants
                .retain(|p| seen.insert(p.id.to_lowercase()));
            let dropped = before - event.participants.len();
            if dropped > 0 {
                warn!(event_id = %event.id, dropped, "Dropped repeated participant IDs");
            }

            insert_event_rows(&tx, &event)?;
            summary.imported_events += 1;
            summary.imported_participants += event.participants.len();
        }
        tx.commit()?;

        info!(
            imported = summary.imported_events,
            skipped = summary.skipped_events,
            "Imported backup"
        );
        Ok(summary)
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
        let date_str: String = row.get(2)?;
        let created_str: String = row.get(6)?;

        let date = NaiveDateTime::parse_from_str(&date_str, EVENT_DATE_FORMAT)
            .map_err(|e| conversion_error(2, e))?;
        let created_at = DateTime::parse_from_rfc3339(&created_str)
            .map_err(|e| conversion_error(6, e))?
            .with_timezone(&Utc);

        Ok(Event {
            id: row.get(0)?,
            name: row.get(1)?,
            date,
            location: row.get(3)?,
            capacity: row.get(4)?,
            description: row.get(5)?,
            created_at,
            participants: Vec::new(),
        })
    }

    fn row_to_participant(row: &rusqlite::Row) -> rusqlite::Result<Participant> {
        let source_str: String = row.get(6)?;
        let presence_str: Option<String> = row.get(8)?;
        let mode_str: Option<String> = row.get(9)?;

        let source = source_str.parse().unwrap_or_else(|_| {
            warn!("Unknown participant source: {}, defaulting to import", source_str);
            Source::Import
        });
        let presence_date = presence_str
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
            .transpose()
            .map_err(|e| conversion_error(8, e))?;
        let validation_mode = mode_str.and_then(|s| match s.parse::<ValidationMode>() {
            Ok(mode) => Some(mode),
            Err(_) => {
                warn!("Unknown validation mode: {}, ignoring", s);
                None
            }
        });

        Ok(Participant {
            id: row.get(0)?,
            last_name: row.get(1)?,
            first_name: row.get(2)?,
            email: row.get(3)?,
            company: row.get(4)?,
            manager: row.get(5)?,
            source,
            is_present: row.get(7)?,
            presence_date,
            validation_mode,
        })
    }
}

fn conversion_error(column: usize, err: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn insert_event_rows(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO events (id, name, date, location, capacity, description, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ",
        params![
            event.id,
            event.name,
            event.date.format(EVENT_DATE_FORMAT).to_string(),
            event.location,
            event.capacity,
            event.description,
            event.created_at.to_rfc3339(),
        ],
    )?;

    for (position, participant) in (0i64..).zip(&event.participants) {
        insert_participant_row(conn, &event.id, position, participant)?;
    }
    Ok(())
}

fn insert_participant_row(
    conn: &Connection,
    event_id: &str,
    position: i64,
    participant: &Participant,
) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO participants (
            event_id, id, position, nom, prenom, email, company, manager,
            source, is_present, presence_date, validation_mode
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ",
        params![
            event_id,
            participant.id,
            position,
            participant.last_name,
            participant.first_name,
            participant.email,
            participant.company,
            participant.manager,
            participant.source.to_string(),
            participant.is_present,
            participant.presence_date.map(|d| d.to_rfc3339()),
            participant.validation_mode.map(|m| m.to_string()),
        ],
    )?;
    Ok(())
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    /// Number of events.
    pub events: i64,
    /// Number of registered participants across all events.
    pub participants: i64,
    /// Number of signed-in participants across all events.
    pub present: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Outcome of merging a JSON backup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackupImport {
    /// Events added.
    pub imported_events: usize,
    /// Participants added with those events.
    pub imported_participants: usize,
    /// Events skipped because their ID already existed.
    pub skipped_events: usize,
}
