//! Attendance tracker service.
//!
//! [`Tracker`] ties the storage layer to the event, roster, check-in and
//! export operations. Each operation loads the event it works on, applies the
//! change in memory and persists only the rows that changed.

use std::path::{Path, PathBuf};

use chrono::Local;
use rand::Rng;
use tracing::{info, warn};

use crate::attendance::{self, AttendanceStats, ScanOutcome};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::event::{Event, EventDraft, EventStatus, EventUpdate};
use crate::export::{self, ExportFormat};
use crate::participant::{Participant, ParticipantDraft, ParticipantFilter, ValidationMode};
use crate::roster::{self, ColumnMatcher, ImportReport};
use crate::storage::{BackupImport, Storage, StorageStats};

/// Event attendance tracker.
#[derive(Debug)]
pub struct Tracker {
    storage: Storage,
    config: Config,
    matcher: ColumnMatcher,
}

impl Tracker {
    /// Create a tracker over an open storage.
    #[must_use]
    pub fn new(storage: Storage, config: Config) -> Self {
        let matcher = ColumnMatcher::with_config(&config.import);
        Self {
            storage,
            config,
            matcher,
        }
    }

    /// Open the database named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(config: Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        Ok(Self::new(storage, config))
    }

    /// The underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    // === Events ===

    /// Create an event, optionally loading its roster from a file.
    ///
    /// The roster is read before anything is written, so an unreadable file
    /// leaves no event behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the draft is invalid, the roster cannot be
    /// imported, or the database operation fails.
    pub fn create_event(
        &mut self,
        draft: EventDraft,
        roster: Option<&Path>,
    ) -> Result<(Event, Option<ImportReport>)> {
        let mut event = Event::from_draft(draft)?;

        let report = match roster {
            Some(path) => {
                let report = roster::import_file(path, &self.matcher, &[])?;
                event.participants.clone_from(&report.participants);
                Some(report)
            }
            None => None,
        };

        self.storage.insert_event(&event)?;
        warn_if_over_capacity(&event);
        info!(
            event_id = %event.id,
            name = %event.name,
            participants = event.participants.len(),
            "Created event"
        );
        Ok((event, report))
    }

    /// Get an event by ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventNotFound`] if there is no such event.
    pub fn event(&self, id: &str) -> Result<Event> {
        self.storage.require_event(id)
    }

    /// List events whose name contains `search`, optionally with a given status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_events(&self, search: &str, status: Option<EventStatus>) -> Result<Vec<Event>> {
        Ok(self
            .storage
            .list_events()?
            .into_iter()
            .filter(|e| e.matches_listing(search, status))
            .collect())
    }

    /// Change an event's details.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventNotFound`] or [`Error::InvalidEvent`].
    pub fn update_event(&mut self, id: &str, update: EventUpdate) -> Result<Event> {
        let mut event = self.event(id)?;
        event.apply(update)?;
        self.storage.update_event(&event)?;

        warn_if_over_capacity(&event);
        info!(event_id = %event.id, "Updated event");
        Ok(event)
    }

    /// Delete an event and its roster.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventNotFound`] if there is no such event.
    pub fn delete_event(&mut self, id: &str) -> Result<()> {
        if !self.storage.delete_event(id)? {
            return Err(Error::event_not_found(id));
        }
        info!(event_id = %id, "Deleted event");
        Ok(())
    }

    /// Attendance counters for an event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventNotFound`] if there is no such event.
    pub fn stats(&self, event_id: &str) -> Result<AttendanceStats> {
        Ok(self.event(event_id)?.stats())
    }

    /// Database-wide counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn storage_stats(&self) -> Result<StorageStats> {
        self.storage.stats()
    }

    // === Roster ===

    /// Merge a roster file into an existing event.
    ///
    /// IDs already on the roster are counted as duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EventNotFound`], a roster error, or a database error.
    pub fn import_roster(&mut self, event_id: &str, path: &Path) -> Result<ImportReport> {
        let mut event = self.event(event_id)?;
        let report = roster::import_file(path, &self.matcher, &event.participants)?;
        self.storage
            .insert_participants(&event.id, &report.participants)?;

        event.participants.extend(report.participants.iter().cloned());
        warn_if_over_capacity(&event);
        info!(event_id = %event.id, summary = %report.summary(), "Merged roster");
        Ok(report)
    }

    /// Register a participant on site.
    ///
    /// Family name, given name and e-mail are required.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParticipant`], [`Error::DuplicateParticipant`]
    /// or [`Error::EventNotFound`].
    pub fn add_participant(
        &mut self,
        event_id: &str,
        draft: ParticipantDraft,
        mark_present: bool,
    ) -> Result<Participant> {
        draft.validate_complete()?;
        let mut event = self.event(event_id)?;
        let participant = attendance::add_participant(&mut event, draft, mark_present)?;
        self.storage
            .insert_participants(&event.id, std::slice::from_ref(&participant))?;

        info!(event_id = %event.id, participant_id = %participant.id, "Added participant");
        Ok(participant)
    }

    /// Remove a participant from an event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParticipantNotFound`] or [`Error::EventNotFound`].
    pub fn remove_participant(&mut self, event_id: &str, participant_id: &str) -> Result<Participant> {
        let mut event = self.event(event_id)?;
        let removed = attendance::remove_participant(&mut event, participant_id)?;
        self.storage.remove_participant(&event.id, &removed.id)?;

        info!(event_id = %event.id, participant_id = %removed.id, "Removed participant");
        Ok(removed)
    }

    // === Check-in ===

    /// Check a participant in by ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyParticipantId`] or [`Error::EventNotFound`].
    pub fn check_in(
        &mut self,
        event_id: &str,
        raw_id: &str,
        mode: ValidationMode,
        add_unknown: bool,
    ) -> Result<ScanOutcome> {
        let mut event = self.event(event_id)?;
        let outcome = attendance::check_in(&mut event, raw_id, mode, add_unknown)?;
        self.persist_outcome(&event, &outcome)?;
        Ok(outcome)
    }

    /// Simulate a QR scan of a random absent participant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllPresent`] when nobody is left, or [`Error::EventNotFound`].
    pub fn simulate_scan(&mut self, event_id: &str) -> Result<ScanOutcome> {
        self.simulate_scan_with(event_id, &mut rand::rng())
    }

    /// [`Tracker::simulate_scan`] with a given random source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllPresent`] when nobody is left, or [`Error::EventNotFound`].
    pub fn simulate_scan_with<R: Rng>(&mut self, event_id: &str, rng: &mut R) -> Result<ScanOutcome> {
        let mut event = self.event(event_id)?;
        let outcome = attendance::simulate_scan(&mut event, rng)?;
        self.persist_outcome(&event, &outcome)?;
        Ok(outcome)
    }

    /// Set or clear a participant's presence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParticipantNotFound`] or [`Error::EventNotFound`].
    pub fn set_presence(
        &mut self,
        event_id: &str,
        participant_id: &str,
        present: bool,
        mode: ValidationMode,
    ) -> Result<Participant> {
        let mut event = self.event(event_id)?;
        let participant = attendance::set_presence(&mut event, participant_id, present, mode)?;
        self.storage.save_participant(&event.id, &participant)?;

        info!(
            event_id = %event.id,
            participant_id = %participant.id,
            present,
            "Changed presence"
        );
        Ok(participant)
    }

    fn persist_outcome(&mut self, event: &Event, outcome: &ScanOutcome) -> Result<()> {
        match outcome {
            ScanOutcome::CheckedIn { participant } => {
                self.storage.save_participant(&event.id, participant)?;
                info!(
                    event_id = %event.id,
                    participant_id = %participant.id,
                    mode = ?participant.validation_mode,
                    "Checked in"
                );
            }
            ScanOutcome::Added { participant } => {
                self.storage
                    .insert_participants(&event.id, std::slice::from_ref(participant))?;
                info!(
                    event_id = %event.id,
                    participant_id = %participant.id,
                    "Registered and checked in unknown ID"
                );
            }
            ScanOutcome::AlreadyPresent { .. } | ScanOutcome::Unknown { .. } => {}
        }
        Ok(())
    }

    // === Export and backup ===

    /// Export part of an event's roster.
    ///
    /// The format defaults to `export.default_format` and the directory to
    /// `export.directory`, then the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NothingToExport`] if the selection is empty, or a
    /// writer error.
    pub fn export(
        &self,
        event_id: &str,
        filter: ParticipantFilter,
        format: Option<ExportFormat>,
        out_dir: Option<&Path>,
    ) -> Result<PathBuf> {
        let event = self.event(event_id)?;
        let format = format.unwrap_or(self.config.export.default_format);
        let dir = out_dir.map_or_else(|| self.config.export_dir(), Path::to_path_buf);
        export::export_event(&event, filter, format, &dir, Local::now().date_naive())
    }

    /// Write a JSON backup of every event.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the database or writing the file fails.
    pub fn backup_export(&self, path: &Path) -> Result<()> {
        let json = self.storage.export_json()?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Wrote backup");
        Ok(())
    }

    /// Merge a JSON backup, skipping events that already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn backup_import(&mut self, path: &Path) -> Result<BackupImport> {
        let json = std::fs::read_to_string(path)?;
        self.storage.import_json(&json)
    }
}

fn warn_if_over_capacity(event: &Event) {
    if event.over_capacity() {
        warn!(
            event_id = %event.id,
            capacity = ?event.capacity,
            registered = event.participants.len(),
            "Event is over capacity"
        );
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::event::parse_event_date;
    use crate::logging::init_test_logging;

    fn create_test_tracker() -> Tracker {
        init_test_logging();
        Tracker::new(Storage::open_in_memory().unwrap(), Config::default())
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("emargement_tracker_{}_{name}", std::process::id()))
    }

    fn draft(name: &str) -> EventDraft {
        EventDraft::new(name, parse_event_date("2025-03-14T09:00").unwrap())
    }

    fn write_roster(name: &str, content: &str) -> PathBuf {
        let path = temp_path(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_create_event_with_roster() {
        let mut tracker = create_test_tracker();
        let path = write_roster(
            "create.csv",
            "ID;Nom;Prénom;Email\nA-1;Martin;Claire;c@example.fr\nA-2;Durand;Paul;p@example.fr\n",
        );

        let (event, report) = tracker.create_event(draft("Formation"), Some(&path)).unwrap();
        assert_eq!(report.unwrap().imported, 2);
        assert_eq!(tracker.event(&event.id).unwrap().participants.len(), 2);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_create_event_with_empty_roster_creates_nothing() {
        let mut tracker = create_test_tracker();
        let path = write_roster("empty.csv", "ID;Nom\n");

        let err = tracker.create_event(draft("Formation"), Some(&path)).unwrap_err();
        assert!(matches!(err, Error::RosterEmpty));
        assert!(tracker.list_events("", None).unwrap().is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_roster_over_capacity_is_kept() {
        let mut tracker = create_test_tracker();
        let path = write_roster("capacity.csv", "ID;Nom\nA-1;Martin\nA-2;Durand\n");

        let (event, report) = tracker
            .create_event(
                EventDraft {
                    capacity: Some(1),
                    ..draft("Atelier")
                },
                Some(&path),
            )
            .unwrap();
        assert_eq!(report.unwrap().imported, 2);
        let stored = tracker.event(&event.id).unwrap();
        assert_eq!(stored.participants.len(), 2);
        assert!(stored.over_capacity());

        let (small, _) = tracker
            .create_event(
                EventDraft {
                    capacity: Some(1),
                    ..draft("Atelier bis")
                },
                None,
            )
            .unwrap();
        assert!(!tracker.event(&small.id).unwrap().over_capacity());
        assert_eq!(tracker.import_roster(&small.id, &path).unwrap().imported, 2);
        let stored = tracker.event(&small.id).unwrap();
        assert_eq!(stored.participants.len(), 2);
        assert!(stored.over_capacity());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_import_roster_merges_and_dedups() {
        let mut tracker = create_test_tracker();
        let (event, _) = tracker.create_event(draft("Atelier"), None).unwrap();
        let path = write_roster("merge.csv", "ID,Nom\nA-1,Martin\nA-2,Durand\n");

        assert_eq!(tracker.import_roster(&event.id, &path).unwrap().imported, 2);
        let again = tracker.import_roster(&event.id, &path).unwrap();
        assert_eq!(again.imported, 0);
        assert_eq!(again.duplicates, 2);
        assert_eq!(tracker.stats(&event.id).unwrap().total, 2);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_check_in_persists() {
        let mut tracker = create_test_tracker();
        let (event, _) = tracker.create_event(draft("Atelier"), None).unwrap();
        tracker
            .add_participant(
                &event.id,
                ParticipantDraft {
                    id: Some("QR-42".to_string()),
                    last_name: "Martin".to_string(),
                    first_name: "Claire".to_string(),
                    email: "c@example.fr".to_string(),
                    ..ParticipantDraft::default()
                },
                false,
            )
            .unwrap();

        let outcome = tracker
            .check_in(&event.id, "qr-42", ValidationMode::Qr, false)
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::CheckedIn { .. }));

        let outcome = tracker
            .check_in(&event.id, "QR-42", ValidationMode::Qr, false)
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::AlreadyPresent { .. }));

        let stats = tracker.stats(&event.id).unwrap();
        assert_eq!(stats.present, 1);
        assert_eq!(stats.rate, 100);
    }

    #[test]
    fn test_check_in_unknown_added_persists() {
        let mut tracker = create_test_tracker();
        let (event, _) = tracker.create_event(draft("Atelier"), None).unwrap();

        let outcome = tracker
            .check_in(&event.id, "NEW-1", ValidationMode::Qr, false)
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::Unknown { .. }));
        assert_eq!(tracker.stats(&event.id).unwrap().total, 0);

        let outcome = tracker
            .check_in(&event.id, "NEW-1", ValidationMode::Qr, true)
            .unwrap();
        assert!(matches!(outcome, ScanOutcome::Added { .. }));
        assert_eq!(tracker.stats(&event.id).unwrap().present, 1);
    }

    #[test]
    fn test_simulate_scan_until_done() {
        let mut tracker = create_test_tracker();
        let (event, _) = tracker.create_event(draft("Atelier"), None).unwrap();
        let path = write_roster("scan.csv", "ID;Nom\nA;Un\nB;Deux\n");
        tracker.import_roster(&event.id, &path).unwrap();

        let mut rng = StdRng::seed_from_u64(3);
        tracker.simulate_scan_with(&event.id, &mut rng).unwrap();
        tracker.simulate_scan_with(&event.id, &mut rng).unwrap();
        let err = tracker.simulate_scan_with(&event.id, &mut rng).unwrap_err();
        assert!(matches!(err, Error::AllPresent));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_set_presence_and_remove() {
        let mut tracker = create_test_tracker();
        let (event, _) = tracker.create_event(draft("Atelier"), None).unwrap();
        let path = write_roster("presence.csv", "ID;Nom\nA;Un\n");
        tracker.import_roster(&event.id, &path).unwrap();

        tracker
            .set_presence(&event.id, "a", true, ValidationMode::Manual)
            .unwrap();
        assert_eq!(tracker.stats(&event.id).unwrap().present, 1);
        tracker
            .set_presence(&event.id, "A", false, ValidationMode::Manual)
            .unwrap();
        assert_eq!(tracker.stats(&event.id).unwrap().present, 0);

        tracker.remove_participant(&event.id, "a").unwrap();
        assert_eq!(tracker.stats(&event.id).unwrap().total, 0);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_add_participant_requires_details() {
        let mut tracker = create_test_tracker();
        let (event, _) = tracker.create_event(draft("Atelier"), None).unwrap();

        let err = tracker
            .add_participant(&event.id, ParticipantDraft::with_id("X"), true)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParticipant { .. }));
    }

    #[test]
    fn test_update_and_delete_event() {
        let mut tracker = create_test_tracker();
        let (event, _) = tracker.create_event(draft("Atelier"), None).unwrap();

        let update = EventUpdate {
            location: Some("Salle B".to_string()),
            ..EventUpdate::default()
        };
        let updated = tracker.update_event(&event.id, update).unwrap();
        assert_eq!(updated.location.as_deref(), Some("Salle B"));

        tracker.delete_event(&event.id).unwrap();
        assert!(tracker.delete_event(&event.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_events_filters() {
        let mut tracker = create_test_tracker();
        tracker.create_event(draft("Formation Azure"), None).unwrap();
        tracker.create_event(draft("Atelier Python"), None).unwrap();

        assert_eq!(tracker.list_events("", None).unwrap().len(), 2);
        assert_eq!(tracker.list_events("azure", None).unwrap().len(), 1);
        assert_eq!(
            tracker
                .list_events("", Some(EventStatus::Completed))
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_export_uses_config_defaults() {
        let mut tracker = create_test_tracker();
        let out = temp_path("exports");
        tracker.config.export.directory = Some(out.clone());
        tracker.config.export.default_format = ExportFormat::Csv;

        let (event, _) = tracker.create_event(draft("Atelier"), None).unwrap();
        let err = tracker
            .export(&event.id, ParticipantFilter::All, None, None)
            .unwrap_err();
        assert!(err.is_warning());

        let path = write_roster("export.csv", "ID;Nom\nA;Un\n");
        tracker.import_roster(&event.id, &path).unwrap();
        let written = tracker
            .export(&event.id, ParticipantFilter::All, None, None)
            .unwrap();
        assert!(written.starts_with(&out));
        assert_eq!(written.extension().unwrap(), "csv");

        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_dir_all(&out);
    }

    #[test]
    fn test_backup_round_trip() {
        let mut tracker = create_test_tracker();
        tracker.create_event(draft("Atelier"), None).unwrap();
        let path = temp_path("backup.json");
        tracker.backup_export(&path).unwrap();

        let mut other = create_test_tracker();
        let summary = other.backup_import(&path).unwrap();
        assert_eq!(summary.imported_events, 1);
        assert_eq!(other.storage_stats().unwrap().events, 1);

        let _ = std::fs::remove_file(&path);
    }
}
