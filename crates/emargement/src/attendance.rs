//! Check-in and roster edits on a loaded event.
//!
//! These functions work on an in-memory [`Event`]; persisting the result is
//! up to the caller.

use chrono::Utc;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::event::Event;
use crate::participant::{Participant, ParticipantDraft, Source, ValidationMode};

/// Attendance counters for a roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceStats {
    /// Registered participants.
    pub total: usize,
    /// Signed-in participants.
    pub present: usize,
    /// Participants not signed in.
    pub absent: usize,
    /// Participants registered on site.
    pub manual: usize,
    /// Percentage present, rounded; 0 for an empty roster.
    pub rate: u32,
}

impl AttendanceStats {
    /// Count a roster.
    #[must_use]
    pub fn from_participants(participants: &[Participant]) -> Self {
        let total = participants.len();
        let present = participants.iter().filter(|p| p.is_present).count();
        let manual = participants
            .iter()
            .filter(|p| p.source == Source::Manual)
            .count();
        Self {
            total,
            present,
            absent: total - present,
            manual,
            rate: rate(present, total),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn rate(present: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (present as f64 / total as f64 * 100.0).round() as u32
}

/// Result of presenting an ID at the check-in desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ScanOutcome {
    /// The participant was absent and is now signed in.
    CheckedIn {
        /// The participant, after sign-in.
        participant: Participant,
    },
    /// The participant had already signed in; nothing changed.
    AlreadyPresent {
        /// The participant, with the earlier presence date.
        participant: Participant,
    },
    /// No participant has this ID.
    Unknown {
        /// The ID as entered, trimmed.
        id: String,
    },
    /// No participant had this ID; it was registered on the spot.
    Added {
        /// The new participant, signed in.
        participant: Participant,
    },
}

impl ScanOutcome {
    /// Whether the scan changed the event.
    #[must_use]
    pub fn is_change(&self) -> bool {
        matches!(self, Self::CheckedIn { .. } | Self::Added { .. })
    }
}

/// Check a participant in by ID.
///
/// With `add_unknown`, an ID that matches nobody is registered as a manual
/// participant and signed in.
///
/// # Errors
///
/// Returns [`Error::EmptyParticipantId`] for a blank ID.
pub fn check_in(
    event: &mut Event,
    raw_id: &str,
    mode: ValidationMode,
    add_unknown: bool,
) -> Result<ScanOutcome> {
    let id = raw_id.trim();
    if id.is_empty() {
        return Err(Error::EmptyParticipantId);
    }

    if let Some(participant) = event.find_participant_mut(id) {
        if participant.is_present {
            debug!(id = %participant.id, "Participant already present");
            return Ok(ScanOutcome::AlreadyPresent {
                participant: participant.clone(),
            });
        }
        participant.mark_present(mode, Utc::now());
        return Ok(ScanOutcome::CheckedIn {
            participant: participant.clone(),
        });
    }

    if !add_unknown {
        return Ok(ScanOutcome::Unknown { id: id.to_string() });
    }

    let participant = add_participant(event, ParticipantDraft::with_id(id), true)?;
    Ok(ScanOutcome::Added { participant })
}

/// Simulate a QR scan of a random absent participant.
///
/// # Errors
///
/// Returns [`Error::AllPresent`] if nobody is left to scan.
pub fn simulate_scan<R: Rng>(event: &mut Event, rng: &mut R) -> Result<ScanOutcome> {
    let absent: Vec<String> = event
        .participants
        .iter()
        .filter(|p| !p.is_present)
        .map(|p| p.id.clone())
        .collect();

    let Some(id) = absent.choose(rng) else {
        return Err(Error::AllPresent);
    };
    check_in(event, id, ValidationMode::Qr, false)
}

/// Set or clear a participant's presence.
///
/// # Errors
///
/// Returns [`Error::ParticipantNotFound`] if no participant has this ID.
pub fn set_presence(
    event: &mut Event,
    raw_id: &str,
    present: bool,
    mode: ValidationMode,
) -> Result<Participant> {
    let event_id = event.id.clone();
    let participant = event
        .find_participant_mut(raw_id)
        .ok_or_else(|| Error::participant_not_found(event_id, raw_id.trim()))?;

    if present {
        participant.mark_present(mode, Utc::now());
    } else {
        participant.mark_absent();
    }
    Ok(participant.clone())
}

/// Register a participant on site.
///
/// # Errors
///
/// Returns [`Error::DuplicateParticipant`] if the ID is already on the roster.
pub fn add_participant(
    event: &mut Event,
    draft: ParticipantDraft,
    mark_present: bool,
) -> Result<Participant> {
    let participant = Participant::from_draft(draft, mark_present);
    if event.find_participant(&participant.id).is_some() {
        return Err(Error::duplicate_participant(&event.id, &participant.id));
    }

    event.participants.push(participant.clone());
    if event.over_capacity() {
        warn!(
            event_id = %event.id,
            capacity = ?event.capacity,
            registered = event.participants.len(),
            "Event is over capacity"
        );
    }
    Ok(participant)
}

/// Remove a participant from the roster.
///
/// # Errors
///
/// Returns [`Error::ParticipantNotFound`] if no participant has this ID.
pub fn remove_participant(event: &mut Event, raw_id: &str) -> Result<Participant> {
    let position = event
        .participants
        .iter()
        .position(|p| p.id_matches(raw_id))
        .ok_or_else(|| Error::participant_not_found(&event.id, raw_id.trim()))?;
    Ok(event.participants.remove(position))
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::event::{parse_event_date, EventDraft};

    fn event_with(ids: &[&str]) -> Event {
        let mut event = Event::from_draft(EventDraft::new(
            "Atelier",
            parse_event_date("2025-03-14T09:00").unwrap(),
        ))
        .unwrap();
        event.participants = ids
            .iter()
            .map(|id| Participant::new(*id, Source::Import))
            .collect();
        event
    }

    #[test]
    fn test_stats() {
        let mut event = event_with(&["A", "B", "C"]);
        assert_eq!(event.stats().rate, 0);

        check_in(&mut event, "A", ValidationMode::Manual, false).unwrap();
        check_in(&mut event, "B", ValidationMode::Manual, false).unwrap();
        let stats = event.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.present, 2);
        assert_eq!(stats.absent, 1);
        assert_eq!(stats.manual, 0);
        assert_eq!(stats.rate, 67);

        check_in(&mut event, "WALK-IN", ValidationMode::Manual, true).unwrap();
        let stats = event.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.manual, 1);
        assert_eq!(stats.present, 3);

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["manual"], 1);

        assert_eq!(AttendanceStats::from_participants(&[]), AttendanceStats::default());
    }

    #[test]
    fn test_check_in_found_absent() {
        let mut event = event_with(&["ABC-1"]);
        let outcome = check_in(&mut event, " abc-1 ", ValidationMode::Qr, false).unwrap();

        match outcome {
            ScanOutcome::CheckedIn { participant } => {
                assert_eq!(participant.id, "ABC-1");
                assert_eq!(participant.validation_mode, Some(ValidationMode::Qr));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(event.participants[0].is_present);
    }

    #[test]
    fn test_check_in_already_present_keeps_first_date() {
        let mut event = event_with(&["A"]);
        check_in(&mut event, "A", ValidationMode::Manual, false).unwrap();
        let first = event.participants[0].presence_date;

        let outcome = check_in(&mut event, "A", ValidationMode::Qr, false).unwrap();
        match outcome {
            ScanOutcome::AlreadyPresent { participant } => {
                assert_eq!(participant.presence_date, first);
                assert_eq!(participant.validation_mode, Some(ValidationMode::Manual));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!ScanOutcome::Unknown { id: String::new() }.is_change());
    }

    #[test]
    fn test_check_in_unknown() {
        let mut event = event_with(&["A"]);
        let outcome = check_in(&mut event, "Z-9", ValidationMode::Manual, false).unwrap();
        assert_eq!(
            outcome,
            ScanOutcome::Unknown {
                id: "Z-9".to_string()
            }
        );
        assert_eq!(event.participants.len(), 1);
    }

    #[test]
    fn test_check_in_unknown_added() {
        let mut event = event_with(&["A"]);
        let outcome = check_in(&mut event, "Z-9", ValidationMode::Qr, true).unwrap();
        assert!(outcome.is_change());

        let added = event.find_participant("z-9").unwrap();
        assert_eq!(added.source, Source::Manual);
        assert!(added.is_present);
        assert_eq!(added.validation_mode, Some(ValidationMode::Manual));
    }

    #[test]
    fn test_check_in_blank_id() {
        let mut event = event_with(&["A"]);
        let err = check_in(&mut event, "   ", ValidationMode::Manual, true).unwrap_err();
        assert!(matches!(err, Error::EmptyParticipantId));
    }

    #[test]
    fn test_simulate_scan_until_all_present() {
        let mut event = event_with(&["A", "B"]);
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..2 {
            let outcome = simulate_scan(&mut event, &mut rng).unwrap();
            match outcome {
                ScanOutcome::CheckedIn { participant } => {
                    assert_eq!(participant.validation_mode, Some(ValidationMode::Qr));
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!(event.stats().present, 2);

        let err = simulate_scan(&mut event, &mut rng).unwrap_err();
        assert!(matches!(err, Error::AllPresent));
    }

    #[test]
    fn test_simulate_scan_empty_roster() {
        let mut event = event_with(&[]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(simulate_scan(&mut event, &mut rng).is_err());
    }

    #[test]
    fn test_set_presence() {
        let mut event = event_with(&["A"]);

        let p = set_presence(&mut event, "a", true, ValidationMode::Manual).unwrap();
        assert!(p.is_present);
        assert!(p.presence_date.is_some());

        let p = set_presence(&mut event, "A", false, ValidationMode::Manual).unwrap();
        assert!(!p.is_present);
        assert!(p.presence_date.is_none());
        assert!(p.validation_mode.is_none());

        let err = set_presence(&mut event, "B", true, ValidationMode::Manual).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_add_participant_duplicate() {
        let mut event = event_with(&["ABC"]);
        let err = add_participant(&mut event, ParticipantDraft::with_id("abc"), false).unwrap_err();
        assert!(matches!(err, Error::DuplicateParticipant { .. }));
        assert_eq!(event.participants.len(), 1);
    }

    #[test]
    fn test_add_participant_over_capacity_still_adds() {
        let mut event = event_with(&["A"]);
        event.capacity = Some(1);

        let draft = ParticipantDraft {
            last_name: "Durand".to_string(),
            first_name: "Paul".to_string(),
            email: "paul@example.fr".to_string(),
            ..ParticipantDraft::default()
        };
        let p = add_participant(&mut event, draft, false).unwrap();
        assert!(p.id.starts_with("ID-"));
        assert!(event.over_capacity());
        assert_eq!(event.participants.len(), 2);
    }

    #[test]
    fn test_remove_participant() {
        let mut event = event_with(&["A", "B"]);
        let removed = remove_participant(&mut event, "b").unwrap();
        assert_eq!(removed.id, "B");
        assert_eq!(event.participants.len(), 1);

        assert!(remove_participant(&mut event, "B").is_err());
    }
}
