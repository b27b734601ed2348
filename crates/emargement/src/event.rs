//! Events and their rosters.
//!
//! An event is dated in local wall-clock time, like the `datetime-local` input
//! it was originally typed into. Its status (upcoming, ongoing, completed) is
//! never stored: it is derived from the event day and today's date.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attendance::AttendanceStats;
use crate::error::{Error, Result};
use crate::participant::{generate_id, Participant};

/// Format used to store and serialize event dates.
pub const EVENT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Parse an event date as typed by a user.
///
/// Accepts `YYYY-MM-DDTHH:MM`, `YYYY-MM-DD HH:MM` (both optionally with
/// seconds) and a bare `YYYY-MM-DD`, which is taken as midnight.
///
/// # Errors
///
/// Returns [`Error::InvalidEvent`] if the text matches none of these forms.
pub fn parse_event_date(text: &str) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%d %H:%M:%S",
    ];
    let text = text.trim();

    for format in FORMATS {
        if let Ok(date) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(date);
        }
    }

    // Browser dumps may carry fractional seconds
    if let Ok(date) = text.parse::<NaiveDateTime>() {
        return Ok(date);
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::invalid_event(format!("unrecognized date: '{text}'")))
}

mod event_date {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(super::EVENT_DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_event_date(&text).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle of an event relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// The event day is in the future.
    Upcoming,
    /// The event is today.
    Ongoing,
    /// The event day has passed.
    Completed,
}

impl EventStatus {
    /// Status of an event dated `date` as seen on `today`.
    #[must_use]
    pub fn on(date: NaiveDateTime, today: NaiveDate) -> Self {
        let day = date.date();
        if day > today {
            Self::Upcoming
        } else if day == today {
            Self::Ongoing
        } else {
            Self::Completed
        }
    }

    /// French badge label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Upcoming => "À venir",
            Self::Ongoing => "En cours",
            Self::Completed => "Terminé",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upcoming => write!(f, "upcoming"),
            Self::Ongoing => write!(f, "ongoing"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// An event and its roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique event ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Start, in local wall-clock time.
    #[serde(with = "event_date")]
    pub date: NaiveDateTime,
    /// Venue.
    #[serde(default)]
    pub location: Option<String>,
    /// Maximum number of participants, if any.
    #[serde(default)]
    pub capacity: Option<u32>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// When the event was created.
    pub created_at: DateTime<Utc>,
    /// Roster, in registration order.
    #[serde(default)]
    pub participants: Vec<Participant>,
}

impl Event {
    /// Create an event from a validated draft.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEvent`] if the draft fails validation.
    pub fn from_draft(draft: EventDraft) -> Result<Self> {
        draft.validate()?;
        Ok(Self {
            id: generate_id(),
            name: draft.name.trim().to_string(),
            date: draft.date,
            location: non_blank(draft.location),
            capacity: draft.capacity,
            description: non_blank(draft.description),
            created_at: Utc::now(),
            participants: Vec::new(),
        })
    }

    /// Status as of the local current date.
    #[must_use]
    pub fn status(&self) -> EventStatus {
        EventStatus::on(self.date, Local::now().date_naive())
    }

    /// Look up a participant by a typed or scanned ID.
    #[must_use]
    pub fn find_participant(&self, raw_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id_matches(raw_id))
    }

    /// Mutable variant of [`Event::find_participant`].
    pub fn find_participant_mut(&mut self, raw_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id_matches(raw_id))
    }

    /// Attendance counters for the roster.
    #[must_use]
    pub fn stats(&self) -> AttendanceStats {
        AttendanceStats::from_participants(&self.participants)
    }

    /// Whether the roster exceeds the declared capacity.
    #[must_use]
    pub fn over_capacity(&self) -> bool {
        self.capacity
            .is_some_and(|capacity| self.participants.len() > capacity as usize)
    }

    /// Check whether the event matches the home-screen search and status filter.
    #[must_use]
    pub fn matches_listing(&self, search: &str, status: Option<EventStatus>) -> bool {
        let matches_search = self
            .name
            .to_lowercase()
            .contains(&search.to_lowercase());
        let matches_status = status.is_none_or(|s| s == self.status());
        matches_search && matches_status
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEvent`] if the update would blank the name or
    /// set a zero capacity. Nothing is changed then.
    pub fn apply(&mut self, update: EventUpdate) -> Result<()> {
        if update.capacity == Some(0) {
            return Err(Error::invalid_event("capacity must be greater than 0"));
        }
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(Error::invalid_event("name is required"));
            }
            self.name = name.trim().to_string();
        }
        if let Some(date) = update.date {
            self.date = date;
        }
        if let Some(location) = update.location {
            self.location = non_blank(Some(location));
        }
        if let Some(capacity) = update.capacity {
            self.capacity = Some(capacity);
        }
        if let Some(description) = update.description {
            self.description = non_blank(Some(description));
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Input for creating an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    /// Display name (required).
    pub name: String,
    /// Start, in local wall-clock time (required).
    pub date: NaiveDateTime,
    /// Venue.
    pub location: Option<String>,
    /// Maximum number of participants.
    pub capacity: Option<u32>,
    /// Free-form description.
    pub description: Option<String>,
}

impl EventDraft {
    /// Draft with only the required fields set.
    #[must_use]
    pub fn new(name: impl Into<String>, date: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            date,
            location: None,
            capacity: None,
            description: None,
        }
    }

    /// Check the required fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEvent`] if the name is blank or the capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_event("name is required"));
        }
        if self.capacity == Some(0) {
            return Err(Error::invalid_event("capacity must be greater than 0"));
        }
        Ok(())
    }
}

/// Partial update of an event; `None` leaves a field unchanged.
///
/// An empty location or description clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdate {
    /// New name.
    pub name: Option<String>,
    /// New date.
    pub date: Option<NaiveDateTime>,
    /// New venue.
    pub location: Option<String>,
    /// New capacity.
    pub capacity: Option<u32>,
    /// New description.
    pub description: Option<String>,
}

impl EventUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
