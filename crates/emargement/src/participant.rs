//! Participant records.
//!
//! A participant is one registered person on an event's roster, together with
//! their attendance state. The serialized form keeps the key names of the
//! browser application's local-storage dumps (`nom`, `prenom`, `isPresent`, ...)
//! so backups can move between the two.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefix of generated participant and event IDs.
const ID_PREFIX: &str = "ID-";

/// Number of random characters after the prefix.
const ID_SUFFIX_LEN: usize = 9;

/// Characters used for the random part of generated IDs.
const ID_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a fresh identifier such as `ID-K3F9Q0ZP1`.
#[must_use]
pub fn generate_id() -> String {
    generate_id_with(&mut rand::rng())
}

/// Generate an identifier from the given random source.
pub fn generate_id_with<R: Rng>(rng: &mut R) -> String {
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| char::from(ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())]))
        .collect();
    format!("{ID_PREFIX}{suffix}")
}

/// How a participant got onto the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Loaded from a roster spreadsheet.
    #[default]
    Import,
    /// Registered on site.
    Manual,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Import => write!(f, "import"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "import" => Ok(Self::Import),
            "manual" => Ok(Self::Manual),
            other => Err(Error::internal(format!("unknown participant source: {other}"))),
        }
    }
}

/// How a participant's presence was validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Scanned QR code.
    Qr,
    /// Typed ID or ticked in the list.
    Manual,
}

impl std::fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Qr => write!(f, "qr"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for ValidationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "qr" => Ok(Self::Qr),
            "manual" => Ok(Self::Manual),
            other => Err(Error::internal(format!("unknown validation mode: {other}"))),
        }
    }
}

/// A participant registered for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Registration ID, external or generated.
    pub id: String,

    /// Family name.
    #[serde(rename = "nom", default)]
    pub last_name: String,

    /// Given name(s).
    #[serde(rename = "prenom", default)]
    pub first_name: String,

    /// Contact e-mail.
    #[serde(default)]
    pub email: String,

    /// Company the participant represents.
    #[serde(default)]
    pub company: String,

    /// Manager of the participant's company.
    #[serde(default)]
    pub manager: String,

    /// Where the record came from.
    #[serde(default)]
    pub source: Source,

    /// Whether the participant has signed in.
    #[serde(default)]
    pub is_present: bool,

    /// When the participant signed in.
    #[serde(default)]
    pub presence_date: Option<DateTime<Utc>>,

    /// How the sign-in was validated.
    #[serde(default)]
    pub validation_mode: Option<ValidationMode>,
}

impl Participant {
    /// Create an absent participant with the given ID and no details.
    #[must_use]
    pub fn new(id: impl Into<String>, source: Source) -> Self {
        Self {
            id: id.into(),
            last_name: String::new(),
            first_name: String::new(),
            email: String::new(),
            company: String::new(),
            manager: String::new(),
            source,
            is_present: false,
            presence_date: None,
            validation_mode: None,
        }
    }

    /// Build a manually registered participant from a draft.
    ///
    /// A draft without an ID gets a generated one. When `mark_present` is set
    /// the participant is signed in immediately with [`ValidationMode::Manual`].
    #[must_use]
    pub fn from_draft(draft: ParticipantDraft, mark_present: bool) -> Self {
        let id = draft
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_id);

        let mut participant = Self {
            last_name: draft.last_name.trim().to_string(),
            first_name: draft.first_name.trim().to_string(),
            email: draft.email.trim().to_string(),
            company: draft.company.trim().to_string(),
            manager: draft.manager.trim().to_string(),
            ..Self::new(id, Source::Manual)
        };
        if mark_present {
            participant.mark_present(ValidationMode::Manual, Utc::now());
        }
        participant
    }

    /// Sign the participant in.
    pub fn mark_present(&mut self, mode: ValidationMode, at: DateTime<Utc>) {
        self.is_present = true;
        self.presence_date = Some(at);
        self.validation_mode = Some(mode);
    }

    /// Cancel the participant's sign-in.
    pub fn mark_absent(&mut self) {
        self.is_present = false;
        self.presence_date = None;
        self.validation_mode = None;
    }

    /// Check whether a typed or scanned ID designates this participant.
    ///
    /// Surrounding whitespace is ignored and the comparison is case-insensitive.
    #[must_use]
    pub fn id_matches(&self, raw: &str) -> bool {
        ids_equal(&self.id, raw.trim())
    }

    /// Check whether the participant matches a free-text search.
    #[must_use]
    pub fn matches_search(&self, term: &str) -> bool {
        let haystack = format!(
            "{} {} {} {}",
            self.last_name, self.first_name, self.email, self.id
        )
        .to_lowercase();
        haystack.contains(&term.to_lowercase())
    }

    /// Name as shown on screen: given name then family name.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Whether the record carries any identifying detail besides its ID.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        !self.last_name.is_empty() || !self.first_name.is_empty() || !self.email.is_empty()
    }
}

/// Case-insensitive ID comparison used for lookups and deduplication.
#[must_use]
pub fn ids_equal(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Details typed in when registering a participant on site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantDraft {
    /// Optional ID; generated when absent.
    pub id: Option<String>,
    /// Family name.
    pub last_name: String,
    /// Given name(s).
    pub first_name: String,
    /// Contact e-mail.
    pub email: String,
    /// Company.
    pub company: String,
    /// Manager.
    pub manager: String,
}

impl ParticipantDraft {
    /// Draft holding only an ID, as produced by a scan of an unknown badge.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Require the family name, given name and e-mail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParticipant`] naming the first missing field.
    pub fn validate_complete(&self) -> Result<()> {
        let required = [
            ("last name", &self.last_name),
            ("first name", &self.first_name),
            ("email", &self.email),
        ];
        for (label, value) in required {
            if value.trim().is_empty() {
                return Err(Error::invalid_participant(format!("{label} is required")));
            }
        }
        Ok(())
    }
}

/// Roster subsets offered by the list and export views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticipantFilter {
    /// Everyone.
    #[default]
    All,
    /// Signed-in participants.
    Present,
    /// Participants not signed in.
    Absent,
    /// Participants registered on site.
    Manual,
}

impl ParticipantFilter {
    /// Check whether a participant belongs to this subset.
    #[must_use]
    pub fn matches(self, participant: &Participant) -> bool {
        match self {
            Self::All => true,
            Self::Present => participant.is_present,
            Self::Absent => !participant.is_present,
            Self::Manual => participant.source == Source::Manual,
        }
    }
}

impl std::fmt::Display for ParticipantFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Present => write!(f, "present"),
            Self::Absent => write!(f, "absent"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Participant {
        Participant {
            last_name: "Martin".to_string(),
            first_name: "Claire".to_string(),
            email: "claire.martin@example.fr".to_string(),
            ..Participant::new("REG-001", Source::Import)
        }
    }

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id();
        assert!(id.starts_with("ID-"));
        assert_eq!(id.len(), 12);
        assert!(id[3..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generate_id_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_mark_present_and_absent() {
        let mut p = sample();
        let now = Utc::now();

        p.mark_present(ValidationMode::Qr, now);
        assert!(p.is_present);
        assert_eq!(p.presence_date, Some(now));
        assert_eq!(p.validation_mode, Some(ValidationMode::Qr));

        p.mark_absent();
        assert!(!p.is_present);
        assert!(p.presence_date.is_none());
        assert!(p.validation_mode.is_none());
    }

    #[test]
    fn test_id_matches_ignores_case_and_whitespace() {
        let p = sample();
        assert!(p.id_matches("reg-001"));
        assert!(p.id_matches("  REG-001\n"));
        assert!(!p.id_matches("REG-002"));
    }

    #[test]
    fn test_matches_search() {
        let p = sample();
        assert!(p.matches_search("martin"));
        assert!(p.matches_search("CLAIRE"));
        assert!(p.matches_search("example.fr"));
        assert!(p.matches_search("reg-0"));
        assert!(p.matches_search(""));
        assert!(!p.matches_search("dupont"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(sample().display_name(), "Claire Martin");
        assert_eq!(Participant::new("X", Source::Manual).display_name(), "");
    }

    #[test]
    fn test_from_draft_generates_id_and_marks_present() {
        let draft = ParticipantDraft {
            last_name: " Durand ".to_string(),
            first_name: "Paul".to_string(),
            email: "paul@example.fr".to_string(),
            ..ParticipantDraft::default()
        };
        let p = Participant::from_draft(draft, true);

        assert!(p.id.starts_with("ID-"));
        assert_eq!(p.last_name, "Durand");
        assert_eq!(p.source, Source::Manual);
        assert!(p.is_present);
        assert_eq!(p.validation_mode, Some(ValidationMode::Manual));
    }

    #[test]
    fn test_from_draft_keeps_given_id() {
        let p = Participant::from_draft(ParticipantDraft::with_id("BADGE-7"), false);
        assert_eq!(p.id, "BADGE-7");
        assert!(!p.is_present);
        assert!(p.presence_date.is_none());
    }

    #[test]
    fn test_from_draft_blank_id_is_generated() {
        let p = Participant::from_draft(ParticipantDraft::with_id("   "), false);
        assert!(p.id.starts_with("ID-"));
    }

    #[test]
    fn test_validate_complete() {
        let mut draft = ParticipantDraft {
            last_name: "Durand".to_string(),
            first_name: "Paul".to_string(),
            email: "paul@example.fr".to_string(),
            ..ParticipantDraft::default()
        };
        assert!(draft.validate_complete().is_ok());

        draft.email = "  ".to_string();
        let err = draft.validate_complete().unwrap_err().to_string();
        assert!(err.contains("email"));
    }

    #[test]
    fn test_filter_matches() {
        let mut present = sample();
        present.mark_present(ValidationMode::Manual, Utc::now());
        let absent = sample();
        let manual = Participant::new("M-1", Source::Manual);

        assert!(ParticipantFilter::All.matches(&absent));
        assert!(ParticipantFilter::Present.matches(&present));
        assert!(!ParticipantFilter::Present.matches(&absent));
        assert!(ParticipantFilter::Absent.matches(&absent));
        assert!(ParticipantFilter::Manual.matches(&manual));
        assert!(!ParticipantFilter::Manual.matches(&absent));
    }

    #[test]
    fn test_serialization_uses_browser_keys() {
        let mut p = sample();
        p.mark_present(ValidationMode::Qr, Utc::now());
        let json = serde_json::to_value(&p).unwrap();

        assert_eq!(json["nom"], "Martin");
        assert_eq!(json["prenom"], "Claire");
        assert_eq!(json["isPresent"], true);
        assert_eq!(json["validationMode"], "qr");
        assert_eq!(json["source"], "import");
        assert!(json["presenceDate"].is_string());
    }

    #[test]
    fn test_deserialize_browser_record_with_missing_fields() {
        let json = r#"{
            "id": "ID-ABCDEFGHI",
            "nom": "Bernard",
            "prenom": "Luc",
            "email": "luc@example.fr",
            "source": "manual",
            "isPresent": true,
            "presenceDate": "2025-03-14T09:05:12.345Z",
            "validationMode": "manual"
        }"#;
        let p: Participant = serde_json::from_str(json).unwrap();
        assert_eq!(p.last_name, "Bernard");
        assert_eq!(p.company, "");
        assert_eq!(p.source, Source::Manual);
        assert!(p.presence_date.is_some());
    }

    #[test]
    fn test_source_and_mode_round_trip_strings() {
        assert_eq!("import".parse::<Source>().unwrap(), Source::Import);
        assert_eq!(Source::Manual.to_string(), "manual");
        assert_eq!("qr".parse::<ValidationMode>().unwrap(), ValidationMode::Qr);
        assert!("camera".parse::<ValidationMode>().is_err());
    }
}
