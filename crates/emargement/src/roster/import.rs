//! Turning roster rows into participants.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use super::columns::{ColumnMatcher, RosterField};
use super::reader::read_rows;
use crate::error::{Error, Result};
use crate::participant::{generate_id, Participant, Source};

/// Outcome of a roster import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    /// Participants to add, in file order.
    pub participants: Vec<Participant>,
    /// Data rows in the file (header excluded).
    pub total_rows: usize,
    /// Number of participants kept.
    pub imported: usize,
    /// Rows dropped because their ID was already known.
    pub duplicates: usize,
    /// Rows dropped for lacking a name and an e-mail.
    pub skipped: usize,
    /// Entirely empty rows.
    pub blank_rows: usize,
    /// Header row as read.
    pub headers: Vec<String>,
    /// Field fed by each header, if any.
    pub mapping: Vec<Option<RosterField>>,
}

impl ImportReport {
    /// One-line summary for the user.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.duplicates > 0 {
            format!(
                "{} participants imported ({} duplicates ignored)",
                self.imported, self.duplicates
            )
        } else {
            format!("{} participants imported", self.imported)
        }
    }

    /// Headers no field was found for.
    #[must_use]
    pub fn unmapped_headers(&self) -> Vec<&str> {
        self.headers
            .iter()
            .zip(&self.mapping)
            .filter(|(header, field)| field.is_none() && !header.trim().is_empty())
            .map(|(header, _)| header.as_str())
            .collect()
    }
}

/// Split a full name: the last word is the family name, the rest the given names.
///
/// Returns `(last_name, first_name)`.
///
/// # Examples
///
/// ```
/// use emargement::roster::split_full_name;
///
/// assert_eq!(split_full_name("Jean Pierre Martin"), ("Martin".to_string(), "Jean Pierre".to_string()));
/// assert_eq!(split_full_name("Cher"), ("Cher".to_string(), String::new()));
/// ```
#[must_use]
pub fn split_full_name(full_name: &str) -> (String, String) {
    let mut words: Vec<&str> = full_name.split_whitespace().collect();
    match words.pop() {
        None => (String::new(), String::new()),
        Some(last) => (last.to_string(), words.join(" ")),
    }
}

/// Read and import a roster file.
///
/// `existing` holds the participants already on the event; their IDs count
/// as duplicates.
///
/// # Errors
///
/// Returns reader errors, or [`Error::RosterEmpty`] if the file has no data row.
pub fn import_file(
    path: &Path,
    matcher: &ColumnMatcher,
    existing: &[Participant],
) -> Result<ImportReport> {
    let rows = read_rows(path)?;
    let report = import_rows(&rows, matcher, existing)?;
    info!(
        path = %path.display(),
        imported = report.imported,
        duplicates = report.duplicates,
        skipped = report.skipped,
        "Imported roster"
    );
    Ok(report)
}

/// Import already-read rows; the first row is the header.
///
/// # Errors
///
/// Returns [`Error::RosterEmpty`] if there is no data row.
pub fn import_rows(
    rows: &[Vec<String>],
    matcher: &ColumnMatcher,
    existing: &[Participant],
) -> Result<ImportReport> {
    let Some((headers, data)) = rows.split_first() else {
        return Err(Error::RosterEmpty);
    };
    if data.is_empty() {
        return Err(Error::RosterEmpty);
    }

    let mapping = matcher.map_headers(headers);
    debug!(?headers, ?mapping, "Mapped roster headers");

    let mut seen: HashSet<String> = existing.iter().map(|p| p.id.to_lowercase()).collect();
    let mut report = ImportReport {
        participants: Vec::new(),
        total_rows: data.len(),
        imported: 0,
        duplicates: 0,
        skipped: 0,
        blank_rows: 0,
        headers: headers.clone(),
        mapping,
    };

    for row in data {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            report.blank_rows += 1;
            continue;
        }

        let mut participant = participant_from_row(row, &report.mapping);
        if !participant.has_identity() {
            report.skipped += 1;
            continue;
        }
        if participant.id.is_empty() {
            participant.id = generate_id();
        }

        if !seen.insert(participant.id.to_lowercase()) {
            debug!(id = %participant.id, "Skipping duplicate roster row");
            report.duplicates += 1;
            continue;
        }
        report.participants.push(participant);
    }

    report.imported = report.participants.len();
    Ok(report)
}

fn participant_from_row(row: &[String], mapping: &[Option<RosterField>]) -> Participant {
    let mut participant = Participant::new(String::new(), Source::Import);

    for (cell, field) in row.iter().zip(mapping) {
        let value = cell.trim();
        let Some(field) = field else { continue };
        if value.is_empty() {
            continue;
        }

        match field {
            RosterField::Id => participant.id = value.to_string(),
            RosterField::LastName => participant.last_name = value.to_string(),
            RosterField::FirstName => participant.first_name = value.to_string(),
            RosterField::FullName => {
                let (last_name, first_name) = split_full_name(value);
                participant.last_name = last_name;
                participant.first_name = first_name;
            }
            RosterField::Email => participant.email = value.to_string(),
            RosterField::Company => participant.company = value.to_string(),
            RosterField::Manager => participant.manager = value.to_string(),
        }
    }

    participant
}
