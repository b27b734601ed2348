//! Header normalization and column-to-field matching.
//!
//! Roster spreadsheets come from many sources and their headers vary
//! (`Prénom`, `First name`, `Adresse email (Contact) (Relation)`...). Headers
//! are normalized, then matched against a table of known aliases.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;
use unicode_normalization::UnicodeNormalization;

use crate::config::ImportConfig;

static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s()]").expect("Invalid regex pattern"));

/// Participant field a roster column can feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RosterField {
    /// Registration ID.
    #[serde(rename = "id")]
    Id,
    /// Family name.
    #[serde(rename = "nom")]
    LastName,
    /// Given name(s).
    #[serde(rename = "prenom")]
    FirstName,
    /// Given name(s) and family name in one cell.
    #[serde(rename = "fullName")]
    FullName,
    /// Contact e-mail.
    #[serde(rename = "email")]
    Email,
    /// Company.
    #[serde(rename = "company")]
    Company,
    /// Company manager.
    #[serde(rename = "manager")]
    Manager,
}

impl std::fmt::Display for RosterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Id => "id",
            Self::LastName => "nom",
            Self::FirstName => "prenom",
            Self::FullName => "fullName",
            Self::Email => "email",
            Self::Company => "company",
            Self::Manager => "manager",
        };
        f.write_str(name)
    }
}

/// Built-in header aliases, in raw form.
const BUILTIN_ALIASES: &[(&str, RosterField)] = &[
    ("id", RosterField::Id),
    ("id_client", RosterField::Id),
    ("id d'inscription", RosterField::Id),
    ("inscription", RosterField::Id),
    ("nom", RosterField::LastName),
    ("name", RosterField::LastName),
    ("nom complet", RosterField::FullName),
    ("contact", RosterField::FullName),
    ("prenom", RosterField::FirstName),
    ("prénom", RosterField::FirstName),
    ("firstname", RosterField::FirstName),
    ("first name", RosterField::FirstName),
    ("email", RosterField::Email),
    ("mail", RosterField::Email),
    ("adresse email", RosterField::Email),
    ("adresse email (contact) (relation)", RosterField::Email),
    ("e-mail", RosterField::Email),
    ("societe", RosterField::Company),
    ("société", RosterField::Company),
    ("company", RosterField::Company),
    ("entreprise", RosterField::Company),
    ("gerant", RosterField::Manager),
    ("gérant", RosterField::Manager),
    ("gérant (contact) (relation)", RosterField::Manager),
    ("manager", RosterField::Manager),
];

/// Normalize a header for comparison.
///
/// Lowercases, strips accents, drops everything but ASCII letters, digits,
/// whitespace and parentheses, then trims.
///
/// # Examples
///
/// ```
/// use emargement::roster::normalize_column_name;
///
/// assert_eq!(normalize_column_name("  Prénom "), "prenom");
/// assert_eq!(normalize_column_name("E-mail"), "email");
/// ```
#[must_use]
pub fn normalize_column_name(header: &str) -> String {
    let folded: String = header
        .to_lowercase()
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect();
    DISALLOWED_CHARS.replace_all(&folded, "").trim().to_string()
}

/// Maps roster headers to participant fields.
#[derive(Debug, Clone)]
pub struct ColumnMatcher {
    /// Normalized aliases, user entries first.
    aliases: Vec<(String, RosterField)>,
    min_partial_match_len: usize,
}

impl Default for ColumnMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnMatcher {
    /// Matcher with the built-in aliases only.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&ImportConfig::default())
    }

    /// Matcher with user aliases from configuration ahead of the built-in ones.
    #[must_use]
    pub fn with_config(config: &ImportConfig) -> Self {
        let user = config
            .aliases
            .iter()
            .map(|(alias, field)| (alias.as_str(), *field));
        let builtin = BUILTIN_ALIASES.iter().copied();

        let mut aliases: Vec<(String, RosterField)> = Vec::new();
        for (alias, field) in user.chain(builtin) {
            let normalized = normalize_column_name(alias);
            if normalized.is_empty() || aliases.iter().any(|(a, _)| *a == normalized) {
                continue;
            }
            aliases.push((normalized, field));
        }

        Self {
            aliases,
            min_partial_match_len: config.min_partial_match_len,
        }
    }

    /// Find the field a header feeds, if any.
    ///
    /// An exact match on normalized forms wins. Otherwise the longest alias
    /// that the header contains is used; an alias that contains the header
    /// also counts once the header is at least `min_partial_match_len` long.
    #[must_use]
    pub fn find_field_mapping(&self, header: &str) -> Option<RosterField> {
        let normalized = normalize_column_name(header);
        if normalized.is_empty() {
            return None;
        }

        if let Some((_, field)) = self.aliases.iter().find(|(alias, _)| *alias == normalized) {
            return Some(*field);
        }

        let allow_reverse = normalized.chars().count() >= self.min_partial_match_len;
        let mut best: Option<(&str, RosterField)> = None;
        for (alias, field) in &self.aliases {
            let partial = normalized.contains(alias.as_str())
                || (allow_reverse && alias.contains(normalized.as_str()));
            if !partial {
                continue;
            }
            if best.is_none_or(|(current, _)| alias.len() > current.len()) {
                best = Some((alias.as_str(), *field));
            }
        }

        if let Some((alias, field)) = best {
            trace!(header, alias, %field, "Partial header match");
        }
        best.map(|(_, field)| field)
    }

    /// Map every header of a roster.
    #[must_use]
    pub fn map_headers(&self, headers: &[String]) -> Vec<Option<RosterField>> {
        headers.iter().map(|h| self.find_field_mapping(h)).collect()
    }
}
