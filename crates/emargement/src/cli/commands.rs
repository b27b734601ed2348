//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{ArgGroup, Args, Subcommand, ValueEnum};

use crate::event::{parse_event_date, EventDraft, EventStatus, EventUpdate};
use crate::export::ExportFormat;
use crate::participant::{ParticipantDraft, ParticipantFilter};

fn parse_date_arg(value: &str) -> Result<NaiveDateTime, String> {
    parse_event_date(value).map_err(|e| e.to_string())
}

/// Event management commands.
#[derive(Debug, Subcommand)]
pub enum EventCommand {
    /// Create an event
    Create {
        /// Event name
        name: String,

        /// Start date, e.g. "2025-03-14T09:00" or "2025-03-14"
        #[arg(short, long, value_parser = parse_date_arg)]
        date: NaiveDateTime,

        /// Venue
        #[arg(short, long)]
        location: Option<String>,

        /// Maximum number of participants
        #[arg(long)]
        capacity: Option<u32>,

        /// Free-form description
        #[arg(long)]
        description: Option<String>,

        /// Roster file to import (xlsx, xls, ods, csv)
        #[arg(short, long, value_name = "FILE")]
        roster: Option<PathBuf>,
    },

    /// List events
    List {
        /// Only events whose name contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Only events with this status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show an event and its attendance
    Show {
        /// Event ID
        event: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },

    /// Change an event's details
    Update {
        /// Event ID
        event: String,

        /// New name
        #[arg(short, long)]
        name: Option<String>,

        /// New start date
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDateTime>,

        /// New venue (empty to clear)
        #[arg(short, long)]
        location: Option<String>,

        /// New capacity
        #[arg(long)]
        capacity: Option<u32>,

        /// New description (empty to clear)
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete an event and its roster
    Delete {
        /// Event ID
        event: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl EventCommand {
    /// Build the creation draft of a `create` command.
    #[must_use]
    pub fn draft(&self) -> Option<EventDraft> {
        match self {
            Self::Create {
                name,
                date,
                location,
                capacity,
                description,
                ..
            } => Some(EventDraft {
                name: name.clone(),
                date: *date,
                location: location.clone(),
                capacity: *capacity,
                description: description.clone(),
            }),
            _ => None,
        }
    }

    /// Build the partial update of an `update` command.
    #[must_use]
    pub fn update(&self) -> Option<EventUpdate> {
        match self {
            Self::Update {
                name,
                date,
                location,
                capacity,
                description,
                ..
            } => Some(EventUpdate {
                name: name.clone(),
                date: *date,
                location: location.clone(),
                capacity: *capacity,
                description: description.clone(),
            }),
            _ => None,
        }
    }
}

/// Roster import arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Event ID
    pub event: String,

    /// Roster file (xlsx, xlsm, xls, xlsb, ods, csv, txt)
    pub file: PathBuf,
}

/// Check-in arguments.
#[derive(Debug, Args)]
pub struct CheckinCommand {
    /// Event ID
    pub event: String,

    /// Participant ID, as typed or scanned
    pub id: String,

    /// Register the ID as a new participant if nobody has it
    #[arg(short, long)]
    pub add_unknown: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Simulated scan arguments.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Event ID
    pub event: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Presence toggle arguments.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("state").required(true).args(["present", "absent"])))]
pub struct PresenceCommand {
    /// Event ID
    pub event: String,

    /// Participant ID
    pub id: String,

    /// Mark the participant present
    #[arg(long)]
    pub present: bool,

    /// Mark the participant absent
    #[arg(long)]
    pub absent: bool,
}

/// Participant management commands.
#[derive(Debug, Subcommand)]
pub enum ParticipantCommand {
    /// Register a participant on site
    Add {
        /// Event ID
        event: String,

        /// Participant ID (generated if omitted)
        #[arg(long)]
        id: Option<String>,

        /// Family name
        #[arg(long = "nom", value_name = "NOM")]
        last_name: String,

        /// Given name
        #[arg(long = "prenom", value_name = "PRENOM")]
        first_name: String,

        /// E-mail address
        #[arg(long)]
        email: String,

        /// Company
        #[arg(long, default_value = "")]
        company: String,

        /// Company manager
        #[arg(long, default_value = "")]
        manager: String,

        /// Sign the participant in right away
        #[arg(short, long)]
        present: bool,
    },

    /// Remove a participant
    Remove {
        /// Event ID
        event: String,

        /// Participant ID
        id: String,
    },

    /// List an event's participants
    List {
        /// Event ID
        event: String,

        /// Only participants matching this text (name, e-mail or ID)
        #[arg(short, long)]
        search: Option<String>,

        /// Subset to show
        #[arg(long, value_enum, default_value = "all")]
        filter: FilterArg,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

impl ParticipantCommand {
    /// Build the draft of an `add` command.
    #[must_use]
    pub fn draft(&self) -> Option<ParticipantDraft> {
        match self {
            Self::Add {
                id,
                last_name,
                first_name,
                email,
                company,
                manager,
                ..
            } => Some(ParticipantDraft {
                id: id.clone(),
                last_name: last_name.clone(),
                first_name: first_name.clone(),
                email: email.clone(),
                company: company.clone(),
                manager: manager.clone(),
            }),
            _ => None,
        }
    }
}

/// Export arguments.
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Event ID
    pub event: String,

    /// Subset to export
    #[arg(long, value_enum, default_value = "all")]
    pub filter: FilterArg,

    /// File format (defaults to the configured one)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Output directory (defaults to the configured one)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

/// Statistics arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Event ID
    pub event: String,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Backup commands.
#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    /// Write every event to a JSON file
    Export {
        /// Destination file
        file: PathBuf,
    },

    /// Merge events from a JSON file
    Import {
        /// Source file
        file: PathBuf,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Participant subset argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterArg {
    /// Everyone
    All,
    /// Signed-in participants
    Present,
    /// Participants not signed in
    Absent,
    /// Participants registered on site
    Manual,
}

impl From<FilterArg> for ParticipantFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => Self::All,
            FilterArg::Present => Self::Present,
            FilterArg::Absent => Self::Absent,
            FilterArg::Manual => Self::Manual,
        }
    }
}

/// Export file format argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// Excel workbook
    Xlsx,
    /// Semicolon-separated values
    Csv,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Xlsx => Self::Xlsx,
            FormatArg::Csv => Self::Csv,
        }
    }
}

/// Event status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Future events
    Upcoming,
    /// Events taking place today
    Ongoing,
    /// Past events
    Completed,
}

impl From<StatusArg> for EventStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Upcoming => Self::Upcoming,
            StatusArg::Ongoing => Self::Ongoing,
            StatusArg::Completed => Self::Completed,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
