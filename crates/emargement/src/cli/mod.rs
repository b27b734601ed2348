//! Command-line interface for emargement.
//!
//! This module provides the CLI structure and command handlers for the
//! `emarge` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    BackupCommand, CheckinCommand, ConfigCommand, EventCommand, ExportCommand, FilterArg,
    FormatArg, ImportCommand, OutputFormat, ParticipantCommand, PresenceCommand, ScanCommand,
    StatsCommand, StatusArg, StatusCommand,
};

/// emarge - Event attendance tracking
///
/// Create events, import rosters from spreadsheets, check participants in
/// and export attendance sheets.
#[derive(Debug, Parser)]
#[command(name = "emarge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage events
    #[command(subcommand)]
    Event(EventCommand),

    /// Import a roster file into an event
    Import(ImportCommand),

    /// Check a participant in by ID
    Checkin(CheckinCommand),

    /// Simulate a QR scan of a random absent participant
    Scan(ScanCommand),

    /// Mark a participant present or absent
    Presence(PresenceCommand),

    /// Manage an event's participants
    #[command(subcommand)]
    Participant(ParticipantCommand),

    /// Export attendance to a spreadsheet
    Export(ExportCommand),

    /// Show attendance statistics for an event
    Stats(StatsCommand),

    /// Back up or restore all events as JSON
    #[command(subcommand)]
    Backup(BackupCommand),

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
