//! `emarge` - CLI for emargement
//!
//! This binary provides the command-line interface for creating events,
//! importing rosters, checking participants in and exporting attendance.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;

use emargement::cli::{
    BackupCommand, Cli, Command, ConfigCommand, EventCommand, OutputFormat, ParticipantCommand,
};
use emargement::format::{date_time, long_date};
use emargement::{
    init_logging, Config, Event, ImportReport, Participant, ParticipantFilter, ScanOutcome,
    Tracker, ValidationMode,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Configuration commands don't need the database
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(&config, config_cmd),
        other => other,
    };

    let database = config.database_path();
    let mut tracker = Tracker::open(config)
        .with_context(|| format!("failed to open database at {}", database.display()))?;

    match command {
        Command::Event(cmd) => handle_event(&mut tracker, &cmd),
        Command::Import(cmd) => {
            let report = tracker.import_roster(&cmd.event, &cmd.file)?;
            print_import_report(&report);
            Ok(())
        }
        Command::Checkin(cmd) => {
            let outcome =
                tracker.check_in(&cmd.event, &cmd.id, ValidationMode::Manual, cmd.add_unknown)?;
            print_outcome(&outcome, cmd.json)
        }
        Command::Scan(cmd) => match tracker.simulate_scan(&cmd.event) {
            Ok(outcome) => print_outcome(&outcome, cmd.json),
            Err(e) if e.is_warning() => {
                println!("{e}");
                Ok(())
            }
            Err(e) => Err(e.into()),
        },
        Command::Presence(cmd) => {
            let participant =
                tracker.set_presence(&cmd.event, &cmd.id, cmd.present, ValidationMode::Manual)?;
            let state = if participant.is_present { "present" } else { "absent" };
            println!("{} ({}) marked {state}.", display_name(&participant), participant.id);
            Ok(())
        }
        Command::Participant(cmd) => handle_participant(&mut tracker, &cmd),
        Command::Export(cmd) => {
            let result = tracker.export(
                &cmd.event,
                cmd.filter.into(),
                cmd.format.map(Into::into),
                cmd.output.as_deref(),
            );
            match result {
                Ok(path) => {
                    println!("Exported to {}", path.display());
                    Ok(())
                }
                Err(e) if e.is_warning() => {
                    println!("Nothing to export for filter '{}'.", ParticipantFilter::from(cmd.filter));
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Stats(cmd) => {
            let stats = tracker.stats(&cmd.event)?;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Total:    {}", stats.total);
                println!("Present:  {}", stats.present);
                println!("Absent:   {}", stats.absent);
                println!("On site:  {}", stats.manual);
                println!("Rate:     {}%", stats.rate);
            }
            Ok(())
        }
        Command::Backup(cmd) => handle_backup(&mut tracker, &cmd),
        Command::Status(cmd) => handle_status(&tracker, cmd.json),
        Command::Config(_) => Ok(()),
    }
}

fn handle_event(tracker: &mut Tracker, cmd: &EventCommand) -> Result<()> {
    match cmd {
        EventCommand::Create { roster, .. } => {
            let draft = cmd.draft().context("missing event details")?;
            let (event, report) = tracker.create_event(draft, roster.as_deref())?;
            println!("Created event {} ({})", event.name, event.id);
            if let Some(report) = report {
                print_import_report(&report);
            }
        }
        EventCommand::List {
            search,
            status,
            format,
        } => {
            let events = tracker.list_events(
                search.as_deref().unwrap_or_default(),
                status.map(Into::into),
            )?;
            print_events(&events, *format)?;
        }
        EventCommand::Show { event, format } => {
            let event = tracker.event(event)?;
            print_event(&event, *format)?;
        }
        EventCommand::Update { event, .. } => {
            let update = cmd.update().unwrap_or_default();
            if update.is_empty() {
                println!("Nothing to update.");
                return Ok(());
            }
            let event = tracker.update_event(event, update)?;
            println!("Updated event {} ({})", event.name, event.id);
        }
        EventCommand::Delete { event, yes } => {
            if !*yes {
                let event = tracker.event(event)?;
                println!(
                    "This will delete '{}' and its {} participants.",
                    event.name,
                    event.participants.len()
                );
                println!("Use --yes to confirm.");
                return Ok(());
            }
            tracker.delete_event(event)?;
            println!("Deleted event {event}");
        }
    }
    Ok(())
}

fn handle_participant(tracker: &mut Tracker, cmd: &ParticipantCommand) -> Result<()> {
    match cmd {
        ParticipantCommand::Add { event, present, .. } => {
            let draft = cmd.draft().context("missing participant details")?;
            let participant = tracker.add_participant(event, draft, *present)?;
            println!("Added {} ({})", display_name(&participant), participant.id);
        }
        ParticipantCommand::Remove { event, id } => {
            let participant = tracker.remove_participant(event, id)?;
            println!("Removed {} ({})", display_name(&participant), participant.id);
        }
        ParticipantCommand::List {
            event,
            search,
            filter,
            format,
        } => {
            let event = tracker.event(event)?;
            let filter = ParticipantFilter::from(*filter);
            let search = search.as_deref().unwrap_or_default();
            let participants: Vec<&Participant> = event
                .participants
                .iter()
                .filter(|p| filter.matches(p) && p.matches_search(search))
                .collect();
            print_participants(&participants, *format)?;
        }
    }
    Ok(())
}

fn handle_backup(tracker: &mut Tracker, cmd: &BackupCommand) -> Result<()> {
    match cmd {
        BackupCommand::Export { file } => {
            tracker
                .backup_export(file)
                .with_context(|| format!("failed to write backup to {}", file.display()))?;
            println!("Backup written to {}", file.display());
        }
        BackupCommand::Import { file } => {
            let summary = tracker
                .backup_import(file)
                .with_context(|| format!("failed to import backup from {}", file.display()))?;
            println!(
                "Imported {} events ({} participants), skipped {} existing.",
                summary.imported_events, summary.imported_participants, summary.skipped_events
            );
        }
    }
    Ok(())
}

fn handle_status(tracker: &Tracker, json: bool) -> Result<()> {
    let stats = tracker.storage_stats()?;
    let database = tracker.storage().path();

    if json {
        let status = serde_json::json!({
            "database_path": database,
            "events": stats.events,
            "participants": stats.participants,
            "present": stats.present,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("emarge status");
        println!("-------------");
        println!("Database:      {}", database.display());
        println!("Size:          {} bytes", stats.db_size_bytes);
        println!("Events:        {}", stats.events);
        println!("Participants:  {}", stats.participants);
        println!("Present:       {}", stats.present);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Import]");
                println!("  Min partial match:  {}", config.import.min_partial_match_len);
                println!("  Custom aliases:     {}", config.import.aliases.len());
                for (alias, field) in &config.import.aliases {
                    println!("    {alias} -> {field}");
                }
                println!();
                println!("[Export]");
                println!("  Directory:          {}", config.export_dir().display());
                println!("  Default format:     {}", config.export.default_format);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn display_name(participant: &Participant) -> String {
    let name = participant.display_name();
    if name.is_empty() {
        "(unnamed)".to_string()
    } else {
        name
    }
}

fn event_when(event: &Event) -> String {
    format!("{} {}", long_date(event.date.date()), event.date.format("%H:%M"))
}

fn print_import_report(report: &ImportReport) {
    println!("{}", report.summary());
    if report.skipped > 0 {
        println!("{} rows without name or e-mail skipped.", report.skipped);
    }
    let unmapped = report.unmapped_headers();
    if !unmapped.is_empty() {
        println!("Ignored columns: {}", unmapped.join(", "));
    }
}

fn print_outcome(outcome: &ScanOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome {
        ScanOutcome::CheckedIn { participant } => {
            println!("✓ {} ({}) checked in.", display_name(participant), participant.id);
        }
        ScanOutcome::AlreadyPresent { participant } => {
            let since = participant
                .presence_date
                .as_ref()
                .map(date_time)
                .unwrap_or_default();
            println!(
                "! {} ({}) already present since {since}.",
                display_name(participant),
                participant.id
            );
        }
        ScanOutcome::Unknown { id } => {
            println!("✗ Unknown participant: {id}");
            println!("Use --add-unknown to register this ID on the spot.");
        }
        ScanOutcome::Added { participant } => {
            println!("+ {} registered and checked in.", participant.id);
        }
    }
    Ok(())
}

fn print_events(events: &[Event], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(events)?),
        OutputFormat::Plain => {
            for event in events {
                let stats = event.stats();
                println!(
                    "{}  {}  {}  [{}]  {}/{}",
                    event.id,
                    event.name,
                    event_when(event),
                    event.status().label(),
                    stats.present,
                    stats.total
                );
            }
        }
        OutputFormat::Table => {
            println!(
                "{:<12}  {:<30}  {:<32}  {:<9}  {:>9}",
                "ID", "Name", "Date", "Status", "Present"
            );
            for event in events {
                let stats = event.stats();
                println!(
                    "{:<12}  {:<30}  {:<32}  {:<9}  {:>9}",
                    event.id,
                    event.name,
                    event_when(event),
                    event.status().label(),
                    format!("{}/{}", stats.present, stats.total)
                );
            }
        }
    }
    Ok(())
}

fn print_event(event: &Event, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(event)?);
        return Ok(());
    }

    let stats = event.stats();
    println!("{} ({})", event.name, event.id);
    println!("Date:         {}", event_when(event));
    println!("Status:       {}", event.status().label());
    if let Some(location) = &event.location {
        println!("Location:     {location}");
    }
    if let Some(capacity) = event.capacity {
        println!("Capacity:     {capacity}");
    }
    if let Some(description) = &event.description {
        println!("Description:  {description}");
    }
    println!(
        "Attendance:   {}/{} ({}%)",
        stats.present, stats.total, stats.rate
    );
    if event.over_capacity() {
        println!("Warning: roster exceeds capacity.");
    }
    Ok(())
}

fn print_participants(participants: &[&Participant], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(participants)?),
        OutputFormat::Plain => {
            for p in participants {
                let mark = if p.is_present { "✓" } else { " " };
                println!("[{mark}] {}  {}  {}", p.id, display_name(p), p.email);
            }
        }
        OutputFormat::Table => {
            println!(
                "{:<14}  {:<20}  {:<20}  {:<30}  {:<8}  {:<16}",
                "ID", "Nom", "Prénom", "Email", "Présent", "Validation"
            );
            for p in participants {
                let validated = p
                    .presence_date
                    .as_ref()
                    .map(date_time)
                    .unwrap_or_default();
                println!(
                    "{:<14}  {:<20}  {:<20}  {:<30}  {:<8}  {:<16}",
                    p.id,
                    p.last_name,
                    p.first_name,
                    p.email,
                    if p.is_present { "Oui" } else { "Non" },
                    validated
                );
            }
        }
    }
    Ok(())
}
