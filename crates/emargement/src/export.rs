//! Attendance export to XLSX and CSV.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::format;
use crate::participant::{Participant, ParticipantFilter};

/// Sheet name of XLSX exports.
const SHEET_NAME: &str = "Participants";

/// XLSX column headers.
const XLSX_HEADERS: [&str; 8] = [
    "ID",
    "Nom",
    "Prénom",
    "Email",
    "Présent",
    "Date validation",
    "Mode validation",
    "Source",
];

/// CSV column headers.
const CSV_HEADERS: [&str; 8] = [
    "ID",
    "Nom",
    "Prénom",
    "Email",
    "Présent",
    "Date validation",
    "Mode",
    "Source",
];

/// XLSX column widths, in characters.
const COLUMN_WIDTHS: [u8; 8] = [30, 20, 20, 35, 10, 20, 15, 10];

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Excel workbook.
    #[default]
    Xlsx,
    /// Semicolon-separated text.
    Csv,
}

impl ExportFormat {
    /// File extension, without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Pick the participants to export.
///
/// # Errors
///
/// Returns [`Error::NothingToExport`] if the filter leaves nobody.
pub fn select(participants: &[Participant], filter: ParticipantFilter) -> Result<Vec<&Participant>> {
    let selected: Vec<&Participant> = participants.iter().filter(|p| filter.matches(p)).collect();
    if selected.is_empty() {
        return Err(Error::NothingToExport);
    }
    Ok(selected)
}

/// File name for an export made on `today`, e.g. `export_Formation_Azure_2025-03-14.xlsx`.
#[must_use]
pub fn export_file_name(event_name: &str, format: ExportFormat, today: NaiveDate) -> String {
    let name: String = event_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            other => other,
        })
        .collect();
    format!(
        "export_{name}_{}.{}",
        today.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Export part of an event's roster into `dir`, returning the written path.
///
/// The directory is created if needed.
///
/// # Errors
///
/// Returns [`Error::NothingToExport`] when the selection is empty (nothing is
/// written), or an I/O or writer error.
pub fn export_event(
    event: &Event,
    filter: ParticipantFilter,
    format: ExportFormat,
    dir: &Path,
    today: NaiveDate,
) -> Result<PathBuf> {
    let selected = select(&event.participants, filter)?;

    std::fs::create_dir_all(dir).map_err(|e| Error::DirectoryCreate {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let path = dir.join(export_file_name(&event.name, format, today));

    match format {
        ExportFormat::Xlsx => write_xlsx(&selected, &path)?,
        ExportFormat::Csv => {
            let bytes = render_csv(&selected)?;
            let mut file = std::fs::File::create(&path)?;
            file.write_all(&bytes)?;
        }
    }

    info!(
        event_id = %event.id,
        %filter,
        %format,
        count = selected.len(),
        path = %path.display(),
        "Exported participants"
    );
    Ok(path)
}

fn presence_label(participant: &Participant) -> &'static str {
    if participant.is_present {
        "Oui"
    } else {
        "Non"
    }
}

fn row_values(participant: &Participant, date: impl Fn(&Participant) -> String) -> [String; 8] {
    [
        participant.id.clone(),
        participant.last_name.clone(),
        participant.first_name.clone(),
        participant.email.clone(),
        presence_label(participant).to_string(),
        date(participant),
        participant
            .validation_mode
            .map(|m| m.to_string())
            .unwrap_or_default(),
        participant.source.to_string(),
    ]
}

/// Write the selection as a one-sheet workbook.
///
/// # Errors
///
/// Returns [`Error::XlsxWrite`] if the workbook cannot be built or saved.
pub fn write_xlsx(participants: &[&Participant], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, (title, width)) in (0u16..).zip(XLSX_HEADERS.iter().zip(COLUMN_WIDTHS)) {
        sheet.write_with_format(0, col, *title, &header)?;
        sheet.set_column_width(col, f64::from(width))?;
    }

    for (row, participant) in (1u32..).zip(participants) {
        let values = row_values(participant, |p| {
            p.presence_date
                .as_ref()
                .map(format::date_time_seconds)
                .unwrap_or_default()
        });
        for (col, value) in (0u16..).zip(values.iter()) {
            sheet.write_string(row, col, value)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// Render the selection as semicolon-separated UTF-8 with a BOM.
///
/// # Errors
///
/// Returns a CSV or I/O error if encoding fails.
pub fn render_csv(participants: &[&Participant]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer("\u{feff}".as_bytes().to_vec());

    writer.write_record(CSV_HEADERS)?;
    for participant in participants {
        writer.write_record(row_values(participant, |p| {
            p.presence_date
                .as_ref()
                .map(format::date_time)
                .unwrap_or_default()
        }))?;
    }

    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::participant::{Source, ValidationMode};

    fn roster() -> Vec<Participant> {
        let mut present = Participant {
            last_name: "Martin".to_string(),
            first_name: "Claire".to_string(),
            email: "claire@example.fr".to_string(),
            ..Participant::new("A-1", Source::Import)
        };
        present.mark_present(ValidationMode::Qr, Utc::now());

        let absent = Participant {
            last_name: "Durand; fils".to_string(),
            first_name: "Paul".to_string(),
            ..Participant::new("A-2", Source::Manual)
        };
        vec![present, absent]
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_select_filters() {
        let roster = roster();
        assert_eq!(select(&roster, ParticipantFilter::All).unwrap().len(), 2);
        assert_eq!(
            select(&roster, ParticipantFilter::Present).unwrap()[0].id,
            "A-1"
        );
        assert_eq!(
            select(&roster, ParticipantFilter::Manual).unwrap()[0].id,
            "A-2"
        );
    }

    #[test]
    fn test_select_empty_is_error() {
        let err = select(&[], ParticipantFilter::All).unwrap_err();
        assert!(matches!(err, Error::NothingToExport));
        assert!(err.is_warning());
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(
            export_file_name("Formation  Azure 2025", ExportFormat::Xlsx, today()),
            "export_Formation_Azure_2025_2025-03-14.xlsx"
        );
        assert_eq!(
            export_file_name("Atelier R/D", ExportFormat::Csv, today()),
            "export_Atelier_R-D_2025-03-14.csv"
        );
    }

    #[test]
    fn test_render_csv() {
        let roster = roster();
        let selected: Vec<&Participant> = roster.iter().collect();
        let bytes = render_csv(&selected).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with('\u{feff}'));
        let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(
            lines[0],
            "ID;Nom;Prénom;Email;Présent;Date validation;Mode;Source"
        );
        assert!(lines[1].starts_with("A-1;Martin;Claire;claire@example.fr;Oui;"));
        assert!(lines[1].ends_with(";qr;import"));
        assert_eq!(lines[2], "A-2;\"Durand; fils\";Paul;;Non;;;manual");
        assert!(!text.contains('\r'));
    }

    #[test]
    fn test_export_event_writes_files() {
        let dir = std::env::temp_dir().join(format!("emargement_export_test_{}", std::process::id()));
        let event = Event {
            participants: roster(),
            ..crate::event::Event::from_draft(crate::event::EventDraft::new(
                "Formation Azure",
                crate::event::parse_event_date("2025-03-14T09:00").unwrap(),
            ))
            .unwrap()
        };

        let csv_path =
            export_event(&event, ParticipantFilter::Present, ExportFormat::Csv, &dir, today())
                .unwrap();
        assert!(csv_path.ends_with("export_Formation_Azure_2025-03-14.csv"));
        assert!(csv_path.exists());

        let xlsx_path =
            export_event(&event, ParticipantFilter::All, ExportFormat::Xlsx, &dir, today())
                .unwrap();
        assert!(xlsx_path.exists());

        // Written workbooks read back as rosters
        let rows = crate::roster::read_rows(&xlsx_path).unwrap();
        assert_eq!(rows[0][6], "Mode validation");
        assert_eq!(rows[1][0], "A-1");
        assert_eq!(rows[2][4], "Non");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_export_event_nothing_selected_writes_nothing() {
        let dir = std::env::temp_dir().join(format!("emargement_export_empty_{}", std::process::id()));
        let event = crate::event::Event::from_draft(crate::event::EventDraft::new(
            "Vide",
            crate::event::parse_event_date("2025-03-14").unwrap(),
        ))
        .unwrap();

        let err = export_event(&event, ParticipantFilter::All, ExportFormat::Csv, &dir, today())
            .unwrap_err();
        assert!(matches!(err, Error::NothingToExport));
        assert!(!dir.exists());
    }

    #[test]
    fn test_format_serde() {
        let format: ExportFormat = serde_json::from_str("\"csv\"").unwrap();
        assert_eq!(format, ExportFormat::Csv);
        assert_eq!(ExportFormat::default().to_string(), "xlsx");
    }
}
