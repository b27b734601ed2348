//! Reading roster files into rows of text cells.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, TimeDelta};
use tracing::debug;

use crate::error::{Error, Result};

/// Delimiters tried when sniffing a CSV header line, in tie-break order.
const CSV_DELIMITERS: [u8; 3] = [b';', b',', b'\t'];

/// Read the first sheet of a roster file as text rows.
///
/// Spreadsheets (`xlsx`, `xlsm`, `xls`, `xlsb`, `ods`) go through calamine;
/// `csv` and `txt` files are parsed with a sniffed delimiter.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for other extensions, or the
/// underlying reader error.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let rows = match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_workbook(path)?,
        "csv" | "txt" => {
            let bytes = std::fs::read(path)?;
            read_csv(&String::from_utf8_lossy(&bytes))?
        }
        _ => {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };

    debug!(path = %path.display(), rows = rows.len(), "Read roster file");
    Ok(rows)
}

fn read_workbook(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)?;
    let Some(first_sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(Vec::new());
    };

    let range = workbook.worksheet_range(&first_sheet)?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

/// Render a spreadsheet cell as roster text.
pub(crate) fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => format_number(*n),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => serial_to_iso(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(n: f64) -> String {
    // Integral values without decimals
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Convert an Excel serial date (1900 system) to ISO text.
#[allow(clippy::cast_possible_truncation)]
fn serial_to_iso(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return serial.to_string();
    };
    if !serial.is_finite() {
        return serial.to_string();
    }
    let seconds = (serial * 86_400.0).round() as i64;
    let Some(moment) = TimeDelta::try_seconds(seconds).and_then(|d| epoch.checked_add_signed(d))
    else {
        return serial.to_string();
    };

    if seconds % 86_400 == 0 {
        moment.format("%Y-%m-%d").to_string()
    } else {
        moment.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Parse CSV text, stripping a UTF-8 BOM and sniffing the delimiter.
pub(crate) fn read_csv(text: &str) -> Result<Vec<Vec<String>>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let delimiter = sniff_delimiter(text.lines().next().unwrap_or_default());

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        // Keep skipped empty lines as blank rows, as spreadsheets do
        if let Some(position) = record.position().filter(|_| !rows.is_empty()) {
            let offset = usize::try_from(position.byte()).unwrap_or(text.len());
            rows.extend(std::iter::repeat_with(Vec::new).take(empty_lines_at(text, offset)));
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Count the empty lines starting at `offset`.
///
/// A `\n` finishing the previous line's `\r\n` is not counted.
fn empty_lines_at(text: &str, offset: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = offset;
    if i > 0 && bytes.get(i - 1) == Some(&b'\r') && bytes.get(i) == Some(&b'\n') {
        i += 1;
    }

    let mut count = 0;
    loop {
        match bytes.get(i) {
            Some(b'\r') if bytes.get(i + 1) == Some(&b'\n') => i += 2,
            Some(b'\r' | b'\n') => i += 1,
            _ => break,
        }
        count += 1;
    }
    count
}

/// Pick the most frequent delimiter in the header line, `,` when none occurs.
fn sniff_delimiter(header_line: &str) -> u8 {
    let mut best = (b',', 0);
    for delimiter in CSV_DELIMITERS {
        let count = header_line.bytes().filter(|b| *b == delimiter).count();
        if count > best.1 {
            best = (delimiter, count);
        }
    }
    best.0
}
