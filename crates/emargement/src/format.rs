//! French date formatting for display and export.

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};

const WEEKDAYS: [&str; 7] = [
    "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche",
];

const MONTHS: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

/// Long French date, e.g. `vendredi 14 mars 2025`.
#[must_use]
pub fn long_date(date: NaiveDate) -> String {
    let weekday = WEEKDAYS[date.weekday().num_days_from_monday() as usize];
    let month = MONTHS[date.month0() as usize];
    format!("{weekday} {} {month} {}", date.day(), date.year())
}

/// Short date and time in local time, e.g. `14/03/2025 09:05`.
#[must_use]
pub fn date_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%d/%m/%Y %H:%M").to_string()
}

/// Date and time with seconds in local time, e.g. `14/03/2025 09:05:12`.
#[must_use]
pub fn date_time_seconds(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%d/%m/%Y %H:%M:%S")
        .to_string()
}
