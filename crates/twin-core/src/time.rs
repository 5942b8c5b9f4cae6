//! UTC timestamps in the `YYYY-MM-DD HH:MM:SS` form SQLite's `datetime('now')`
//! produces, so in-memory and persisted repositories report times alike.

use std::time::{SystemTime, UNIX_EPOCH};

const SECS_PER_DAY: u64 = 86_400;
const EPOCH_YEAR: u64 = 1970;
const MONTH_DAYS: [u64; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Current UTC time formatted like `datetime('now')`.
pub fn timestamp_now() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_utc(secs)
}

/// Format Unix seconds as `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_utc(secs: u64) -> String {
    let (year, month, day) = calendar_date(secs / SECS_PER_DAY);
    let clock = secs % SECS_PER_DAY;
    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02}",
        clock / 3600,
        clock % 3600 / 60,
        clock % 60
    )
}

fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Walk whole years, then whole months, off the day count since 1970-01-01.
fn calendar_date(mut days: u64) -> (u64, u64, u64) {
    let mut year = EPOCH_YEAR;
    loop {
        let len = if is_leap(year) { 366 } else { 365 };
        if days < len {
            break;
        }
        days -= len;
        year += 1;
    }

    let mut month = 1;
    for (i, &base) in MONTH_DAYS.iter().enumerate() {
        let len = if i == 1 && is_leap(year) { base + 1 } else { base };
        if days < len {
            break;
        }
        days -= len;
        month += 1;
    }
    (year, month, days + 1)
}
