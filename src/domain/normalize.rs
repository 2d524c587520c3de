//! Amount and date normalization for broker export cells.
//!
//! Broker exports mix typed spreadsheet cells with locale-formatted strings.
//! Everything here is best-effort: unparsable amounts become `0.0` and
//! unrecognized date strings are passed through unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

/// Spreadsheet day serial of 1970-01-01.
pub const SERIAL_UNIX_EPOCH: f64 = 25569.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A single positional input cell, either already typed or string-encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Trimmed textual form of the cell; empty for `Empty`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.replace('"', "").trim().to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Parse a locale-formatted amount (`.` thousands, `,` decimal).
///
/// `"1.234,56"` becomes `1234.56`. Null, empty and unparsable input yield `0.0`.
pub fn parse_amount(value: &CellValue) -> f64 {
    match value {
        CellValue::Number(n) if n.is_finite() => *n,
        CellValue::Text(s) => parse_amount_str(s),
        _ => 0.0,
    }
}

pub fn parse_amount_str(input: &str) -> f64 {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|&c| c != '.' && c != '"')
        .collect();
    let cleaned = cleaned.replacen(',', ".", 1);
    match leading_float(&cleaned) {
        Some(v) if v.is_finite() && v != 0.0 => v,
        _ => 0.0,
    }
}

/// Longest numeric prefix of `input`, ignoring leading whitespace.
fn leading_float(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().ok()
}

/// Convert a spreadsheet day serial (fraction = time of day) to a UTC timestamp.
///
/// Serials at or below 60 are shifted by one day to skip the fictitious
/// 1900-02-29 of the spreadsheet calendar.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor();
    let offset = if days > 60.0 {
        serial - SERIAL_UNIX_EPOCH
    } else {
        serial - (SERIAL_UNIX_EPOCH - 1.0)
    };
    let millis = (offset * MILLIS_PER_DAY).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64).map(|dt| dt.naive_utc())
}

/// Normalize a date cell to `YYYY-MM-DD`.
///
/// Accepts typed dates, spreadsheet serials and `DD-MM-YYYY`, `DD/MM/YYYY`,
/// `DD.MM.YYYY` or ISO-prefixed strings. Unrecognized strings are returned as-is.
pub fn parse_date_to_iso(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        CellValue::DateTime(dt) => dt.date().format("%Y-%m-%d").to_string(),
        CellValue::Number(n) => match serial_to_datetime(*n) {
            Some(dt) => dt.date().format("%Y-%m-%d").to_string(),
            None => format_number(*n),
        },
        CellValue::Text(s) => parse_date_str(s),
    }
}

pub fn parse_date_str(input: &str) -> String {
    let s = input.trim();
    if s.is_empty() {
        return String::new();
    }
    if let Some((dd, mm, yyyy)) = split_day_first(s, &['-', '/', '.']) {
        return format!("{yyyy}-{mm}-{dd}");
    }
    if let Some(prefix) = iso_prefix(s) {
        return prefix.to_string();
    }
    if let Some(date) = parse_loose_date(s) {
        return date.format("%Y-%m-%d").to_string();
    }
    s.to_string()
}

/// Grouping key for value dates: `DD-MM-YYYY` and `DD/MM/YYYY` become ISO,
/// anything else is kept (trimmed).
pub fn normalize_date_key(input: &str) -> String {
    let s = input.trim();
    match split_day_first(s, &['-', '/']) {
        Some((dd, mm, yyyy)) => format!("{yyyy}-{mm}-{dd}"),
        None => s.to_string(),
    }
}

/// Parse a normalized or day-first date string into a calendar date.
pub fn parse_calendar_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    if let Some(prefix) = iso_prefix(s) {
        return NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok();
    }
    let (dd, mm, yyyy) = split_day_first(s, &['-', '/', '.'])?;
    NaiveDate::from_ymd_opt(yyyy.parse().ok()?, mm.parse().ok()?, dd.parse().ok()?)
}

/// Chronological replay key for a `(date, time)` pair.
///
/// Unparseable dates sort at the Unix epoch; missing time parts default to zero.
pub fn trade_sort_key(date: &str, time: &str) -> NaiveDateTime {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let day = parse_calendar_date(date).unwrap_or(epoch);

    let mut parts = time.trim().split(':').map(|p| p.trim().parse::<u32>().unwrap_or(0));
    let hours = parts.next().unwrap_or(0);
    let minutes = parts.next().unwrap_or(0);
    let seconds = parts.next().unwrap_or(0);
    let clock = NaiveTime::from_hms_opt(hours, minutes, seconds).unwrap_or(NaiveTime::MIN);

    day.and_time(clock)
}

/// Render a time cell as `HH:MM:SS`.
///
/// Values below one are fractions of a day; larger values are full serials whose
/// time-of-day part is used.
pub fn format_time_from_serial(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    if value >= 1.0 {
        return match serial_to_datetime(value) {
            Some(dt) => format!("{:02}:{:02}:{:02}", dt.hour(), dt.minute(), dt.second()),
            None => String::new(),
        };
    }
    let total_seconds = (value * 86_400.0).round() as i64;
    let hours = (total_seconds / 3600) % 24;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Normalize a time cell to `HH:MM:SS` (numeric) or its trimmed text.
pub fn parse_time(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) => format_time_from_serial(*n),
        CellValue::DateTime(dt) => dt.format("%H:%M:%S").to_string(),
        other => other.as_text(),
    }
}

/// Split `DD<sep>MM<sep>YYYY` with exactly 2/2/4 digits.
fn split_day_first<'a>(s: &'a str, seps: &[char]) -> Option<(&'a str, &'a str, &'a str)> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || !s.is_ascii() {
        return None;
    }
    let is_sep = |b: u8| seps.contains(&(b as char));
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if digits(0..2) && is_sep(bytes[2]) && digits(3..5) && is_sep(bytes[5]) && digits(6..10) {
        Some((&s[0..2], &s[3..5], &s[6..10]))
    } else {
        None
    }
}

/// `YYYY-MM-DD` prefix of an ISO-like string.
fn iso_prefix(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() < 10 || !s.is_char_boundary(10) {
        return None;
    }
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if digits(0..4) && bytes[4] == b'-' && digits(5..7) && bytes[7] == b'-' && digits(8..10) {
        Some(&s[..10])
    } else {
        None
    }
}

fn parse_loose_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc().date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.naive_utc().date());
    }
    ["%Y/%m/%d", "%d %b %Y", "%b %d %Y", "%B %d, %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
