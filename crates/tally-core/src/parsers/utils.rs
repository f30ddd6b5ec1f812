//! Cell and row helpers shared by the bank parsers
//!
//! Rows arrive as a matrix of strings from an external decoder (CSV or
//! spreadsheet). Cells may be missing at the end of a row, so every accessor
//! tolerates out-of-range indices.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::SourceFile;

/// One decoded row
pub type Row = Vec<String>;

const EXCEL_EXTENSIONS: &[&str] = &[".xlsx", ".xls", ".xlsm"];

fn slash_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").expect("valid regex"))
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid regex"))
}

fn leading_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?(\d+\.?\d*|\.\d+)").expect("valid regex"))
}

pub fn is_excel_file(file: &SourceFile) -> bool {
    file.extension()
        .is_some_and(|ext| EXCEL_EXTENSIONS.contains(&ext.as_str()))
}

pub fn is_csv_file(file: &SourceFile) -> bool {
    file.extension().is_some_and(|ext| ext == ".csv")
}

/// Trimmed cell text, or "" when the cell is absent
pub fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(|s| s.trim()).unwrap_or("")
}

/// A row with no cells, or only blank ones
pub fn is_empty_row(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// Parse a money string, tolerating currency symbols and either locale.
///
/// Whichever of '.' or ',' appears rightmost is the decimal separator; the
/// other is treated as a thousands separator. Unparseable input yields 0.0.
pub fn parse_amount(s: &str) -> f64 {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    let normalized = if last_comma > last_dot {
        // 1.234,56
        cleaned.replace('.', "").replacen(',', ".", 1)
    } else {
        // 1,234.56
        cleaned.replace(',', "")
    };

    leading_number_re()
        .find(&normalized)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn slash_parts(s: &str) -> Option<(u32, u32, i32)> {
    let caps = slash_date_re().captures(s.trim())?;
    Some((
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    ))
}

/// `M/D/YYYY`
pub fn parse_date_mdy(s: &str) -> Option<NaiveDate> {
    let (month, day, year) = slash_parts(s)?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `D/M/YYYY`
pub fn parse_date_dmy(s: &str) -> Option<NaiveDate> {
    let (day, month, year) = slash_parts(s)?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `YYYY-MM-DD`
pub fn parse_date_iso(s: &str) -> Option<NaiveDate> {
    let caps = iso_date_re().captures(s.trim())?;
    NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )
}

/// Month number from an English month name or abbreviation ("Dec", "Sept", "december")
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().to_lowercase();
    let prefix: String = lower.chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// `D Mon YYYY` or `D Mon. YYYY`, e.g. "16 Dec. 2025", "1 January 2025"
pub fn parse_date_d_mon_y(s: &str) -> Option<NaiveDate> {
    let cleaned = s.replace('.', "");
    let parts: Vec<&str> = cleaned.split_whitespace().collect();
    if parts.len() != 3 {
        return None;
    }
    let day: u32 = parts[0].parse().ok()?;
    let month = month_from_name(parts[1])?;
    let year: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `Mon D, YYYY`, e.g. "Dec 16, 2025"
pub fn parse_date_mon_d_y(s: &str) -> Option<NaiveDate> {
    let cleaned = s.replace(',', "");
    let parts: Vec<&str> = cleaned.split_whitespace().collect();
    if parts.len() != 3 {
        return None;
    }
    let month = month_from_name(parts[0])?;
    let day: u32 = parts[1].parse().ok()?;
    let year: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Up to `limit` non-empty rows with at least `min_cells` cells
pub(crate) fn sample_rows<'a>(
    rows: &'a [Row],
    min_cells: usize,
    limit: usize,
) -> impl Iterator<Item = &'a Row> {
    rows.iter()
        .filter(move |r| r.len() >= min_cells && !is_empty_row(r))
        .take(limit)
}
