//! CIBC account export
//!
//! Headerless, four columns: Date, Description, Money Out, Money In.
//! Dates are `MM/DD/YYYY` or `YYYY-MM-DD`; amounts carry no currency symbol.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::utils::{
    cell, is_empty_row, parse_amount, parse_date_iso, parse_date_mdy, sample_rows,
};
use super::{detection_from_counts, BankParser, Row, DETECTION_SAMPLE};
use crate::models::{
    Bank, BankParserMeta, DetectionResult, ParseResult, ParsedTransaction, SourceFile,
    ValidationResult,
};

const COLUMNS: usize = 4;

static META: BankParserMeta = BankParserMeta {
    id: Bank::Cibc,
    name: "CIBC",
    country: "CA",
    supported_extensions: &[".csv", ".xlsx", ".xls"],
    format_description: "4 columns: Date, Description, Money Out, Money In. No headers.",
    export_instructions_url: Some(
        "https://www.cibc.com/en/personal-banking/ways-to-bank/ways-to-bank-faq/download-transactions.html",
    ),
};

fn mdy_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").expect("valid regex"))
}

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"))
}

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)cibc").expect("valid regex"))
}

fn looks_like_date(s: &str) -> bool {
    mdy_re().is_match(s) || iso_re().is_match(s)
}

pub struct CibcParser;

impl BankParser for CibcParser {
    fn meta(&self) -> &'static BankParserMeta {
        &META
    }

    fn matches_filename(&self, name: &str) -> bool {
        filename_re().is_match(name)
    }

    fn detect(&self, _file: &SourceFile, rows: &[Row]) -> DetectionResult {
        if rows.is_empty() {
            return DetectionResult::not_detected("File is empty");
        }

        let mut sampled = 0;
        let mut matched = 0;
        for row in sample_rows(rows, COLUMNS, DETECTION_SAMPLE) {
            sampled += 1;
            let has_date = looks_like_date(cell(row, 0));
            let no_symbols = !cell(row, 2).contains('$') && !cell(row, 3).contains('$');
            let width_ok = (COLUMNS..=6).contains(&row.len());
            let has_description = !cell(row, 1).is_empty();
            if has_date && no_symbols && width_ok && has_description {
                matched += 1;
            }
        }

        detection_from_counts(
            "CIBC",
            matched,
            sampled,
            "File structure matches CIBC format (date format, 4 columns, no currency symbols)",
        )
    }

    fn validate(&self, _file: &SourceFile, rows: &[Row]) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if rows.is_empty() {
            errors.push("File is empty".to_string());
            return ValidationResult::new(errors, warnings);
        }

        let mut valid = 0;
        let mut bad_dates = 0;
        let mut missing_descriptions = 0;
        for (i, row) in rows.iter().enumerate().take(DETECTION_SAMPLE) {
            if row.is_empty() {
                continue;
            }
            if row.len() < COLUMNS {
                errors.push(format!(
                    "Row {} has {} columns, expected 4 (Date, Description, Money Out, Money In)",
                    i + 1,
                    row.len()
                ));
                continue;
            }

            valid += 1;
            if !looks_like_date(cell(row, 0)) {
                bad_dates += 1;
            }
            if cell(row, 1).is_empty() {
                missing_descriptions += 1;
            }
        }

        if valid == 0 {
            errors.push(
                "No valid rows found. CIBC files need 4 columns: Date, Description, Money Out, Money In"
                    .to_string(),
            );
            return ValidationResult::new(errors, warnings);
        }
        if bad_dates * 2 > valid {
            errors.push(
                "Date format doesn't match CIBC format (expected: MM/DD/YYYY or YYYY-MM-DD)"
                    .to_string(),
            );
        }
        if missing_descriptions * 2 > valid {
            warnings.push("Some rows are missing descriptions".to_string());
        }

        ValidationResult::new(errors, warnings)
    }

    fn parse(&self, _file: &SourceFile, rows: &[Row]) -> ParseResult {
        let mut result = ParseResult::default();

        for (i, row) in rows.iter().enumerate() {
            let row_num = i + 1;
            if row.len() < COLUMNS || is_empty_row(row) {
                continue;
            }

            let date_str = cell(row, 0);
            let description = cell(row, 1);
            if date_str.is_empty() || description.is_empty() {
                result
                    .errors
                    .push(format!("Row {}: Missing date or description", row_num));
                continue;
            }

            let date = if iso_re().is_match(date_str) {
                parse_date_iso(date_str)
            } else if mdy_re().is_match(date_str) {
                parse_date_mdy(date_str)
            } else {
                None
            };
            let Some(date) = date else {
                result
                    .errors
                    .push(format!("Row {}: Invalid date format \"{}\"", row_num, date_str));
                continue;
            };

            let amount_out = parse_amount(cell(row, 2)).abs();
            let amount_in = parse_amount(cell(row, 3)).abs();

            result.transactions.push(ParsedTransaction::new(
                date,
                description,
                description,
                amount_out,
                amount_in,
            ));
        }

        if result.transactions.is_empty() && result.errors.is_empty() {
            result
                .errors
                .push("No valid transactions found in file".to_string());
        }

        debug!(
            "Parsed {} CIBC transactions ({} row errors)",
            result.transactions.len(),
            result.errors.len()
        );
        result
    }
}
