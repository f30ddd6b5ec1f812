//! American Express (Canada) spreadsheet export
//!
//! Layout:
//!   rows 1-11   statement metadata
//!   row 12      column headers
//!   row 13+     transactions
//!
//! Columns: 0 date ("16 Dec. 2025"), 1 date processed, 2 description,
//! 3 amount ("$4.50", negative for credits), 8 merchant address,
//! 9 additional information.
//!
//! Payments leave column 3 empty and carry the amount in column 2 and the
//! description in column 8.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::utils::{cell, is_empty_row, is_excel_file, parse_amount, parse_date_d_mon_y, sample_rows};
use super::{detection_from_counts, BankParser, Row, DETECTION_SAMPLE};
use crate::models::{
    Bank, BankParserMeta, DetectionResult, ParseResult, ParsedTransaction, SourceFile,
    ValidationResult,
};

const HEADER_ROWS: usize = 12;

static META: BankParserMeta = BankParserMeta {
    id: Bank::Amex,
    name: "American Express",
    country: "CA",
    supported_extensions: &[".xlsx"],
    format_description: "Excel file with data starting at row 13. Date format: DD Mon. YYYY",
    export_instructions_url: Some("https://www.americanexpress.com/en-ca/account/login"),
};

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}\s+[A-Za-z]{3,9}\.?\s+\d{4}$").expect("valid regex"))
}

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)amex|american[\s_-]?express").expect("valid regex"))
}

/// Amount cell: column 3, or column 2 on payment rows
fn amount_cell(row: &[String]) -> &str {
    let amount = cell(row, 3);
    if amount.is_empty() {
        cell(row, 2)
    } else {
        amount
    }
}

pub struct AmexParser;

impl BankParser for AmexParser {
    fn meta(&self) -> &'static BankParserMeta {
        &META
    }

    fn matches_filename(&self, name: &str) -> bool {
        filename_re().is_match(name)
    }

    fn detect(&self, file: &SourceFile, rows: &[Row]) -> DetectionResult {
        if !is_excel_file(file) {
            return DetectionResult::not_detected("AMEX files must be Excel format");
        }
        if rows.len() <= HEADER_ROWS {
            return DetectionResult::not_detected("File too short for AMEX format");
        }

        let mut sampled = 0;
        let mut matched = 0;
        for row in sample_rows(&rows[HEADER_ROWS..], 4, DETECTION_SAMPLE) {
            sampled += 1;
            let has_date = date_re().is_match(cell(row, 0));
            let has_dollar = amount_cell(row).contains('$');
            let wide = row.len() > 6;
            if has_date && (has_dollar || wide) {
                matched += 1;
            }
        }

        detection_from_counts(
            "AMEX",
            matched,
            sampled,
            "File structure matches AMEX format (date format, column structure, $ amounts)",
        )
    }

    fn validate(&self, file: &SourceFile, rows: &[Row]) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if !is_excel_file(file) {
            errors.push(
                "AMEX files must be in Excel format (.xlsx). CSV export is not supported."
                    .to_string(),
            );
            return ValidationResult::new(errors, warnings);
        }
        if rows.is_empty() {
            errors.push("File is empty".to_string());
            return ValidationResult::new(errors, warnings);
        }
        if rows.len() <= HEADER_ROWS {
            errors.push(
                "File doesn't have enough rows. AMEX files should have data starting at row 13."
                    .to_string(),
            );
            return ValidationResult::new(errors, warnings);
        }

        let data = &rows[HEADER_ROWS..];
        let mut valid = 0;
        let mut bad_dates = 0;
        let mut missing_amounts = 0;
        for row in data.iter().take(DETECTION_SAMPLE).filter(|r| r.len() >= 3) {
            valid += 1;
            if !date_re().is_match(cell(row, 0)) {
                bad_dates += 1;
            }
            if amount_cell(row).is_empty() {
                missing_amounts += 1;
            }
        }

        if valid == 0 {
            errors.push("No valid transaction rows found".to_string());
            return ValidationResult::new(errors, warnings);
        }
        if bad_dates * 2 > valid {
            errors.push(
                "Date format doesn't match AMEX format (expected: DD Mon. YYYY, e.g., '16 Dec. 2025')"
                    .to_string(),
            );
        }
        if missing_amounts * 2 > valid {
            warnings.push("Some rows are missing amount values".to_string());
        }

        if let Some(first) = data.iter().find(|r| !r.is_empty()) {
            if first.len() < 4 {
                errors.push(format!(
                    "Expected at least 4 columns for AMEX, found {}",
                    first.len()
                ));
            }
        }

        ValidationResult::new(errors, warnings)
    }

    fn parse(&self, _file: &SourceFile, rows: &[Row]) -> ParseResult {
        let mut result = ParseResult::default();

        for (i, row) in rows.iter().enumerate().skip(HEADER_ROWS) {
            let row_num = i + 1;
            if is_empty_row(row) {
                continue;
            }

            let date_str = cell(row, 0);
            let is_payment = cell(row, 3).is_empty();
            let (description, amount_str) = if is_payment {
                (cell(row, 8), cell(row, 2))
            } else {
                let info = cell(row, 9);
                let description = if info.is_empty() { cell(row, 2) } else { info };
                (description, cell(row, 3))
            };

            if date_str.is_empty() || description.is_empty() {
                result
                    .errors
                    .push(format!("Row {}: Missing date or description", row_num));
                continue;
            }

            let Some(date) = parse_date_d_mon_y(date_str) else {
                result
                    .errors
                    .push(format!("Row {}: Invalid date format \"{}\"", row_num, date_str));
                continue;
            };

            // Positive = charge, negative = payment or refund
            let amount = parse_amount(amount_str);
            let (amount_out, amount_in) = if amount < 0.0 {
                (0.0, amount.abs())
            } else {
                (amount, 0.0)
            };

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
            "Parsed {} AMEX transactions ({} row errors)",
            result.transactions.len(),
            result.errors.len()
        );
        result
    }
}
