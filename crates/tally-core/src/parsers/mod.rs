//! Bank export parsers and the registry that picks between them
//!
//! Each supported institution implements [`BankParser`]: a cheap `detect`
//! pass over a sample of rows, a structural `validate`, and a `parse` that
//! never fails outright but collects row-scoped errors instead.
//!
//! The set of parsers is closed: every [`Bank`] variant has exactly one
//! implementation, held by [`Registry`] in declaration order.

mod amex;
mod cibc;
pub mod utils;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{
    Bank, BankParserMeta, Confidence, DetectionResult, ParseResult, SourceFile, ValidationResult,
};

pub use amex::AmexParser;
pub use cibc::CibcParser;
pub use utils::Row;

/// How many data rows a detector looks at
pub const DETECTION_SAMPLE: usize = 10;

/// Detection, validation and extraction for one institution's export format
pub trait BankParser: Send + Sync {
    fn meta(&self) -> &'static BankParserMeta;

    /// Whether the file name alone hints at this institution
    fn matches_filename(&self, _name: &str) -> bool {
        false
    }

    fn detect(&self, file: &SourceFile, rows: &[Row]) -> DetectionResult;

    fn validate(&self, file: &SourceFile, rows: &[Row]) -> ValidationResult;

    fn parse(&self, file: &SourceFile, rows: &[Row]) -> ParseResult;
}

/// Turn sampled-row counts into a confidence tier with a reason
pub(crate) fn detection_from_counts(
    label: &str,
    matched: usize,
    sampled: usize,
    high_reason: &str,
) -> DetectionResult {
    if sampled == 0 {
        return DetectionResult::not_detected("No valid data rows found");
    }

    let confidence = Confidence::from_ratio(matched as f64 / sampled as f64);
    let reason = match confidence {
        Confidence::High => high_reason.to_string(),
        Confidence::Medium => format!("File partially matches {} format", label),
        Confidence::Low => format!("File may be {} format", label),
        Confidence::None => format!("File does not match {} format", label),
    };

    DetectionResult {
        detected: confidence != Confidence::None,
        confidence,
        reason,
    }
}

/// Best parser for a file, as chosen by [`Registry::detect`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub bank: Bank,
    pub confidence: Confidence,
    pub reason: String,
    /// Other parsers that scored the same tier; the caller may prefer one
    pub alternatives: Vec<Bank>,
    /// Bank suggested by the file name, if any
    pub filename_match: Option<Bank>,
}

impl Detection {
    pub fn is_ambiguous(&self) -> bool {
        !self.alternatives.is_empty()
    }
}

/// Per-parser detection outcome, for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct ParserReport {
    pub bank: Bank,
    pub result: DetectionResult,
}

static AMEX: AmexParser = AmexParser;
static CIBC: CibcParser = CibcParser;

/// The closed set of known parsers
#[derive(Clone)]
pub struct Registry {
    parsers: Vec<&'static dyn BankParser>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// All built-in parsers, in tie-break order
    pub fn new() -> Self {
        Self {
            parsers: vec![&AMEX, &CIBC],
        }
    }

    pub fn parsers(&self) -> impl Iterator<Item = &'static dyn BankParser> + '_ {
        self.parsers.iter().copied()
    }

    pub fn metas(&self) -> Vec<&'static BankParserMeta> {
        self.parsers.iter().map(|p| p.meta()).collect()
    }

    pub fn get(&self, bank: Bank) -> &'static dyn BankParser {
        match bank {
            Bank::Amex => &AMEX,
            Bank::Cibc => &CIBC,
        }
    }

    /// Look up a parser by its id, case-insensitively
    pub fn by_id(&self, id: &str) -> Result<&'static dyn BankParser> {
        let bank: Bank = id
            .parse()
            .map_err(|_| Error::UnknownParser(id.to_string()))?;
        Ok(self.get(bank))
    }

    /// Bank whose filename pattern matches, first in declaration order
    pub fn filename_hint(&self, file: &SourceFile) -> Option<Bank> {
        self.parsers
            .iter()
            .find(|p| p.matches_filename(&file.name))
            .map(|p| p.meta().id)
    }

    /// Run every parser's detector
    pub fn detect_all(&self, file: &SourceFile, rows: &[Row]) -> Vec<ParserReport> {
        self.parsers
            .iter()
            .map(|p| {
                let result = p.detect(file, rows);
                debug!(
                    "{} detection: {} ({})",
                    p.meta().id,
                    result.confidence,
                    result.reason
                );
                ParserReport {
                    bank: p.meta().id,
                    result,
                }
            })
            .collect()
    }

    /// Pick the parser with the highest confidence tier.
    ///
    /// Ties go to the parser declared first; the others are listed in
    /// `alternatives`. Returns `None` when no parser detected the file.
    pub fn detect(&self, file: &SourceFile, rows: &[Row]) -> Option<Detection> {
        let reports = self.detect_all(file, rows);

        let best = reports
            .iter()
            .filter(|r| r.result.detected && r.result.confidence > Confidence::None)
            .map(|r| r.result.confidence)
            .max()?;

        let mut tied = reports
            .into_iter()
            .filter(|r| r.result.detected && r.result.confidence == best);
        let winner = tied.next()?;
        let alternatives = tied.map(|r| r.bank).collect();

        Some(Detection {
            bank: winner.bank,
            confidence: best,
            reason: winner.result.reason,
            alternatives,
            filename_match: self.filename_hint(file),
        })
    }

    pub fn validate(&self, bank: Bank, file: &SourceFile, rows: &[Row]) -> ValidationResult {
        self.get(bank).validate(file, rows)
    }

    pub fn parse(&self, bank: Bank, file: &SourceFile, rows: &[Row]) -> ParseResult {
        self.get(bank).parse(file, rows)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Row;

    pub fn row(cells: &[&str]) -> Row {
        cells.iter().map(|s| s.to_string()).collect()
    }

    /// 12 metadata rows followed by the given AMEX data rows
    pub fn amex_rows(data: &[&[&str]]) -> Vec<Row> {
        let mut rows: Vec<Row> = (0..11)
            .map(|i| row(&[format!("Statement info {}", i).as_str()]))
            .collect();
        rows.push(row(&[
            "Date",
            "Date Processed",
            "Description",
            "Amount",
            "Foreign Spend Amount",
            "Commission",
            "Exchange Rate",
            "Merchant",
            "Merchant Address",
            "Additional Information",
        ]));
        rows.extend(data.iter().map(|r| row(r)));
        rows
    }

    pub const COFFEE: &[&str] = &[
        "16 Dec. 2025",
        "16 Dec. 2025",
        "Coffee Shop",
        "$4.50",
        "",
        "",
        "",
        "",
        "",
        "Local purchase",
    ];
}
