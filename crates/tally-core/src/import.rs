//! Bulk import with duplicate filtering, and the file import pipeline
//!
//! Duplicates are found by signature: day, description and both amounts.
//! Two transactions with the same signature are treated as the same
//! transaction, so importing the same file twice adds nothing the second time.

use std::collections::HashSet;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::categorize::Categorizer;
use crate::db::{categories, imports, transactions, Database};
use crate::error::{Error, Result};
use crate::models::{
    Bank, BulkImportOptions, BulkImportResult, Confidence, ParsedTransaction, RecategorizeMode,
    RecategorizeResult, SourceFile, TransactionSource, UserId,
};
use crate::parsers::{Registry, Row};

/// Dedup key for a transaction
pub fn signature(date: NaiveDate, description: &str, amount_out: f64, amount_in: f64) -> String {
    format!(
        "{}|{}|{}|{}",
        date.format("%Y-%m-%d"),
        description,
        amount_out,
        amount_in
    )
}

/// SHA-256 of raw file bytes, hex encoded
pub fn file_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Stage and insert parsed rows on an open connection
pub(crate) fn bulk_insert(
    conn: &Connection,
    user_id: UserId,
    parsed: &[ParsedTransaction],
    options: &BulkImportOptions,
) -> Result<BulkImportResult> {
    // Only stored rows count as duplicates, so repeats within one file are kept
    let existing: HashSet<String> = if options.skip_duplicates {
        transactions::signatures(conn, user_id)?
    } else {
        HashSet::new()
    };

    let mut result = BulkImportResult {
        total: parsed.len(),
        ..Default::default()
    };

    for tx in parsed {
        if options.skip_duplicates {
            let sig = signature(tx.date, &tx.description, tx.amount_out, tx.amount_in);
            if existing.contains(&sig) {
                debug!("Skipping duplicate: {} {}", tx.date, tx.description);
                result.skipped += 1;
                continue;
            }
        }
        transactions::insert(conn, user_id, tx, None, options.import_id, options.source)?;
        result.inserted += 1;
    }

    Ok(result)
}

impl Database {
    /// Insert parsed transactions in one transaction, skipping signatures the
    /// user already has (unless `skip_duplicates` is off)
    pub fn bulk_import(
        &self,
        user_id: UserId,
        parsed: &[ParsedTransaction],
        options: BulkImportOptions,
    ) -> Result<BulkImportResult> {
        let result = self.with_transaction(|conn| bulk_insert(conn, user_id, parsed, &options))?;
        info!(
            "Bulk import: {} inserted, {} skipped of {}",
            result.inserted, result.skipped, result.total
        );
        Ok(result)
    }
}

/// How `Importer::import_rows` should treat a file
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Force a parser instead of detecting one
    pub bank: Option<Bank>,
    pub skip_duplicates: bool,
    /// Run a recategorize pass over uncategorized transactions afterwards
    pub categorize: bool,
    /// Checksum of the raw file, stored on the import record
    pub checksum: Option<String>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            bank: None,
            skip_duplicates: true,
            categorize: true,
            checksum: None,
        }
    }
}

/// Outcome of importing one file
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub bank: Bank,
    /// None when nothing new was inserted
    pub import_id: Option<i64>,
    pub result: BulkImportResult,
    pub row_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub categorization: Option<RecategorizeResult>,
}

/// End-to-end file import: detect, validate, parse, persist, categorize
pub struct Importer<'a> {
    db: &'a Database,
    registry: Registry,
}

impl<'a> Importer<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Pick the parser: the forced one, or the best detection at medium or above
    fn choose_bank(&self, file: &SourceFile, rows: &[Row], forced: Option<Bank>) -> Result<Bank> {
        if let Some(bank) = forced {
            return Ok(bank);
        }

        let detection = self.registry.detect(file, rows).ok_or_else(|| {
            Error::UnrecognizedFormat(format!(
                "Could not detect the format of {}. Choose the bank manually.",
                file.name
            ))
        })?;

        if detection.confidence < Confidence::Medium {
            return Err(Error::UnrecognizedFormat(format!(
                "{} only loosely matches {} ({}). Choose the bank manually.",
                file.name, detection.bank, detection.reason
            )));
        }
        if detection.is_ambiguous() {
            warn!(
                "{} also matches {:?}; using {}",
                file.name, detection.alternatives, detection.bank
            );
        }
        Ok(detection.bank)
    }

    /// Import a decoded file for a user
    pub fn import_rows(
        &self,
        user_id: UserId,
        file: &SourceFile,
        rows: &[Row],
        options: &ImportOptions,
    ) -> Result<ImportSummary> {
        let bank = self.choose_bank(file, rows, options.bank)?;

        let validation = self.registry.validate(bank, file, rows);
        if !validation.is_valid {
            return Err(Error::Validation(validation.errors));
        }

        let parsed = self.registry.parse(bank, file, rows);
        if !parsed.errors.is_empty() {
            warn!("{} rows in {} could not be read", parsed.errors.len(), file.name);
        }

        let source = TransactionSource::Bank(bank);
        let (import_id, result) = self.db.with_transaction(|conn| {
            categories::ensure_system(conn, user_id)?;
            let import_id =
                imports::create(conn, user_id, &file.name, source, options.checksum.as_deref())?;
            let result = bulk_insert(
                conn,
                user_id,
                &parsed.transactions,
                &BulkImportOptions {
                    skip_duplicates: options.skip_duplicates,
                    import_id: Some(import_id),
                    source,
                },
            )?;

            if result.inserted == 0 {
                imports::remove(conn, import_id)?;
                return Ok((None, result));
            }
            imports::refresh_totals(conn, import_id)?;
            Ok((Some(import_id), result))
        })?;

        info!(
            "Imported {} from {}: {} new, {} duplicates",
            file.name, bank, result.inserted, result.skipped
        );

        let categorization = if options.categorize && result.inserted > 0 {
            Some(Categorizer::new(self.db).recategorize(user_id, RecategorizeMode::Uncategorized)?)
        } else {
            None
        };

        Ok(ImportSummary {
            bank,
            import_id,
            result,
            row_errors: parsed.errors,
            warnings: validation.warnings,
            categorization,
        })
    }
}
