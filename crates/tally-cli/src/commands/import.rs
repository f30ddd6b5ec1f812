//! File decoding and import command
//!
//! CSV files are read with the `csv` crate (headerless, ragged rows allowed).
//! Spreadsheets are read with `calamine` from their first worksheet. Every
//! cell becomes a string, so the parsers only ever see a row matrix.

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{Data, Reader};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use tally_core::models::{Bank, SourceFile, UserId};
use tally_core::{file_checksum, Database, ImportOptions, Importer, Row};

const SPREADSHEET_EXTENSIONS: &[&str] = &[".xlsx", ".xls", ".xlsm", ".ods"];

/// Convert an Excel date serial to YYYY-MM-DD
pub fn excel_serial_to_date(serial: f64) -> String {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|base| base.checked_add_signed(chrono::Duration::days(serial as i64)))
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

/// Build the descriptor parsers see from a path
pub fn source_file(path: &Path) -> SourceFile {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    SourceFile::new(name)
}

/// Decode CSV text into rows, dropping blank lines
pub fn csv_rows(data: &[u8]) -> Result<Vec<Row>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV line {}", i + 1))?;
        let row: Row = record.iter().map(|c| c.to_string()).collect();
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Decode the first worksheet of a workbook into rows
pub fn workbook_rows(path: &Path) -> Result<Vec<Row>> {
    let mut workbook = calamine::open_workbook_auto(path)
        .with_context(|| format!("Failed to open spreadsheet: {}", path.display()))?;

    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .with_context(|| format!("Spreadsheet has no worksheets: {}", path.display()))?;
    let range = workbook
        .worksheet_range(&first)
        .with_context(|| format!("Failed to read worksheet '{}'", first))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

/// Read a bank export into a row matrix, choosing the decoder by extension
pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let extension = source_file(path).extension().unwrap_or_default();

    if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        workbook_rows(path)
    } else if extension == ".csv" {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        csv_rows(&data)
    } else {
        anyhow::bail!(
            "Unsupported file format: {} (expected .csv, .xlsx, .xls or .xlsm)",
            path.display()
        )
    }
}

pub fn cmd_import(
    db: &Database,
    user: UserId,
    file: &Path,
    bank_str: Option<&str>,
    allow_duplicates: bool,
    no_categorize: bool,
    json: bool,
) -> Result<()> {
    let bank: Option<Bank> = bank_str
        .map(|b| {
            b.parse()
                .map_err(|_| anyhow::anyhow!("Unknown bank format: {}. Run 'tally banks'.", b))
        })
        .transpose()?;

    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to open file: {}", file.display()))?;
    let checksum = file_checksum(&bytes);
    let previous = db.find_import_by_checksum(user, &checksum)?;
    if let Some(previous) = previous.filter(|_| !json) {
        println!(
            "💡 This file was already imported on {} (import {})",
            previous.created_at.format("%Y-%m-%d"),
            previous.id
        );
    }

    let rows = read_rows(file)?;
    let source = source_file(file);
    if !json {
        println!("📥 Importing {} ({} rows)...", source.name, rows.len());
    }

    let options = ImportOptions {
        bank,
        skip_duplicates: !allow_duplicates,
        categorize: !no_categorize,
        checksum: Some(checksum),
    };
    let summary = Importer::new(db)
        .import_rows(user, &source, &rows, &options)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("✅ Import complete! (format: {})", summary.bank);
    println!("   Imported: {}", summary.result.inserted);
    println!("   Skipped (duplicates): {}", summary.result.skipped);

    for warning in &summary.warnings {
        println!("   ⚠️  {}", warning);
    }
    if !summary.row_errors.is_empty() {
        println!("   ⚠️  {} rows could not be read:", summary.row_errors.len());
        for error in summary.row_errors.iter().take(10) {
            println!("      {}", error);
        }
        if summary.row_errors.len() > 10 {
            println!("      ... and {} more", summary.row_errors.len() - 10);
        }
    }

    if let Some(categorization) = summary.categorization {
        println!();
        println!("🏷️  Categorized {} transactions", categorization.updated);
        if categorization.conflicts > 0 {
            println!(
                "   ⚠️  {} match more than one category. Run 'tally conflicts' to review.",
                categorization.conflicts
            );
        }
    }

    Ok(())
}
