//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `resolve_category` - Look up a category by name or ID
//! - `cmd_init` - Initialize the database
//! - `cmd_banks` - List supported formats
//! - `cmd_detect` - Score a file against every parser

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tally_core::models::{Category, SourceFile, UserId};
use tally_core::{Database, Registry};

use super::import::{read_rows, source_file};

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
    Database::open(path_str).context("Failed to open database")
}

/// Find a category by ID or (case-insensitive) name
pub fn resolve_category(db: &Database, user: UserId, name_or_id: &str) -> Result<Category> {
    if let Ok(id) = name_or_id.parse::<i64>() {
        if let Some(category) = db.get_category(user, id)? {
            return Ok(category);
        }
    }

    if let Some(category) = db.get_category_by_name(user, name_or_id)? {
        return Ok(category);
    }

    anyhow::bail!("Category not found: {}", name_or_id)
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' (expected YYYY-MM-DD)", s))
}

/// Parse "YYYY" (yearly) or "YYYY-MM" (monthly)
pub fn parse_period(s: &str) -> Result<(i32, Option<u32>)> {
    let s = s.trim();
    let (year, month) = match s.split_once('-') {
        Some((y, m)) => (y, Some(m)),
        None => (s, None),
    };

    let year: i32 = year
        .parse()
        .with_context(|| format!("Invalid period '{}' (expected YYYY or YYYY-MM)", s))?;
    let month = match month {
        Some(m) => {
            let m: u32 = m
                .parse()
                .with_context(|| format!("Invalid month in period '{}'", s))?;
            if !(1..=12).contains(&m) {
                anyhow::bail!("Invalid month in period '{}'", s);
            }
            Some(m)
        }
        None => None,
    };
    Ok((year, month))
}

pub fn format_period(year: i32, month: Option<u32>) -> String {
    match month {
        Some(m) => format!("{}-{:02}", year, m),
        None => year.to_string(),
    }
}

pub fn cmd_init(db_path: &Path, user: UserId) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;
    db.ensure_user(user)
        .context("Failed to seed system categories")?;
    println!("   Seeded system categories for user {}", user);

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Add categories: tally categories add Coffee --keywords starbucks,tim");
    println!("  2. Import a statement: tally import --file statement.csv");

    Ok(())
}

pub fn cmd_banks() -> Result<()> {
    let registry = Registry::new();

    println!();
    println!("🏦 Supported Formats");
    println!("   ─────────────────────────────────────────────────────────────");

    for meta in registry.metas() {
        println!(
            "   {:<5} │ {} ({}) │ {}",
            meta.id,
            meta.name,
            meta.country,
            meta.supported_extensions.join(", ")
        );
        println!("         {}", meta.format_description);
        if let Some(url) = meta.export_instructions_url {
            println!("         Export: {}", url);
        }
    }

    Ok(())
}

pub fn cmd_detect(file: &Path) -> Result<()> {
    let rows = read_rows(file)?;
    let source: SourceFile = source_file(file);
    let registry = Registry::new();

    println!("🔍 Detecting format of {} ({} rows)...", source.name, rows.len());
    println!();

    for report in registry.detect_all(&source, &rows) {
        let mark = if report.result.detected { "✓" } else { "✗" };
        println!(
            "   {} {:<5} │ {:<6} │ {}",
            mark, report.bank, report.result.confidence, report.result.reason
        );
    }

    println!();
    match registry.detect(&source, &rows) {
        Some(detection) => {
            println!(
                "✅ Best match: {} ({} confidence)",
                detection.bank, detection.confidence
            );
            if detection.is_ambiguous() {
                let others: Vec<String> = detection
                    .alternatives
                    .iter()
                    .map(|b| b.to_string())
                    .collect();
                println!(
                    "   ⚠️  Also matches: {}. Use --bank to choose.",
                    others.join(", ")
                );
            }
            if let Some(hint) = detection.filename_match {
                if hint != detection.bank {
                    println!("   💡 File name suggests {}", hint);
                }
            }
        }
        None => {
            println!("❌ No parser recognized this file. Use --bank to pick one.");
        }
    }

    Ok(())
}
