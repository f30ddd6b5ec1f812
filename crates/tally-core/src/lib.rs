//! Tally Core Library
//!
//! Transaction ingestion for the Tally personal finance tool:
//! - Bank export parsers and format detection
//! - Bulk import with signature-based duplicate filtering
//! - Keyword categorization with conflict tracking
//! - SQLite storage for categories, transactions, imports and budgets

pub mod categorize;
pub mod db;
pub mod error;
pub mod import;
pub mod models;
pub mod parsers;

pub use categorize::{Categorizer, KeywordMatcher};
pub use db::{Database, SystemCategories, TransactionFilter};
pub use error::{Error, Result};
pub use import::{file_checksum, signature, ImportOptions, ImportSummary, Importer};
pub use parsers::{BankParser, Detection, ParserReport, Registry, Row};
