//! Domain models for Tally

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Opaque id of the authenticated user that owns data
pub type UserId = i64;

/// Name of the protected fallback category
pub const UNCATEGORIZED: &str = "Uncategorized";
/// Name of the protected category that bulk recategorization skips
pub const EXCLUDED: &str = "Excluded";
/// Name of the system category that still takes part in keyword matching
pub const INCOME: &str = "Income";

/// Supported institutions for file import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bank {
    Amex,
    Cibc,
}

impl Bank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amex => "AMEX",
            Self::Cibc => "CIBC",
        }
    }
}

impl std::str::FromStr for Bank {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "amex" | "americanexpress" | "american_express" => Ok(Self::Amex),
            "cibc" => Ok(Self::Cibc),
            _ => Err(format!("Unknown bank: {}", s)),
        }
    }
}

impl std::fmt::Display for Bank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Where a transaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TransactionSource {
    /// Entered by hand
    #[default]
    Manual,
    /// Imported from an institution's export file
    Bank(Bank),
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::Bank(bank) => bank.as_str(),
        }
    }
}

impl std::str::FromStr for TransactionSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("manual") {
            return Ok(Self::Manual);
        }
        s.parse::<Bank>()
            .map(Self::Bank)
            .map_err(|_| format!("Unknown transaction source: {}", s))
    }
}

impl std::fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// ========== Parser Models ==========

/// How sure a parser is that a file belongs to its institution
///
/// Variants are declared weakest first so `Ord` ranks tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Map the fraction of sampled rows that passed every signal to a tier
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= 0.8 {
            Self::High
        } else if ratio >= 0.5 {
            Self::Medium
        } else if ratio >= 0.2 {
            Self::Low
        } else {
            Self::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Descriptor of the file handed to a parser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Lower-cased extension including the leading dot, e.g. ".xlsx"
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
    }
}

/// Static description of a supported export format
#[derive(Debug, Clone, Serialize)]
pub struct BankParserMeta {
    pub id: Bank,
    pub name: &'static str,
    pub country: &'static str,
    pub supported_extensions: &'static [&'static str],
    pub format_description: &'static str,
    pub export_instructions_url: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub detected: bool,
    pub confidence: Confidence,
    pub reason: String,
}

impl DetectionResult {
    pub fn not_detected(reason: impl Into<String>) -> Self {
        Self {
            detected: false,
            confidence: Confidence::None,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// A normalized row produced by a bank parser, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub date: NaiveDate,
    pub description: String,
    /// Text searched by category keywords
    pub match_field: String,
    pub amount_out: f64,
    pub amount_in: f64,
    /// amount_in - amount_out
    pub net_amount: f64,
}

impl ParsedTransaction {
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        match_field: impl Into<String>,
        amount_out: f64,
        amount_in: f64,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            match_field: match_field.into(),
            amount_out,
            amount_in,
            net_amount: amount_in - amount_out,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseResult {
    pub transactions: Vec<ParsedTransaction>,
    /// Row-scoped problems; never fatal
    pub errors: Vec<String>,
}

// ========== Transaction Models ==========

/// A persisted transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub uuid: String,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub description: String,
    pub match_field: String,
    pub amount_out: f64,
    pub amount_in: f64,
    pub net_amount: f64,
    /// None = uncategorized
    pub category_id: Option<i64>,
    pub import_id: Option<i64>,
    pub source: TransactionSource,
    pub created_at: DateTime<Utc>,
}

/// A manually entered transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    /// Defaults to the description
    pub match_field: Option<String>,
    pub amount_out: f64,
    pub amount_in: f64,
    pub category_id: Option<i64>,
}

/// Partial edit of a transaction. `category_id: Some(None)` clears the category.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub match_field: Option<String>,
    pub amount_out: Option<f64>,
    pub amount_in: Option<f64>,
    pub category_id: Option<Option<i64>>,
}

/// Options for `Database::bulk_import`
#[derive(Debug, Clone, Copy)]
pub struct BulkImportOptions {
    pub skip_duplicates: bool,
    pub import_id: Option<i64>,
    pub source: TransactionSource,
}

impl Default for BulkImportOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            import_id: None,
            source: TransactionSource::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkImportResult {
    pub inserted: usize,
    pub skipped: usize,
    pub total: usize,
}

// ========== Category Models ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub uuid: String,
    pub user_id: UserId,
    pub name: String,
    /// Case-insensitive substrings matched against a transaction's match field
    pub keywords: Vec<String>,
    pub order: i64,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Whether keyword rules may auto-assign this category
    pub fn is_matchable(&self) -> bool {
        !self.is_system || self.name == INCOME
    }
}

/// Partial edit of a category
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub order: Option<i64>,
}

/// Which transactions a bulk recategorization pass considers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecategorizeMode {
    /// Only transactions without a category
    #[default]
    Uncategorized,
    /// Everything except transactions in the Excluded category
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecategorizeResult {
    pub processed: usize,
    pub updated: usize,
    pub conflicts: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateCategoryResult {
    /// Transactions newly pointed at a category
    pub assigned: usize,
    /// Transactions reset to uncategorized
    pub uncategorized: usize,
    /// Transactions left unassigned because several categories match
    pub conflicts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteCategoryResult {
    pub deleted: bool,
    pub transactions_reassigned: usize,
    pub budgets_removed: usize,
    /// Conflicts that named the category, settled again without it
    pub conflicts_updated: usize,
}

/// A transaction waiting for the user to pick between matching categories
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub transaction: Transaction,
    pub candidates: Vec<Category>,
}

// ========== Import & Budget Models ==========

/// A batch of transactions created from one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub id: i64,
    pub uuid: String,
    pub user_id: UserId,
    pub file_name: String,
    pub source: TransactionSource,
    pub transaction_count: i64,
    pub total_amount: f64,
    /// SHA-256 of the raw file, when the caller had the bytes
    pub checksum: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: UserId,
    pub category_id: i64,
    pub year: i32,
    /// None = whole-year budget
    pub month: Option<u32>,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
