//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Import bank exports and keep them categorized
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Personal finance transaction importer and categorizer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, env = "TALLY_DB", default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// User whose data to work on
    #[arg(long, env = "TALLY_USER", default_value_t = 1, global = true)]
    pub user: i64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and seed system categories
    Init,

    /// List supported bank formats
    Banks,

    /// Show how each bank parser scores a file
    Detect {
        /// CSV or Excel file to inspect
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Import transactions from a bank export
    Import {
        /// CSV or Excel file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Bank format (auto-detected if not specified)
        #[arg(short, long)]
        bank: Option<String>,

        /// Keep rows that look like ones already imported
        #[arg(long)]
        allow_duplicates: bool,

        /// Skip keyword categorization after import
        #[arg(long)]
        no_categorize: bool,

        /// Print the import summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-run keyword matching
    Recategorize {
        /// Include already categorized transactions (everything but Excluded)
        #[arg(long)]
        all: bool,
    },

    /// Manage categories and their keywords
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Review transactions that match more than one category
    Conflicts {
        #[command(subcommand)]
        action: Option<ConflictsAction>,
    },

    /// Manage import batches
    Imports {
        #[command(subcommand)]
        action: Option<ImportsAction>,
    },

    /// Manage transactions (list, add, delete)
    Transactions {
        #[command(subcommand)]
        action: Option<TransactionsAction>,
    },

    /// Manage budgets
    Budgets {
        #[command(subcommand)]
        action: Option<BudgetsAction>,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories in display order
    List,

    /// Add a category
    Add {
        name: String,
        /// Comma-separated keywords (e.g., "starbucks,tim hortons")
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
    },

    /// Rename a category
    Rename {
        /// Category name or ID
        category: String,
        new_name: String,
    },

    /// Replace a category's keywords
    Keywords {
        /// Category name or ID
        category: String,
        /// Comma-separated keywords; pass "" to clear
        #[arg(value_delimiter = ',')]
        keywords: Vec<String>,
    },

    /// Add one keyword to a category
    AddKeyword {
        /// Category name or ID
        category: String,
        keyword: String,
    },

    /// Remove one keyword from a category
    RemoveKeyword {
        /// Category name or ID
        category: String,
        keyword: String,
    },

    /// Delete a category (its transactions become uncategorized)
    Delete {
        /// Category name or ID
        category: String,
    },

    /// Move a category to another's position
    Move {
        /// Category to move
        category: String,
        /// Category whose position it takes
        #[arg(long)]
        to: String,
    },
}

#[derive(Subcommand)]
pub enum ConflictsAction {
    /// List conflicted transactions with their candidates
    List,

    /// Pick the category for a conflicted transaction
    Resolve {
        transaction_id: i64,
        /// Category name or ID
        category: String,
    },
}

#[derive(Subcommand)]
pub enum ImportsAction {
    /// List import batches, newest first
    List,

    /// Delete an import batch and its transactions
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum TransactionsAction {
    /// List recent transactions
    List {
        /// Maximum number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Only this category (name or ID)
        #[arg(long)]
        category: Option<String>,

        /// Only uncategorized transactions
        #[arg(long)]
        uncategorized: bool,

        /// Search description and match text
        #[arg(long)]
        search: Option<String>,
    },

    /// Add a transaction by hand
    Add {
        /// Date (YYYY-MM-DD)
        date: String,
        description: String,

        /// Money out
        #[arg(long, default_value_t = 0.0)]
        out: f64,

        /// Money in
        #[arg(long = "in", default_value_t = 0.0)]
        amount_in: f64,

        /// Category name or ID
        #[arg(long)]
        category: Option<String>,
    },

    /// Delete transactions by ID
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Subcommand)]
pub enum BudgetsAction {
    /// List budgets for a period (YYYY for yearly, YYYY-MM for monthly)
    List { period: String },

    /// Set a budget
    Set {
        /// Category name or ID
        category: String,
        /// YYYY or YYYY-MM
        period: String,
        amount: f64,
    },

    /// Delete a budget by ID
    Delete { id: i64 },

    /// Copy budgets from one period to another, keeping existing ones
    Copy {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
}
