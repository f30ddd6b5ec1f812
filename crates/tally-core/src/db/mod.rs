//! Database access layer with connection pooling and schema setup
//!
//! This module is organized by domain:
//! - `categories` - Categories, keyword lists, system category seeding
//! - `transactions` - Transaction CRUD and recategorization queries
//! - `transaction_filter` - Dynamic WHERE builder for transaction listings
//! - `imports` - Import batch records
//! - `budgets` - Per-category budgets
//! - `conflicts` - Pending multi-category keyword matches
//!
//! Composite operations take a `&Connection` so they can run inside the
//! caller's transaction (see [`Database::with_transaction`]).

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::info;

use crate::error::Result;
use crate::models::UserId;

pub(crate) mod budgets;
pub(crate) mod categories;
pub(crate) mod conflicts;
pub(crate) mod imports;
mod transaction_filter;
pub(crate) mod transactions;

pub use categories::SystemCategories;
pub use transaction_filter::{FilterResult, TransactionFilter};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: &str) -> Result<Self> {
        // Foreign keys are per-connection in SQLite, so enable them on every
        // connection the pool hands out.
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a unique temporary file rather than `:memory:` so every pooled
    /// connection sees the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            id
        ));

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::open(&path.to_string_lossy())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run `f` inside a single SQLite transaction.
    ///
    /// Commits when `f` returns `Ok`; any error rolls everything back.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let value = f(&*tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Seed the system categories for a user. Safe to call repeatedly.
    pub fn ensure_user(&self, user_id: UserId) -> Result<SystemCategories> {
        self.with_transaction(|conn| categories::ensure_system(conn, user_id))
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            -- Categories; keywords is a JSON array of strings
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                uuid TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                keywords TEXT NOT NULL DEFAULT '[]',
                sort_order INTEGER NOT NULL DEFAULT 0,
                is_system BOOLEAN NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_user_name
                ON categories(user_id, name COLLATE NOCASE);

            -- Import batches
            CREATE TABLE IF NOT EXISTS imports (
                id INTEGER PRIMARY KEY,
                uuid TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                file_name TEXT NOT NULL,
                source TEXT NOT NULL,
                transaction_count INTEGER NOT NULL DEFAULT 0,
                total_amount REAL NOT NULL DEFAULT 0,
                checksum TEXT,                             -- sha256 of the raw file, if known
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_imports_user ON imports(user_id);
            CREATE INDEX IF NOT EXISTS idx_imports_checksum ON imports(user_id, checksum);

            -- Transactions
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                uuid TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL,
                date DATE NOT NULL,
                description TEXT NOT NULL,
                match_field TEXT NOT NULL,
                amount_out REAL NOT NULL DEFAULT 0,
                amount_in REAL NOT NULL DEFAULT 0,
                net_amount REAL NOT NULL DEFAULT 0,
                signature TEXT NOT NULL,                   -- date|description|out|in
                category_id INTEGER REFERENCES categories(id),
                import_id INTEGER REFERENCES imports(id) ON DELETE CASCADE,
                source TEXT NOT NULL DEFAULT 'Manual',     -- institution code or Manual
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_signature ON transactions(user_id, signature);
            CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_import ON transactions(import_id);

            -- Budgets; month 0 means the whole year
            CREATE TABLE IF NOT EXISTS budgets (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL REFERENCES categories(id),
                year INTEGER NOT NULL,
                month INTEGER NOT NULL DEFAULT 0,
                amount REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, category_id, year, month)
            );

            CREATE INDEX IF NOT EXISTS idx_budgets_period ON budgets(user_id, year, month);

            -- Candidate categories for transactions matching more than one
            CREATE TABLE IF NOT EXISTS transaction_conflicts (
                transaction_id INTEGER NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (transaction_id, category_id)
            );

            CREATE INDEX IF NOT EXISTS idx_conflicts_category ON transaction_conflicts(category_id);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
