//! Transaction operations

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use super::categories::{self, SystemCategories};
use super::conflicts;
use super::transaction_filter::TransactionFilter;
use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::import::signature;
use crate::models::{
    NewTransaction, ParsedTransaction, RecategorizeMode, Transaction, TransactionSource,
    TransactionUpdate, UserId,
};

pub(crate) const TX_COLUMNS: &str = "t.id, t.uuid, t.user_id, t.date, t.description, t.match_field, \
     t.amount_out, t.amount_in, t.net_amount, t.category_id, t.import_id, t.source, t.created_at";

pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(3)?;
    let source_str: String = row.get(11)?;
    let created_at: String = row.get(12)?;

    Ok(Transaction {
        id: row.get(0)?,
        uuid: row.get(1)?,
        user_id: row.get(2)?,
        date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").unwrap_or_default(),
        description: row.get(4)?,
        match_field: row.get(5)?,
        amount_out: row.get(6)?,
        amount_in: row.get(7)?,
        net_amount: row.get(8)?,
        category_id: row.get(9)?,
        import_id: row.get(10)?,
        source: source_str.parse().unwrap_or_default(),
        created_at: parse_datetime(&created_at),
    })
}

/// Insert one parsed row; the caller owns dedup
pub(crate) fn insert(
    conn: &Connection,
    user_id: UserId,
    tx: &ParsedTransaction,
    category_id: Option<i64>,
    import_id: Option<i64>,
    source: TransactionSource,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO transactions (uuid, user_id, date, description, match_field,
                                  amount_out, amount_in, net_amount, signature,
                                  category_id, import_id, source)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            Uuid::new_v4().to_string(),
            user_id,
            tx.date.to_string(),
            tx.description,
            tx.match_field,
            tx.amount_out,
            tx.amount_in,
            tx.net_amount,
            signature(tx.date, &tx.description, tx.amount_out, tx.amount_in),
            category_id,
            import_id,
            source.as_str(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Signatures of every transaction the user already has
pub(crate) fn signatures(
    conn: &Connection,
    user_id: UserId,
) -> Result<std::collections::HashSet<String>> {
    let mut stmt = conn.prepare("SELECT signature FROM transactions WHERE user_id = ?")?;
    let set = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<_, _>>()?;
    Ok(set)
}

pub(crate) fn get(conn: &Connection, user_id: UserId, id: i64) -> Result<Option<Transaction>> {
    let tx = conn
        .query_row(
            &format!(
                "SELECT {} FROM transactions t WHERE t.id = ? AND t.user_id = ?",
                TX_COLUMNS
            ),
            params![id, user_id],
            row_to_transaction,
        )
        .optional()?;
    Ok(tx)
}

pub(crate) fn require(conn: &Connection, user_id: UserId, id: i64) -> Result<Transaction> {
    get(conn, user_id, id)?.ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))
}

fn query(conn: &Connection, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(sql)?;
    let transactions = stmt
        .query_map(params, row_to_transaction)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(transactions)
}

/// Transactions currently pointing at a category
pub(crate) fn in_category(
    conn: &Connection,
    user_id: UserId,
    category_id: i64,
) -> Result<Vec<Transaction>> {
    query(
        conn,
        &format!(
            "SELECT {} FROM transactions t WHERE t.user_id = ? AND t.category_id = ? ORDER BY t.id",
            TX_COLUMNS
        ),
        &[&user_id, &category_id],
    )
}

/// Transactions with no category or the Uncategorized one
pub(crate) fn uncategorized(
    conn: &Connection,
    user_id: UserId,
    system: &SystemCategories,
) -> Result<Vec<Transaction>> {
    query(
        conn,
        &format!(
            "SELECT {} FROM transactions t \
             WHERE t.user_id = ? AND (t.category_id IS NULL OR t.category_id = ?) ORDER BY t.id",
            TX_COLUMNS
        ),
        &[&user_id, &system.uncategorized],
    )
}

/// Selection for a bulk recategorize pass
pub(crate) fn for_recategorize(
    conn: &Connection,
    user_id: UserId,
    mode: RecategorizeMode,
    system: &SystemCategories,
) -> Result<Vec<Transaction>> {
    match mode {
        RecategorizeMode::Uncategorized => uncategorized(conn, user_id, system),
        RecategorizeMode::All => query(
            conn,
            &format!(
                "SELECT {} FROM transactions t \
                 WHERE t.user_id = ? AND (t.category_id IS NULL OR t.category_id != ?) ORDER BY t.id",
                TX_COLUMNS
            ),
            &[&user_id, &system.excluded],
        ),
    }
}

pub(crate) fn set_category(conn: &Connection, id: i64, category_id: Option<i64>) -> Result<()> {
    conn.execute(
        "UPDATE transactions SET category_id = ? WHERE id = ?",
        params![category_id, id],
    )?;
    Ok(())
}

/// Point every transaction in `from` at `to`, returning how many moved
pub(crate) fn reassign_category(
    conn: &Connection,
    user_id: UserId,
    from: i64,
    to: i64,
) -> Result<usize> {
    let moved = conn.execute(
        "UPDATE transactions SET category_id = ? WHERE user_id = ? AND category_id = ?",
        params![to, user_id, from],
    )?;
    Ok(moved)
}

fn check_amount(label: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidData(format!(
            "{} must be a non-negative number",
            label
        )));
    }
    Ok(())
}

fn check_category(conn: &Connection, user_id: UserId, category_id: Option<i64>) -> Result<()> {
    if let Some(id) = category_id {
        categories::require(conn, user_id, id)?;
    }
    Ok(())
}

impl Database {
    /// Insert a manually entered transaction. Duplicates are allowed.
    pub fn insert_transaction(&self, user_id: UserId, new: &NewTransaction) -> Result<Transaction> {
        let description = new.description.trim();
        if description.is_empty() {
            return Err(Error::InvalidData("Description is required".into()));
        }
        check_amount("Money out", new.amount_out)?;
        check_amount("Money in", new.amount_in)?;

        let match_field = new
            .match_field
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(description);
        let parsed = ParsedTransaction::new(
            new.date,
            description,
            match_field,
            new.amount_out,
            new.amount_in,
        );

        self.with_transaction(|conn| {
            categories::ensure_system(conn, user_id)?;
            check_category(conn, user_id, new.category_id)?;
            let id = insert(
                conn,
                user_id,
                &parsed,
                new.category_id,
                None,
                TransactionSource::Manual,
            )?;
            debug!("Inserted manual transaction {}", id);
            require(conn, user_id, id)
        })
    }

    /// Edit a transaction in place; net amount and signature follow the fields
    pub fn update_transaction(
        &self,
        user_id: UserId,
        id: i64,
        update: &TransactionUpdate,
    ) -> Result<Transaction> {
        self.with_transaction(|conn| {
            let mut tx = require(conn, user_id, id)?;

            if let Some(date) = update.date {
                tx.date = date;
            }
            if let Some(ref description) = update.description {
                if description.trim().is_empty() {
                    return Err(Error::InvalidData("Description is required".into()));
                }
                tx.description = description.trim().to_string();
            }
            if let Some(ref match_field) = update.match_field {
                tx.match_field = match_field.trim().to_string();
            }
            if let Some(amount_out) = update.amount_out {
                check_amount("Money out", amount_out)?;
                tx.amount_out = amount_out;
            }
            if let Some(amount_in) = update.amount_in {
                check_amount("Money in", amount_in)?;
                tx.amount_in = amount_in;
            }
            tx.net_amount = tx.amount_in - tx.amount_out;

            conn.execute(
                r#"
                UPDATE transactions
                SET date = ?, description = ?, match_field = ?, amount_out = ?,
                    amount_in = ?, net_amount = ?, signature = ?
                WHERE id = ?
                "#,
                params![
                    tx.date.to_string(),
                    tx.description,
                    tx.match_field,
                    tx.amount_out,
                    tx.amount_in,
                    tx.net_amount,
                    signature(tx.date, &tx.description, tx.amount_out, tx.amount_in),
                    id
                ],
            )?;

            if let Some(category_id) = update.category_id {
                check_category(conn, user_id, category_id)?;
                set_category(conn, id, category_id)?;
                conflicts::clear(conn, id)?;
            }

            require(conn, user_id, id)
        })
    }

    pub fn get_transaction(&self, user_id: UserId, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        get(&conn, user_id, id)
    }

    /// List a user's transactions, newest first
    pub fn list_transactions(
        &self,
        user_id: UserId,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let built = filter.build(user_id);
        query(
            &conn,
            &built.build_select_query(TX_COLUMNS),
            &built.params_refs(),
        )
    }

    /// Count transactions matching a filter (ignores limit/offset)
    pub fn count_transactions(&self, user_id: UserId, filter: &TransactionFilter) -> Result<i64> {
        let conn = self.conn()?;
        let built = filter.build(user_id);
        let count: i64 = conn.query_row(
            &built.build_count_query(),
            params_from_iter(built.params_refs()),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete several transactions at once, returning how many were removed.
    /// Ids owned by another user are ignored.
    pub fn delete_transactions(&self, user_id: UserId, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = self.with_transaction(|conn| {
            let mut stmt =
                conn.prepare("DELETE FROM transactions WHERE id = ? AND user_id = ?")?;
            let mut deleted = 0;
            for id in ids {
                deleted += stmt.execute(params![id, user_id])?;
            }
            Ok(deleted)
        })?;

        info!("Deleted {} transactions", deleted);
        Ok(deleted)
    }
}
