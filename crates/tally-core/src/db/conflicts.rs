//! Pending multi-category matches
//!
//! A row per (transaction, candidate category). A transaction with rows here
//! has no category until the user picks one.

use rusqlite::{params, Connection};

use super::categories;
use super::transactions::{self, TX_COLUMNS};
use super::Database;
use crate::error::Result;
use crate::models::{Conflict, UserId};

/// Replace a transaction's candidate set
pub(crate) fn replace(conn: &Connection, transaction_id: i64, candidates: &[i64]) -> Result<()> {
    clear(conn, transaction_id)?;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO transaction_conflicts (transaction_id, category_id) VALUES (?, ?)",
    )?;
    for category_id in candidates {
        stmt.execute(params![transaction_id, category_id])?;
    }
    Ok(())
}

pub(crate) fn clear(conn: &Connection, transaction_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM transaction_conflicts WHERE transaction_id = ?",
        params![transaction_id],
    )?;
    Ok(())
}

pub(crate) fn candidates(conn: &Connection, transaction_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT category_id FROM transaction_conflicts WHERE transaction_id = ? ORDER BY category_id",
    )?;
    let ids = stmt
        .query_map(params![transaction_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Transactions whose pending candidates include `category_id`
pub(crate) fn naming(conn: &Connection, category_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT transaction_id FROM transaction_conflicts WHERE category_id = ? ORDER BY transaction_id",
    )?;
    let ids = stmt
        .query_map(params![category_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<i64>, _>>()?;
    Ok(ids)
}

impl Database {
    /// Every conflicted transaction with its candidate categories
    pub fn list_conflicts(&self, user_id: UserId) -> Result<Vec<Conflict>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions t \
             WHERE t.user_id = ? \
               AND t.id IN (SELECT transaction_id FROM transaction_conflicts) \
             ORDER BY t.date DESC, t.id DESC",
            TX_COLUMNS
        ))?;
        let conflicted = stmt
            .query_map(params![user_id], transactions::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let all = categories::list(&conn, user_id)?;
        let mut result = Vec::with_capacity(conflicted.len());
        for transaction in conflicted {
            let ids = candidates(&conn, transaction.id)?;
            let candidates = all
                .iter()
                .filter(|c| ids.contains(&c.id))
                .cloned()
                .collect();
            result.push(Conflict {
                transaction,
                candidates,
            });
        }
        Ok(result)
    }

    pub fn count_conflicts(&self, user_id: UserId) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(DISTINCT c.transaction_id) FROM transaction_conflicts c \
             JOIN transactions t ON t.id = c.transaction_id WHERE t.user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
