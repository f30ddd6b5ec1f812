//! Budget operations
//!
//! Yearly budgets are stored with month 0 so the unique key covers them.

use rusqlite::{params, Connection};
use tracing::info;

use super::{categories, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Budget, UserId};

const BUDGET_COLUMNS: &str =
    "id, user_id, category_id, year, month, amount, created_at, updated_at";

fn row_to_budget(row: &rusqlite::Row) -> rusqlite::Result<Budget> {
    let month: u32 = row.get(4)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category_id: row.get(2)?,
        year: row.get(3)?,
        month: (month != 0).then_some(month),
        amount: row.get(5)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

fn month_key(month: Option<u32>) -> Result<u32> {
    match month {
        None => Ok(0),
        Some(m) if (1..=12).contains(&m) => Ok(m),
        Some(m) => Err(Error::InvalidData(format!("Invalid month: {}", m))),
    }
}

/// Delete every budget for a category, returning how many went
pub(crate) fn delete_for_category(conn: &Connection, category_id: i64) -> Result<usize> {
    let removed = conn.execute(
        "DELETE FROM budgets WHERE category_id = ?",
        params![category_id],
    )?;
    Ok(removed)
}

impl Database {
    /// Create or replace the budget for (category, year, month)
    pub fn set_budget(
        &self,
        user_id: UserId,
        category_id: i64,
        year: i32,
        month: Option<u32>,
        amount: f64,
    ) -> Result<Budget> {
        let month_key = month_key(month)?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::InvalidData(
                "Budget amount must be a non-negative number".into(),
            ));
        }

        self.with_transaction(|conn| {
            categories::require(conn, user_id, category_id)?;
            conn.execute(
                r#"
                INSERT INTO budgets (user_id, category_id, year, month, amount)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(user_id, category_id, year, month)
                DO UPDATE SET amount = excluded.amount, updated_at = CURRENT_TIMESTAMP
                "#,
                params![user_id, category_id, year, month_key, amount],
            )?;

            let budget = conn.query_row(
                &format!(
                    "SELECT {} FROM budgets \
                     WHERE user_id = ? AND category_id = ? AND year = ? AND month = ?",
                    BUDGET_COLUMNS
                ),
                params![user_id, category_id, year, month_key],
                row_to_budget,
            )?;
            Ok(budget)
        })
    }

    /// Budgets for one period (month None = the yearly budgets)
    pub fn list_budgets(&self, user_id: UserId, year: i32, month: Option<u32>) -> Result<Vec<Budget>> {
        let month_key = month_key(month)?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM budgets WHERE user_id = ? AND year = ? AND month = ? ORDER BY category_id",
            BUDGET_COLUMNS
        ))?;
        let budgets = stmt
            .query_map(params![user_id, year, month_key], row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(budgets)
    }

    pub fn delete_budget(&self, user_id: UserId, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM budgets WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        Ok(deleted > 0)
    }

    /// Copy one period's budgets into another, leaving existing targets alone.
    ///
    /// Returns the number of budgets created.
    pub fn copy_budgets(
        &self,
        user_id: UserId,
        from: (i32, Option<u32>),
        to: (i32, Option<u32>),
    ) -> Result<usize> {
        let from_month = month_key(from.1)?;
        let to_month = month_key(to.1)?;

        let copied = self.with_transaction(|conn| {
            let copied = conn.execute(
                r#"
                INSERT INTO budgets (user_id, category_id, year, month, amount)
                SELECT user_id, category_id, ?3, ?4, amount
                FROM budgets src
                WHERE src.user_id = ?1 AND src.year = ?2 AND src.month = ?5
                  AND NOT EXISTS (
                      SELECT 1 FROM budgets dst
                      WHERE dst.user_id = src.user_id
                        AND dst.category_id = src.category_id
                        AND dst.year = ?3 AND dst.month = ?4
                  )
                "#,
                params![user_id, from.0, to.0, to_month, from_month],
            )?;
            Ok(copied)
        })?;

        info!("Copied {} budgets to {}/{}", copied, to.0, to_month);
        Ok(copied)
    }
}
