//! Import batch operations

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Import, TransactionSource, UserId};

const IMPORT_COLUMNS: &str =
    "id, uuid, user_id, file_name, source, transaction_count, total_amount, checksum, created_at";

fn row_to_import(row: &rusqlite::Row) -> rusqlite::Result<Import> {
    let source: String = row.get(4)?;
    let created_at: String = row.get(8)?;
    Ok(Import {
        id: row.get(0)?,
        uuid: row.get(1)?,
        user_id: row.get(2)?,
        file_name: row.get(3)?,
        source: source.parse().unwrap_or_default(),
        transaction_count: row.get(5)?,
        total_amount: row.get(6)?,
        checksum: row.get(7)?,
        created_at: parse_datetime(&created_at),
    })
}

pub(crate) fn create(
    conn: &Connection,
    user_id: UserId,
    file_name: &str,
    source: TransactionSource,
    checksum: Option<&str>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO imports (uuid, user_id, file_name, source, checksum)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![
            Uuid::new_v4().to_string(),
            user_id,
            file_name,
            source.as_str(),
            checksum
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Recompute count and total from the batch's transactions
pub(crate) fn refresh_totals(conn: &Connection, import_id: i64) -> Result<()> {
    conn.execute(
        r#"
        UPDATE imports SET
            transaction_count = (SELECT COUNT(*) FROM transactions WHERE import_id = ?1),
            total_amount = (SELECT COALESCE(SUM(net_amount), 0) FROM transactions WHERE import_id = ?1)
        WHERE id = ?1
        "#,
        params![import_id],
    )?;
    Ok(())
}

pub(crate) fn remove(conn: &Connection, import_id: i64) -> Result<()> {
    conn.execute("DELETE FROM imports WHERE id = ?", params![import_id])?;
    Ok(())
}

fn get(conn: &Connection, user_id: UserId, id: i64) -> Result<Option<Import>> {
    let import = conn
        .query_row(
            &format!(
                "SELECT {} FROM imports WHERE id = ? AND user_id = ?",
                IMPORT_COLUMNS
            ),
            params![id, user_id],
            row_to_import,
        )
        .optional()?;
    Ok(import)
}

impl Database {
    /// Import batches, newest first
    pub fn list_imports(&self, user_id: UserId) -> Result<Vec<Import>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM imports WHERE user_id = ? ORDER BY created_at DESC, id DESC",
            IMPORT_COLUMNS
        ))?;
        let imports = stmt
            .query_map(params![user_id], row_to_import)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(imports)
    }

    pub fn get_import(&self, user_id: UserId, id: i64) -> Result<Option<Import>> {
        let conn = self.conn()?;
        get(&conn, user_id, id)
    }

    /// Most recent batch created from a file with this checksum
    pub fn find_import_by_checksum(
        &self,
        user_id: UserId,
        checksum: &str,
    ) -> Result<Option<Import>> {
        let conn = self.conn()?;
        let import = conn
            .query_row(
                &format!(
                    "SELECT {} FROM imports WHERE user_id = ? AND checksum = ? ORDER BY id DESC LIMIT 1",
                    IMPORT_COLUMNS
                ),
                params![user_id, checksum],
                row_to_import,
            )
            .optional()?;
        Ok(import)
    }

    /// Delete a batch and every transaction it created.
    ///
    /// Returns the number of transactions removed.
    pub fn delete_import(&self, user_id: UserId, id: i64) -> Result<usize> {
        let removed = self.with_transaction(|conn| {
            if get(conn, user_id, id)?.is_none() {
                return Err(Error::NotFound(format!("Import {}", id)));
            }
            let removed = conn.execute(
                "DELETE FROM transactions WHERE import_id = ? AND user_id = ?",
                params![id, user_id],
            )?;
            remove(conn, id)?;
            Ok(removed)
        })?;

        info!("Deleted import {} ({} transactions)", id, removed);
        Ok(removed)
    }
}
