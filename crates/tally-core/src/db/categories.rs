//! Category operations
//!
//! Keyword-driven reclassification lives in [`crate::categorize`]; this module
//! only stores and loads categories.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use uuid::Uuid;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Category, UserId, EXCLUDED, INCOME, UNCATEGORIZED};

const CATEGORY_COLUMNS: &str =
    "id, uuid, user_id, name, keywords, sort_order, is_system, created_at";

/// Ids of a user's protected categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemCategories {
    pub uncategorized: i64,
    pub excluded: i64,
    pub income: Option<i64>,
}

impl SystemCategories {
    /// NULL and the Uncategorized category both mean "no category yet"
    pub fn is_uncategorized(&self, category_id: Option<i64>) -> bool {
        category_id.map_or(true, |id| id == self.uncategorized)
    }
}

fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
    let keywords_json: String = row.get(4)?;
    let created_at: String = row.get(7)?;
    Ok(Category {
        id: row.get(0)?,
        uuid: row.get(1)?,
        user_id: row.get(2)?,
        name: row.get(3)?,
        keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
        order: row.get(5)?,
        is_system: row.get(6)?,
        created_at: parse_datetime(&created_at),
    })
}

/// Trim, drop blanks, and drop case-insensitive duplicates (first one wins)
pub fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_lowercase()))
        .map(str::to_string)
        .collect()
}

fn is_reserved_name(name: &str) -> bool {
    [UNCATEGORIZED, EXCLUDED, INCOME]
        .iter()
        .any(|r| r.eq_ignore_ascii_case(name))
}

pub(crate) fn list(conn: &Connection, user_id: UserId) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM categories WHERE user_id = ? ORDER BY sort_order, id",
        CATEGORY_COLUMNS
    ))?;
    let categories = stmt
        .query_map(params![user_id], row_to_category)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub(crate) fn get(conn: &Connection, user_id: UserId, id: i64) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            &format!(
                "SELECT {} FROM categories WHERE id = ? AND user_id = ?",
                CATEGORY_COLUMNS
            ),
            params![id, user_id],
            row_to_category,
        )
        .optional()?;
    Ok(category)
}

pub(crate) fn require(conn: &Connection, user_id: UserId, id: i64) -> Result<Category> {
    get(conn, user_id, id)?.ok_or_else(|| Error::NotFound(format!("Category {}", id)))
}

fn find_by_name(conn: &Connection, user_id: UserId, name: &str) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            &format!(
                "SELECT {} FROM categories WHERE user_id = ? AND name = ? COLLATE NOCASE",
                CATEGORY_COLUMNS
            ),
            params![user_id, name],
            row_to_category,
        )
        .optional()?;
    Ok(category)
}

fn next_order(conn: &Connection, user_id: UserId) -> Result<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(sort_order) FROM categories WHERE user_id = ?",
        params![user_id],
        |row| row.get(0),
    )?;
    Ok(max.map_or(0, |m| m + 1))
}

fn insert(
    conn: &Connection,
    user_id: UserId,
    name: &str,
    keywords: &[String],
    is_system: bool,
) -> Result<i64> {
    let order = next_order(conn, user_id)?;
    conn.execute(
        r#"
        INSERT INTO categories (uuid, user_id, name, keywords, sort_order, is_system)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            Uuid::new_v4().to_string(),
            user_id,
            name,
            serde_json::to_string(keywords)?,
            order,
            is_system
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Make sure Uncategorized, Excluded and Income exist and return their ids
pub(crate) fn ensure_system(conn: &Connection, user_id: UserId) -> Result<SystemCategories> {
    let mut ids = Vec::with_capacity(3);
    for name in [INCOME, UNCATEGORIZED, EXCLUDED] {
        let id = match find_by_name(conn, user_id, name)? {
            Some(existing) => existing.id,
            None => {
                let id = insert(conn, user_id, name, &[], true)?;
                info!("Seeded system category {} for user {}", name, user_id);
                id
            }
        };
        ids.push(id);
    }

    Ok(SystemCategories {
        income: Some(ids[0]),
        uncategorized: ids[1],
        excluded: ids[2],
    })
}

pub(crate) fn update_fields(
    conn: &Connection,
    id: i64,
    name: Option<&str>,
    keywords: Option<&[String]>,
    order: Option<i64>,
) -> Result<()> {
    if let Some(name) = name {
        conn.execute(
            "UPDATE categories SET name = ? WHERE id = ?",
            params![name, id],
        )?;
    }
    if let Some(keywords) = keywords {
        conn.execute(
            "UPDATE categories SET keywords = ? WHERE id = ?",
            params![serde_json::to_string(keywords)?, id],
        )?;
    }
    if let Some(order) = order {
        conn.execute(
            "UPDATE categories SET sort_order = ? WHERE id = ?",
            params![order, id],
        )?;
    }
    Ok(())
}

/// Reject a name that is blank or already taken by another category
pub(crate) fn check_name(
    conn: &Connection,
    user_id: UserId,
    name: &str,
    except_id: Option<i64>,
) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidData("Category name is required".into()));
    }
    if let Some(existing) = find_by_name(conn, user_id, name.trim())? {
        if Some(existing.id) != except_id {
            return Err(Error::InvalidData(format!(
                "Category \"{}\" already exists",
                existing.name
            )));
        }
    }
    Ok(())
}

impl Database {
    /// Create a user category at the end of the display order
    pub fn create_category(
        &self,
        user_id: UserId,
        name: &str,
        keywords: &[String],
    ) -> Result<Category> {
        let name = name.trim();
        if is_reserved_name(name) {
            return Err(Error::SystemCategory(format!(
                "\"{}\" is a reserved category name",
                name
            )));
        }

        self.with_transaction(|conn| {
            ensure_system(conn, user_id)?;
            check_name(conn, user_id, name, None)?;
            let id = insert(conn, user_id, name, &normalize_keywords(keywords), false)?;
            require(conn, user_id, id)
        })
    }

    /// All categories for a user in display order
    pub fn list_categories(&self, user_id: UserId) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        list(&conn, user_id)
    }

    pub fn get_category(&self, user_id: UserId, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        get(&conn, user_id, id)
    }

    pub fn get_category_by_name(&self, user_id: UserId, name: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        find_by_name(&conn, user_id, name.trim())
    }

    /// Move `active_id` to the position currently held by `over_id` and
    /// renumber every category 0..n
    pub fn reorder_categories(
        &self,
        user_id: UserId,
        active_id: i64,
        over_id: i64,
    ) -> Result<Vec<Category>> {
        self.with_transaction(|conn| {
            let mut categories = list(conn, user_id)?;
            let from = categories
                .iter()
                .position(|c| c.id == active_id)
                .ok_or_else(|| Error::NotFound(format!("Category {}", active_id)))?;
            let to = categories
                .iter()
                .position(|c| c.id == over_id)
                .ok_or_else(|| Error::NotFound(format!("Category {}", over_id)))?;

            let moved = categories.remove(from);
            categories.insert(to, moved);

            for (order, category) in categories.iter_mut().enumerate() {
                category.order = order as i64;
                conn.execute(
                    "UPDATE categories SET sort_order = ? WHERE id = ?",
                    params![category.order, category.id],
                )?;
            }
            Ok(categories)
        })
    }
}
