//! Transaction filter builder for constructing dynamic SQL queries
//!
//! Shared by `list_transactions` and `count_transactions` so both see the
//! same WHERE clause.

use chrono::NaiveDate;

use crate::models::{TransactionSource, UserId};

/// Builder for constructing transaction query filters
#[derive(Debug, Default, Clone)]
pub struct TransactionFilter {
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub category_id: Option<i64>,
    pub import_id: Option<i64>,
    pub source: Option<TransactionSource>,
    /// Only transactions with no category (or the Uncategorized one)
    pub uncategorized_only: bool,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: &'static str,
    /// LIMIT/OFFSET clause, empty when unpaginated
    pub limit_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive date range
    pub fn date_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.date_range = range;
        self
    }

    pub fn category_id(mut self, id: Option<i64>) -> Self {
        self.category_id = id;
        self
    }

    pub fn import_id(mut self, id: Option<i64>) -> Self {
        self.import_id = id;
        self
    }

    pub fn source(mut self, source: Option<TransactionSource>) -> Self {
        self.source = source;
        self
    }

    pub fn uncategorized_only(mut self, value: bool) -> Self {
        self.uncategorized_only = value;
        self
    }

    /// Substring match on description or match field
    pub fn search(mut self, query: Option<&str>) -> Self {
        self.search = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<i64>) -> Self {
        self.offset = offset;
        self
    }

    /// Build the filter components for one user's transactions
    pub fn build(&self, user_id: UserId) -> FilterResult {
        let mut conditions = vec!["t.user_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id)];

        if let Some((from, to)) = self.date_range {
            conditions.push("t.date >= ? AND t.date <= ?".to_string());
            params.push(Box::new(from.to_string()));
            params.push(Box::new(to.to_string()));
        }

        if let Some(category_id) = self.category_id {
            conditions.push("t.category_id = ?".to_string());
            params.push(Box::new(category_id));
        }

        if let Some(import_id) = self.import_id {
            conditions.push("t.import_id = ?".to_string());
            params.push(Box::new(import_id));
        }

        if let Some(source) = self.source {
            conditions.push("t.source = ?".to_string());
            params.push(Box::new(source.as_str()));
        }

        if self.uncategorized_only {
            conditions.push(
                "(t.category_id IS NULL OR t.category_id IN \
                 (SELECT id FROM categories WHERE user_id = t.user_id AND is_system = 1 AND name = 'Uncategorized'))"
                    .to_string(),
            );
        }

        if let Some(ref q) = self.search {
            conditions.push(
                "(t.description LIKE ? COLLATE NOCASE OR t.match_field LIKE ? COLLATE NOCASE)"
                    .to_string(),
            );
            let pattern = format!("%{}%", q);
            params.push(Box::new(pattern.clone()));
            params.push(Box::new(pattern));
        }

        let limit_clause = match (self.limit, self.offset) {
            (Some(limit), offset) => format!("LIMIT {} OFFSET {}", limit, offset.unwrap_or(0)),
            (None, Some(offset)) => format!("LIMIT -1 OFFSET {}", offset),
            (None, None) => String::new(),
        };

        FilterResult {
            where_clause: format!("WHERE {}", conditions.join(" AND ")),
            order_clause: "ORDER BY t.date DESC, t.id DESC",
            limit_clause,
            params,
        }
    }
}

impl FilterResult {
    /// Build a COUNT query
    pub fn build_count_query(&self) -> String {
        format!("SELECT COUNT(*) FROM transactions t {}", self.where_clause)
    }

    /// Build a SELECT query for the given column list
    pub fn build_select_query(&self, columns: &str) -> String {
        format!(
            "SELECT {} FROM transactions t {} {} {}",
            columns, self.where_clause, self.order_clause, self.limit_clause
        )
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_scope_is_always_present() {
        let built = TransactionFilter::new().build(7);
        assert_eq!(built.where_clause, "WHERE t.user_id = ?");
        assert_eq!(built.params.len(), 1);
        assert!(built.limit_clause.is_empty());
    }

    #[test]
    fn test_combined_conditions_and_params() {
        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let built = TransactionFilter::new()
            .date_range(Some((from, to)))
            .category_id(Some(3))
            .search(Some("  coffee "))
            .limit(Some(20))
            .build(1);

        assert!(built.where_clause.contains("t.date >= ? AND t.date <= ?"));
        assert!(built.where_clause.contains("t.category_id = ?"));
        assert!(built.where_clause.contains("LIKE ?"));
        // user, from, to, category, two search patterns
        assert_eq!(built.params.len(), 6);
        assert_eq!(built.limit_clause, "LIMIT 20 OFFSET 0");
    }

    #[test]
    fn test_blank_search_ignored() {
        let built = TransactionFilter::new().search(Some("   ")).build(1);
        assert!(!built.where_clause.contains("LIKE"));
    }
}
