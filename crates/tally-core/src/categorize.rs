//! Keyword categorization engine
//!
//! A transaction's match field is lower-cased and every keyword of every
//! matchable category is tested as a substring. One matching category means
//! the transaction is assigned to it. Several matching categories is a
//! conflict: the transaction is left without a category and the candidates
//! are recorded in `transaction_conflicts` until the user resolves it.
//!
//! Keyword edits only touch the transactions they can affect: those in the
//! edited category that stop matching, and uncategorized ones that start to.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::db::categories::{self, normalize_keywords, SystemCategories};
use crate::db::{budgets, conflicts, transactions, Database};
use crate::error::{Error, Result};
use crate::models::{
    Category, CategoryUpdate, DeleteCategoryResult, RecategorizeMode, RecategorizeResult,
    Transaction, UpdateCategoryResult, UserId,
};

/// Lower-cased keyword sets of the matchable categories, in display order
#[derive(Debug, Clone, Default)]
pub struct KeywordMatcher {
    entries: Vec<(i64, Vec<String>)>,
}

impl KeywordMatcher {
    pub fn new(categories: &[Category]) -> Self {
        let entries = categories
            .iter()
            .filter(|c| c.is_matchable())
            .map(|c| {
                let keywords = c
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect::<Vec<_>>();
                (c.id, keywords)
            })
            .filter(|(_, keywords)| !keywords.is_empty())
            .collect();
        Self { entries }
    }

    /// Ids of every category with at least one keyword in `text`
    pub fn matches(&self, text: &str) -> Vec<i64> {
        let text = text.to_lowercase();
        self.entries
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn category_matches(&self, category_id: i64, text: &str) -> bool {
        let text = text.to_lowercase();
        self.entries
            .iter()
            .find(|(id, _)| *id == category_id)
            .is_some_and(|(_, keywords)| keywords.iter().any(|k| text.contains(k.as_str())))
    }
}

/// What happened to one transaction during a classification step
enum Outcome {
    Assigned,
    Uncategorized,
    Conflict,
}

/// Apply a candidate set to a transaction: one candidate is assigned, several
/// become a conflict, none resets it to uncategorized.
fn apply_candidates(conn: &Connection, tx: &Transaction, candidates: &[i64]) -> Result<Outcome> {
    match candidates {
        [only] => {
            transactions::set_category(conn, tx.id, Some(*only))?;
            conflicts::clear(conn, tx.id)?;
            debug!("Transaction {} -> category {}", tx.id, only);
            Ok(Outcome::Assigned)
        }
        [] => {
            transactions::set_category(conn, tx.id, None)?;
            conflicts::clear(conn, tx.id)?;
            debug!("Transaction {} -> uncategorized", tx.id);
            Ok(Outcome::Uncategorized)
        }
        several => {
            transactions::set_category(conn, tx.id, None)?;
            conflicts::replace(conn, tx.id, several)?;
            debug!("Transaction {} conflicts between {:?}", tx.id, several);
            Ok(Outcome::Conflict)
        }
    }
}

impl UpdateCategoryResult {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Assigned => self.assigned += 1,
            Outcome::Uncategorized => self.uncategorized += 1,
            Outcome::Conflict => self.conflicts += 1,
        }
    }
}

/// Categorization operations over one database
pub struct Categorizer<'a> {
    db: &'a Database,
}

impl<'a> Categorizer<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Run keyword matching over a user's transactions
    pub fn recategorize(&self, user_id: UserId, mode: RecategorizeMode) -> Result<RecategorizeResult> {
        let result = self
            .db
            .with_transaction(|conn| recategorize_in(conn, user_id, mode))?;

        info!(
            "Recategorized {} transactions: {} updated, {} conflicts",
            result.processed, result.updated, result.conflicts
        );
        Ok(result)
    }

    /// Edit a category and reclassify what its keyword change affects
    pub fn update_category(
        &self,
        user_id: UserId,
        id: i64,
        update: &CategoryUpdate,
    ) -> Result<UpdateCategoryResult> {
        let result = self.db.with_transaction(|conn| {
            let system = categories::ensure_system(conn, user_id)?;
            let category = categories::require(conn, user_id, id)?;

            let name = match update.name.as_deref().map(str::trim) {
                Some(name) if name != category.name => {
                    if category.is_system {
                        return Err(Error::SystemCategory(format!(
                            "Cannot rename system category \"{}\"",
                            category.name
                        )));
                    }
                    categories::check_name(conn, user_id, name, Some(id))?;
                    Some(name)
                }
                _ => None,
            };

            let keywords = update
                .keywords
                .as_deref()
                .map(normalize_keywords)
                .filter(|k| *k != category.keywords);

            categories::update_fields(conn, id, name, keywords.as_deref(), update.order)?;

            match keywords {
                Some(_) if category.is_matchable() => reclassify(conn, user_id, id, &system),
                _ => Ok(UpdateCategoryResult::default()),
            }
        })?;

        info!(
            "Updated category {}: {} assigned, {} uncategorized, {} conflicts",
            id, result.assigned, result.uncategorized, result.conflicts
        );
        Ok(result)
    }

    /// Append one keyword; duplicates (ignoring case) are rejected
    pub fn add_keyword(
        &self,
        user_id: UserId,
        id: i64,
        keyword: &str,
    ) -> Result<UpdateCategoryResult> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(Error::InvalidData("Keyword cannot be blank".into()));
        }
        let category = self.require_category(user_id, id)?;
        if category
            .keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(keyword))
        {
            return Err(Error::InvalidData(format!(
                "\"{}\" already has keyword \"{}\"",
                category.name, keyword
            )));
        }

        let mut keywords = category.keywords;
        keywords.push(keyword.to_string());
        self.update_category(
            user_id,
            id,
            &CategoryUpdate {
                keywords: Some(keywords),
                ..Default::default()
            },
        )
    }

    /// Drop a keyword, matched ignoring case
    pub fn remove_keyword(
        &self,
        user_id: UserId,
        id: i64,
        keyword: &str,
    ) -> Result<UpdateCategoryResult> {
        let keyword = keyword.trim();
        let category = self.require_category(user_id, id)?;
        if !category
            .keywords
            .iter()
            .any(|k| k.eq_ignore_ascii_case(keyword))
        {
            return Err(Error::NotFound(format!(
                "Keyword \"{}\" on \"{}\"",
                keyword, category.name
            )));
        }

        let keywords = category
            .keywords
            .into_iter()
            .filter(|k| !k.eq_ignore_ascii_case(keyword))
            .collect();
        self.update_category(
            user_id,
            id,
            &CategoryUpdate {
                keywords: Some(keywords),
                ..Default::default()
            },
        )
    }

    /// Delete a user category. Its transactions move to Uncategorized and
    /// its budgets are removed.
    pub fn delete_category(&self, user_id: UserId, id: i64) -> Result<DeleteCategoryResult> {
        let result = self.db.with_transaction(|conn| {
            let system = categories::ensure_system(conn, user_id)?;
            let category = categories::require(conn, user_id, id)?;
            if category.is_system {
                return Err(Error::SystemCategory(format!(
                    "Cannot delete system category \"{}\"",
                    category.name
                )));
            }

            let transactions_reassigned =
                transactions::reassign_category(conn, user_id, id, system.uncategorized)?;
            let budgets_removed = budgets::delete_for_category(conn, id)?;

            // Candidate rows would vanish with the category; reapply what is left
            let naming = conflicts::naming(conn, id)?;
            for tx_id in &naming {
                let remaining: Vec<i64> = conflicts::candidates(conn, *tx_id)?
                    .into_iter()
                    .filter(|c| *c != id)
                    .collect();
                let tx = transactions::require(conn, user_id, *tx_id)?;
                apply_candidates(conn, &tx, &remaining)?;
            }

            conn.execute(
                "DELETE FROM categories WHERE id = ? AND user_id = ?",
                rusqlite::params![id, user_id],
            )?;

            Ok(DeleteCategoryResult {
                deleted: true,
                transactions_reassigned,
                budgets_removed,
                conflicts_updated: naming.len(),
            })
        })?;

        info!(
            "Deleted category {} ({} transactions reassigned, {} budgets removed, {} conflicts updated)",
            id, result.transactions_reassigned, result.budgets_removed, result.conflicts_updated
        );
        Ok(result)
    }

    /// Settle a conflict by picking the category
    pub fn resolve_conflict(
        &self,
        user_id: UserId,
        transaction_id: i64,
        category_id: i64,
    ) -> Result<Transaction> {
        self.db.with_transaction(|conn| {
            transactions::require(conn, user_id, transaction_id)?;
            categories::require(conn, user_id, category_id)?;
            transactions::set_category(conn, transaction_id, Some(category_id))?;
            conflicts::clear(conn, transaction_id)?;
            debug!(
                "Resolved conflict on transaction {} -> category {}",
                transaction_id, category_id
            );
            transactions::require(conn, user_id, transaction_id)
        })
    }

    /// Which categories would claim this text right now
    pub fn preview(&self, user_id: UserId, text: &str) -> Result<Vec<Category>> {
        let all = self.db.list_categories(user_id)?;
        let ids = KeywordMatcher::new(&all).matches(text);
        Ok(all.into_iter().filter(|c| ids.contains(&c.id)).collect())
    }

    fn require_category(&self, user_id: UserId, id: i64) -> Result<Category> {
        self.db
            .get_category(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Category {}", id)))
    }
}

/// Bulk pass on an open connection, so the importer can run it in its own flow
pub(crate) fn recategorize_in(
    conn: &Connection,
    user_id: UserId,
    mode: RecategorizeMode,
) -> Result<RecategorizeResult> {
    let system = categories::ensure_system(conn, user_id)?;
    let matcher = KeywordMatcher::new(&categories::list(conn, user_id)?);
    let selected = transactions::for_recategorize(conn, user_id, mode, &system)?;

    let mut result = RecategorizeResult {
        processed: selected.len(),
        ..Default::default()
    };

    for tx in &selected {
        let candidates = matcher.matches(&tx.match_field);
        match candidates.len() {
            // No match: keep the category, drop any stale candidates
            0 => conflicts::clear(conn, tx.id)?,
            1 => {
                apply_candidates(conn, tx, &candidates)?;
                result.updated += 1;
            }
            // Several matches never overwrite a category the user already has
            _ => {
                if system.is_uncategorized(tx.category_id) {
                    apply_candidates(conn, tx, &candidates)?;
                }
                result.conflicts += 1;
            }
        }
    }

    Ok(result)
}

/// Reclassify after category `id` changed its keywords
fn reclassify(
    conn: &Connection,
    user_id: UserId,
    id: i64,
    system: &SystemCategories,
) -> Result<UpdateCategoryResult> {
    let matcher = KeywordMatcher::new(&categories::list(conn, user_id)?);
    let mut result = UpdateCategoryResult::default();

    // Transactions that no longer belong here
    for tx in transactions::in_category(conn, user_id, id)? {
        if matcher.category_matches(id, &tx.match_field) {
            continue;
        }
        let others = matcher.matches(&tx.match_field);
        result.record(apply_candidates(conn, &tx, &others)?);
    }

    // Uncategorized transactions this category now claims, plus conflicts
    // that named it and may have changed
    for tx in transactions::uncategorized(conn, user_id, system)? {
        let claims = matcher.category_matches(id, &tx.match_field);
        let was_candidate = conflicts::candidates(conn, tx.id)?.contains(&id);
        if !claims && !was_candidate {
            continue;
        }

        let candidates = matcher.matches(&tx.match_field);
        match apply_candidates(conn, &tx, &candidates)? {
            // Already uncategorized; only stale candidates were dropped
            Outcome::Uncategorized => {}
            outcome => result.record(outcome),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParsedTransaction;
    use chrono::NaiveDate;

    fn category(id: i64, name: &str, keywords: &[&str], is_system: bool) -> Category {
        Category {
            id,
            uuid: format!("uuid-{}", id),
            user_id: 1,
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            order: id,
            is_system,
            created_at: chrono::Utc::now(),
        }
    }

    fn setup_test_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.ensure_user(1).unwrap();
        db
    }

    fn add(db: &Database, text: &str) -> i64 {
        let parsed = [ParsedTransaction::new(
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            text,
            text,
            10.0,
            0.0,
        )];
        db.bulk_import(1, &parsed, Default::default()).unwrap();
        db.list_transactions(1, &Default::default())
            .unwrap()
            .into_iter()
            .find(|t| t.description == text)
            .unwrap()
            .id
    }

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_matcher_case_insensitive_substring() {
        let matcher = KeywordMatcher::new(&[
            category(1, "Coffee", &["starbucks", "Tim Hortons"], false),
            category(2, "Food", &["tim"], false),
        ]);
        assert_eq!(matcher.matches("STARBUCKS #442"), vec![1]);
        assert_eq!(matcher.matches("TIM HORTONS 0012"), vec![1, 2]);
        assert!(matcher.matches("GAS STATION").is_empty());
    }

    #[test]
    fn test_matcher_skips_system_and_blank_keywords() {
        let matcher = KeywordMatcher::new(&[
            category(1, "Excluded", &["transfer"], true),
            category(2, "Income", &["payroll"], true),
            category(3, "Misc", &["", "  "], false),
        ]);
        assert!(matcher.matches("TRANSFER TO SAVINGS").is_empty());
        assert_eq!(matcher.matches("PAYROLL DEPOSIT"), vec![2]);
        assert!(matcher.matches("anything at all").is_empty());
    }

    #[test]
    fn test_recategorize_assigns_and_conflicts() {
        let db = setup_test_db();
        let coffee = db.create_category(1, "Coffee", &keywords(&["coffee"])).unwrap();
        db.create_category(1, "Treats", &keywords(&["donut"])).unwrap();
        let plain = add(&db, "COFFEE SHOP");
        let both = add(&db, "COFFEE AND DONUT");
        let neither = add(&db, "HARDWARE STORE");

        let categorizer = Categorizer::new(&db);
        let result = categorizer
            .recategorize(1, RecategorizeMode::Uncategorized)
            .unwrap();
        assert_eq!(result.processed, 3);
        assert_eq!(result.updated, 1);
        assert_eq!(result.conflicts, 1);

        let plain = db.get_transaction(1, plain).unwrap().unwrap();
        assert_eq!(plain.category_id, Some(coffee.id));
        let both = db.get_transaction(1, both).unwrap().unwrap();
        assert_eq!(both.category_id, None);
        assert!(db.get_transaction(1, neither).unwrap().unwrap().category_id.is_none());

        let pending = db.list_conflicts(1).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].transaction.id, both.id);
        assert_eq!(pending[0].candidates.len(), 2);
    }

    #[test]
    fn test_recategorize_all_skips_excluded() {
        let db = setup_test_db();
        let system = db.ensure_user(1).unwrap();
        db.create_category(1, "Transfers", &keywords(&["transfer"])).unwrap();
        let id = add(&db, "TRANSFER TO SAVINGS");
        db.update_transaction(
            1,
            id,
            &crate::models::TransactionUpdate {
                category_id: Some(Some(system.excluded)),
                ..Default::default()
            },
        )
        .unwrap();

        let result = Categorizer::new(&db)
            .recategorize(1, RecategorizeMode::All)
            .unwrap();
        assert_eq!(result.processed, 0);
        assert_eq!(
            db.get_transaction(1, id).unwrap().unwrap().category_id,
            Some(system.excluded)
        );
    }

    #[test]
    fn test_keyword_removal_moves_transactions_out() {
        let db = setup_test_db();
        let groceries = db
            .create_category(1, "Groceries", &keywords(&["market", "costco"]))
            .unwrap();
        let shopping = db.create_category(1, "Shopping", &keywords(&["costco"])).unwrap();
        let market = add(&db, "FARMERS MARKET");
        let costco = add(&db, "COSTCO WHOLESALE");

        let categorizer = Categorizer::new(&db);
        categorizer.resolve_conflict(1, costco, groceries.id).unwrap();
        categorizer
            .recategorize(1, RecategorizeMode::Uncategorized)
            .unwrap();
        assert_eq!(
            db.get_transaction(1, market).unwrap().unwrap().category_id,
            Some(groceries.id)
        );

        let result = categorizer.remove_keyword(1, groceries.id, "COSTCO").unwrap();
        assert_eq!(result.assigned, 1);
        assert_eq!(
            db.get_transaction(1, costco).unwrap().unwrap().category_id,
            Some(shopping.id)
        );
        assert_eq!(
            db.get_transaction(1, market).unwrap().unwrap().category_id,
            Some(groceries.id)
        );
    }

    #[test]
    fn test_keyword_addition_claims_uncategorized() {
        let db = setup_test_db();
        let gas = db.create_category(1, "Gas", &[]).unwrap();
        db.create_category(1, "Car", &keywords(&["petro"])).unwrap();
        let shell = add(&db, "SHELL 1234");
        let petro = add(&db, "PETRO CANADA");
        let categorizer = Categorizer::new(&db);
        categorizer
            .recategorize(1, RecategorizeMode::Uncategorized)
            .unwrap();

        let result = categorizer
            .update_category(
                1,
                gas.id,
                &CategoryUpdate {
                    keywords: Some(keywords(&["shell", " ", "Shell", "petro"])),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(result.assigned, 1);
        assert_eq!(result.conflicts, 0);
        assert_eq!(
            db.get_transaction(1, shell).unwrap().unwrap().category_id,
            Some(gas.id)
        );
        // petro was already in Car and is not uncategorized
        assert_ne!(
            db.get_transaction(1, petro).unwrap().unwrap().category_id,
            Some(gas.id)
        );
        let stored = db.get_category(1, gas.id).unwrap().unwrap();
        assert_eq!(stored.keywords, keywords(&["shell", "petro"]));
    }

    #[test]
    fn test_unchanged_keywords_do_nothing() {
        let db = setup_test_db();
        let cat = db.create_category(1, "Coffee", &keywords(&["coffee"])).unwrap();
        let result = Categorizer::new(&db)
            .update_category(
                1,
                cat.id,
                &CategoryUpdate {
                    keywords: Some(keywords(&[" coffee "])),
                    order: Some(9),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(result, UpdateCategoryResult::default());
        assert_eq!(db.get_category(1, cat.id).unwrap().unwrap().order, 9);
    }

    #[test]
    fn test_system_category_protection() {
        let db = setup_test_db();
        let system = db.ensure_user(1).unwrap();
        let categorizer = Categorizer::new(&db);

        let rename = categorizer.update_category(
            1,
            system.uncategorized,
            &CategoryUpdate {
                name: Some("Misc".into()),
                ..Default::default()
            },
        );
        assert!(matches!(rename, Err(Error::SystemCategory(_))));
        assert!(matches!(
            categorizer.delete_category(1, system.excluded),
            Err(Error::SystemCategory(_))
        ));
        assert_eq!(
            db.get_category(1, system.uncategorized).unwrap().unwrap().name,
            "Uncategorized"
        );
    }

    #[test]
    fn test_blank_and_duplicate_keywords_rejected() {
        let db = setup_test_db();
        let cat = db.create_category(1, "Coffee", &keywords(&["coffee"])).unwrap();
        let categorizer = Categorizer::new(&db);
        assert!(matches!(
            categorizer.add_keyword(1, cat.id, "  "),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            categorizer.add_keyword(1, cat.id, "COFFEE"),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            categorizer.remove_keyword(1, cat.id, "tea"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_category_reassigns_and_drops_budgets() {
        let db = setup_test_db();
        let system = db.ensure_user(1).unwrap();
        let dining = db.create_category(1, "Dining", &keywords(&["bistro"])).unwrap();
        let id = add(&db, "BISTRO 21");
        let categorizer = Categorizer::new(&db);
        categorizer
            .recategorize(1, RecategorizeMode::Uncategorized)
            .unwrap();
        db.set_budget(1, dining.id, 2025, Some(3), 200.0).unwrap();
        db.set_budget(1, dining.id, 2025, None, 2000.0).unwrap();

        let result = categorizer.delete_category(1, dining.id).unwrap();
        assert!(result.deleted);
        assert_eq!(result.transactions_reassigned, 1);
        assert_eq!(result.budgets_removed, 2);
        assert_eq!(
            db.get_transaction(1, id).unwrap().unwrap().category_id,
            Some(system.uncategorized)
        );
        assert!(db.get_category(1, dining.id).unwrap().is_none());
    }

    #[test]
    fn test_all_pass_keeps_chosen_category_on_overlap() {
        let db = setup_test_db();
        let costco = db.create_category(1, "Costco", &keywords(&["costco"])).unwrap();
        db.create_category(1, "Gas", &keywords(&["gas"])).unwrap();
        let resolved = add(&db, "COSTCO GAS BAR");
        let manual = add(&db, "COSTCO GAS #2");
        let categorizer = Categorizer::new(&db);

        categorizer
            .recategorize(1, RecategorizeMode::Uncategorized)
            .unwrap();
        categorizer.resolve_conflict(1, resolved, costco.id).unwrap();
        db.update_transaction(
            1,
            manual,
            &crate::models::TransactionUpdate {
                category_id: Some(Some(costco.id)),
                ..Default::default()
            },
        )
        .unwrap();

        let result = categorizer.recategorize(1, RecategorizeMode::All).unwrap();
        assert_eq!(result.processed, 2);
        assert_eq!(result.conflicts, 2);
        assert_eq!(result.updated, 0);
        for id in [resolved, manual] {
            assert_eq!(
                db.get_transaction(1, id).unwrap().unwrap().category_id,
                Some(costco.id)
            );
        }
        assert!(db.list_conflicts(1).unwrap().is_empty());
    }

    #[test]
    fn test_delete_category_settles_conflicts_naming_it() {
        let db = setup_test_db();
        let costco = db.create_category(1, "Costco", &keywords(&["costco"])).unwrap();
        let gas = db.create_category(1, "Gas", &keywords(&["gas"])).unwrap();
        let bar = db.create_category(1, "Bars", &keywords(&["bar"])).unwrap();
        let two_way = add(&db, "COSTCO GAS");
        let three_way = add(&db, "COSTCO GAS BAR");
        let categorizer = Categorizer::new(&db);
        categorizer
            .recategorize(1, RecategorizeMode::Uncategorized)
            .unwrap();
        assert_eq!(db.count_conflicts(1).unwrap(), 2);

        let result = categorizer.delete_category(1, gas.id).unwrap();
        assert_eq!(result.conflicts_updated, 2);

        // One candidate left: assigned. Two left: still a conflict without Gas.
        assert_eq!(
            db.get_transaction(1, two_way).unwrap().unwrap().category_id,
            Some(costco.id)
        );
        let pending = db.list_conflicts(1).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].transaction.id, three_way);
        let ids: Vec<i64> = pending[0].candidates.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![costco.id, bar.id]);
    }

    #[test]
    fn test_resolve_conflict_rejects_foreign_category() {
        let db = setup_test_db();
        db.ensure_user(2).unwrap();
        let theirs = db.create_category(2, "Theirs", &[]).unwrap();
        let id = add(&db, "SOMETHING");
        assert!(matches!(
            Categorizer::new(&db).resolve_conflict(1, id, theirs.id),
            Err(Error::NotFound(_))
        ));
    }
}
