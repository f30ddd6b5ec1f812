//! Transaction command implementations

use anyhow::Result;
use chrono::NaiveDate;
use tally_core::models::{NewTransaction, UserId};
use tally_core::{Database, TransactionFilter};

use super::{format_amount, parse_date, resolve_category, truncate};

/// Options for `tally transactions list`
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub limit: i64,
    pub from: Option<String>,
    pub to: Option<String>,
    pub category: Option<String>,
    pub uncategorized: bool,
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            from: None,
            to: None,
            category: None,
            uncategorized: false,
            search: None,
        }
    }
}

// Stored dates are YYYY-MM-DD text, so open ends must stay four-digit years
fn open_end(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

pub fn cmd_transactions_list(db: &Database, user: UserId, query: &ListQuery) -> Result<()> {
    let date_range = match (&query.from, &query.to) {
        (None, None) => None,
        (from, to) => {
            let from = from
                .as_deref()
                .map(parse_date)
                .transpose()?
                .unwrap_or_else(|| open_end(1, 1, 1));
            let to = to
                .as_deref()
                .map(parse_date)
                .transpose()?
                .unwrap_or_else(|| open_end(9999, 12, 31));
            Some((from, to))
        }
    };
    let category_id = query
        .category
        .as_deref()
        .map(|c| resolve_category(db, user, c).map(|c| c.id))
        .transpose()?;

    let filter = TransactionFilter::new()
        .date_range(date_range)
        .category_id(category_id)
        .uncategorized_only(query.uncategorized)
        .search(query.search.as_deref())
        .limit(Some(query.limit));

    let transactions = db.list_transactions(user, &filter)?;

    if transactions.is_empty() {
        println!("No transactions found. Import some with:");
        println!("  tally import --file statement.csv");
        return Ok(());
    }

    let total = db.count_transactions(user, &filter)?;
    let names: std::collections::HashMap<i64, String> = db
        .list_categories(user)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    println!();
    println!(
        "📝 Transactions (showing {} of {})",
        transactions.len(),
        total
    );
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let category = tx
            .category_id
            .and_then(|id| names.get(&id))
            .map(String::as_str)
            .unwrap_or("-");
        println!(
            "   [{}] {} │ {:>10} │ {:<14} │ {}",
            tx.id,
            tx.date,
            format_amount(tx.net_amount),
            truncate(category, 14),
            truncate(&tx.description, 35)
        );
    }

    Ok(())
}

pub fn cmd_transactions_add(
    db: &Database,
    user: UserId,
    date: &str,
    description: &str,
    amount_out: f64,
    amount_in: f64,
    category: Option<&str>,
) -> Result<()> {
    let date = parse_date(date)?;
    let category_id = category
        .map(|c| resolve_category(db, user, c).map(|c| c.id))
        .transpose()?;

    let tx = db.insert_transaction(
        user,
        &NewTransaction {
            date,
            description: description.to_string(),
            match_field: None,
            amount_out,
            amount_in,
            category_id,
        },
    )?;

    println!("✅ Added transaction {}:", tx.id);
    println!(
        "   {} │ {:>10} │ {}",
        tx.date,
        format_amount(tx.net_amount),
        truncate(&tx.description, 40)
    );
    Ok(())
}

pub fn cmd_transactions_delete(db: &Database, user: UserId, ids: &[i64]) -> Result<()> {
    let deleted = db.delete_transactions(user, ids)?;

    if deleted == 0 {
        println!("No matching transactions to delete.");
    } else {
        println!("✅ Deleted {} of {} transactions", deleted, ids.len());
    }
    Ok(())
}
