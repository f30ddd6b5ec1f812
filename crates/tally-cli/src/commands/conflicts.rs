//! Conflict review commands

use anyhow::{Context, Result};
use tally_core::models::UserId;
use tally_core::{Categorizer, Database};

use super::{format_amount, resolve_category, truncate};

pub fn cmd_conflicts_list(db: &Database, user: UserId) -> Result<()> {
    let conflicts = db.list_conflicts(user)?;

    if conflicts.is_empty() {
        println!("✅ No conflicts. Every matched transaction has a single category.");
        return Ok(());
    }

    println!();
    println!("⚠️  Conflicts ({})", conflicts.len());
    println!("   ─────────────────────────────────────────────────────────────");

    for conflict in &conflicts {
        let tx = &conflict.transaction;
        let names: Vec<&str> = conflict
            .candidates
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        println!(
            "   [{}] {} │ {:>10} │ {}",
            tx.id,
            tx.date,
            format_amount(tx.net_amount),
            truncate(&tx.description, 35)
        );
        println!("         matches: {}", names.join(", "));
    }

    println!();
    println!("   Use 'tally conflicts resolve <transaction-id> <category>' to pick one.");

    Ok(())
}

pub fn cmd_conflicts_resolve(
    db: &Database,
    user: UserId,
    transaction_id: i64,
    category: &str,
) -> Result<()> {
    let category = resolve_category(db, user, category)?;
    let tx = Categorizer::new(db)
        .resolve_conflict(user, transaction_id, category.id)
        .with_context(|| format!("Failed to resolve transaction {}", transaction_id))?;

    println!(
        "✅ {} │ {} → {}",
        tx.date,
        truncate(&tx.description, 40),
        category.name
    );
    Ok(())
}
