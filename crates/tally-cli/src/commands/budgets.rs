//! Budget commands

use anyhow::Result;
use tally_core::models::UserId;
use tally_core::Database;

use super::{format_period, parse_period, resolve_category};

pub fn cmd_budgets_list(db: &Database, user: UserId, period: &str) -> Result<()> {
    let (year, month) = parse_period(period)?;
    let budgets = db.list_budgets(user, year, month)?;
    let label = format_period(year, month);

    if budgets.is_empty() {
        println!("No budgets for {}. Set one with:", label);
        println!("  tally budgets set Groceries {} 400", label);
        return Ok(());
    }

    let names: std::collections::HashMap<i64, String> = db
        .list_categories(user)?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    println!();
    println!("💰 Budgets for {}", label);
    println!("   ─────────────────────────────────────────────────────────────");

    let mut total = 0.0;
    for budget in &budgets {
        let name = names
            .get(&budget.category_id)
            .map(String::as_str)
            .unwrap_or("?");
        println!("   [{:>3}] {:<24} │ ${:>10.2}", budget.id, name, budget.amount);
        total += budget.amount;
    }
    println!("   ─────────────────────────────────────────────────────────────");
    println!("         {:<24} │ ${:>10.2}", "Total", total);

    Ok(())
}

pub fn cmd_budgets_set(
    db: &Database,
    user: UserId,
    category: &str,
    period: &str,
    amount: f64,
) -> Result<()> {
    let category = resolve_category(db, user, category)?;
    let (year, month) = parse_period(period)?;
    let budget = db.set_budget(user, category.id, year, month, amount)?;

    println!(
        "✅ Budget for '{}' in {}: ${:.2}",
        category.name,
        format_period(budget.year, budget.month),
        budget.amount
    );
    Ok(())
}

pub fn cmd_budgets_delete(db: &Database, user: UserId, id: i64) -> Result<()> {
    if db.delete_budget(user, id)? {
        println!("✅ Deleted budget {}", id);
    } else {
        anyhow::bail!("Budget {} not found", id);
    }
    Ok(())
}

pub fn cmd_budgets_copy(db: &Database, user: UserId, from: &str, to: &str) -> Result<()> {
    let from = parse_period(from)?;
    let to = parse_period(to)?;
    let copied = db.copy_budgets(user, from, to)?;

    println!(
        "✅ Copied {} budgets from {} to {}",
        copied,
        format_period(from.0, from.1),
        format_period(to.0, to.1)
    );
    Ok(())
}
