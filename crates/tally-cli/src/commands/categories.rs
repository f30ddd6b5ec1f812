//! Category, keyword and recategorize command implementations

use anyhow::Result;
use tally_core::models::{CategoryUpdate, RecategorizeMode, UpdateCategoryResult, UserId};
use tally_core::{Categorizer, Database};

use super::resolve_category;

fn print_reclassified(result: &UpdateCategoryResult) {
    if result.assigned + result.uncategorized + result.conflicts == 0 {
        return;
    }
    println!(
        "   Reclassified: {} assigned, {} uncategorized, {} conflicts",
        result.assigned, result.uncategorized, result.conflicts
    );
    if result.conflicts > 0 {
        println!("   Run 'tally conflicts' to review.");
    }
}

pub fn cmd_categories_list(db: &Database, user: UserId) -> Result<()> {
    db.ensure_user(user)?;
    let categories = db.list_categories(user)?;

    println!();
    println!("🗂️  Categories");
    println!("   ─────────────────────────────────────────────────────────────");

    for category in categories {
        let marker = if category.is_system { " (system)" } else { "" };
        let keywords = if category.keywords.is_empty() {
            String::new()
        } else {
            format!(" │ {}", category.keywords.join(", "))
        };
        println!(
            "   [{:>3}] {}{}{}",
            category.id, category.name, marker, keywords
        );
    }

    Ok(())
}

pub fn cmd_categories_add(
    db: &Database,
    user: UserId,
    name: &str,
    keywords: &[String],
) -> Result<()> {
    let category = db.create_category(user, name, keywords)?;
    println!("✅ Created category '{}' (id: {})", category.name, category.id);
    if !category.keywords.is_empty() {
        println!("   Keywords: {}", category.keywords.join(", "));
        println!("   Run 'tally recategorize' to apply them to existing transactions.");
    }
    Ok(())
}

pub fn cmd_categories_rename(
    db: &Database,
    user: UserId,
    category: &str,
    new_name: &str,
) -> Result<()> {
    let category = resolve_category(db, user, category)?;
    Categorizer::new(db).update_category(
        user,
        category.id,
        &CategoryUpdate {
            name: Some(new_name.to_string()),
            ..Default::default()
        },
    )?;
    println!("✅ Renamed '{}' to '{}'", category.name, new_name.trim());
    Ok(())
}

pub fn cmd_categories_keywords(
    db: &Database,
    user: UserId,
    category: &str,
    keywords: &[String],
) -> Result<()> {
    let category = resolve_category(db, user, category)?;
    let result = Categorizer::new(db).update_category(
        user,
        category.id,
        &CategoryUpdate {
            keywords: Some(keywords.to_vec()),
            ..Default::default()
        },
    )?;
    println!("✅ Updated keywords for '{}'", category.name);
    print_reclassified(&result);
    Ok(())
}

pub fn cmd_categories_add_keyword(
    db: &Database,
    user: UserId,
    category: &str,
    keyword: &str,
) -> Result<()> {
    let category = resolve_category(db, user, category)?;
    let result = Categorizer::new(db).add_keyword(user, category.id, keyword)?;
    println!("✅ Added keyword '{}' to '{}'", keyword.trim(), category.name);
    print_reclassified(&result);
    Ok(())
}

pub fn cmd_categories_remove_keyword(
    db: &Database,
    user: UserId,
    category: &str,
    keyword: &str,
) -> Result<()> {
    let category = resolve_category(db, user, category)?;
    let result = Categorizer::new(db).remove_keyword(user, category.id, keyword)?;
    println!(
        "✅ Removed keyword '{}' from '{}'",
        keyword.trim(),
        category.name
    );
    print_reclassified(&result);
    Ok(())
}

pub fn cmd_categories_delete(db: &Database, user: UserId, category: &str) -> Result<()> {
    let category = resolve_category(db, user, category)?;
    let result = Categorizer::new(db).delete_category(user, category.id)?;
    println!("✅ Deleted category '{}'", category.name);
    println!(
        "   {} transactions moved to Uncategorized, {} budgets removed",
        result.transactions_reassigned, result.budgets_removed
    );
    if result.conflicts_updated > 0 {
        println!(
            "   {} conflicts no longer list it",
            result.conflicts_updated
        );
    }
    Ok(())
}

pub fn cmd_categories_move(db: &Database, user: UserId, category: &str, to: &str) -> Result<()> {
    let active = resolve_category(db, user, category)?;
    let over = resolve_category(db, user, to)?;
    let ordered = db.reorder_categories(user, active.id, over.id)?;

    println!("✅ Moved '{}'", active.name);
    let names: Vec<&str> = ordered.iter().map(|c| c.name.as_str()).collect();
    println!("   Order: {}", names.join(" → "));
    Ok(())
}

pub fn cmd_recategorize(db: &Database, user: UserId, all: bool) -> Result<()> {
    let mode = if all {
        RecategorizeMode::All
    } else {
        RecategorizeMode::Uncategorized
    };

    println!("🏷️  Recategorizing...");
    let result = Categorizer::new(db).recategorize(user, mode)?;

    println!("✅ Processed {} transactions", result.processed);
    println!("   Updated: {}", result.updated);
    if result.conflicts > 0 {
        println!(
            "   ⚠️  Conflicts: {}. Run 'tally conflicts' to review.",
            result.conflicts
        );
    }
    Ok(())
}
