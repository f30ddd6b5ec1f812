//! Import batch commands

use anyhow::Result;
use tally_core::models::UserId;
use tally_core::Database;

use super::truncate;

pub fn cmd_imports_list(db: &Database, user: UserId) -> Result<()> {
    let imports = db.list_imports(user)?;

    if imports.is_empty() {
        println!("No imports yet. Import a statement with:");
        println!("  tally import --file statement.csv");
        return Ok(());
    }

    println!();
    println!("📦 Imports");
    println!("   ─────────────────────────────────────────────────────────────");

    for import in imports {
        println!(
            "   [{:>3}] {} │ {:<6} │ {:>4} tx │ {:>10.2} │ {}",
            import.id,
            import.created_at.format("%Y-%m-%d %H:%M"),
            import.source,
            import.transaction_count,
            import.total_amount,
            truncate(&import.file_name, 30)
        );
    }

    Ok(())
}

pub fn cmd_imports_delete(db: &Database, user: UserId, id: i64) -> Result<()> {
    let import = db
        .get_import(user, id)?
        .ok_or_else(|| anyhow::anyhow!("Import {} not found", id))?;
    let removed = db.delete_import(user, id)?;

    println!("✅ Deleted import {} ({})", id, import.file_name);
    println!("   Removed {} transactions", removed);
    Ok(())
}
