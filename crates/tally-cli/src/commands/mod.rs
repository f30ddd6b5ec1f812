//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init, bank listing, detection and shared utilities (open_db)
//! - `import` - File decoding and import
//! - `categories` - Category, keyword and recategorize commands
//! - `conflicts` - Conflict review and resolution
//! - `imports` - Import batch commands
//! - `transactions` - Transaction commands (list, add, delete)
//! - `budgets` - Budget commands

pub mod budgets;
pub mod categories;
pub mod conflicts;
pub mod core;
pub mod import;
pub mod imports;
pub mod transactions;

// Re-export command functions for main.rs
pub use budgets::*;
pub use categories::*;
pub use conflicts::*;
pub use core::*;
pub use import::*;
pub use imports::*;
pub use transactions::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format a signed amount with color: red for money out, green for money in
pub fn format_amount(net: f64) -> String {
    if net < 0.0 {
        format!("\x1b[31m${:.2}\x1b[0m", net.abs())
    } else {
        format!("\x1b[32m+${:.2}\x1b[0m", net)
    }
}
