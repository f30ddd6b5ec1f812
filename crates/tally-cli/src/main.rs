//! Tally CLI - Bank export importer and categorizer
//!
//! Usage:
//!   tally init                      Initialize database
//!   tally import --file FILE        Import transactions (auto-detects bank format)
//!   tally categories add Coffee --keywords starbucks,tim
//!   tally conflicts                 Review ambiguous matches

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let user = cli.user;
    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, user),
        Commands::Banks => commands::cmd_banks(),
        Commands::Detect { file } => commands::cmd_detect(&file),
        Commands::Import {
            file,
            bank,
            allow_duplicates,
            no_categorize,
            json,
        } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_import(
                &db,
                user,
                &file,
                bank.as_deref(),
                allow_duplicates,
                no_categorize,
                json,
            )
        }
        Commands::Recategorize { all } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_recategorize(&db, user, all)
        }
        Commands::Categories { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None | Some(CategoriesAction::List) => commands::cmd_categories_list(&db, user),
                Some(CategoriesAction::Add { name, keywords }) => {
                    commands::cmd_categories_add(&db, user, &name, &keywords)
                }
                Some(CategoriesAction::Rename { category, new_name }) => {
                    commands::cmd_categories_rename(&db, user, &category, &new_name)
                }
                Some(CategoriesAction::Keywords { category, keywords }) => {
                    commands::cmd_categories_keywords(&db, user, &category, &keywords)
                }
                Some(CategoriesAction::AddKeyword { category, keyword }) => {
                    commands::cmd_categories_add_keyword(&db, user, &category, &keyword)
                }
                Some(CategoriesAction::RemoveKeyword { category, keyword }) => {
                    commands::cmd_categories_remove_keyword(&db, user, &category, &keyword)
                }
                Some(CategoriesAction::Delete { category }) => {
                    commands::cmd_categories_delete(&db, user, &category)
                }
                Some(CategoriesAction::Move { category, to }) => {
                    commands::cmd_categories_move(&db, user, &category, &to)
                }
            }
        }
        Commands::Conflicts { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None | Some(ConflictsAction::List) => commands::cmd_conflicts_list(&db, user),
                Some(ConflictsAction::Resolve {
                    transaction_id,
                    category,
                }) => commands::cmd_conflicts_resolve(&db, user, transaction_id, &category),
            }
        }
        Commands::Imports { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None | Some(ImportsAction::List) => commands::cmd_imports_list(&db, user),
                Some(ImportsAction::Delete { id }) => commands::cmd_imports_delete(&db, user, id),
            }
        }
        Commands::Transactions { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => commands::cmd_transactions_list(&db, user, &Default::default()),
                Some(TransactionsAction::List {
                    limit,
                    from,
                    to,
                    category,
                    uncategorized,
                    search,
                }) => {
                    let query = commands::ListQuery {
                        limit,
                        from,
                        to,
                        category,
                        uncategorized,
                        search,
                    };
                    commands::cmd_transactions_list(&db, user, &query)
                }
                Some(TransactionsAction::Add {
                    date,
                    description,
                    out,
                    amount_in,
                    category,
                }) => commands::cmd_transactions_add(
                    &db,
                    user,
                    &date,
                    &description,
                    out,
                    amount_in,
                    category.as_deref(),
                ),
                Some(TransactionsAction::Delete { ids }) => {
                    commands::cmd_transactions_delete(&db, user, &ids)
                }
            }
        }
        Commands::Budgets { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None => {
                    let year = chrono::Datelike::year(&chrono::Local::now().date_naive());
                    commands::cmd_budgets_list(&db, user, &year.to_string())
                }
                Some(BudgetsAction::List { period }) => {
                    commands::cmd_budgets_list(&db, user, &period)
                }
                Some(BudgetsAction::Set {
                    category,
                    period,
                    amount,
                }) => commands::cmd_budgets_set(&db, user, &category, &period, amount),
                Some(BudgetsAction::Delete { id }) => commands::cmd_budgets_delete(&db, user, id),
                Some(BudgetsAction::Copy { from, to }) => {
                    commands::cmd_budgets_copy(&db, user, &from, &to)
                }
            }
        }
    }
}
