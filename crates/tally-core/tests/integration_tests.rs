//! Integration tests for tally-core
//!
//! These tests exercise the full rows → detect → import → categorize workflow.

use chrono::NaiveDate;
use tally_core::{
    db::{Database, TransactionFilter},
    models::{
        Bank, BulkImportOptions, CategoryUpdate, Confidence, ParsedTransaction, RecategorizeMode,
        SourceFile, TransactionSource,
    },
    Categorizer, Error, ImportOptions, Importer, Registry, Row,
};

fn row(cells: &[&str]) -> Row {
    cells.iter().map(|s| s.to_string()).collect()
}

/// An AMEX spreadsheet: 11 statement rows, a header row, then data
fn amex_statement(data: &[&[&str]]) -> Vec<Row> {
    let mut rows: Vec<Row> = (1..=11)
        .map(|i| row(&["Statement detail", i.to_string().as_str()]))
        .collect();
    rows.push(row(&[
        "Date",
        "Date Processed",
        "Description",
        "Amount",
        "",
        "",
        "",
        "",
        "Merchant Address",
        "Additional Information",
    ]));
    rows.extend(data.iter().map(|r| row(r)));
    rows
}

const COFFEE: &[&str] = &[
    "16 Dec. 2025",
    "16 Dec. 2025",
    "Coffee Shop",
    "$4.50",
    "",
    "",
    "",
    "",
    "",
    "Local purchase",
];

fn cibc_statement() -> Vec<Row> {
    vec![
        row(&["2025-11-01", "METRO GROCERY #22", "84.12", ""]),
        row(&["2025-11-02", "SHELL STATION", "60.00", ""]),
        row(&["2025-11-03", "COSTCO GAS BAR", "45.00", ""]),
        row(&["2025-11-04", "PAYROLL DEPOSIT", "", "2400.00"]),
        row(&["2025-11-05", "BOOKSHOP", "18.00", ""]),
    ]
}

fn setup() -> Database {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    db.ensure_user(1).expect("Failed to seed user");
    db
}

fn keywords(list: &[&str]) -> Vec<String> {
    list.iter().map(|k| k.to_string()).collect()
}

#[test]
fn test_amex_coffee_end_to_end() {
    let db = setup();
    let rows = amex_statement(&[COFFEE]);
    let file = SourceFile::new("activity.xlsx");

    let detection = Registry::new()
        .detect(&file, &rows)
        .expect("AMEX should be detected");
    assert_eq!(detection.bank, Bank::Amex);
    assert_eq!(detection.confidence, Confidence::High);

    let summary = Importer::new(&db)
        .import_rows(1, &file, &rows, &ImportOptions::default())
        .expect("Import failed");
    assert_eq!(summary.bank, Bank::Amex);
    assert_eq!(summary.result.inserted, 1);

    let stored = db.list_transactions(1, &TransactionFilter::new()).unwrap();
    assert_eq!(stored.len(), 1);
    let tx = &stored[0];
    assert_eq!(tx.date, NaiveDate::from_ymd_opt(2025, 12, 16).unwrap());
    assert_eq!(tx.amount_out, 4.50);
    assert_eq!(tx.amount_in, 0.0);
    assert_eq!(tx.match_field, "Local purchase");
    assert_eq!(tx.source, TransactionSource::Bank(Bank::Amex));
}

#[test]
fn test_reimport_is_idempotent() {
    let db = setup();
    let parsed = vec![
        ParsedTransaction::new(
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
            "GYM",
            "GYM",
            40.0,
            0.0,
        ),
        ParsedTransaction::new(
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            "REFUND",
            "REFUND",
            0.0,
            12.5,
        ),
    ];

    let first = db
        .bulk_import(1, &parsed, BulkImportOptions::default())
        .unwrap();
    assert_eq!(first.inserted, 2);
    let count = db.count_transactions(1, &TransactionFilter::new()).unwrap();

    let second = db
        .bulk_import(1, &parsed, BulkImportOptions::default())
        .unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(
        db.count_transactions(1, &TransactionFilter::new()).unwrap(),
        count
    );
}

#[test]
fn test_identical_rows_in_one_file_are_kept() {
    let db = setup();
    let rows = amex_statement(&[COFFEE, COFFEE]);
    let file = SourceFile::new("activity.xlsx");
    let importer = Importer::new(&db);

    let first = importer
        .import_rows(1, &file, &rows, &ImportOptions::default())
        .unwrap();
    assert_eq!(first.result.inserted, 2);
    assert_eq!(first.result.skipped, 0);

    let second = importer
        .import_rows(1, &file, &rows, &ImportOptions::default())
        .unwrap();
    assert_eq!(second.result.inserted, 0);
    assert_eq!(second.result.skipped, 2);
    assert_eq!(db.count_transactions(1, &TransactionFilter::new()).unwrap(), 2);
}

#[test]
fn test_overlapping_keywords_always_conflict() {
    let db = setup();
    db.create_category(1, "Gas", &keywords(&["gas", "shell"]))
        .unwrap();
    db.create_category(1, "Costco", &keywords(&["costco"]))
        .unwrap();

    Importer::new(&db)
        .import_rows(
            1,
            &SourceFile::new("cibc.csv"),
            &cibc_statement(),
            &ImportOptions {
                categorize: false,
                ..Default::default()
            },
        )
        .unwrap();

    let categorizer = Categorizer::new(&db);
    for mode in [RecategorizeMode::Uncategorized, RecategorizeMode::All] {
        let result = categorizer.recategorize(1, mode).unwrap();
        assert_eq!(result.conflicts, 1, "mode {:?}", mode);
    }

    let conflicts = db.list_conflicts(1).unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].transaction.description, "COSTCO GAS BAR");
    assert!(conflicts[0].transaction.category_id.is_none());
    assert_eq!(conflicts[0].candidates.len(), 2);

    // Picking one settles it and later passes leave it alone
    let costco = db.get_category_by_name(1, "Costco").unwrap().unwrap();
    categorizer
        .resolve_conflict(1, conflicts[0].transaction.id, costco.id)
        .unwrap();
    assert!(db.list_conflicts(1).unwrap().is_empty());
    let again = categorizer
        .recategorize(1, RecategorizeMode::Uncategorized)
        .unwrap();
    assert_eq!(again.conflicts, 0);

    // A full pass still reports the overlap but keeps the user's choice
    let full = categorizer.recategorize(1, RecategorizeMode::All).unwrap();
    assert_eq!(full.conflicts, 1);
    let tx = db
        .get_transaction(1, conflicts[0].transaction.id)
        .unwrap()
        .unwrap();
    assert_eq!(tx.category_id, Some(costco.id));
    assert!(db.list_conflicts(1).unwrap().is_empty());
}

#[test]
fn test_keyword_edit_never_leaves_stale_category() {
    let db = setup();
    let auto = db
        .create_category(1, "Auto", &keywords(&["shell", "gas"]))
        .unwrap();
    let fuel = db.create_category(1, "Fuel", &keywords(&["station"])).unwrap();

    Importer::new(&db)
        .import_rows(
            1,
            &SourceFile::new("cibc.csv"),
            &cibc_statement(),
            &ImportOptions::default(),
        )
        .unwrap();

    // SHELL STATION matched both Auto and Fuel; settle it on Auto first
    let shell = db
        .list_transactions(1, &TransactionFilter::new().search(Some("shell")))
        .unwrap()
        .remove(0);
    Categorizer::new(&db)
        .resolve_conflict(1, shell.id, auto.id)
        .unwrap();

    let result = Categorizer::new(&db)
        .update_category(
            1,
            auto.id,
            &CategoryUpdate {
                keywords: Some(keywords(&["gas"])),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(result.assigned, 1);

    let shell = db.get_transaction(1, shell.id).unwrap().unwrap();
    assert_ne!(shell.category_id, Some(auto.id));
    assert_eq!(shell.category_id, Some(fuel.id));

    // Removing the last keyword sends COSTCO GAS BAR back to uncategorized
    let result = Categorizer::new(&db)
        .update_category(
            1,
            auto.id,
            &CategoryUpdate {
                keywords: Some(vec![]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(result.uncategorized, 1);
    let in_auto = TransactionFilter::new().category_id(Some(auto.id));
    assert_eq!(db.count_transactions(1, &in_auto).unwrap(), 0);
}

#[test]
fn test_delete_category_is_safe() {
    let db = setup();
    let system = db.ensure_user(1).unwrap();
    let groceries = db
        .create_category(1, "Groceries", &keywords(&["grocery", "costco"]))
        .unwrap();
    Importer::new(&db)
        .import_rows(
            1,
            &SourceFile::new("cibc.csv"),
            &cibc_statement(),
            &ImportOptions::default(),
        )
        .unwrap();
    db.set_budget(1, groceries.id, 2025, Some(11), 500.0).unwrap();

    let in_groceries = TransactionFilter::new().category_id(Some(groceries.id));
    let referencing = db.count_transactions(1, &in_groceries).unwrap();
    assert_eq!(referencing, 2);

    let result = Categorizer::new(&db)
        .delete_category(1, groceries.id)
        .unwrap();
    assert_eq!(result.transactions_reassigned, 2);
    assert_eq!(result.budgets_removed, 1);

    let in_uncategorized = TransactionFilter::new().category_id(Some(system.uncategorized));
    assert_eq!(db.count_transactions(1, &in_uncategorized).unwrap(), 2);
    assert!(db.list_budgets(1, 2025, Some(11)).unwrap().is_empty());

    // Deleted-category transactions are uncategorized for the next pass
    db.create_category(1, "Costco", &keywords(&["costco"])).unwrap();
    let pass = Categorizer::new(&db)
        .recategorize(1, RecategorizeMode::Uncategorized)
        .unwrap();
    assert_eq!(pass.updated, 1);
}

#[test]
fn test_system_categories_are_protected() {
    let db = setup();
    let system = db.ensure_user(1).unwrap();
    let categorizer = Categorizer::new(&db);
    let before = db.list_categories(1).unwrap();

    for id in [system.uncategorized, system.excluded] {
        assert!(matches!(
            categorizer.delete_category(1, id),
            Err(Error::SystemCategory(_))
        ));
        assert!(matches!(
            categorizer.update_category(
                1,
                id,
                &CategoryUpdate {
                    name: Some("Renamed".into()),
                    ..Default::default()
                },
            ),
            Err(Error::SystemCategory(_))
        ));
    }

    let after = db.list_categories(1).unwrap();
    let names = |c: &[tally_core::models::Category]| {
        c.iter().map(|c| c.name.clone()).collect::<Vec<_>>()
    };
    assert_eq!(names(&before), names(&after));
}

#[test]
fn test_income_is_matchable() {
    let db = setup();
    let system = db.ensure_user(1).unwrap();
    let income = system.income.unwrap();
    Categorizer::new(&db)
        .add_keyword(1, income, "payroll")
        .unwrap();

    let summary = Importer::new(&db)
        .import_rows(
            1,
            &SourceFile::new("cibc.csv"),
            &cibc_statement(),
            &ImportOptions::default(),
        )
        .unwrap();
    assert_eq!(summary.categorization.unwrap().updated, 1);

    let in_income = TransactionFilter::new().category_id(Some(income));
    let paid = db.list_transactions(1, &in_income).unwrap();
    assert_eq!(paid.len(), 1);
    assert_eq!(paid[0].amount_in, 2400.0);
}
