//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use tally_core::models::NewTransaction;
use tally_core::Database;

use crate::commands::{self, format_period, parse_period, truncate, ListQuery};

const USER: i64 = 1;

const CIBC_CSV: &str = "\
06/01/2025,GROCERY MART,52.10,
06/02/2025,PAYROLL ACME,,2500.00

06/03/2025,CITY TRANSIT,3.25,
";

fn setup_test_db() -> Database {
    let db = Database::in_memory().unwrap();
    db.ensure_user(USER).unwrap();
    db
}

fn write_temp(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn add_transaction(db: &Database, description: &str, out: f64) -> i64 {
    db.insert_transaction(
        USER,
        &NewTransaction {
            date: chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            description: description.to_string(),
            match_field: None,
            amount_out: out,
            amount_in: 0.0,
            category_id: None,
        },
    )
    .unwrap()
    .id
}

// ========== Decoder Tests ==========

#[test]
fn test_csv_rows_skip_blank_lines_and_allow_ragged_rows() {
    let rows = commands::csv_rows(b"a,b,c\n\n,,\nd,e\n").unwrap();
    assert_eq!(
        rows,
        vec![
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec!["d".to_string(), "e".to_string()],
        ]
    );
}

#[test]
fn test_csv_rows_keep_quoted_commas() {
    let rows = commands::csv_rows(b"06/01/2025,\"TIM HORTONS, #12\",2.10,\n").unwrap();
    assert_eq!(rows[0][1], "TIM HORTONS, #12");
    assert_eq!(rows[0][3], "");
}

#[test]
fn test_excel_serial_to_date() {
    assert_eq!(commands::excel_serial_to_date(45658.0), "2025-01-01");
    assert_eq!(commands::excel_serial_to_date(45658.75), "2025-01-01");
    assert_eq!(commands::excel_serial_to_date(1.0), "1899-12-31");
}

#[test]
fn test_read_rows_dispatches_on_extension() {
    let csv = write_temp(".CSV", CIBC_CSV);
    let rows = commands::read_rows(csv.path()).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1][1], "PAYROLL ACME");

    let txt = write_temp(".txt", CIBC_CSV);
    let err = commands::read_rows(txt.path()).unwrap_err();
    assert!(err.to_string().contains("Unsupported file format"));
}

#[test]
fn test_source_file_uses_file_name() {
    let source = commands::source_file(std::path::Path::new("/tmp/exports/Summary.XLSX"));
    assert_eq!(source.name, "Summary.XLSX");
    assert_eq!(source.extension().as_deref(), Some(".xlsx"));
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a longer description", 10), "a longe...");
    assert_eq!(truncate("café crème brûlée", 8), "café ...");
}

#[test]
fn test_parse_period() {
    assert_eq!(parse_period("2025").unwrap(), (2025, None));
    assert_eq!(parse_period("2025-03").unwrap(), (2025, Some(3)));
    assert!(parse_period("2025-13").is_err());
    assert!(parse_period("2025-00").is_err());
    assert!(parse_period("march").is_err());
    assert_eq!(format_period(2025, Some(3)), "2025-03");
    assert_eq!(format_period(2025, None), "2025");
}

#[test]
fn test_resolve_category_by_id_or_name() {
    let db = setup_test_db();
    let coffee = db.create_category(USER, "Coffee", &[]).unwrap();

    let by_id = commands::resolve_category(&db, USER, &coffee.id.to_string()).unwrap();
    assert_eq!(by_id.id, coffee.id);
    let by_name = commands::resolve_category(&db, USER, "coffee").unwrap();
    assert_eq!(by_name.id, coffee.id);
    assert!(commands::resolve_category(&db, USER, "Tea").is_err());
}

// ========== Import Command Tests ==========

#[test]
fn test_cmd_import_csv_end_to_end() {
    let db = setup_test_db();
    commands::cmd_categories_add(&db, USER, "Groceries", &["grocery".to_string()]).unwrap();
    let file = write_temp(".csv", CIBC_CSV);

    commands::cmd_import(&db, USER, file.path(), None, false, false, false).unwrap();

    let imports = db.list_imports(USER).unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].transaction_count, 3);
    assert!(imports[0].checksum.is_some());

    let groceries = db.get_category_by_name(USER, "Groceries").unwrap().unwrap();
    let filter = tally_core::TransactionFilter::new().category_id(Some(groceries.id));
    assert_eq!(db.count_transactions(USER, &filter).unwrap(), 1);

    // Same file again: nothing new, no empty batch
    commands::cmd_import(&db, USER, file.path(), None, false, false, true).unwrap();
    assert_eq!(db.list_imports(USER).unwrap().len(), 1);
    assert_eq!(db.count_transactions(USER, &Default::default()).unwrap(), 3);
}

#[test]
fn test_cmd_import_forced_bank_and_no_categorize() {
    let db = setup_test_db();
    commands::cmd_categories_add(&db, USER, "Groceries", &["grocery".to_string()]).unwrap();
    let file = write_temp(".csv", CIBC_CSV);

    commands::cmd_import(&db, USER, file.path(), Some("cibc"), false, true, false).unwrap();

    let filter = tally_core::TransactionFilter::new().uncategorized_only(true);
    assert_eq!(db.count_transactions(USER, &filter).unwrap(), 3);
}

#[test]
fn test_cmd_import_rejects_unknown_bank_and_unrecognized_file() {
    let db = setup_test_db();
    let file = write_temp(".csv", CIBC_CSV);
    assert!(commands::cmd_import(&db, USER, file.path(), Some("chase"), false, false, false).is_err());

    let junk = write_temp(".csv", "hello,world\n");
    assert!(commands::cmd_import(&db, USER, junk.path(), None, false, false, false).is_err());
    assert!(db.list_imports(USER).unwrap().is_empty());
}

#[test]
fn test_cmd_detect() {
    let file = write_temp(".csv", CIBC_CSV);
    assert!(commands::cmd_detect(file.path()).is_ok());
}

#[test]
fn test_cmd_banks() {
    assert!(commands::cmd_banks().is_ok());
}

#[test]
fn test_cmd_init_seeds_system_categories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.db");
    commands::cmd_init(&path, USER).unwrap();

    let db = commands::open_db(&path).unwrap();
    let names: Vec<String> = db
        .list_categories(USER)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Income", "Uncategorized", "Excluded"]);
}

// ========== Category Command Tests ==========

#[test]
fn test_cmd_categories_keywords_reclassifies() {
    let db = setup_test_db();
    let tx_id = add_transaction(&db, "STARBUCKS #42", 5.0);
    commands::cmd_categories_add(&db, USER, "Coffee", &[]).unwrap();

    commands::cmd_categories_keywords(&db, USER, "Coffee", &["starbucks".to_string()]).unwrap();

    let coffee = db.get_category_by_name(USER, "Coffee").unwrap().unwrap();
    assert_eq!(coffee.keywords, vec!["starbucks"]);
    let tx = db.get_transaction(USER, tx_id).unwrap().unwrap();
    assert_eq!(tx.category_id, Some(coffee.id));

    commands::cmd_categories_remove_keyword(&db, USER, "Coffee", "STARBUCKS").unwrap();
    let tx = db.get_transaction(USER, tx_id).unwrap().unwrap();
    assert_eq!(tx.category_id, None);
}

#[test]
fn test_cmd_categories_add_keyword_and_rename() {
    let db = setup_test_db();
    commands::cmd_categories_add(&db, USER, "Coffee", &["starbucks".to_string()]).unwrap();
    commands::cmd_categories_add_keyword(&db, USER, "Coffee", "tim hortons").unwrap();
    assert!(commands::cmd_categories_add_keyword(&db, USER, "Coffee", "Starbucks").is_err());

    commands::cmd_categories_rename(&db, USER, "Coffee", "Cafes").unwrap();
    let cafes = db.get_category_by_name(USER, "Cafes").unwrap().unwrap();
    assert_eq!(cafes.keywords, vec!["starbucks", "tim hortons"]);
    assert!(commands::cmd_categories_rename(&db, USER, "Excluded", "Hidden").is_err());
}

#[test]
fn test_cmd_categories_delete_and_move() {
    let db = setup_test_db();
    commands::cmd_categories_add(&db, USER, "Coffee", &[]).unwrap();
    commands::cmd_categories_add(&db, USER, "Rent", &[]).unwrap();

    commands::cmd_categories_move(&db, USER, "Rent", "Income").unwrap();
    let names: Vec<String> = db
        .list_categories(USER)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names[0], "Rent");

    commands::cmd_categories_delete(&db, USER, "Coffee").unwrap();
    assert!(db.get_category_by_name(USER, "Coffee").unwrap().is_none());
    assert!(commands::cmd_categories_delete(&db, USER, "Uncategorized").is_err());
    assert!(commands::cmd_categories_list(&db, USER).is_ok());
}

#[test]
fn test_cmd_recategorize_and_conflicts() {
    let db = setup_test_db();
    let tx_id = add_transaction(&db, "AMAZON PRIME VIDEO", 9.99);
    commands::cmd_categories_add(&db, USER, "Shopping", &["amazon".to_string()]).unwrap();
    commands::cmd_categories_add(&db, USER, "Streaming", &["prime video".to_string()]).unwrap();

    commands::cmd_recategorize(&db, USER, false).unwrap();
    assert_eq!(db.count_conflicts(USER).unwrap(), 1);
    assert!(commands::cmd_conflicts_list(&db, USER).is_ok());

    commands::cmd_conflicts_resolve(&db, USER, tx_id, "Streaming").unwrap();
    assert_eq!(db.count_conflicts(USER).unwrap(), 0);
    let streaming = db.get_category_by_name(USER, "Streaming").unwrap().unwrap();
    let tx = db.get_transaction(USER, tx_id).unwrap().unwrap();
    assert_eq!(tx.category_id, Some(streaming.id));
}

// ========== Transaction Command Tests ==========

#[test]
fn test_cmd_transactions_add_list_delete() {
    let db = setup_test_db();
    commands::cmd_categories_add(&db, USER, "Rent", &[]).unwrap();

    commands::cmd_transactions_add(&db, USER, "2025-06-01", "June rent", 1500.0, 0.0, Some("Rent"))
        .unwrap();
    assert!(commands::cmd_transactions_add(&db, USER, "2025-02-30", "Bad", 1.0, 0.0, None).is_err());
    assert!(commands::cmd_transactions_add(&db, USER, "2025-06-01", "Bad", 1.0, 0.0, Some("Nope")).is_err());

    let query = ListQuery {
        from: Some("2025-06-01".into()),
        category: Some("Rent".into()),
        ..Default::default()
    };
    assert!(commands::cmd_transactions_list(&db, USER, &query).is_ok());
    assert!(commands::cmd_transactions_list(&db, USER, &ListQuery::default()).is_ok());

    let ids: Vec<i64> = db
        .list_transactions(USER, &Default::default())
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids.len(), 1);
    commands::cmd_transactions_delete(&db, USER, &ids).unwrap();
    assert_eq!(db.count_transactions(USER, &Default::default()).unwrap(), 0);
}

#[test]
fn test_cmd_imports_list_and_delete() {
    let db = setup_test_db();
    let file = write_temp(".csv", CIBC_CSV);
    commands::cmd_import(&db, USER, file.path(), None, false, true, false).unwrap();
    assert!(commands::cmd_imports_list(&db, USER).is_ok());

    let id = db.list_imports(USER).unwrap()[0].id;
    commands::cmd_imports_delete(&db, USER, id).unwrap();
    assert_eq!(db.count_transactions(USER, &Default::default()).unwrap(), 0);
    assert!(commands::cmd_imports_delete(&db, USER, id).is_err());
}

// ========== Budget Command Tests ==========

#[test]
fn test_cmd_budgets_set_copy_delete() {
    let db = setup_test_db();
    commands::cmd_categories_add(&db, USER, "Groceries", &[]).unwrap();

    commands::cmd_budgets_set(&db, USER, "Groceries", "2025-03", 400.0).unwrap();
    commands::cmd_budgets_set(&db, USER, "Groceries", "2025-03", 450.0).unwrap();
    let march = db.list_budgets(USER, 2025, Some(3)).unwrap();
    assert_eq!(march.len(), 1);
    assert_eq!(march[0].amount, 450.0);

    commands::cmd_budgets_copy(&db, USER, "2025-03", "2025-04").unwrap();
    assert_eq!(db.list_budgets(USER, 2025, Some(4)).unwrap().len(), 1);
    assert!(commands::cmd_budgets_list(&db, USER, "2025-04").is_ok());

    assert!(commands::cmd_budgets_set(&db, USER, "Groceries", "2025", -1.0).is_err());
    commands::cmd_budgets_delete(&db, USER, march[0].id).unwrap();
    assert!(commands::cmd_budgets_delete(&db, USER, march[0].id).is_err());
}
