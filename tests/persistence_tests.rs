use std::fs;

use chrono::NaiveDate;
use tempfile::tempdir;
use tracker_core::{
    config::ConfigManager,
    ledger::{Frequency, Ledger, RecurrenceRule, TransactionKind},
    storage::{JsonStorage, StorageBackend},
    TrackerError,
};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn reconciled_ledger() -> Ledger {
    let mut ledger = Ledger::new("Household");
    ledger
        .add_rule(
            RecurrenceRule::new(
                TransactionKind::Income,
                2500.0,
                "Salary",
                "Paycheck",
                Frequency::Weekly,
                day(2024, 3, 1),
            )
            .with_end_date(day(2024, 12, 31)),
        )
        .unwrap();
    ledger.reconcile(day(2024, 3, 29));
    ledger.set_budget("Food & Dining", 350.0).unwrap();
    ledger
}

#[test]
fn saved_ledger_round_trips_rules_and_generated_transactions() {
    let temp = tempdir().unwrap();
    let storage = JsonStorage::new(Some(temp.path().to_path_buf())).unwrap();
    let ledger = reconciled_ledger();

    storage.save(&ledger, "Household").unwrap();
    let loaded = storage.load("household").unwrap();

    assert_eq!(loaded.transactions, ledger.transactions);
    assert_eq!(loaded.rules, ledger.rules);
    assert_eq!(loaded.budgets, ledger.budgets);
    assert_eq!(loaded.rules[0].last_generated, Some(day(2024, 3, 29)));
    assert_eq!(loaded.transaction_count(), 4);
}

#[test]
fn reloaded_ledger_does_not_regenerate() {
    let temp = tempdir().unwrap();
    let storage = JsonStorage::new(Some(temp.path().to_path_buf())).unwrap();
    storage.save(&reconciled_ledger(), "household").unwrap();

    let mut loaded = storage.load("household").unwrap();
    assert_eq!(loaded.reconcile(day(2024, 3, 29)).total(), 0);
    assert_eq!(loaded.reconcile(day(2024, 4, 5)).total(), 1);
}

#[test]
fn list_and_delete_track_saved_files() {
    let temp = tempdir().unwrap();
    let storage = JsonStorage::new(Some(temp.path().to_path_buf())).unwrap();
    storage.save(&Ledger::new("B"), "beta").unwrap();
    storage.save(&Ledger::new("A"), "alpha").unwrap();

    assert_eq!(storage.list().unwrap(), vec!["alpha", "beta"]);
    storage.delete("alpha").unwrap();
    assert_eq!(storage.list().unwrap(), vec!["beta"]);
    assert!(matches!(storage.load("alpha"), Err(TrackerError::Storage(_))));
}

#[test]
fn failed_save_preserves_previous_file() {
    let temp = tempdir().unwrap();
    let storage = JsonStorage::new(Some(temp.path().to_path_buf())).unwrap();
    storage.save(&Ledger::new("Stable"), "stable").unwrap();
    let path = storage.ledger_path("stable");
    let original = fs::read_to_string(&path).unwrap();

    // A directory squatting on the temp name makes the write fail.
    fs::create_dir_all(path.with_extension("json.tmp")).unwrap();
    assert!(storage.save(&reconciled_ledger(), "stable").is_err());

    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn corrupt_ledger_surfaces_a_serde_error() {
    let temp = tempdir().unwrap();
    let storage = JsonStorage::new(Some(temp.path().to_path_buf())).unwrap();
    fs::write(storage.ledger_path("broken"), "{ not json").unwrap();

    assert!(matches!(storage.load("broken"), Err(TrackerError::Serde(_))));
}

#[test]
fn config_survives_reload() {
    let temp = tempdir().unwrap();
    let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).unwrap();

    let mut config = manager.load().unwrap();
    assert!(config.auto_reconcile);
    config.set("currency", "eur").unwrap();
    config.set("auto_reconcile", "false").unwrap();
    manager.save(&config).unwrap();

    let reloaded = manager.load().unwrap();
    assert_eq!(reloaded.currency, "EUR");
    assert!(!reloaded.auto_reconcile);
}
