mod common;

use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use common::csv_file;
use predicates::prelude::*;
use std::process::Command;

fn process_with_db(db_path: &std::path::Path) -> assert_cmd::assert::Assert {
    let accounts = csv_file(&["account, balance", "1, 1000", "2, 500"]);
    let transfers = csv_file(&["request_id, from, to, amount", "r1, 1, 2, 300"]);

    Command::new(cargo_bin!("paybridge"))
        .arg("process")
        .arg(transfers.path())
        .arg("--accounts")
        .arg(accounts.path())
        .arg("--db-path")
        .arg(db_path)
        .assert()
}

#[cfg(not(feature = "storage-rocksdb"))]
#[test]
fn test_db_path_without_feature_runs_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger_db");

    process_with_db(&db_path)
        .success()
        .stdout("account,balance\n1,700\n2,800\n")
        .stderr(predicate::str::contains("Falling back to In-Memory storage"));

    // Nothing was persisted.
    assert!(!db_path.exists());
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_db_path_with_feature_persists_without_warning() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("ledger_db");

    process_with_db(&db_path)
        .success()
        .stdout("account,balance\n1,700\n2,800\n")
        .stderr(predicate::str::contains("Falling back").not());

    assert!(db_path.is_dir());
}
