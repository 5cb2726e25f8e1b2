#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

fn csv(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: open accounts and move funds
    let accounts = csv(&["account, balance", "1, 1000", "2, 500"]);
    let transfers1 = csv(&["request_id, from, to, amount", "r1, 1, 2, 300"]);

    let output1 = Command::new(cargo_bin!("paybridge"))
        .arg("process")
        .arg(transfers1.path())
        .arg("--accounts")
        .arg(accounts.path())
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,700\n"));
    assert!(stdout1.contains("2,800\n"));

    // 2. Second run: re-seeding must not reset the stored balances
    let transfers2 = csv(&["request_id, from, to, amount", "r2, 2, 1, 50"]);

    let output2 = Command::new(cargo_bin!("paybridge"))
        .arg("process")
        .arg(transfers2.path())
        .arg("--accounts")
        .arg(accounts.path())
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert!(stdout2.contains("1,750\n"));
    assert!(stdout2.contains("2,750\n"));

    // 3. The stored history feeds the report
    let report_path = dir.path().join("user_1.csv");
    let status = Command::new(cargo_bin!("paybridge"))
        .arg("report")
        .arg("--user")
        .arg("1")
        .arg("--output")
        .arg(&report_path)
        .arg("--db-path")
        .arg(&db_path)
        .status()
        .expect("Failed to execute command");
    assert!(status.success());

    let report = std::fs::read_to_string(&report_path).unwrap();
    assert!(report.contains(",r1,1,2,300,SUCCESS,,700,800,"));
    assert!(report.contains(",r2,2,1,50,SUCCESS,,750,750,"));
    assert!(report.contains("r1,TRANSFER,SUCCESS,transfer completed,"));
    assert!(report.contains("Transactions,2\n"));
    assert!(report.contains("NetFlow(Cents),-250\n"));
}
