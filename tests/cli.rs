use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ledger-aging").unwrap();
    cmd.env("HOME", home).env_remove("RUST_LOG");
    cmd
}

fn init(home: &Path) -> std::path::PathBuf {
    let data_dir = home.join("data");
    cmd(home)
        .args(["init", "--data-dir", data_dir.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized ledger-aging"));
    data_dir
}

fn write_ledger(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("ledger.csv");
    std::fs::write(
        &path,
        "\
account_id,account_name,document_number,document_date,debit,credit,iban,payment_term
A1,Acme Tekstil,1,2024-01-10,1000.00,,TR12 0001,30
A1,Acme Tekstil,2,2024-02-10,,400.00,,
A1,Acme Tekstil,3,2024-03-10,,800.00,,
Z9,Zero Ltd,4,2024-01-12,50.00,,,
Z9,Zero Ltd,5,2024-02-12,,50.00,,
H1,Historic AS,6,15.09.2023,,75.00,,
",
    )
    .unwrap();
    path
}

#[test]
fn test_import_resolve_and_report() {
    let home = tempfile::tempdir().unwrap();
    init(home.path());
    let ledger = write_ledger(home.path());

    cmd(home.path())
        .args(["import", ledger.to_str().unwrap(), "--year", "2024"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 current-year entries"))
        .stdout(predicate::str::contains("1 historical added"));

    cmd(home.path())
        .args(["resolve", "--as-of", "2024-04-15"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 records, 1 accounts at zero"));

    cmd(home.path())
        .args(["report", "aging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A1"))
        .stdout(predicate::str::contains("H1"))
        .stdout(predicate::str::contains("-200.00"))
        .stdout(predicate::str::contains("Z9").not());
}

#[test]
fn test_export_json_matches_scenario() {
    let home = tempfile::tempdir().unwrap();
    init(home.path());
    let ledger = write_ledger(home.path());
    cmd(home.path())
        .args(["import", ledger.to_str().unwrap(), "--year", "2024"])
        .assert()
        .success();
    cmd(home.path())
        .args(["resolve", "--as-of", "2024-04-15"])
        .assert()
        .success();

    let output = cmd(home.path())
        .args(["export", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);

    let a1 = &records[0];
    assert_eq!(a1["account_id"], "A1");
    assert_eq!(a1["iban"], "TR12 0001");
    assert_eq!(a1["current_balance"], "-200.00");
    assert_eq!(a1["monthly_balances"]["2024-03"], "-200.00");
    assert_eq!(a1["monthly_balances"]["older"], "0");
    assert_eq!(a1["monthly_balances"].as_object().unwrap().len(), 5);

    let h1 = &records[1];
    assert_eq!(h1["monthly_balances"]["older"], "-75.00");
}

#[test]
fn test_resolve_twice_gives_identical_export() {
    let home = tempfile::tempdir().unwrap();
    init(home.path());
    let ledger = write_ledger(home.path());
    cmd(home.path())
        .args(["import", ledger.to_str().unwrap(), "--year", "2024"])
        .assert()
        .success();

    let mut exports = Vec::new();
    for _ in 0..2 {
        cmd(home.path())
            .args(["resolve", "--as-of", "2024-04-15"])
            .assert()
            .success();
        let out = cmd(home.path()).args(["export", "--format", "csv"]).output().unwrap();
        exports.push(out.stdout);
    }
    assert_eq!(exports[0], exports[1]);
}

#[test]
fn test_resolve_on_empty_ledger_fails() {
    let home = tempfile::tempdir().unwrap();
    init(home.path());
    cmd(home.path())
        .args(["resolve", "--as-of", "2024-04-15"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("empty"));
}

#[test]
fn test_months_report_shows_annotations() {
    let home = tempfile::tempdir().unwrap();
    init(home.path());
    let ledger = write_ledger(home.path());
    cmd(home.path())
        .args(["import", ledger.to_str().unwrap(), "--year", "2024"])
        .assert()
        .success();

    cmd(home.path())
        .args(["report", "months", "A1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-02"))
        .stdout(predicate::str::contains("single document"));
}

#[test]
fn test_status_before_init() {
    let home = tempfile::tempdir().unwrap();
    cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Database not found"));
}

#[test]
fn test_load_rejects_missing_database() {
    let home = tempfile::tempdir().unwrap();
    let empty = home.path().join("nothing-here");
    std::fs::create_dir_all(&empty).unwrap();
    cmd(home.path())
        .args(["load", empty.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No database found"));
}
