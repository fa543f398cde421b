#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

const HEADER: &str = "action, plate, user, lot, amount, method, image";

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: register the vehicle and fund the wallet.
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "{HEADER}").unwrap();
    writeln!(csv1, "register, 49G1-11111, 1, , , ,").unwrap();
    writeln!(csv1, "topup, , 1, , 5000, ,").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("parkgate"));
    cmd1.arg(csv1.path())
        .arg("--db-path")
        .arg(&db_path)
        .arg("--report")
        .arg("wallets");

    let output1 = cmd1.output().expect("failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert!(stdout1.contains("1,5000"));

    // 2. Second run against the same DB: a full park-and-pay cycle
    // must see the recovered registration and balance.
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "{HEADER}").unwrap();
    writeln!(csv2, "entry, 49G1-11111, , 1, , ,").unwrap();
    writeln!(csv2, "exit, 49G1-11111, , 1, , ,").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("parkgate"));
    cmd2.arg(csv2.path())
        .arg("--db-path")
        .arg(&db_path)
        .arg("--report")
        .arg("wallets");

    let output2 = cmd2.output().expect("failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    assert!(stdout2.contains("1,3000"));
}

#[test]
fn test_rocksdb_open_session_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "{HEADER}").unwrap();
    writeln!(csv1, "register, 49G1-11111, 1, , , ,").unwrap();
    writeln!(csv1, "entry, 49G1-11111, , 1, , ,").unwrap();

    let mut cmd1 = Command::new(cargo_bin!("parkgate"));
    cmd1.arg(csv1.path()).arg("--db-path").arg(&db_path);
    assert!(cmd1.output().unwrap().status.success());

    // A second entry after restart is a duplicate and must not open
    // another session.
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "{HEADER}").unwrap();
    writeln!(csv2, "entry, 49G1-11111, , 1, , ,").unwrap();

    let mut cmd2 = Command::new(cargo_bin!("parkgate"));
    cmd2.arg(csv2.path()).arg("--db-path").arg(&db_path);

    let output2 = cmd2.output().expect("failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);
    let open_rows = stdout2
        .lines()
        .filter(|line| line.starts_with("49G1-11111") && line.contains(",IN,"))
        .count();
    assert_eq!(open_rows, 1);
}
