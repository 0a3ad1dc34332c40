use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const LEDGER_CSV: &str = "\
date,partner_id,move_name,debit,credit
2023-12-15,B,INV/2023/0099,30,0
2024-01-01,A,INV/2024/0001,100,0
2024-01-05,A,PAY/2024/0001,0,40
2024-01-05,A,PAY/2024/0001,0,40
2024-02-01,B,INV/2024/0002,20,0
2024-03-01,C,,10,0
not a date,C,INV/2024/0003,5,0
";

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ledger.csv"), LEDGER_CSV).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("arledger").unwrap();
        cmd.env("ARLEDGER_CONFIG_DIR", self.path("config"))
            .env_remove("ARLEDGER_LOG")
            .env("NO_COLOR", "1");
        cmd
    }

    fn init(&self) {
        self.cmd()
            .args(["init", "--data-dir"])
            .arg(self.path("data"))
            .arg("--ledger-source")
            .arg(self.path("ledger.csv"))
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized arledger"));
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn init_writes_settings() {
    let env = Env::new();
    env.init();
    let settings = read(&env.path("config").join("settings.json"));
    assert!(settings.contains("ledger.csv"));
    assert!(env.path("data").join("exports").is_dir());
}

#[test]
fn partner_ledger_shows_running_balance() {
    let env = Env::new();
    env.init();
    env.cmd()
        .args(["report", "ledger", "--partner", "A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Customer: A"))
        .stdout(predicate::str::contains("Final Balance: 60.00 EGP"));
}

#[test]
fn partner_ledger_placeholder_move_name() {
    let env = Env::new();
    env.init();
    env.cmd()
        .args(["report", "ledger", "--partner", "C"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Journal Entry"));
}

#[test]
fn source_flag_overrides_settings() {
    let env = Env::new();
    env.cmd()
        .arg("--source")
        .arg(env.path("ledger.csv"))
        .args(["report", "partners"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Partners (3"))
        .stdout(predicate::str::contains("skipped (bad dates)"));
}

#[test]
fn trial_balance_for_year() {
    let env = Env::new();
    env.init();
    env.cmd()
        .args(["report", "trial-balance", "--year", "2024"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Trial Balance FY 2024"))
        .stdout(predicate::str::contains("120.00"));
}

#[test]
fn export_trial_balance_csv() {
    let env = Env::new();
    env.init();
    let out = env.path("tb.csv");
    env.cmd()
        .args(["export", "trial-balance", "--year", "2024", "--format", "csv", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let text = read(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Partner,Opening,Period,Closing",
            "A,0.00,60.00,60.00",
            "B,30.00,20.00,50.00",
            "C,0.00,10.00,10.00",
            "Total,30.00,90.00,120.00",
        ]
    );
}

#[test]
fn export_ledger_repeated_partner_counts_once() {
    let env = Env::new();
    env.init();
    let out = env.path("a.csv");
    env.cmd()
        .args(["export", "ledger", "--partner", "A", "--partner", "A", "--format", "csv", "--output"])
        .arg(&out)
        .assert()
        .success();

    let text = read(&out);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Partner,Date,Move Name,Debit,Credit,Balance",
            "A,2024-01-01,INV/2024/0001,100.00,0.00,100.00",
            "A,2024-01-05,PAY/2024/0001,0.00,40.00,60.00",
            "Total,,,100.00,40.00,60.00",
        ]
    );
}

#[test]
fn init_stores_letterhead() {
    let env = Env::new();
    env.cmd()
        .args(["init", "--address-line", "12 Industrial Zone", "--vat-number", "300000000000003", "--data-dir"])
        .arg(env.path("data"))
        .assert()
        .success();
    let settings = read(&env.path("config").join("settings.json"));
    assert!(settings.contains("12 Industrial Zone"));
    assert!(settings.contains("300000000000003"));
}

#[test]
fn export_ledger_xlsx_to_default_path() {
    let env = Env::new();
    env.init();
    env.cmd()
        .args(["export", "ledger", "--all"])
        .assert()
        .success();
    let exports: Vec<_> = std::fs::read_dir(env.path("data").join("exports"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(exports.len(), 1);
    assert!(exports[0].starts_with("partner-ledger-"));
    assert!(exports[0].ends_with(".xlsx"));
}

#[test]
fn backwards_range_is_rejected() {
    let env = Env::new();
    env.init();
    env.cmd()
        .args(["report", "ledger", "--partner", "A", "--from", "2024-02-01", "--to", "2024-01-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date range"));
}

#[test]
fn missing_source_is_reported() {
    let env = Env::new();
    env.cmd()
        .args(["report", "partners"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No data source configured"));
}

#[test]
fn ledger_requires_a_selection() {
    let env = Env::new();
    env.init();
    env.cmd()
        .args(["report", "ledger"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No partners selected"));
}

#[test]
fn completions_print_a_script() {
    let env = Env::new();
    env.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("arledger"));
}
