use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

#[test]
fn template_to_stdout_starts_with_header_row() -> anyhow::Result<()> {
    Command::cargo_bin("scm")?
        .args(["template", "orders", "--date", "2024-06-01"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("\"OrderID\","))
        .stdout(predicate::str::contains("TotalFinalPrice"));

    Command::cargo_bin("scm")?
        .args(["template", "suppliers", "--date", "2024-06-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FinalPricePerUnit"));
    Ok(())
}

#[test]
fn template_out_writes_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("orders.csv");

    Command::cargo_bin("scm")?
        .args(["template", "orders", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("out="));

    let body = fs::read_to_string(&out)?;
    assert!(body.starts_with("\"OrderID\","));
    Ok(())
}

#[test]
fn unknown_template_kind_is_usage_error() -> anyhow::Result<()> {
    Command::cargo_bin("scm")?
        .args(["template", "invoices"])
        .assert()
        .code(1);
    Ok(())
}

#[test]
fn mock_is_reproducible_with_seed() -> anyhow::Result<()> {
    let run = || -> anyhow::Result<Vec<u8>> {
        let out = Command::cargo_bin("scm")?
            .args(["mock", "--count", "5", "--suppliers", "3", "--seed", "1"])
            .output()?;
        assert!(out.status.success());
        Ok(out.stdout)
    };
    let first = run()?;

    let doc: serde_json::Value = serde_json::from_slice(&first)?;
    assert_eq!(doc["orders"].as_array().map(Vec::len), Some(5));
    assert_eq!(doc["suppliers"].as_array().map(Vec::len), Some(3));
    assert_eq!(doc["suppliers"][0]["id"], "SUP-101");
    Ok(())
}

#[test]
fn mock_without_suppliers_is_rejected() -> anyhow::Result<()> {
    Command::cargo_bin("scm")?
        .args(["mock", "--count", "2", "--suppliers", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("at least one supplier"));
    Ok(())
}

#[test]
fn config_hash_prints_hash_and_canonical_json() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let base = dir.path().join("base.yaml");
    fs::write(&base, "refresh:\n  interval_secs: 30\n")?;

    let out = Command::cargo_bin("scm")?
        .arg("config-hash")
        .arg(&base)
        .output()?;
    assert!(out.status.success());

    let stdout = String::from_utf8(out.stdout)?;
    let mut lines = stdout.lines();
    let hash = lines
        .next()
        .and_then(|l| l.strip_prefix("config_hash="))
        .unwrap_or_default();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(lines.next(), Some(r#"{"refresh":{"interval_secs":30}}"#));
    Ok(())
}

#[test]
fn unknown_subcommand_exits_one() -> anyhow::Result<()> {
    Command::cargo_bin("scm")?
        .arg("frobnicate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unrecognized subcommand"));
    Ok(())
}

#[test]
fn help_exits_zero() -> anyhow::Result<()> {
    Command::cargo_bin("scm")?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reconcile"));
    Ok(())
}
