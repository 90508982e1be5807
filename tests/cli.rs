use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

#[allow(deprecated)]
fn dbmlerd() -> Command {
    Command::cargo_bin("dbmlerd").unwrap()
}

fn write_input(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("schema.dbml");
    fs::write(&path, contents).unwrap();
    path
}

const SHOP: &str = "TableGroup Sales {\n  Table orders {\n    id int [pk]\n    user_id int [ref: > users.id]\n  }\n}\n\nTable users {\n  id int [pk]\n}\n";

#[test]
fn help_exits_zero() {
    dbmlerd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--strict"));
}

#[test]
fn prints_database_json() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, SHOP);

    let output = dbmlerd().arg(&input).assert().success().get_output().stdout.clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["tables"][0]["name"], "orders");
    assert_eq!(value["tables"][0]["groupId"], "group_sales");
    assert_eq!(value["relationships"][0]["type"], ">");
    assert_eq!(value["tableGroups"][0]["tables"][0], "orders");
    assert!(value.get("diagnostics").is_none());
}

#[test]
fn writes_output_file() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, SHOP);
    let out = dir.path().join("out.json");

    dbmlerd()
        .arg(&input)
        .args(["--pretty", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = fs::read_to_string(&out).unwrap();
    assert!(written.contains("\n  \"tables\""));
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value["tables"].as_array().unwrap().len(), 2);
}

#[test]
fn diagnostics_are_reported() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "Table t {\n  id int\n  ???\n}\n");

    let assert = dbmlerd()
        .arg(&input)
        .arg("--diagnostics")
        .assert()
        .success()
        .stderr(predicate::str::contains("warning: line 3, column 3"));
    let value: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(value["tables"][0]["name"], "t");
    assert_eq!(value["diagnostics"][0]["location"]["line"], 3);
}

#[test]
fn strict_mode_fails_on_skipped_line() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "Table t {\n  id int\n  ???\n}\n");

    dbmlerd()
        .arg(&input)
        .arg("--strict")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Strict mode"));
}

#[test]
fn unterminated_block_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, "Table broken {\n  id int\n");

    dbmlerd()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unterminated Table block"));
}

#[test]
fn missing_input_fails() {
    let dir = TempDir::new().unwrap();
    dbmlerd()
        .arg(dir.path().join("absent.dbml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read"));
}
