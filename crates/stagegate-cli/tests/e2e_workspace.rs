//! E2E CLI tests covering workspace plumbing:
//! - `sg init` layout and re-init guard
//! - `sg import` / `sg export` at root and nested paths
//! - error codes for uninitialized workspaces and broken config
//! - legacy ordinal backfill on first read

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::path::Path;
use tempfile::TempDir;

fn sg_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sg"));
    cmd.current_dir(dir);
    cmd.env("STAGEGATE_ACTOR", "mem_01");
    cmd.env("STAGEGATE_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd
}

fn write_json(dir: &Path, name: &str, value: &Value) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, value.to_string()).expect("write json");
    path
}

fn export(dir: &Path, path: &str) -> Value {
    let output = sg_cmd(dir)
        .args(["export", path, "--json"])
        .output()
        .expect("export should not crash");
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).expect("valid JSON")
}

#[test]
fn init_creates_config_and_store() {
    let dir = TempDir::new().expect("temp dir");
    sg_cmd(dir.path())
        .args(["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("initialized\tsqlite\txoxo"));

    assert!(dir.path().join(".stagegate/config.toml").is_file());
    assert!(dir.path().join(".stagegate/store.sqlite3").is_file());

    sg_cmd(dir.path())
        .args(["init"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--force"));
    sg_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn commands_outside_a_workspace_fail_with_not_initialized() {
    let dir = TempDir::new().expect("temp dir");
    sg_cmd(dir.path())
        .args(["show", "DH001", "p1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("E1001"))
        .stderr(predicate::str::contains("sg init"));
}

#[test]
fn dir_flag_targets_another_workspace() {
    let dir = TempDir::new().expect("temp dir");
    let elsewhere = TempDir::new().expect("temp dir");
    sg_cmd(elsewhere.path())
        .args(["init", "--dir"])
        .arg(dir.path())
        .assert()
        .success();
    assert!(dir.path().join(".stagegate/config.toml").is_file());
    assert!(!elsewhere.path().join(".stagegate").exists());
}

#[test]
fn broken_config_reports_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    sg_cmd(dir.path()).args(["init"]).assert().success();
    std::fs::write(dir.path().join(".stagegate/config.toml"), "[store\n").expect("write");

    sg_cmd(dir.path())
        .args(["export", "xoxo"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("E1002"));
}

#[test]
fn import_and_export_nested_paths() {
    let dir = TempDir::new().expect("temp dir");
    sg_cmd(dir.path()).args(["init"]).assert().success();

    let order = json!({"products": {"p1": {"workflows": {
        "wf_1": {"workflowName": ["Cắt"], "order": 0}
    }}}});
    let file = write_json(dir.path(), "order.json", &order);
    sg_cmd(dir.path())
        .args(["import", "xoxo/orders/DH001"])
        .arg(&file)
        .assert()
        .success();

    assert_eq!(export(dir.path(), "xoxo/orders/DH001"), order);
    assert_eq!(
        export(dir.path(), "xoxo/orders/DH001/products/p1/workflows/wf_1/workflowName"),
        json!(["Cắt"])
    );
    assert_eq!(export(dir.path(), "xoxo/orders/DH404"), Value::Null);
}

#[test]
fn root_import_keeps_unrelated_top_level_keys() {
    let dir = TempDir::new().expect("temp dir");
    sg_cmd(dir.path()).args(["init"]).assert().success();

    let first = write_json(dir.path(), "a.json", &json!({"xoxo": {"members": {"m": {"name": "A"}}}}));
    let second = write_json(dir.path(), "b.json", &json!({"other": {"k": {"v": {"x": 1}}}}));
    sg_cmd(dir.path()).args(["import", ""]).arg(&first).assert().success();
    sg_cmd(dir.path()).args(["import", ""]).arg(&second).assert().success();

    let tree = export(dir.path(), "");
    assert_eq!(tree["xoxo"]["members"]["m"]["name"], "A");
    assert_eq!(tree["other"]["k"]["v"]["x"], 1);

    let scalar = write_json(dir.path(), "c.json", &json!(42));
    sg_cmd(dir.path())
        .args(["import", ""])
        .arg(&scalar)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("must be a JSON object"));
}

#[test]
fn forbidden_path_characters_are_rejected() {
    let dir = TempDir::new().expect("temp dir");
    sg_cmd(dir.path()).args(["init"]).assert().success();
    sg_cmd(dir.path())
        .args(["export", "xoxo/orders/DH.001"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("E5003"));
}

#[test]
fn first_show_backfills_legacy_ordinals() {
    let dir = TempDir::new().expect("temp dir");
    sg_cmd(dir.path()).args(["init"]).assert().success();

    let order = json!({"products": {"p1": {"workflows": {
        "wf_a": {"workflowName": ["Cắt"]},
        "wf_b": {"workflowName": ["May"]}
    }}}});
    let file = write_json(dir.path(), "order.json", &order);
    sg_cmd(dir.path())
        .args(["import", "xoxo/orders/DH001"])
        .arg(&file)
        .assert()
        .success();

    sg_cmd(dir.path()).args(["show", "DH001", "p1"]).assert().success();

    let workflows = export(dir.path(), "xoxo/orders/DH001/products/p1/workflows");
    assert_eq!(workflows["wf_a"]["order"], 0);
    assert_eq!(workflows["wf_b"]["order"], 1);
}

#[test]
fn backfill_can_be_disabled_at_init() {
    let dir = TempDir::new().expect("temp dir");
    sg_cmd(dir.path())
        .args(["init", "--no-backfill"])
        .assert()
        .success();

    let order = json!({"products": {"p1": {"workflows": {
        "wf_a": {"workflowName": ["Cắt"]}
    }}}});
    let file = write_json(dir.path(), "order.json", &order);
    sg_cmd(dir.path())
        .args(["import", "xoxo/orders/DH001"])
        .arg(&file)
        .assert()
        .success();
    sg_cmd(dir.path()).args(["show", "DH001", "p1"]).assert().success();

    let workflow = export(dir.path(), "xoxo/orders/DH001/products/p1/workflows/wf_a");
    assert!(workflow.get("order").is_none());
}

#[test]
fn malformed_product_shows_empty_process() {
    let dir = TempDir::new().expect("temp dir");
    sg_cmd(dir.path()).args(["init"]).assert().success();

    let order = json!({"products": {"p1": {"workflows": {
        "wf_a": {"isDone": true}
    }}}});
    let file = write_json(dir.path(), "order.json", &order);
    sg_cmd(dir.path())
        .args(["import", "xoxo/orders/DH001"])
        .arg(&file)
        .assert()
        .success();

    let output = sg_cmd(dir.path())
        .args(["show", "DH001", "p1", "--json"])
        .output()
        .expect("show should not crash");
    assert!(output.status.success());
    let view: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(view["stages"], json!([]));
    assert_eq!(view["progress"]["percent"], 0);

    sg_cmd(dir.path())
        .args(["check", "DH001", "p1", "wf_a", "task_wf_a_0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("E2001"));
}
