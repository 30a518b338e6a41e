//! End-to-end tests for the `yao-workshop` CLI.
//!
//! These tests invoke the actual binary and validate behavior from a
//! user's perspective. `YAO_PATH` points at a scratch directory so the
//! user's real workshop configuration is never read. No test requires
//! network access.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn cmd(temp: &assert_fs::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("yao-workshop").unwrap();
    cmd.env("YAO_PATH", temp.path().join("yao"));
    cmd.current_dir(temp.path());
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let temp = assert_fs::TempDir::new().unwrap();
    cmd(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("remove"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("ls"))
        .stdout(predicate::str::contains("compile"));
}

#[test]
fn test_ls_empty_workshop() {
    let temp = assert_fs::TempDir::new().unwrap();
    cmd(&temp)
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("no packages required"));
}

#[test]
fn test_ls_shows_replaced_packages() {
    let temp = assert_fs::TempDir::new().unwrap();
    let widgets = temp.child("widgets");
    widgets.create_dir_all().unwrap();
    widgets.child("app.yao").write_str("{}").unwrap();
    temp.child("workshop.yao")
        .write_str(
            r#"{"require": [{"widgets": "github.com/yaoapp/widgets@1.0.0"}],
                "replace": {"github.com/yaoapp/widgets": "./widgets"}}"#,
        )
        .unwrap();

    cmd(&temp)
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("widgets"))
        .stdout(predicate::str::contains("github.com/yaoapp/widgets@1.0.0"))
        .stdout(predicate::str::contains("replaced"));
}

#[test]
fn test_compile_prints_compiled_tree() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("base.mod.yao")
        .write_str(r#"{"table": "users", "columns": [{"name": "id"}]}"#)
        .unwrap();
    temp.child("user.mod.yao")
        .write_str(
            r#"{
                "FROM": "base",
                "RUN": {"REPLACE": [{"table": "$new.table"}]},
                "table": "users_v2"
            }"#,
        )
        .unwrap();

    cmd(&temp)
        .arg("compile")
        .arg("user.mod.yao")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"table\": \"users_v2\""))
        .stdout(predicate::str::contains("\"name\": \"id\""))
        .stdout(predicate::str::contains("FROM").not());
}

#[test]
fn test_compile_trace_flag_lists_visited_files() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("base.mod.yao").write_str("{}").unwrap();
    temp.child("user.mod.yao")
        .write_str(r#"{"FROM": "base"}"#)
        .unwrap();

    cmd(&temp)
        .arg("compile")
        .arg("user.mod.yao")
        .arg("--trace")
        .assert()
        .success()
        .stderr(predicate::str::contains("user.mod.yao"))
        .stderr(predicate::str::contains("base.mod.yao"));
}

#[test]
fn test_compile_rejects_bad_filename() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("user.docx.yao").write_str("{}").unwrap();

    cmd(&temp)
        .arg("compile")
        .arg("user.docx.yao")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown DSL kind"));
}

#[test]
fn test_get_fails_fast_when_locked() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("workshop.yao.lock").write_str("").unwrap();

    cmd(&temp)
        .arg("get")
        .arg("github.com/yaoapp/demo@1.0.0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Workshop is locked"));
}

#[test]
fn test_get_requires_url_argument() {
    let temp = assert_fs::TempDir::new().unwrap();
    cmd(&temp)
        .arg("get")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}
