//! CLI integration tests for the corps command-line interface.
//!
//! These tests cover argument parsing, configuration handling, and the
//! failure paths that run before any backend is contacted. None of them
//! need network access.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a corps command isolated from the caller's environment.
///
/// The working directory and config directory both point into `dir`, so no
/// user or project config leaks into the test.
fn corps(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("corps").unwrap();
    cmd.current_dir(dir.path())
        .env("CORPS_CONFIG_DIR", dir.path())
        .env_remove("CORPS_BACKEND_ANON_KEY");
    cmd
}

fn write_project_config(dir: &TempDir, contents: &str) {
    std::fs::write(dir.path().join("corps.toml"), contents).unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    corps(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("cadet corps portal"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    corps(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("corps"));
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    corps(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("logout"))
        .stdout(predicate::str::contains("whoami"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_login_requires_email() {
    let dir = TempDir::new().unwrap();
    corps(&dir)
        .arg("login")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<EMAIL>"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    let dir = TempDir::new().unwrap();
    corps(&dir).arg("enroll").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Global Flag Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_verbose_flag_accepted() {
    let dir = TempDir::new().unwrap();
    corps(&dir).args(["--verbose", "--help"]).assert().success();
}

#[test]
fn test_json_flag_accepted() {
    let dir = TempDir::new().unwrap();
    corps(&dir).args(["--json", "--help"]).assert().success();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Command Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_uses_config_dir() {
    let dir = TempDir::new().unwrap();
    corps(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains("not created yet"));
}

#[test]
fn test_config_init_then_path() {
    let dir = TempDir::new().unwrap();
    corps(&dir)
        .args(["config", "init", "--url", "https://project.example.co"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let written = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(written.contains("https://project.example.co"));

    corps(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not created yet").not());

    // A second init refuses to clobber the file
    corps(&dir)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_config_show_defaults() {
    let dir = TempDir::new().unwrap();
    corps(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No config files loaded"))
        .stdout(predicate::str::contains("bootstrap_timeout_secs = 15"))
        .stdout(predicate::str::contains("default_ttl_secs = 900"));
}

#[test]
fn test_config_show_masks_anon_key() {
    let dir = TempDir::new().unwrap();
    write_project_config(
        &dir,
        r#"
[backend]
url = "https://project.example.co"
anon_key = "eyJhbGciOiJIUzI1NiJ9.secret"
"#,
    );

    corps(&dir)
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://project.example.co"))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("eyJhbGciOiJIUzI1NiJ9").not());
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands Without a Backend
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_whoami_without_backend_url() {
    let dir = TempDir::new().unwrap();
    corps(&dir)
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing required field 'url'"));
}

#[test]
fn test_status_without_anon_key() {
    let dir = TempDir::new().unwrap();
    write_project_config(
        &dir,
        r#"
[backend]
url = "https://project.example.co"
"#,
    );

    corps(&dir)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CORPS_BACKEND_ANON_KEY"));
}

#[test]
fn test_login_rejects_empty_password() {
    let dir = TempDir::new().unwrap();
    corps(&dir)
        .args(["login", "cadet@example.com", "--password-stdin"])
        .write_stdin("\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Password must not be empty"));
}

#[test]
fn test_whoami_without_stored_session() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    write_project_config(
        &dir,
        &format!(
            r#"
[backend]
url = "http://127.0.0.1:9"

[auth]
data_dir = "{}"
"#,
            data_dir.display().to_string().replace('\\', "/")
        ),
    );

    // No stored session, so bootstrap settles without a network call
    corps(&dir)
        .env("CORPS_BACKEND_ANON_KEY", "anon")
        .arg("whoami")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in."));

    corps(&dir)
        .env("CORPS_BACKEND_ANON_KEY", "anon")
        .args(["--json", "whoami"])
        .assert()
        .success()
        .stdout(predicate::str::contains("null"));
}
