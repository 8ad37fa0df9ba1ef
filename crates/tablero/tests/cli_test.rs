//! Integration tests for the `tablero` CLI binary.
//!
//! Argument parsing, help output, completions and error handling run
//! without a server; the rest talk to a wiremock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `tablero` binary with env isolation.
///
/// Clears all `TABLERO_*` env vars and points the config file at a
/// nonexistent path so tests never touch the user's real configuration.
fn tablero_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tablero");
    cmd.env("HOME", "/tmp/tablero-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/tablero-cli-test-nonexistent")
        .env("TABLERO_CONFIG", "/tmp/tablero-cli-test-nonexistent/config.toml")
        .env("NO_COLOR", "1")
        .env_remove("TABLERO_PROFILE")
        .env_remove("TABLERO_SERVER")
        .env_remove("TABLERO_TOKEN")
        .env_remove("TABLERO_OUTPUT")
        .env_remove("TABLERO_INSECURE")
        .env_remove("TABLERO_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Same isolation, with the config file at `config`.
fn tablero_with_config(config: &Path) -> assert_cmd::Command {
    let mut cmd = tablero_cmd();
    cmd.env("TABLERO_CONFIG", config);
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn api_root(server: &MockServer) -> String {
    format!("{}/api/v1/", server.uri())
}

fn table(id: i64, estado: &str) -> serde_json::Value {
    json!({
        "id_mesa": id,
        "numero_mesa": id,
        "id_tipo_mesa": 1,
        "estado": estado,
        "updated_at": 1,
    })
}

async fn mount_tables(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/mesas/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = tablero_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    tablero_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("tables")
            .and(predicate::str::contains("reservations"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    tablero_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tablero"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions() {
    for shell in ["bash", "zsh", "fish"] {
        tablero_cmd()
            .args(["completions", shell])
            .assert()
            .success()
            .stdout(predicate::str::is_empty().not());
    }
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = tablero_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_tables_list_without_server() {
    tablero_cmd()
        .args(["tables", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No server configured"));
}

#[test]
fn test_unknown_profile() {
    tablero_cmd()
        .args(["--profile", "nowhere", "tables", "list"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_invalid_table_status() {
    let output = tablero_cmd()
        .args(["tables", "set-status", "1", "broken"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("possible values") || text.contains("invalid value"),
        "Expected a list of valid statuses:\n{text}"
    );
}

#[test]
fn test_delete_needs_yes_when_not_interactive() {
    tablero_cmd()
        .args([
            "--server",
            "http://127.0.0.1:9/api/v1/",
            "reservations",
            "delete",
            "4",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("requires confirmation"));
}

#[test]
fn test_update_without_fields() {
    tablero_cmd()
        .args([
            "--server",
            "http://127.0.0.1:9/api/v1/",
            "reservations",
            "update",
            "4",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_subcommands_exist() {
    tablero_cmd()
        .args(["reservations", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("confirm"))
                .and(predicate::str::contains("cancel"))
                .and(predicate::str::contains("delete")),
        );
    tablero_cmd()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("show"))
                .and(predicate::str::contains("set-token")),
        );
}

// ── Config round trip ───────────────────────────────────────────────

#[test]
fn test_config_show_without_file() {
    tablero_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_config_set_use_and_show() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");

    tablero_with_config(&config)
        .args(["-p", "sala", "config", "set", "server", "http://localhost:8000/api/v1"])
        .assert()
        .success();
    tablero_with_config(&config)
        .args(["-p", "sala", "config", "set", "token", "s3cret"])
        .assert()
        .success();
    tablero_with_config(&config)
        .args(["config", "set", "stats-poll-secs", "later"])
        .assert()
        .code(2);
    tablero_with_config(&config)
        .args(["config", "use", "sala"])
        .assert()
        .success();
    tablero_with_config(&config)
        .args(["config", "use", "terraza"])
        .assert()
        .code(4);

    tablero_with_config(&config)
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sala *"));

    tablero_with_config(&config)
        .args(["-o", "json", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("http://localhost:8000/api/v1")
                .and(predicate::str::contains("s3cret").not()),
        );
}

// ── Against a server ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_tables_list_plain() {
    let server = MockServer::start().await;
    mount_tables(
        &server,
        json!([table(2, "ocupada"), table(1, "disponible"), table(3, "reservada")]),
    )
    .await;

    let mut cmd = tablero_cmd();
    cmd.args(["--server", &api_root(&server), "-o", "plain", "tables", "list"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "1\n2\n3\n");

    let mut cmd = tablero_cmd();
    cmd.args([
        "--server",
        &api_root(&server),
        "-o",
        "plain",
        "tables",
        "list",
        "--status",
        "ocupada",
    ]);
    let output = run(cmd).await;
    assert_eq!(String::from_utf8_lossy(&output.stdout), "2\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_profile_server_and_token_are_used() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/mesas/"))
        .and(header("authorization", "Bearer from-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([table(5, "disponible")])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "default_profile = \"local\"\n\n[profiles.local]\nserver = \"{}\"\ntoken = \"from-file\"\n",
            api_root(&server)
        ),
    )
    .unwrap();

    let mut cmd = tablero_with_config(&config);
    cmd.args(["-o", "json-compact", "tables", "list"]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(r#""status":"disponible""#), "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_set_table_status() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/mesas/3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(table(3, "ocupada")))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = tablero_cmd();
    cmd.args([
        "--server",
        &api_root(&server),
        "-o",
        "plain",
        "tables",
        "set-status",
        "3",
        "occupied",
    ]);
    let output = run(cmd).await;
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ocupada\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rejected_token_exits_with_auth_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/mesas/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "expired"})))
        .mount(&server)
        .await;

    let mut cmd = tablero_cmd();
    cmd.args(["--server", &api_root(&server), "--token", "old", "tables", "list"]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("set-token"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deleting_a_missing_reservation() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/admin/reservaciones/9"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "no existe"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = tablero_cmd();
    cmd.args([
        "--server",
        &api_root(&server),
        "--yes",
        "reservations",
        "delete",
        "9",
    ]);
    let output = run(cmd).await;
    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("reservations list"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unreachable_server() {
    let mut cmd = tablero_cmd();
    cmd.args([
        "--server",
        "http://127.0.0.1:9/api/v1/",
        "--timeout",
        "2",
        "tables",
        "list",
    ]);
    let output = run(cmd).await;
    let code = output.status.code();
    assert!(
        code == Some(7) || code == Some(8),
        "expected a connection or timeout exit code, got {code:?}:\n{}",
        combined_output(&output)
    );
}
