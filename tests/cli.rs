use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const PING: &str = r#"{"type":"message","envelope":{"source":"+1555","isReceipt":false,"dataMessage":{"message":"!ping","groupInfo":null}}}"#;

/// The binary, run inside `dir` with no ambient config.
fn signal_bang(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("signal-bang").unwrap();
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env("HOME", dir)
        .env_remove("SIGNAL_BANG_CONFIG")
        .env_remove("SIGNAL_BANG_LOG")
        .env_remove("OTEL_EXPORTER_OTLP_ENDPOINT");
    cmd
}

#[test]
fn parse_prints_command_json() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .args(["parse", "  !Roll  2d6 "])
        .assert()
        .success()
        .stdout("{\"verb\":\"roll\",\"argument\":\"2d6\"}\n");
}

#[test]
fn parse_plain_text_is_not_a_command() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .args(["parse", "hello !ping"])
        .assert()
        .success()
        .stdout("not a command\n");
}

#[test]
fn schema_describes_config() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"signal\""))
        .stdout(predicate::str::contains("attachment_placeholder"));
}

#[test]
fn init_writes_commented_config() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .args(["init", "--account", "+12025550123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated .signal-bang.toml"));

    let written = std::fs::read_to_string(dir.path().join(".signal-bang.toml")).unwrap();
    assert!(written.starts_with("# signal-bang configuration"));
    assert!(written.contains("account = \"+12025550123\""));
    assert!(written.contains("kind = \"builtin\""));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path()).arg("init").assert().success();
    signal_bang(dir.path())
        .arg("init")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--force"));
    signal_bang(dir.path())
        .args(["init", "--force", "--exec", "sue"])
        .assert()
        .success();

    let written = std::fs::read_to_string(dir.path().join(".signal-bang.toml")).unwrap();
    assert!(written.contains("program = \"sue\""));
}

#[test]
fn init_user_writes_to_config_dir() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .args(["init", "--user"])
        .assert()
        .success();
    assert!(dir.path().join("xdg/signal-bang/config.toml").exists());
}

#[test]
fn init_rejects_bad_account() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .args(["init", "--account", "555-1234"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("E.164"));
    assert!(!dir.path().join(".signal-bang.toml").exists());
}

#[test]
fn replay_answers_ping_with_crlf_reply() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .args(["replay", "--builtin"])
        .write_stdin(format!("{PING}\n"))
        .assert()
        .success()
        .stdout("{\"type\":\"send\",\"messageBody\":\"pong\",\"id\":\"1\",\"recipientNumber\":\"+1555\"}\r\n");
}

#[test]
fn replay_file_survives_bad_lines() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    let group = r#"{"type":"message","envelope":{"source":"+1555","isReceipt":false,"dataMessage":{"message":"!echo hi there","groupInfo":{"groupId":"room1chatXYZ"}}}}"#;
    std::fs::write(&events, format!("garbage\n{{\"type\":\"receipt\"}}\n{group}\n")).unwrap();

    signal_bang(dir.path())
        .args(["replay", "--summary"])
        .arg(&events)
        .assert()
        .success()
        .stdout("{\"type\":\"send\",\"messageBody\":\"hi there\",\"id\":\"1\",\"recipientGroupId\":\"XYZ\"}\r\n")
        .stderr(predicate::str::contains(
            "{\"lines\":3,\"replies\":1,\"no_reply\":0,\"ignored\":1,\"dropped\":1}",
        ));
}

#[test]
fn replay_uses_configured_processor() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".signal-bang.toml"),
        "[dispatch]\nattachment_placeholder = \"none\"\n\n[processor]\nkind = \"exec\"\nprogram = \"echo\"\nargs = [\"{{ verb }}/{{ attachment }}\"]\n",
    )
    .unwrap();
    signal_bang(dir.path())
        .arg("replay")
        .write_stdin(format!("{PING}\n"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"messageBody\":\"ping/none\""));
}

#[test]
fn replay_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .args(["replay", "nope.jsonl"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nope.jsonl"));
}

#[test]
fn run_without_account_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no account configured"));
}

#[test]
fn run_with_missing_signal_cli_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .args(["run", "--account", "+12025550123", "--binary", "no-such-signal-cli-xyz"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no-such-signal-cli-xyz"));
}

#[test]
fn invalid_config_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[processor]\nkind = \"telepathy\"\n").unwrap();
    signal_bang(dir.path())
        .args(["run", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config error"));
}

#[test]
fn json_log_format_writes_json_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    signal_bang(dir.path())
        .args(["--log-format", "json", "replay", "--builtin"])
        .env("SIGNAL_BANG_LOG", "info")
        .write_stdin(format!("{PING}\n"))
        .assert()
        .success()
        .stderr(predicate::str::contains("\"message\":\"replay finished\""));
}
