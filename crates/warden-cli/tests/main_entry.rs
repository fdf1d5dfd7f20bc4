//! Integration tests for the `warden` binary entry point.
//!
//! Covers help output, argument resolution, configuration failures and, on
//! Unix, full launches of a shell-scripted server.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use std::fs;
use tempfile::TempDir;

#[test]
fn help_lists_commands() {
    let mut command = cargo_bin_cmd!("warden");
    command.arg("--help");
    command
        .assert()
        .success()
        .stdout(contains("launch"))
        .stdout(contains("resolve"));
}

#[test]
fn resolve_prints_file_tokens_before_cli_tokens() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("codechecker.yaml");
    fs::write(&config, "server:\n  - --skip-db-cleanup\n").expect("write config");

    let mut command = cargo_bin_cmd!("warden");
    command
        .args(["resolve", "--recognise", "--skip-db-cleanup", "--"])
        .arg("--config")
        .arg(&config)
        .arg("--verbose");
    command
        .assert()
        .success()
        .stdout(contains("arguments: --skip-db-cleanup --verbose"))
        .stdout(contains("expected: accepted"));
}

#[test]
fn resolve_reports_unreadable_configuration() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("codechecker.json");
    fs::write(&config, "{not json").expect("write config");

    let mut command = cargo_bin_cmd!("warden");
    command
        .args(["resolve", "--format", "json", "--"])
        .arg("--config")
        .arg(&config);
    command
        .assert()
        .failure()
        .stderr(contains("failed to resolve server configuration"));
}

#[test]
fn invalid_harness_flags_fail_before_the_command_runs() {
    let mut command = cargo_bin_cmd!("warden");
    command.args(["--log-format", "pretty", "resolve"]);
    command
        .assert()
        .failure()
        .stderr(contains("failed to load configuration"));
}

#[test]
fn invalid_log_filters_fail_before_the_command_runs() {
    let mut command = cargo_bin_cmd!("warden");
    command.args(["--log-filter", "warden=notalevel", "resolve"]);
    command
        .assert()
        .failure()
        .stderr(contains("invalid log filter"));
}

#[cfg(unix)]
mod launches {
    use super::*;

    const SERVER_SCRIPT: &str = r#"for arg in "$@"; do
  case "$arg" in
    --dummy-option)
      echo "Usage: stub server [--skip-db-cleanup] [--verbose]" >&2
      exit 2
      ;;
    --crash)
      exit 3
      ;;
  esac
done
echo "Server waiting for client requests on 127.0.0.1"
exec sleep 30
"#;

    /// Workspace holding a `server` script run as `sh server ...`.
    fn workspace(config: &str) -> TempDir {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("server"), SERVER_SCRIPT).expect("write server script");
        fs::write(dir.path().join("codechecker.json"), config).expect("write config");
        dir
    }

    fn launch(dir: &TempDir) -> assert_cmd::Command {
        let mut command = cargo_bin_cmd!("warden");
        command
            .args(["--stop-grace-ms", "2000", "launch", "--server", "sh"])
            .arg("--workspace")
            .arg(dir.path())
            .args(["--recognise", "--skip-db-cleanup", "--recognise", "--verbose"])
            .args(["--recognise", "--crash"])
            .args(["--", "--config"])
            .arg(dir.path().join("codechecker.json"));
        command
    }

    #[test]
    fn recognised_configuration_starts_the_server() {
        let dir = workspace(r#"{"server": ["--skip-db-cleanup"]}"#);
        launch(&dir)
            .assert()
            .success()
            .stdout(contains("readiness: ready"))
            .stdout(contains("expected: accepted"))
            .stdout(contains("outcome: accepted"));

        let captured =
            fs::read_to_string(dir.path().join("server_output.log")).expect("capture file");
        assert!(captured.contains("Server waiting for client requests"));
    }

    #[test]
    fn unrecognised_configuration_reports_the_usage_banner() {
        let dir = workspace(r#"{"server": ["--dummy-option"]}"#);
        launch(&dir)
            .assert()
            .failure()
            .stdout(contains("readiness: usage banner"))
            .stdout(contains("expected: rejected at runtime"))
            .stdout(contains("outcome: rejected at runtime"))
            .stderr(contains("Usage: stub server"));
    }

    #[test]
    fn silent_non_zero_exit_fails_the_launch() {
        let dir = workspace(r#"{"server": ["--crash"]}"#);
        launch(&dir)
            .assert()
            .failure()
            .stdout(contains("readiness: output closed"))
            .stdout(contains("exit code: 3"))
            .stdout(contains("outcome: accepted"));
    }
}
