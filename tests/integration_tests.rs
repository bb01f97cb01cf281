//! Integration tests for the forest CLI
//!
//! These run the binary without a backend: argument handling, configuration,
//! and transport failures.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a forest Command isolated from the caller's environment
fn forest() -> Command {
    let mut cmd = cargo_bin_cmd!("forest");
    cmd.env_remove("FOREST_HOST")
        .env_remove("FOREST_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_forest_help() {
        forest()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("toggle"))
            .stdout(predicate::str::contains("console"));
    }

    #[test]
    fn test_forest_version() {
        forest().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        forest().arg("prune").assert().failure();
    }

    #[test]
    fn test_create_requires_address() {
        forest()
            .args(["create", "blog", "species-1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("address"));
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();
        forest()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No forest.toml found"))
            .stdout(predicate::str::contains("ws://127.0.0.1:1234/websocket"));
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = create_temp_project();
        forest()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created forest.toml"));

        let content = fs::read_to_string(dir.path().join(".forest/forest.toml")).unwrap();
        assert!(content.contains("reconnect_delay_secs = 3"));
        assert!(content.contains("host = \"127.0.0.1:1234\""));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".forest")).unwrap();
        fs::write(dir.path().join(".forest/forest.toml"), "[server]\nhost = \"keep:1\"\n").unwrap();

        forest()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        let content = fs::read_to_string(dir.path().join(".forest/forest.toml")).unwrap();
        assert!(content.contains("keep:1"));
    }

    #[test]
    fn test_host_flag_overrides_file_and_env() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".forest")).unwrap();
        fs::write(dir.path().join(".forest/forest.toml"), "[server]\nhost = \"file:1\"\n").unwrap();

        forest()
            .current_dir(dir.path())
            .env("FOREST_HOST", "env:2")
            .args(["--host", "https://cli.example.com", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("wss://cli.example.com/websocket"));

        forest()
            .current_dir(dir.path())
            .env("FOREST_HOST", "env:2")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("http://env:2"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".forest")).unwrap();
        fs::write(
            dir.path().join(".forest/forest.toml"),
            "[timeouts]\nreconnect_delay_secs = 120\n",
        )
        .unwrap();

        forest()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("reconnect_delay_secs"));
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let dir = create_temp_project();
        forest()
            .current_dir(dir.path())
            .args(["--config", "nope.toml", "leaves"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Config file not found"));
    }
}

// =============================================================================
// Transport failures
// =============================================================================

mod transport {
    use super::*;

    #[test]
    fn test_reserved_argument_is_rejected_before_sending() {
        let dir = create_temp_project();
        forest()
            .current_dir(dir.path())
            .args(["--host", "127.0.0.1:9", "call", "get_leaves", "function=x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid arguments"));
    }

    #[test]
    fn test_unreachable_backend_fails() {
        let dir = create_temp_project();
        forest()
            .current_dir(dir.path())
            .args(["--host", "127.0.0.1:9", "leaves"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to load leaves"));
    }
}
