//! Smoke tests for the `queue-worker` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn queue_worker() -> Command {
    let mut command = Command::cargo_bin("queue-worker").unwrap();
    command
        .env_remove("RUST_LOG")
        .env_remove("QW_CONFIG_FILE");
    command
}

#[test]
fn test_help_lists_commands() {
    queue_worker()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("consume"))
        .stdout(predicate::str::contains("send-task"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_config_shows_defaults() {
    queue_worker()
        .args(["config", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"in_memory\""))
        .stdout(predicate::str::contains("\"max_concurrent_tasks\": 5"));
}

#[test]
fn test_config_reads_environment_overrides() {
    queue_worker()
        .args(["config", "--format", "yaml"])
        .env("QW__CONSUMER__QUEUE", "from-env")
        .env("QW__CONSUMER__MAX_RETRIES", "4")
        .assert()
        .success()
        .stdout(predicate::str::contains("queue: from-env"))
        .stdout(predicate::str::contains("max_retries: 4"));
}

#[test]
fn test_config_file_and_secret_redaction() {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "provider:\n  type: aws_sqs\n  access_key_id: AKIDEXAMPLE\n  secret_access_key: topsecret\nconsumer:\n  queue: jobs"
    )
    .unwrap();

    queue_worker()
        .arg("--config")
        .arg(file.path())
        .args(["config", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queue = \"jobs\""))
        .stdout(predicate::str::contains("topsecret").not());
}

#[test]
fn test_config_file_variable_is_the_only_environment_source() {
    let mut from_env = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(from_env, "consumer:\n  queue: from-env-file\n  max_retries: 6").unwrap();
    let mut explicit = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(explicit, "consumer:\n  queue: explicit").unwrap();

    queue_worker()
        .env("QW_CONFIG_FILE", from_env.path())
        .env("QUEUE_WORKER_CONFIG", "/nonexistent/worker.yaml")
        .arg("--config")
        .arg(explicit.path())
        .args(["config", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queue: explicit"))
        .stdout(predicate::str::contains("max_retries: 6"));
}

#[test]
fn test_missing_config_file_exits_with_configuration_code() {
    queue_worker()
        .args(["--config", "/nonexistent/worker.yaml", "config"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_consume_runs_until_iteration_limit() {
    queue_worker()
        .args(["consume", "--queue", "smoke", "--max-iterations", "1"])
        .env("QW__CONSUMER__WAIT_TIME_SECONDS", "0")
        .assert()
        .success()
        .stdout(predicate::str::contains("polls=1"));
}

#[test]
fn test_send_rejects_invalid_body() {
    queue_worker()
        .args(["send", "--queue", "jobs", "--body", "{oops"])
        .assert()
        .code(2);
}

#[test]
fn test_completions() {
    queue_worker()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("queue-worker"));
}
