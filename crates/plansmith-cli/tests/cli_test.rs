//! Integration tests for the `plansmith` binary.
//!
//! Each test runs the binary with a scrubbed environment and an isolated
//! config home so that nothing on the host machine leaks in.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const PLANSMITH_VARS: [&str; 8] = [
    "PLANSMITH_TENANT_ID",
    "PLANSMITH_CLIENT_ID",
    "PLANSMITH_CLIENT_SECRET",
    "PLANSMITH_PLAN_ID",
    "PLANSMITH_GRAPH_URL",
    "PLANSMITH_OPENAI_ENDPOINT",
    "PLANSMITH_OPENAI_API_KEY",
    "PLANSMITH_OPENAI_DEPLOYMENT",
];

fn plansmith(home: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_plansmith"));
    for var in PLANSMITH_VARS {
        cmd.env_remove(var);
    }
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("RUST_LOG", "off")
        .args(args)
        .output()
        .expect("failed to run plansmith binary")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// -----------------------------------------------------------------------
// Help and argument parsing
// -----------------------------------------------------------------------

#[test]
fn help_lists_commands() {
    let home = TempDir::new().unwrap();
    let output = plansmith(home.path(), &["--help"]);
    assert!(output.status.success());

    let text = stdout(&output);
    for command in ["init", "generate", "materialize", "status", "complete", "plans", "sites"] {
        assert!(text.contains(command), "help is missing {command}:\n{text}");
    }
}

#[test]
fn percent_over_100_is_rejected() {
    let home = TempDir::new().unwrap();
    let output = plansmith(home.path(), &["complete", "task-1", "--percent", "101"]);
    assert!(!output.status.success());
}

// -----------------------------------------------------------------------
// Credential resolution
// -----------------------------------------------------------------------

#[test]
fn missing_credentials_point_at_init() {
    let home = TempDir::new().unwrap();
    let output = plansmith(home.path(), &["plans"]);
    assert!(!output.status.success());

    let err = stderr(&output);
    assert!(err.contains("PLANSMITH_TENANT_ID"), "stderr: {err}");
    assert!(err.contains("plansmith init"), "stderr: {err}");
}

#[test]
fn materialize_without_plan_id_fails_before_any_request() {
    let home = TempDir::new().unwrap();
    let output = plansmith(home.path(), &["materialize", "--file", "plan.json"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("PLANSMITH_PLAN_ID"));
}

// -----------------------------------------------------------------------
// init
// -----------------------------------------------------------------------

#[test]
fn init_writes_config_and_refuses_to_overwrite() {
    let home = TempDir::new().unwrap();
    let args = [
        "init",
        "--tenant-id",
        "tenant",
        "--client-id",
        "client",
        "--client-secret",
        "s3cret",
        "--plan-id",
        "plan-1",
    ];

    let output = plansmith(home.path(), &args);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!stdout(&output).contains("s3cret"));

    let path = home.path().join(".config/plansmith/config.toml");
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("tenant_id = \"tenant\""));
    assert!(written.contains("plan_id = \"plan-1\""));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let again = plansmith(home.path(), &args);
    assert!(!again.status.success());
    assert!(stderr(&again).contains("--force"));

    let mut forced = args.to_vec();
    forced.push("--force");
    assert!(plansmith(home.path(), &forced).status.success());
}
