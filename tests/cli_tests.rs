mod common;

use common::*;
use std::process::Command;

fn cli_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_api-test-runner"))
}

#[test]
fn test_cli_help() {
    let output = cli_command().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run declarative API test collections"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("list"));
    assert!(stdout.contains("validate"));
}

#[test]
fn test_cli_version() {
    let output = cli_command().arg("--version").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("api-test-runner"));
}

#[test]
fn test_cli_run_help() {
    let output = cli_command().args(["run", "--help"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run a collection"));
    assert!(stdout.contains("--collection"));
    assert!(stdout.contains("--mode"));
    assert!(stdout.contains("--env"));
    assert!(stdout.contains("--iterations"));
    assert!(stdout.contains("--bail"));
    assert!(stdout.contains("--delay-ms"));
    assert!(stdout.contains("--timeout-ms"));
    assert!(stdout.contains("--report-dir"));
    assert!(stdout.contains("--env-var"));
    assert!(stdout.contains("smoke"));
    assert!(stdout.contains("performance"));
}

#[test]
fn test_cli_list() {
    let dir = create_test_dir();
    let path = write_file(dir.path(), "collection.yaml", smoke_collection());

    let output = cli_command()
        .args(["list", "--collection"])
        .arg(&path)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Collection: mixed"));
    assert!(stdout.contains("Profile & User Info (1 requests)"));
    assert!(stdout.contains("4 folders, 4 requests"));
}

#[test]
fn test_cli_list_missing_collection() {
    let dir = create_test_dir();

    let output = cli_command()
        .args(["list", "--collection"])
        .arg(dir.path().join("nope.yaml"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_validate() {
    let dir = create_test_dir();
    let collection = write_file(dir.path(), "collection.yaml", smoke_collection());
    let env = write_file(dir.path(), "dev.yaml", "base_url: http://localhost:8080");

    let output = cli_command()
        .arg("validate")
        .arg(&collection)
        .arg(&env)
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("is a valid collection"));
    assert!(stdout.contains("is a valid environment"));
}

#[test]
fn test_cli_validate_invalid_collection() {
    let dir = create_test_dir();
    let path = write_file(
        dir.path(),
        "bad.yaml",
        r#"
name: bad
folders:
  - name: Users
    requests:
      - name: List
        url: ""
"#,
    );

    let output = cli_command().arg("validate").arg(&path).output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✗"));
}

#[test]
fn test_cli_run_unknown_folder_filter() {
    let dir = create_test_dir();
    let collection = write_file(dir.path(), "collection.yaml", &numbered_collection(1));

    // No "Authentication" folder, so smoke mode cannot select anything
    let output = cli_command()
        .args(["run", "--mode", "smoke", "--collection"])
        .arg(&collection)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_run_writes_reports() {
    let dir = create_test_dir();
    let collection = write_file(
        dir.path(),
        "collection.yaml",
        r#"
name: offline
folders:
  - name: Main
    requests:
      - name: Unreachable
        url: "{{base_url}}/health"
        auth: none
        assertions:
          - status: 200
"#,
    );
    let reports = dir.path().join("reports");

    let output = cli_command()
        .args(["run", "--delay-ms", "0", "--timeout-ms", "2000"])
        .args(["--env-var", "base_url=http://127.0.0.1:9"])
        .arg("--collection")
        .arg(&collection)
        .arg("--report-dir")
        .arg(&reports)
        .output()
        .unwrap();

    // Transport failure makes the run fail, but it still completes
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("State: failed"));

    let written: Vec<String> = std::fs::read_dir(&reports)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(written.len(), 2);
    assert!(written.iter().any(|f| f.ends_with(".json")));
    assert!(written.iter().any(|f| f.ends_with(".xml")));
}

#[test]
fn test_cli_run_bail_aborts_with_exit_one() {
    let dir = create_test_dir();
    let collection = write_file(
        dir.path(),
        "collection.yaml",
        r#"
name: offline
folders:
  - name: Main
    requests:
      - name: First
        url: "{{base_url}}/first"
        auth: none
      - name: Second
        url: "{{base_url}}/second"
        auth: none
"#,
    );

    let output = cli_command()
        .args(["run", "--bail", "--delay-ms", "0", "--timeout-ms", "2000"])
        .args(["--env-var", "base_url=http://127.0.0.1:9"])
        .arg("--collection")
        .arg(&collection)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("State: aborted"));
    assert!(stdout.contains("Aborted: bail after Main / First (iteration 1)"));
    assert!(stdout.contains("Requests: 1 run, 1 failed"));
}

#[test]
fn test_cli_validate_rejects_misspelled_key() {
    let dir = create_test_dir();
    let path = write_file(
        dir.path(),
        "typo.yaml",
        r#"
name: typo
folders:
  - name: Users
    requests:
      - name: List
        url: "{{base_url}}/users"
        asserts:
          - status: 200
"#,
    );

    let output = cli_command().arg("validate").arg(&path).output().unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✗"));
}
