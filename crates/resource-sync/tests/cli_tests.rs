//! CLI integration tests

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const SNAPSHOT: &str = r#"[
  {
    "Id": "999e628dab46",
    "Name": "/qwen25-7b",
    "Config": {"Image": "vllm/vllm-openai:v0.6.0", "Env": ["HF_HOME=/cache"]},
    "HostConfig": {
      "PortBindings": {"8000/tcp": [{"HostIp": "", "HostPort": "3901"}]},
      "Binds": ["/models:/models:ro"],
      "DeviceRequests": [{"Driver": "nvidia", "Count": 0, "DeviceIDs": ["1"]}],
      "Memory": 17179869184
    },
    "State": {"Status": "running", "StartedAt": "2025-12-03T00:58:23.118719925Z"}
  },
  {
    "Id": "c0ffee000001",
    "Name": "/custom-app",
    "Config": {"Image": "nginx:1.25"},
    "HostConfig": {"PortBindings": null, "DeviceRequests": null}
  }
]"#;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_resource-sync"))
        .args(args)
        .env("RUST_LOG", "warn")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

fn write_input(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().into_owned()
}

fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {stdout}"))
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("sync"), "Should show sync command");
    assert!(stdout.contains("normalize"), "Should show normalize command");
    assert!(stdout.contains("verify"), "Should show verify command");
}

/// Test sync subcommand help
#[test]
fn test_sync_help() {
    let output = run(&["sync", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Sync help should succeed");
    assert!(stdout.contains("--store"), "Should show store option");
    assert!(stdout.contains("--metrics-file"), "Should show metrics option");
}

#[test]
fn test_normalize_prints_records() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "snapshot.json", SNAPSHOT);

    let output = run(&["--format", "json", "--node-id", "node-1", "normalize", &input]);
    assert!(output.status.success());

    let records = stdout_json(&output);
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 2);

    assert_eq!(records[0]["name"], "qwen25-7b");
    assert_eq!(records[0]["resourceType"], "inference-container");
    assert_eq!(records[0]["nodeId"], "node-1");
    assert_eq!(records[0]["config"]["inferenceServer"], "vllm");
    assert_eq!(records[0]["config"]["containerPorts"][0]["hostPort"], 3901);
    assert_eq!(records[0]["config"]["volumeMounts"][0]["mode"], "ro");
    assert_eq!(records[0]["runtime"]["allocatedGPU"][0], "1");

    assert_eq!(records[1]["name"], "custom-app");
    assert_eq!(records[1]["resourceType"], "application-container");
    assert_eq!(records[1]["metadata"]["labels"]["aio-system"], "true");
    assert!(records[1]["config"].get("gpuDeviceIds").is_none());
}

#[test]
fn test_sync_memory_store_reports_summary() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "snapshot.json", SNAPSHOT);

    let output = run(&["--format", "json", "sync", &input, "--store", "memory"]);
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["total"], 2);
    assert_eq!(report["success"], 2);
    assert_eq!(report["errors"], 0);
    assert_eq!(report["inserted"], 2);
    assert_eq!(report["verification"]["totalResources"], 2);
    assert_eq!(report["verification"]["byLabel"]["aio-inference"], 1);
    assert_eq!(report["verification"]["byLabel"]["aio-system"], 1);
}

#[test]
fn test_sync_file_store_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "snapshot.json", SNAPSHOT);
    let store = dir.path().join("resources.json");
    let store = store.to_string_lossy().into_owned();

    let args = [
        "--format",
        "json",
        "sync",
        input.as_str(),
        "--store",
        "file",
        "--store-path",
        store.as_str(),
    ];

    let first = stdout_json(&run(&args));
    assert_eq!(first["inserted"], 2);

    let second = stdout_json(&run(&args));
    assert_eq!(second["inserted"], 0);
    assert_eq!(second["updated"], 2);
    assert_eq!(second["verification"]["totalResources"], 2);

    let documents: Value =
        serde_json::from_str(&std::fs::read_to_string(&store).unwrap()).unwrap();
    assert_eq!(documents.as_array().unwrap().len(), 2);
}

#[test]
fn test_malformed_record_does_not_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let input = write_input(
        dir.path(),
        "snapshot.json",
        r#"[
          {"Id": "a1", "Name": "/ok", "Config": {"Image": "redis:7"}},
          {"Id": "b2", "Name": "/bad", "HostConfig": {"PortBindings": {"web/tcp": [{"HostPort": "80"}]}}}
        ]"#,
    );

    let output = run(&["--format", "json", "sync", &input]);
    assert!(output.status.success(), "Per-record errors should not be fatal");

    let report = stdout_json(&output);
    assert_eq!(report["success"], 1);
    assert_eq!(report["errors"], 1);
    assert_eq!(report["failures"][0]["name"], "bad");
}

#[test]
fn test_missing_input_is_fatal() {
    let output = run(&["sync", "/nonexistent/snapshot.json"]);
    assert!(!output.status.success());
}

#[test]
fn test_non_array_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "snapshot.json", r#"{"Id": "a1"}"#);

    let output = run(&["sync", &input]);
    assert!(!output.status.success());
}

#[test]
fn test_metrics_file_is_written() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "snapshot.json", SNAPSHOT);
    let metrics = dir.path().join("metrics.prom");

    let output = run(&[
        "--format",
        "json",
        "sync",
        &input,
        "--metrics-file",
        &metrics.to_string_lossy(),
    ]);
    assert!(output.status.success());

    let text = std::fs::read_to_string(&metrics).unwrap();
    assert!(text.contains("resource_sync_records_total"));
}

#[test]
fn test_verify_on_empty_store() {
    let output = run(&["--format", "json", "verify", "--store", "memory"]);
    assert!(output.status.success());

    let summary = stdout_json(&output);
    assert_eq!(summary["totalResources"], 0);
}
