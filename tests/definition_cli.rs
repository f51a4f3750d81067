//! The validate_definition binary on definition files written to disk.

use std::io::Write;
use std::process::Command;

fn run(definition: &str) -> (i32, String) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(definition.as_bytes()).unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_validate_definition"))
        .arg(file.path())
        .arg("checkout_flow")
        .env("LOG_LEVEL", "error")
        .output()
        .unwrap();
    (out.status.code().unwrap_or(-1), String::from_utf8_lossy(&out.stdout).into_owned())
}

const VALID: &str = r#"{
  "testType": "USER",
  "salt": "&checkout_flow",
  "description": "Checkout redesign",
  "constants": {"MAX_ITEMS": 3},
  "buckets": [
    {"value": -1, "name": "inactive", "description": ""},
    {"value": 0, "name": "control", "description": "current page"},
    {"value": 1, "name": "test", "description": "new page"}
  ],
  "allocations": [
    {"ranges": [{"bucketValue": 0, "length": 0.5}, {"bucketValue": 1, "length": 0.5}]}
  ],
  "version": "r1234"
}"#;

#[test]
fn valid_definition_is_echoed() {
    let (code, stdout) = run(VALID);
    assert_eq!(code, 0, "{}", stdout);
    assert!(stdout.contains("allocation 0: control - 50% | test - 50%"));
    assert!(!stdout.contains("warning:"));
    let json_start = stdout.find('{').unwrap();
    let def: serde_json::Value = serde_json::from_str(&stdout[json_start..]).unwrap();
    assert_eq!(def["version"], "r1234");
    assert_eq!(def["constants"]["MAX_ITEMS"], 3);
    assert_eq!(def["allocations"][0]["ranges"][1]["length"], 0.5);
}

#[test]
fn bad_sum_is_reported() {
    let broken = VALID.replace(r#""bucketValue": 1, "length": 0.5"#, r#""bucketValue": 1, "length": 0.4"#);
    let (code, stdout) = run(&broken);
    assert_eq!(code, 1);
    assert!(stdout.contains("error: allocations[0]: Allocation sum must be exactly 1.0"), "{}", stdout);
}

#[test]
fn unreadable_file_is_a_usage_error() {
    let out = Command::new(env!("CARGO_BIN_EXE_validate_definition"))
        .arg("/nonexistent/definition.json")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
}
