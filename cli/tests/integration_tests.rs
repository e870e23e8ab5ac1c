use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Writes `contents` to `dir/name` and returns the path.
fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("failed to write fixture");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_raml-shapes"))
        .args(args)
        .output()
        .expect("failed to run raml-shapes")
}

const LIBRARY: &str = r#"#%RAML 1.0 Library
types:
  Email:
    type: string
    pattern: "^[^@]+@[^@]+$"
  User:
    properties:
      email: Email
      tags?:
        type: string[]
        uniqueItems: true
"#;

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_accepts_valid_library() {
    let dir = tempfile::tempdir().unwrap();
    let library = write(dir.path(), "users.raml", LIBRARY);

    let output = run(&["check", library.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Checked 2 type(s) in 1 input(s)."), "{stdout}");
}

#[test]
fn check_reports_diagnostic_chain() {
    let dir = tempfile::tempdir().unwrap();
    let library = write(
        dir.path(),
        "bad.raml",
        "types:\n  Small:\n    type: integer\n    maximum: 5\n  Big:\n    type: Small\n    maximum: 50\n",
    );

    let output = run(&["check", library.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[resolving]"), "{stderr}");
    assert!(stderr.contains("caused by"), "{stderr}");
    assert!(stderr.contains("maximum"), "{stderr}");
}

#[test]
fn check_json_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let library = write(dir.path(), "cycle.raml", "types:\n  A:\n    type: A\n");

    let output = run(&["check", "--json-diagnostics", library.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let diagnostic: serde_json::Value = serde_json::from_slice(&output.stderr)
        .expect("stderr should hold one JSON diagnostic");
    assert_eq!(diagnostic["severity"], "error");
    assert_eq!(diagnostic["category"], "resolving");
    assert!(diagnostic["cause"].is_object());
}

// ---------------------------------------------------------------------------
// convert
// ---------------------------------------------------------------------------

#[test]
fn convert_writes_schema_file() {
    let dir = tempfile::tempdir().unwrap();
    let library = write(dir.path(), "users.raml", LIBRARY);
    let config = write(dir.path(), "config.yml", "schema:\n  id_base: \"urn:users:\"\n");
    let output_path = dir.path().join("out").join("user.schema.json");

    let output = run(&[
        "convert",
        library.to_str().unwrap(),
        "--type",
        "User",
        "--config",
        config.to_str().unwrap(),
        "--output",
        output_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let schema: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output_path).unwrap()).unwrap();
    assert_eq!(schema["$schema"], "http://json-schema.org/draft-07/schema");
    assert_eq!(schema["$id"], "urn:users:User");
    assert_eq!(schema["properties"]["email"]["pattern"], "^[^@]+@[^@]+$");
    assert_eq!(schema["properties"]["tags"]["uniqueItems"], true);
    assert_eq!(schema["required"], serde_json::json!(["email"]));
}

#[test]
fn convert_unknown_type_fails() {
    let dir = tempfile::tempdir().unwrap();
    let library = write(dir.path(), "users.raml", LIBRARY);

    let output = run(&["convert", library.to_str().unwrap(), "--type", "Robot"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("type `Robot` is not declared"));
}

// ---------------------------------------------------------------------------
// validate-value
// ---------------------------------------------------------------------------

#[test]
fn validate_value_accepts_and_rejects() {
    let dir = tempfile::tempdir().unwrap();
    let library = write(dir.path(), "users.raml", LIBRARY);
    let good = write(dir.path(), "good.json", r#"{"email": "ada@example.com", "tags": ["a", "b"]}"#);
    let bad = write(dir.path(), "bad.yaml", "email: ada@example.com\ntags: [a, a]\n");

    let output = run(&[
        "validate-value",
        library.to_str().unwrap(),
        "--type",
        "User",
        "--value",
        good.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let output = run(&[
        "validate-value",
        library.to_str().unwrap(),
        "--type",
        "User",
        "--value",
        bad.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[validating]"), "{stderr}");
    assert!(stderr.contains("uniqueItems"), "{stderr}");
}
