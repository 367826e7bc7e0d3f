//! End-to-end CLI tests using a fixture policy library and a fake OPA binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_policy(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
}

fn fixture_library(dir: &TempDir) -> std::path::PathBuf {
    let root = dir.path().join("policies");
    write_policy(
        &root,
        "international/eu_ai_act/v1/transparency/transparency.rego",
        "# RequiredMetrics:\n#   - model_card.completeness\n\
         # RequiredParams:\n#   - compliance_threshold (default 0.7)\n\
         package international.eu_ai_act.v1.transparency\n\ndefault allow := false\n",
    );
    write_policy(
        &root,
        "global/v1/accountability/accountability.rego",
        "package global.v1.accountability\n\ndefault allow := true\n",
    );
    root
}

#[cfg(unix)]
fn fake_opa(dir: &TempDir) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let script = dir.path().join("opa");
    fs::write(
        &script,
        "#!/bin/sh\ncat > /dev/null\n\
         echo '{\"result\":[{\"expressions\":[{\"value\":{\"policy\":\"transparency\",\
         \"overall_result\":true,\"metrics\":{}}}]}]}'\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn fixture_contract(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("contract.json");
    fs::write(
        &path,
        r#"{
  "application_name": "ExampleApp",
  "model_info": {"model_name": "gpt-4o-mini"},
  "interactions": [
    {"input_text": "What is your refund policy?", "output_text": "Refunds are processed in 14 days."}
  ]
}"#,
    )
    .unwrap();
    path
}

#[test]
fn test_policies_list_prints_buckets() {
    let dir = TempDir::new().unwrap();
    let library = fixture_library(&dir);

    Command::cargo_bin("attest")
        .unwrap()
        .args(["--library", library.to_str().unwrap(), "policies", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("international/eu_ai_act"))
        .stdout(predicate::str::contains("global"));
}

#[test]
fn test_missing_library_exits_with_init_failure() {
    Command::cargo_bin("attest")
        .unwrap()
        .args(["--library", "/nonexistent/policies", "policies", "list"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_policies_requirements_shows_metrics_and_params() {
    let dir = TempDir::new().unwrap();
    let library = fixture_library(&dir);

    Command::cargo_bin("attest")
        .unwrap()
        .args([
            "--library",
            library.to_str().unwrap(),
            "policies",
            "requirements",
            "--category",
            "eu_ai_act",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("model_card.completeness"))
        .stdout(predicate::str::contains("compliance_threshold (default 0.7)"));
}

#[cfg(unix)]
#[test]
fn test_evaluate_writes_reports() {
    let dir = TempDir::new().unwrap();
    let library = fixture_library(&dir);
    let opa = fake_opa(&dir);
    let contract = fixture_contract(&dir);
    let output_dir = dir.path().join("reports");

    Command::cargo_bin("attest")
        .unwrap()
        .env("OPA_PATH", &opa)
        .env_remove("OPA_SERVER_URL")
        .args([
            "--library",
            library.to_str().unwrap(),
            "evaluate",
            "--contract",
            contract.to_str().unwrap(),
            "--category",
            "eu_ai_act",
            "--format",
            "json,markdown",
            "--output-dir",
            output_dir.to_str().unwrap(),
        ])
        .assert()
        .success();

    let written: Vec<_> = fs::read_dir(&output_dir).unwrap().collect();
    assert_eq!(written.len(), 2);
}

#[cfg(unix)]
#[test]
fn test_evaluate_without_opa_exits_with_init_failure() {
    // A system-wide OPA install would defeat the missing-binary setup
    if Path::new("/usr/local/bin/opa").exists() || Path::new("/usr/bin/opa").exists() {
        return;
    }

    let dir = TempDir::new().unwrap();
    let library = fixture_library(&dir);
    let contract = fixture_contract(&dir);

    Command::cargo_bin("attest")
        .unwrap()
        .env("OPA_PATH", "/nonexistent/opa")
        .env("PATH", dir.path())
        .env_remove("OPA_SERVER_URL")
        .args([
            "--library",
            library.to_str().unwrap(),
            "evaluate",
            "--contract",
            contract.to_str().unwrap(),
            "--category",
            "eu_ai_act",
        ])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_evaluate_requires_a_selector() {
    let dir = TempDir::new().unwrap();
    let library = fixture_library(&dir);
    let contract = fixture_contract(&dir);

    Command::cargo_bin("attest")
        .unwrap()
        .args([
            "--library",
            library.to_str().unwrap(),
            "evaluate",
            "--contract",
            contract.to_str().unwrap(),
        ])
        .assert()
        .failure();
}
