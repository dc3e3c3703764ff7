//! End-to-end CLI tests against real report directories on disk.
//!
//! No network access: the upload test only exercises the skipped path.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn tr_core() -> Command {
    let mut cmd = Command::cargo_bin("tr-core").expect("tr-core binary should exist");
    cmd.env_remove("TR_CONFIG")
        .env_remove("TR_ACCESS_TOKEN")
        .env_remove("TR_ENDPOINT")
        .env_remove("TR_OIDC_AUDIENCE")
        .env_remove("ACTIONS_ID_TOKEN_REQUEST_URL")
        .env_remove("ACTIONS_ID_TOKEN_REQUEST_TOKEN")
        .env("TR_LOG", "error");
    cmd
}

/// Two shards of the same file suite, each with its own copy of one
/// environment, plus an environment nobody references.
fn sharded_report() -> Value {
    let shard = |env: usize| {
        json!({
            "type": "file",
            "title": "login.spec.ts",
            "location": { "file": "login.spec.ts", "line": 0, "column": 0 },
            "tests": [{
                "title": "logs in",
                "location": { "file": "login.spec.ts", "line": 3, "column": 5 },
                "attempts": [{ "environmentIdx": env, "status": "passed", "startTimestamp": 10, "duration": 120 }]
            }]
        })
    };
    json!({
        "category": "playwright",
        "version": 1,
        "commitId": "c0ffee",
        "environments": [
            { "name": "chromium" },
            { "name": "unused" },
            { "name": "chromium" }
        ],
        "suites": [shard(0), shard(2)]
    })
}

fn write_report(dir: &Path, report: &Value) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("report.json"), serde_json::to_vec(report).unwrap()).unwrap();
}

fn read_report(dir: &Path) -> Value {
    serde_json::from_slice(&fs::read(dir.join("report.json")).unwrap()).unwrap()
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn version_json() {
    let output = tr_core().args(["version"]).output().unwrap();
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["schema_version"], 1);
    assert!(json["tr_core_version"].is_string());
}

#[test]
fn unknown_command_fails() {
    tr_core()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn normalize_merges_shards() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("in");
    let output_dir = tmp.path().join("out");
    write_report(&input, &sharded_report());

    let output = tr_core()
        .args(["normalize"])
        .arg(&input)
        .arg("--out")
        .arg(&output_dir)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let summary = stdout_json(&output);
    assert_eq!(summary["command"], "normalize");
    assert_eq!(summary["tests_in"], 2);
    assert_eq!(summary["tests_out"], 1);
    assert_eq!(summary["environments_out"], 1);

    let report = read_report(&output_dir);
    assert_eq!(report["environments"], json!([{ "name": "chromium" }]));
    let attempts = &report["suites"][0]["tests"][0]["attempts"];
    assert_eq!(attempts.as_array().unwrap().len(), 2);
    // Defaults are stripped: index 0 and status passed.
    assert!(attempts[0].get("environmentIdx").is_none());
    assert!(attempts[0].get("status").is_none());

    // Input untouched when --out is given.
    assert_eq!(read_report(&input), sharded_report());
}

#[test]
fn normalize_twice_is_stable() {
    let tmp = TempDir::new().unwrap();
    write_report(tmp.path(), &sharded_report());

    tr_core().arg("normalize").arg(tmp.path()).assert().success();
    let first = read_report(tmp.path());
    tr_core().arg("normalize").arg(tmp.path()).assert().success();
    assert_eq!(read_report(tmp.path()), first);
}

#[test]
fn normalize_rejects_dangling_environment() {
    let tmp = TempDir::new().unwrap();
    let mut report = sharded_report();
    report["suites"][0]["tests"][0]["attempts"][0]["environmentIdx"] = json!(7);
    write_report(tmp.path(), &report);

    tr_core()
        .arg("normalize")
        .arg(tmp.path())
        .assert()
        .code(11)
        .stdout(predicate::str::contains("environment index 7"));
}

#[test]
fn check_ok() {
    let tmp = TempDir::new().unwrap();
    write_report(tmp.path(), &sharded_report());

    let output = tr_core().arg("check").arg(tmp.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let json = stdout_json(&output);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["reference_issues"], json!([]));
}

#[test]
fn check_reports_dangling_reference_and_missing_attachment() {
    let tmp = TempDir::new().unwrap();
    let mut report = sharded_report();
    report["suites"][1]["tests"][0]["attempts"][0]["environmentIdx"] = json!(3);
    report["suites"][0]["tests"][0]["attempts"][0]["attachments"] = json!([{
        "name": "trace",
        "contentType": "application/zip",
        "id": "a9993e364706816aba3e25717850c26c9cd0d89d"
    }]);
    write_report(tmp.path(), &report);

    let output = tr_core().arg("check").arg(tmp.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(11));
    let json = stdout_json(&output);
    assert_eq!(json["status"], "error");
    assert_eq!(json["reference_issues"][0]["index"], 3);
    assert_eq!(json["reference_issues"][0]["len"], 3);
    assert_eq!(
        json["missing_attachments"],
        json!(["a9993e364706816aba3e25717850c26c9cd0d89d"])
    );
}

#[test]
fn check_detects_tampered_attachment() {
    let tmp = TempDir::new().unwrap();
    let id = "a9993e364706816aba3e25717850c26c9cd0d89d"; // sha1("abc")
    let mut report = sharded_report();
    report["suites"][0]["tests"][0]["attempts"][0]["attachments"] = json!([{
        "name": "stdout", "contentType": "text/plain", "id": id
    }]);
    write_report(tmp.path(), &report);
    fs::create_dir_all(tmp.path().join("attachments")).unwrap();
    fs::write(tmp.path().join("attachments").join(id), b"abd").unwrap();

    let output = tr_core().arg("check").arg(tmp.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(11));
    let json = stdout_json(&output);
    assert_eq!(json["checksum_mismatches"][0]["expected"], id);
}

#[test]
fn missing_report_dir_is_args_error() {
    let tmp = TempDir::new().unwrap();
    let output = tr_core()
        .arg("check")
        .arg(tmp.path().join("nope"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(10));
    let json = stdout_json(&output);
    assert_eq!(json["category"], "bundle");
    assert!(json["context"]["run_id"].as_str().unwrap().starts_with("run-"));
}

#[test]
fn upload_without_credentials_is_skipped() {
    let tmp = TempDir::new().unwrap();
    let report_dir = tmp.path().join("report");
    write_report(&report_dir, &sharded_report());

    let output = tr_core()
        .env("XDG_CONFIG_HOME", tmp.path())
        .arg("upload")
        .arg(&report_dir)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["status"], "skipped");
    assert!(json["reason"].as_str().unwrap().contains("no access token"));
}

#[test]
fn upload_rejects_invalid_endpoint() {
    let tmp = TempDir::new().unwrap();
    write_report(tmp.path(), &sharded_report());

    tr_core()
        .env("XDG_CONFIG_HOME", tmp.path())
        .args(["upload", "--endpoint", "not a url", "--token", "t"])
        .arg(tmp.path())
        .assert()
        .code(10);
}

#[test]
fn human_format_check() {
    let tmp = TempDir::new().unwrap();
    write_report(tmp.path(), &sharded_report());

    tr_core()
        .args(["-f", "human", "check"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("environment references"));
}

#[test]
fn upload_rejects_malformed_attachment_id() {
    let tmp = TempDir::new().unwrap();
    let report_dir = tmp.path().join("report");
    fs::write(tmp.path().join("secret.txt"), b"TOP SECRET").unwrap();
    let mut report = sharded_report();
    report["suites"][0]["tests"][0]["attempts"][0]["attachments"] = json!([{
        "name": "trace", "contentType": "text/plain", "id": "../../secret.txt"
    }]);
    write_report(&report_dir, &report);

    let output = tr_core()
        .env("XDG_CONFIG_HOME", tmp.path())
        .args(["upload", "--token", "t", "--endpoint", "http://127.0.0.1:9"])
        .arg(&report_dir)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(11));
    let json = stdout_json(&output);
    assert!(json["message"].as_str().unwrap().contains("invalid attachment id"));
}
