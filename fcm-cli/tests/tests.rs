//! Integration tests for the entire `fcm-submit` executable.

use cli_test_dir::*;
use serde_json::Value;

#[test]
fn help_flag() {
    let testdir = TestDir::new("fcm-submit", "help_flag");
    let output = testdir.cmd().arg("--help").expect_success();
    assert!(output.stdout_str().contains("fcm-submit"));
    assert!(output.stdout_str().contains("--membership"));
}

#[test]
fn version_flag() {
    let testdir = TestDir::new("fcm-submit", "version_flag");
    let output = testdir.cmd().arg("--version").expect_success();
    assert!(output.stdout_str().contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn dry_run_prints_unsupervised_request() {
    let testdir = TestDir::new("fcm-submit", "dry_run_prints_unsupervised_request");
    testdir.create_file("data.csv", "1,2\n3,4");
    let output = testdir
        .cmd()
        .args(&["--data", "data.csv"])
        .args(&["-p", "clusters=3"])
        .args(&["-p", "alpha=0.9"])
        .args(&["--membership", "[[1, 0]]"])
        .arg("--dry-run")
        .expect_success();
    let request: Value = serde_json::from_str(output.stdout_str()).unwrap();
    assert_eq!(
        request,
        serde_json::json!({
            "data": "1,2\n3,4",
            "fcm_type": "Unsupervised FCM",
            "clusters": 3,
            "m": 2.0,
            "eps": 0.01,
            "lmax": 50,
        })
    );
}

#[test]
fn dry_run_prints_semi_supervised_request() {
    let testdir = TestDir::new("fcm-submit", "dry_run_prints_semi_supervised_request");
    testdir.create_file("data.csv", "1,2\n3,4\n");
    testdir.create_file("u.json", "[[0.2, 0.8], [0.8, 0.2]]");
    let output = testdir
        .cmd()
        .args(&["--data", "data.csv"])
        .args(&["--algorithm", "semi-supervised"])
        .args(&["-p", "alpha=0.25"])
        .args(&["--membership-file", "u.json"])
        .arg("--dry-run")
        .expect_success();
    let request: Value = serde_json::from_str(output.stdout_str()).unwrap();
    assert_eq!(request["fcm_type"], "Semi-Supervised FCM");
    assert_eq!(request["alpha"], 0.25);
    assert_eq!(request["u_supervised"], serde_json::json!([[0.2, 0.8], [0.8, 0.2]]));
    assert!(request.get("beta").is_none());
}

#[test]
fn out_of_range_values_only_warn() {
    let testdir = TestDir::new("fcm-submit", "out_of_range_values_only_warn");
    testdir.create_file("data.csv", "1,2\n3,4\n");
    let output = testdir
        .cmd()
        .args(&["--data", "data.csv"])
        .args(&["-p", "clusters=1000"])
        .arg("--dry-run")
        .expect_success();
    assert!(output.stderr_str().contains("warning"));
    let request: Value = serde_json::from_str(output.stdout_str()).unwrap();
    assert_eq!(request["clusters"], 1000);
}

#[test]
fn malformed_membership_fails() {
    let testdir = TestDir::new("fcm-submit", "malformed_membership_fails");
    testdir.create_file("data.csv", "1,2\n3,4\n");
    let output = testdir
        .cmd()
        .args(&["--data", "data.csv"])
        .args(&["--algorithm", "entropy"])
        .args(&["--membership", "{not json"])
        // Nothing listens here; we must fail before trying to connect.
        .args(&["--endpoint", "http://127.0.0.1:9/run_fcm"])
        .expect_failure();
    assert!(output.stderr_str().contains("supervised membership"));
}

#[test]
fn missing_data_file_fails() {
    let testdir = TestDir::new("fcm-submit", "missing_data_file_fails");
    let output = testdir
        .cmd()
        .args(&["--data", "nope.csv"])
        .arg("--dry-run")
        .expect_failure();
    assert!(output.stderr_str().contains("could not load dataset"));
}

#[test]
fn dry_run_rejects_empty_dataset() {
    let testdir = TestDir::new("fcm-submit", "dry_run_rejects_empty_dataset");
    testdir.create_file("data.csv", "");
    let output = testdir
        .cmd()
        .args(&["--data", "data.csv"])
        .arg("--dry-run")
        .expect_failure();
    assert!(output.stderr_str().contains("no dataset has been loaded"));
    assert!(output.stdout_str().is_empty());
}
