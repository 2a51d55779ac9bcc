//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn examflow() -> Command {
    Command::cargo_bin("examflow").unwrap()
}

const PLAN: &str = r#"[plan]
name = "CS101 midterm week"

[[students]]
key = "alice"
name = "Alice Mwangi"
email = "alice@uni.example"

[[exams]]
title = "Algorithms I midterm"
duration_minutes = 60
start_time = "2026-03-02T09:00:00Z"
end_time = "2026-03-02T10:00:00Z"
enrolled = ["alice"]
in_progress = ["alice"]
"#;

#[test]
fn validate_valid_plan() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plan.toml");
    std::fs::write(&path, PLAN).unwrap();

    examflow()
        .arg("validate")
        .arg("--plan")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 exams"))
        .stdout(predicate::str::contains("All plans valid"));
}

#[test]
fn validate_warns_on_empty_enrollment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plan.toml");
    let plan = PLAN.replace("enrolled = [\"alice\"]\nin_progress = [\"alice\"]\n", "");
    std::fs::write(&path, plan).unwrap();

    examflow()
        .arg("validate")
        .arg("--plan")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("no students enrolled"))
        .stdout(predicate::str::contains("1 warning(s) found"));
}

#[test]
fn validate_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.toml"), PLAN).unwrap();
    std::fs::write(
        dir.path().join("b.toml"),
        PLAN.replace("CS101 midterm week", "CS102 finals"),
    )
    .unwrap();

    examflow()
        .arg("validate")
        .arg("--plan")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("CS101 midterm week"))
        .stdout(predicate::str::contains("CS102 finals"));
}

#[test]
fn validate_nonexistent_file() {
    examflow()
        .arg("validate")
        .arg("--plan")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_rejects_bad_timestamp() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plan.toml");
    let plan = PLAN.replace("2026-03-02T09:00:00Z", "yesterday at nine");
    std::fs::write(&path, plan).unwrap();

    examflow()
        .arg("validate")
        .arg("--plan")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad start_time"));
}

#[test]
fn sweep_reports_transitions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plan.toml");
    std::fs::write(&path, PLAN).unwrap();

    // One hour after the exam window closed: the exam activates, completes,
    // and the seeded in-progress attempt is auto-submitted.
    examflow()
        .arg("sweep")
        .arg("--plan")
        .arg(&path)
        .arg("--at")
        .arg("2026-03-02T11:00:00Z")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exams completed"))
        .stdout(predicate::str::contains("Attempts auto-submitted"));
}

#[test]
fn sweep_rejects_bad_at_timestamp() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plan.toml");
    std::fs::write(&path, PLAN).unwrap();

    examflow()
        .arg("sweep")
        .arg("--plan")
        .arg(&path)
        .arg("--at")
        .arg("noon-ish")
        .assert()
        .failure()
        .stderr(predicate::str::contains("RFC 3339"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    examflow()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created examflow.toml"))
        .stdout(predicate::str::contains("Created plans/example.toml"));

    assert!(dir.path().join("examflow.toml").exists());
    assert!(dir.path().join("plans/example.toml").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    examflow()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    examflow()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn init_output_validates() {
    let dir = TempDir::new().unwrap();

    examflow()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    examflow()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--plan")
        .arg("plans/example.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("All plans valid"));
}

#[test]
fn help_output() {
    examflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Exam lifecycle and integrity enforcement engine",
        ));
}

#[test]
fn version_output() {
    examflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("examflow"));
}
