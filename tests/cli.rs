use assert_cmd::Command;
use chrono::Utc;
use git2::{Commit, Repository, Signature, Time};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn commit(repo: &Repository, path: &str, content: &str, author: &str, message: &str) {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let full = workdir.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(&full, content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(path)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let time = Time::new(Utc::now().timestamp() - 3600, 0);
    let sig = Signature::new(author, "dev@example.com", &time).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap();
}

fn branching_source(version: usize) -> String {
    let mut source = format!("// revision {}\n", version);
    for i in 0..50 {
        source.push_str(&format!("if a{} && b{} {{ }}\n", i, i));
    }
    source
}

fn fixture() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    commit(&repo, "src/engine.rs", &branching_source(0), "alice", "add engine");
    for i in 1..4 {
        commit(&repo, "src/engine.rs", &branching_source(i), "alice", "fix engine crash");
    }
    commit(&repo, "src/quiet.rs", "pub fn quiet() {}\n", "bob", "add quiet module");
    commit(&repo, "notes.txt", "not source\n", "bob", "notes");
    dir
}

#[test]
fn test_json_report() {
    let dir = fixture();
    let output = Command::cargo_bin("hotspot-analyzer")
        .unwrap()
        .arg("--repo")
        .arg(dir.path())
        .args(["--heat-map", "module", "--clusters"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let hotspots = report["hotspots"].as_array().unwrap();
    assert_eq!(hotspots.len(), 1);
    assert_eq!(hotspots[0]["path"], "src/engine.rs");
    assert_eq!(hotspots[0]["trend"], "NEW");
    assert_eq!(hotspots[0]["dimensions"]["complexity"], 100.0);
    assert_eq!(hotspots[0]["dimensions"]["defects"], 30.0);
    assert_eq!(hotspots[0]["dimensions"]["churn"], 40.0);
    assert_eq!(hotspots[0]["dimensions"]["ownership"], 100.0);
    assert_eq!(report["clusters"].as_array().unwrap().len(), 0);
    assert_eq!(report["heat_map"]["granularity"], "MODULE");
    assert_eq!(report["heat_map"]["points"][0]["id"], "src");
    assert_eq!(report["warnings"].as_array().unwrap().len(), 0);
    assert_eq!(hotspots[0]["dimensions"]["coverage"], 0.0);
}

#[test]
fn test_lcov_report_relative_to_repo() {
    let dir = fixture();
    let report = dir.path().join("lcov.info");
    fs::write(
        &report,
        "SF:./src/engine.rs\nDA:1,1\nDA:2,0\nDA:3,0\nDA:4,0\nend_of_record\n",
    )
    .unwrap();

    let output = Command::cargo_bin("hotspot-analyzer")
        .unwrap()
        .current_dir(dir.path())
        .args(["--repo", ".", "--coverage", "lcov.info"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["hotspots"][0]["dimensions"]["coverage"], 75.0);
    assert_eq!(report["warnings"].as_array().unwrap().len(), 0);
}

#[test]
fn test_history_file_tracks_trends_between_runs() {
    let dir = fixture();
    let history = dir.path().join("history.json");

    for expected in ["NEW", "STABLE"] {
        Command::cargo_bin("hotspot-analyzer")
            .unwrap()
            .arg("--repo")
            .arg(dir.path())
            .arg("--history")
            .arg(&history)
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("\"trend\": \"{}\"", expected)));
    }
    assert!(history.exists());
}

#[test]
fn test_csv_output() {
    let dir = fixture();
    Command::cargo_bin("hotspot-analyzer")
        .unwrap()
        .arg("--repo")
        .arg(dir.path())
        .args(["--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("path,score,severity,trend"))
        .stdout(predicate::str::contains("src/engine.rs"))
        .stdout(predicate::str::contains("src/quiet.rs").not());
}

#[test]
fn test_unsupported_format() {
    let dir = fixture();
    Command::cargo_bin("hotspot-analyzer")
        .unwrap()
        .arg("--repo")
        .arg(dir.path())
        .args(["--format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported output format"));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let dir = fixture();
    let config = dir.path().join("hotspots.toml");
    fs::write(
        &config,
        "[severity_thresholds]\ncritical = 10\nsevere = 20\nmoderate = 30\nminor = 40\n",
    )
    .unwrap();

    Command::cargo_bin("hotspot-analyzer")
        .unwrap()
        .arg("--repo")
        .arg(dir.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("strictly decreasing"));
}

#[test]
fn test_not_a_repository() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("hotspot-analyzer")
        .unwrap()
        .arg("--repo")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open repository"));
}
