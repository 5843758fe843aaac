use assert_cmd::prelude::*;
use smelt::store::Store;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn has_git() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_DATE", "2024-01-01T00:00:00Z")
        .env("GIT_COMMITTER_DATE", "2024-01-01T00:00:00Z")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn init_repo(dir: &Path) -> String {
    git(dir, &["init"]);
    git(dir, &["config", "core.autocrlf", "false"]);
    git(dir, &["config", "user.email", "you@example.com"]);
    git(dir, &["config", "user.name", "Your Name"]);
    git(dir, &["symbolic-ref", "--short", "HEAD"])
}

fn commit(dir: &Path, name: &str, content: &str, message: &str, date: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut f = File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f.sync_all().unwrap();
    git(dir, &["add", "."]);
    let status = Command::new("git")
        .args(["commit", "-m", message])
        .current_dir(dir)
        .env("GIT_AUTHOR_DATE", date)
        .env("GIT_COMMITTER_DATE", date)
        .status()
        .unwrap();
    assert!(status.success());
    git(dir, &["rev-parse", "HEAD"])
}

/// trunk A, B; feature from A with one commit; merged back into trunk
fn merged_fixture(dir: &Path) -> (String, String) {
    let trunk = init_repo(dir);
    let a = commit(dir, "a.txt", "a", "A", "2024-01-01T00:00:01Z");
    git(dir, &["checkout", "-b", "feature"]);
    commit(dir, "c.txt", "c", "C", "2024-01-01T00:00:02Z");
    git(dir, &["checkout", trunk.as_str()]);
    let b = commit(dir, "b.txt", "b", "B", "2024-01-01T00:00:03Z");
    let status = Command::new("git")
        .args(["merge", "--no-ff", "-m", "M", "feature"])
        .current_dir(dir)
        .env("GIT_AUTHOR_DATE", "2024-01-01T00:00:04Z")
        .env("GIT_COMMITTER_DATE", "2024-01-01T00:00:04Z")
        .status()
        .unwrap();
    assert!(status.success());
    (a, b)
}

#[test]
fn branches_json_reports_the_forest() {
    if !has_git() {
        return;
    }
    let dir = tempdir().unwrap();
    merged_fixture(dir.path());

    let output = Command::cargo_bin("smelt")
        .unwrap()
        .args(["--repo"])
        .arg(dir.path())
        .args(["branches", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let branches = parsed["branches"].as_array().unwrap();
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0]["commits"].as_array().unwrap().len(), 3);
    assert_eq!(branches[1]["commits"].as_array().unwrap().len(), 1);
}

#[test]
fn renames_command_runs_clean() {
    if !has_git() {
        return;
    }
    let dir = tempdir().unwrap();
    let _trunk = init_repo(dir.path());
    commit(dir.path(), "old.txt", "same content\n", "add", "2024-01-01T00:00:01Z");
    git(dir.path(), &["mv", "old.txt", "new.txt"]);
    let status = Command::new("git")
        .args(["commit", "-m", "rename"])
        .current_dir(dir.path())
        .env("GIT_AUTHOR_DATE", "2024-01-01T00:00:02Z")
        .env("GIT_COMMITTER_DATE", "2024-01-01T00:00:02Z")
        .status()
        .unwrap();
    assert!(status.success());

    Command::cargo_bin("smelt")
        .unwrap()
        .args(["--repo"])
        .arg(dir.path())
        .args(["renames", "--ndjson"])
        .assert()
        .success();
}

#[test]
fn analyze_persists_detector_snapshots() {
    if !has_git() {
        return;
    }
    let dir = tempdir().unwrap();
    let (a, b) = merged_fixture(dir.path());

    let smells = dir.path().join("smells.ndjson");
    let mut f = File::create(&smells).unwrap();
    writeln!(
        f,
        r#"{{"sha":"{a}","smell_type":"GC","instance":"pkg.Widget","file":"Widget.java"}}"#
    )
    .unwrap();
    writeln!(
        f,
        r#"{{"sha":"{b}","smell_type":"GC","instance":"pkg.Widget","file":"Widget.java"}}"#
    )
    .unwrap();

    let db_dir = tempdir().unwrap();
    Command::cargo_bin("smelt")
        .unwrap()
        .args(["--repo"])
        .arg(dir.path())
        .args(["--db"])
        .arg(db_dir.path())
        .args(["analyze", "--smells"])
        .arg(&smells)
        .assert()
        .success();

    let store = Store::open(Some(db_dir.path()), dir.path()).unwrap();
    let repo_root = smelt::git::GitRepo::open(Some(dir.path())).unwrap();
    let project = store.ensure_project(&repo_root.path().to_string_lossy()).unwrap();
    assert_eq!(store.smell_count(project).unwrap(), 2);
}
