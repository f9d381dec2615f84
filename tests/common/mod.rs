//! Git repository fixtures for integration tests.
//!
//! Repositories are built by shelling out to the real `git` binary with
//! repo-local identity configured, so no test depends on the machine's
//! global git configuration for committing.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A throwaway repository. Keep the `TempDir` alive for the duration of
/// the test or the checkout disappears under you.
pub struct TestRepo {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestRepo {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Run git in `dir`, panicking loudly on failure so broken fixtures are
/// obvious in test output.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git binary not available");
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Fresh repository on branch `main` with test identity configured.
pub fn setup_repo() -> TestRepo {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let path = temp_dir.path().to_path_buf();

    git(&path, &["init", "-b", "main"]);
    git(&path, &["config", "user.name", "Test User"]);
    git(&path, &["config", "user.email", "test@example.com"]);

    TestRepo { temp_dir, path }
}

/// Fresh repository with one commit.
pub fn setup_repo_with_commit() -> TestRepo {
    let repo = setup_repo();
    commit_file(&repo.path, "initial.txt", "initial content\n", "initial commit");
    repo
}

/// Write a file and commit it.
pub fn commit_file(repo: &Path, name: &str, content: &str, message: &str) {
    fs::write(repo.join(name), content).expect("failed to write test file");
    git(repo, &["add", "."]);
    git(repo, &["commit", "-m", message]);
}

/// Clone `origin` into a new temp dir; the clone tracks `origin/main`.
pub fn clone_repo(origin: &Path) -> TestRepo {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let path = temp_dir.path().join("work");

    git(
        temp_dir.path(),
        &["clone", origin.to_str().unwrap(), path.to_str().unwrap()],
    );
    git(&path, &["config", "user.name", "Test User"]);
    git(&path, &["config", "user.email", "test@example.com"]);

    TestRepo { temp_dir, path }
}
