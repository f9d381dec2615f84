//! Scanner behavior against real directory trees.

mod common;

use std::fs;
use tempfile::TempDir;

use reposense::scanner::{repo_activity_time, Scanner};

#[test]
fn nested_repository_is_not_descended() {
    // /root/a/.git and /root/a/sub/.git: only `a` may be reported.
    let temp = TempDir::new().unwrap();
    let a = temp.path().join("a");
    fs::create_dir_all(a.join(".git")).unwrap();
    fs::create_dir_all(a.join("sub").join(".git")).unwrap();

    let repos = Scanner::new().scan(temp.path()).unwrap();
    assert_eq!(repos.len(), 1);
    assert_eq!(repos[0].path, a);
}

#[test]
fn every_reported_path_contains_git_entry() {
    let temp = TempDir::new().unwrap();
    for name in ["one", "two", "deep/three"] {
        fs::create_dir_all(temp.path().join(name).join(".git")).unwrap();
    }
    fs::create_dir_all(temp.path().join("plain/dir")).unwrap();

    let repos = Scanner::new().scan(temp.path()).unwrap();
    assert_eq!(repos.len(), 3);
    for repo in &repos {
        assert!(repo.path.join(".git").exists());
    }
}

#[test]
fn real_repository_is_discovered() {
    let fixture = common::setup_repo_with_commit();
    let parent = fixture.path().parent().unwrap();

    let repos = Scanner::new().scan(parent).unwrap();
    assert_eq!(repos.len(), 1);
    assert!(repos[0].is_git_repo);
    assert!(repo_activity_time(&repos[0].path).is_some());
}

#[test]
fn filters_apply_to_name_and_path() {
    let temp = TempDir::new().unwrap();
    for name in ["service-auth", "service-billing", "tooling"] {
        fs::create_dir_all(temp.path().join(name).join(".git")).unwrap();
    }

    let scanner = Scanner::new();

    let services = scanner
        .scan_filtered(temp.path(), &["SERVICE".to_string()], &[])
        .unwrap();
    assert_eq!(services.len(), 2);

    let no_billing = scanner
        .scan_filtered(temp.path(), &[], &["billing".to_string()])
        .unwrap();
    assert_eq!(no_billing.len(), 2);
    assert!(no_billing.iter().all(|r| r.name != "service-billing"));
}
