//! Status collection against real repositories.

mod common;

use std::time::Duration;

use reposense::git::status::StatusCollector;
use reposense::git::{CancelToken, GitRunner};
use reposense::scanner::Repository;

fn collector() -> StatusCollector {
    let runner = GitRunner::new(Duration::from_secs(30), true, CancelToken::new());
    StatusCollector::new(runner, Duration::from_secs(30))
}

#[test]
fn status_without_remote_has_empty_remote_fields() {
    let fixture = common::setup_repo_with_commit();
    let repo = Repository::new(fixture.path.clone());

    let status = collector().collect(&repo);

    assert_eq!(status.error, "");
    assert_eq!(status.branch, "main");
    assert!(!status.has_changes);
    assert_eq!(status.remote_url, "");
    assert_eq!(status.ahead, 0);
    assert_eq!(status.behind, 0);
}

#[test]
fn status_reports_remote_and_divergence() {
    let origin = common::setup_repo_with_commit();
    let work = common::clone_repo(origin.path());

    // One local commit the origin does not have.
    common::commit_file(&work.path, "local.txt", "local\n", "local commit");

    let repo = Repository::new(work.path.clone());
    let status = collector().collect(&repo);

    assert_eq!(status.error, "");
    assert!(!status.remote_url.is_empty());
    assert_eq!(status.ahead, 1);
    assert_eq!(status.behind, 0);
    assert_eq!(status.last_commit_message, "local commit");
    assert!(status.last_commit_date.is_some());
}

#[test]
fn status_counts_dirty_files() {
    let fixture = common::setup_repo_with_commit();
    std::fs::write(fixture.path.join("initial.txt"), "modified\n").unwrap();
    std::fs::write(fixture.path.join("untracked.txt"), "new\n").unwrap();

    let repo = Repository::new(fixture.path.clone());
    let status = collector().collect(&repo);

    assert!(status.has_changes);
    assert!(status.status.contains("1 modified"), "status: {}", status.status);
    assert!(status.status.contains("1 untracked"), "status: {}", status.status);
}

#[test]
fn batch_collection_is_one_snapshot_per_repository() {
    let a = common::setup_repo_with_commit();
    let b = common::setup_repo_with_commit();

    let repos = vec![
        Repository::new(a.path.clone()),
        Repository::new(b.path.clone()),
    ];
    let statuses = collector().collect_all(&repos);
    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|s| s.error.is_empty()));
}
