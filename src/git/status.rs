//! Repository status collection.
//!
//! A fixed sequence of git queries per repository, all sharing one deadline
//! budget. Individual query failures degrade to zero-valued fields; only a
//! failed branch lookup (or a non-repository) marks the whole snapshot as
//! errored.

use chrono::{DateTime, FixedOffset};
use log::{debug, warn};
use serde::Serialize;
use std::path::Path;
use std::time::{Duration, Instant};

use super::GitRunner;
use crate::scanner::Repository;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepositoryStatus {
    pub repository: Option<Repository>,
    pub branch: String,
    pub last_commit_hash: String,
    pub last_commit_message: String,
    pub last_commit_date: Option<DateTime<FixedOffset>>,
    pub has_changes: bool,
    pub status: String,
    pub remote_url: String,
    pub ahead: usize,
    pub behind: usize,
    pub error: String,
}

/// Counts parsed from `git status --porcelain` output.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DirtyCounts {
    pub modified: usize,
    pub added: usize,
    pub deleted: usize,
    pub untracked: usize,
}

impl DirtyCounts {
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.modified > 0 {
            parts.push(format!("{} modified", self.modified));
        }
        if self.added > 0 {
            parts.push(format!("{} added", self.added));
        }
        if self.deleted > 0 {
            parts.push(format!("{} deleted", self.deleted));
        }
        if self.untracked > 0 {
            parts.push(format!("{} untracked", self.untracked));
        }
        parts.join(", ")
    }
}

/// Count porcelain lines by their two-character status prefix.
pub fn parse_porcelain(output: &str) -> DirtyCounts {
    let mut counts = DirtyCounts::default();
    for line in output.lines() {
        if line.len() < 2 {
            continue;
        }
        match &line[..2] {
            "??" => counts.untracked += 1,
            "A " => counts.added += 1,
            "D " => counts.deleted += 1,
            "M " | " M" => counts.modified += 1,
            _ => {}
        }
    }
    counts
}

pub struct StatusCollector {
    runner: GitRunner,
    timeout: Duration,
}

impl StatusCollector {
    pub fn new(runner: GitRunner, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Collect the status snapshot for one repository. All queries share the
    /// collector's deadline budget.
    pub fn collect(&self, repo: &Repository) -> RepositoryStatus {
        let mut status = RepositoryStatus {
            repository: Some(repo.clone()),
            ..RepositoryStatus::default()
        };

        if !repo.is_git_repo {
            status.error = "not a git repository".to_string();
            return status;
        }

        let deadline = Instant::now() + self.timeout;
        let path = repo.path.as_path();

        // Branch first: if this fails the repository is unusable and the
        // remaining queries would fail the same way.
        match self.query(path, &["branch", "--show-current"], deadline) {
            Ok(branch) => status.branch = branch,
            Err(err) => {
                status.error = format!("failed to read branch: {err:#}");
                return status;
            }
        }

        if let Err(err) = self.collect_last_commit(path, deadline, &mut status) {
            warn!("{}: commit lookup failed: {err:#}", repo.name);
        }

        match self.query(path, &["status", "--porcelain"], deadline) {
            Ok(porcelain) => {
                if porcelain.is_empty() {
                    status.has_changes = false;
                    status.status = "clean".to_string();
                } else {
                    status.has_changes = true;
                    status.status = parse_porcelain(&porcelain).summary();
                }
            }
            Err(err) => warn!("{}: status query failed: {err:#}", repo.name),
        }

        match self.query(path, &["remote", "get-url", "origin"], deadline) {
            Ok(url) => status.remote_url = url,
            Err(err) => debug!("{}: no origin remote: {err:#}", repo.name),
        }

        let (ahead, behind) = self.collect_divergence(path, &status.branch, deadline);
        status.ahead = ahead;
        status.behind = behind;

        status
    }

    /// Collect statuses sequentially, one repository at a time.
    pub fn collect_all(&self, repositories: &[Repository]) -> Vec<RepositoryStatus> {
        repositories.iter().map(|r| self.collect(r)).collect()
    }

    fn collect_last_commit(
        &self,
        path: &Path,
        deadline: Instant,
        status: &mut RepositoryStatus,
    ) -> anyhow::Result<()> {
        status.last_commit_hash = self.query(path, &["rev-parse", "HEAD"], deadline)?;
        status.last_commit_message =
            self.query(path, &["log", "-1", "--pretty=format:%s"], deadline)?;

        let raw_date = self.query(path, &["log", "-1", "--pretty=format:%ci"], deadline)?;
        status.last_commit_date = DateTime::parse_from_str(&raw_date, "%Y-%m-%d %H:%M:%S %z").ok();
        Ok(())
    }

    /// Ahead/behind counts vs `origin/<branch>`. Any probe failure yields
    /// (0, 0): no remote and unreachable remote look the same here.
    fn collect_divergence(&self, path: &Path, branch: &str, deadline: Instant) -> (usize, usize) {
        if branch.is_empty() {
            return (0, 0);
        }

        if self.query(path, &["remote", "show", "origin"], deadline).is_err() {
            return (0, 0);
        }

        let remote_branch = format!("origin/{branch}");
        if self
            .query(path, &["rev-parse", "--verify", &remote_branch], deadline)
            .is_err()
        {
            return (0, 0);
        }

        let ahead = self
            .query(
                path,
                &["rev-list", "--count", &format!("{remote_branch}..HEAD")],
                deadline,
            )
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let behind = self
            .query(
                path,
                &["rev-list", "--count", &format!("HEAD..{remote_branch}")],
                deadline,
            )
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        (ahead, behind)
    }

    fn query(&self, path: &Path, args: &[&str], deadline: Instant) -> anyhow::Result<String> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            anyhow::bail!("status deadline exhausted");
        }
        self.runner.query_with_timeout(path, args, remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::CancelToken;
    use std::fs;
    use std::process::Command;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) {
        let out = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("git not available");
        assert!(
            out.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&out.stderr)
        );
    }

    fn init_repo_with_commit(dir: &Path) {
        git(dir, &["init", "-b", "main"]);
        git(dir, &["config", "user.name", "Test User"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        fs::write(dir.join("hello.txt"), "hello\n").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-m", "initial commit"]);
    }

    fn collector() -> StatusCollector {
        let runner = GitRunner::new(Duration::from_secs(30), true, CancelToken::new());
        StatusCollector::new(runner, Duration::from_secs(30))
    }

    #[test]
    fn test_parse_porcelain_counts() {
        let output = " M src/main.rs\nM  src/lib.rs\nA  new.rs\nD  gone.rs\n?? notes.txt\n?? scratch/\n";
        let counts = parse_porcelain(output);
        assert_eq!(
            counts,
            DirtyCounts {
                modified: 2,
                added: 1,
                deleted: 1,
                untracked: 2,
            }
        );
        assert_eq!(counts.summary(), "2 modified, 1 added, 1 deleted, 2 untracked");
    }

    #[test]
    fn test_parse_porcelain_empty_is_clean() {
        assert_eq!(parse_porcelain(""), DirtyCounts::default());
    }

    #[test]
    fn test_collect_clean_repo_without_remote() {
        let temp = TempDir::new().unwrap();
        init_repo_with_commit(temp.path());

        let repo = Repository::new(temp.path().to_path_buf());
        let status = collector().collect(&repo);

        assert!(status.error.is_empty(), "unexpected error: {}", status.error);
        assert_eq!(status.branch, "main");
        assert!(!status.last_commit_hash.is_empty());
        assert_eq!(status.last_commit_message, "initial commit");
        assert!(status.last_commit_date.is_some());
        assert!(!status.has_changes);
        assert_eq!(status.status, "clean");
        assert_eq!(status.remote_url, "");
        assert_eq!(status.ahead, 0);
        assert_eq!(status.behind, 0);
    }

    #[test]
    fn test_collect_dirty_repo() {
        let temp = TempDir::new().unwrap();
        init_repo_with_commit(temp.path());
        fs::write(temp.path().join("hello.txt"), "changed\n").unwrap();
        fs::write(temp.path().join("new.txt"), "new\n").unwrap();

        let repo = Repository::new(temp.path().to_path_buf());
        let status = collector().collect(&repo);

        assert!(status.has_changes);
        assert!(status.status.contains("1 modified"));
        assert!(status.status.contains("1 untracked"));
    }

    #[test]
    fn test_collect_non_repo_sets_error() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::new(temp.path().to_path_buf());
        let status = collector().collect(&repo);
        assert!(!status.error.is_empty());
    }

    #[test]
    fn test_collect_flagged_non_repo_short_circuits() {
        let mut repo = Repository::new(std::path::PathBuf::from("/nowhere"));
        repo.is_git_repo = false;
        let status = collector().collect(&repo);
        assert_eq!(status.error, "not a git repository");
    }
}
