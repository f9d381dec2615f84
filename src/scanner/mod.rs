//! Repository discovery.
//!
//! Walks a directory tree and reports every Git repository beneath it. A
//! directory counts as a repository when it contains a `.git` entry, file or
//! directory both (worktrees and submodules use a `.git` file). Once a
//! repository is found its subtree is not descended further, so nested
//! checkouts are never reported twice.

use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A discovered Git repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    pub path: PathBuf,
    pub name: String,
    pub is_git_repo: bool,
}

impl Repository {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            path,
            name,
            is_git_repo: true,
        }
    }
}

/// A repository paired with its generated description, as produced by the
/// `list` pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryWithDescription {
    #[serde(flatten)]
    pub repository: Repository,
    pub description: String,
    pub last_activity: Option<DateTime<Local>>,
}

pub struct Scanner;

impl Scanner {
    pub fn new() -> Self {
        Self
    }

    /// Walk `root` depth-first and collect repositories.
    ///
    /// Per-entry walk errors are logged and skipped; only an inaccessible
    /// root is fatal.
    pub fn scan(&self, root: &Path) -> Result<Vec<Repository>> {
        if !root.exists() {
            bail!("scan root does not exist: {}", root.display());
        }
        if !root.is_dir() {
            bail!("scan root is not a directory: {}", root.display());
        }

        info!("scanning {} for repositories", root.display());

        let mut repositories = Vec::new();
        let mut walker = WalkDir::new(root).follow_links(false).into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!("skipping unreadable entry: {}", err);
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            if entry.file_name().to_str() == Some(".git") {
                walker.skip_current_dir();
                continue;
            }

            if is_git_repository(entry.path()) {
                debug!("found repository: {}", entry.path().display());
                repositories.push(Repository::new(entry.path().to_path_buf()));
                walker.skip_current_dir();
            }
        }

        info!("scan finished: {} repositories", repositories.len());
        Ok(repositories)
    }

    /// Walk `root`, then drop repositories matched by `exclude` and keep only
    /// those matched by `include` (an empty include list accepts everything).
    /// Matching is case-insensitive substring against both the repository
    /// basename and its full path.
    pub fn scan_filtered(
        &self,
        root: &Path,
        include: &[String],
        exclude: &[String],
    ) -> Result<Vec<Repository>> {
        let repositories = self.scan(root)?;
        if include.is_empty() && exclude.is_empty() {
            return Ok(repositories);
        }

        let before = repositories.len();
        let filtered: Vec<Repository> = repositories
            .into_iter()
            .filter(|repo| {
                let keep = matches_filters(repo, include, exclude);
                if !keep {
                    debug!("filtered out: {}", repo.path.display());
                }
                keep
            })
            .collect();

        info!("{} of {} repositories after filtering", filtered.len(), before);
        Ok(filtered)
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// `.git` may be a directory (normal clone) or a file (worktree, submodule).
pub fn is_git_repository(path: &Path) -> bool {
    path.join(".git").exists()
}

fn matches_filters(repo: &Repository, include: &[String], exclude: &[String]) -> bool {
    let name = repo.name.to_lowercase();
    let path = repo.path.to_string_lossy().to_lowercase();

    for pattern in exclude {
        let pattern = pattern.to_lowercase();
        if name.contains(&pattern) || path.contains(&pattern) {
            return false;
        }
    }

    if include.is_empty() {
        return true;
    }

    include.iter().any(|pattern| {
        let pattern = pattern.to_lowercase();
        name.contains(&pattern) || path.contains(&pattern)
    })
}

/// Last activity timestamp for sorting: the mtime of the `.git` entry.
/// A proxy, but any ref update touches it and it costs no subprocess.
pub fn repo_activity_time(repo_path: &Path) -> Option<DateTime<Local>> {
    let meta = std::fs::metadata(repo_path.join(".git")).ok()?;
    let mtime = meta.modified().ok()?;
    Some(DateTime::from(mtime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn mkrepo(root: &Path, rel: &str) -> PathBuf {
        let dir = root.join(rel);
        fs::create_dir_all(dir.join(".git")).unwrap();
        dir
    }

    #[test]
    fn test_scan_finds_repositories() -> Result<()> {
        let temp = TempDir::new()?;
        mkrepo(temp.path(), "alpha");
        mkrepo(temp.path(), "work/beta");
        fs::create_dir_all(temp.path().join("not-a-repo"))?;

        let mut repos = Scanner::new().scan(temp.path())?;
        repos.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].name, "alpha");
        assert_eq!(repos[1].name, "beta");
        assert!(repos.iter().all(|r| r.is_git_repo));
        Ok(())
    }

    #[test]
    fn test_scan_does_not_descend_into_repositories() -> Result<()> {
        let temp = TempDir::new()?;
        let outer = mkrepo(temp.path(), "outer");
        mkrepo(&outer, "sub");

        let repos = Scanner::new().scan(temp.path())?;
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "outer");
        Ok(())
    }

    #[test]
    fn test_scan_detects_git_file() -> Result<()> {
        // Worktrees carry a .git *file* pointing at the real gitdir.
        let temp = TempDir::new()?;
        let dir = temp.path().join("worktree");
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(".git"), "gitdir: /somewhere/else\n")?;

        let repos = Scanner::new().scan(temp.path())?;
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "worktree");
        Ok(())
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let result = Scanner::new().scan(Path::new("/definitely/not/here"));
        assert!(result.is_err());
    }

    #[test]
    fn test_filter_exclude_wins_over_include() -> Result<()> {
        let temp = TempDir::new()?;
        mkrepo(temp.path(), "api-server");
        mkrepo(temp.path(), "api-archive");

        let repos = Scanner::new().scan_filtered(
            temp.path(),
            &["api".to_string()],
            &["archive".to_string()],
        )?;
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "api-server");
        Ok(())
    }

    #[test]
    fn test_filter_is_case_insensitive() -> Result<()> {
        let temp = TempDir::new()?;
        mkrepo(temp.path(), "MyProject");

        let scanner = Scanner::new();
        let lower = scanner.scan_filtered(temp.path(), &["myproject".to_string()], &[])?;
        let upper = scanner.scan_filtered(temp.path(), &["MYPROJECT".to_string()], &[])?;
        assert_eq!(lower.len(), 1);
        assert_eq!(upper.len(), 1);

        let excluded = scanner.scan_filtered(temp.path(), &[], &["MYPROJECT".to_string()])?;
        assert!(excluded.is_empty());
        Ok(())
    }

    #[test]
    fn test_empty_include_accepts_all() -> Result<()> {
        let temp = TempDir::new()?;
        mkrepo(temp.path(), "one");
        mkrepo(temp.path(), "two");

        let repos = Scanner::new().scan_filtered(temp.path(), &[], &[])?;
        assert_eq!(repos.len(), 2);
        Ok(())
    }

    #[test]
    fn test_activity_time_present_for_repo() -> Result<()> {
        let temp = TempDir::new()?;
        let dir = mkrepo(temp.path(), "repo");
        assert!(repo_activity_time(&dir).is_some());
        assert!(repo_activity_time(&temp.path().join("missing")).is_none());
        Ok(())
    }
}
