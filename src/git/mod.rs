//! Non-interactive git subprocess execution.
//!
//! Every git invocation in the crate goes through [`GitRunner`]: working
//! directory set to the repository, a hard deadline, an optional shared
//! cancellation token, and (by default) an environment that makes any
//! credential prompt fail immediately instead of blocking on a terminal.

pub mod status;

use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared abort switch. Cloning hands out another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Outcome of one git invocation. A non-zero exit is not an `Err`; callers
/// classify it. Only spawn failures surface as errors.
#[derive(Debug)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub cancelled: bool,
}

impl GitOutput {
    /// stdout and stderr concatenated, for substring classification.
    pub fn combined(&self) -> String {
        let mut s = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        s.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stderr.is_empty() {
            s.push('\n');
        }
        s.push_str(&self.stderr);
        s
    }
}

#[derive(Debug, Clone)]
pub struct GitRunner {
    timeout: Duration,
    non_interactive: bool,
    cancel: CancelToken,
}

impl GitRunner {
    pub fn new(timeout: Duration, non_interactive: bool, cancel: CancelToken) -> Self {
        Self {
            timeout,
            non_interactive,
            cancel,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run `git <args>` in `repo` under the runner's default deadline.
    pub fn run(&self, repo: &Path, args: &[&str]) -> Result<GitOutput> {
        self.run_with_timeout(repo, args, self.timeout)
    }

    /// Run `git <args>` in `repo` with an explicit deadline. Used by callers
    /// that spread one deadline budget over several queries.
    pub fn run_with_timeout(&self, repo: &Path, args: &[&str], timeout: Duration) -> Result<GitOutput> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(repo)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if self.non_interactive {
            // The defense against fleet-wide hangs: every credential prompt
            // fails immediately instead of waiting on a terminal.
            cmd.env("GIT_TERMINAL_PROMPT", "0")
                .env("GIT_ASKPASS", "echo")
                .env("SSH_ASKPASS", "echo")
                .env(
                    "GIT_SSH_COMMAND",
                    "ssh -o BatchMode=yes -o ConnectTimeout=10 -o StrictHostKeyChecking=no",
                );
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn git {} in {}", args.join(" "), repo.display()))?;

        // Drain pipes on separate threads so a chatty child can never fill
        // the pipe buffer and deadlock against the deadline loop.
        let stdout_handle = drain_pipe(child.stdout.take());
        let stderr_handle = drain_pipe(child.stderr.take());

        let (status, timed_out, cancelled) = self.wait_with_deadline(&mut child, timeout)?;

        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();

        Ok(GitOutput {
            success: status && !timed_out && !cancelled,
            stdout,
            stderr,
            timed_out,
            cancelled,
        })
    }

    /// Run a query-style command and return trimmed stdout. Non-zero exit,
    /// timeout, and cancellation are all errors here.
    pub fn query(&self, repo: &Path, args: &[&str]) -> Result<String> {
        self.query_with_timeout(repo, args, self.timeout)
    }

    pub fn query_with_timeout(&self, repo: &Path, args: &[&str], timeout: Duration) -> Result<String> {
        let output = self.run_with_timeout(repo, args, timeout)?;
        if output.timed_out {
            anyhow::bail!("git {} timed out in {}", args.join(" "), repo.display());
        }
        if output.cancelled {
            anyhow::bail!("git {} cancelled in {}", args.join(" "), repo.display());
        }
        if !output.success {
            anyhow::bail!(
                "git {} failed in {}: {}",
                args.join(" "),
                repo.display(),
                output.stderr.trim()
            );
        }
        Ok(output.stdout.trim().to_string())
    }

    /// Poll the child until exit, deadline, or cancellation. Returns
    /// (exited successfully, timed out, cancelled).
    fn wait_with_deadline(&self, child: &mut Child, timeout: Duration) -> Result<(bool, bool, bool)> {
        let start = Instant::now();
        loop {
            if self.cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Ok((false, false, true));
            }
            if let Some(status) = child.try_wait().context("failed to poll git subprocess")? {
                return Ok((status.success(), false, false));
            }
            if start.elapsed() > timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Ok((false, true, false));
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runner() -> GitRunner {
        GitRunner::new(Duration::from_secs(10), true, CancelToken::new())
    }

    #[test]
    fn test_run_captures_failure_without_err() -> Result<()> {
        let temp = TempDir::new()?;
        // rev-parse outside any repository exits non-zero; that is data,
        // not an error.
        let out = runner().run(temp.path(), &["rev-parse", "HEAD"])?;
        assert!(!out.success);
        assert!(!out.timed_out);
        assert!(!out.stderr.is_empty());
        Ok(())
    }

    #[test]
    fn test_query_fails_outside_repo() -> Result<()> {
        let temp = TempDir::new()?;
        assert!(runner().query(temp.path(), &["rev-parse", "HEAD"]).is_err());
        Ok(())
    }

    #[test]
    fn test_cancelled_token_kills_task() -> Result<()> {
        let temp = TempDir::new()?;
        let cancel = CancelToken::new();
        cancel.cancel();
        let r = GitRunner::new(Duration::from_secs(10), true, cancel);
        let out = r.run(temp.path(), &["status"])?;
        assert!(out.cancelled);
        assert!(!out.success);
        Ok(())
    }

    #[test]
    fn test_version_query_succeeds_anywhere() -> Result<()> {
        let temp = TempDir::new()?;
        let version = runner().query(temp.path(), &["--version"])?;
        assert!(version.starts_with("git version"));
        Ok(())
    }
}
