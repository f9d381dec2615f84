//! Parallel fleet update.
//!
//! A bounded pool of worker threads pulls repositories from a shared task
//! queue and runs one `git pull` per repository under a deadline. Results
//! stream back to the caller as tasks finish; order is unspecified. One
//! task's failure never affects another, and nothing here retries.

pub mod classify;

use anyhow::Result;
use chrono::{DateTime, Local};
use log::{debug, info};
use serde::{Serialize, Serializer};
use std::str::FromStr;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::{Config, DEFAULT_WORKERS, MAX_WORKERS};
use crate::git::{CancelToken, GitRunner};
use crate::scanner::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PullStrategy {
    #[default]
    FfOnly,
    Merge,
    Rebase,
}

impl PullStrategy {
    pub fn git_args(&self) -> &'static [&'static str] {
        match self {
            PullStrategy::FfOnly => &["pull", "--no-edit", "--ff-only"],
            PullStrategy::Merge => &["pull", "--no-edit"],
            PullStrategy::Rebase => &["pull", "--rebase", "--no-edit"],
        }
    }
}

impl FromStr for PullStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ff-only" | "" => Ok(PullStrategy::FfOnly),
            "merge" => Ok(PullStrategy::Merge),
            "rebase" => Ok(PullStrategy::Rebase),
            other => anyhow::bail!("unknown pull strategy: {other} (expected ff-only, merge, or rebase)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub workers: usize,
    pub timeout: Duration,
    pub dry_run: bool,
    pub strategy: PullStrategy,
    pub non_interactive: bool,
}

impl UpdateOptions {
    pub fn from_config(config: &Config, strategy: PullStrategy) -> Self {
        Self {
            workers: config.workers,
            timeout: config.timeout(),
            dry_run: config.dry_run,
            strategy,
            non_interactive: true,
        }
    }

    /// Clamp the worker count into [1, 50]; zero falls back to the default.
    pub fn clamped_workers(&self) -> usize {
        if self.workers == 0 {
            DEFAULT_WORKERS
        } else {
            self.workers.min(MAX_WORKERS)
        }
    }
}

fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Outcome of one pull task.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResult {
    pub repository: Repository,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

/// Aggregate numbers for the batch summary.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateStats {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
    #[serde(serialize_with = "serialize_duration")]
    pub total_duration: Duration,
    #[serde(serialize_with = "serialize_duration")]
    pub average_duration: Duration,
}

impl UpdateStats {
    pub fn from_results(results: &[UpdateResult]) -> Self {
        let total = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        let failed = total - successful;
        let total_duration: Duration = results.iter().map(|r| r.duration).sum();
        let average_duration = if total > 0 {
            total_duration / total as u32
        } else {
            Duration::ZERO
        };
        let success_rate = if total > 0 {
            successful as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        Self {
            total,
            successful,
            failed,
            success_rate,
            total_duration,
            average_duration,
        }
    }
}

pub struct Updater {
    options: UpdateOptions,
    cancel: CancelToken,
}

impl Updater {
    pub fn new(options: UpdateOptions) -> Self {
        Self {
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Handle for aborting an in-flight batch from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Update every repository, invoking `progress` once per completed task.
    ///
    /// Returns one result per input repository unless the batch is
    /// cancelled, in which case the results collected so far are returned.
    pub fn update_all<F>(&self, repositories: &[Repository], mut progress: F) -> Vec<UpdateResult>
    where
        F: FnMut(&UpdateResult),
    {
        if repositories.is_empty() {
            return Vec::new();
        }

        let workers = self.options.clamped_workers().min(repositories.len());
        info!(
            "updating {} repositories with {} workers",
            repositories.len(),
            workers
        );

        let (job_tx, job_rx) = mpsc::channel::<Repository>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel::<UpdateResult>();

        for repo in repositories {
            // Receiver outlives this loop, so send cannot fail here.
            let _ = job_tx.send(repo.clone());
        }
        drop(job_tx);

        let mut results = Vec::with_capacity(repositories.len());

        std::thread::scope(|scope| {
            for worker_id in 0..workers {
                let job_rx = Arc::clone(&job_rx);
                let result_tx = result_tx.clone();
                let cancel = self.cancel.clone();
                scope.spawn(move || loop {
                    let job = {
                        let rx = job_rx.lock().expect("job queue poisoned");
                        rx.recv()
                    };
                    let Ok(repo) = job else { break };
                    if cancel.is_cancelled() {
                        // Drain without running; collected results still
                        // make it back to the caller.
                        continue;
                    }
                    let result = self.update_repository(&repo);
                    debug!("worker {}: {} -> {}", worker_id, repo.name, result.message);
                    if result_tx.send(result).is_err() {
                        break;
                    }
                });
            }
            drop(result_tx);

            for result in result_rx {
                progress(&result);
                results.push(result);
            }
        });

        info!("update finished: {} results", results.len());
        results
    }

    /// Run one pull task and classify its outcome.
    fn update_repository(&self, repo: &Repository) -> UpdateResult {
        let start_time = Local::now();
        let started = Instant::now();

        let (success, message, error) = if self.options.dry_run {
            (true, "simulated update".to_string(), None)
        } else {
            self.pull(repo)
        };

        let duration = started.elapsed();
        UpdateResult {
            repository: repo.clone(),
            success,
            message,
            error,
            start_time,
            end_time: Local::now(),
            duration,
        }
    }

    fn pull(&self, repo: &Repository) -> (bool, String, Option<String>) {
        let runner = GitRunner::new(
            self.options.timeout,
            self.options.non_interactive,
            self.cancel.clone(),
        );

        let output = match runner.run(&repo.path, self.options.strategy.git_args()) {
            Ok(output) => output,
            Err(err) => {
                return (
                    false,
                    "update failed: could not start git".to_string(),
                    Some(format!("{err:#}")),
                );
            }
        };

        let combined = output.combined();
        if output.timed_out {
            let message = format!(
                "update failed: timed out after {}s",
                self.options.timeout.as_secs()
            );
            return (false, message, Some(combined));
        }
        if output.cancelled {
            return (false, "update cancelled".to_string(), Some(combined));
        }
        if output.success {
            (true, classify::classify_success(&combined), None)
        } else {
            (false, classify::classify_failure(&combined), Some(combined))
        }
    }
}
