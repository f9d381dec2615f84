//! Result rendering.
//!
//! Text, table, and JSON renderers for every command's output, plus the
//! update progress bar. Reporters never assume result order; they render
//! whatever arrives, and sorting is an explicit, caller-requested step.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::git::status::RepositoryStatus;
use crate::scanner::{Repository, RepositoryWithDescription};
use crate::updater::{UpdateResult, UpdateStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Table,
    Json,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(ReportFormat::Text),
            "table" => Ok(ReportFormat::Table),
            "json" => Ok(ReportFormat::Json),
            other => anyhow::bail!("unknown output format: {other} (expected text, table, or json)"),
        }
    }
}

pub struct Reporter {
    format: ReportFormat,
    verbose: bool,
}

impl Reporter {
    pub fn new(format: ReportFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Progress bar for a fleet update; ticked once per completed task.
    pub fn update_progress(&self, total: u64) -> ProgressBar {
        if self.format == ReportFormat::Json {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .expect("static template"),
        );
        bar
    }

    pub fn report_scan(&self, repositories: &[Repository]) -> Result<()> {
        match self.format {
            ReportFormat::Json => print_json(repositories)?,
            ReportFormat::Table => {
                println!("{:<28} PATH", "NAME");
                println!("{}", "─".repeat(72));
                for repo in repositories {
                    println!("{:<28} {}", repo.name, repo.path.display());
                }
                println!("\n{} repositories", repositories.len());
            }
            ReportFormat::Text => {
                for repo in repositories {
                    println!("{}  {}", repo.name.bold(), repo.path.display());
                }
                println!("\nfound {} repositories", repositories.len());
            }
        }
        Ok(())
    }

    pub fn report_update(&self, results: &[UpdateResult]) -> Result<()> {
        match self.format {
            ReportFormat::Json => {
                #[derive(Serialize)]
                struct Output<'a> {
                    results: &'a [UpdateResult],
                    summary: UpdateStats,
                }
                print_json(&Output {
                    results,
                    summary: UpdateStats::from_results(results),
                })?;
            }
            ReportFormat::Table => {
                println!("{:<28} {:<8} MESSAGE", "NAME", "STATUS");
                println!("{}", "─".repeat(72));
                for result in results {
                    let status = if result.success { "ok" } else { "failed" };
                    println!(
                        "{:<28} {:<8} {}",
                        result.repository.name, status, result.message
                    );
                }
                self.print_update_summary(results);
            }
            ReportFormat::Text => {
                for result in results {
                    let marker = if result.success {
                        "✓".green()
                    } else {
                        "✗".red()
                    };
                    println!(
                        "{} {} {} ({})",
                        marker,
                        result.repository.name.bold(),
                        result.message,
                        format_duration(result.duration)
                    );
                    if self.verbose {
                        if let Some(error) = &result.error {
                            for line in error.trim().lines() {
                                println!("    {}", line.dimmed());
                            }
                        }
                    }
                }
                self.print_update_summary(results);
            }
        }
        Ok(())
    }

    fn print_update_summary(&self, results: &[UpdateResult]) {
        let stats = UpdateStats::from_results(results);
        println!(
            "\n{}: {} total, {} successful, {} failed ({:.1}%), {} elapsed, {} mean",
            "summary".bold(),
            stats.total,
            stats.successful.to_string().green(),
            if stats.failed > 0 {
                stats.failed.to_string().red().to_string()
            } else {
                stats.failed.to_string()
            },
            stats.success_rate,
            format_duration(stats.total_duration),
            format_duration(stats.average_duration),
        );
    }

    pub fn report_status(&self, statuses: &[RepositoryStatus]) -> Result<()> {
        match self.format {
            ReportFormat::Json => print_json(statuses)?,
            ReportFormat::Table => {
                println!(
                    "{:<24} {:<16} {:<8} {:<8} STATE",
                    "NAME", "BRANCH", "AHEAD", "BEHIND"
                );
                println!("{}", "─".repeat(78));
                for status in statuses {
                    let name = status
                        .repository
                        .as_ref()
                        .map(|r| r.name.as_str())
                        .unwrap_or("?");
                    let state = if !status.error.is_empty() {
                        status.error.as_str()
                    } else {
                        status.status.as_str()
                    };
                    println!(
                        "{:<24} {:<16} {:<8} {:<8} {}",
                        name, status.branch, status.ahead, status.behind, state
                    );
                }
            }
            ReportFormat::Text => {
                for status in statuses {
                    let name = status
                        .repository
                        .as_ref()
                        .map(|r| r.name.as_str())
                        .unwrap_or("?");
                    if !status.error.is_empty() {
                        println!("{} {}: {}", "✗".red(), name.bold(), status.error);
                        continue;
                    }

                    let dirty = if status.has_changes {
                        status.status.yellow().to_string()
                    } else {
                        "clean".green().to_string()
                    };
                    let mut line = format!("{} [{}] {}", name.bold(), status.branch, dirty);
                    if status.ahead > 0 || status.behind > 0 {
                        line.push_str(&format!(" ↑{} ↓{}", status.ahead, status.behind));
                    }
                    println!("{line}");

                    if self.verbose {
                        if !status.last_commit_hash.is_empty() {
                            let short: String = status.last_commit_hash.chars().take(8).collect();
                            println!("    {} {}", short.dimmed(), status.last_commit_message);
                        }
                        if !status.remote_url.is_empty() {
                            println!("    {}", status.remote_url.dimmed());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn report_list(
        &self,
        repositories: &[RepositoryWithDescription],
        sort_by_time: bool,
        reverse: bool,
    ) -> Result<()> {
        let mut ordered: Vec<&RepositoryWithDescription> = repositories.iter().collect();
        if sort_by_time {
            ordered.sort_by_key(|r| r.last_activity);
            ordered.reverse(); // newest first by default
        } else {
            ordered.sort_by(|a, b| a.repository.name.cmp(&b.repository.name));
        }
        if reverse {
            ordered.reverse();
        }

        match self.format {
            ReportFormat::Json => print_json(&ordered)?,
            ReportFormat::Table => {
                println!("{:<24} {:<19} DESCRIPTION", "NAME", "LAST ACTIVITY");
                println!("{}", "─".repeat(90));
                for repo in ordered {
                    let when = repo
                        .last_activity
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    println!(
                        "{:<24} {:<19} {}",
                        repo.repository.name, when, repo.description
                    );
                }
            }
            ReportFormat::Text => {
                for repo in ordered {
                    let description = if repo.description.is_empty() {
                        "no description".dimmed().to_string()
                    } else {
                        repo.description.clone()
                    };
                    println!("{}  {}", repo.repository.name.bold(), description);
                    if self.verbose {
                        println!("    {}", repo.repository.path.display().to_string().dimmed());
                    }
                }
            }
        }
        Ok(())
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Write a command's payload as pretty-printed JSON to `path`.
pub fn save_report<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

/// Report destination: the configured path, or
/// `reposense-<command>-<timestamp>.json` in the current directory.
pub fn report_path(configured: &str, command: &str) -> PathBuf {
    if !configured.is_empty() {
        return PathBuf::from(configured);
    }
    PathBuf::from(format!(
        "reposense-{command}-{}.json",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ))
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        format!("{}m{:02}s", d.as_secs() / 60, d.as_secs() % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("text".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert_eq!("table".parse::<ReportFormat>().unwrap(), ReportFormat::Table);
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("yaml".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs_f64(2.35)), "2.3s");
        assert_eq!(format_duration(Duration::from_secs(95)), "1m35s");
    }

    #[test]
    fn test_report_path_prefers_configured_file() {
        assert_eq!(
            report_path("fleet.json", "update"),
            PathBuf::from("fleet.json")
        );

        let generated = report_path("", "status");
        let name = generated.to_string_lossy().into_owned();
        assert!(name.starts_with("reposense-status-"));
        assert!(name.ends_with(".json"));
    }

    #[test]
    fn test_save_report_writes_pretty_json() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("report.json");

        save_report(&path, &vec!["alpha", "beta"]).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let back: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_save_report_unwritable_path_errors() {
        let result = save_report(Path::new("/definitely/not/here/report.json"), &1);
        assert!(result.is_err());
    }
}
