//! Command orchestration.
//!
//! One file per subcommand. Each command wires scanner → engine → reporter
//! for its data flow; per-repository failures stay inside result records,
//! so a command only returns `Err` for fatal configuration, scan, or store
//! problems.

pub mod analyze;
pub mod cache;
pub mod config;
pub mod list;
pub mod scan;
pub mod status;
pub mod update;

use anyhow::{Context, Result};
use log::warn;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::reporter;
use crate::scanner::{Repository, Scanner};

/// Target directory for a fleet command: the given path or the current
/// directory, canonicalized so repository paths come out absolute.
pub fn resolve_root(path: Option<PathBuf>) -> Result<PathBuf> {
    let root = match path {
        Some(p) => p,
        None => std::env::current_dir().context("failed to determine current directory")?,
    };
    root.canonicalize()
        .with_context(|| format!("cannot access {}", root.display()))
}

/// Scan with CLI filters taking precedence over configured ones.
pub fn scan_fleet(
    config: &Config,
    root: &Path,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<Repository>> {
    let include = if include.is_empty() {
        config.include.as_slice()
    } else {
        include
    };
    let exclude = if exclude.is_empty() {
        config.exclude.as_slice()
    } else {
        exclude
    };
    Scanner::new().scan_filtered(root, include, exclude)
}

/// Persist the command's JSON payload when `save_report` is on. A failed
/// save is a warning; the command's own result already reached the user.
pub fn maybe_save_report<T: Serialize>(config: &Config, command: &str, data: &T) {
    if !config.save_report {
        return;
    }

    let path = reporter::report_path(&config.report_file, command);
    match reporter::save_report(&path, data) {
        Ok(()) => println!("report saved to {}", path.display()),
        Err(err) => warn!("failed to save report: {err:#}"),
    }
}
