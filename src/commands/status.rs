//! `reposense status` - collect working-tree state across the fleet.

use anyhow::Result;
use std::path::PathBuf;

use super::{maybe_save_report, resolve_root, scan_fleet};
use crate::config::Config;
use crate::git::{CancelToken, GitRunner};
use crate::git::status::StatusCollector;
use crate::reporter::Reporter;

pub fn run(
    config: &Config,
    path: Option<PathBuf>,
    include: &[String],
    exclude: &[String],
) -> Result<()> {
    let root = resolve_root(path)?;
    let repositories = scan_fleet(config, &root, include, exclude)?;

    let runner = GitRunner::new(config.timeout(), true, CancelToken::new());
    let collector = StatusCollector::new(runner, config.timeout());
    let statuses = collector.collect_all(&repositories);

    let reporter = Reporter::new(config.output_format, config.verbose);
    reporter.report_status(&statuses)?;

    maybe_save_report(config, "status", &statuses);
    Ok(())
}
