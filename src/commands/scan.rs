//! `reposense scan` - discover repositories under a root.

use anyhow::Result;
use std::path::PathBuf;

use super::{maybe_save_report, resolve_root, scan_fleet};
use crate::config::Config;
use crate::reporter::Reporter;

pub fn run(
    config: &Config,
    path: Option<PathBuf>,
    include: &[String],
    exclude: &[String],
) -> Result<()> {
    let root = resolve_root(path)?;
    let repositories = scan_fleet(config, &root, include, exclude)?;

    let reporter = Reporter::new(config.output_format, config.verbose);
    reporter.report_scan(&repositories)?;

    maybe_save_report(config, "scan", &repositories);
    Ok(())
}
