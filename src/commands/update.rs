//! `reposense update` - fetch-and-merge across the fleet.

use anyhow::Result;
use std::path::PathBuf;

use super::{maybe_save_report, resolve_root, scan_fleet};
use crate::config::Config;
use crate::reporter::Reporter;
use crate::updater::{PullStrategy, UpdateOptions, Updater};

pub struct UpdateArgs {
    pub path: Option<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub strategy: PullStrategy,
    pub dry_run: bool,
}

pub fn run(config: &Config, args: UpdateArgs) -> Result<()> {
    let root = resolve_root(args.path)?;
    let repositories = scan_fleet(config, &root, &args.include, &args.exclude)?;

    let reporter = Reporter::new(config.output_format, config.verbose);
    if repositories.is_empty() {
        println!("no repositories found under {}", root.display());
        return Ok(());
    }

    let mut options = UpdateOptions::from_config(config, args.strategy);
    options.dry_run = options.dry_run || args.dry_run;

    let updater = Updater::new(options);
    let progress = reporter.update_progress(repositories.len() as u64);

    let results = updater.update_all(&repositories, |result| {
        progress.set_message(result.repository.name.clone());
        progress.inc(1);
    });
    progress.finish_and_clear();

    reporter.report_update(&results)?;

    maybe_save_report(config, "update", &results);
    Ok(())
}
