//! `reposense list` - repositories with generated descriptions.

use anyhow::Result;
use log::warn;
use std::path::PathBuf;

use super::{maybe_save_report, resolve_root, scan_fleet};
use crate::cache::{Manager, Store};
use crate::config::Config;
use crate::llm::{DescriptionGenerator, HttpGenerator};
use crate::reporter::Reporter;
use crate::scanner::{repo_activity_time, RepositoryWithDescription};
use crate::{paths, readme};

pub struct ListArgs {
    pub path: Option<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub sort_by_time: bool,
    pub reverse: bool,
    pub no_llm: bool,
    pub no_cache: bool,
    pub force_refresh: bool,
}

pub fn run(config: &Config, args: ListArgs) -> Result<()> {
    let root = resolve_root(args.path)?;
    let repositories = scan_fleet(config, &root, &args.include, &args.exclude)?;

    // A broken store is fatal before any repository is touched; a missing
    // LLM key just downgrades to fallback descriptions.
    let store = if args.no_cache {
        None
    } else {
        Some(Store::open(&paths::db_path())?)
    };
    let generator = if args.no_llm || !config.enable_llm {
        None
    } else {
        build_generator(config)
    };
    let manager = Manager::new(store, generator, &config.llm_language, args.force_refresh);

    let mut described = Vec::with_capacity(repositories.len());
    for repo in repositories {
        let readme_content = readme::read_normalized(&repo.path);
        let description = match manager.describe(&repo.path, &repo.name, &readme_content) {
            Ok(description) if !description.is_empty() => description,
            Ok(_) => readme::fallback_description(&readme_content),
            Err(err) => {
                warn!("description generation failed for {}: {err:#}", repo.name);
                readme::fallback_description(&readme_content)
            }
        };

        let last_activity = repo_activity_time(&repo.path);
        described.push(RepositoryWithDescription {
            repository: repo,
            description,
            last_activity,
        });
    }

    let reporter = Reporter::new(config.output_format, config.verbose);
    let sort_by_time = args.sort_by_time || config.sort_by_time;
    let reverse = args.reverse || config.reverse;
    reporter.report_list(&described, sort_by_time, reverse)?;

    maybe_save_report(config, "list", &described);
    Ok(())
}

fn build_generator(config: &Config) -> Option<Box<dyn DescriptionGenerator>> {
    let provider = match config.llm_provider.parse() {
        Ok(provider) => provider,
        Err(err) => {
            warn!("{err:#}; descriptions fall back to README extraction");
            return None;
        }
    };

    match HttpGenerator::new(
        provider,
        &config.llm_model,
        &config.resolve_llm_api_key(),
        &config.llm_base_url,
        config.llm_timeout(),
    ) {
        Ok(generator) => Some(Box::new(generator)),
        Err(err) => {
            warn!("LLM disabled: {err:#}");
            None
        }
    }
}
