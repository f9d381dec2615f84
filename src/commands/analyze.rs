//! `reposense analyze` - metadata extraction across the fleet.

use anyhow::Result;
use colored::Colorize;
use log::warn;
use serde::Serialize;
use std::path::PathBuf;

use super::{maybe_save_report, resolve_root, scan_fleet};
use crate::analyzer::{MetadataService, ProjectMetadata};
use crate::cache::metadata::MetadataCache;
use crate::cache::Store;
use crate::config::Config;
use crate::paths;
use crate::reporter::{print_json, ReportFormat};

pub struct AnalyzeArgs {
    pub path: Option<PathBuf>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub no_cache: bool,
    pub force_refresh: bool,
}

#[derive(Serialize)]
struct AnalyzedRepo {
    name: String,
    path: PathBuf,
    #[serde(flatten)]
    metadata: ProjectMetadata,
}

pub fn run(config: &Config, args: AnalyzeArgs) -> Result<()> {
    let root = resolve_root(args.path)?;
    let repositories = scan_fleet(config, &root, &args.include, &args.exclude)?;

    let cache = if args.no_cache {
        None
    } else {
        Some(MetadataCache::new(Store::open(&paths::db_path())?))
    };
    let service = MetadataService::new(cache, args.force_refresh);

    let mut analyzed = Vec::new();
    for repo in repositories {
        match service.analyze_repository(&repo) {
            Ok(metadata) => analyzed.push(AnalyzedRepo {
                name: repo.name,
                path: repo.path,
                metadata,
            }),
            Err(err) => warn!("skipping {}: {err:#}", repo.name),
        }
    }

    if config.output_format == ReportFormat::Json {
        print_json(&analyzed)?;
        maybe_save_report(config, "analyze", &analyzed);
        return Ok(());
    }

    for repo in &analyzed {
        let meta = &repo.metadata;
        println!(
            "{}  {} · {} files · {} lines",
            repo.name.bold(),
            if meta.main_language.is_empty() {
                "unknown"
            } else {
                meta.main_language.as_str()
            },
            meta.file_count,
            meta.total_lines_of_code,
        );

        if config.verbose {
            for lang in &meta.languages {
                println!("    {:<12} {:>5.1}%  {} lines", lang.name, lang.percentage, lang.lines_of_code);
            }
            for framework in &meta.frameworks {
                println!("    framework: {} ({})", framework.name, framework.category);
            }
            for license in &meta.licenses {
                println!("    license: {}", license.name);
            }
        }
    }
    println!("\nanalyzed {} repositories", analyzed.len());

    maybe_save_report(config, "analyze", &analyzed);
    Ok(())
}
