//! `reposense cache` - inspect and maintain the description cache.

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;
use crate::cache::Store;
use crate::paths;
use crate::reporter::{print_json, ReportFormat};

#[derive(Debug, Clone)]
pub enum CacheCommand {
    Stats,
    Clear,
    Refresh { path: String },
    Path,
}

pub fn run(config: &Config, command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Path => {
            println!("{}", paths::db_path().display());
            Ok(())
        }
        CacheCommand::Stats => {
            let store = Store::open(&paths::db_path())?;
            let stats = store.stats()?;

            if config.output_format == ReportFormat::Json {
                return print_json(&stats);
            }

            println!("{}", "cache statistics".bold());
            println!("  database:            {}", store.db_path().display());
            println!("  size:                {} bytes", store.db_size().unwrap_or(0));
            println!("  repositories:        {}", stats.total_repositories);
            println!("  cached descriptions: {}", stats.cached_descriptions);
            println!("  cache hits:          {}", stats.cache_hits);
            println!("  cache misses:        {}", stats.cache_misses);
            println!("  LLM API calls:       {}", stats.llm_api_calls);
            println!("  last updated:        {}", stats.last_updated);
            Ok(())
        }
        CacheCommand::Clear => {
            let store = Store::open(&paths::db_path())?;
            store.clear()?;
            println!("cache cleared");
            Ok(())
        }
        CacheCommand::Refresh { path } => {
            let store = Store::open(&paths::db_path())?;
            if store.remove(&path)? {
                println!("removed cache entry for {path}");
            } else {
                println!("no cache entry for {path}");
            }
            Ok(())
        }
    }
}
