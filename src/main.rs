use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use reposense::commands::{self, analyze, cache, list, scan, status, update};
use reposense::config::Config;
use reposense::logging;
use reposense::updater::PullStrategy;

#[derive(Parser)]
#[command(
    name = "reposense",
    version = env!("CARGO_PKG_VERSION"),
    about = "Batch management for fleets of local Git repositories",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output and raw errors
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, table, json)
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Save the command's JSON report to a file
    #[arg(long, global = true)]
    save_report: bool,

    /// Report file path (defaults to reposense-<command>-<timestamp>.json)
    #[arg(long, global = true)]
    report_file: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover Git repositories under a directory
    Scan {
        /// Root directory (defaults to the current directory)
        path: Option<PathBuf>,

        /// Only include repositories matching these substrings
        #[arg(long)]
        include: Vec<String>,

        /// Exclude repositories matching these substrings
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Pull every repository under a directory
    Update {
        path: Option<PathBuf>,

        #[arg(long)]
        include: Vec<String>,

        #[arg(long)]
        exclude: Vec<String>,

        /// Concurrent workers (clamped to 1..=50)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Per-repository timeout in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Pull strategy (ff-only, merge, rebase)
        #[arg(short, long, default_value = "ff-only")]
        strategy: String,

        /// Report what would be updated without running git
        #[arg(long)]
        dry_run: bool,
    },

    /// Show branch, dirty state, and remote divergence for each repository
    Status {
        path: Option<PathBuf>,

        #[arg(long)]
        include: Vec<String>,

        #[arg(long)]
        exclude: Vec<String>,
    },

    /// List repositories with generated descriptions
    List {
        path: Option<PathBuf>,

        #[arg(long)]
        include: Vec<String>,

        #[arg(long)]
        exclude: Vec<String>,

        /// Sort by last activity instead of name
        #[arg(long)]
        sort_by_time: bool,

        /// Reverse the sort order
        #[arg(long)]
        reverse: bool,

        /// Skip LLM description generation
        #[arg(long)]
        no_llm: bool,

        /// Bypass the description cache entirely
        #[arg(long)]
        no_cache: bool,

        /// Regenerate descriptions even for cached READMEs
        #[arg(long)]
        force_refresh: bool,
    },

    /// Extract language, framework, license, and dependency metadata
    Analyze {
        path: Option<PathBuf>,

        #[arg(long)]
        include: Vec<String>,

        #[arg(long)]
        exclude: Vec<String>,

        /// Bypass the metadata cache
        #[arg(long)]
        no_cache: bool,

        /// Re-analyze even when the structure hash matches
        #[arg(long)]
        force_refresh: bool,
    },

    /// Inspect or maintain the cache database
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Show or edit persisted configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show hit/miss counters and totals
    Stats,
    /// Delete every cached row and reset counters
    Clear,
    /// Drop the cached rows for one repository path
    Refresh { path: String },
    /// Print the database file location
    Path,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Set one configuration key
    Set { key: String, value: String },
    /// Print the config file location
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    config.verbose = config.verbose || cli.verbose;
    if let Some(format) = &cli.format {
        config.output_format = format.parse()?;
    }
    config.save_report = config.save_report || cli.save_report;
    if let Some(report_file) = cli.report_file {
        config.report_file = report_file;
    }
    config.validate();

    logging::init(&config.log_level, config.verbose)?;

    match cli.command {
        Commands::Scan {
            path,
            include,
            exclude,
        } => scan::run(&config, path, &include, &exclude),

        Commands::Update {
            path,
            include,
            exclude,
            workers,
            timeout,
            strategy,
            dry_run,
        } => {
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(timeout) = timeout {
                config.timeout_secs = timeout;
            }
            config.validate();

            let strategy: PullStrategy = strategy.parse()?;
            update::run(
                &config,
                update::UpdateArgs {
                    path,
                    include,
                    exclude,
                    strategy,
                    dry_run,
                },
            )
        }

        Commands::Status {
            path,
            include,
            exclude,
        } => status::run(&config, path, &include, &exclude),

        Commands::List {
            path,
            include,
            exclude,
            sort_by_time,
            reverse,
            no_llm,
            no_cache,
            force_refresh,
        } => list::run(
            &config,
            list::ListArgs {
                path,
                include,
                exclude,
                sort_by_time,
                reverse,
                no_llm,
                no_cache,
                force_refresh,
            },
        ),

        Commands::Analyze {
            path,
            include,
            exclude,
            no_cache,
            force_refresh,
        } => analyze::run(
            &config,
            analyze::AnalyzeArgs {
                path,
                include,
                exclude,
                no_cache,
                force_refresh,
            },
        ),

        Commands::Cache { command } => {
            let command = match command {
                CacheCommands::Stats => cache::CacheCommand::Stats,
                CacheCommands::Clear => cache::CacheCommand::Clear,
                CacheCommands::Refresh { path } => cache::CacheCommand::Refresh { path },
                CacheCommands::Path => cache::CacheCommand::Path,
            };
            cache::run(&config, command)
        }

        Commands::Config { command } => {
            let command = match command {
                ConfigCommands::Show => commands::config::ConfigCommand::Show,
                ConfigCommands::Set { key, value } => {
                    commands::config::ConfigCommand::Set { key, value }
                }
                ConfigCommands::Path => commands::config::ConfigCommand::Path,
            };
            commands::config::run(&config, command)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
