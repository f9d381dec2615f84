//! User configuration.
//!
//! An immutable record loaded once at startup from `~/.reposense.toml`,
//! overridden by CLI flags, then validated. Components receive it (or the
//! pieces they need) at construction; nothing reads it globally.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::paths;
use crate::reporter::ReportFormat;

/// Default worker count when unset or out of range.
pub const DEFAULT_WORKERS: usize = 10;
/// Hard ceiling on concurrent workers.
pub const MAX_WORKERS: usize = 50;
/// Default per-task subprocess deadline.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default LLM call deadline.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Fleet execution
    pub workers: usize,
    pub timeout_secs: u64,
    pub verbose: bool,
    pub dry_run: bool,
    pub output_format: ReportFormat,

    // Repository filtering
    pub include: Vec<String>,
    pub exclude: Vec<String>,

    // List sorting
    pub sort_by_time: bool,
    pub reverse: bool,

    // Description generation
    pub enable_llm: bool,
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_language: String,
    pub llm_timeout_secs: u64,

    // Report persistence
    pub save_report: bool,
    pub report_file: String,

    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            verbose: false,
            dry_run: false,
            output_format: ReportFormat::Text,
            include: Vec::new(),
            exclude: Vec::new(),
            sort_by_time: false,
            reverse: false,
            enable_llm: true,
            llm_provider: "gemini".to_string(),
            llm_model: "gemini-2.5-flash".to_string(),
            llm_api_key: String::new(),
            llm_base_url: String::new(),
            llm_language: "zh".to_string(),
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            save_report: false,
            report_file: String::new(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `~/.reposense.toml`, falling back to defaults
    /// for anything missing. A missing file is not an error; a malformed one
    /// is, so a typo does not silently revert the whole config.
    pub fn load() -> Result<Self> {
        let path = paths::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut cfg: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        cfg.validate();
        Ok(cfg)
    }

    /// Persist to `~/.reposense.toml`.
    pub fn save(&self) -> Result<()> {
        let path = paths::config_path();
        let raw = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(&path, raw)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Clamp out-of-range values back to usable defaults.
    pub fn validate(&mut self) {
        if self.workers == 0 {
            self.workers = DEFAULT_WORKERS;
        }
        if self.workers > MAX_WORKERS {
            self.workers = MAX_WORKERS;
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        if self.llm_timeout_secs == 0 {
            self.llm_timeout_secs = DEFAULT_LLM_TIMEOUT_SECS;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Resolve the LLM API key: explicit config first, then the provider's
    /// environment variable, then the generic `LLM_API_KEY`. The key is
    /// passed through to the HTTP client, never interpreted.
    pub fn resolve_llm_api_key(&self) -> String {
        if !self.llm_api_key.is_empty() {
            return self.llm_api_key.clone();
        }

        let provider_var = match self.llm_provider.as_str() {
            "openai" | "openai-compatible" => "OPENAI_API_KEY",
            "gemini" => "GEMINI_API_KEY",
            "claude" => "CLAUDE_API_KEY",
            _ => "",
        };

        if !provider_var.is_empty() {
            if let Ok(key) = std::env::var(provider_var) {
                if !key.is_empty() {
                    return key;
                }
            }
        }

        std::env::var("LLM_API_KEY").unwrap_or_default()
    }

    /// Apply a `config set key value` assignment.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "workers" => self.workers = value.parse().context("workers must be a number")?,
            "timeout_secs" => {
                self.timeout_secs = value.parse().context("timeout_secs must be a number")?
            }
            "verbose" => self.verbose = value.parse().context("verbose must be true/false")?,
            "dry_run" => self.dry_run = value.parse().context("dry_run must be true/false")?,
            "output_format" => self.output_format = value.parse()?,
            "sort_by_time" => {
                self.sort_by_time = value.parse().context("sort_by_time must be true/false")?
            }
            "reverse" => self.reverse = value.parse().context("reverse must be true/false")?,
            "enable_llm" => {
                self.enable_llm = value.parse().context("enable_llm must be true/false")?
            }
            "llm_provider" => self.llm_provider = value.to_string(),
            "llm_model" => self.llm_model = value.to_string(),
            "llm_api_key" => self.llm_api_key = value.to_string(),
            "llm_base_url" => self.llm_base_url = value.to_string(),
            "llm_language" => self.llm_language = value.to_string(),
            "llm_timeout_secs" => {
                self.llm_timeout_secs = value.parse().context("llm_timeout_secs must be a number")?
            }
            "save_report" => {
                self.save_report = value.parse().context("save_report must be true/false")?
            }
            "report_file" => self.report_file = value.to_string(),
            "log_level" => self.log_level = value.to_string(),
            _ => anyhow::bail!("unknown config key: {}", key),
        }
        self.validate();
        Ok(())
    }
}
