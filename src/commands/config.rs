//! `reposense config` - show and edit persisted settings.

use anyhow::Result;

use crate::config::Config;
use crate::paths;

#[derive(Debug, Clone)]
pub enum ConfigCommand {
    Show,
    Set { key: String, value: String },
    Path,
}

pub fn run(config: &Config, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            // The api key is persisted but never echoed.
            let mut shown = config.clone();
            if !shown.llm_api_key.is_empty() {
                shown.llm_api_key = "<set>".to_string();
            }
            print!("{}", toml::to_string_pretty(&shown)?);
            Ok(())
        }
        ConfigCommand::Set { key, value } => {
            let mut updated = Config::load()?;
            updated.set(&key, &value)?;
            updated.save()?;
            println!("{key} = {value}");
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", paths::config_path().display());
            Ok(())
        }
    }
}
