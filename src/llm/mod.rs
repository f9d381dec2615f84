//! Description generation.
//!
//! The engine sees exactly one capability: turn normalized README text into
//! a one-line description in a requested language. [`DescriptionGenerator`]
//! is the only polymorphic seam in the crate; the concrete provider is
//! chosen when the client is constructed, never dispatched inside the core.

mod http;

pub use http::HttpGenerator;

use anyhow::Result;
use std::str::FromStr;

/// The single LLM capability the engine depends on.
pub trait DescriptionGenerator: Send + Sync {
    /// Produce a short single-line description of `readme` in `language`.
    fn generate_description(&self, readme: &str, language: &str) -> Result<String>;

    /// Provider name, recorded alongside cached descriptions.
    fn provider_name(&self) -> &str;

    /// Model name, recorded alongside cached descriptions.
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    OpenAiCompatible,
    Gemini,
    Claude,
    Ollama,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::OpenAiCompatible => "openai-compatible",
            Provider::Gemini => "gemini",
            Provider::Claude => "claude",
            Provider::Ollama => "ollama",
        }
    }

    /// Whether the provider requires an API key at construction.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(Provider::OpenAi),
            "openai-compatible" => Ok(Provider::OpenAiCompatible),
            "gemini" => Ok(Provider::Gemini),
            "claude" => Ok(Provider::Claude),
            "ollama" => Ok(Provider::Ollama),
            other => anyhow::bail!("unsupported LLM provider: {other}"),
        }
    }
}

/// System and user prompts templated by output language. Unknown languages
/// fall back to Chinese, matching the default configuration.
pub fn prompts(readme: &str, language: &str) -> (String, String) {
    match language {
        "en" => (
            "You are a helpful assistant that summarizes project README files. \
             Generate a concise, single-line description (max 80 characters) that \
             captures the essence of the project. Focus on what the project does, \
             not how to use it."
                .to_string(),
            format!("Summarize this project in English (max 80 chars):\n\n{readme}"),
        ),
        "ja" => (
            "あなたはプロジェクトのREADMEファイルを要約するアシスタントです。\
             プロジェクトの本質を捉えた簡潔な一行の説明（最大80文字）を生成してください。\
             使い方ではなく、プロジェクトが何をするかに焦点を当ててください。"
                .to_string(),
            format!("このプロジェクトを日本語で要約してください（最大80文字）：\n\n{readme}"),
        ),
        _ => (
            "你是一个专门总结项目README文件的助手。请生成一个简洁的单行描述（最多80个字符），\
             捕捉项目的核心功能。专注于项目的作用，而不是如何使用。尽量避免技术术语。"
                .to_string(),
            format!("用中文总结这个项目（最多80字符）：\n\n{readme}"),
        ),
    }
}

/// Trim whitespace and surrounding quotes, then cap at 100 chars.
pub fn postprocess(raw: &str) -> String {
    let cleaned = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    crate::updater::classify::truncate(cleaned, 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("gemini".parse::<Provider>().unwrap(), Provider::Gemini);
        assert_eq!("ollama".parse::<Provider>().unwrap(), Provider::Ollama);
        assert!("cortex".parse::<Provider>().is_err());
    }

    #[test]
    fn test_ollama_needs_no_key() {
        assert!(!Provider::Ollama.requires_api_key());
        assert!(Provider::Claude.requires_api_key());
    }

    #[test]
    fn test_prompts_fall_back_to_chinese() {
        let (_, user_en) = prompts("readme text", "en");
        assert!(user_en.contains("English"));
        assert!(user_en.contains("readme text"));

        let (sys_default, _) = prompts("x", "ko");
        let (sys_zh, _) = prompts("x", "zh");
        assert_eq!(sys_default, sys_zh);
    }

    #[test]
    fn test_postprocess_strips_quotes_and_caps() {
        assert_eq!(postprocess("  \"A hello project\"  "), "A hello project");
        assert_eq!(postprocess("'quoted'"), "quoted");

        let long = "d".repeat(300);
        let capped = postprocess(&long);
        assert_eq!(capped.chars().count(), 100);
        assert!(capped.ends_with("..."));
    }
}
