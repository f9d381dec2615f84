//! HTTP implementations of the description capability.
//!
//! One blocking client covering the OpenAI chat-completions shape (OpenAI,
//! OpenAI-compatible, Ollama), Gemini, and Claude. The request deadline is
//! fixed when the client is built.

use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{postprocess, prompts, DescriptionGenerator, Provider};

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    text: String,
}

pub struct HttpGenerator {
    provider: Provider,
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpGenerator {
    pub fn new(
        provider: Provider,
        model: &str,
        api_key: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        if provider.requires_api_key() && api_key.is_empty() {
            bail!("{} provider requires an API key", provider.as_str());
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reposense/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            provider,
            model: model.to_string(),
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            client,
        })
    }

    fn base_url_or(&self, default: &str) -> String {
        if self.base_url.is_empty() {
            default.to_string()
        } else {
            self.base_url.trim_end_matches('/').to_string()
        }
    }

    fn chat_openai(&self, system: String, user: String) -> Result<String> {
        let base = match self.provider {
            Provider::Ollama => self.base_url_or("http://localhost:11434/v1"),
            _ => self.base_url_or("https://api.openai.com/v1"),
        };

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: Some(0.3),
            max_tokens: Some(500),
        };

        let mut builder = self
            .client
            .post(format!("{base}/chat/completions"))
            .json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().context("LLM API request failed")?;
        let status = response.status();
        if !status.is_success() {
            bail!("LLM API returned {}: {}", status, response.text().unwrap_or_default());
        }

        let parsed: ChatResponse = response.json().context("failed to decode LLM response")?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .context("LLM response contained no choices")?;
        Ok(choice.message.content)
    }

    fn chat_gemini(&self, system: String, user: String) -> Result<String> {
        let base = self.base_url_or("https://generativelanguage.googleapis.com/v1beta");
        let request = GeminiRequest {
            contents: vec![
                GeminiContent {
                    role: "user",
                    parts: vec![GeminiPart { text: system }],
                },
                GeminiContent {
                    role: "user",
                    parts: vec![GeminiPart { text: user }],
                },
            ],
        };

        let url = format!("{base}/models/{}:generateContent", self.model);
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .context("LLM API request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("LLM API returned {}: {}", status, response.text().unwrap_or_default());
        }

        let parsed: GeminiResponse = response.json().context("failed to decode LLM response")?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .context("LLM response contained no candidates")?;
        Ok(text.text)
    }

    fn chat_claude(&self, system: String, user: String) -> Result<String> {
        let base = self.base_url_or("https://api.anthropic.com/v1");
        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: 500,
            system,
            messages: vec![ChatMessage {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .client
            .post(format!("{base}/messages"))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .context("LLM API request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("LLM API returned {}: {}", status, response.text().unwrap_or_default());
        }

        let parsed: ClaudeResponse = response.json().context("failed to decode LLM response")?;
        let content = parsed
            .content
            .into_iter()
            .next()
            .context("LLM response contained no content")?;
        Ok(content.text)
    }
}

impl DescriptionGenerator for HttpGenerator {
    fn generate_description(&self, readme: &str, language: &str) -> Result<String> {
        debug!(
            "generating description via {} ({} chars, language {})",
            self.provider.as_str(),
            readme.len(),
            language
        );

        let (system, user) = prompts(readme, language);
        let raw = match self.provider {
            Provider::OpenAi | Provider::OpenAiCompatible | Provider::Ollama => {
                self.chat_openai(system, user)?
            }
            Provider::Gemini => self.chat_gemini(system, user)?,
            Provider::Claude => self.chat_claude(system, user)?,
        };

        Ok(postprocess(&raw))
    }

    fn provider_name(&self) -> &str {
        self.provider.as_str()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
