use crate::config::LlmConfig;
use crate::core::error::{SynthesisError, SynthesisResult};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Ollama,
    Gemini,
}

impl Provider {
    pub const ALL: [Provider; 4] = [Self::OpenAi, Self::Anthropic, Self::Ollama, Self::Gemini];

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::Gemini => "gemini",
        }
    }

    /// Environment variable holding the API key; the local Ollama server needs none.
    pub fn key_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Ollama => None,
        }
    }

    pub fn model_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_MODEL",
            Self::Anthropic => "ANTHROPIC_MODEL",
            Self::Ollama => "OLLAMA_MODEL",
            Self::Gemini => "GEMINI_MODEL",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::Ollama => "llama3",
            Self::Gemini => "gemini-2.5-flash-lite",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "chatgpt" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(SynthesisError::InvalidRequest(format!(
                "unknown LLM provider '{}'; supported: openai, anthropic, ollama, gemini",
                other
            ))),
        }
    }
}

/// Per-call provider settings; unset fields fall back to [`LlmConfig`].
#[derive(Debug, Clone, Default)]
pub struct ProviderParams {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

// ============================================================================
// RESPONSE SHAPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

// ============================================================================
// CALLS
// ============================================================================

/// Sends the system and user prompts to `provider` and returns the raw reply text.
pub fn complete(
    provider: Provider,
    system_prompt: &str,
    user_prompt: &str,
    params: &ProviderParams,
    config: &LlmConfig,
) -> SynthesisResult<String> {
    let key = config.api_key(provider, params.api_key.as_deref())?;
    let model = config.model(provider, params.model.as_deref());
    let error = |detail: String| SynthesisError::ProviderError {
        provider: provider.to_string(),
        detail,
    };

    let client = Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| error(e.to_string()))?;
    log::debug!("asking {} ({}) for structure parameters", provider, model);

    let text = match provider {
        Provider::OpenAi => {
            let request = client.post(OPENAI_URL).bearer_auth(key.unwrap_or_default()).json(&json!({
                "model": model,
                "temperature": TEMPERATURE,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_prompt},
                ],
            }));
            let reply: OpenAiResponse = send(provider, config, request)?;
            reply.choices.into_iter().next().and_then(|c| c.message.content)
        }
        Provider::Anthropic => {
            let request = client
                .post(ANTHROPIC_URL)
                .header("x-api-key", key.unwrap_or_default())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": model,
                    "max_tokens": MAX_TOKENS,
                    "system": system_prompt,
                    "messages": [{"role": "user", "content": user_prompt}],
                }));
            let reply: AnthropicResponse = send(provider, config, request)?;
            reply.content.into_iter().find_map(|b| b.text)
        }
        Provider::Ollama => {
            let base = params.base_url.as_deref().unwrap_or(&config.ollama_base_url);
            let request = client.post(format!("{}/api/chat", base.trim_end_matches('/'))).json(&json!({
                "model": model,
                "stream": false,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_prompt},
                ],
            }));
            let reply: OllamaResponse = send(provider, config, request)?;
            reply.message.content
        }
        Provider::Gemini => {
            let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, model);
            let request = client
                .post(url)
                .header("x-goog-api-key", key.unwrap_or_default())
                .json(&json!({
                    "systemInstruction": {"parts": [{"text": system_prompt}]},
                    "contents": [{"role": "user", "parts": [{"text": user_prompt}]}],
                    "generationConfig": {"temperature": TEMPERATURE},
                }));
            let reply: GeminiResponse = send(provider, config, request)?;
            reply
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
        }
    };

    text.filter(|t| !t.trim().is_empty())
        .ok_or_else(|| error("reply contained no text".into()))
}

fn send<T: DeserializeOwned>(provider: Provider, config: &LlmConfig, request: RequestBuilder) -> SynthesisResult<T> {
    let error = |detail: String| SynthesisError::ProviderError {
        provider: provider.to_string(),
        detail,
    };

    let response = request.send().map_err(|e| {
        if e.is_timeout() {
            SynthesisError::Timeout {
                service: provider.to_string(),
                seconds: config.timeout.as_secs(),
            }
        } else {
            error(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(error(format!("HTTP {}: {}", status.as_u16(), body.trim())));
    }
    response.json::<T>().map_err(|e| error(format!("unexpected response shape: {}", e)))
}
