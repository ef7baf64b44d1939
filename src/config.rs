//! Runtime configuration for remote structure sources and LLM providers.
//!
//! Values come from explicit setters first, then the process environment,
//! then built-in defaults. `from_lookup` takes any variable source so tests
//! never have to touch the real environment.

use crate::core::error::{SynthesisError, SynthesisResult};
use crate::llm::providers::Provider;
use std::env;
use std::time::Duration;

pub const MP_API_KEY_VAR: &str = "MP_API_KEY";
pub const ICSD_USERNAME_VAR: &str = "ICSD_USERNAME";
pub const ICSD_PASSWORD_VAR: &str = "ICSD_PASSWORD";
pub const HTTP_TIMEOUT_VAR: &str = "CHATMAT_HTTP_TIMEOUT_SECS";
pub const OLLAMA_BASE_URL_VAR: &str = "OLLAMA_BASE_URL";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const MP_BASE_URL: &str = "https://api.materialsproject.org";
const COD_BASE_URL: &str = "https://www.crystallography.net/cod";
const ICSD_BASE_URL: &str = "https://icsd.fiz-karlsruhe.de/ws";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Reads a variable, treating empty values as unset.
fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn timeout_from<F: Fn(&str) -> Option<String>>(lookup: &F) -> Duration {
    let secs = non_empty(lookup(HTTP_TIMEOUT_VAR))
        .and_then(|v| match v.parse::<u64>() {
            Ok(secs) if secs > 0 => Some(secs),
            _ => {
                log::warn!("ignoring {}='{}'; using {} s", HTTP_TIMEOUT_VAR, v, DEFAULT_TIMEOUT_SECS);
                None
            }
        })
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

// ============================================================================
// REMOTE SOURCES
// ============================================================================

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub mp_api_key: Option<String>,
    pub icsd_username: Option<String>,
    pub icsd_password: Option<String>,
    pub mp_base_url: String,
    pub cod_base_url: String,
    pub icsd_base_url: String,
    pub timeout: Duration,
    /// Attempts per request when the server answers 5xx or the connection drops.
    pub max_retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mp_api_key: None,
            icsd_username: None,
            icsd_password: None,
            mp_base_url: MP_BASE_URL.into(),
            cod_base_url: COD_BASE_URL.into(),
            icsd_base_url: ICSD_BASE_URL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        Self {
            mp_api_key: non_empty(lookup(MP_API_KEY_VAR)),
            icsd_username: non_empty(lookup(ICSD_USERNAME_VAR)),
            icsd_password: non_empty(lookup(ICSD_PASSWORD_VAR)),
            timeout: timeout_from(&lookup),
            ..Self::default()
        }
    }

    /// Explicit key if given, otherwise the configured one.
    pub fn mp_api_key(&self, explicit: Option<&str>) -> SynthesisResult<String> {
        non_empty(explicit.map(str::to_string))
            .or_else(|| self.mp_api_key.clone())
            .ok_or_else(|| SynthesisError::MissingCredentials {
                service: "Materials Project".into(),
                hint: format!("set {} or pass an API key", MP_API_KEY_VAR),
            })
    }

    /// Explicit username/password if given, otherwise the configured pair.
    pub fn icsd_credentials(&self, username: Option<&str>, password: Option<&str>) -> SynthesisResult<(String, String)> {
        let username = non_empty(username.map(str::to_string)).or_else(|| self.icsd_username.clone());
        let password = non_empty(password.map(str::to_string)).or_else(|| self.icsd_password.clone());
        match (username, password) {
            (Some(u), Some(p)) => Ok((u, p)),
            _ => Err(SynthesisError::MissingCredentials {
                service: "ICSD".into(),
                hint: format!("set {} and {} or pass a username and password", ICSD_USERNAME_VAR, ICSD_PASSWORD_VAR),
            }),
        }
    }
}

// ============================================================================
// LLM PROVIDERS
// ============================================================================

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub anthropic_model: Option<String>,
    pub ollama_model: Option<String>,
    pub gemini_model: Option<String>,
    pub ollama_base_url: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_api_key: None,
            openai_model: None,
            anthropic_model: None,
            ollama_model: None,
            gemini_model: None,
            ollama_base_url: OLLAMA_BASE_URL.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let var = |key: &str| non_empty(lookup(key));
        Self {
            openai_api_key: Provider::OpenAi.key_var().and_then(|k| var(k)),
            anthropic_api_key: Provider::Anthropic.key_var().and_then(|k| var(k)),
            gemini_api_key: Provider::Gemini.key_var().and_then(|k| var(k)),
            openai_model: var(Provider::OpenAi.model_var()),
            anthropic_model: var(Provider::Anthropic.model_var()),
            ollama_model: var(Provider::Ollama.model_var()),
            gemini_model: var(Provider::Gemini.model_var()),
            ollama_base_url: var(OLLAMA_BASE_URL_VAR).unwrap_or_else(|| OLLAMA_BASE_URL.into()),
            timeout: timeout_from(&lookup),
        }
    }

    fn configured_key(&self, provider: Provider) -> Option<&String> {
        match provider {
            Provider::OpenAi => self.openai_api_key.as_ref(),
            Provider::Anthropic => self.anthropic_api_key.as_ref(),
            Provider::Gemini => self.gemini_api_key.as_ref(),
            Provider::Ollama => None,
        }
    }

    /// Key for `provider`: explicit value, then configuration. Ollama needs none.
    pub fn api_key(&self, provider: Provider, explicit: Option<&str>) -> SynthesisResult<Option<String>> {
        let Some(var) = provider.key_var() else {
            return Ok(None);
        };
        non_empty(explicit.map(str::to_string))
            .or_else(|| self.configured_key(provider).cloned())
            .map(Some)
            .ok_or_else(|| SynthesisError::MissingCredentials {
                service: provider.to_string(),
                hint: format!("set {} or pass an API key", var),
            })
    }

    /// Model for `provider`: explicit value, then configuration, then the provider default.
    pub fn model(&self, provider: Provider, explicit: Option<&str>) -> String {
        let configured = match provider {
            Provider::OpenAi => self.openai_model.as_ref(),
            Provider::Anthropic => self.anthropic_model.as_ref(),
            Provider::Ollama => self.ollama_model.as_ref(),
            Provider::Gemini => self.gemini_model.as_ref(),
        };
        non_empty(explicit.map(str::to_string))
            .or_else(|| configured.cloned())
            .unwrap_or_else(|| provider.default_model().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn explicit_key_beats_environment() {
        let config = FetchConfig::from_lookup(lookup(&[(MP_API_KEY_VAR, "from-env")]));
        assert_eq!(config.mp_api_key(Some("explicit")).unwrap(), "explicit");
        assert_eq!(config.mp_api_key(None).unwrap(), "from-env");
        assert_eq!(config.mp_api_key(Some("  ")).unwrap(), "from-env");
    }

    #[test]
    fn missing_icsd_password_is_a_credentials_error() {
        let config = FetchConfig::from_lookup(lookup(&[(ICSD_USERNAME_VAR, "alice")]));
        let err = config.icsd_credentials(None, None).unwrap_err();
        assert!(matches!(err, SynthesisError::MissingCredentials { .. }));
        assert!(config.icsd_credentials(None, Some("secret")).is_ok());
    }

    #[test]
    fn timeout_falls_back_on_garbage() {
        let config = FetchConfig::from_lookup(lookup(&[(HTTP_TIMEOUT_VAR, "soon")]));
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let config = FetchConfig::from_lookup(lookup(&[(HTTP_TIMEOUT_VAR, "5")]));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn llm_models_and_keys() {
        let config = LlmConfig::from_lookup(lookup(&[("OPENAI_MODEL", "gpt-4o"), ("GEMINI_API_KEY", "g")]));
        assert_eq!(config.model(Provider::OpenAi, None), "gpt-4o");
        assert_eq!(config.model(Provider::OpenAi, Some("o3")), "o3");
        assert_eq!(config.model(Provider::Anthropic, None), "claude-3-haiku-20240307");
        assert_eq!(config.api_key(Provider::Gemini, None).unwrap().as_deref(), Some("g"));
        assert_eq!(config.api_key(Provider::Ollama, None).unwrap(), None);
        assert!(matches!(
            config.api_key(Provider::Anthropic, None),
            Err(SynthesisError::MissingCredentials { .. })
        ));
    }
}
