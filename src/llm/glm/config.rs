//! GLM adapter configuration

use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;

use crate::core::{AdapterError, AdapterResult};

/// Built-in chat-completions endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.z.ai/api/paas/v4/chat/completions";

/// Environment variable overriding the endpoint
pub const ENDPOINT_ENV: &str = "GLM_BASE_URL";

/// Vendor model used whenever the caller asks for a non-GLM model
pub const DEFAULT_MODEL: &str = "glm-4.7";

/// Prefix every vendor model id carries
pub const MODEL_PREFIX: &str = "glm-";

pub const DEFAULT_USER_AGENT: &str = concat!("glm-content-adapter/", env!("CARGO_PKG_VERSION"));

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Mask an API key for display, keeping the first and last four characters
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Configuration for [`GlmContentGenerator`](super::GlmContentGenerator)
///
/// ```ignore
/// let config = GlmConfig::new("key")
///     .with_clear_thinking(true)
///     .with_header("X-Trace", "abc");
/// ```
#[derive(Clone, Deserialize)]
pub struct GlmConfig {
    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: String,

    /// Endpoint override (full URL, or a base URL ending before `/chat/completions`)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Vendor model substituted for non-GLM model ids
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Ask the vendor to clear reasoning between turns
    #[serde(default)]
    pub clear_thinking: bool,

    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Extra headers added to every request
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl fmt::Debug for GlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlmConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("clear_thinking", &self.clear_thinking)
            .field("user_agent", &self.user_agent)
            .field("extra_headers", &self.extra_headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for GlmConfig {
    fn default() -> Self {
        Self::new("")
    }
}

impl GlmConfig {
    /// Create a configuration with an API key and defaults for everything else
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            default_model: default_model(),
            clear_thinking: false,
            user_agent: default_user_agent(),
            extra_headers: HashMap::new(),
        }
    }

    /// Create from environment variables
    ///
    /// Reads from:
    /// - `GLM_API_KEY` or `ZAI_API_KEY` (required)
    /// - `GLM_MODEL` (optional default vendor model)
    /// - `GLM_CLEAR_THINKING` (optional, `true`/`1`)
    ///
    /// `GLM_BASE_URL` is read at request time, see [`GlmConfig::endpoint`].
    pub fn from_env() -> AdapterResult<Self> {
        let api_key = env::var("GLM_API_KEY")
            .or_else(|_| env::var("ZAI_API_KEY"))
            .map_err(|_| AdapterError::NotConfigured("GLM_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);

        if let Ok(model) = env::var("GLM_MODEL") {
            if !model.trim().is_empty() {
                config.default_model = model;
            }
        }

        if let Ok(flag) = env::var("GLM_CLEAR_THINKING") {
            config.clear_thinking = matches!(flag.trim(), "1" | "true" | "TRUE" | "yes");
        }

        tracing::info!("[GLM] Default model: {}", config.default_model);
        tracing::info!("[GLM] Clear thinking: {}", config.clear_thinking);

        Ok(config)
    }

    /// Set the endpoint override
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the default vendor model
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the clear-thinking flag
    pub fn with_clear_thinking(mut self, clear: bool) -> Self {
        self.clear_thinking = clear;
        self
    }

    /// Set the User-Agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add an extra header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    /// Endpoint for one call: per-call override, then configured override,
    /// then `GLM_BASE_URL`, then the built-in default
    pub fn endpoint(&self, per_call: Option<&str>) -> String {
        let from_env = env::var(ENDPOINT_ENV).ok();
        let explicit = non_blank(per_call).or_else(|| non_blank(self.base_url.as_deref()));
        resolve_endpoint(explicit, from_env.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Pick the endpoint by precedence and make sure it targets chat completions
pub fn resolve_endpoint(explicit: Option<&str>, from_env: Option<&str>) -> String {
    let chosen = explicit
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| from_env.map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or(DEFAULT_ENDPOINT);

    let trimmed = chosen.trim_end_matches('/');
    if trimmed.ends_with(CHAT_COMPLETIONS_PATH) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, CHAT_COMPLETIONS_PATH)
    }
}
