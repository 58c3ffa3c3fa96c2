use crate::assistant::Provider;
use crate::error::{LlmError, Result};
use std::time::Duration;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Settings captured once when an assistant is built.
#[derive(Clone)]
pub struct AssistantConfig {
    pub model: String,
    pub max_tokens: u32,
    /// Credential for the OpenAI-compatible API.
    pub api_key: String,
    pub base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: Option<String>,
    /// `None` leaves requests without a deadline.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field(
                "anthropic_api_key",
                &self.anthropic_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("anthropic_base_url", &self.anthropic_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AssistantConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            api_key: api_key.into(),
            base_url: None,
            anthropic_api_key: None,
            anthropic_base_url: None,
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_anthropic_key(mut self, key: impl Into<String>) -> Self {
        self.anthropic_api_key = Some(key.into());
        self
    }

    pub fn with_anthropic_base_url(mut self, url: impl Into<String>) -> Self {
        self.anthropic_base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn openai_base_url(&self) -> String {
        normalize_base_url(self.base_url.as_deref(), DEFAULT_OPENAI_BASE_URL)
    }

    pub fn anthropic_base_url(&self) -> String {
        normalize_base_url(
            self.anthropic_base_url.as_deref(),
            DEFAULT_ANTHROPIC_BASE_URL,
        )
    }

    pub fn validate(&self, provider: Provider) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(LlmError::InvalidInput("model is required".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(LlmError::InvalidInput(
                "max_tokens must be > 0".to_string(),
            ));
        }
        if provider == Provider::Anthropic
            && self
                .anthropic_api_key
                .as_deref()
                .is_none_or(|k| k.trim().is_empty())
        {
            return Err(LlmError::InvalidInput(
                "anthropic provider requires an anthropic api key".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn http_client(&self) -> reqwest::Client {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build().unwrap_or_else(|e| {
            tracing::warn!(%e, "reqwest client build failed; falling back to default client");
            reqwest::Client::new()
        })
    }
}

fn normalize_base_url(configured: Option<&str>, default: &str) -> String {
    configured
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}
