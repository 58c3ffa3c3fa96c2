use crate::assistant::Provider;
use crate::config::AssistantConfig;
use crate::error::{LlmError, Result, api_error};
use crate::types::ChatMessage;
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Caller must have validated that `config` carries an Anthropic key.
    pub fn new(http: reqwest::Client, config: &AssistantConfig) -> Self {
        Self {
            http,
            api_key: config.anthropic_api_key.clone().unwrap_or_default(),
            base_url: config.anthropic_base_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let req = AnthropicRequest::new(&self.model, self.max_tokens, messages);
        tracing::debug!(model = %self.model, turns = messages.len(), "anthropic chat request");

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&req)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = %status, "anthropic request rejected");
            return Err(api_error(Provider::Anthropic, status, &body));
        }

        first_text_block(&body)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: &'a [ChatMessage],
    /// Streaming is not supported for this provider.
    stream: bool,
}

impl<'a> AnthropicRequest<'a> {
    pub(crate) fn new(model: &'a str, max_tokens: u32, messages: &'a [ChatMessage]) -> Self {
        Self {
            model,
            max_tokens,
            messages,
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

fn first_text_block(body: &str) -> Result<String> {
    let parsed: AnthropicResponse = serde_json::from_str(body)?;
    match parsed.content.into_iter().next() {
        Some(AnthropicContentBlock::Text { text }) => Ok(text),
        Some(AnthropicContentBlock::Other) => Err(LlmError::ResponseFormat(
            "anthropic first content block is not text".to_string(),
        )),
        None => Err(LlmError::ResponseFormat(
            "anthropic response has no content blocks".to_string(),
        )),
    }
}
