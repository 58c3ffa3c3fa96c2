use crate::anthropic::AnthropicClient;
use crate::config::AssistantConfig;
use crate::error::{LlmError, Result};
use crate::host::{AudioPlayer, Notifier, OutputTarget};
use crate::openai::OpenAiClient;
use crate::types::{AudioInput, ChatMessage, ImageRequest, StreamChunk};
use async_trait::async_trait;
use futures_util::Stream;
use futures_util::StreamExt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Anthropic,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(LlmError::InvalidInput(format!(
                "unknown provider {other:?}; expected openai or anthropic"
            ))),
        }
    }
}

/// Chat, image, transcription and speech capabilities of one provider.
///
/// Every call is a single request. Nothing is remembered between calls; the
/// caller passes the whole conversation each time.
#[async_trait]
pub trait ChatAssistant: Send + Sync {
    fn provider(&self) -> Provider;

    fn model(&self) -> &str;

    /// With an output target the response is streamed into it as it arrives.
    async fn chat(
        &self,
        turns: &[ChatMessage],
        output: Option<&mut dyn OutputTarget>,
    ) -> Result<String>;

    async fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>>;

    async fn transcribe(&self, audio: AudioInput, language: &str) -> Result<String>;

    /// Synthesizes `text` and hands the audio to `player`.
    async fn speak(&self, text: &str, player: &dyn AudioPlayer) -> Result<()>;
}

pub struct OpenAiAssistant {
    client: OpenAiClient,
}

impl OpenAiAssistant {
    pub fn new(http: reqwest::Client, config: &AssistantConfig) -> Self {
        Self {
            client: OpenAiClient::new(http, config),
        }
    }
}

#[async_trait]
impl ChatAssistant for OpenAiAssistant {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn model(&self) -> &str {
        self.client.model()
    }

    async fn chat(
        &self,
        turns: &[ChatMessage],
        output: Option<&mut dyn OutputTarget>,
    ) -> Result<String> {
        match output {
            Some(target) => {
                let stream = self.client.chat_stream(turns).await?;
                consume_stream(stream, target).await
            }
            None => self.client.chat(turns).await,
        }
    }

    async fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>> {
        self.client.generate_images(request).await
    }

    async fn transcribe(&self, audio: AudioInput, language: &str) -> Result<String> {
        self.client.transcribe(audio, language).await
    }

    async fn speak(&self, text: &str, player: &dyn AudioPlayer) -> Result<()> {
        let audio = self.client.synthesize(text).await?;
        tracing::debug!(bytes = audio.bytes.len(), mime = %audio.mime, "speech ready");
        player.play(audio).await
    }
}

/// Chat through Anthropic; images and audio still go to the OpenAI-compatible API.
pub struct AnthropicAssistant {
    chat_client: AnthropicClient,
    media: OpenAiAssistant,
}

impl AnthropicAssistant {
    pub fn new(http: reqwest::Client, config: &AssistantConfig) -> Self {
        Self {
            chat_client: AnthropicClient::new(http.clone(), config),
            media: OpenAiAssistant::new(http, config),
        }
    }
}

#[async_trait]
impl ChatAssistant for AnthropicAssistant {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model(&self) -> &str {
        self.chat_client.model()
    }

    async fn chat(
        &self,
        turns: &[ChatMessage],
        output: Option<&mut dyn OutputTarget>,
    ) -> Result<String> {
        let text = self.chat_client.chat(turns).await?;
        if let Some(target) = output {
            target.render(&text);
        }
        Ok(text)
    }

    async fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>> {
        self.media.generate_images(request).await
    }

    async fn transcribe(&self, audio: AudioInput, language: &str) -> Result<String> {
        self.media.transcribe(audio, language).await
    }

    async fn speak(&self, text: &str, player: &dyn AudioPlayer) -> Result<()> {
        self.media.speak(text, player).await
    }
}

#[tracing::instrument(level = "debug", skip(config), fields(model = %config.model))]
pub fn build_assistant(
    provider: Provider,
    config: &AssistantConfig,
) -> Result<Box<dyn ChatAssistant>> {
    config.validate(provider)?;
    let http = config.http_client();
    Ok(match provider {
        Provider::OpenAI => Box::new(OpenAiAssistant::new(http, config)),
        Provider::Anthropic => Box::new(AnthropicAssistant::new(http, config)),
    })
}

/// Drains `stream` in order, rendering the running text after every delta.
pub async fn consume_stream<S>(mut stream: S, target: &mut dyn OutputTarget) -> Result<String>
where
    S: Stream<Item = Result<StreamChunk>> + Unpin,
{
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk? {
            StreamChunk::Delta { content } => {
                text.push_str(&content);
                target.render(&text);
            }
            StreamChunk::Done => break,
        }
    }
    Ok(text)
}

/// Host-facing entry point: every failure is reported to the notifier and
/// still returned to the caller.
pub struct Assistant {
    inner: Box<dyn ChatAssistant>,
    notifier: Arc<dyn Notifier>,
}

impl Assistant {
    pub fn new(
        provider: Provider,
        config: &AssistantConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let inner = build_assistant(provider, config)?;
        Ok(Self::from_parts(inner, notifier))
    }

    pub fn from_parts(inner: Box<dyn ChatAssistant>, notifier: Arc<dyn Notifier>) -> Self {
        Self { inner, notifier }
    }

    pub fn provider(&self) -> Provider {
        self.inner.provider()
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = %self.provider()))]
    pub async fn chat(
        &self,
        turns: &[ChatMessage],
        output: Option<&mut dyn OutputTarget>,
    ) -> Result<String> {
        let res = self.inner.chat(turns, output).await;
        self.report(res)
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = %self.provider()))]
    pub async fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>> {
        let res = self.inner.generate_images(request).await;
        self.report(res)
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = %self.provider()))]
    pub async fn transcribe(&self, audio: AudioInput, language: &str) -> Result<String> {
        let res = self.inner.transcribe(audio, language).await;
        self.report(res)
    }

    #[tracing::instrument(level = "info", skip_all, fields(provider = %self.provider()))]
    pub async fn speak(&self, text: &str, player: &dyn AudioPlayer) -> Result<()> {
        let res = self.inner.speak(text, player).await;
        self.report(res)
    }

    fn report<T>(&self, res: Result<T>) -> Result<T> {
        if let Err(e) = &res {
            tracing::error!(error = %e, api_error = e.is_api_error(), "assistant call failed");
            self.notifier.notify(&e.notice());
        }
        res
    }
}
