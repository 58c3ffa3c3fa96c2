//! BYO-key LLM adapters for Notesmith.
//!
//! Builds provider requests from a list of chat turns, sends them, and
//! returns text, image URLs, transcripts or speech audio. Side effects on the
//! host (streamed output, notifications, playback) go through [`host`].

mod anthropic;
mod assistant;
mod config;
mod error;
pub mod host;
mod models;
mod openai;
mod types;

pub use anthropic::AnthropicClient;
pub use assistant::{
    AnthropicAssistant, Assistant, ChatAssistant, OpenAiAssistant, Provider, build_assistant,
    consume_stream,
};
pub use config::{AssistantConfig, DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_OPENAI_BASE_URL};
pub use error::{LlmError, Result};
pub use host::{AudioPlayer, Notifier, OutputTarget};
pub use models::{
    DEFAULT_IMAGE_MODEL, HD_IMAGE_MODEL, IMAGE_CAPABLE_MODELS, TokenLimit, image_quality,
    is_reasoning_model, select_chat_model, token_limit_for,
};
pub use openai::{ChunkStream, OpenAiClient};
pub use types::{
    AudioInput, ChatMessage, ContentPart, ImageRequest, ImageUrl, MessageContent, Role,
    SpeechAudio, StreamChunk,
};
