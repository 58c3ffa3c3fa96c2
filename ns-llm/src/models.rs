//! Model capability rules for the OpenAI-compatible API.

use crate::types::ChatMessage;

/// Chat models that accept image parts.
pub const IMAGE_CAPABLE_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4o-mini",
    "gpt-4-turbo",
    "gpt-4-vision-preview",
];

/// Substituted when a conversation carries images and the configured model can't read them.
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-4o";

/// The only image model that honours `quality: "hd"`.
pub const HD_IMAGE_MODEL: &str = "dall-e-3";

pub const TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const SPEECH_MODEL: &str = "tts-1";
pub const SPEECH_VOICE: &str = "alloy";
pub const SPEECH_FORMAT: &str = "mp3";
pub const SPEECH_MIME: &str = "audio/mpeg";

pub fn select_chat_model<'a>(configured: &'a str, turns: &[ChatMessage]) -> &'a str {
    let has_images = turns.iter().any(ChatMessage::has_image_parts);
    if has_images && !IMAGE_CAPABLE_MODELS.contains(&configured) {
        tracing::debug!(
            configured = %configured,
            substitute = %DEFAULT_IMAGE_MODEL,
            "model cannot read images; substituting"
        );
        return DEFAULT_IMAGE_MODEL;
    }
    configured
}

pub fn is_reasoning_model(model: &str) -> bool {
    model.contains("o1")
}

/// Which request field carries the response length ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLimit {
    MaxTokens(u32),
    /// Reasoning models reject `max_tokens`.
    MaxCompletionTokens(u32),
}

pub fn token_limit_for(model: &str, max_tokens: u32) -> TokenLimit {
    if is_reasoning_model(model) {
        TokenLimit::MaxCompletionTokens(max_tokens)
    } else {
        TokenLimit::MaxTokens(max_tokens)
    }
}

pub fn image_quality(model: &str, hd: bool) -> Option<&'static str> {
    (model == HD_IMAGE_MODEL && hd).then_some("hd")
}
