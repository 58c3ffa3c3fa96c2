//! Side effects the embedding host provides.
//!
//! Keeps the provider logic free of any UI or audio stack.

use crate::error::Result;
use crate::types::SpeechAudio;
use async_trait::async_trait;

/// Receives partial output while a response streams in.
pub trait OutputTarget: Send {
    /// Called with the full text accumulated so far, not just the latest delta.
    fn render(&mut self, text: &str);
}

/// User-visible notification channel for failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, audio: SpeechAudio) -> Result<()>;
}

impl OutputTarget for String {
    fn render(&mut self, text: &str) {
        self.clear();
        self.push_str(text);
    }
}
