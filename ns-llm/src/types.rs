use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a conversation. Sent to the provider as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// Remote URL or `data:` URL.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// A user turn carrying text followed by one part per image URL.
    pub fn user_with_images<I, S>(text: impl Into<String>, image_urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parts = vec![ContentPart::Text { text: text.into() }];
        parts.extend(image_urls.into_iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.into(),
                detail: None,
            },
        }));
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }

    /// Multi-part content counts as image-bearing, whatever the parts hold.
    pub fn has_image_parts(&self) -> bool {
        matches!(self.content, MessageContent::Parts(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Delta { content: String },
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    /// Provider size string, e.g. `1024x1024`.
    pub size: String,
    pub count: u32,
    pub hd: bool,
}

/// Audio handed to the transcription endpoint.
#[derive(Debug, Clone)]
pub struct AudioInput {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

impl AudioInput {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
        }
    }

    pub fn mime(&self) -> &'static str {
        let ext = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("mp3") | Some("mpga") | Some("mpeg") => "audio/mpeg",
            Some("m4a") | Some("mp4") => "audio/mp4",
            Some("webm") => "audio/webm",
            Some("ogg") => "audio/ogg",
            Some("flac") => "audio/flac",
            _ => "audio/wav",
        }
    }
}

/// Synthesized speech ready for playback.
#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub bytes: bytes::Bytes,
    pub mime: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_turn_serializes_as_plain_string() {
        let v = serde_json::to_value(ChatMessage::user("hi")).expect("serialize");
        assert_eq!(v, json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn image_turn_serializes_as_openai_parts() {
        let m = ChatMessage::user_with_images("what is this?", ["https://x/cat.png"]);
        assert!(m.has_image_parts());
        let v = serde_json::to_value(&m).expect("serialize");
        assert_eq!(
            v,
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "https://x/cat.png"}}
                ]
            })
        );
    }

    #[test]
    fn turns_deserialize_from_either_content_shape() {
        let turns: Vec<ChatMessage> = serde_json::from_value(json!([
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": [{"type": "text", "text": "hello"}]}
        ]))
        .expect("deserialize");
        assert!(!turns[0].has_image_parts());
        assert!(turns[1].has_image_parts());
    }

    #[test]
    fn audio_mime_follows_extension() {
        assert_eq!(AudioInput::new(vec![], "memo.MP3").mime(), "audio/mpeg");
        assert_eq!(AudioInput::new(vec![], "memo.webm").mime(), "audio/webm");
        assert_eq!(AudioInput::new(vec![], "memo").mime(), "audio/wav");
    }
}
