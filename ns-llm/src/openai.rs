use crate::assistant::Provider;
use crate::config::AssistantConfig;
use crate::error::{LlmError, Result, api_error};
use crate::models::{
    SPEECH_FORMAT, SPEECH_MIME, SPEECH_MODEL, SPEECH_VOICE, TRANSCRIPTION_MODEL, TokenLimit,
    image_quality, select_chat_model, token_limit_for,
};
use crate::types::{AudioInput, ChatMessage, ImageRequest, SpeechAudio, StreamChunk};
use bytes::Bytes;
use futures_util::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Client for an OpenAI-compatible endpoint (api.openai.com, LM Studio, proxies).
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, config: &AssistantConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.openai_base_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        ensure_success(response).await
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let req = OpenAiChatRequest::new(&self.model, self.max_tokens, messages, false);
        tracing::debug!(model = %req.model, turns = messages.len(), "openai chat request");

        let response = self.post_json("chat/completions", &req).await?;
        let body = response.text().await?;
        let parsed: OpenAiChatResponse = serde_json::from_str(&body)?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            LlmError::ResponseFormat("openai response missing choices".to_string())
        })?;
        Ok(choice.message.content.unwrap_or_default())
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream> {
        let req = OpenAiChatRequest::new(&self.model, self.max_tokens, messages, true);
        tracing::debug!(model = %req.model, turns = messages.len(), "openai stream request");

        let response = self.post_json("chat/completions", &req).await?;
        let sse = Box::pin(decode_sse(response.bytes_stream()));

        let stream = futures_util::stream::unfold((sse, false), |(mut sse, done)| async move {
            if done {
                return None;
            }
            loop {
                let next = sse.as_mut().next().await?;
                match next {
                    Ok(SseEvent::Data(data)) => {
                        if data.trim() == "[DONE]" {
                            return Some((Ok(StreamChunk::Done), (sse, true)));
                        }

                        let chunk: OpenAiStreamResponseChunk = match serde_json::from_str(&data) {
                            Ok(v) => v,
                            Err(e) => {
                                return Some((
                                    Err(LlmError::StreamParse(format!(
                                        "openai chunk json error={e} data={data}"
                                    ))),
                                    (sse, true),
                                ));
                            }
                        };

                        let Some(choice) = chunk.choices.into_iter().next() else {
                            continue;
                        };
                        match choice.delta.content {
                            Some(content) if !content.is_empty() => {
                                return Some((Ok(StreamChunk::Delta { content }), (sse, false)));
                            }
                            _ => continue,
                        }
                    }
                    Ok(SseEvent::Other) => continue,
                    Err(e) => return Some((Err(e), (sse, true))),
                }
            }
        });

        Ok(Box::pin(stream))
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>> {
        let req = OpenAiImageRequest::from(request);
        tracing::debug!(
            model = %req.model,
            n = req.n,
            size = %req.size,
            quality = ?req.quality,
            "openai image request"
        );

        let response = self.post_json("images/generations", &req).await?;
        let body = response.text().await?;
        let parsed: OpenAiImageResponse = serde_json::from_str(&body)?;
        Ok(parsed
            .data
            .into_iter()
            .filter_map(|item| match (item.url, item.b64_json) {
                (Some(url), _) => Some(url),
                (None, Some(b64)) => Some(format!("data:image/png;base64,{b64}")),
                (None, None) => None,
            })
            .collect())
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn transcribe(&self, audio: AudioInput, language: &str) -> Result<String> {
        tracing::debug!(
            model = TRANSCRIPTION_MODEL,
            size = audio.bytes.len(),
            language = %language,
            "openai transcription request"
        );

        let mime = audio.mime();
        let file_part = reqwest::multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(mime)
            .map_err(|e| LlmError::InvalidInput(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", TRANSCRIPTION_MODEL);
        if !language.trim().is_empty() {
            form = form.text("language", language.trim().to_string());
        }

        let response = self
            .http
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let body = response.text().await?;
        let parsed: OpenAiTranscription = serde_json::from_str(&body)?;
        Ok(parsed.text)
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn synthesize(&self, text: &str) -> Result<SpeechAudio> {
        tracing::debug!(chars = text.chars().count(), "openai speech request");

        let req = OpenAiSpeechRequest {
            model: SPEECH_MODEL,
            voice: SPEECH_VOICE,
            input: text,
            response_format: SPEECH_FORMAT,
        };
        let response = self.post_json("audio/speech", &req).await?;
        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("audio/"))
            .unwrap_or(SPEECH_MIME)
            .to_string();
        let bytes = response.bytes().await?;
        Ok(SpeechAudio { bytes, mime })
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, "openai request rejected");
    Err(api_error(Provider::OpenAI, status, &body))
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

impl<'a> OpenAiChatRequest<'a> {
    pub(crate) fn new(
        configured_model: &'a str,
        max_tokens: u32,
        messages: &'a [ChatMessage],
        stream: bool,
    ) -> Self {
        let model = select_chat_model(configured_model, messages);
        let mut out = Self {
            model,
            messages,
            stream,
            max_tokens: None,
            max_completion_tokens: None,
        };
        match token_limit_for(model, max_tokens) {
            TokenLimit::MaxTokens(n) => out.max_tokens = Some(n),
            TokenLimit::MaxCompletionTokens(n) => out.max_completion_tokens = Some(n),
        }
        out
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<&'static str>,
}

impl From<&ImageRequest> for OpenAiImageRequest {
    fn from(r: &ImageRequest) -> Self {
        Self {
            model: r.model.clone(),
            prompt: r.prompt.clone(),
            n: r.count,
            size: r.size.clone(),
            quality: image_quality(&r.model, r.hd),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiImageResponse {
    #[serde(default)]
    data: Vec<OpenAiImageItem>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImageItem {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiTranscription {
    text: String,
}

#[derive(Debug, Serialize)]
struct OpenAiSpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

#[derive(Debug)]
enum SseEvent {
    Data(String),
    Other,
}

fn decode_sse<S>(bytes_stream: S) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    // Bytes stay raw until a whole event is buffered; a chunk may end mid-character.
    futures_util::stream::unfold(
        (bytes_stream, Vec::<u8>::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                if let Some(raw) = split_event(&mut buffer) {
                    let raw = match String::from_utf8(raw) {
                        Ok(raw) => raw,
                        Err(e) => {
                            let err = LlmError::StreamParse(format!("event is not utf-8: {e}"));
                            return Some((Err(err), (stream, buffer)));
                        }
                    };
                    let data_lines: Vec<&str> = raw
                        .lines()
                        .filter_map(|line| line.trim_end().strip_prefix("data:"))
                        .map(str::trim_start)
                        .collect();
                    if data_lines.is_empty() {
                        return Some((Ok(SseEvent::Other), (stream, buffer)));
                    }
                    let data = data_lines.join("\n");
                    return Some((Ok(SseEvent::Data(data)), (stream, buffer)));
                }

                match stream.next().await {
                    Some(Ok(chunk)) => {
                        buffer.extend_from_slice(&chunk);
                        continue;
                    }
                    Some(Err(e)) => {
                        return Some((Err(LlmError::Http(e.to_string())), (stream, buffer)));
                    }
                    None => {
                        // Flush a final event the server didn't terminate with a blank line.
                        if buffer.iter().all(u8::is_ascii_whitespace) {
                            return None;
                        }
                        buffer.extend_from_slice(b"\n\n");
                        continue;
                    }
                }
            }
        },
    )
}

/// Drains the first complete event from `buffer`, accepting `\n\n` and `\r\n\r\n`
/// separators. The separator itself is discarded.
fn split_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let lf = find(buffer, b"\n\n").map(|i| (i, 2));
    let crlf = find(buffer, b"\r\n\r\n").map(|i| (i, 4));
    let (idx, sep) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let mut event: Vec<u8> = buffer.drain(..idx + sep).collect();
    event.truncate(idx);
    Some(event)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamResponseChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: OpenAiStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiStreamDelta {
    #[serde(default)]
    content: Option<String>,
}
