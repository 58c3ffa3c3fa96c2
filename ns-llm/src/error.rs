use crate::assistant::Provider;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} api error status={status} kind={kind}: {message}")]
    Api {
        provider: Provider,
        status: u16,
        kind: String,
        message: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected response format: {0}")]
    ResponseFormat(String),

    #[error("stream parse error: {0}")]
    StreamParse(String),

    #[error("audio playback failed: {0}")]
    Playback(String),
}

impl LlmError {
    /// Text shown to the user when a call fails.
    pub fn notice(&self) -> String {
        match self {
            Self::Api { provider, .. } => {
                format!("## {} API Error: {self}.", provider.display_name())
            }
            other => other.to_string(),
        }
    }

    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::Api { .. })
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        Self::ResponseFormat(e.to_string())
    }
}

#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Builds an [`LlmError::Api`] from a non-2xx response body.
///
/// Both providers wrap failures as `{"error": {"type": .., "message": ..}}`.
/// Bodies that don't match keep the raw text as the message.
pub(crate) fn api_error(provider: Provider, status: reqwest::StatusCode, body: &str) -> LlmError {
    let (kind, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (
            env.error.kind.unwrap_or_else(|| "unknown".to_string()),
            env.error.message,
        ),
        Err(_) => ("unknown".to_string(), body.trim().to_string()),
    };
    LlmError::Api {
        provider,
        status: status.as_u16(),
        kind,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_parses_provider_envelope() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        let err = api_error(Provider::OpenAI, reqwest::StatusCode::UNAUTHORIZED, body);
        match &err {
            LlmError::Api {
                provider,
                status,
                kind,
                message,
            } => {
                assert_eq!(*provider, Provider::OpenAI);
                assert_eq!(*status, 401);
                assert_eq!(kind, "invalid_request_error");
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("expected api error, got {other:?}"),
        }
        assert!(err.notice().starts_with("## OpenAI API Error: "));
    }

    #[test]
    fn api_error_keeps_raw_body_when_unstructured() {
        let err = api_error(
            Provider::Anthropic,
            reqwest::StatusCode::BAD_GATEWAY,
            "upstream unavailable\n",
        );
        let LlmError::Api { kind, message, .. } = &err else {
            panic!("expected api error");
        };
        assert_eq!(kind, "unknown");
        assert_eq!(message, "upstream unavailable");
        assert!(err.notice().starts_with("## Anthropic API Error: "));
    }

    #[test]
    fn generic_errors_are_shown_as_is() {
        let err = LlmError::Http("connection refused".to_string());
        assert_eq!(err.notice(), "http error: connection refused");
        assert!(!err.is_api_error());
    }
}
