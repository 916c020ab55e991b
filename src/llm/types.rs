//! Provider-neutral request/response types

use std::time::Duration;

use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Conversation role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One call to a hosted model
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

/// Full reply with usage stats
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Completion {
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Incremental event from a streaming reply
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    /// Usage as reported so far; `None` leaves the previous value untouched
    Usage {
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
    },
    Done,
}

/// Streaming reply. Dropping it cancels the upstream request.
pub type CompletionStream = BoxStream<'static, Result<StreamEvent, LlmError>>;

/// Upstream provider failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("{provider}: API key not configured")]
    MissingApiKey { provider: &'static str },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Transient failures are worth one more attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout(_)
                | LlmError::Network(_)
                | LlmError::RateLimited(_)
                | LlmError::Server { .. }
        )
    }

    /// Map a transport error from reqwest
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout)
        } else if let Some(status) = err.status() {
            LlmError::from_status(status.as_u16(), &err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }

    /// Map a failure while reading a response body: a stalled body is a
    /// timeout, a body that arrived but did not decode is malformed
    pub fn from_body(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_decode() {
            LlmError::MalformedResponse(err.to_string())
        } else {
            LlmError::from_reqwest(err, timeout)
        }
    }

    /// Map a non-success HTTP status
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = truncate(body, 500);
        match status {
            401 | 403 => LlmError::Authentication(message),
            429 => LlmError::RateLimited(message),
            400 | 404 | 413 | 422 => LlmError::InvalidRequest(format!("HTTP {}: {}", status, message)),
            408 => LlmError::Network(format!("HTTP 408: {}", message)),
            500..=599 => LlmError::Server { status, message },
            _ => LlmError::InvalidRequest(format!("HTTP {}: {}", status, message)),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Normalize caller-supplied history for chat APIs.
///
/// Drops blank turns and leading assistant turns, and merges consecutive
/// turns from the same role so the sequence alternates starting with `user`.
pub fn sanitize_history(history: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut out: Vec<ChatMessage> = Vec::with_capacity(history.len());

    for turn in history {
        let content = turn.content.trim();
        if content.is_empty() {
            continue;
        }
        if out.is_empty() && turn.role == Role::Assistant {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.role == turn.role => {
                last.content.push_str("\n\n");
                last.content.push_str(content);
            }
            _ => out.push(ChatMessage {
                role: turn.role,
                content: content.to_string(),
            }),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(LlmError::from_status(401, "nope"), LlmError::Authentication(_)));
        assert!(matches!(LlmError::from_status(429, "slow"), LlmError::RateLimited(_)));
        assert!(matches!(LlmError::from_status(400, "bad"), LlmError::InvalidRequest(_)));
        assert!(matches!(
            LlmError::from_status(529, "overloaded"),
            LlmError::Server { status: 529, .. }
        ));
    }

    #[test]
    fn test_transient_classes() {
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(LlmError::Server { status: 502, message: String::new() }.is_transient());
        assert!(!LlmError::Authentication("x".into()).is_transient());
        assert!(!LlmError::InvalidRequest("x".into()).is_transient());
        assert!(!LlmError::MalformedResponse("x".into()).is_transient());
    }

    #[test]
    fn test_sanitize_history() {
        let history = vec![
            ChatMessage::assistant("Welcome!"),
            ChatMessage::user("First"),
            ChatMessage::user("  "),
            ChatMessage::user("Second"),
            ChatMessage::assistant("Reply"),
        ];

        let cleaned = sanitize_history(&history);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0], ChatMessage::user("First\n\nSecond"));
        assert_eq!(cleaned[1], ChatMessage::assistant("Reply"));
    }

    #[test]
    fn test_role_serde() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert!(serde_json::from_str::<ChatMessage>(r#"{"role":"system","content":"x"}"#).is_err());
    }
}
