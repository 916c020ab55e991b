//! Error Taxonomy
//!
//! Request-level errors surfaced by the router, answerer, and chat service.
//! `Configuration` is fatal at startup; everything else is per request and
//! reports whether the caller should simply try again.

use crate::llm::LlmError;
use crate::skills::SkillError;

/// Errors returned to chat callers
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Skill store has not been loaded")]
    NotInitialized,

    #[error("Question is empty")]
    EmptyQuery,

    #[error("Unknown skill: {0}")]
    UnknownSkill(String),

    #[error("Could not parse routing reply: {0}")]
    RoutingParse(String),

    #[error("Context too large: ~{estimated} tokens exceeds the {limit} token input limit")]
    ContextTooLarge { estimated: usize, limit: usize },

    #[error("Routing model unavailable: {0}")]
    RoutingUnavailable(#[source] LlmError),

    #[error("Answering model unavailable: {0}")]
    AnswerUnavailable(#[source] LlmError),

    #[error("Upstream model error: {0}")]
    Upstream(#[source] LlmError),
}

impl ChatError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Configuration(_) => "configuration_error",
            ChatError::NotInitialized => "not_initialized",
            ChatError::EmptyQuery => "empty_query",
            ChatError::UnknownSkill(_) => "unknown_skill",
            ChatError::RoutingParse(_) => "routing_parse_error",
            ChatError::ContextTooLarge { .. } => "context_too_large",
            ChatError::RoutingUnavailable(_) => "routing_unavailable",
            ChatError::AnswerUnavailable(_) => "answer_unavailable",
            ChatError::Upstream(_) => "upstream_error",
        }
    }

    /// "Try again" (true) vs. "fix your request or configuration" (false)
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::RoutingUnavailable(_) | ChatError::AnswerUnavailable(_) => true,
            // A reply that failed the strict shape check may parse on a fresh sample
            ChatError::RoutingParse(_) => true,
            _ => false,
        }
    }

    /// Map an exhausted routing call: transient classes become `RoutingUnavailable`
    pub fn from_routing(err: LlmError) -> Self {
        if err.is_transient() {
            ChatError::RoutingUnavailable(err)
        } else {
            ChatError::Upstream(err)
        }
    }

    /// Map an exhausted answering call: transient classes become `AnswerUnavailable`
    pub fn from_answering(err: LlmError) -> Self {
        if err.is_transient() {
            ChatError::AnswerUnavailable(err)
        } else {
            ChatError::Upstream(err)
        }
    }
}

impl From<SkillError> for ChatError {
    fn from(err: SkillError) -> Self {
        ChatError::Configuration(err.to_string())
    }
}
