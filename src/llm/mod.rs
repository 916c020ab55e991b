//! LLM Providers
//!
//! Thin clients for the hosted models used for routing and answering.
//!
//! ```text
//! Router ───┐                 ┌── ClaudeClient (Anthropic Messages API)
//!           ├── LlmClient ────┤
//! Answerer ─┘                 └── GlmClient (Zhipu chat completions)
//! ```
//!
//! Every call carries an idle timeout: a connection that goes quiet for that
//! long fails, while a long reply that keeps arriving is never cut off.
//! Streaming responses are exposed as a `CompletionStream`; dropping it drops
//! the HTTP response, which cancels the upstream request.

pub mod claude;
pub mod glm;
pub mod retry;
pub mod sse;
pub mod types;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

pub use claude::ClaudeClient;
pub use glm::GlmClient;
pub use retry::{with_retry, RetryPolicy};
pub use types::{
    sanitize_history, ChatMessage, Completion, CompletionRequest, CompletionStream, LlmError, Role,
    StreamEvent,
};

/// Common interface over hosted chat models
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Model id requests are sent to
    fn model(&self) -> &str;

    /// Single request, full reply
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;

    /// Open a streaming reply
    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, LlmError>;
}

/// Supported providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Claude,
    Glm,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::Glm => "glm",
        }
    }

    /// Environment variable holding the API key
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Claude => "ANTHROPIC_API_KEY",
            Provider::Glm => "GLM_API_KEY",
        }
    }

    /// Small, cheap model for the routing call
    pub fn default_router_model(&self) -> &'static str {
        match self {
            Provider::Claude => "claude-3-5-haiku-20241022",
            Provider::Glm => "glm-4-flash",
        }
    }

    /// Long-context model for the answering call
    pub fn default_answer_model(&self) -> &'static str {
        match self {
            Provider::Claude => "claude-sonnet-4-20250514",
            Provider::Glm => "glm-4-plus",
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Provider::Claude),
            "glm" | "zhipu" => Ok(Provider::Glm),
            other => Err(format!("unknown LLM provider '{}' (expected claude or glm)", other)),
        }
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the provider clients.
///
/// `idle_timeout` bounds the wait for the response head and every gap
/// between body chunks, not the total length of the exchange.
pub(crate) fn http_client(idle_timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(idle_timeout.min(CONNECT_TIMEOUT))
        .read_timeout(idle_timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// Build a client for the given provider
pub fn build_client(
    provider: Provider,
    api_key: &str,
    model: &str,
    timeout: Duration,
) -> Arc<dyn LlmClient> {
    match provider {
        Provider::Claude => Arc::new(ClaudeClient::new(api_key, model, timeout)),
        Provider::Glm => Arc::new(GlmClient::new(api_key, model, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("claude".parse::<Provider>().unwrap(), Provider::Claude);
        assert_eq!("Anthropic".parse::<Provider>().unwrap(), Provider::Claude);
        assert_eq!(" GLM ".parse::<Provider>().unwrap(), Provider::Glm);
        assert!("openai".parse::<Provider>().is_err());
    }

    #[test]
    fn test_build_client_uses_model() {
        let client = build_client(Provider::Glm, "key", "glm-4-air", Duration::from_secs(5));
        assert_eq!(client.name(), "glm");
        assert_eq!(client.model(), "glm-4-air");
    }
}
