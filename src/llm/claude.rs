//! Claude API Client
//!
//! Anthropic Messages API client used for both the routing call and the
//! answering call. The system block carries `cache_control: ephemeral` so
//! repeated questions over the same skill document reuse the cached prefix.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::sse::event_stream;
use super::types::{ChatMessage, Completion, CompletionRequest, CompletionStream, LlmError, StreamEvent};
use super::{http_client, LlmClient};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude API client
#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

/// System message block with optional cache control
#[derive(Debug, Serialize)]
struct SystemBlock<'a> {
    r#type: &'static str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    r#type: &'static str,
}

/// API request
#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: Vec<SystemBlock<'a>>,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

/// API response
#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    r#type: String,
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

/// Streaming event envelope
#[derive(Debug, Deserialize)]
struct StreamPayload {
    r#type: String,
    #[serde(default)]
    message: Option<StreamMessage>,
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    message: String,
}

impl ClaudeClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: ANTHROPIC_API_URL.to_string(),
            timeout,
        }
    }

    /// Point at a different endpoint (proxies, test servers)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> MessageRequest<'a> {
        MessageRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: vec![SystemBlock {
                r#type: "text",
                text: &request.system,
                cache_control: Some(CacheControl { r#type: "ephemeral" }),
            }],
            messages: &request.messages,
            temperature: request.temperature,
            stream,
        }
    }

    async fn post(&self, body: &MessageRequest<'_>) -> Result<reqwest::Response, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey { provider: "claude" });
        }

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("anthropic-beta", "prompt-caching-2024-07-31")
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status, &text));
        }

        Ok(response)
    }
}

/// Map one streaming `data:` payload to events
pub(crate) fn parse_stream_payload(payload: &str) -> Result<Vec<StreamEvent>, LlmError> {
    let event: StreamPayload = serde_json::from_str(payload)
        .map_err(|e| LlmError::MalformedResponse(format!("claude stream event: {}", e)))?;

    let events = match event.r#type.as_str() {
        "message_start" => {
            let usage = event.message.and_then(|m| m.usage).unwrap_or_default();
            vec![StreamEvent::Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            }]
        }
        "content_block_delta" => match event.delta {
            Some(StreamDelta { r#type: Some(kind), text: Some(text) }) if kind == "text_delta" => {
                vec![StreamEvent::TextDelta(text)]
            }
            _ => Vec::new(),
        },
        "message_delta" => {
            let usage = event.usage.unwrap_or_default();
            vec![StreamEvent::Usage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            }]
        }
        "message_stop" => vec![StreamEvent::Done],
        "error" => {
            let body = event.error.unwrap_or(ApiErrorBody {
                r#type: String::new(),
                message: "unknown stream error".to_string(),
            });
            return Err(match body.r#type.as_str() {
                "overloaded_error" => LlmError::Server { status: 529, message: body.message },
                "rate_limit_error" => LlmError::RateLimited(body.message),
                "authentication_error" | "permission_error" => LlmError::Authentication(body.message),
                "invalid_request_error" => LlmError::InvalidRequest(body.message),
                _ => LlmError::Server { status: 500, message: body.message },
            });
        }
        // ping, content_block_start, content_block_stop
        _ => Vec::new(),
    };

    Ok(events)
}

#[async_trait]
impl LlmClient for ClaudeClient {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let body = self.build_request(request, false);

        debug!(
            "Calling Claude API: model={}, messages={}, system_len={}",
            self.model,
            request.messages.len(),
            request.system.len()
        );

        let response = self.post(&body).await?;
        let result: MessageResponse = response
            .json()
            .await
            .map_err(|e| LlmError::from_body(e, self.timeout))?;

        let text = result
            .content
            .into_iter()
            .filter_map(|b| if b.r#type == "text" { b.text } else { None })
            .collect::<Vec<_>>()
            .join("\n");

        let completion = Completion {
            text,
            model: self.model.clone(),
            input_tokens: result.usage.input_tokens.unwrap_or(0),
            output_tokens: result.usage.output_tokens.unwrap_or(0),
        };

        info!(
            "Claude response: model={}, in={}, out={}",
            completion.model, completion.input_tokens, completion.output_tokens
        );

        Ok(completion)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, LlmError> {
        let body = self.build_request(request, true);

        debug!("Opening Claude stream: model={}", self.model);

        let response = self.post(&body).await?;
        Ok(event_stream(response, self.timeout, parse_stream_payload))
    }
}
