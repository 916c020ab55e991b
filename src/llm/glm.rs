//! GLM API Client
//!
//! Zhipu GLM chat completions (OpenAI-compatible wire format, Bearer auth).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::sse::event_stream;
use super::types::{ChatMessage, Completion, CompletionRequest, CompletionStream, LlmError, StreamEvent};
use super::{http_client, LlmClient};

const GLM_API_URL: &str = "https://open.bigmodel.cn/api/paas/v4/chat/completions";

/// GLM API client
#[derive(Clone)]
pub struct GlmClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    delta: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

impl GlmClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: GLM_API_URL.to_string(),
            timeout,
        }
    }

    /// Point at a different endpoint (coding plan, proxies)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn build_request<'a>(&'a self, request: &'a CompletionRequest, stream: bool) -> ChatCompletionRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: &request.system,
            });
        }
        messages.extend(request.messages.iter().map(|m: &ChatMessage| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        }));

        ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream,
        }
    }

    async fn post(&self, body: &ChatCompletionRequest<'_>) -> Result<reqwest::Response, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::MissingApiKey { provider: "glm" });
        }

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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
    if payload.trim() == "[DONE]" {
        return Ok(vec![StreamEvent::Done]);
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(payload) {
        let code = envelope.error.code.unwrap_or_default();
        return Err(match code.as_str() {
            "1302" | "1303" | "1305" => LlmError::RateLimited(envelope.error.message),
            "1000" | "1001" | "1002" | "1003" | "1004" => LlmError::Authentication(envelope.error.message),
            _ => LlmError::Server { status: 500, message: envelope.error.message },
        });
    }

    let chunk: ChatCompletionResponse = serde_json::from_str(payload)
        .map_err(|e| LlmError::MalformedResponse(format!("glm stream chunk: {}", e)))?;

    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.and_then(|d| d.content) {
            if !text.is_empty() {
                events.push(StreamEvent::TextDelta(text));
            }
        }
    }
    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage {
            input_tokens: Some(usage.prompt_tokens),
            output_tokens: Some(usage.completion_tokens),
        });
    }

    Ok(events)
}

#[async_trait]
impl LlmClient for GlmClient {
    fn name(&self) -> &'static str {
        "glm"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let body = self.build_request(request, false);

        debug!("Calling GLM API: model={}, messages={}", self.model, body.messages.len());

        let response = self.post(&body).await?;
        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::from_body(e, self.timeout))?;

        let text = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| LlmError::MalformedResponse("GLM response has no message content".to_string()))?;

        let (input_tokens, output_tokens) = result
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        let completion = Completion {
            text,
            model: self.model.clone(),
            input_tokens,
            output_tokens,
        };

        info!(
            "GLM response: model={}, in={}, out={}",
            completion.model, completion.input_tokens, completion.output_tokens
        );

        Ok(completion)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, LlmError> {
        let body = self.build_request(request, true);

        debug!("Opening GLM stream: model={}", self.model);

        let response = self.post(&body).await?;
        Ok(event_stream(response, self.timeout, parse_stream_payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_becomes_first_message() {
        let client = GlmClient::new("key", "glm-4-plus", Duration::from_secs(5));
        let request = CompletionRequest {
            system: "You answer tax questions.".to_string(),
            messages: vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
            max_tokens: 128,
            temperature: None,
        };

        let json = serde_json::to_value(client.build_request(&request, true)).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(json["stream"], true);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_parse_stream_chunks() {
        let chunk = r#"{"id":"1","choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"}}]}"#;
        assert_eq!(parse_stream_payload(chunk).unwrap(), vec![StreamEvent::TextDelta("Hi".into())]);

        let last = r#"{"id":"1","choices":[{"index":0,"finish_reason":"stop","delta":{"content":""}}],"usage":{"prompt_tokens":10,"completion_tokens":3,"total_tokens":13}}"#;
        assert_eq!(
            parse_stream_payload(last).unwrap(),
            vec![StreamEvent::Usage { input_tokens: Some(10), output_tokens: Some(3) }]
        );

        assert_eq!(parse_stream_payload("[DONE]").unwrap(), vec![StreamEvent::Done]);
    }

    #[test]
    fn test_parse_stream_error() {
        let err = parse_stream_payload(r#"{"error":{"code":"1302","message":"too fast"}}"#).unwrap_err();
        assert!(matches!(err, LlmError::RateLimited(_)));
    }
}
