//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::ChatError;
use crate::llm::LlmError;

/// Error body returned by every endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Stable error code
    pub error: &'static str,
    /// Human-readable message
    pub message: String,
    /// Whether repeating the same request may succeed
    pub retryable: bool,
}

impl From<&ChatError> for ErrorResponse {
    fn from(err: &ChatError) -> Self {
        Self {
            error: err.code(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// `ChatError` carried to an HTTP response
#[derive(Debug)]
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ChatError::EmptyQuery => StatusCode::BAD_REQUEST,
            ChatError::UnknownSkill(_) | ChatError::RoutingParse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ChatError::ContextTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ChatError::RoutingUnavailable(_) | ChatError::AnswerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Upstream(LlmError::MissingApiKey { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ChatError::NotInitialized | ChatError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self.0);
        } else {
            warn!("Request rejected ({}): {}", status, self.0);
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ChatError::EmptyQuery, StatusCode::BAD_REQUEST),
            (ChatError::UnknownSkill("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (ChatError::ContextTooLarge { estimated: 10, limit: 5 }, StatusCode::PAYLOAD_TOO_LARGE),
            (
                ChatError::AnswerUnavailable(LlmError::Timeout(Duration::from_secs(1))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ChatError::Upstream(LlmError::Authentication("bad key".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (ChatError::NotInitialized, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError(err).status(), expected);
        }
    }

    #[test]
    fn test_body_reports_retryable() {
        let body = ErrorResponse::from(&ChatError::RoutingUnavailable(LlmError::RateLimited("slow down".into())));
        assert_eq!(body.error, "routing_unavailable");
        assert!(body.retryable);

        let body = ErrorResponse::from(&ChatError::EmptyQuery);
        assert!(!body.retryable);
    }
}
