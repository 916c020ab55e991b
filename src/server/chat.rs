//! Chat endpoints
//!
//! `POST /api/chat` returns one JSON response. `POST /api/chat/stream`
//! returns Server-Sent Events:
//!
//! - `routing` once, before any answer text
//! - `delta` per text fragment
//! - `done` with loaded skills and token usage, or `error` as the last event
//!
//! A client disconnect drops the stream, which cancels the upstream call.

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::error::{ApiError, ErrorResponse};
use super::AppState;
use crate::answerer::AnswerChunk;
use crate::chat::{ChatRequest, ChatResponse};
use crate::router::{Confidence, RoutingDecision};

type BoxedSseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

#[derive(Debug, Serialize)]
struct RoutingEvent<'a> {
    loaded_skills: &'a [String],
    confidence: Confidence,
    reasoning: &'a str,
}

#[derive(Debug, Serialize)]
struct DeltaEvent<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct DoneEvent<'a> {
    loaded_skills: &'a [String],
    tokens_used: u32,
}

/// POST /api/chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let response = state.service.chat(&request).await?;
    info!(
        "Chat answered with [{}], tokens={:?}",
        response.loaded_skills.join(", "),
        response.tokens_used
    );
    Ok(Json(response))
}

/// POST /api/chat/stream
///
/// Failures before the first event (empty question, routing errors) are
/// plain JSON errors with a status code; failures mid-answer arrive as an
/// `error` event.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    let (decision, answer) = state.service.chat_stream(&request).await?;

    let routing = routing_event(&decision);
    let events = answer.map(|chunk| {
        let event = match chunk {
            Ok(AnswerChunk::Delta(text)) => json_event("delta", &DeltaEvent { text: &text }),
            Ok(AnswerChunk::Done {
                loaded_skills,
                input_tokens,
                output_tokens,
            }) => json_event(
                "done",
                &DoneEvent {
                    loaded_skills: &loaded_skills,
                    tokens_used: input_tokens + output_tokens,
                },
            ),
            Err(e) => json_event("error", &ErrorResponse::from(&e)),
        };
        Ok::<_, Infallible>(event)
    });

    let stream: BoxedSseStream = Box::pin(stream::once(async move { Ok(routing) }).chain(events));

    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("heartbeat"))
        .into_response())
}

fn routing_event(decision: &RoutingDecision) -> Event {
    json_event(
        "routing",
        &RoutingEvent {
            loaded_skills: &decision.skill_ids,
            confidence: decision.confidence,
            reasoning: &decision.reasoning,
        },
    )
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .data(serde_json::to_string(payload).unwrap_or_default())
}
