//! Shared test fixtures: skill files on disk and a scripted LLM client.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use tempfile::TempDir;

use skillchat::answerer::{AnswerSettings, Answerer};
use skillchat::llm::{Completion, CompletionRequest, CompletionStream, RetryPolicy, StreamEvent};
use skillchat::{ChatService, LlmClient, LlmError, LlmRouter, Router, RoutingCache, SkillStore, TriggerRouter};
use skillchat::CachedRouter;
use std::time::Duration;

pub const T2_SKILL: &str = r#"---
skill_id = "t2-basics"
title = "T2 Corporation Income Tax Return basics"
domain = "filing"
triggers = ["T2 return", "T2 form"]
keywords = ["schedule 1", "filing deadline"]
version = "1.0"
---
# T2 basics

Every resident corporation files a T2 return within six months of its year end.
"#;

pub const SBD_SKILL: &str = r#"---
skill_id = "sbd"
title = "Small business deduction"
domain = "deductions"
triggers = ["small business deduction"]
related_skills = ["t2-basics"]
---
# Small business deduction

A CCPC may claim the SBD on its first $500,000 of active business income.
"#;

pub const SRED_SKILL: &str = r#"---
skill_id = "sred"
title = "SR&ED investment tax credits"
domain = "credits"
triggers = ["SR&ED", "scientific research"]
---
# SR&ED

Qualifying expenditures are claimed on Schedule 32 and Form T661.
"#;

/// Write `(file name, content)` pairs into a fresh directory
pub fn skills_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).expect("Failed to write skill file");
    }
    dir
}

pub async fn open_store(files: &[(&str, &str)]) -> (Arc<SkillStore>, TempDir) {
    let dir = skills_dir(files);
    let (store, _report) = SkillStore::open(dir.path()).await.expect("Failed to open store");
    (Arc::new(store), dir)
}

/// LLM double that replays a fixed script and counts calls.
///
/// `complete` pops the next reply. `stream` hands out the next queued
/// stream if there is one, otherwise pops the next reply and emits it as two
/// text deltas followed by usage and `Done`.
pub struct ScriptedClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    streams: Mutex<VecDeque<CompletionStream>>,
    calls: Mutex<usize>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            streams: Mutex::new(VecDeque::new()),
            calls: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Client that must never be called
    pub fn silent() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(vec![Ok(text.to_string())])
    }

    /// Client whose `stream` calls return these streams in order
    pub fn streaming(streams: Vec<CompletionStream>) -> Arc<Self> {
        let client = Self::new(Vec::new());
        client.streams.lock().extend(streams);
        client
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().last().cloned()
    }

    fn record(&self, request: &CompletionRequest) {
        *self.calls.lock() += 1;
        self.requests.lock().push(request.clone());
    }

    fn next(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.record(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidRequest("scripted client has no reply left".into())))
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let text = self.next(request)?;
        Ok(Completion {
            text,
            model: "scripted-model".to_string(),
            input_tokens: 120,
            output_tokens: 30,
        })
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream, LlmError> {
        let queued = self.streams.lock().pop_front();
        if let Some(stream) = queued {
            self.record(request);
            return Ok(stream);
        }

        let text = self.next(request)?;
        let split = text.char_indices().nth(text.chars().count() / 2).map(|(i, _)| i).unwrap_or(0);
        let (head, tail) = text.split_at(split);

        let events = vec![
            Ok(StreamEvent::Usage { input_tokens: Some(120), output_tokens: None }),
            Ok(StreamEvent::TextDelta(head.to_string())),
            Ok(StreamEvent::TextDelta(tail.to_string())),
            Ok(StreamEvent::Usage { input_tokens: None, output_tokens: Some(30) }),
            Ok(StreamEvent::Done),
        ];
        Ok(stream::iter(events).boxed())
    }
}

/// Sets its flag when dropped
pub struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Upstream stream that emits `events` and then stays open forever.
///
/// The returned flag flips once the stream itself has been dropped.
pub fn held_open_stream(events: Vec<Result<StreamEvent, LlmError>>) -> (CompletionStream, Arc<AtomicBool>) {
    let dropped = Arc::new(AtomicBool::new(false));
    let guard = DropFlag(dropped.clone());

    let stream = stream::unfold((guard, VecDeque::from(events)), |(guard, mut events)| async move {
        match events.pop_front() {
            Some(event) => Some((event, (guard, events))),
            None => futures_util::future::pending().await,
        }
    })
    .boxed();

    (stream, dropped)
}

/// Upstream stream that fails after one text fragment
pub fn failing_stream(error: LlmError) -> CompletionStream {
    let events = vec![
        Ok(StreamEvent::Usage { input_tokens: Some(120), output_tokens: None }),
        Ok(StreamEvent::TextDelta("Partial ".to_string())),
        Err(error),
    ];
    stream::iter(events).boxed()
}

pub fn routing_reply(ids: &[&str], confidence: &str, reasoning: &str) -> String {
    serde_json::json!({
        "skill_ids": ids,
        "confidence": confidence,
        "reasoning": reasoning,
    })
    .to_string()
}

/// Full pipeline the way `ChatService::from_config` wires it, over doubles
pub fn service_with(
    store: Arc<SkillStore>,
    routing: Arc<ScriptedClient>,
    answering: Arc<ScriptedClient>,
    trigger_shortcut: bool,
    cache: Option<RoutingCache>,
) -> ChatService {
    let no_wait = RetryPolicy::immediate(1);

    let mut router: Arc<dyn Router> = Arc::new(LlmRouter::new(routing).with_retry(no_wait.clone()));
    if let Some(cache) = &cache {
        router = Arc::new(CachedRouter::new(router, cache.clone()));
    }
    let router: Arc<dyn Router> = Arc::new(TriggerRouter::new(router, trigger_shortcut));

    let answerer = Answerer::new(
        answering,
        store.clone(),
        AnswerSettings {
            retry: no_wait,
            ..AnswerSettings::default()
        },
    );

    let service = ChatService::new(store, router, answerer);
    match cache {
        Some(cache) => service.with_cache(cache),
        None => service,
    }
}

pub fn test_cache() -> RoutingCache {
    RoutingCache::new(100, Duration::from_secs(60))
}
