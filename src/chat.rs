//! Chat Service
//!
//! One question in, one grounded answer out:
//!
//! ```text
//! ChatRequest → validate → list_candidates → Router → Answerer → ChatResponse
//! ```
//!
//! Routing failures are surfaced to the caller, never replaced with a guess.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::answerer::{AnswerSettings, AnswerStream, Answerer};
use crate::cache::{CacheStats, RoutingCache};
use crate::config::Config;
use crate::error::ChatError;
use crate::llm::{build_client, ChatMessage, RetryPolicy};
use crate::router::{ensure_question, CachedRouter, Confidence, LlmRouter, Router, RoutingDecision, TriggerRouter};
use crate::skills::{LoadReport, SkillCandidate, SkillStore};

/// Incoming chat turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            conversation_history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.conversation_history = history;
        self
    }
}

/// Router confidence and justification, for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingInfo {
    pub confidence: Confidence,
    pub reasoning: String,
}

impl From<&RoutingDecision> for RoutingInfo {
    fn from(decision: &RoutingDecision) -> Self {
        Self {
            confidence: decision.confidence,
            reasoning: decision.reasoning.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    /// Skills whose bodies were actually in context
    pub loaded_skills: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_info: Option<RoutingInfo>,
}

/// One completed turn, for callers that keep conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatExchange {
    pub id: Uuid,
    pub user: String,
    pub assistant: String,
    pub loaded_skills: Vec<String>,
    pub tokens_used: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

impl ChatExchange {
    /// The two history turns this exchange contributes
    pub fn to_history(&self) -> [ChatMessage; 2] {
        [
            ChatMessage::user(self.user.clone()),
            ChatMessage::assistant(self.assistant.clone()),
        ]
    }
}

/// Routing + answering pipeline over a shared skill store
pub struct ChatService {
    store: Arc<SkillStore>,
    router: Arc<dyn Router>,
    answerer: Answerer,
    cache: Option<RoutingCache>,
}

impl ChatService {
    pub fn new(store: Arc<SkillStore>, router: Arc<dyn Router>, answerer: Answerer) -> Self {
        Self {
            store,
            router,
            answerer,
            cache: None,
        }
    }

    /// Attach the routing cache used by `router`, so reloads can flush it
    pub fn with_cache(mut self, cache: RoutingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Wire providers, router decorators and the skill store from configuration
    pub async fn from_config(config: &Config) -> Result<Self, ChatError> {
        let (store, report) = SkillStore::open(config.skills_dir.clone()).await?;
        info!(
            "Loaded {} skill(s) from {} ({} rejected)",
            report.loaded.len(),
            config.skills_dir.display(),
            report.rejected.len()
        );
        let store = Arc::new(store);

        let router_client = build_client(
            config.router.provider,
            &config.router.api_key,
            &config.router.model,
            config.llm_timeout,
        );
        let answer_client = build_client(
            config.answer.provider,
            &config.answer.api_key,
            &config.answer.model,
            config.llm_timeout,
        );

        let mut router: Arc<dyn Router> = Arc::new(LlmRouter::new(router_client).with_retry(RetryPolicy::default()));

        let cache = config.cache_enabled.then(|| {
            RoutingCache::new(config.cache_max_entries, Duration::from_secs(config.cache_ttl_secs))
        });
        if let Some(cache) = &cache {
            router = Arc::new(CachedRouter::new(router, cache.clone()));
        }
        let router: Arc<dyn Router> = Arc::new(TriggerRouter::new(router, config.trigger_shortcut));

        let answerer = Answerer::new(
            answer_client,
            store.clone(),
            AnswerSettings {
                max_context_tokens: config.max_context_tokens,
                max_answer_tokens: config.max_answer_tokens,
                ..AnswerSettings::default()
            },
        );

        info!(
            "Chat service ready: router={}:{}, answer={}:{}, trigger_shortcut={}, cache={}",
            config.router.provider.as_str(),
            config.router.model,
            config.answer.provider.as_str(),
            config.answer.model,
            config.trigger_shortcut,
            config.cache_enabled
        );

        let service = Self::new(store, router, answerer);
        Ok(match cache {
            Some(cache) => service.with_cache(cache),
            None => service,
        })
    }

    pub fn store(&self) -> &Arc<SkillStore> {
        &self.store
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    /// Skill metadata for display
    pub fn list_skills(&self) -> Result<Vec<SkillCandidate>, ChatError> {
        self.store.list_candidates()
    }

    /// Route only
    pub async fn route(&self, request: &ChatRequest) -> Result<RoutingDecision, ChatError> {
        let question = ensure_question(&request.message)?;
        let candidates = self.store.list_candidates()?;
        self.router
            .route(question, &request.conversation_history, &candidates)
            .await
    }

    /// Route then answer
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let decision = self.route(request).await?;

        let answer = self
            .answerer
            .answer(&request.message, &request.conversation_history, &decision.skill_ids)
            .await?;

        let tokens_used = answer.tokens_used();
        Ok(ChatResponse {
            answer: answer.text,
            loaded_skills: answer.loaded_skills,
            tokens_used: Some(tokens_used),
            routing_info: Some(RoutingInfo::from(&decision)),
        })
    }

    /// Route, then open a streamed answer. The decision is available before
    /// the first answer chunk.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<(RoutingDecision, AnswerStream), ChatError> {
        let decision = self.route(request).await?;

        let stream = self
            .answerer
            .answer_stream(&request.message, &request.conversation_history, &decision.skill_ids)
            .await?;

        Ok((decision, stream))
    }

    /// Reload skills from disk and drop cached routing decisions
    pub async fn reload(&self) -> Result<LoadReport, ChatError> {
        let report = self.store.reload().await?;
        if let Some(cache) = &self.cache {
            cache.clear().await;
        }
        Ok(report)
    }

    /// History record for a finished turn
    pub fn exchange(&self, request: &ChatRequest, response: &ChatResponse) -> ChatExchange {
        ChatExchange {
            id: Uuid::new_v4(),
            user: request.message.trim().to_string(),
            assistant: response.answer.clone(),
            loaded_skills: response.loaded_skills.clone(),
            tokens_used: response.tokens_used,
            timestamp: Utc::now(),
        }
    }
}
