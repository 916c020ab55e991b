//! LLM-backed router
//!
//! Sends candidate metadata (never document bodies) to the routing model
//! and parses its structured reply.

use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info};

use super::parse::parse_routing_reply;
use super::{ensure_question, Router, RoutingDecision};
use crate::error::ChatError;
use crate::llm::{sanitize_history, with_retry, ChatMessage, CompletionRequest, LlmClient, RetryPolicy, Role};
use crate::skills::SkillCandidate;

const ROUTER_SYSTEM_PROMPT: &str = r#"You route questions to reference documents in a Canadian corporate tax library.

You are given a numbered list of documents with their id, title, domain, trigger phrases, keywords and related documents. Pick every document needed to answer the user's latest question, most relevant first. Pick none if the question is not covered by the library.

Reply with exactly one JSON object and nothing else:
{"skill_ids": ["<id>", ...], "confidence": "low" | "medium" | "high", "reasoning": "<one short paragraph>"}

Only use ids from the list. Use an empty skill_ids list when nothing applies."#;

/// Characters of each history turn included in the routing prompt
const HISTORY_TURN_CHARS: usize = 500;

/// Router that asks a hosted model to pick skills
pub struct LlmRouter {
    client: Arc<dyn LlmClient>,
    retry: RetryPolicy,
    history_turns: usize,
    max_tokens: u32,
}

impl LlmRouter {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            history_turns: 4,
            max_tokens: 512,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Number of trailing history turns shown to the routing model
    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    /// Build the routing request
    pub fn build_request(
        &self,
        question: &str,
        history: &[ChatMessage],
        candidates: &[SkillCandidate],
    ) -> CompletionRequest {
        let mut prompt = String::from("Documents:\n");
        for (i, c) in candidates.iter().enumerate() {
            let _ = writeln!(prompt, "{}. id: {}", i + 1, c.skill_id);
            let _ = writeln!(prompt, "   title: {}", c.title);
            let _ = writeln!(prompt, "   domain: {}", c.domain);
            let _ = writeln!(prompt, "   triggers: {}", c.triggers.join("; "));
            if !c.keywords.is_empty() {
                let _ = writeln!(prompt, "   keywords: {}", c.keywords.join("; "));
            }
            if !c.related_skills.is_empty() {
                let _ = writeln!(prompt, "   related: {}", c.related_skills.join(", "));
            }
        }

        let history = sanitize_history(history);
        let recent = &history[history.len().saturating_sub(self.history_turns)..];
        if !recent.is_empty() {
            prompt.push_str("\nRecent conversation:\n");
            for turn in recent {
                let role = match turn.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                let content: String = turn.content.chars().take(HISTORY_TURN_CHARS).collect();
                let _ = writeln!(prompt, "{}: {}", role, content);
            }
        }

        let _ = write!(prompt, "\nQuestion: {}", question);

        CompletionRequest {
            system: ROUTER_SYSTEM_PROMPT.to_string(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: self.max_tokens,
            temperature: Some(0.0),
        }
    }
}

#[async_trait]
impl Router for LlmRouter {
    async fn route(
        &self,
        question: &str,
        history: &[ChatMessage],
        candidates: &[SkillCandidate],
    ) -> Result<RoutingDecision, ChatError> {
        let question = ensure_question(question)?;

        if candidates.is_empty() {
            return Ok(RoutingDecision::no_match("No skills are loaded"));
        }

        let request = self.build_request(question, history, candidates);

        debug!(
            "Routing via {} ({}) over {} candidate(s)",
            self.client.name(),
            self.client.model(),
            candidates.len()
        );

        let completion = with_retry(&self.retry, "routing call", || self.client.complete(&request))
            .await
            .map_err(ChatError::from_routing)?;

        let decision = parse_routing_reply(&completion.text, candidates)?;

        info!(
            "Routed to [{}] (confidence={}, tokens={})",
            decision.skill_ids.join(", "),
            decision.confidence,
            completion.total_tokens()
        );

        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, CompletionStream, LlmError};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmClient for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test-model"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, LlmError> {
            *self.calls.lock() += 1;
            let reply = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::InvalidRequest("script exhausted".into())))?;
            Ok(Completion {
                text: reply,
                model: "test-model".into(),
                input_tokens: 10,
                output_tokens: 5,
            })
        }

        async fn stream(&self, _request: &CompletionRequest) -> Result<CompletionStream, LlmError> {
            Err(LlmError::InvalidRequest("not used".into()))
        }
    }

    fn candidates() -> Vec<SkillCandidate> {
        vec![SkillCandidate {
            skill_id: "sbd".to_string(),
            title: "Small business deduction".to_string(),
            domain: "deductions".to_string(),
            triggers: vec!["small business deduction".to_string()],
            keywords: vec!["CCPC".to_string()],
            related_skills: vec!["t2-basics".to_string()],
        }]
    }

    #[test]
    fn test_prompt_lists_metadata_and_history() {
        let router = LlmRouter::new(Arc::new(Scripted::new(vec![]))).with_history_turns(1);
        let history = vec![ChatMessage::user("old question"), ChatMessage::assistant("old answer")];

        let request = router.build_request("What rate applies?", &history, &candidates());
        let prompt = &request.messages[0].content;

        assert!(prompt.contains("id: sbd"));
        assert!(prompt.contains("keywords: CCPC"));
        assert!(prompt.contains("related: t2-basics"));
        assert!(prompt.contains("Assistant: old answer"));
        assert!(!prompt.contains("old question"));
        assert!(prompt.ends_with("Question: What rate applies?"));
        assert_eq!(request.temperature, Some(0.0));
    }

    #[tokio::test]
    async fn test_timeout_retried_then_unavailable() {
        let client = Arc::new(Scripted::new(vec![
            Err(LlmError::Timeout(Duration::from_secs(1))),
            Err(LlmError::Timeout(Duration::from_secs(1))),
        ]));
        let router = LlmRouter::new(client.clone()).with_retry(RetryPolicy::immediate(1));

        let err = router.route("What is the SBD?", &[], &candidates()).await.unwrap_err();
        assert!(matches!(err, ChatError::RoutingUnavailable(LlmError::Timeout(_))));
        assert_eq!(*client.calls.lock(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_error_not_fallback() {
        let client = Arc::new(Scripted::new(vec![Ok("Use the SBD document.".to_string())]));
        let router = LlmRouter::new(client).with_retry(RetryPolicy::immediate(1));

        let err = router.route("What is the SBD?", &[], &candidates()).await.unwrap_err();
        assert!(matches!(err, ChatError::RoutingParse(_)));
    }

    #[tokio::test]
    async fn test_empty_question_makes_no_call() {
        let client = Arc::new(Scripted::new(vec![]));
        let router = LlmRouter::new(client.clone());

        assert!(matches!(router.route("", &[], &candidates()).await, Err(ChatError::EmptyQuery)));
        assert_eq!(*client.calls.lock(), 0);
    }
}
