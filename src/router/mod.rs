//! Skill Router
//!
//! Maps a question to zero or more skill ids. The core contract is one LLM
//! call over the candidate metadata; the trigger short-circuit and the
//! decision cache are decorators around that contract.
//!
//! ```text
//! TriggerRouter ──(0 or 2+ matches)──► CachedRouter ──(miss)──► LlmRouter ──► routing model
//!      │                                     │
//!  exactly one match                    cached decision
//! ```

pub mod cached;
pub mod llm;
pub mod parse;
pub mod trigger;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ChatError;
use crate::llm::ChatMessage;
use crate::skills::SkillCandidate;

pub use cached::CachedRouter;
pub use llm::LlmRouter;
pub use parse::parse_routing_reply;
pub use trigger::{match_triggers, TriggerRouter};

/// Router confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing result for one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Selected skills, in the order their bodies go into the prompt
    pub skill_ids: Vec<String>,
    pub confidence: Confidence,
    /// Free-text justification; for audit only, never parsed
    pub reasoning: String,
}

impl RoutingDecision {
    /// No relevant skill: answer from general knowledge
    pub fn no_match(reasoning: impl Into<String>) -> Self {
        Self {
            skill_ids: Vec::new(),
            confidence: Confidence::Low,
            reasoning: reasoning.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.skill_ids.is_empty()
    }
}

/// Question → skill ids
#[async_trait]
pub trait Router: Send + Sync {
    async fn route(
        &self,
        question: &str,
        history: &[ChatMessage],
        candidates: &[SkillCandidate],
    ) -> Result<RoutingDecision, ChatError>;
}

/// Reject empty questions before anything else runs
pub fn ensure_question(question: &str) -> Result<&str, ChatError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        Err(ChatError::EmptyQuery)
    } else {
        Ok(trimmed)
    }
}
