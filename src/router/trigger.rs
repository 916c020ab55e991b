//! Trigger-phrase short-circuit
//!
//! Case-insensitive literal matching of skill triggers against the question.
//! Exactly one matching skill skips the routing call; zero or several
//! matches fall through to the inner router, so an ambiguous question is
//! never settled by the keyword pass alone.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{ensure_question, Confidence, Router, RoutingDecision};
use crate::error::ChatError;
use crate::llm::ChatMessage;
use crate::skills::SkillCandidate;

/// A candidate whose trigger appears in the question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch<'a> {
    pub skill_id: &'a str,
    pub trigger: &'a str,
}

/// Candidates with at least one trigger contained in `question`, in candidate order
pub fn match_triggers<'a>(question: &str, candidates: &'a [SkillCandidate]) -> Vec<TriggerMatch<'a>> {
    let question = question.to_lowercase();

    candidates
        .iter()
        .filter_map(|c| {
            c.triggers
                .iter()
                .find(|t| {
                    let t = t.trim();
                    !t.is_empty() && question.contains(&t.to_lowercase())
                })
                .map(|t| TriggerMatch {
                    skill_id: c.skill_id.as_str(),
                    trigger: t.as_str(),
                })
        })
        .collect()
}

/// Router decorator that answers unambiguous trigger matches directly
pub struct TriggerRouter {
    inner: Arc<dyn Router>,
    enabled: bool,
}

impl TriggerRouter {
    pub fn new(inner: Arc<dyn Router>, enabled: bool) -> Self {
        Self { inner, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl Router for TriggerRouter {
    async fn route(
        &self,
        question: &str,
        history: &[ChatMessage],
        candidates: &[SkillCandidate],
    ) -> Result<RoutingDecision, ChatError> {
        let question = ensure_question(question)?;

        if self.enabled {
            let matches = match_triggers(question, candidates);
            match matches.as_slice() {
                [only] => {
                    debug!("Trigger short-circuit: '{}' -> {}", only.trigger, only.skill_id);
                    return Ok(RoutingDecision {
                        skill_ids: vec![only.skill_id.to_string()],
                        confidence: Confidence::High,
                        reasoning: format!("Question contains trigger phrase \"{}\"", only.trigger),
                    });
                }
                [] => {}
                several => debug!(
                    "Ambiguous trigger match ({} skills), deferring to router",
                    several.len()
                ),
            }
        }

        self.inner.route(question, history, candidates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, triggers: &[&str]) -> SkillCandidate {
        SkillCandidate {
            skill_id: id.to_string(),
            title: id.to_string(),
            domain: "tax".to_string(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            keywords: Vec::new(),
            related_skills: Vec::new(),
        }
    }

    /// Inner router that always fails, proving it was (not) reached
    struct Unreachable;

    #[async_trait]
    impl Router for Unreachable {
        async fn route(&self, _: &str, _: &[ChatMessage], _: &[SkillCandidate]) -> Result<RoutingDecision, ChatError> {
            Err(ChatError::RoutingParse("inner router called".to_string()))
        }
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let candidates = vec![candidate("t2-basics", &["T2 return"]), candidate("sred", &["SR&ED"])];
        let matches = match_triggers("when is my t2 RETURN due?", &candidates);
        assert_eq!(matches, vec![TriggerMatch { skill_id: "t2-basics", trigger: "T2 return" }]);
    }

    #[tokio::test]
    async fn test_single_match_short_circuits() {
        let router = TriggerRouter::new(Arc::new(Unreachable), true);
        let candidates = vec![candidate("t2-basics", &["T2 return"]), candidate("sred", &["SR&ED"])];

        let decision = router.route("Do I claim SR&ED on Schedule 32?", &[], &candidates).await.unwrap();
        assert_eq!(decision.skill_ids, vec!["sred"]);
        assert_eq!(decision.confidence, Confidence::High);
    }

    #[tokio::test]
    async fn test_multi_match_falls_through() {
        let router = TriggerRouter::new(Arc::new(Unreachable), true);
        let candidates = vec![candidate("t2-basics", &["T2 return"]), candidate("sred", &["SR&ED"])];

        let result = router.route("SR&ED on my T2 return", &[], &candidates).await;
        assert!(matches!(result, Err(ChatError::RoutingParse(_))));
    }

    #[tokio::test]
    async fn test_disabled_always_delegates() {
        let router = TriggerRouter::new(Arc::new(Unreachable), false);
        let candidates = vec![candidate("sred", &["SR&ED"])];

        assert!(router.route("SR&ED", &[], &candidates).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let router = TriggerRouter::new(Arc::new(Unreachable), true);
        assert!(matches!(router.route("   ", &[], &[]).await, Err(ChatError::EmptyQuery)));
    }
}
