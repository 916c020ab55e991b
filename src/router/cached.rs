//! Caching decorator for routers

use async_trait::async_trait;
use std::sync::Arc;

use super::{ensure_question, Router, RoutingDecision};
use crate::cache::RoutingCache;
use crate::error::ChatError;
use crate::llm::ChatMessage;
use crate::skills::SkillCandidate;

/// Serves repeated questions from the routing cache.
///
/// Only history-free questions are cached; a follow-up turn can depend on
/// earlier context, so it always goes to the inner router.
pub struct CachedRouter {
    inner: Arc<dyn Router>,
    cache: RoutingCache,
}

impl CachedRouter {
    pub fn new(inner: Arc<dyn Router>, cache: RoutingCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &RoutingCache {
        &self.cache
    }
}

#[async_trait]
impl Router for CachedRouter {
    async fn route(
        &self,
        question: &str,
        history: &[ChatMessage],
        candidates: &[SkillCandidate],
    ) -> Result<RoutingDecision, ChatError> {
        let question = ensure_question(question)?;

        if !history.is_empty() {
            return self.inner.route(question, history, candidates).await;
        }

        let key = RoutingCache::compute_key(question, candidates);
        if let Some(decision) = self.cache.get(&key).await {
            return Ok(decision);
        }

        let decision = self.inner.route(question, history, candidates).await?;
        self.cache.set(&key, decision.clone()).await;
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Confidence;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting(AtomicUsize);

    #[async_trait]
    impl Router for Counting {
        async fn route(&self, _: &str, _: &[ChatMessage], _: &[SkillCandidate]) -> Result<RoutingDecision, ChatError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(RoutingDecision {
                skill_ids: Vec::new(),
                confidence: Confidence::Low,
                reasoning: format!("call {}", n),
            })
        }
    }

    #[tokio::test]
    async fn test_second_call_served_from_cache() {
        let inner = Arc::new(Counting(AtomicUsize::new(0)));
        let router = CachedRouter::new(inner.clone(), RoutingCache::new(10, Duration::from_secs(60)));

        let first = router.route("What is the SBD?", &[], &[]).await.unwrap();
        let second = router.route("what is the sbd?", &[], &[]).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_bypasses_cache() {
        let inner = Arc::new(Counting(AtomicUsize::new(0)));
        let router = CachedRouter::new(inner.clone(), RoutingCache::new(10, Duration::from_secs(60)));
        let history = vec![ChatMessage::user("earlier"), ChatMessage::assistant("reply")];

        router.route("And the rate?", &history, &[]).await.unwrap();
        router.route("And the rate?", &history, &[]).await.unwrap();

        assert_eq!(inner.0.load(Ordering::SeqCst), 2);
    }
}
