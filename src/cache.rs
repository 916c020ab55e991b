//! Routing Cache
//!
//! Caches routing decisions keyed by SHA256 of the normalized question and a
//! fingerprint of the candidate set. Entries expire after a TTL, and any
//! change to the skill set changes the key, so a decision naming a removed
//! skill cannot outlive that skill.

use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::router::RoutingDecision;
use crate::skills::SkillCandidate;

/// Cache statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

/// Concurrent routing-decision cache
#[derive(Clone)]
pub struct RoutingCache {
    cache: Cache<String, RoutingDecision>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl RoutingCache {
    /// Create new cache with TTL
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self {
            cache,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Compute cache key from question and candidate set
    ///
    /// Key = SHA256(normalized_question + candidate_fingerprint)
    pub fn compute_key(question: &str, candidates: &[SkillCandidate]) -> String {
        let mut hasher = Sha256::new();

        hasher.update(normalize(question).as_bytes());
        hasher.update([0u8]);
        hasher.update(Self::fingerprint(candidates).as_bytes());

        hex::encode(hasher.finalize())
    }

    /// Order-independent digest of the routing-relevant candidate metadata
    pub fn fingerprint(candidates: &[SkillCandidate]) -> String {
        let mut sorted: Vec<&SkillCandidate> = candidates.iter().collect();
        sorted.sort_by(|a, b| a.skill_id.cmp(&b.skill_id));

        let mut hasher = Sha256::new();
        for c in sorted {
            hasher.update(c.skill_id.as_bytes());
            hasher.update([0u8]);
            hasher.update(c.title.as_bytes());
            hasher.update([0u8]);
            hasher.update(c.domain.as_bytes());
            for t in &c.triggers {
                hasher.update([1u8]);
                hasher.update(t.as_bytes());
            }
            hasher.update([2u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// Get cached decision
    pub async fn get(&self, key: &str) -> Option<RoutingDecision> {
        if let Some(decision) = self.cache.get(key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Routing cache HIT: {}", short_key(key));
            Some(decision)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Routing cache MISS: {}", short_key(key));
            None
        }
    }

    /// Store decision
    pub async fn set(&self, key: &str, decision: RoutingDecision) {
        self.cache.insert(key.to_string(), decision).await;
        debug!("Routing cache SET: {}", short_key(key));
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            entries: self.cache.entry_count(),
            hits,
            misses,
            hit_rate_percent: if total > 0 {
                (hits as f64 / total as f64) * 100.0
            } else {
                0.0
            },
        }
    }

    /// Clear all entries
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Log prefix of a key; callers may pass keys of any shape
fn short_key(key: &str) -> &str {
    key.get(..16).unwrap_or(key)
}

/// Lower-case, trimmed, whitespace collapsed
fn normalize(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Confidence;

    fn candidate(id: &str, trigger: &str) -> SkillCandidate {
        SkillCandidate {
            skill_id: id.to_string(),
            title: id.to_uppercase(),
            domain: "credits".to_string(),
            triggers: vec![trigger.to_string()],
            keywords: Vec::new(),
            related_skills: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_cache_hit_miss() {
        let cache = RoutingCache::new(100, Duration::from_secs(3600));
        let candidates = vec![candidate("sred", "SR&ED")];
        let key = RoutingCache::compute_key("what is sr&ed?", &candidates);

        assert!(cache.get(&key).await.is_none());

        let decision = RoutingDecision {
            skill_ids: vec!["sred".to_string()],
            confidence: Confidence::Medium,
            reasoning: "credits question".to_string(),
        };
        cache.set(&key, decision.clone()).await;

        assert_eq!(cache.get(&key).await, Some(decision));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_arbitrary_keys_accepted() {
        let cache = RoutingCache::new(100, Duration::from_secs(3600));
        let decision = RoutingDecision {
            skill_ids: Vec::new(),
            confidence: Confidence::Low,
            reasoning: "none".to_string(),
        };

        // Short, and a multi-byte character straddling byte 16
        for key in ["abc", "abcdefghijklmnoé"] {
            assert!(cache.get(key).await.is_none());
            cache.set(key, decision.clone()).await;
            assert_eq!(cache.get(key).await, Some(decision.clone()));
        }
    }

    #[test]
    fn test_key_normalizes_question() {
        let candidates = vec![candidate("sred", "SR&ED")];
        let key1 = RoutingCache::compute_key("What is SR&ED?", &candidates);
        let key2 = RoutingCache::compute_key("  what   is sr&ed? ", &candidates);
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_varies_with_candidate_set() {
        let one = vec![candidate("sred", "SR&ED")];
        let two = vec![candidate("sred", "SR&ED"), candidate("gst", "GST")];
        let changed = vec![candidate("sred", "scientific research")];

        let base = RoutingCache::compute_key("q", &one);
        assert_ne!(base, RoutingCache::compute_key("q", &two));
        assert_ne!(base, RoutingCache::compute_key("q", &changed));
    }

    #[test]
    fn test_fingerprint_ignores_order() {
        let a = vec![candidate("sred", "SR&ED"), candidate("gst", "GST")];
        let b = vec![candidate("gst", "GST"), candidate("sred", "SR&ED")];
        assert_eq!(RoutingCache::fingerprint(&a), RoutingCache::fingerprint(&b));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = RoutingCache::new(10, Duration::from_secs(60));
        let key = RoutingCache::compute_key("q", &[]);
        cache.set(&key, RoutingDecision::no_match("none")).await;
        cache.clear().await;
        assert!(cache.get(&key).await.is_none());
    }
}
