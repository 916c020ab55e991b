//! Strict routing reply parser
//!
//! Accepts exactly one JSON object, bare or inside a single ```json fence:
//!
//! ```json
//! {"skill_ids": ["t2-basics"], "confidence": "high", "reasoning": "..."}
//! ```
//!
//! Anything else (extra prose, unknown fields, wrong types, ids that are not
//! candidates) fails with `RoutingParse`. There is no fallback selection.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;

use super::{Confidence, RoutingDecision};
use crate::error::ChatError;
use crate::skills::SkillCandidate;

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:json)?[ \t]*\r?\n(.*?)\r?\n?```$").expect("static regex")
});

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReply {
    skill_ids: Vec<String>,
    confidence: String,
    reasoning: String,
}

/// Parse the routing model's reply against the candidate set
pub fn parse_routing_reply(text: &str, candidates: &[SkillCandidate]) -> Result<RoutingDecision, ChatError> {
    let trimmed = text.trim();
    let json = match FENCED_JSON.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default(),
        None => trimmed,
    };

    if !(json.starts_with('{') && json.ends_with('}')) {
        return Err(ChatError::RoutingParse(format!(
            "expected a single JSON object, got: {}",
            preview(trimmed)
        )));
    }

    let raw: RawReply = serde_json::from_str(json)
        .map_err(|e| ChatError::RoutingParse(format!("{} in: {}", e, preview(json))))?;

    let confidence = match raw.confidence.trim().to_ascii_lowercase().as_str() {
        "low" => Confidence::Low,
        "medium" => Confidence::Medium,
        "high" => Confidence::High,
        other => {
            return Err(ChatError::RoutingParse(format!(
                "confidence must be low, medium or high, got '{}'",
                other
            )))
        }
    };

    let known: HashSet<&str> = candidates.iter().map(|c| c.skill_id.as_str()).collect();
    let mut seen = HashSet::new();
    let mut skill_ids = Vec::with_capacity(raw.skill_ids.len());
    for id in raw.skill_ids {
        let id = id.trim().to_string();
        if !known.contains(id.as_str()) {
            return Err(ChatError::RoutingParse(format!("'{}' is not a candidate skill", id)));
        }
        if seen.insert(id.clone()) {
            skill_ids.push(id);
        }
    }

    let confidence = if skill_ids.is_empty() { Confidence::Low } else { confidence };

    Ok(RoutingDecision {
        skill_ids,
        confidence,
        reasoning: raw.reasoning.trim().to_string(),
    })
}

const PREVIEW_CHARS: usize = 120;

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
