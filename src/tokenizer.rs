//! Token Counter - pre-flight context size check
//!
//! Estimates tokens BEFORE sending to the answering model so an oversized
//! context fails fast instead of being truncated.

use crate::llm::CompletionRequest;

/// Token counter using a character-based approximation
///
/// Claude and GLM both use BPE tokenizers; ~3.8 characters per token is a
/// good approximation for English prose without external dependencies.
#[derive(Debug, Clone)]
pub struct TokenCounter {
    chars_per_token: f32,
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCounter {
    pub fn new() -> Self {
        Self { chars_per_token: 3.8 }
    }

    /// Count approximate tokens in text
    ///
    /// Accuracy: ±10% for typical text.
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        let char_count = text.chars().count();
        let base_tokens = (char_count as f32 / self.chars_per_token).ceil() as usize;

        (base_tokens as f32 * self.calculate_adjustments(text)).ceil() as usize
    }

    /// Adjustment factor based on content type
    fn calculate_adjustments(&self, text: &str) -> f32 {
        let mut factor = 1.0f32;

        // Tables are pipe- and dash-heavy
        let table_chars = text.chars().filter(|c| *c == '|').count() as f32;
        if table_chars / text.len().max(1) as f32 > 0.02 {
            factor *= 1.15;
        }

        // URLs are token-heavy
        if text.contains("http://") || text.contains("https://") {
            factor *= 1.1;
        }

        // Dollar amounts, rates and line numbers compress less well than prose
        let digit_ratio = text.chars().filter(|c| c.is_ascii_digit()).count() as f32
            / text.len().max(1) as f32;
        if digit_ratio > 0.3 {
            factor *= 1.1;
        }

        factor
    }

    /// Count tokens in a message with role
    pub fn count_message(&self, content: &str) -> usize {
        // ~4 tokens of role/formatting overhead per message
        4 + self.count(content)
    }

    /// Estimated input tokens for a full request
    pub fn count_request(&self, request: &CompletionRequest) -> usize {
        self.count(&request.system)
            + request
                .messages
                .iter()
                .map(|m| self.count_message(&m.content))
                .sum::<usize>()
    }
}
