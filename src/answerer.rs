//! Answerer
//!
//! Builds one prompt from the question, history, and the full bodies of the
//! routed skills, then calls the answering model. Bodies are included whole
//! or not at all; a context over the model's input limit fails with
//! `ContextTooLarge` rather than dropping text.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ChatError;
use crate::llm::{
    sanitize_history, with_retry, ChatMessage, CompletionRequest, CompletionStream, LlmClient, LlmError,
    RetryPolicy, StreamEvent,
};
use crate::skills::SkillStore;
use crate::tokenizer::TokenCounter;

const GROUNDED_SYSTEM_PROMPT: &str = "You answer questions about Canadian corporate income tax using the reference documents below. \
Base your answer on these documents and cite the relevant form, schedule or line where the documents give one. \
If the documents do not cover the question, say so plainly before adding anything from general knowledge.";

const GENERAL_SYSTEM_PROMPT: &str = "You answer questions about Canadian corporate income tax. \
No reference document in the library matched this question, so answer from general knowledge and say that you are doing so.";

/// Answering limits
#[derive(Debug, Clone)]
pub struct AnswerSettings {
    /// Input limit of the answering model, in estimated tokens
    pub max_context_tokens: usize,
    pub max_answer_tokens: u32,
    pub temperature: Option<f32>,
    pub retry: RetryPolicy,
}

impl Default for AnswerSettings {
    fn default() -> Self {
        Self {
            max_context_tokens: 180_000,
            max_answer_tokens: 4096,
            temperature: Some(0.2),
            retry: RetryPolicy::default(),
        }
    }
}

/// Final answer with bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    pub loaded_skills: Vec<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Answer {
    pub fn tokens_used(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Piece of a streamed answer
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerChunk {
    Delta(String),
    Done {
        loaded_skills: Vec<String>,
        input_tokens: u32,
        output_tokens: u32,
    },
}

/// Streamed answer. Dropping it cancels the upstream request.
pub type AnswerStream = BoxStream<'static, Result<AnswerChunk, ChatError>>;

/// Prepared request plus the skills it carries
struct Prepared {
    request: CompletionRequest,
    loaded_skills: Vec<String>,
}

pub struct Answerer {
    client: Arc<dyn LlmClient>,
    store: Arc<SkillStore>,
    counter: TokenCounter,
    settings: AnswerSettings,
}

impl Answerer {
    pub fn new(client: Arc<dyn LlmClient>, store: Arc<SkillStore>, settings: AnswerSettings) -> Self {
        Self {
            client,
            store,
            counter: TokenCounter::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &AnswerSettings {
        &self.settings
    }

    fn prepare(&self, question: &str, history: &[ChatMessage], skill_ids: &[String]) -> Result<Prepared, ChatError> {
        let question = crate::router::ensure_question(question)?;

        let mut loaded_skills = Vec::with_capacity(skill_ids.len());
        let system = if skill_ids.is_empty() {
            GENERAL_SYSTEM_PROMPT.to_string()
        } else {
            let snapshot = self.store.snapshot()?;
            let mut seen = HashSet::new();
            let mut system = String::from(GROUNDED_SYSTEM_PROMPT);

            for id in skill_ids {
                if !seen.insert(id.as_str()) {
                    continue;
                }
                let skill = snapshot
                    .get(id)
                    .ok_or_else(|| ChatError::UnknownSkill(id.clone()))?;
                let _ = write!(
                    system,
                    "\n\n<document id=\"{}\" title=\"{}\">\n{}\n</document>",
                    skill.skill_id,
                    escape_attr(&skill.title),
                    skill.body.trim_end()
                );
                loaded_skills.push(skill.skill_id.clone());
            }
            system
        };

        let mut messages = sanitize_history(history);
        if messages.last().map(|m| m.role == crate::llm::Role::User).unwrap_or(false) {
            // The API needs alternating roles; fold a dangling user turn into this one
            let dangling = messages.pop().map(|m| m.content).unwrap_or_default();
            messages.push(ChatMessage::user(format!("{}\n\n{}", dangling, question)));
        } else {
            messages.push(ChatMessage::user(question));
        }

        let request = CompletionRequest {
            system,
            messages,
            max_tokens: self.settings.max_answer_tokens,
            temperature: self.settings.temperature,
        };

        let estimated = self.counter.count_request(&request);
        if estimated > self.settings.max_context_tokens {
            return Err(ChatError::ContextTooLarge {
                estimated,
                limit: self.settings.max_context_tokens,
            });
        }

        debug!(
            "Prepared answer request: skills=[{}], ~{} input tokens",
            loaded_skills.join(", "),
            estimated
        );

        Ok(Prepared { request, loaded_skills })
    }

    /// Answer with the given skills as context. An empty list is not an error.
    pub async fn answer(
        &self,
        question: &str,
        history: &[ChatMessage],
        skill_ids: &[String],
    ) -> Result<Answer, ChatError> {
        let Prepared { request, loaded_skills } = self.prepare(question, history, skill_ids)?;

        let completion = with_retry(&self.settings.retry, "answering call", || self.client.complete(&request))
            .await
            .map_err(ChatError::from_answering)?;

        info!(
            "Answered via {} with [{}]: in={}, out={}",
            self.client.name(),
            loaded_skills.join(", "),
            completion.input_tokens,
            completion.output_tokens
        );

        Ok(Answer {
            text: completion.text,
            loaded_skills,
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
        })
    }

    /// Streaming variant. Only opening the stream is retried; a failure after
    /// the first chunk ends the stream with an error item.
    pub async fn answer_stream(
        &self,
        question: &str,
        history: &[ChatMessage],
        skill_ids: &[String],
    ) -> Result<AnswerStream, ChatError> {
        let Prepared { request, loaded_skills } = self.prepare(question, history, skill_ids)?;

        let upstream = with_retry(&self.settings.retry, "answering stream", || self.client.stream(&request))
            .await
            .map_err(ChatError::from_answering)?;

        Ok(answer_chunks(upstream, loaded_skills))
    }
}

struct ChunkState {
    upstream: CompletionStream,
    loaded_skills: Vec<String>,
    input_tokens: u32,
    output_tokens: u32,
    finished: bool,
}

/// Map provider events to answer chunks, ending with `Done` or one error
/// Quote-safe attribute text for the document tags
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn answer_chunks(upstream: CompletionStream, loaded_skills: Vec<String>) -> AnswerStream {
    let state = ChunkState {
        upstream,
        loaded_skills,
        input_tokens: 0,
        output_tokens: 0,
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        if st.finished {
            return None;
        }
        loop {
            match st.upstream.next().await {
                Some(Ok(StreamEvent::TextDelta(text))) => {
                    if !text.is_empty() {
                        return Some((Ok(AnswerChunk::Delta(text)), st));
                    }
                }
                Some(Ok(StreamEvent::Usage { input_tokens, output_tokens })) => {
                    if let Some(n) = input_tokens {
                        st.input_tokens = n;
                    }
                    if let Some(n) = output_tokens {
                        st.output_tokens = n;
                    }
                }
                Some(Ok(StreamEvent::Done)) => {
                    st.finished = true;
                    let done = AnswerChunk::Done {
                        loaded_skills: st.loaded_skills.clone(),
                        input_tokens: st.input_tokens,
                        output_tokens: st.output_tokens,
                    };
                    return Some((Ok(done), st));
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(ChatError::from_answering(e)), st));
                }
                None => {
                    st.finished = true;
                    let err = LlmError::MalformedResponse("answer stream ended without completion".to_string());
                    return Some((Err(ChatError::from_answering(err)), st));
                }
            }
        }
    })
    .boxed()
}
