//! skillchat
//!
//! Skill-routed reference chat for Canadian corporate tax questions.
//!
//! # Features
//!
//! - **Skill library**: whole reference documents with TOML metadata, hot reloadable
//! - **LLM routing**: one call over skill metadata picks the documents to load
//! - **Trigger short-circuit**: a single unambiguous trigger phrase skips the routing call
//! - **Routing cache**: moka-backed, keyed by question and skill set
//! - **Grounded answers**: full document bodies in context, never chunked
//! - **Providers**: Claude (Anthropic Messages API) or GLM (Zhipu)
//!
//! # Architecture
//!
//! ```text
//! question ──► Router ──► skill ids ──► Answerer ──► answer
//!                │                         │
//!                ├── TriggerRouter          └── SkillStore bodies
//!                ├── CachedRouter (moka)
//!                └── LlmRouter ──► routing model
//! ```

pub mod answerer;
pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod router;
pub mod server;
pub mod skills;
pub mod tokenizer;

pub use answerer::{Answer, AnswerChunk, AnswerSettings, AnswerStream, Answerer};
pub use cache::{CacheStats, RoutingCache};
pub use chat::{ChatExchange, ChatRequest, ChatResponse, ChatService, RoutingInfo};
pub use config::Config;
pub use error::ChatError;
pub use llm::{ChatMessage, LlmClient, LlmError, Provider, Role};
pub use router::{CachedRouter, Confidence, LlmRouter, Router, RoutingDecision, TriggerRouter};
pub use skills::{Skill, SkillCandidate, SkillError, SkillStore};
pub use tokenizer::TokenCounter;
