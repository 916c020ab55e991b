//! Skill Type Definitions
//!
//! Core data structures for the skill library.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A reference document plus its routing metadata.
///
/// Immutable once built; a reload replaces whole records.
#[derive(Debug, Clone, Serialize)]
pub struct Skill {
    pub skill_id: String,
    pub title: String,
    pub domain: String,
    /// Literal phrases for the rule-based pre-filter, in file order
    pub triggers: Vec<String>,
    pub keywords: Vec<String>,
    pub topics: Vec<String>,
    /// Weak references to skills often needed alongside this one
    pub related_skills: Vec<String>,
    pub version: Option<String>,
    pub last_updated: Option<String>,
    /// Full document text, never chunked
    #[serde(skip)]
    pub body: Arc<str>,
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Skill {
    /// Build a skill in memory (no source file)
    pub fn new(skill_id: &str, title: &str, domain: &str, triggers: &[&str], body: &str) -> Self {
        Self {
            skill_id: skill_id.to_string(),
            title: title.to_string(),
            domain: domain.to_string(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            keywords: Vec::new(),
            topics: Vec::new(),
            related_skills: Vec::new(),
            version: None,
            last_updated: None,
            body: Arc::from(body),
            source_path: None,
        }
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_related(mut self, related: &[&str]) -> Self {
        self.related_skills = related.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Check the load-time invariants
    pub fn validate(&self) -> Result<(), SkillError> {
        if self.skill_id.trim().is_empty() {
            return Err(SkillError::MissingField("skill_id"));
        }
        if !self
            .skill_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(SkillError::InvalidSkillId(self.skill_id.clone()));
        }
        if self.title.trim().is_empty() {
            return Err(SkillError::MissingField("title"));
        }
        if self.domain.trim().is_empty() {
            return Err(SkillError::MissingField("domain"));
        }
        if self.triggers.iter().all(|t| t.trim().is_empty()) {
            return Err(SkillError::EmptyTriggers);
        }
        if self.body.trim().is_empty() {
            return Err(SkillError::EmptyBody);
        }
        Ok(())
    }

    /// Metadata-only view for the router prompt
    pub fn candidate(&self) -> SkillCandidate {
        SkillCandidate {
            skill_id: self.skill_id.clone(),
            title: self.title.clone(),
            domain: self.domain.clone(),
            triggers: self.triggers.clone(),
            keywords: self.keywords.clone(),
            related_skills: self.related_skills.clone(),
        }
    }
}

/// Skill metadata without the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCandidate {
    pub skill_id: String,
    pub title: String,
    pub domain: String,
    pub triggers: Vec<String>,
    pub keywords: Vec<String>,
    pub related_skills: Vec<String>,
}

/// Skill file validation errors
#[derive(Debug, thiserror::Error)]
pub enum SkillError {
    #[error("Missing '---' metadata block at start of file")]
    MissingMetadataBlock,

    #[error("Metadata block is not closed by a '---' line")]
    UnterminatedMetadataBlock,

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid skill_id: {0}")]
    InvalidSkillId(String),

    #[error("Skill must declare at least one trigger")]
    EmptyTriggers,

    #[error("Skill body is empty")]
    EmptyBody,

    #[error("Duplicate skill_id: {0}")]
    DuplicateId(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
