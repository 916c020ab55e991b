//! Skill Store
//!
//! Read-only registry of loaded skills. The registry lives in a single
//! immutable `SkillSnapshot`; reload builds a new snapshot and swaps the
//! `Arc` in one step, so requests already holding the old snapshot finish
//! against it undisturbed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::info;

use super::loader::{self, LoadReport};
use super::types::{Skill, SkillCandidate, SkillError};
use crate::error::ChatError;

/// Immutable set of skills
#[derive(Debug)]
pub struct SkillSnapshot {
    skills: HashMap<String, Arc<Skill>>,
    order: Vec<String>,
    loaded_at: DateTime<Utc>,
}

impl SkillSnapshot {
    /// Build from validated records. Fails on duplicate ids.
    pub fn new(skills: Vec<Skill>) -> Result<Self, SkillError> {
        let mut map = HashMap::with_capacity(skills.len());
        let mut order = Vec::with_capacity(skills.len());

        for skill in skills {
            skill.validate()?;
            if map.contains_key(&skill.skill_id) {
                return Err(SkillError::DuplicateId(skill.skill_id));
            }
            order.push(skill.skill_id.clone());
            map.insert(skill.skill_id.clone(), Arc::new(skill));
        }

        Ok(Self {
            skills: map,
            order,
            loaded_at: Utc::now(),
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, skill_id: &str) -> Option<&Arc<Skill>> {
        self.skills.get(skill_id)
    }

    /// Skills in load order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Skill>> {
        self.order.iter().filter_map(|id| self.skills.get(id))
    }

    pub fn candidates(&self) -> Vec<SkillCandidate> {
        self.iter().map(|s| s.candidate()).collect()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Registry of skills, swapped wholesale on reload
pub struct SkillStore {
    source_dir: Option<PathBuf>,
    current: RwLock<Option<Arc<SkillSnapshot>>>,
}

impl SkillStore {
    /// Empty store; lookups fail with `NotInitialized` until loaded
    pub fn new() -> Self {
        Self {
            source_dir: None,
            current: RwLock::new(None),
        }
    }

    /// Store backed by a directory of skill files. Nothing is read yet.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: Some(dir.into()),
            current: RwLock::new(None),
        }
    }

    /// Load a directory. Zero valid skills is a fatal configuration error.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<(Self, LoadReport), ChatError> {
        let store = Self::with_dir(dir);
        let report = store.reload().await?;
        Ok((store, report))
    }

    /// Build from in-memory records
    pub fn from_skills(skills: Vec<Skill>) -> Result<Self, ChatError> {
        let store = Self::new();
        store.install(skills)?;
        Ok(store)
    }

    /// Directory this store reloads from
    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    /// Replace the registry with `skills`
    pub fn install(&self, skills: Vec<Skill>) -> Result<(), ChatError> {
        if skills.is_empty() {
            return Err(ChatError::Configuration("no valid skills to load".to_string()));
        }
        let snapshot = Arc::new(SkillSnapshot::new(skills)?);
        let count = snapshot.len();
        *self.current.write() = Some(snapshot);
        info!("Skill registry now holds {} skill(s)", count);
        Ok(())
    }

    /// Re-read the source directory and swap in the result.
    ///
    /// On any failure the previous snapshot stays in place.
    pub async fn reload(&self) -> Result<LoadReport, ChatError> {
        let dir = self
            .source_dir
            .as_deref()
            .ok_or_else(|| ChatError::Configuration("skill store has no source directory".to_string()))?;

        let (skills, report) = loader::load_dir(dir).await.map_err(|e| {
            ChatError::Configuration(format!("cannot read skills directory {}: {}", dir.display(), e))
        })?;

        if skills.is_empty() {
            return Err(ChatError::Configuration(format!(
                "no valid skills in {} ({} file(s) rejected)",
                dir.display(),
                report.rejected.len()
            )));
        }

        self.install(skills)?;
        Ok(report)
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Result<Arc<SkillSnapshot>, ChatError> {
        self.current.read().clone().ok_or(ChatError::NotInitialized)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    /// Metadata for every skill, no bodies
    pub fn list_candidates(&self) -> Result<Vec<SkillCandidate>, ChatError> {
        Ok(self.snapshot()?.candidates())
    }

    /// Full record lookup
    pub fn get(&self, skill_id: &str) -> Result<Arc<Skill>, ChatError> {
        self.snapshot()?
            .get(skill_id)
            .cloned()
            .ok_or_else(|| ChatError::UnknownSkill(skill_id.to_string()))
    }

    /// Full document text for one skill
    pub fn get_body(&self, skill_id: &str) -> Result<Arc<str>, ChatError> {
        Ok(self.get(skill_id)?.body.clone())
    }
}

impl Default for SkillStore {
    fn default() -> Self {
        Self::new()
    }
}
