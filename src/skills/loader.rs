//! Skill Loader
//!
//! Parses skill files and loads a directory of them.
//!
//! A skill file is a TOML metadata block between two `---` lines followed
//! by the document body verbatim:
//!
//! ```text
//! ---
//! skill_id = "t2-basics"
//! title = "T2 Corporation Income Tax Return basics"
//! domain = "filing"
//! triggers = ["T2 return", "T2 form"]
//! keywords = ["schedule 1", "filing deadline"]
//! related_skills = ["sbd"]
//! version = "1.0"
//! last_updated = 2024-11-02
//! ---
//! # T2 basics
//! ...
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::types::{Skill, SkillError};

/// File extensions treated as skill files
const SKILL_EXTENSIONS: &[&str] = &["md", "skill"];

/// Raw metadata block
#[derive(Debug, Deserialize)]
struct FrontMatter {
    skill_id: Option<String>,
    title: Option<String>,
    domain: Option<String>,
    triggers: Option<Vec<String>>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    related_skills: Vec<String>,
    version: Option<toml::Value>,
    last_updated: Option<toml::Value>,
}

/// A file that failed validation
#[derive(Debug, Clone, Serialize)]
pub struct RejectedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of loading a directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub rejected: Vec<RejectedFile>,
}

/// Parse one skill file. Any missing required key fails the whole file.
pub fn parse_skill_file(path: &Path, content: &str) -> Result<Skill, SkillError> {
    let (metadata, body) = split_front_matter(content)?;

    let fm: FrontMatter = toml::from_str(metadata).map_err(|e| SkillError::InvalidMetadata(e.message().to_string()))?;

    let skill = Skill {
        skill_id: required(fm.skill_id, "skill_id")?,
        title: required(fm.title, "title")?,
        domain: required(fm.domain, "domain")?,
        triggers: dedupe(fm.triggers.ok_or(SkillError::MissingField("triggers"))?),
        keywords: dedupe(fm.keywords),
        topics: dedupe(fm.topics),
        related_skills: dedupe(fm.related_skills),
        version: fm.version.map(|v| scalar_to_string(v, "version")).transpose()?,
        last_updated: fm
            .last_updated
            .map(|v| scalar_to_string(v, "last_updated"))
            .transpose()?,
        body: Arc::from(body),
        source_path: Some(path.to_path_buf()),
    };

    skill.validate()?;
    Ok(skill)
}

/// Read and parse one file from disk
pub async fn load_file(path: &Path) -> Result<Skill, SkillError> {
    let content = tokio::fs::read_to_string(path).await?;
    parse_skill_file(path, &content)
}

/// Load every skill file in `dir`, in file-name order.
///
/// Invalid files and duplicate ids are rejected and logged; the caller
/// decides whether an empty result is fatal.
pub async fn load_dir(dir: &Path) -> Result<(Vec<Skill>, LoadReport), SkillError> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_skill = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SKILL_EXTENSIONS.contains(&e))
            .unwrap_or(false);
        if is_skill && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut skills: Vec<Skill> = Vec::new();
    let mut seen = HashSet::new();
    let mut report = LoadReport::default();

    for path in paths {
        let result = load_file(&path).await.and_then(|skill| {
            if seen.contains(&skill.skill_id) {
                Err(SkillError::DuplicateId(skill.skill_id))
            } else {
                Ok(skill)
            }
        });

        match result {
            Ok(skill) => {
                debug!("Loaded skill '{}' from {}", skill.skill_id, path.display());
                seen.insert(skill.skill_id.clone());
                report.loaded.push(skill.skill_id.clone());
                skills.push(skill);
            }
            Err(e) => {
                warn!("Rejected skill file {}: {}", path.display(), e);
                report.rejected.push(RejectedFile {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Loaded {} skill(s) from {} ({} rejected)",
        report.loaded.len(),
        dir.display(),
        report.rejected.len()
    );

    Ok((skills, report))
}

/// Split `---` metadata from the body. The body is returned verbatim.
fn split_front_matter(content: &str) -> Result<(&str, &str), SkillError> {
    let content = content.trim_start_matches('\u{feff}').trim_start();

    let mut lines = content.split_inclusive('\n');
    let first = lines.next().ok_or(SkillError::MissingMetadataBlock)?;
    if first.trim_end() != "---" {
        return Err(SkillError::MissingMetadataBlock);
    }

    let meta_start = first.len();
    let mut pos = meta_start;
    for line in lines {
        if line.trim_end() == "---" {
            let metadata = &content[meta_start..pos];
            let body = &content[pos + line.len()..];
            return Ok((metadata, body));
        }
        pos += line.len();
    }

    Err(SkillError::UnterminatedMetadataBlock)
}

fn required(value: Option<String>, field: &'static str) -> Result<String, SkillError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(SkillError::MissingField(field)),
    }
}

fn scalar_to_string(value: toml::Value, field: &str) -> Result<String, SkillError> {
    match value {
        toml::Value::String(s) => Ok(s),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        other => Err(SkillError::InvalidMetadata(format!(
            "{} must be a string or date, got {}",
            field,
            other.type_str()
        ))),
    }
}

/// Trim and drop blank/duplicate entries (case-insensitive), keeping order
fn dedupe(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
        .collect()
}
