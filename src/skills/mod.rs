//! Skill Library
//!
//! A skill is one whole reference document plus the metadata the router
//! needs to pick it. Documents are never chunked: a selected skill goes into
//! the answering prompt in full.
//!
//! # Architecture
//!
//! ```text
//! skills/*.md ──► loader (parse + validate) ──► SkillSnapshot ──► SkillStore
//!                        │                                          │
//!                  rejected files                    list_candidates() / get_body()
//!                  logged + reported
//! ```

pub mod loader;
pub mod store;
pub mod types;

pub use loader::{load_dir, load_file, parse_skill_file, LoadReport, RejectedFile};
pub use store::{SkillSnapshot, SkillStore};
pub use types::{Skill, SkillCandidate, SkillError};
