//! Learner-progress persistence.
//!
//! The trainer only needs a keyed record store: per-problem attempt and
//! solve counters plus mistake-set membership. The store is injected as a
//! trait object so file-backed and in-memory backends are interchangeable.

pub mod json_store;
pub mod memory;
pub mod traits;

pub use json_store::{JsonStore, MistakeFileStore, Storable};
pub use memory::MemoryMistakeStore;
pub use traits::MistakeStore;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-problem learner bookkeeping. `attempts >= solved` always holds:
/// attempts are counted when a session starts, solves when it genuinely
/// finishes on the canonical line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakeRecord {
    pub problem_id: String,
    pub attempts: u32,
    pub solved: u32,
    /// Mistake-set membership, set permanently at the second mistake within
    /// one attempt.
    #[serde(default)]
    pub flagged: bool,
}

impl MistakeRecord {
    pub fn new(problem_id: impl Into<String>) -> Self {
        Self {
            problem_id: problem_id.into(),
            attempts: 0,
            solved: 0,
            flagged: false,
        }
    }
}
