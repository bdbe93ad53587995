//! Store trait for learner progress records.

use super::{MistakeRecord, PersistenceError};

/// Keyed store for [`MistakeRecord`]s. Read at session start, written at
/// classification time; implementations must be safe to share across
/// session actors.
pub trait MistakeStore: Send + Sync {
    fn get(&self, problem_id: &str) -> Result<Option<MistakeRecord>, PersistenceError>;
    fn put(&self, record: &MistakeRecord) -> Result<(), PersistenceError>;
    /// Problem ids currently enrolled in the mistake set.
    fn flagged_ids(&self) -> Result<Vec<String>, PersistenceError>;
}
