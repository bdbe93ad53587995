//! In-memory mistake store, for tests and embedding without a data dir.

use super::traits::MistakeStore;
use super::{MistakeRecord, PersistenceError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct MemoryMistakeStore {
    records: Mutex<HashMap<String, MistakeRecord>>,
}

impl MemoryMistakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, MistakeRecord>> {
        // A poisoned lock only means a writer panicked mid-insert; the map
        // itself is still usable.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MistakeStore for MemoryMistakeStore {
    fn get(&self, problem_id: &str) -> Result<Option<MistakeRecord>, PersistenceError> {
        Ok(self.records().get(problem_id).cloned())
    }

    fn put(&self, record: &MistakeRecord) -> Result<(), PersistenceError> {
        self.records()
            .insert(record.problem_id.clone(), record.clone());
        Ok(())
    }

    fn flagged_ids(&self) -> Result<Vec<String>, PersistenceError> {
        let mut ids: Vec<String> = self
            .records()
            .values()
            .filter(|r| r.flagged)
            .map(|r| r.problem_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryMistakeStore::new();
        assert!(store.get("x").unwrap().is_none());

        let mut record = MistakeRecord::new("x");
        record.flagged = true;
        store.put(&record).unwrap();

        assert_eq!(store.get("x").unwrap(), Some(record));
        assert_eq!(store.flagged_ids().unwrap(), vec!["x".to_string()]);
    }
}
