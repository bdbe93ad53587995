//! Generic JSON-file-per-record persistence store.

use super::traits::MistakeStore;
use super::{MistakeRecord, PersistenceError};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use std::path::PathBuf;

/// Trait for types that can be persisted in a JsonStore.
pub trait Storable: Serialize + DeserializeOwned {
    fn id(&self) -> &str;
}

impl Storable for MistakeRecord {
    fn id(&self) -> &str {
        &self.problem_id
    }
}

/// One JSON file per record, named by the record id.
pub struct JsonStore<T> {
    dir: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T: Storable> JsonStore<T> {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            _phantom: PhantomData,
        }
    }

    pub fn ensure_dir(&self) -> Result<(), PersistenceError> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn file_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Save a record. Returns the id.
    pub fn save(&self, data: &T) -> Result<String, PersistenceError> {
        self.ensure_dir()?;
        let path = self.file_path(data.id());
        let json = serde_json::to_string_pretty(data)?;
        std::fs::write(&path, json)?;
        Ok(data.id().to_string())
    }

    /// Load a record by id. Returns None if not found.
    pub fn load(&self, id: &str) -> Result<Option<T>, PersistenceError> {
        let path = self.file_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let data = serde_json::from_str(&contents)?;
        Ok(Some(data))
    }

    /// Load all records from the store directory, skipping files that fail
    /// to parse.
    pub fn load_all(&self) -> Result<Vec<T>, PersistenceError> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }
        let mut items = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => {
                        if let Ok(data) = serde_json::from_str::<T>(&contents) {
                            items.push(data);
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read file {:?}: {}", path, e);
                    }
                }
            }
        }
        Ok(items)
    }

    /// Delete a record by id.
    pub fn delete(&self, id: &str) -> Result<(), PersistenceError> {
        let path = self.file_path(id);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// File-backed mistake store.
pub struct MistakeFileStore {
    inner: JsonStore<MistakeRecord>,
}

impl MistakeFileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            inner: JsonStore::new(dir.join("mistakes")),
        }
    }
}

impl MistakeStore for MistakeFileStore {
    fn get(&self, problem_id: &str) -> Result<Option<MistakeRecord>, PersistenceError> {
        self.inner.load(problem_id)
    }

    fn put(&self, record: &MistakeRecord) -> Result<(), PersistenceError> {
        self.inner.save(record)?;
        Ok(())
    }

    fn flagged_ids(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .inner
            .load_all()?
            .into_iter()
            .filter(|r| r.flagged)
            .map(|r| r.problem_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = MistakeFileStore::new(dir.path().to_path_buf());

        assert_eq!(store.get("p1").unwrap(), None);

        let mut record = MistakeRecord::new("p1");
        record.attempts = 3;
        record.solved = 1;
        store.put(&record).unwrap();

        assert_eq!(store.get("p1").unwrap(), Some(record));
    }

    #[test]
    fn test_flagged_ids_filters() {
        let dir = tempfile::tempdir().unwrap();
        let store = MistakeFileStore::new(dir.path().to_path_buf());

        let mut a = MistakeRecord::new("a");
        a.flagged = true;
        let b = MistakeRecord::new("b");
        store.put(&a).unwrap();
        store.put(&b).unwrap();

        assert_eq!(store.flagged_ids().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_corrupt_file_skipped_by_load_all() {
        let dir = tempfile::tempdir().unwrap();
        let store = MistakeFileStore::new(dir.path().to_path_buf());
        store.put(&MistakeRecord::new("ok")).unwrap();
        std::fs::write(dir.path().join("mistakes").join("bad.json"), "{nope").unwrap();

        assert_eq!(store.flagged_ids().unwrap().len(), 0);
        assert!(store.get("ok").unwrap().is_some());
    }
}
