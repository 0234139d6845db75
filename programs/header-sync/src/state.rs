//! JSON file persistence of the synchroniser state.

use std::path::{Path, PathBuf};

use anyhow::Context;
use header_sync_core::MemoryStorage;
use tracing::debug;

/// The state file on disk.
#[derive(Clone, Debug)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    /// A state file at `path`. Nothing is read until [`Self::load`].
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the state, empty if the file does not exist yet.
    ///
    /// # Errors
    /// Fails if the file cannot be read or does not hold a state map.
    pub fn load(&self) -> anyhow::Result<MemoryStorage> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no state file, starting empty");
            return Ok(MemoryStorage::new());
        }
        let bz = std::fs::read(&self.path)
            .with_context(|| format!("failed to read state {}", self.path.display()))?;
        let storage: MemoryStorage = serde_json::from_slice(&bz)
            .with_context(|| format!("state {} is corrupted", self.path.display()))?;
        debug!(path = %self.path.display(), entries = storage.len(), "state loaded");
        Ok(storage)
    }

    /// Writes the state, replacing the previous file in one rename.
    ///
    /// # Errors
    /// Fails if the file cannot be written.
    pub fn save(&self, storage: &MemoryStorage) -> anyhow::Result<()> {
        let bz = serde_json::to_vec_pretty(storage)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bz).with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace state {}", self.path.display()))?;
        debug!(path = %self.path.display(), entries = storage.len(), "state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use header_sync_core::Storage;

    use super::*;

    #[test]
    fn missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));
        assert!(file.load().unwrap().is_empty());
    }

    #[test]
    fn saved_state_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(dir.path().join("state.json"));

        let mut storage = MemoryStorage::new();
        storage.set(b"genesis/5", b"{}");
        storage.set(&[0xff, 0x00], &[1, 2, 3]);
        file.save(&storage).unwrap();

        let loaded = file.load().unwrap();
        assert_eq!(loaded.get(b"genesis/5"), Some(b"{}".to_vec()));
        assert_eq!(loaded.get(&[0xff, 0x00]), Some(vec![1, 2, 3]));
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"not json").unwrap();
        let err = StateFile::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("corrupted"));
    }
}
