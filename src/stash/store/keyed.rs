use super::backend::StorageBackend;
use super::KeyMap;
use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Cached view of one keyed file.
///
/// Reads and writes touch only the in-memory map; nothing reaches the backend
/// until [`KeyedFile::commit`], which writes every staged key at once.
#[derive(Debug, Clone)]
pub struct KeyedFile {
    path: PathBuf,
    entries: KeyMap,
    dirty: bool,
}

impl KeyedFile {
    /// An empty cache for `path`, ignoring whatever is on disk.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: KeyMap::new(),
            dirty: false,
        }
    }

    /// Cache the current contents of `path`; a missing file yields an empty map.
    pub fn open<B: StorageBackend + ?Sized>(backend: &B, path: &Path) -> Result<Self, StoreError> {
        let entries = backend.read(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// `None` when the key is absent, `Some(Err)` when it does not decode.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<Result<T, serde_json::Error>> {
        self.entries
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.entries.insert(key.to_string(), value);
        self.dirty = true;
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.dirty |= removed;
        removed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write every staged key in one atomic backend write.
    pub fn commit<B: StorageBackend + ?Sized>(&mut self, backend: &B) -> Result<(), StoreError> {
        backend.write(&self.path, &self.entries)?;
        self.dirty = false;
        Ok(())
    }
}
