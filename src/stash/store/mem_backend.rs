use super::backend::StorageBackend;
use super::KeyMap;
use crate::error::StoreError;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// In-memory storage backend for testing.
///
/// Files are kept as encoded bytes so backups and corrupt files behave the
/// way they do on disk. Uses `RefCell` for interior mutability since the
/// stash is single-threaded.
#[derive(Default)]
pub struct MemBackend {
    files: RefCell<HashMap<PathBuf, Vec<u8>>>,
    dirs: RefCell<HashSet<PathBuf>>,
    writes: Cell<usize>,
    simulate_write_error: Cell<bool>,
    simulate_copy_error: Cell<bool>,
    simulate_dir_error: Cell<bool>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    pub fn set_simulate_copy_error(&self, simulate: bool) {
        self.simulate_copy_error.set(simulate);
    }

    pub fn set_simulate_dir_error(&self, simulate: bool) {
        self.simulate_dir_error.set(simulate);
    }

    /// Number of successful `write` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Test helper to plant arbitrary bytes, e.g. a corrupt or legacy file.
    pub fn put_bytes(&self, path: &Path, bytes: impl Into<Vec<u8>>) {
        self.files
            .borrow_mut()
            .insert(path.to_path_buf(), bytes.into());
    }

    pub fn put_map(&self, path: &Path, map: &KeyMap) {
        let bytes = serde_json::to_vec_pretty(map).unwrap_or_default();
        self.put_bytes(path, bytes);
    }

    pub fn bytes(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn has_dir(&self, dir: &Path) -> bool {
        self.dirs.borrow().contains(dir)
    }
}

impl StorageBackend for MemBackend {
    fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError> {
        if self.simulate_dir_error.get() {
            return Err(StoreError::Backend("Simulated mkdir error".to_string()));
        }
        self.dirs.borrow_mut().insert(dir.to_path_buf());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(path)
    }

    fn read(&self, path: &Path) -> Result<Option<KeyMap>, StoreError> {
        match self.files.borrow().get(path) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, path: &Path, map: &KeyMap) -> Result<(), StoreError> {
        if self.simulate_write_error.get() {
            return Err(StoreError::Backend("Simulated write error".to_string()));
        }
        let bytes = serde_json::to_vec_pretty(map)?;
        self.files.borrow_mut().insert(path.to_path_buf(), bytes);
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
        if self.simulate_copy_error.get() {
            return Err(StoreError::Backend("Simulated copy error".to_string()));
        }
        let bytes = self
            .bytes(from)
            .ok_or_else(|| StoreError::Backend(format!("{} not found", from.display())))?;
        self.files.borrow_mut().insert(to.to_path_buf(), bytes);
        Ok(())
    }

    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.bytes(path))
    }
}
