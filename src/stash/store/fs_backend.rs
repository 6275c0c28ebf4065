use super::backend::StorageBackend;
use super::KeyMap;
use crate::error::StoreError;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use uuid::Uuid;

/// Filesystem backend. Stateless: every call names the file it touches.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBackend;

impl FsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl StorageBackend for FsBackend {
    fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> Result<Option<KeyMap>, StoreError> {
        match self.read_bytes(path)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, path: &Path, map: &KeyMap) -> Result<(), StoreError> {
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Backend(format!("{} has no parent", path.display())))?;
        self.ensure_dir(dir)?;

        let content = serde_json::to_vec_pretty(map)?;

        // Atomic Write
        let tmp_path = dir.join(format!(".stash-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_path, content)?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
        fs::copy(from, to)?;
        Ok(())
    }

    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
