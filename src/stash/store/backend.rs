use super::KeyMap;
use crate::error::StoreError;
use std::path::Path;

/// Abstract interface for raw keyed-file I/O.
/// This trait handles the "how" of storage (filesystem vs memory),
/// while `Persistence` handles the "what" (debounce, backup, migration).
pub trait StorageBackend {
    /// Create `dir` (and parents) if missing.
    fn ensure_dir(&self, dir: &Path) -> Result<(), StoreError>;

    fn exists(&self, path: &Path) -> bool;

    /// Read and decode the keyed map.
    /// Returns Ok(None) if the file does not exist.
    fn read(&self, path: &Path) -> Result<Option<KeyMap>, StoreError>;

    /// Encode and write the keyed map.
    /// MUST be atomic (e.g. write to tmp then rename) to avoid partial writes.
    fn write(&self, path: &Path, map: &KeyMap) -> Result<(), StoreError>;

    /// Byte-for-byte copy of `from` onto `to`, replacing it.
    fn copy(&self, from: &Path, to: &Path) -> Result<(), StoreError>;

    /// Raw bytes of a file, for inspection and backups.
    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>, StoreError>;
}
