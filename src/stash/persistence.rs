//! # Persistence Manager
//!
//! Sole owner of the stash file. Keeps the last loaded (or saved) [`Snapshot`]
//! in memory and writes new ones through a [`KeyedFile`] commit.
//!
//! ## Save Pipeline
//!
//! 1. **Debounce**: a save less than one second after the previous successful
//!    save is skipped. Several host triggers (scene unload, save hook, quit)
//!    tend to fire back to back; only the first one writes.
//! 2. **Backup**: an existing file is copied to `MyStash.sav.backup` first.
//!    A failed backup is logged and the save goes ahead.
//! 3. **Snapshot choice**: the live snapshot if the stash is attached, else the
//!    last loaded one, else an empty snapshot at full capacity.
//! 4. **Commit**: inventory and version keys are staged and written in one
//!    atomic backend write. On failure the previous file stays as it was.
//!
//! ## Key Migration
//!
//! Early versions stored the inventory under the unnamespaced key
//! `Inventory/MyStash`. [`Persistence::load`] moves it under
//! `IndependentStash/Inventory/MyStash` and deletes the old key in the same
//! commit. The upgrade is one-way.

use crate::clock::Clock;
use crate::error::{InitError, LoadError, SaveError, StoreError};
use crate::model::Snapshot;
use crate::paths::{backup_path_for, StashPaths};
use crate::store::{KeyedFile, StorageBackend};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub const NAMESPACE: &str = "IndependentStash";
pub const STASH_NAME: &str = "MyStash";
pub const SENTINEL_KEY: &str = "Created";
pub const FORMAT_VERSION: u32 = 1;
pub const DEBOUNCE_MILLIS: i64 = 1000;

pub fn inventory_key() -> String {
    format!("{NAMESPACE}/Inventory/{STASH_NAME}")
}

pub fn version_key() -> String {
    format!("{NAMESPACE}/Version")
}

pub fn legacy_inventory_key() -> String {
    format!("Inventory/{STASH_NAME}")
}

/// Malformed snapshots are kept as loaded; the restore validates each slot.
fn warn_if_malformed(snapshot: &Snapshot) {
    if !snapshot.is_well_formed() {
        warn!(
            "Stored stash snapshot is malformed (capacity {}, {} entries)",
            snapshot.capacity,
            snapshot.len()
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Neither key present: first run.
    Fresh,
    Loaded,
    /// Found under the legacy key and moved to the namespaced one.
    Migrated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written,
    /// Inside the debounce window; nothing touched.
    Debounced,
}

pub struct Persistence<B: StorageBackend> {
    backend: B,
    clock: Rc<dyn Clock>,
    file_path: Option<PathBuf>,
    snapshot: Option<Snapshot>,
    last_save: Option<DateTime<Utc>>,
}

impl<B: StorageBackend> Persistence<B> {
    pub fn new(backend: B, clock: Rc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            file_path: None,
            snapshot: None,
            last_save: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_initialized(&self) -> bool {
        self.file_path.is_some()
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn backup_path(&self) -> Option<PathBuf> {
        self.file_path.as_deref().map(backup_path_for)
    }

    /// The last snapshot read from or written to disk.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Resolve the save file under `base`, create it if needed and load it.
    ///
    /// Runs once per process: repeated calls after a successful one do
    /// nothing. A failed call leaves the path unresolved so the next call
    /// starts over.
    pub fn initialize(&mut self, base: &Path) -> Result<(), InitError> {
        if self.file_path.is_some() {
            debug!("Persistence already initialized");
            return Ok(());
        }

        let paths = StashPaths::new(base);
        self.backend
            .ensure_dir(&paths.root)
            .map_err(|source| InitError::CreateDir {
                path: paths.root.clone(),
                source,
            })?;

        if !self.backend.exists(&paths.save_file) {
            let mut file = KeyedFile::empty(&paths.save_file);
            file.set(SENTINEL_KEY, &true).map_err(StoreError::from)?;
            file.commit(&self.backend)?;
            info!("Created stash file at {}", paths.save_file.display());
        }

        self.file_path = Some(paths.save_file);

        match self.load() {
            Ok(outcome) => debug!("Initial load: {:?}", outcome),
            Err(e) => warn!("Starting without prior stash data: {}", e),
        }
        Ok(())
    }

    /// Read the stored snapshot, migrating it from the legacy key if needed.
    pub fn load(&mut self) -> Result<LoadOutcome, LoadError> {
        let path = self.file_path.clone().ok_or(LoadError::NotInitialized)?;
        if !self.backend.exists(&path) {
            return Ok(LoadOutcome::Fresh);
        }

        let mut file = KeyedFile::open(&self.backend, &path)?;

        if let Some(Ok(version)) = file.get::<u32>(&version_key()) {
            if version > FORMAT_VERSION {
                warn!(
                    "Stash file has format version {} (supported: {}); reading anyway",
                    version, FORMAT_VERSION
                );
            }
        }

        let key = inventory_key();
        if let Some(decoded) = file.get::<Snapshot>(&key) {
            let snapshot = decoded.map_err(|source| LoadError::Corrupt {
                key: key.clone(),
                source,
            })?;
            info!("Loaded stash with {} occupied slots", snapshot.len());
            warn_if_malformed(&snapshot);
            self.snapshot = Some(snapshot);
            return Ok(LoadOutcome::Loaded);
        }

        let legacy = legacy_inventory_key();
        if let Some(decoded) = file.get::<Snapshot>(&legacy) {
            let snapshot = decoded.map_err(|source| LoadError::Corrupt {
                key: legacy.clone(),
                source,
            })?;
            warn_if_malformed(&snapshot);
            self.snapshot = Some(snapshot.clone());

            file.set(&key, &snapshot).map_err(|source| LoadError::Corrupt {
                key: key.clone(),
                source,
            })?;
            file.delete(&legacy);
            file.commit(&self.backend)?;
            info!("Migrated inventory data to new key.");
            return Ok(LoadOutcome::Migrated);
        }

        Ok(LoadOutcome::Fresh)
    }

    /// Persist `live` (or the best available fallback), subject to debounce.
    pub fn save(&mut self, live: Option<Snapshot>) -> Result<SaveOutcome, SaveError> {
        let path = self.file_path.clone().ok_or(SaveError::NotInitialized)?;

        let now = self.clock.now();
        if let Some(last) = self.last_save {
            if now - last < Duration::milliseconds(DEBOUNCE_MILLIS) {
                debug!("Save skipped: inside debounce window");
                return Ok(SaveOutcome::Debounced);
            }
        }

        let backed_up = self.create_backup(&path);

        let snapshot = live
            .or_else(|| self.snapshot.clone())
            .unwrap_or_else(Snapshot::empty);

        let mut file = match KeyedFile::open(&self.backend, &path) {
            Ok(file) => file,
            Err(StoreError::Serialization(e)) if backed_up => {
                warn!(
                    "Existing stash file is unreadable ({}); a backup was kept, rewriting it",
                    e
                );
                KeyedFile::empty(&path)
            }
            Err(e) => return Err(e.into()),
        };

        file.set(&inventory_key(), &snapshot)?;
        file.set(&version_key(), &FORMAT_VERSION)?;
        file.commit(&self.backend)?;

        info!("Saved stash ({} occupied slots)", snapshot.len());
        self.snapshot = Some(snapshot);
        self.last_save = Some(now);
        Ok(SaveOutcome::Written)
    }

    /// Copy the current file aside. Returns whether a backup now exists.
    fn create_backup(&self, path: &Path) -> bool {
        if !self.backend.exists(path) {
            return false;
        }
        let backup = backup_path_for(path);
        match self.backend.copy(path, &backup) {
            Ok(()) => {
                debug!("Created backup save file at {}", backup.display());
                true
            }
            Err(e) => {
                warn!("Failed to create backup: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{ItemRecord, SlotEntry};
    use crate::store::{KeyMap, MemBackend};
    use serde_json::json;

    const BASE: &str = "/persistent";

    fn setup() -> (Rc<ManualClock>, Persistence<MemBackend>) {
        let clock = Rc::new(ManualClock::default());
        let persistence = Persistence::new(MemBackend::new(), clock.clone());
        (clock, persistence)
    }

    fn save_path() -> PathBuf {
        StashPaths::new(Path::new(BASE)).save_file
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            capacity: 5000,
            entries: vec![
                SlotEntry {
                    slot: 0,
                    item: ItemRecord::new(101, 12, 30),
                },
                SlotEntry {
                    slot: 4,
                    item: ItemRecord::new(202, 1, 1).with_state("durability", json!(0.5)),
                },
            ],
        }
    }

    #[test]
    fn initialize_creates_file_with_sentinel() {
        let (_clock, mut p) = setup();
        p.initialize(Path::new(BASE)).unwrap();

        assert!(p.is_initialized());
        assert!(p.backend().has_dir(&StashPaths::new(Path::new(BASE)).root));
        let file = KeyedFile::open(p.backend(), &save_path()).unwrap();
        assert!(file.get::<bool>(SENTINEL_KEY).unwrap().unwrap());
        assert!(p.snapshot().is_none());
    }

    #[test]
    fn initialize_twice_is_a_noop() {
        let (_clock, mut p) = setup();
        p.initialize(Path::new(BASE)).unwrap();
        let writes = p.backend().write_count();

        p.initialize(Path::new("/elsewhere")).unwrap();
        assert_eq!(p.backend().write_count(), writes);
        assert_eq!(p.file_path(), Some(save_path().as_path()));
    }

    #[test]
    fn failed_initialize_can_be_retried() {
        let (_clock, mut p) = setup();
        p.backend().set_simulate_dir_error(true);
        let err = p.initialize(Path::new(BASE)).unwrap_err();
        assert!(matches!(err, InitError::CreateDir { .. }));
        assert!(!p.is_initialized());

        p.backend().set_simulate_dir_error(false);
        p.initialize(Path::new(BASE)).unwrap();
        assert!(p.is_initialized());
    }

    #[test]
    fn save_before_initialize_is_an_error() {
        let (_clock, mut p) = setup();
        assert!(matches!(p.save(None), Err(SaveError::NotInitialized)));
        assert!(matches!(p.load(), Err(LoadError::NotInitialized)));
    }

    #[test]
    fn save_without_any_snapshot_writes_empty_full_capacity() {
        let (_clock, mut p) = setup();
        p.initialize(Path::new(BASE)).unwrap();
        assert_eq!(p.save(None).unwrap(), SaveOutcome::Written);

        let file = KeyedFile::open(p.backend(), &save_path()).unwrap();
        let stored: Snapshot = file.get(&inventory_key()).unwrap().unwrap();
        assert_eq!(stored, Snapshot::empty());
        assert_eq!(file.get::<u32>(&version_key()).unwrap().unwrap(), FORMAT_VERSION);
    }

    #[test]
    fn saves_inside_debounce_window_write_once() {
        let (clock, mut p) = setup();
        p.initialize(Path::new(BASE)).unwrap();
        let before = p.backend().write_count();

        assert_eq!(p.save(Some(sample_snapshot())).unwrap(), SaveOutcome::Written);
        clock.advance_millis(400);
        assert_eq!(p.save(Some(Snapshot::empty())).unwrap(), SaveOutcome::Debounced);
        assert_eq!(p.backend().write_count(), before + 1);

        // the debounced call did not replace what was written
        assert_eq!(p.snapshot(), Some(&sample_snapshot()));

        clock.advance_millis(700);
        assert_eq!(p.save(None).unwrap(), SaveOutcome::Written);
        assert_eq!(p.backend().write_count(), before + 2);
    }

    #[test]
    fn failed_save_does_not_start_debounce_window() {
        let (_clock, mut p) = setup();
        p.initialize(Path::new(BASE)).unwrap();

        p.backend().set_simulate_write_error(true);
        assert!(matches!(p.save(None), Err(SaveError::Store(_))));

        p.backend().set_simulate_write_error(false);
        assert_eq!(p.save(None).unwrap(), SaveOutcome::Written);
    }

    #[test]
    fn backup_holds_pre_save_bytes() {
        let (clock, mut p) = setup();
        p.initialize(Path::new(BASE)).unwrap();
        p.save(Some(sample_snapshot())).unwrap();
        let before = p.backend().bytes(&save_path()).unwrap();

        clock.advance_millis(1500);
        p.save(Some(Snapshot::empty())).unwrap();

        let backup = p.backend().bytes(&p.backup_path().unwrap()).unwrap();
        assert_eq!(backup, before);
        assert_ne!(p.backend().bytes(&save_path()).unwrap(), before);
    }

    #[test]
    fn backup_failure_does_not_block_save() {
        let (_clock, mut p) = setup();
        p.initialize(Path::new(BASE)).unwrap();
        p.backend().set_simulate_copy_error(true);

        assert_eq!(p.save(Some(sample_snapshot())).unwrap(), SaveOutcome::Written);
        assert!(!p.backend().exists(&p.backup_path().unwrap()));
    }

    #[test]
    fn write_failure_leaves_primary_untouched() {
        let (clock, mut p) = setup();
        p.initialize(Path::new(BASE)).unwrap();
        p.save(Some(sample_snapshot())).unwrap();
        let before = p.backend().bytes(&save_path()).unwrap();

        clock.advance_millis(2000);
        p.backend().set_simulate_write_error(true);
        assert!(p.save(Some(Snapshot::empty())).is_err());
        assert_eq!(p.backend().bytes(&save_path()).unwrap(), before);
        assert_eq!(p.snapshot(), Some(&sample_snapshot()));
    }

    #[test]
    fn legacy_key_is_migrated_on_load() {
        let (_clock, mut p) = setup();
        let mut legacy = KeyMap::new();
        legacy.insert(
            legacy_inventory_key(),
            serde_json::to_value(sample_snapshot()).unwrap(),
        );
        p.backend().put_map(&save_path(), &legacy);

        p.initialize(Path::new(BASE)).unwrap();
        assert_eq!(p.snapshot(), Some(&sample_snapshot()));

        let file = KeyedFile::open(p.backend(), &save_path()).unwrap();
        assert!(!file.contains(&legacy_inventory_key()));
        let migrated: Snapshot = file.get(&inventory_key()).unwrap().unwrap();
        assert_eq!(migrated, sample_snapshot());

        // a second load finds the namespaced key
        assert_eq!(p.load().unwrap(), LoadOutcome::Loaded);
    }

    #[test]
    fn namespaced_key_wins_over_legacy() {
        let (_clock, mut p) = setup();
        let mut map = KeyMap::new();
        map.insert(inventory_key(), serde_json::to_value(sample_snapshot()).unwrap());
        map.insert(
            legacy_inventory_key(),
            serde_json::to_value(Snapshot::empty()).unwrap(),
        );
        p.backend().put_map(&save_path(), &map);

        p.initialize(Path::new(BASE)).unwrap();
        assert_eq!(p.snapshot(), Some(&sample_snapshot()));
        assert_eq!(p.load().unwrap(), LoadOutcome::Loaded);
    }

    #[test]
    fn corrupt_inventory_key_is_no_prior_data() {
        let (_clock, mut p) = setup();
        let mut map = KeyMap::new();
        map.insert(inventory_key(), json!("garbage"));
        p.backend().put_map(&save_path(), &map);

        p.initialize(Path::new(BASE)).unwrap();
        assert!(p.snapshot().is_none());
        assert!(matches!(p.load(), Err(LoadError::Corrupt { .. })));
    }

    #[test]
    fn unreadable_file_is_backed_up_then_rewritten() {
        let (_clock, mut p) = setup();
        p.backend().put_bytes(&save_path(), "{ not json");

        p.initialize(Path::new(BASE)).unwrap();
        assert_eq!(p.save(Some(sample_snapshot())).unwrap(), SaveOutcome::Written);

        let backup = p.backend().bytes(&p.backup_path().unwrap()).unwrap();
        assert_eq!(backup, b"{ not json".to_vec());
        assert_eq!(p.load().unwrap(), LoadOutcome::Loaded);
    }

    #[test]
    fn unreadable_file_without_backup_is_left_alone() {
        let (_clock, mut p) = setup();
        p.backend().put_bytes(&save_path(), "{ not json");
        p.initialize(Path::new(BASE)).unwrap();
        p.backend().set_simulate_copy_error(true);

        assert!(p.save(Some(sample_snapshot())).is_err());
        assert_eq!(p.backend().bytes(&save_path()).unwrap(), b"{ not json".to_vec());
    }

    #[test]
    fn newer_version_still_loads() {
        let (_clock, mut p) = setup();
        let mut map = KeyMap::new();
        map.insert(version_key(), json!(FORMAT_VERSION + 1));
        map.insert(inventory_key(), serde_json::to_value(sample_snapshot()).unwrap());
        p.backend().put_map(&save_path(), &map);

        p.initialize(Path::new(BASE)).unwrap();
        assert_eq!(p.snapshot(), Some(&sample_snapshot()));
    }

    #[test]
    fn malformed_snapshot_is_kept_on_load() {
        let (_clock, mut p) = setup();
        let malformed = Snapshot {
            capacity: 2,
            entries: vec![
                SlotEntry {
                    slot: 1,
                    item: ItemRecord::new(1, 1, 1),
                },
                SlotEntry {
                    slot: 0,
                    item: ItemRecord::new(2, 1, 1),
                },
                SlotEntry {
                    slot: 9,
                    item: ItemRecord::new(3, 1, 1),
                },
            ],
        };
        assert!(!malformed.is_well_formed());
        let mut map = KeyMap::new();
        map.insert(inventory_key(), serde_json::to_value(&malformed).unwrap());
        p.backend().put_map(&save_path(), &map);

        p.initialize(Path::new(BASE)).unwrap();
        assert_eq!(p.load().unwrap(), LoadOutcome::Loaded);
        assert_eq!(p.snapshot(), Some(&malformed));
    }
}
