//! # Storage Layer
//!
//! The stash lives in a single keyed file: a JSON object mapping string keys
//! to values. Raw I/O goes through the [`StorageBackend`] trait so the
//! persistence logic can run against the filesystem ([`fs_backend::FsBackend`])
//! or entirely in memory ([`mem_backend::MemBackend`]) in tests.
//!
//! [`keyed::KeyedFile`] is the write cache on top of a backend: keys are
//! staged in memory and land on disk together in a single atomic commit.
//!
//! ## File Layout
//!
//! ```text
//! Mod_IndependentStash/
//! ├── MyStash.sav          # keyed map (see below)
//! ├── MyStash.sav.backup   # copy of MyStash.sav taken before each save
//! └── IndependentStash.cfg # key=value options
//! ```
//!
//! ```text
//! {
//!   "Created": true,
//!   "IndependentStash/Inventory/MyStash": { "capacity": 5000, "entries": [...] },
//!   "IndependentStash/Version": 1
//! }
//! ```

use serde_json::{Map, Value};

pub mod backend;
pub mod fs_backend;
pub mod keyed;
pub mod mem_backend;

pub use backend::StorageBackend;
pub use fs_backend::FsBackend;
pub use keyed::KeyedFile;
pub use mem_backend::MemBackend;

/// Decoded contents of a keyed file.
pub type KeyMap = Map<String, Value>;
