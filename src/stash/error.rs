use std::path::PathBuf;
use thiserror::Error;

/// The storage directory or file could not be prepared.
///
/// Recoverable: the resolved path is only recorded on success, so the next
/// `initialize` call retries from scratch.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("could not create storage directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: StoreError,
    },

    #[error("could not prepare save file: {0}")]
    Store(#[from] StoreError),
}

/// The namespaced (or legacy) key was unreadable. Treated as "no prior data".
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("persistence is not initialized")]
    NotInitialized,

    #[error("could not read save file: {0}")]
    Store(#[from] StoreError),

    #[error("corrupt value under key {key}: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
}

/// A write step failed. The primary file is left as it was.
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("persistence is not initialized")]
    NotInitialized,

    #[error("could not encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("could not write save file: {0}")]
    Store(#[from] StoreError),
}

/// A snapshot entry could not be placed into the live container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    #[error("snapshot capacity {snapshot} exceeds container capacity {container}")]
    CapacityMismatch { snapshot: usize, container: usize },

    #[error("slot {slot}: {source}")]
    Slot {
        slot: usize,
        source: ContainerError,
    },
}

/// Errors from the live container's slot operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("slot {slot} is outside capacity {capacity}")]
    OutOfRange { slot: usize, capacity: usize },

    #[error("slot {0} is already occupied")]
    Occupied(usize),

    #[error("item {type_id} has an invalid stack of {count}/{max_stack}")]
    InvalidStack {
        type_id: u32,
        count: u32,
        max_stack: u32,
    },
}

/// Raw keyed-file I/O failures, shared by every backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Backend(String),
}

/// Umbrella error for callers that do not care which stage failed (the CLI).
#[derive(Error, Debug)]
pub enum StashError {
    #[error(transparent)]
    Init(#[from] InitError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Save(#[from] SaveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StashError>;
