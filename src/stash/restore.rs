//! # Snapshot Restore
//!
//! Filling a freshly created container from a [`Snapshot`] is spread over
//! frames. The container is usable (empty) as soon as it exists; items show
//! up as the task is polled.
//!
//! The first [`RestoreTask::poll`] only arms the task, so nothing is inserted
//! on the frame the container was created, while the host is still setting
//! up the new object. Each later poll inserts up to `batch_size` entries.
//!
//! ## Failure Handling
//!
//! On the first entry that cannot be placed:
//! - **Container still empty** → it is reset from an empty snapshot, so the
//!   player gets a well-formed, usable stash.
//! - **Some items already landed** → they are kept and the rest of the
//!   snapshot is abandoned, rather than disturbing items already accepted.

use crate::container::LiveContainer;
use crate::error::RestoreError;
use crate::model::Snapshot;
use log::{error, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreFallback {
    /// Nothing landed; the container was reset to empty.
    EmptyContainer,
    /// Items that landed before the failure were kept.
    KeptPartial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    Pending,
    Succeeded,
    Failed(RestoreFallback),
}

#[derive(Debug, Clone)]
pub struct RestoreTask {
    snapshot: Snapshot,
    cursor: usize,
    armed: bool,
    batch_size: usize,
    state: RestoreState,
    error: Option<RestoreError>,
}

impl RestoreTask {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            cursor: 0,
            armed: false,
            batch_size: DEFAULT_BATCH_SIZE,
            state: RestoreState::Pending,
            error: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn state(&self) -> RestoreState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == RestoreState::Pending
    }

    /// What went wrong, once the task has failed.
    pub fn error(&self) -> Option<&RestoreError> {
        self.error.as_ref()
    }

    /// Entries placed so far.
    pub fn restored(&self) -> usize {
        self.cursor
    }

    /// Advance the restore by one frame.
    pub fn poll(&mut self, container: &mut LiveContainer) -> RestoreState {
        if self.state != RestoreState::Pending {
            return self.state;
        }
        if !self.armed {
            self.armed = true;
            return self.state;
        }

        if self.cursor == 0 && self.snapshot.capacity > container.capacity() {
            let err = RestoreError::CapacityMismatch {
                snapshot: self.snapshot.capacity,
                container: container.capacity(),
            };
            return self.fail(err, container);
        }

        let end = (self.cursor + self.batch_size).min(self.snapshot.entries.len());
        while self.cursor < end {
            let entry = &self.snapshot.entries[self.cursor];
            if let Err(source) = container.insert_at(entry.slot, entry.item.clone()) {
                let err = RestoreError::Slot {
                    slot: entry.slot,
                    source,
                };
                return self.fail(err, container);
            }
            self.cursor += 1;
        }

        if self.cursor == self.snapshot.entries.len() {
            info!("Restored {} stash slots", self.cursor);
            self.state = RestoreState::Succeeded;
        }
        self.state
    }

    fn fail(&mut self, err: RestoreError, container: &mut LiveContainer) -> RestoreState {
        error!("Stash restore failed: {}", err);
        let fallback = if container.is_empty() {
            warn!("Initializing empty inventory due to load failure");
            container.clear();
            RestoreFallback::EmptyContainer
        } else {
            warn!(
                "Preserving {} restored slots despite load failure",
                container.len()
            );
            RestoreFallback::KeptPartial
        };
        self.error = Some(err);
        self.state = RestoreState::Failed(fallback);
        self.state
    }
}

/// Poll `task` until it leaves `Pending`.
pub fn run_to_completion(task: &mut RestoreTask, container: &mut LiveContainer) -> RestoreState {
    loop {
        let state = task.poll(container);
        if state != RestoreState::Pending {
            return state;
        }
    }
}
