use crate::attach::{AttachOutcome, Attachment, ToggleOutcome, TransferReport};
use crate::clock::Clock;
use crate::error::{InitError, SaveError};
use crate::host::{Host, LootView, LootboxAdapter, World};
use crate::persistence::{Persistence, SaveOutcome};
use crate::restore::RestoreState;
use crate::store::StorageBackend;
use std::path::Path;
use std::rc::Rc;

/// The one stash of the process: its persisted state and its live
/// attachment, owned together so every operation goes through one value.
pub struct StashContext<B: StorageBackend> {
    persistence: Persistence<B>,
    attachment: Attachment,
}

impl<B: StorageBackend> StashContext<B> {
    pub fn new(backend: B, clock: Rc<dyn Clock>) -> Self {
        Self {
            persistence: Persistence::new(backend, clock),
            attachment: Attachment::new(),
        }
    }

    pub fn persistence(&self) -> &Persistence<B> {
        &self.persistence
    }

    pub fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    pub fn is_initialized(&self) -> bool {
        self.persistence.is_initialized()
    }

    pub fn initialize(&mut self, base: &Path) -> Result<(), InitError> {
        self.persistence.initialize(base)
    }

    pub fn ensure_attached<H>(&mut self, host: &mut H) -> AttachOutcome
    where
        H: World + LootboxAdapter + ?Sized,
    {
        self.attachment
            .ensure_attached(host, self.persistence.snapshot())
    }

    pub fn toggle<V: World + LootView + ?Sized>(&mut self, view: &mut V) -> ToggleOutcome {
        self.attachment.toggle(view)
    }

    /// Save the live contents, or the persisted fallback while they are not
    /// available.
    pub fn save(&mut self) -> Result<SaveOutcome, SaveError> {
        let live = self.attachment.snapshot();
        self.persistence.save(live)
    }

    pub fn poll_restore(&mut self) -> Option<RestoreState> {
        self.attachment.poll_restore()
    }

    /// "Store all": sweep the player's inventory into the stash and play one
    /// put-item sound for the batch.
    pub fn transfer_from_player<H: Host + ?Sized>(&self, host: &mut H) -> TransferReport {
        let report = match host.player_inventory() {
            Some(source) => self.attachment.transfer_all_from(source),
            None => return TransferReport::default(),
        };
        if let Some(item) = &report.first_moved {
            host.play_put_item(item);
        }
        report
    }
}
