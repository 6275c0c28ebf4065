//! # Attachment Lifecycle
//!
//! The stash appears in the world as its own lootable object standing on top
//! of the player's storage. The host destroys that object on every level
//! unload, so [`Attachment::ensure_attached`] is called again on every hub
//! visit (and may be called every frame):
//!
//! - **Dead handle** → dropped, together with its container.
//! - **No handle** → spawn the object, configure it, create a fresh
//!   [`LiveContainer`] and start restoring the persisted snapshot into it.
//! - **Live handle** → only re-check group membership.
//!
//! ## Group Membership
//!
//! The host lists alternative interactions at one location on a master
//! object. The stash adds itself to the player storage's list once, and hides
//! its own world marker because the master already draws one.

use crate::container::{ItemSource, LiveContainer};
use crate::filters::default_filters;
use crate::host::{LootView, LootboxAdapter, LootboxOptions, ObjectId, SharedContainer, World};
use crate::model::{ItemRecord, Snapshot, CAPACITY};
use crate::restore::{RestoreFallback, RestoreState, RestoreTask};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::rc::Rc;

pub const OBJECT_NAME: &str = "PlayerStorage_Independent";
pub const DISPLAY_NAME: &str = "My Stash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Not in the hub, or no player storage to attach to.
    Skipped,
    Created(ObjectId),
    Refreshed(ObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    NotAttached,
    Opened,
    Closed,
}

/// Result of a "store all" sweep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferReport {
    pub moved: usize,
    /// First item moved, which picks the transfer sound.
    pub first_moved: Option<ItemRecord>,
    /// Source slot whose item did not fit; the sweep stopped there.
    pub stalled_at: Option<usize>,
}

#[derive(Default)]
pub struct Attachment {
    handle: Option<ObjectId>,
    container: Option<SharedContainer>,
    restore: Option<RestoreTask>,
}

impl Attachment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Option<ObjectId> {
        self.handle
    }

    pub fn container(&self) -> Option<&SharedContainer> {
        self.container.as_ref()
    }

    pub fn restore_state(&self) -> Option<RestoreState> {
        self.restore.as_ref().map(RestoreTask::state)
    }

    /// Make sure exactly one stash object exists and is grouped with the
    /// player's storage. `snapshot` seeds a newly created container.
    pub fn ensure_attached<H>(&mut self, host: &mut H, snapshot: Option<&Snapshot>) -> AttachOutcome
    where
        H: World + LootboxAdapter + ?Sized,
    {
        if !host.is_base_level() {
            return AttachOutcome::Skipped;
        }
        let Some(anchor) = host.storage_anchor() else {
            return AttachOutcome::Skipped;
        };

        if let Some(id) = self.handle {
            if !host.is_alive(id) {
                debug!("Stash object {} was destroyed by the host", id);
                self.detach();
            }
        }

        let outcome = match self.handle {
            None => AttachOutcome::Created(self.create_stash_object(host, anchor, snapshot)),
            Some(id) => {
                inject_into_group(host, anchor, id);
                AttachOutcome::Refreshed(id)
            }
        };

        if let AttachOutcome::Created(id) | AttachOutcome::Refreshed(id) = outcome {
            host.set_active(id, true);
        }
        outcome
    }

    /// Forget the object and its container.
    pub fn detach(&mut self) {
        self.handle = None;
        self.container = None;
        self.restore = None;
    }

    /// Close the stash view if it is showing, otherwise open it (closing
    /// whatever else was open). A handle the host has destroyed is dropped
    /// without touching the view.
    pub fn toggle<V>(&mut self, view: &mut V) -> ToggleOutcome
    where
        V: World + LootView + ?Sized,
    {
        let Some(id) = self.handle else {
            return ToggleOutcome::NotAttached;
        };
        if !view.is_alive(id) {
            debug!("Stash object {} is gone; toggle ignored", id);
            self.detach();
            return ToggleOutcome::NotAttached;
        }

        if view.is_open() && view.target() == Some(id) {
            view.close();
            return ToggleOutcome::Closed;
        }
        if view.is_open() {
            view.close();
        }
        view.begin_interaction(id);
        ToggleOutcome::Opened
    }

    /// Move items from `source` into the stash, in slot order, skipping
    /// locked slots. Stops at the first item that does not fit.
    pub fn transfer_all_from(&self, source: &mut dyn ItemSource) -> TransferReport {
        let mut report = TransferReport::default();
        let Some(container) = &self.container else {
            return report;
        };
        if self.restore.as_ref().is_some_and(RestoreTask::is_pending) {
            debug!("Store all ignored while the stash is still restoring");
            return report;
        }
        let Some(last) = source.last_item_position() else {
            return report;
        };

        let mut stash = container.borrow_mut();
        for slot in 0..=last {
            if source.is_locked(slot) {
                continue;
            }
            let Some(item) = source.item_at(slot).cloned() else {
                continue;
            };
            if stash.add_and_merge(item).is_err() {
                debug!("Stash full at source slot {}", slot);
                report.stalled_at = Some(slot);
                break;
            }
            let moved = source.take(slot);
            if report.first_moved.is_none() {
                report.first_moved = moved;
            }
            report.moved += 1;
        }
        report
    }

    /// Advance a pending restore by one frame.
    pub fn poll_restore(&mut self) -> Option<RestoreState> {
        let task = self.restore.as_mut()?;
        let container = self.container.as_ref()?;
        let mut container = container.borrow_mut();
        Some(task.poll(&mut container))
    }

    /// Current contents as a snapshot, when they are safe to persist.
    ///
    /// `None` while nothing is attached, while a restore is still running,
    /// and after a failed restore left the container empty: in those cases
    /// the persisted snapshot is still the better copy.
    pub fn snapshot(&self) -> Option<Snapshot> {
        let container = self.container.as_ref()?.borrow();
        match self.restore_state() {
            Some(RestoreState::Pending) => None,
            Some(RestoreState::Failed(RestoreFallback::EmptyContainer)) if container.is_empty() => {
                None
            }
            _ => Some(container.to_snapshot()),
        }
    }

    fn create_stash_object<H>(
        &mut self,
        host: &mut H,
        anchor: ObjectId,
        snapshot: Option<&Snapshot>,
    ) -> ObjectId
    where
        H: World + LootboxAdapter + ?Sized,
    {
        let id = host.spawn_lootbox(OBJECT_NAME);
        host.align_with(id, anchor);
        host.set_display_name(id, DISPLAY_NAME);
        host.configure(id, &LootboxOptions::stash());
        host.set_marker_visible(id, false);

        let container = Rc::new(RefCell::new(LiveContainer::new(CAPACITY)));
        host.bind_container(id, Rc::clone(&container));
        copy_filters(host, anchor, id);

        self.restore = snapshot.map(|s| RestoreTask::new(s.clone()));
        self.container = Some(container);
        self.handle = Some(id);

        inject_into_group(host, anchor, id);
        info!("Created stash object {}", id);
        id
    }
}

/// Add `other` to `master`'s interaction group once and hide its marker.
pub fn inject_into_group<H>(host: &mut H, master: ObjectId, other: ObjectId)
where
    H: LootboxAdapter + ?Sized,
{
    match host.group_members_mut(master) {
        Some(members) => {
            if !members.contains(&other) {
                members.push(other);
            }
        }
        None => warn!("Player storage {} has no interaction group", master),
    }
    host.set_marker_visible(other, false);
}

fn copy_filters<H>(host: &mut H, anchor: ObjectId, id: ObjectId)
where
    H: LootboxAdapter + ?Sized,
{
    let official = host.filters(anchor);
    let filters = if official.is_empty() {
        default_filters()
    } else {
        official
    };
    host.set_filters(id, filters);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SlotEntry;
    use crate::restore::run_to_completion;
    use crate::sim::SimHost;

    fn seeded_snapshot() -> Snapshot {
        Snapshot {
            capacity: CAPACITY,
            entries: vec![
                SlotEntry {
                    slot: 0,
                    item: ItemRecord::new(1, 5, 10),
                },
                SlotEntry {
                    slot: 9,
                    item: ItemRecord::new(2, 1, 1),
                },
            ],
        }
    }

    #[test]
    fn skipped_outside_base_level() {
        let mut host = SimHost::new();
        host.set_base_level(false);
        let mut a = Attachment::new();
        assert_eq!(a.ensure_attached(&mut host, None), AttachOutcome::Skipped);
        assert_eq!(host.spawned_count(), 0);
    }

    #[test]
    fn skipped_without_anchor() {
        let mut host = SimHost::without_anchor();
        let mut a = Attachment::new();
        assert_eq!(a.ensure_attached(&mut host, None), AttachOutcome::Skipped);
        assert!(a.handle().is_none());
    }

    #[test]
    fn creates_configured_object_once() {
        let mut host = SimHost::new();
        let anchor = host.anchor().unwrap();
        let mut a = Attachment::new();

        let AttachOutcome::Created(id) = a.ensure_attached(&mut host, None) else {
            panic!("expected creation");
        };
        for _ in 0..5 {
            assert_eq!(a.ensure_attached(&mut host, None), AttachOutcome::Refreshed(id));
        }

        assert_eq!(host.spawned_count(), 1);
        assert_eq!(host.group(anchor), vec![id]);
        assert_eq!(host.display_name(id).as_deref(), Some(DISPLAY_NAME));
        let obj = host.object(id).unwrap();
        assert!(obj.active);
        assert!(!obj.marker_visible);
        assert!(!obj.options.unwrap().show_pick_all);
        assert_eq!(obj.aligned_with, Some(anchor));
        assert!(Rc::ptr_eq(&host.container(id).unwrap(), a.container().unwrap()));
    }

    #[test]
    fn destroyed_object_is_recreated() {
        let mut host = SimHost::new();
        let anchor = host.anchor().unwrap();
        let mut a = Attachment::new();

        let AttachOutcome::Created(first) = a.ensure_attached(&mut host, None) else {
            panic!("expected creation");
        };
        host.destroy(first);

        let AttachOutcome::Created(second) = a.ensure_attached(&mut host, None) else {
            panic!("expected recreation");
        };
        assert_ne!(first, second);
        assert_eq!(host.group(anchor), vec![second]);
    }

    #[test]
    fn filters_copied_from_anchor_or_defaulted() {
        let mut host = SimHost::new();
        let mut a = Attachment::new();
        let AttachOutcome::Created(id) = a.ensure_attached(&mut host, None) else {
            panic!("expected creation");
        };
        assert_eq!(host.filters(id), default_filters());

        let mut host = SimHost::new();
        let anchor = host.anchor().unwrap();
        let custom = vec![crate::filters::FilterEntry::new("Mine", &["Gun"])];
        host.set_filters(anchor, custom.clone());
        let mut a = Attachment::new();
        let AttachOutcome::Created(id) = a.ensure_attached(&mut host, None) else {
            panic!("expected creation");
        };
        assert_eq!(host.filters(id), custom);
    }

    #[test]
    fn restore_is_deferred_and_observable() {
        let mut host = SimHost::new();
        let mut a = Attachment::new();
        a.ensure_attached(&mut host, Some(&seeded_snapshot()));

        assert_eq!(a.restore_state(), Some(RestoreState::Pending));
        assert!(a.container().unwrap().borrow().is_empty());
        assert!(a.snapshot().is_none());

        assert_eq!(a.poll_restore(), Some(RestoreState::Pending));
        assert_eq!(a.poll_restore(), Some(RestoreState::Succeeded));
        assert_eq!(a.snapshot(), Some(seeded_snapshot()));
    }

    #[test]
    fn no_snapshot_means_no_restore_task() {
        let mut host = SimHost::new();
        let mut a = Attachment::new();
        a.ensure_attached(&mut host, None);
        assert!(a.restore_state().is_none());
        assert_eq!(a.snapshot(), Some(Snapshot::empty()));
    }

    #[test]
    fn failed_empty_restore_defers_to_persisted_copy() {
        let mut host = SimHost::new();
        let mut a = Attachment::new();
        let broken = Snapshot {
            capacity: CAPACITY,
            entries: vec![SlotEntry {
                slot: CAPACITY + 1,
                item: ItemRecord::new(1, 1, 1),
            }],
        };
        a.ensure_attached(&mut host, Some(&broken));
        {
            let container = a.container().unwrap().clone();
            let task = a.restore.as_mut().unwrap();
            run_to_completion(task, &mut container.borrow_mut());
        }
        assert_eq!(
            a.restore_state(),
            Some(RestoreState::Failed(RestoreFallback::EmptyContainer))
        );
        assert!(a.container().is_some());
        assert!(a.snapshot().is_none());

        a.container()
            .unwrap()
            .borrow_mut()
            .add_and_merge(ItemRecord::new(3, 1, 1))
            .unwrap();
        assert_eq!(a.snapshot().unwrap().len(), 1);
    }

    #[test]
    fn toggle_opens_then_closes() {
        let mut host = SimHost::new();
        let mut a = Attachment::new();
        assert_eq!(a.toggle(&mut host), ToggleOutcome::NotAttached);

        let AttachOutcome::Created(id) = a.ensure_attached(&mut host, None) else {
            panic!("expected creation");
        };
        assert_eq!(a.toggle(&mut host), ToggleOutcome::Opened);
        assert_eq!(host.target(), Some(id));
        assert_eq!(a.toggle(&mut host), ToggleOutcome::Closed);
        assert!(!host.is_open());
    }

    #[test]
    fn toggle_replaces_other_open_view() {
        let mut host = SimHost::new();
        let anchor = host.anchor().unwrap();
        let mut a = Attachment::new();
        let AttachOutcome::Created(id) = a.ensure_attached(&mut host, None) else {
            panic!("expected creation");
        };

        host.begin_interaction(anchor);
        assert_eq!(a.toggle(&mut host), ToggleOutcome::Opened);
        assert_eq!(host.target(), Some(id));
        assert_eq!(host.closed_count(), 1);
    }

    #[test]
    fn toggle_with_destroyed_stash_leaves_other_view_open() {
        let mut host = SimHost::new();
        let mut a = Attachment::new();
        a.ensure_attached(&mut host, None);

        host.unload_level();
        let other = host.spawn_lootbox("crate");
        host.begin_interaction(other);

        assert_eq!(a.toggle(&mut host), ToggleOutcome::NotAttached);
        assert!(host.is_open());
        assert_eq!(host.target(), Some(other));
        assert_eq!(host.closed_count(), 0);
        assert!(a.handle().is_none());
        assert!(a.container().is_none());
    }

    #[test]
    fn transfer_stops_at_first_item_that_does_not_fit() {
        let mut host = SimHost::new();
        let mut a = Attachment::new();
        a.ensure_attached(&mut host, None);
        {
            let mut stash = a.container().unwrap().borrow_mut();
            for slot in 0..CAPACITY - 1 {
                stash.insert_at(slot, ItemRecord::new(99, 1, 1)).unwrap();
            }
        }

        let mut source = LiveContainer::new(10);
        source.insert_at(0, ItemRecord::new(1, 1, 1)).unwrap();
        source.insert_at(1, ItemRecord::new(2, 1, 1)).unwrap();
        source.insert_at(2, ItemRecord::new(3, 1, 1)).unwrap();

        let report = a.transfer_all_from(&mut source);
        assert_eq!(report.moved, 1);
        assert_eq!(report.first_moved.map(|i| i.type_id), Some(1));
        assert_eq!(report.stalled_at, Some(1));
        assert_eq!(source.len(), 2);
        assert!(source.get(1).is_some() && source.get(2).is_some());
    }

    #[test]
    fn transfer_skips_locked_and_empty_slots() {
        let mut host = SimHost::new();
        let mut a = Attachment::new();
        a.ensure_attached(&mut host, None);

        let mut source = LiveContainer::new(10);
        source.insert_at(0, ItemRecord::new(1, 1, 1)).unwrap();
        source.insert_at(3, ItemRecord::new(2, 4, 10)).unwrap();
        source.insert_at(5, ItemRecord::new(3, 1, 1)).unwrap();
        source.lock(0);

        let report = a.transfer_all_from(&mut source);
        assert_eq!(report.moved, 2);
        assert_eq!(report.first_moved.map(|i| i.type_id), Some(2));
        assert_eq!(source.len(), 1);
        assert!(source.get(0).is_some());

        let stash = a.container().unwrap().borrow();
        assert_eq!(stash.get(0).unwrap().type_id, 2);
        assert_eq!(stash.get(1).unwrap().type_id, 3);
    }

    #[test]
    fn transfer_waits_for_restore() {
        let mut host = SimHost::new();
        let mut a = Attachment::new();
        a.ensure_attached(&mut host, Some(&seeded_snapshot()));

        let mut source = LiveContainer::new(2);
        source.insert_at(0, ItemRecord::new(7, 1, 1)).unwrap();
        assert_eq!(a.transfer_all_from(&mut source).moved, 0);
        assert_eq!(source.len(), 1);
    }
}
