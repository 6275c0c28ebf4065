//! # Simulated Host
//!
//! An in-memory [`Host`] for tests and tooling: a flat object table, one
//! player storage anchor with an interaction group, a single loot view, a
//! keyboard with keys pressed for one frame, and a player inventory.

use crate::config::KeyCode;
use crate::container::{ItemSource, LiveContainer};
use crate::filters::FilterEntry;
use crate::host::{
    Audio, Host, Input, LootView, LootboxAdapter, LootboxOptions, ObjectId, SharedContainer,
    World,
};
use crate::model::ItemRecord;
use std::collections::{BTreeMap, HashSet};

pub const ANCHOR_NAME: &str = "PlayerStorage";
pub const PLAYER_CAPACITY: usize = 32;

#[derive(Default)]
pub struct SimObject {
    pub name: String,
    pub display_name: Option<String>,
    pub active: bool,
    pub marker_visible: bool,
    pub options: Option<LootboxOptions>,
    pub aligned_with: Option<ObjectId>,
    pub container: Option<SharedContainer>,
    pub group: Option<Vec<ObjectId>>,
    pub filters: Vec<FilterEntry>,
}

impl SimObject {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            marker_visible: true,
            ..Self::default()
        }
    }
}

pub struct SimHost {
    objects: BTreeMap<ObjectId, SimObject>,
    next_id: u64,
    base_level: bool,
    anchor: Option<ObjectId>,
    spawned: usize,
    target: Option<ObjectId>,
    closed: usize,
    store_all_visible: bool,
    pressed: HashSet<KeyCode>,
    player: LiveContainer,
    sounds: Vec<ItemRecord>,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// A hub level with a player storage anchor.
    pub fn new() -> Self {
        let mut host = Self::without_anchor();
        let anchor = host.insert(SimObject {
            group: Some(Vec::new()),
            active: true,
            ..SimObject::named(ANCHOR_NAME)
        });
        host.anchor = Some(anchor);
        host
    }

    /// A hub level where the player storage has not been built.
    pub fn without_anchor() -> Self {
        Self {
            objects: BTreeMap::new(),
            next_id: 1,
            base_level: true,
            anchor: None,
            spawned: 0,
            target: None,
            closed: 0,
            store_all_visible: false,
            pressed: HashSet::new(),
            player: LiveContainer::new(PLAYER_CAPACITY),
            sounds: Vec::new(),
        }
    }

    pub fn set_base_level(&mut self, base: bool) {
        self.base_level = base;
    }

    pub fn anchor(&self) -> Option<ObjectId> {
        self.anchor
    }

    /// Objects created through [`World::spawn_lootbox`].
    pub fn spawned_count(&self) -> usize {
        self.spawned
    }

    pub fn object(&self, id: ObjectId) -> Option<&SimObject> {
        self.objects.get(&id)
    }

    pub fn group(&self, master: ObjectId) -> Vec<ObjectId> {
        self.objects
            .get(&master)
            .and_then(|o| o.group.clone())
            .unwrap_or_default()
    }

    /// Destroy one object the way a scene teardown does.
    pub fn destroy(&mut self, id: ObjectId) {
        self.objects.remove(&id);
        for obj in self.objects.values_mut() {
            if let Some(group) = obj.group.as_mut() {
                group.retain(|member| *member != id);
            }
        }
        if self.target == Some(id) {
            self.close();
        }
    }

    /// Leave the hub: every spawned object goes away, the anchor stays.
    pub fn unload_level(&mut self) {
        let spawned: Vec<ObjectId> = self
            .objects
            .keys()
            .copied()
            .filter(|id| Some(*id) != self.anchor)
            .collect();
        for id in spawned {
            self.destroy(id);
        }
        self.base_level = false;
    }

    pub fn press(&mut self, key: KeyCode) {
        self.pressed.insert(key);
    }

    /// Release all keys pressed this frame.
    pub fn end_frame(&mut self) {
        self.pressed.clear();
    }

    pub fn closed_count(&self) -> usize {
        self.closed
    }

    pub fn store_all_visible(&self) -> bool {
        self.store_all_visible
    }

    pub fn player(&self) -> &LiveContainer {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut LiveContainer {
        &mut self.player
    }

    pub fn sounds(&self) -> &[ItemRecord] {
        &self.sounds
    }

    fn insert(&mut self, object: SimObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }
}

impl World for SimHost {
    fn is_base_level(&self) -> bool {
        self.base_level
    }

    fn storage_anchor(&self) -> Option<ObjectId> {
        self.anchor.filter(|id| self.objects.contains_key(id))
    }

    fn spawn_lootbox(&mut self, name: &str) -> ObjectId {
        self.spawned += 1;
        self.insert(SimObject::named(name))
    }

    fn is_alive(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    fn align_with(&mut self, id: ObjectId, anchor: ObjectId) {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.aligned_with = Some(anchor);
        }
    }

    fn set_active(&mut self, id: ObjectId, active: bool) {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.active = active;
        }
    }
}

impl LootboxAdapter for SimHost {
    fn display_name(&self, id: ObjectId) -> Option<String> {
        self.objects.get(&id)?.display_name.clone()
    }

    fn set_display_name(&mut self, id: ObjectId, name: &str) {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.display_name = Some(name.to_string());
        }
    }

    fn configure(&mut self, id: ObjectId, options: &LootboxOptions) {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.options = Some(*options);
        }
    }

    fn container(&self, id: ObjectId) -> Option<SharedContainer> {
        self.objects.get(&id)?.container.clone()
    }

    fn bind_container(&mut self, id: ObjectId, container: SharedContainer) {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.container = Some(container);
        }
    }

    fn group_members_mut(&mut self, master: ObjectId) -> Option<&mut Vec<ObjectId>> {
        self.objects.get_mut(&master)?.group.as_mut()
    }

    fn set_marker_visible(&mut self, id: ObjectId, visible: bool) {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.marker_visible = visible;
        }
    }

    fn filters(&self, id: ObjectId) -> Vec<FilterEntry> {
        self.objects
            .get(&id)
            .map(|o| o.filters.clone())
            .unwrap_or_default()
    }

    fn set_filters(&mut self, id: ObjectId, filters: Vec<FilterEntry>) {
        if let Some(obj) = self.objects.get_mut(&id) {
            obj.filters = filters;
        }
    }
}

impl LootView for SimHost {
    fn is_open(&self) -> bool {
        self.target.is_some()
    }

    fn target(&self) -> Option<ObjectId> {
        self.target
    }

    fn close(&mut self) {
        if self.target.take().is_some() {
            self.closed += 1;
        }
        self.store_all_visible = false;
    }

    fn begin_interaction(&mut self, id: ObjectId) {
        if self.objects.contains_key(&id) {
            self.target = Some(id);
        }
    }

    fn set_store_all_visible(&mut self, visible: bool) {
        self.store_all_visible = visible;
    }
}

impl Input for SimHost {
    fn key_down(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }
}

impl Audio for SimHost {
    fn play_put_item(&mut self, item: &ItemRecord) {
        self.sounds.push(item.clone());
    }
}

impl Host for SimHost {
    fn player_inventory(&mut self) -> Option<&mut dyn ItemSource> {
        Some(&mut self.player)
    }
}
