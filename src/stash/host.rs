//! # Host Adapter
//!
//! Everything the stash needs from the game, and nothing more. The core never
//! reaches into host objects directly; an embedding implements these traits
//! over its own scene graph, UI and input (see [`crate::sim::SimHost`] for an
//! in-memory implementation).
//!
//! | Trait | Capability |
//! |-------|------------|
//! | [`World`] | level state, the player-storage anchor, object lifetime |
//! | [`LootboxAdapter`] | per-object fields: names, options, bound container, group list, marker, filters |
//! | [`LootView`] | the single container view the host can show |
//! | [`Input`] | per-frame key polling |
//! | [`Audio`] | the put-item sound |

use crate::config::KeyCode;
use crate::container::{ItemSource, LiveContainer};
use crate::filters::FilterEntry;
use crate::model::ItemRecord;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Opaque handle to a host world object. May dangle: always check
/// [`World::is_alive`] before trusting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The live container, shared between the stash and the host UI that
/// displays it.
pub type SharedContainer = Rc<RefCell<LiveContainer>>;

/// Behaviour toggles for a lootable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootboxOptions {
    /// The "pick all" / bulk-collect button.
    pub show_pick_all: bool,
    pub show_sort_button: bool,
    pub need_inspect: bool,
    pub use_default_interact_name: bool,
}

impl LootboxOptions {
    /// The stash is only ever opened on its own; bulk collect must never
    /// sweep items in or out of it.
    pub fn stash() -> Self {
        Self {
            show_pick_all: false,
            show_sort_button: true,
            need_inspect: false,
            use_default_interact_name: false,
        }
    }
}

pub trait World {
    /// True only in the hub level, the one place the stash may appear.
    fn is_base_level(&self) -> bool;

    /// The player's own storage object, which the stash groups itself with.
    fn storage_anchor(&self) -> Option<ObjectId>;

    fn spawn_lootbox(&mut self, name: &str) -> ObjectId;

    /// False once the host has destroyed the object (e.g. on level unload).
    fn is_alive(&self, id: ObjectId) -> bool;

    /// Copy parent, position, rotation and tag from `anchor` onto `id`.
    fn align_with(&mut self, id: ObjectId, anchor: ObjectId);

    fn set_active(&mut self, id: ObjectId, active: bool);
}

pub trait LootboxAdapter {
    fn display_name(&self, id: ObjectId) -> Option<String>;
    fn set_display_name(&mut self, id: ObjectId, name: &str);
    fn configure(&mut self, id: ObjectId, options: &LootboxOptions);

    fn container(&self, id: ObjectId) -> Option<SharedContainer>;
    fn bind_container(&mut self, id: ObjectId, container: SharedContainer);

    /// Alternative interactions offered at `master`'s location.
    fn group_members_mut(&mut self, master: ObjectId) -> Option<&mut Vec<ObjectId>>;

    fn set_marker_visible(&mut self, id: ObjectId, visible: bool);

    /// Category filters of the container bound to `id`.
    fn filters(&self, id: ObjectId) -> Vec<FilterEntry>;
    fn set_filters(&mut self, id: ObjectId, filters: Vec<FilterEntry>);
}

/// The host shows at most one container view at a time.
pub trait LootView {
    fn is_open(&self) -> bool;

    /// Object whose container is currently shown.
    fn target(&self) -> Option<ObjectId>;

    fn close(&mut self);

    /// Run the host's "interaction started" path for `id`, which opens its view.
    fn begin_interaction(&mut self, id: ObjectId);

    fn set_store_all_visible(&mut self, visible: bool);
}

pub trait Input {
    /// Pressed this frame.
    fn key_down(&self, key: KeyCode) -> bool;
}

pub trait Audio {
    fn play_put_item(&mut self, item: &ItemRecord);
}

/// The full capability set the lifecycle driver runs against.
pub trait Host: World + LootboxAdapter + LootView + Input + Audio {
    /// The main character's inventory, the source for "store all".
    fn player_inventory(&mut self) -> Option<&mut dyn ItemSource>;
}
