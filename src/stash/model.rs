use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Slots available in the stash.
pub const CAPACITY: usize = 5000;

/// One item as the stash knows it.
///
/// `state` carries whatever item-specific data the host attaches (durability,
/// nested contents, custom variables). The stash never interprets it beyond
/// equality when deciding whether two stacks can merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub type_id: u32,
    pub count: u32,
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub state: Map<String, Value>,
}

fn default_max_stack() -> u32 {
    1
}

impl ItemRecord {
    pub fn new(type_id: u32, count: u32, max_stack: u32) -> Self {
        Self {
            type_id,
            count,
            max_stack,
            state: Map::new(),
        }
    }

    pub fn with_state(mut self, key: &str, value: Value) -> Self {
        self.state.insert(key.to_string(), value);
        self
    }

    pub fn is_stackable(&self) -> bool {
        self.max_stack > 1
    }

    /// Two records can share a stack when they are the same kind of item in
    /// the same state.
    pub fn stacks_with(&self, other: &ItemRecord) -> bool {
        self.is_stackable()
            && self.type_id == other.type_id
            && self.max_stack == other.max_stack
            && self.state == other.state
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotEntry {
    pub slot: usize,
    pub item: ItemRecord,
}

/// Serializable capture of the stash contents.
///
/// Entries are kept sorted by slot; only occupied slots are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub capacity: usize,
    #[serde(default)]
    pub entries: Vec<SlotEntry>,
}

impl Snapshot {
    /// An empty snapshot at full stash capacity.
    pub fn empty() -> Self {
        Self::with_capacity(CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of individual items across all stacks.
    pub fn item_count(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.item.count)).sum()
    }

    /// Checks the capacity bound and the ordering of entries.
    pub fn is_well_formed(&self) -> bool {
        self.entries.len() <= self.capacity
            && self.entries.iter().all(|e| e.slot < self.capacity)
            && self.entries.windows(2).all(|w| w[0].slot < w[1].slot)
    }
}
