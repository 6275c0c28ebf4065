//! Category tabs shown above a container in the host's loot view.

use serde::{Deserialize, Serialize};

/// One category tab: a localization key and the item tags it admits.
/// An empty tag list admits everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub name: String,
    pub require_tags: Vec<String>,
}

impl FilterEntry {
    pub fn new(name: &str, tags: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            require_tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Installed when the player's own storage has no filters to copy.
pub fn default_filters() -> Vec<FilterEntry> {
    vec![
        FilterEntry::new("ItemFilter_All", &[]),
        FilterEntry::new("ItemFilter_Weapon", &["Gun"]),
        FilterEntry::new("ItemFilter_Bullet", &["Bullet"]),
        FilterEntry::new("ItemFilter_Equipment", &["Armor", "Helmat", "Backpack"]),
        FilterEntry::new("ItemFilter_Accessory", &["Attachment"]),
        FilterEntry::new("ItemFilter_Totem", &["Totem"]),
        FilterEntry::new("ItemFilter_Medic", &["Medicine"]),
        FilterEntry::new("ItemFilter_Food", &["Food"]),
        FilterEntry::new("ItemFilter_Other", &["Special"]),
    ]
}
