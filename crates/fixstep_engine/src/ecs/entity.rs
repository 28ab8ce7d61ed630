//! Entity implementation
//!
//! Entity ids are generation-checked slot keys: once an entity is removed its
//! id never matches a later entity, even when the slot is reused.

use crate::foundation::collections::new_key_type;

use super::storage::ComponentKey;

new_key_type! {
    /// Entity identifier
    pub struct EntityId;
}

/// Where an entity sits relative to the World's synchronization points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityStatus {
    /// Created, waiting for the next synchronization point to become visible
    PendingAddition,
    /// Visible to iteration and queries
    Live,
    /// Waiting for the next synchronization point to be destroyed
    PendingRemoval,
}

/// Per-entity bookkeeping owned by the World
#[derive(Debug)]
pub(crate) struct EntityRecord {
    pub(crate) name: String,
    /// Attached components, in attachment order
    pub(crate) components: Vec<ComponentKey>,
    pub(crate) status: EntityStatus,
    /// Whether the entity reached `Live` before being staged for removal
    pub(crate) was_live: bool,
}

impl EntityRecord {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            components: Vec::new(),
            status: EntityStatus::PendingAddition,
            was_live: false,
        }
    }
}
