//! Component storage
//!
//! Every attached component lives in one generation-checked arena. Entities
//! only hold the keys of their components, in attachment order, so a stale
//! key left behind after a detach can never reach a newer component.
//!
//! While a component runs its update callback the scheduler takes the
//! instance out of its slot (see [`ComponentStorage::take`]). If the slot is
//! removed in the meantime (the component detached or replaced itself),
//! [`ComponentStorage::restore`] hands the instance back for disposal instead
//! of reinserting it.

use slotmap::SlotMap;

use super::component::{capabilities_of, Capabilities, Component, ComponentTypeKey};
use super::entity::EntityId;
use crate::foundation::collections::new_key_type;

new_key_type! {
    /// Handle to one attached component instance
    pub struct ComponentKey;
}

/// One attached component and its registration data
pub(crate) struct ComponentEntry {
    pub(crate) owner: EntityId,
    pub(crate) type_key: ComponentTypeKey,
    pub(crate) caps: Capabilities,
    /// `None` while the instance is out for an update callback
    pub(crate) instance: Option<Box<dyn Component>>,
    /// Skipped by both schedulers after a failed callback
    pub(crate) quarantined: bool,
}

/// Outcome of returning an instance after its callback
pub(crate) enum Restore {
    /// The instance went back into its slot
    Restored,
    /// The slot vanished while the instance was out; caller must dispose it
    Orphaned(Box<dyn Component>),
}

/// Arena of all component instances in a World
#[derive(Default)]
pub struct ComponentStorage {
    entries: SlotMap<ComponentKey, ComponentEntry>,
}

impl ComponentStorage {
    /// Create empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component, computing its capabilities
    pub(crate) fn insert(
        &mut self,
        owner: EntityId,
        type_key: ComponentTypeKey,
        mut component: Box<dyn Component>,
    ) -> ComponentKey {
        let caps = capabilities_of(component.as_mut());
        self.entries.insert(ComponentEntry {
            owner,
            type_key,
            caps,
            instance: Some(component),
            quarantined: false,
        })
    }

    /// Remove a component slot; `None` inside means it was out for a callback
    pub(crate) fn remove(&mut self, key: ComponentKey) -> Option<Option<Box<dyn Component>>> {
        self.entries.remove(key).map(|entry| entry.instance)
    }

    /// Take an instance out of its slot for a mutable callback
    pub(crate) fn take(&mut self, key: ComponentKey) -> Option<Box<dyn Component>> {
        self.entries.get_mut(key)?.instance.take()
    }

    /// Return an instance taken with [`ComponentStorage::take`]
    pub(crate) fn restore(&mut self, key: ComponentKey, component: Box<dyn Component>) -> Restore {
        match self.entries.get_mut(key) {
            Some(entry) if entry.instance.is_none() => {
                entry.instance = Some(component);
                Restore::Restored
            }
            _ => Restore::Orphaned(component),
        }
    }

    pub(crate) fn entry(&self, key: ComponentKey) -> Option<&ComponentEntry> {
        self.entries.get(key)
    }

    pub(crate) fn entry_mut(&mut self, key: ComponentKey) -> Option<&mut ComponentEntry> {
        self.entries.get_mut(key)
    }

    /// Borrow an instance (absent while it is out for a callback)
    pub fn get(&self, key: ComponentKey) -> Option<&dyn Component> {
        self.entries.get(key)?.instance.as_deref()
    }

    /// Mutably borrow an instance
    pub fn get_mut(&mut self, key: ComponentKey) -> Option<&mut (dyn Component + 'static)> {
        self.entries.get_mut(key)?.instance.as_deref_mut()
    }

    /// Capabilities recorded at attachment
    pub fn capabilities(&self, key: ComponentKey) -> Option<Capabilities> {
        self.entries.get(key).map(|entry| entry.caps)
    }

    /// Type key of a component
    pub fn type_key(&self, key: ComponentKey) -> Option<ComponentTypeKey> {
        self.entries.get(key).map(|entry| entry.type_key)
    }

    /// Owning entity of a component
    pub fn owner(&self, key: ComponentKey) -> Option<EntityId> {
        self.entries.get(key).map(|entry| entry.owner)
    }

    /// Whether a component has been quarantined after a failed callback
    pub fn is_quarantined(&self, key: ComponentKey) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.quarantined)
    }

    /// Number of attached components
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no component is attached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
