//! ECS World implementation
//!
//! The World owns every entity and component. Whole-entity creation and
//! removal are staged and only applied by [`World::synchronize`], which the
//! update scheduler calls between ticks; that is what makes it safe for an
//! update callback to spawn or destroy entities while the scheduler is still
//! iterating. Attaching and detaching components on an existing entity is
//! immediate.

use std::collections::HashMap;

use slotmap::SlotMap;
use thiserror::Error;

use super::component::{dispose, Capabilities, Component, ComponentTypeKey};
use super::entity::{EntityId, EntityRecord, EntityStatus};
use super::query::{Query, QueryItem};
use super::snapshot::{InterpolatedState, Snapshot, SnapshotPair};
use super::storage::{ComponentKey, ComponentStorage};

/// Structural usage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The id does not name an entity of this World (never existed or already destroyed)
    #[error("Entity {0:?} not found")]
    EntityNotFound(EntityId),

    /// The entity has no component of the requested type
    #[error("Entity {entity:?} has no {component} component")]
    ComponentNotFound {
        /// Entity that was searched
        entity: EntityId,
        /// Requested component type
        component: &'static str,
    },
}

/// What a synchronization point applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entities that became live
    pub added: usize,
    /// Entities that were destroyed
    pub removed: usize,
}

/// ECS World containing all entities and components
pub struct World {
    entities: SlotMap<EntityId, EntityRecord>,
    /// Live entities in the order they became live
    live: Vec<EntityId>,
    pending_additions: Vec<EntityId>,
    pending_removals: Vec<EntityId>,
    components: ComponentStorage,
    snapshots: SnapshotPair,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self {
            entities: SlotMap::with_key(),
            live: Vec::new(),
            pending_additions: Vec::new(),
            pending_removals: Vec::new(),
            components: ComponentStorage::new(),
            snapshots: SnapshotPair::default(),
        }
    }

    /// Create a new entity
    ///
    /// The entity exists immediately (components can be attached to it) but
    /// is not live, and so invisible to queries and schedulers, until the
    /// next synchronization point.
    pub fn create_entity(&mut self, name: impl Into<String>) -> EntityId {
        let id = self.entities.insert(EntityRecord::new(name.into()));
        self.pending_additions.push(id);
        log::trace!("Staged entity {:?} for addition", id);
        id
    }

    /// Stage an entity for removal
    ///
    /// Idempotent: returns `false` when the entity is already staged for
    /// removal or does not exist. Components are detached and disposed at the
    /// next synchronization point.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        let Some(record) = self.entities.get_mut(id) else {
            return false;
        };

        match record.status {
            EntityStatus::PendingRemoval => false,
            EntityStatus::PendingAddition => {
                // Keep the staging queues disjoint
                self.pending_additions.retain(|pending| *pending != id);
                record.status = EntityStatus::PendingRemoval;
                self.pending_removals.push(id);
                true
            }
            EntityStatus::Live => {
                record.status = EntityStatus::PendingRemoval;
                self.pending_removals.push(id);
                log::trace!("Staged entity {:?} for removal", id);
                true
            }
        }
    }

    /// Attach a component, replacing (and disposing) any component of the same type
    ///
    /// Replacement is not an error. The replacement counts as a fresh
    /// attachment and moves to the end of the entity's attachment order.
    pub fn attach<T: Component>(&mut self, id: EntityId, component: T) -> Result<ComponentKey, WorldError> {
        self.attach_boxed(id, ComponentTypeKey::of::<T>(), Box::new(component))
    }

    fn attach_boxed(
        &mut self,
        id: EntityId,
        type_key: ComponentTypeKey,
        component: Box<dyn Component>,
    ) -> Result<ComponentKey, WorldError> {
        if !self.entities.contains_key(id) {
            return Err(WorldError::EntityNotFound(id));
        }

        if let Some(existing) = self.find_component(id, type_key) {
            log::debug!("Replacing {:?} component on entity {:?}", type_key, id);
            self.detach_key(id, existing);
        }

        let key = self.components.insert(id, type_key, component);
        if let Some(record) = self.entities.get_mut(id) {
            record.components.push(key);
        }
        Ok(key)
    }

    /// Detach and dispose the component of the given type
    pub fn detach(&mut self, id: EntityId, type_key: ComponentTypeKey) -> Result<(), WorldError> {
        if !self.entities.contains_key(id) {
            return Err(WorldError::EntityNotFound(id));
        }
        let key = self
            .find_component(id, type_key)
            .ok_or(WorldError::ComponentNotFound {
                entity: id,
                component: type_key.short_name(),
            })?;
        self.detach_key(id, key);
        Ok(())
    }

    /// Typed convenience for [`World::detach`]
    pub fn detach_type<T: Component>(&mut self, id: EntityId) -> Result<(), WorldError> {
        self.detach(id, ComponentTypeKey::of::<T>())
    }

    fn detach_key(&mut self, id: EntityId, key: ComponentKey) {
        if let Some(record) = self.entities.get_mut(id) {
            record.components.retain(|attached| *attached != key);
        }
        match self.components.remove(key) {
            Some(Some(instance)) => dispose(instance),
            // Out for a callback; the scheduler disposes it when it comes back
            Some(None) => log::trace!("Detached in-flight component {:?}", key),
            None => {}
        }
    }

    fn find_component(&self, id: EntityId, type_key: ComponentTypeKey) -> Option<ComponentKey> {
        let record = self.entities.get(id)?;
        record
            .components
            .iter()
            .copied()
            .find(|key| self.components.type_key(*key) == Some(type_key))
    }

    /// Borrow a component by type
    ///
    /// Returns `None` for a component that is currently running its own
    /// update callback.
    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        let key = self.find_component(id, ComponentTypeKey::of::<T>())?;
        self.components.get(key)?.as_any().downcast_ref::<T>()
    }

    /// Mutably borrow a component by type
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        let key = self.find_component(id, ComponentTypeKey::of::<T>())?;
        self.components.get_mut(key)?.as_any_mut().downcast_mut::<T>()
    }

    /// Whether the entity has a component of type `T`
    pub fn has<T: Component>(&self, id: EntityId) -> bool {
        self.find_component(id, ComponentTypeKey::of::<T>()).is_some()
    }

    /// Borrow a component by handle
    pub fn component(&self, key: ComponentKey) -> Option<&dyn Component> {
        self.components.get(key)
    }

    /// Typed borrow by handle
    pub fn component_as<T: Component>(&self, key: ComponentKey) -> Option<&T> {
        self.components.get(key)?.as_any().downcast_ref::<T>()
    }

    /// Component types attached to an entity, in attachment order
    pub fn components_of(&self, id: EntityId) -> Result<Vec<ComponentTypeKey>, WorldError> {
        let record = self.entities.get(id).ok_or(WorldError::EntityNotFound(id))?;
        Ok(record
            .components
            .iter()
            .filter_map(|key| self.components.type_key(*key))
            .collect())
    }

    /// Resolve every live entity exposing the given capabilities
    ///
    /// The result is fixed at the time of the call; see [`Query`].
    /// Quarantined components are excluded.
    pub fn query(&self, capabilities: Capabilities) -> Query {
        let mut items = Vec::new();
        for &entity in &self.live {
            let Some(record) = self.entities.get(entity) else {
                continue;
            };
            for &key in &record.components {
                let Some(entry) = self.components.entry(key) else {
                    continue;
                };
                if entry.caps.contains(capabilities) && !entry.quarantined {
                    items.push(QueryItem {
                        entity,
                        component: key,
                        type_key: entry.type_key,
                    });
                }
            }
        }
        Query::new(capabilities, items)
    }

    /// Apply staged removals, then staged additions
    pub fn synchronize(&mut self) -> SyncReport {
        let removals = std::mem::take(&mut self.pending_removals);
        let additions = std::mem::take(&mut self.pending_additions);

        for &id in &removals {
            self.destroy(id);
        }

        let mut added = 0;
        for id in additions {
            if let Some(record) = self.entities.get_mut(id) {
                record.status = EntityStatus::Live;
                record.was_live = true;
                self.live.push(id);
                added += 1;
            }
        }

        let report = SyncReport {
            added,
            removed: removals.len(),
        };
        if report.added > 0 || report.removed > 0 {
            log::debug!(
                "Synchronized world: {} added, {} removed, {} live",
                report.added,
                report.removed,
                self.live.len()
            );
        }
        report
    }

    /// Detach and dispose every component, then forget the entity
    fn destroy(&mut self, id: EntityId) {
        let Some(record) = self.entities.remove(id) else {
            return;
        };
        if record.was_live {
            self.live.retain(|live| *live != id);
        }
        for key in record.components {
            if let Some(Some(instance)) = self.components.remove(key) {
                dispose(instance);
            }
        }
    }

    /// Destroy every entity, live or staged, disposing all components
    ///
    /// Live entities go first in insertion order, then staged ones.
    pub fn dispose_all(&mut self) -> usize {
        let mut order = std::mem::take(&mut self.live);
        order.append(&mut self.pending_removals);
        order.append(&mut self.pending_additions);

        let mut disposed = 0;
        for id in order {
            if self.entities.contains_key(id) {
                self.destroy(id);
                disposed += 1;
            }
        }
        disposed
    }

    /// Stop updating and rendering a component after a failed callback
    pub fn quarantine(&mut self, key: ComponentKey) -> bool {
        match self.components.entry_mut(key) {
            Some(entry) if !entry.quarantined => {
                entry.quarantined = true;
                true
            }
            _ => false,
        }
    }

    /// Whether the entity is visible to queries
    ///
    /// An entity staged for removal stays visible until the synchronization
    /// point destroys it.
    pub fn is_live(&self, id: EntityId) -> bool {
        self.entities.get(id).is_some_and(|record| record.was_live)
    }

    /// Whether the id names an existing (live or staged) entity
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Staging status of an entity
    pub fn status(&self, id: EntityId) -> Option<EntityStatus> {
        self.entities.get(id).map(|record| record.status)
    }

    /// Name given at creation
    pub fn name(&self, id: EntityId) -> Result<&str, WorldError> {
        self.entities
            .get(id)
            .map(|record| record.name.as_str())
            .ok_or(WorldError::EntityNotFound(id))
    }

    /// Live entities with the given name, in insertion order
    pub fn find_by_name(&self, name: &str) -> Vec<EntityId> {
        self.live
            .iter()
            .copied()
            .filter(|id| self.entities.get(*id).is_some_and(|record| record.name == name))
            .collect()
    }

    /// Live entities in insertion order
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.live.iter().copied()
    }

    /// Number of live entities
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Number of entities waiting for the next synchronization point
    pub fn pending_count(&self) -> usize {
        self.pending_additions.len() + self.pending_removals.len()
    }

    /// Number of attached components, across all entities
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Component arena, for handle-based access
    pub fn storage(&self) -> &ComponentStorage {
        &self.components
    }

    pub(crate) fn storage_mut(&mut self) -> &mut ComponentStorage {
        &mut self.components
    }

    /// The two most recent simulation snapshots
    pub fn snapshots(&self) -> &SnapshotPair {
        &self.snapshots
    }

    /// Capture interpolatable state of every live entity
    pub(crate) fn capture_snapshot(&self, tick: u64, simulation_time: std::time::Duration) -> Snapshot {
        let mut states: HashMap<EntityId, InterpolatedState> = HashMap::new();
        for &entity in &self.live {
            let Some(record) = self.entities.get(entity) else {
                continue;
            };
            let state = record.components.iter().find_map(|key| {
                let entry = self.components.entry(*key)?;
                if !entry.caps.contains(Capabilities::INTERPOLATED) || entry.quarantined {
                    return None;
                }
                entry.instance.as_deref()?.interpolation_state()
            });
            if let Some(state) = state {
                states.insert(entity, state);
            }
        }
        Snapshot::new(tick, simulation_time, states)
    }

    pub(crate) fn publish_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("live", &self.live.len())
            .field("pending_additions", &self.pending_additions.len())
            .field("pending_removals", &self.pending_removals.len())
            .field("components", &self.components.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::Disposable;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    struct Tracked {
        label: &'static str,
        log: Log,
    }

    impl Component for Tracked {
        fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
            Some(self)
        }
    }

    impl Disposable for Tracked {
        fn on_dispose(&mut self) {
            self.log.lock().unwrap().push(format!("dispose {}", self.label));
        }
    }

    struct Other;
    impl Component for Other {}

    struct Health(i32);
    impl Component for Health {}

    fn tracked(label: &'static str, log: &Log) -> Tracked {
        Tracked {
            label,
            log: Arc::clone(log),
        }
    }

    #[test]
    fn test_created_entities_become_live_at_sync() {
        let mut world = World::new();
        let a = world.create_entity("a");

        assert!(world.contains(a));
        assert!(!world.is_live(a));
        assert_eq!(world.status(a), Some(EntityStatus::PendingAddition));
        assert_eq!(world.entities().count(), 0);

        let report = world.synchronize();
        assert_eq!(report, SyncReport { added: 1, removed: 0 });
        assert!(world.is_live(a));
        assert_eq!(world.entities().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_removal_is_staged_and_idempotent() {
        let log: Log = Arc::default();
        let mut world = World::new();
        let a = world.create_entity("a");
        world.synchronize();
        world.attach(a, tracked("first", &log)).unwrap();

        assert!(world.remove_entity(a));
        assert!(!world.remove_entity(a));
        // Still present until the synchronization point
        assert!(world.contains(a));
        assert!(log.lock().unwrap().is_empty());

        world.synchronize();
        assert!(!world.contains(a));
        assert!(!world.remove_entity(a));
        assert_eq!(*log.lock().unwrap(), vec!["dispose first"]);
    }

    #[test]
    fn test_removal_disposes_in_attachment_order() {
        let log: Log = Arc::default();
        let mut world = World::new();
        let a = world.create_entity("a");
        world.attach(a, tracked("first", &log)).unwrap();
        world.attach(a, Other).unwrap();
        world.attach(a, Health(3)).unwrap();
        world.synchronize();

        struct Second(Tracked);
        impl Component for Second {
            fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
                self.0.as_disposable()
            }
        }
        world.attach(a, Second(tracked("second", &log))).unwrap();

        world.remove_entity(a);
        world.synchronize();
        assert_eq!(*log.lock().unwrap(), vec!["dispose first", "dispose second"]);
        assert_eq!(world.component_count(), 0);
    }

    #[test]
    fn test_remove_before_first_sync_never_goes_live() {
        let log: Log = Arc::default();
        let mut world = World::new();
        let a = world.create_entity("a");
        world.attach(a, tracked("only", &log)).unwrap();
        world.remove_entity(a);

        let report = world.synchronize();
        assert_eq!(report, SyncReport { added: 0, removed: 1 });
        assert!(!world.contains(a));
        assert_eq!(world.live_count(), 0);
        assert_eq!(*log.lock().unwrap(), vec!["dispose only"]);
    }

    #[test]
    fn test_attach_same_type_replaces_and_disposes_previous() {
        let log: Log = Arc::default();
        let mut world = World::new();
        let a = world.create_entity("a");
        world.attach(a, tracked("old", &log)).unwrap();
        world.attach(a, Health(10)).unwrap();
        world.attach(a, tracked("new", &log)).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["dispose old"]);
        assert_eq!(world.get::<Tracked>(a).unwrap().label, "new");
        // The replacement is a fresh attachment
        assert_eq!(
            world.components_of(a).unwrap(),
            vec![ComponentTypeKey::of::<Health>(), ComponentTypeKey::of::<Tracked>()]
        );
    }

    #[test]
    fn test_unknown_entities_are_usage_errors() {
        let mut world = World::new();
        let a = world.create_entity("a");
        world.synchronize();
        world.remove_entity(a);
        world.synchronize();

        assert_eq!(world.attach(a, Health(1)), Err(WorldError::EntityNotFound(a)));
        assert_eq!(world.detach_type::<Health>(a), Err(WorldError::EntityNotFound(a)));
        assert_eq!(world.name(a), Err(WorldError::EntityNotFound(a)));
        assert!(world.components_of(a).is_err());
    }

    #[test]
    fn test_detach_twice_is_a_usage_error() {
        let log: Log = Arc::default();
        let mut world = World::new();
        let a = world.create_entity("a");
        world.attach(a, tracked("once", &log)).unwrap();

        world.detach_type::<Tracked>(a).unwrap();
        assert!(matches!(
            world.detach_type::<Tracked>(a),
            Err(WorldError::ComponentNotFound { .. })
        ));
        assert_eq!(*log.lock().unwrap(), vec!["dispose once"]);
    }

    #[test]
    fn test_get_and_get_mut() {
        let mut world = World::new();
        let a = world.create_entity("a");
        world.attach(a, Health(5)).unwrap();

        world.get_mut::<Health>(a).unwrap().0 -= 2;
        assert_eq!(world.get::<Health>(a).unwrap().0, 3);
        assert!(world.has::<Health>(a));
        assert!(!world.has::<Other>(a));
        assert!(world.get::<Other>(a).is_none());
    }

    #[test]
    fn test_find_by_name_only_sees_live_entities() {
        let mut world = World::new();
        let a = world.create_entity("rock");
        let _b = world.create_entity("ship");
        let c = world.create_entity("rock");
        assert!(world.find_by_name("rock").is_empty());

        world.synchronize();
        assert_eq!(world.find_by_name("rock"), vec![a, c]);
        assert_eq!(world.name(a), Ok("rock"));
    }

    #[test]
    fn test_dispose_all_clears_live_and_staged() {
        let log: Log = Arc::default();
        let mut world = World::new();
        let live = world.create_entity("live");
        world.attach(live, tracked("live", &log)).unwrap();
        world.synchronize();
        let staged = world.create_entity("staged");
        world.attach(staged, tracked("staged", &log)).unwrap();

        assert_eq!(world.dispose_all(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["dispose live", "dispose staged"]);
        assert_eq!(world.live_count(), 0);
        assert_eq!(world.pending_count(), 0);
        assert_eq!(world.component_count(), 0);
    }
}
