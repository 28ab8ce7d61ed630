//! Capability queries
//!
//! A [`Query`] is resolved against the World when it is created and keeps
//! only handles. Iterating it later, any number of times, yields exactly the
//! entities and components that were live at creation; entities created
//! afterwards are not included, and components removed afterwards simply
//! fail to resolve when looked up.

use super::component::{Capabilities, ComponentTypeKey};
use super::entity::EntityId;
use super::storage::ComponentKey;

/// One match of a capability query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryItem {
    /// Owning entity
    pub entity: EntityId,
    /// Handle of the matching component
    pub component: ComponentKey,
    /// Type of the matching component
    pub type_key: ComponentTypeKey,
}

/// Ordered, restartable result of [`World::query`](super::World::query)
///
/// Order: entity insertion order, then component attachment order.
#[derive(Debug, Clone, Default)]
pub struct Query {
    capabilities: Capabilities,
    items: Vec<QueryItem>,
}

impl Query {
    pub(crate) fn new(capabilities: Capabilities, items: Vec<QueryItem>) -> Self {
        Self {
            capabilities,
            items,
        }
    }

    /// Capabilities every match exposes
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Iterate the matches from the start
    pub fn iter(&self) -> std::slice::Iter<'_, QueryItem> {
        self.items.iter()
    }

    /// Distinct entities in match order
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        let mut last = None;
        self.items.iter().filter_map(move |item| {
            if last == Some(item.entity) {
                None
            } else {
                last = Some(item.entity);
                Some(item.entity)
            }
        })
    }

    /// Number of matches
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing matched
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> IntoIterator for &'a Query {
    type Item = &'a QueryItem;
    type IntoIter = std::slice::Iter<'a, QueryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl IntoIterator for Query {
    type Item = QueryItem;
    type IntoIter = std::vec::IntoIter<QueryItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
