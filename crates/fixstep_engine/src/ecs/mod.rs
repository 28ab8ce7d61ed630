//! Entity-Component-System implementation
//!
//! Entities are generation-checked ids owned by the [`World`]; components
//! are boxed trait objects stored in one arena and tagged with the
//! capability roles they declared. The [`UpdateScheduler`] drives every
//! updatable component at a fixed tick rate.

pub mod component;
pub mod entity;
pub mod query;
pub mod scheduler;
pub mod snapshot;
pub mod storage;
pub mod world;

#[cfg(test)]
pub(crate) mod tests;

pub use component::{
    AsAny, CallbackFailure, CallbackPhase, Capabilities, Component, ComponentError, ComponentResult,
    ComponentTypeKey, Disposable, Renderable, Updatable,
};
pub use entity::{EntityId, EntityStatus};
pub use query::{Query, QueryItem};
pub use scheduler::{
    FailurePolicy, SchedulerError, SchedulerSettings, SchedulerState, SchedulerStats, TimedAction, Transition,
    UpdateContext, UpdateReport, UpdateScheduler,
};
pub use snapshot::{InterpolatedState, Snapshot, SnapshotPair};
pub use storage::{ComponentKey, ComponentStorage};
pub use world::{SyncReport, World, WorldError};
