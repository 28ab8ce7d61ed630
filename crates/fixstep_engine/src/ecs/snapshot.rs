//! Simulation state snapshots
//!
//! One [`Snapshot`] is captured at the end of every completed simulation
//! tick. The World keeps the two most recent ones in a [`SnapshotPair`] so
//! the render scheduler can blend between them. Snapshots are immutable once
//! published and shared through `Arc`, so a renderer on another thread may
//! hold on to them safely.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::entity::EntityId;
use crate::foundation::math::{lerp_angle, lerp_vec2, Vec2};

/// Interpolatable per-entity fields
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InterpolatedState {
    /// Position in world units
    pub position: Vec2,
    /// Rotation in radians
    pub rotation: f32,
}

impl InterpolatedState {
    /// State at a position with no rotation
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            rotation: 0.0,
        }
    }

    /// Blend towards `to`; `alpha` 0 yields `self`, 1 yields `to`
    pub fn lerp(&self, to: &Self, alpha: f32) -> Self {
        Self {
            position: lerp_vec2(&self.position, &to.position, alpha),
            rotation: lerp_angle(self.rotation, to.rotation, alpha),
        }
    }
}

/// Immutable capture of interpolatable state at a tick boundary
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    tick: u64,
    simulation_time: Duration,
    states: HashMap<EntityId, InterpolatedState>,
}

impl Snapshot {
    pub(crate) fn new(
        tick: u64,
        simulation_time: Duration,
        states: HashMap<EntityId, InterpolatedState>,
    ) -> Self {
        Self {
            tick,
            simulation_time,
            states,
        }
    }

    /// Number of the tick this snapshot was taken after
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulation time at the end of that tick
    pub fn simulation_time(&self) -> Duration {
        self.simulation_time
    }

    /// State of one entity
    pub fn get(&self, entity: EntityId) -> Option<&InterpolatedState> {
        self.states.get(&entity)
    }

    /// Number of entities captured
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no entity contributed state
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// The two most recent snapshots
#[derive(Debug, Clone, Default)]
pub struct SnapshotPair {
    previous: Option<Arc<Snapshot>>,
    current: Option<Arc<Snapshot>>,
}

impl SnapshotPair {
    /// Publish a new snapshot, discarding the oldest one
    pub(crate) fn push(&mut self, snapshot: Snapshot) {
        self.previous = self.current.take();
        self.current = Some(Arc::new(snapshot));
    }

    /// Snapshot before the latest one
    pub fn previous(&self) -> Option<&Arc<Snapshot>> {
        self.previous.as_ref()
    }

    /// Latest snapshot
    pub fn current(&self) -> Option<&Arc<Snapshot>> {
        self.current.as_ref()
    }

    /// Blend an entity's state between the previous and current snapshots
    ///
    /// Entities that only appear in the current snapshot (spawned last tick)
    /// are returned unblended.
    pub fn interpolate(&self, entity: EntityId, alpha: f32) -> Option<InterpolatedState> {
        let current = self.current.as_ref()?.get(entity)?;
        match self.previous.as_ref().and_then(|previous| previous.get(entity)) {
            Some(previous) => Some(previous.lerp(current, alpha)),
            None => Some(*current),
        }
    }
}
