//! Fixed-timestep update scheduling
//!
//! Converts variable wall-clock elapsed time into a whole number of fixed
//! simulation ticks. Each tick:
//!
//! 1. applies the World's staged entity additions and removals,
//! 2. polls input once,
//! 3. invokes every updatable component once, in entity insertion order and
//!    then component attachment order,
//! 4. runs timed actions that have come due,
//! 5. consumes one tick length from the accumulator and publishes a snapshot.
//!
//! A driver tick never runs more than `max_catch_up_ticks` ticks. Whole ticks
//! beyond that bound are dropped and the condition is logged, while the
//! fractional remainder is kept for interpolation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::component::{
    dispose, CallbackFailure, CallbackPhase, Capabilities, Component, ComponentResult, ComponentTypeKey,
};
use super::entity::EntityId;
use super::query::Query;
use super::storage::{ComponentKey, Restore};
use super::world::{World, WorldError};
use crate::foundation::random::GameRandom;
use crate::input::{InputSnapshot, InputSource};

/// What happens when a component callback returns an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// End the pass and propagate the failure to the game loop
    #[default]
    Abort,
    /// Log the failure, quarantine the component and keep going
    SkipComponent,
}

/// Lifecycle of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Constructed, not started
    Idle,
    /// Consuming elapsed time
    Running,
    /// Ignoring elapsed time; the accumulator is frozen
    Paused,
    /// Terminal
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Requested lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// `start()`
    Start,
    /// `pause()`
    Pause,
    /// `resume()`
    Resume,
}

/// Scheduler lifecycle errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The transition is not allowed from the current state
    #[error("Cannot {requested:?} a scheduler that is {from}")]
    InvalidTransition {
        /// State at the time of the request
        from: SchedulerState,
        /// Rejected transition
        requested: Transition,
    },
}

/// Fixed parameters of an update scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    /// Length of one simulation tick
    pub tick_length: Duration,
    /// Most ticks a single driver tick may run
    pub max_catch_up_ticks: u32,
    /// Multiplier applied to elapsed time before accumulation
    pub time_scale: f64,
    /// Seed of the simulation random generator
    pub seed: u64,
    /// Callback failure handling
    pub failure_policy: FailurePolicy,
}

impl SchedulerSettings {
    /// Settings for a tick rate in ticks per second
    pub fn with_tick_rate(tick_rate: u32) -> Self {
        Self {
            tick_length: Duration::from_nanos(1_000_000_000 / u64::from(tick_rate.max(1))),
            ..Self::default()
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_length: Duration::from_nanos(1_000_000_000 / 60),
            max_catch_up_ticks: 5,
            time_scale: 1.0,
            seed: 0,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// One-shot closure run at the end of a future tick
pub type TimedAction = Box<dyn FnOnce(&mut UpdateContext<'_>) -> ComponentResult + Send>;

struct ScheduledAction {
    due: u64,
    action: TimedAction,
}

#[derive(Default)]
struct ActionQueue {
    pending: Vec<ScheduledAction>,
}

impl ActionQueue {
    fn push(&mut self, due: u64, action: TimedAction) {
        self.pending.push(ScheduledAction { due, action });
    }

    /// Remove the actions due at `tick`, in scheduling order
    fn take_due(&mut self, tick: u64) -> Vec<ScheduledAction> {
        let (due, rest) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|scheduled| scheduled.due <= tick);
        self.pending = rest;
        due
    }
}

/// Access handed to updatable components and timed actions
///
/// Reads of any entity are unrestricted. Entity creation and removal are
/// staged until the next tick; component attach and detach are immediate.
/// The component currently being updated is out of the World for the
/// duration of its own callback, so looking up its own type on its own
/// entity yields `None`.
pub struct UpdateContext<'a> {
    world: &'a mut World,
    input: &'a InputSnapshot,
    rng: &'a mut GameRandom,
    actions: &'a mut ActionQueue,
    stop_requested: &'a mut bool,
    entity: EntityId,
    tick: u64,
    delta: Duration,
    simulation_time: Duration,
}

impl<'a> UpdateContext<'a> {
    /// Entity owning the component being updated (null for world-level timed actions)
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Number of the tick in progress, starting at 1
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Fixed tick length
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Fixed tick length in seconds
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Simulation time at the start of this tick
    pub fn simulation_time(&self) -> Duration {
        self.simulation_time
    }

    /// Read-only view of the World
    pub fn world(&self) -> &World {
        &*self.world
    }

    /// Borrow a component of any entity
    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.world.get::<T>(id)
    }

    /// Mutably borrow a component of any entity
    pub fn get_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.world.get_mut::<T>(id)
    }

    /// Resolve a capability query against the current World
    pub fn query(&self, capabilities: Capabilities) -> Query {
        self.world.query(capabilities)
    }

    /// Stage a new entity; it is updated from the next tick on
    pub fn create_entity(&mut self, name: impl Into<String>) -> EntityId {
        self.world.create_entity(name)
    }

    /// Stage an entity for removal at the next synchronization point
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        self.world.remove_entity(id)
    }

    /// Attach a component immediately
    pub fn attach<T: Component>(&mut self, id: EntityId, component: T) -> Result<ComponentKey, WorldError> {
        self.world.attach(id, component)
    }

    /// Detach and dispose a component immediately
    pub fn detach(&mut self, id: EntityId, type_key: ComponentTypeKey) -> Result<(), WorldError> {
        self.world.detach(id, type_key)
    }

    /// Input state polled at the start of this tick
    pub fn input(&self) -> &InputSnapshot {
        self.input
    }

    /// Seeded simulation random generator
    pub fn rng(&mut self) -> &mut GameRandom {
        &mut *self.rng
    }

    /// Run `action` at the end of the tick `ticks` after this one
    ///
    /// A delay of zero runs it at the end of the current tick.
    pub fn execute_after<F>(&mut self, ticks: u64, action: F)
    where
        F: FnOnce(&mut UpdateContext<'_>) -> ComponentResult + Send + 'static,
    {
        self.actions.push(self.tick + ticks, Box::new(action));
    }

    /// Ask the game loop to stop after the current driver tick
    pub fn request_stop(&mut self) {
        *self.stop_requested = true;
    }
}

/// Counters accumulated over the scheduler's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Driver ticks that hit the catch-up bound
    pub falling_behind_events: u64,
    /// Ticks discarded by the catch-up bound
    pub dropped_ticks: u64,
    /// Callback failures that were skipped under [`FailurePolicy::SkipComponent`]
    pub skipped_failures: u64,
}

/// Result of one [`UpdateScheduler::advance`]
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// Ticks executed
    pub ticks: u32,
    /// Ticks dropped by the catch-up bound
    pub dropped_ticks: u64,
    /// Failures skipped under [`FailurePolicy::SkipComponent`]
    pub faults: Vec<CallbackFailure>,
    /// A callback asked the game loop to stop
    pub stop_requested: bool,
}

impl UpdateReport {
    /// Whether the catch-up bound was hit
    pub fn fell_behind(&self) -> bool {
        self.dropped_ticks > 0
    }
}

/// Fixed-timestep update scheduler
pub struct UpdateScheduler {
    settings: SchedulerSettings,
    state: SchedulerState,
    accumulator: Duration,
    ticks: u64,
    simulation_time: Duration,
    rng: GameRandom,
    input: InputSnapshot,
    actions: ActionQueue,
    stats: SchedulerStats,
}

impl UpdateScheduler {
    /// Create an idle scheduler
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            rng: GameRandom::new(settings.seed),
            settings,
            state: SchedulerState::Idle,
            accumulator: Duration::ZERO,
            ticks: 0,
            simulation_time: Duration::ZERO,
            input: InputSnapshot::default(),
            actions: ActionQueue::default(),
            stats: SchedulerStats::default(),
        }
    }

    /// Idle to Running
    pub fn start(&mut self) -> Result<(), SchedulerError> {
        self.transition(Transition::Start, SchedulerState::Idle, SchedulerState::Running)
    }

    /// Running to Paused; pausing a paused scheduler is a no-op
    pub fn pause(&mut self) -> Result<(), SchedulerError> {
        if self.state == SchedulerState::Paused {
            return Ok(());
        }
        self.transition(Transition::Pause, SchedulerState::Running, SchedulerState::Paused)
    }

    /// Paused to Running; resuming a running scheduler is a no-op
    pub fn resume(&mut self) -> Result<(), SchedulerError> {
        if self.state == SchedulerState::Running {
            return Ok(());
        }
        self.transition(Transition::Resume, SchedulerState::Paused, SchedulerState::Running)
    }

    /// Any state to Stopped
    pub fn stop(&mut self) {
        self.state = SchedulerState::Stopped;
    }

    fn transition(
        &mut self,
        requested: Transition,
        from: SchedulerState,
        to: SchedulerState,
    ) -> Result<(), SchedulerError> {
        if self.state != from {
            return Err(SchedulerError::InvalidTransition {
                from: self.state,
                requested,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Fixed parameters
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Completed ticks
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulation time covered by the completed ticks
    pub fn simulation_time(&self) -> Duration {
        self.simulation_time
    }

    /// Unconsumed elapsed time
    pub fn accumulated(&self) -> Duration {
        self.accumulator
    }

    /// Lifetime counters
    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// Seeded simulation random generator
    pub fn rng(&mut self) -> &mut GameRandom {
        &mut self.rng
    }

    /// Number of timed actions not yet run
    pub fn pending_actions(&self) -> usize {
        self.actions.pending.len()
    }

    /// Leftover accumulator time as a fraction of a tick, in `[0, 1)`
    pub fn interpolation_alpha(&self) -> f32 {
        let alpha = self.accumulator.as_secs_f64() / self.settings.tick_length.as_secs_f64();
        #[allow(clippy::cast_possible_truncation)]
        let alpha = alpha as f32;
        alpha.clamp(0.0, 1.0 - f32::EPSILON)
    }

    /// Simulation time spanned by a number of ticks
    pub fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let nanos = u64::try_from(self.settings.tick_length.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(nanos.saturating_mul(ticks))
    }

    /// Whole ticks contained in a duration
    pub fn duration_to_ticks(&self, duration: Duration) -> u64 {
        let ticks = duration.as_nanos() / self.settings.tick_length.as_nanos().max(1);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Schedule a world-level action `ticks` after the last completed tick
    ///
    /// A delay of zero runs it at the end of the next tick.
    pub fn execute_after<F>(&mut self, ticks: u64, action: F)
    where
        F: FnOnce(&mut UpdateContext<'_>) -> ComponentResult + Send + 'static,
    {
        self.actions.push(self.ticks + ticks, Box::new(action));
    }

    fn scaled(&self, elapsed: Duration) -> Duration {
        if (self.settings.time_scale - 1.0).abs() < f64::EPSILON {
            elapsed
        } else {
            elapsed.mul_f64(self.settings.time_scale)
        }
    }

    /// Feed one driver tick's elapsed time and run the ticks it pays for
    ///
    /// Does nothing unless the scheduler is running.
    pub fn advance(
        &mut self,
        world: &mut World,
        elapsed: Duration,
        input: &mut dyn InputSource,
    ) -> Result<UpdateReport, CallbackFailure> {
        let mut report = UpdateReport::default();
        if self.state != SchedulerState::Running {
            return Ok(report);
        }

        self.accumulator += self.scaled(elapsed);
        let tick_length = self.settings.tick_length;
        let max_ticks = self.settings.max_catch_up_ticks;

        let owed = self.duration_to_ticks(self.accumulator);
        if owed > u64::from(max_ticks) {
            let dropped = owed - u64::from(max_ticks);
            self.accumulator = self.accumulator.saturating_sub(self.ticks_to_duration(dropped));
            self.stats.falling_behind_events += 1;
            self.stats.dropped_ticks += dropped;
            report.dropped_ticks = dropped;
            log::warn!(
                "Simulation falling behind: {} ticks owed, running {}, dropping {}",
                owed,
                max_ticks,
                dropped
            );
        }

        while self.accumulator >= tick_length && report.ticks < max_ticks {
            self.run_tick(world, input, &mut report)?;
            self.accumulator -= tick_length;
            report.ticks += 1;
        }

        Ok(report)
    }

    fn run_tick(
        &mut self,
        world: &mut World,
        input: &mut dyn InputSource,
        report: &mut UpdateReport,
    ) -> Result<(), CallbackFailure> {
        world.synchronize();
        self.input = input.poll();

        let tick = self.ticks + 1;
        let delta = self.settings.tick_length;
        let started_at = self.simulation_time;
        log::trace!("Tick {} starting at {:?}", tick, started_at);

        let updatables = world.query(Capabilities::UPDATABLE);
        for item in &updatables {
            // Detached, replaced or quarantined earlier in this pass
            if world.storage().is_quarantined(item.component) {
                continue;
            }
            let Some(mut instance) = world.storage_mut().take(item.component) else {
                continue;
            };

            let result = match instance.as_updatable() {
                Some(updatable) => {
                    let mut ctx = UpdateContext {
                        world: &mut *world,
                        input: &self.input,
                        rng: &mut self.rng,
                        actions: &mut self.actions,
                        stop_requested: &mut report.stop_requested,
                        entity: item.entity,
                        tick,
                        delta,
                        simulation_time: started_at,
                    };
                    updatable.on_update(&mut ctx)
                }
                None => Ok(()),
            };

            if let Restore::Orphaned(instance) = world.storage_mut().restore(item.component, instance) {
                dispose(instance);
            }

            if let Err(source) = result {
                self.handle_failure(
                    world,
                    CallbackFailure {
                        entity: item.entity,
                        component: item.type_key.short_name(),
                        key: Some(item.component),
                        phase: CallbackPhase::Update,
                        source,
                    },
                    report,
                )?;
            }
        }

        for scheduled in self.actions.take_due(tick) {
            let mut ctx = UpdateContext {
                world: &mut *world,
                input: &self.input,
                rng: &mut self.rng,
                actions: &mut self.actions,
                stop_requested: &mut report.stop_requested,
                entity: EntityId::default(),
                tick,
                delta,
                simulation_time: started_at,
            };
            if let Err(source) = (scheduled.action)(&mut ctx) {
                self.handle_failure(
                    world,
                    CallbackFailure {
                        entity: EntityId::default(),
                        component: "timed action",
                        key: None,
                        phase: CallbackPhase::TimedAction,
                        source,
                    },
                    report,
                )?;
            }
        }

        self.ticks = tick;
        self.simulation_time += delta;
        let snapshot = world.capture_snapshot(self.ticks, self.simulation_time);
        world.publish_snapshot(snapshot);
        Ok(())
    }

    fn handle_failure(
        &mut self,
        world: &mut World,
        failure: CallbackFailure,
        report: &mut UpdateReport,
    ) -> Result<(), CallbackFailure> {
        match self.settings.failure_policy {
            FailurePolicy::Abort => Err(failure),
            FailurePolicy::SkipComponent => {
                log::error!("{}; skipping it from now on", failure);
                if let Some(key) = failure.key {
                    world.quarantine(key);
                }
                self.stats.skipped_failures += 1;
                report.faults.push(failure);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("state", &self.state)
            .field("ticks", &self.ticks)
            .field("accumulator", &self.accumulator)
            .field("pending_actions", &self.actions.pending.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
