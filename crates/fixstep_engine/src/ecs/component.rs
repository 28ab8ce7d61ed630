//! Component trait and capability roles
//!
//! A component is any `'static + Send` type implementing [`Component`]. It
//! opts into engine behaviour by implementing one or more capability traits
//! and returning itself from the matching accessor:
//!
//! ```ignore
//! struct Spin { angle: f32 }
//!
//! impl Component for Spin {
//!     fn as_updatable(&mut self) -> Option<&mut dyn Updatable> { Some(self) }
//! }
//!
//! impl Updatable for Spin {
//!     fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
//!         self.angle += ctx.delta_secs();
//!         Ok(())
//!     }
//! }
//! ```
//!
//! The accessors are consulted once, when the component is attached, and the
//! result is recorded as the component's [`Capabilities`]. The schedulers
//! filter on those flags; they never inspect concrete types.

use std::any::{Any, TypeId};
use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

use super::entity::EntityId;
use super::scheduler::UpdateContext;
use super::snapshot::InterpolatedState;
use crate::render::RenderContext;

bitflags! {
    /// Capability roles a component declared at attachment time
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Invoked once per simulation tick
        const UPDATABLE = 1 << 0;
        /// Invoked once per rendered frame
        const RENDERABLE = 1 << 1;
        /// Notified exactly once when detached or when its entity is destroyed
        const DISPOSABLE = 1 << 2;
        /// Contributes interpolatable state to simulation snapshots
        const INTERPOLATED = 1 << 3;
    }
}

/// Blanket downcasting support for components
pub trait AsAny: Any {
    /// Borrow as `&dyn Any`
    fn as_any(&self) -> &dyn Any;
    /// Borrow as `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A typed bundle of state and/or behaviour attached to exactly one entity
pub trait Component: AsAny + Send {
    /// Updatable role
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        None
    }

    /// Renderable role
    fn as_renderable(&self) -> Option<&dyn Renderable> {
        None
    }

    /// Disposable role
    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        None
    }

    /// Interpolatable state captured into each simulation snapshot
    ///
    /// Only the first component (in attachment order) of an entity that
    /// returns `Some` at attachment time contributes to snapshots.
    fn interpolation_state(&self) -> Option<InterpolatedState> {
        None
    }
}

/// Per-tick game logic
pub trait Updatable {
    /// Advance this component by one fixed simulation tick
    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult;
}

/// Per-frame presentation
///
/// Render callbacks only get shared access to the World. Creating, removing,
/// attaching or detaching from a render callback is forbidden; queue such
/// work from an update instead.
pub trait Renderable {
    /// Issue draw commands for the current frame
    fn on_render(&self, ctx: &mut RenderContext<'_>) -> ComponentResult;
}

/// Cleanup hook
pub trait Disposable {
    /// Called exactly once, when the component is detached or its entity is destroyed
    fn on_dispose(&mut self);
}

/// Compute the capability flags of a freshly attached component
pub(crate) fn capabilities_of(component: &mut dyn Component) -> Capabilities {
    let mut caps = Capabilities::empty();
    if component.as_updatable().is_some() {
        caps |= Capabilities::UPDATABLE;
    }
    if component.as_renderable().is_some() {
        caps |= Capabilities::RENDERABLE;
    }
    if component.as_disposable().is_some() {
        caps |= Capabilities::DISPOSABLE;
    }
    if component.interpolation_state().is_some() {
        caps |= Capabilities::INTERPOLATED;
    }
    caps
}

/// Run the dispose hook of a component that is leaving the World
pub(crate) fn dispose(mut component: Box<dyn Component>) {
    if let Some(disposable) = component.as_disposable() {
        disposable.on_dispose();
    }
}

/// Key identifying a component type; an entity holds at most one component per key
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentTypeKey {
    id: TypeId,
    name: &'static str,
}

impl ComponentTypeKey {
    /// Key for a concrete component type
    pub fn of<T: Component>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name, for diagnostics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl fmt::Debug for ComponentTypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Error returned by a component callback
#[derive(Error, Debug)]
pub enum ComponentError {
    /// Plain failure message
    #[error("{0}")]
    Message(String),

    /// Wrapped source error
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ComponentError {
    /// Create an error from a message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Result type of component callbacks
pub type ComponentResult = Result<(), ComponentError>;

/// Which callback failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPhase {
    /// `Updatable::on_update`
    Update,
    /// `Renderable::on_render`
    Render,
    /// A timed action scheduled through the update context
    TimedAction,
}

impl fmt::Display for CallbackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => f.write_str("update"),
            Self::Render => f.write_str("render"),
            Self::TimedAction => f.write_str("timed action"),
        }
    }
}

/// A component callback failed; propagated to the game loop
#[derive(Error, Debug)]
#[error("{phase} callback of {component} on entity {entity:?} failed: {source}")]
pub struct CallbackFailure {
    /// Entity owning the failed component (null for world-level timed actions)
    pub entity: EntityId,
    /// Short type name of the failed component
    pub component: &'static str,
    /// Storage key of the failed component, if the failure came from one
    pub key: Option<super::storage::ComponentKey>,
    /// Callback that failed
    pub phase: CallbackPhase,
    /// Error returned by the callback
    pub source: ComponentError,
}
