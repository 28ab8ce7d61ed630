//! # Fixstep Engine
//!
//! A real-time 2D game engine core with a deterministic fixed-timestep
//! simulation and interpolated rendering.
//!
//! ## Features
//!
//! - **Fixed-timestep updates**: wall-clock time is converted into whole
//!   simulation ticks with a bounded catch-up policy
//! - **Interpolated rendering**: every frame blends the two most recent
//!   simulation snapshots
//! - **ECS Architecture**: entities with typed, capability-tagged components
//!   and staged entity creation/removal
//! - **Headless by default**: surfaces, input and assets are traits the host
//!   application implements
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fixstep_engine::prelude::*;
//!
//! struct Spin {
//!     angle: f32,
//! }
//!
//! impl Component for Spin {
//!     fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
//!         Some(self)
//!     }
//! }
//!
//! impl Updatable for Spin {
//!     fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
//!         self.angle += ctx.delta_secs();
//!         if ctx.tick() == 600 {
//!             ctx.request_stop();
//!         }
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut game = GameLoop::new(EngineConfig::default(), Box::new(SystemClock::new()))?;
//!     let wheel = game.world_mut().create_entity("wheel");
//!     game.world_mut().attach(wheel, Spin { angle: 0.0 })?;
//!     let metrics = game.run()?;
//!     println!("{} ticks", metrics.total_ticks);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod ecs;
pub mod foundation;
pub mod input;
pub mod render;

mod engine;

#[cfg(test)]
mod engine_tests;

pub use engine::{EngineConfig, EngineError, FrameReport, GameLoop, StopHandle};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{AssetHandle, AssetResolver, Image},
        config::Config,
        ecs::{
            Capabilities, Component, ComponentError, ComponentResult, Disposable, EntityId, FailurePolicy,
            InterpolatedState, Renderable, Updatable, UpdateContext, World,
        },
        foundation::{
            math::Vec2,
            metrics::LoopMetrics,
            time::{ManualClock, SystemClock},
        },
        input::{InputSnapshot, KeyCode, MouseButton},
        render::{DrawCommand, RenderContext, Surface},
        EngineConfig, EngineError, FrameReport, GameLoop, StopHandle,
    };
}
