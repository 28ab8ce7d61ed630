//! Per-frame render scheduling
//!
//! Runs once per driver tick, paused or not, so a paused simulation still
//! presents frames. Renderables are visited in the same order as updates and
//! only get shared access to the World.

use crate::ecs::{
    CallbackFailure, CallbackPhase, Capabilities, Component, EntityId, FailurePolicy, InterpolatedState,
    SnapshotPair, World,
};

use super::surface::{DrawCommand, Surface};
use super::RenderError;

/// Access handed to renderable components
pub struct RenderContext<'a> {
    world: &'a World,
    surface: &'a mut dyn Surface,
    entity: EntityId,
    alpha: f32,
    frame: u64,
}

impl<'a> RenderContext<'a> {
    /// Entity owning the component being rendered
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Fraction of a tick elapsed since the latest snapshot, in `[0, 1)`
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Number of the frame being drawn, starting at 1
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Read-only view of the World
    pub fn world(&self) -> &World {
        self.world
    }

    /// The two most recent simulation snapshots
    pub fn snapshots(&self) -> &SnapshotPair {
        self.world.snapshots()
    }

    /// Borrow a component of any entity
    pub fn get<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.world.get::<T>(id)
    }

    /// This entity's state blended between the two latest snapshots
    pub fn interpolated(&self) -> Option<InterpolatedState> {
        self.interpolated_for(self.entity)
    }

    /// Any entity's state blended between the two latest snapshots
    pub fn interpolated_for(&self, entity: EntityId) -> Option<InterpolatedState> {
        self.world.snapshots().interpolate(entity, self.alpha)
    }

    /// Queue a draw command on the surface
    pub fn draw(&mut self, command: DrawCommand) {
        self.surface.submit(command);
    }
}

/// Result of one rendered frame
#[derive(Debug, Default)]
pub struct RenderReport {
    /// Frame number
    pub frame: u64,
    /// Renderable callbacks invoked
    pub rendered: usize,
    /// Failures skipped under [`FailurePolicy::SkipComponent`]
    ///
    /// The World is read-only during rendering, so quarantining the failed
    /// components is left to the caller.
    pub faults: Vec<CallbackFailure>,
}

/// Render scheduler
#[derive(Debug, Default)]
pub struct RenderScheduler {
    frames: u64,
}

impl RenderScheduler {
    /// Create a render scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Render one frame
    pub fn render(
        &mut self,
        world: &World,
        surface: &mut dyn Surface,
        alpha: f32,
        policy: FailurePolicy,
    ) -> Result<RenderReport, RenderError> {
        let frame = self.frames + 1;
        let alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 1.0 - f32::EPSILON)
        } else {
            0.0
        };
        let mut report = RenderReport {
            frame,
            ..RenderReport::default()
        };

        surface.begin_frame(frame)?;

        let renderables = world.query(Capabilities::RENDERABLE);
        for item in &renderables {
            let Some(renderable) = world
                .storage()
                .get(item.component)
                .and_then(|component| component.as_renderable())
            else {
                continue;
            };

            let mut ctx = RenderContext {
                world,
                surface: &mut *surface,
                entity: item.entity,
                alpha,
                frame,
            };
            report.rendered += 1;

            if let Err(source) = renderable.on_render(&mut ctx) {
                let failure = CallbackFailure {
                    entity: item.entity,
                    component: item.type_key.short_name(),
                    key: Some(item.component),
                    phase: CallbackPhase::Render,
                    source,
                };
                match policy {
                    FailurePolicy::Abort => {
                        // Close the frame so the surface can begin the next one
                        if let Err(e) = surface.end_frame() {
                            log::warn!("Failed to end aborted frame {}: {}", frame, e);
                        }
                        self.frames = frame;
                        return Err(RenderError::Callback(failure));
                    }
                    FailurePolicy::SkipComponent => {
                        log::error!("{}; skipping it from now on", failure);
                        report.faults.push(failure);
                    }
                }
            }
        }

        surface.end_frame()?;
        self.frames = frame;
        log::trace!("Rendered frame {} ({} renderables)", frame, report.rendered);
        Ok(report)
    }
}
