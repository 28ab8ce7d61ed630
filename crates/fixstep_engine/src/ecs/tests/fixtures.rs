//! Recorder components shared by the scheduler and scenario tests

use std::sync::{Arc, Mutex};

use crate::ecs::{
    Component, ComponentError, ComponentResult, Disposable, InterpolatedState, Renderable, Updatable,
    UpdateContext,
};
use crate::foundation::math::Vec2;
use crate::render::{DrawCommand, RenderContext};

pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn event_log() -> EventLog {
    Arc::default()
}

pub(crate) fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Records every callback it receives as `"<callback> <label>[ <tick>]"`
pub(crate) struct Recorder {
    label: &'static str,
    log: EventLog,
    fail_on_tick: Option<u64>,
    fail_render: bool,
}

impl Recorder {
    pub(crate) fn new(label: &'static str, log: &EventLog) -> Self {
        Self {
            label,
            log: Arc::clone(log),
            fail_on_tick: None,
            fail_render: false,
        }
    }

    pub(crate) fn failing_on(mut self, tick: u64) -> Self {
        self.fail_on_tick = Some(tick);
        self
    }

    pub(crate) fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    fn record(&self, event: String) {
        self.log.lock().unwrap().push(event);
    }
}

impl Component for Recorder {
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }

    fn as_renderable(&self) -> Option<&dyn Renderable> {
        Some(self)
    }

    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        Some(self)
    }
}

impl Updatable for Recorder {
    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
        self.record(format!("update {} {}", self.label, ctx.tick()));
        if self.fail_on_tick == Some(ctx.tick()) {
            return Err(ComponentError::msg(format!("{} failed on purpose", self.label)));
        }
        Ok(())
    }
}

impl Renderable for Recorder {
    fn on_render(&self, _ctx: &mut RenderContext<'_>) -> ComponentResult {
        self.record(format!("render {}", self.label));
        if self.fail_render {
            return Err(ComponentError::msg("render failed on purpose"));
        }
        Ok(())
    }
}

impl Disposable for Recorder {
    fn on_dispose(&mut self) {
        self.record(format!("dispose {}", self.label));
    }
}

/// Constant-velocity body contributing to snapshots
pub(crate) struct Mover {
    pub(crate) position: Vec2,
    velocity: Vec2,
}

impl Mover {
    pub(crate) fn new(x: f32, y: f32, vx: f32, vy: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            velocity: Vec2::new(vx, vy),
        }
    }
}

impl Component for Mover {
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }

    fn as_renderable(&self) -> Option<&dyn Renderable> {
        Some(self)
    }

    fn interpolation_state(&self) -> Option<InterpolatedState> {
        Some(InterpolatedState {
            position: self.position,
            rotation: 0.0,
        })
    }
}

impl Updatable for Mover {
    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
        self.position += self.velocity * ctx.delta_secs();
        Ok(())
    }
}

impl Renderable for Mover {
    fn on_render(&self, ctx: &mut RenderContext<'_>) -> ComponentResult {
        let state = ctx
            .interpolated()
            .ok_or_else(|| ComponentError::msg("no snapshot yet"))?;
        ctx.draw(DrawCommand::Circle {
            center: state.position,
            radius: 1.0,
            color: [1.0; 4],
        });
        Ok(())
    }
}

/// Random walk driven by the scheduler's seeded generator
pub(crate) struct Wanderer {
    position: Vec2,
}

impl Wanderer {
    pub(crate) fn new() -> Self {
        Self {
            position: Vec2::zeros(),
        }
    }
}

impl Component for Wanderer {
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }

    fn interpolation_state(&self) -> Option<InterpolatedState> {
        Some(InterpolatedState {
            position: self.position,
            rotation: 0.0,
        })
    }
}

impl Updatable for Wanderer {
    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
        let step = Vec2::new(ctx.rng().next_f32(-1.0, 1.0), ctx.rng().next_f32(-1.0, 1.0));
        self.position += step;
        Ok(())
    }
}

/// Spawns a new recorded entity on every tick
pub(crate) struct Spawner {
    log: EventLog,
}

impl Spawner {
    pub(crate) fn new(log: &EventLog) -> Self {
        Self { log: Arc::clone(log) }
    }
}

impl Component for Spawner {
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }
}

impl Updatable for Spawner {
    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
        let child = ctx.create_entity("spawned");
        ctx.attach(child, Recorder::new("spawned", &self.log))
            .map_err(|e| ComponentError::msg(e.to_string()))?;

        let visible = ctx.query(crate::ecs::Capabilities::UPDATABLE).entities().count();
        self.log
            .lock()
            .unwrap()
            .push(format!("spawner sees {} at {}", visible, ctx.tick()));
        Ok(())
    }
}
