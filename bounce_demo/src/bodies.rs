//! Bouncing body components

use fixstep_engine::ecs::{
    Component, ComponentError, ComponentResult, Disposable, InterpolatedState, Renderable, Updatable, UpdateContext,
};
use fixstep_engine::foundation::math::Vec2;
use fixstep_engine::foundation::random::GameRandom;
use fixstep_engine::render::{DrawCommand, RenderContext};

// Arena configuration
pub const ARENA_WIDTH: f32 = 800.0;
pub const ARENA_HEIGHT: f32 = 600.0;
const GRAVITY: f32 = 400.0;
const RESTITUTION: f32 = 0.85;
const MIN_RADIUS: f32 = 4.0;
const MAX_RADIUS: f32 = 16.0;
const MAX_SPEED: f32 = 250.0;

/// A ball that falls and bounces off the arena walls
pub struct Body {
    position: Vec2,
    velocity: Vec2,
    radius: f32,
    color: [f32; 4],
    bounces: u32,
}

impl Body {
    /// Body with a random position, velocity, size and color
    pub fn random(rng: &mut GameRandom) -> Self {
        let radius = rng.next_f32(MIN_RADIUS, MAX_RADIUS);
        Self {
            position: Vec2::new(
                rng.next_f32(radius, ARENA_WIDTH - radius),
                rng.next_f32(radius, ARENA_HEIGHT / 2.0),
            ),
            velocity: Vec2::new(rng.next_f32(-MAX_SPEED, MAX_SPEED), rng.next_f32(-MAX_SPEED, 0.0)),
            radius,
            color: [rng.next_f32(0.3, 1.0), rng.next_f32(0.3, 1.0), rng.next_f32(0.3, 1.0), 1.0],
            bounces: 0,
        }
    }

    /// Wall contacts so far
    pub fn bounces(&self) -> u32 {
        self.bounces
    }

    fn bounce(&mut self) {
        let (min_x, max_x) = (self.radius, ARENA_WIDTH - self.radius);
        let (min_y, max_y) = (self.radius, ARENA_HEIGHT - self.radius);

        if self.position.x < min_x || self.position.x > max_x {
            self.position.x = self.position.x.clamp(min_x, max_x);
            self.velocity.x = -self.velocity.x * RESTITUTION;
            self.bounces += 1;
        }
        if self.position.y < min_y || self.position.y > max_y {
            self.position.y = self.position.y.clamp(min_y, max_y);
            self.velocity.y = -self.velocity.y * RESTITUTION;
            self.bounces += 1;
        }
    }
}

impl Component for Body {
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

impl Updatable for Body {
    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
        let dt = ctx.delta_secs();
        self.velocity.y += GRAVITY * dt;
        self.position += self.velocity * dt;
        self.bounce();
        Ok(())
    }
}

impl Renderable for Body {
    fn on_render(&self, ctx: &mut RenderContext<'_>) -> ComponentResult {
        // Spawned this tick; no snapshot has seen it yet
        let Some(state) = ctx.interpolated() else {
            return Ok(());
        };
        ctx.draw(DrawCommand::Circle {
            center: state.position,
            radius: self.radius,
            color: self.color,
        });
        Ok(())
    }
}

/// Removes its entity after a number of ticks
pub struct Lifetime {
    remaining: u64,
}

impl Lifetime {
    /// Live for `ticks` more ticks
    pub fn new(ticks: u64) -> Self {
        Self { remaining: ticks }
    }
}

impl Component for Lifetime {
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }

    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        Some(self)
    }
}

impl Updatable for Lifetime {
    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            let entity = ctx.entity();
            if let Some(body) = ctx.get::<Body>(entity) {
                log::debug!("Body {:?} expired after {} bounces", entity, body.bounces());
            }
            ctx.remove_entity(entity);
        }
        Ok(())
    }
}

impl Disposable for Lifetime {
    fn on_dispose(&mut self) {
        log::trace!("Lifetime disposed with {} ticks left", self.remaining);
    }
}

/// Spawns a new short-lived body at a fixed interval
pub struct Emitter {
    interval: u64,
    lifetime: u64,
    max_live: usize,
}

impl Emitter {
    /// Emit every `interval` ticks while fewer than `max_live` bodies exist
    pub fn new(interval: u64, lifetime: u64, max_live: usize) -> Self {
        Self {
            interval: interval.max(1),
            lifetime,
            max_live,
        }
    }
}

impl Component for Emitter {
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }
}

impl Updatable for Emitter {
    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
        if ctx.tick() % self.interval != 0 || ctx.world().find_by_name("spark").len() >= self.max_live {
            return Ok(());
        }

        let body = Body::random(ctx.rng());
        let spark = ctx.create_entity("spark");
        ctx.attach(spark, body)
            .and_then(|_| ctx.attach(spark, Lifetime::new(self.lifetime)))
            .map_err(|e| ComponentError::Other(Box::new(e)))?;
        Ok(())
    }
}
