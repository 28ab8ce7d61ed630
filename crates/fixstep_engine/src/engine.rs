//! Core engine implementation
//!
//! [`GameLoop`] owns the World, one update scheduler, one render scheduler
//! and the single time source feeding both. Every driver tick samples the
//! time source once, lets the update scheduler consume the elapsed time in
//! fixed ticks, then renders one frame with the leftover fraction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::ecs::{
    CallbackFailure, FailurePolicy, SchedulerError, SchedulerSettings, SchedulerState, UpdateScheduler, World,
    WorldError,
};
use crate::foundation::metrics::{LoopMetrics, RateCounter};
use crate::foundation::time::{Clock, FramePacer, TimeError, TimeSource};
use crate::input::{InputSource, NullInput};
use crate::render::{NullSurface, RenderError, RenderScheduler, Surface, SurfaceError};

/// Engine configuration
///
/// Every value is fixed once the [`GameLoop`] is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,

    /// Most ticks a single driver tick may run before dropping the rest
    pub max_catch_up_ticks: u32,

    /// Upper bound on one elapsed-time sample, in milliseconds
    pub max_frame_time_ms: u64,

    /// Multiplier applied to elapsed time (slow motion below 1, fast forward above)
    pub time_scale: f64,

    /// Frame pacing target for [`GameLoop::run`]; `None` runs unpaced
    pub target_fps: Option<u32>,

    /// What to do when a component callback fails
    pub failure_policy: FailurePolicy,

    /// Seed of the simulation random generator
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            max_catch_up_ticks: 5,
            max_frame_time_ms: 250,
            time_scale: 1.0,
            target_fps: None,
            failure_policy: FailurePolicy::Abort,
            seed: 0,
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Reject out-of-range values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Invalid("tick_rate must be greater than zero".to_string()));
        }
        if self.max_catch_up_ticks == 0 {
            return Err(ConfigError::Invalid(
                "max_catch_up_ticks must be greater than zero".to_string(),
            ));
        }
        if self.max_frame_time_ms == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_time_ms must be greater than zero".to_string(),
            ));
        }
        if !self.time_scale.is_finite() || self.time_scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "time_scale must be a positive number, got {}",
                self.time_scale
            )));
        }
        if self.target_fps == Some(0) {
            return Err(ConfigError::Invalid("target_fps must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Length of one simulation tick
    pub fn tick_length(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate.max(1)))
    }

    /// Clamp applied to each elapsed-time sample
    pub fn max_frame_time(&self) -> Duration {
        Duration::from_millis(self.max_frame_time_ms)
    }

    /// Time budget of one paced frame
    pub fn frame_budget(&self) -> Option<Duration> {
        self.target_fps
            .filter(|fps| *fps > 0)
            .map(|fps| Duration::from_nanos(1_000_000_000 / u64::from(fps)))
    }

    /// Parameters of the update scheduler
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            tick_length: self.tick_length(),
            max_catch_up_ticks: self.max_catch_up_ticks,
            time_scale: self.time_scale,
            seed: self.seed,
            failure_policy: self.failure_policy,
        }
    }
}

/// Engine-level errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The engine could not start
    #[error("Engine startup failed: {0}")]
    Startup(#[from] TimeError),

    /// Structural usage error
    #[error("World error: {0}")]
    World(#[from] WorldError),

    /// Illegal lifecycle request
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// A component callback failed under the abort policy
    #[error("Callback failed: {0}")]
    Callback(#[from] CallbackFailure),

    /// The render surface failed
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
}

impl From<RenderError> for EngineError {
    fn from(error: RenderError) -> Self {
        match error {
            RenderError::Surface(error) => Self::Surface(error),
            RenderError::Callback(failure) => Self::Callback(failure),
        }
    }
}

/// Cooperative stop flag
///
/// Cloneable and `Send`, so a stop can be requested from another thread.
/// The loop observes it between driver ticks.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    /// Request the loop to stop
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Outcome of one driver tick
#[derive(Debug, Default)]
pub struct FrameReport {
    /// Elapsed time sampled for this driver tick
    pub elapsed: Duration,
    /// Simulation ticks executed
    pub ticks: u32,
    /// Simulation ticks dropped by the catch-up bound
    pub dropped_ticks: u64,
    /// Interpolation fraction handed to the render pass
    pub alpha: f32,
    /// Number of the rendered frame, if one was rendered
    pub frame: Option<u64>,
    /// Callback failures skipped under [`FailurePolicy::SkipComponent`]
    pub faults: Vec<CallbackFailure>,
}

/// Top-level driver composing update and render scheduling
pub struct GameLoop {
    config: EngineConfig,
    world: World,
    time: Option<TimeSource>,
    updates: UpdateScheduler,
    renderer: RenderScheduler,
    surface: Box<dyn Surface>,
    input: Box<dyn InputSource>,
    stop: StopHandle,
    ups: RateCounter,
    fps: RateCounter,
    metrics: LoopMetrics,
    torn_down: bool,
}

impl GameLoop {
    /// Create an idle game loop
    ///
    /// Fails when the configuration is invalid or the clock cannot be read.
    pub fn new(config: EngineConfig, clock: Box<dyn Clock>) -> Result<Self, EngineError> {
        config.validate()?;
        let time = TimeSource::new(clock, config.max_frame_time())?;

        log::info!(
            "Creating game loop: {} ticks/s, catch-up bound {}, time scale {}",
            config.tick_rate,
            config.max_catch_up_ticks,
            config.time_scale
        );

        Ok(Self {
            updates: UpdateScheduler::new(config.scheduler_settings()),
            config,
            world: World::new(),
            time: Some(time),
            renderer: RenderScheduler::new(),
            surface: Box::new(NullSurface::new()),
            input: Box::new(NullInput),
            stop: StopHandle::default(),
            ups: RateCounter::new(),
            fps: RateCounter::new(),
            metrics: LoopMetrics::default(),
            torn_down: false,
        })
    }

    /// Render into the given surface
    pub fn with_surface(mut self, surface: Box<dyn Surface>) -> Self {
        self.surface = surface;
        self
    }

    /// Poll the given input source once per tick
    pub fn with_input(mut self, input: Box<dyn InputSource>) -> Self {
        self.input = input;
        self
    }

    /// Configuration the loop was built with
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get the ECS world
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world
    ///
    /// Structural changes made here between driver ticks follow the same
    /// staging rules as changes made from callbacks.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Get the update scheduler
    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.updates
    }

    /// Get mutable access to the update scheduler (timed actions, random seed)
    pub fn scheduler_mut(&mut self) -> &mut UpdateScheduler {
        &mut self.updates
    }

    /// Lifecycle state of the simulation
    pub fn state(&self) -> SchedulerState {
        self.updates.state()
    }

    /// Rate and health counters
    pub fn metrics(&self) -> LoopMetrics {
        self.metrics
    }

    /// Handle that stops the loop from anywhere
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Whether teardown has run
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Start simulating
    pub fn start(&mut self) -> Result<(), EngineError> {
        self.updates.start()?;
        // Time spent between construction and start is not simulated
        if let Some(time) = self.time.as_mut() {
            time.sample();
        }
        log::info!("Game loop started");
        Ok(())
    }

    /// Freeze the simulation; frames keep rendering
    pub fn pause(&mut self) -> Result<(), EngineError> {
        self.updates.pause()?;
        log::info!("Game loop paused at tick {}", self.updates.ticks());
        Ok(())
    }

    /// Resume a paused simulation
    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.updates.resume()?;
        log::info!("Game loop resumed at tick {}", self.updates.ticks());
        Ok(())
    }

    /// Request a stop; observed before the next driver tick
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Run one driver tick: sample time, update, render
    ///
    /// Once stopped, no further updates or frames happen. A failed callback
    /// under [`FailurePolicy::Abort`] stops the loop before the error is
    /// returned; teardown is still left to `run()`, `teardown()` or `Drop`.
    pub fn tick(&mut self) -> Result<FrameReport, EngineError> {
        if self.stop.is_stop_requested() && self.updates.state() != SchedulerState::Stopped {
            self.updates.stop();
            log::info!("Game loop stopped after {} ticks", self.updates.ticks());
        }
        if self.updates.state() == SchedulerState::Stopped {
            return Ok(FrameReport::default());
        }

        let elapsed = self.time.as_mut().map_or(Duration::ZERO, TimeSource::sample);
        let update = match self.updates.advance(&mut self.world, elapsed, self.input.as_mut()) {
            Ok(update) => update,
            Err(error) => return Err(self.abort(error.into())),
        };
        if update.stop_requested {
            self.stop.stop();
        }

        let alpha = self.updates.interpolation_alpha();
        let render = match self.renderer.render(
            &self.world,
            self.surface.as_mut(),
            alpha,
            self.config.failure_policy,
        ) {
            Ok(render) => render,
            Err(error) => return Err(self.abort(error.into())),
        };
        for fault in &render.faults {
            if let Some(key) = fault.key {
                self.world.quarantine(key);
            }
        }

        self.record_metrics(elapsed, update.ticks);

        let mut faults = update.faults;
        faults.extend(render.faults);
        Ok(FrameReport {
            elapsed,
            ticks: update.ticks,
            dropped_ticks: update.dropped_ticks,
            alpha,
            frame: Some(render.frame),
            faults,
        })
    }

    /// Stop the loop after a failed tick so the failed tick never runs again
    fn abort(&mut self, error: EngineError) -> EngineError {
        self.updates.stop();
        self.stop.stop();
        log::error!("Game loop stopped at tick {}: {}", self.updates.ticks(), error);
        error
    }

    fn record_metrics(&mut self, elapsed: Duration, ticks: u32) {
        self.ups.record(u64::from(ticks));
        self.fps.record(1);
        if let Some(rate) = self.ups.advance(elapsed) {
            self.metrics.updates_per_second = rate;
        }
        if let Some(rate) = self.fps.advance(elapsed) {
            self.metrics.frames_per_second = rate;
            log::trace!(
                "{} ups, {} fps",
                self.metrics.updates_per_second,
                self.metrics.frames_per_second
            );
        }

        let stats = self.updates.stats();
        self.metrics.total_ticks = self.ups.total();
        self.metrics.total_frames = self.fps.total();
        self.metrics.falling_behind_events = stats.falling_behind_events;
        self.metrics.dropped_ticks = stats.dropped_ticks;
    }

    /// Drive ticks until stopped, then tear down
    ///
    /// Starts the loop if it is still idle. Teardown runs whether the loop
    /// ends normally or with an error.
    pub fn run(&mut self) -> Result<LoopMetrics, EngineError> {
        if self.updates.state() == SchedulerState::Idle {
            self.start()?;
        }

        let mut pacer = self.config.frame_budget().map(FramePacer::new);
        let result = loop {
            if self.stop.is_stop_requested() {
                break Ok(());
            }

            if let Some(pacer) = pacer.as_mut() {
                pacer.begin_frame();
            }
            if let Err(error) = self.tick() {
                break Err(error);
            }
            if let Some(pacer) = pacer.as_ref() {
                pacer.wait();
            }
        };

        self.teardown();
        result.map(|()| self.metrics)
    }

    /// Dispose every entity and release the time source
    ///
    /// Runs at most once; later calls do nothing.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.updates.stop();
        let disposed = self.world.dispose_all();
        self.time = None;
        self.torn_down = true;
        log::info!(
            "Game loop torn down: {} entities disposed after {} ticks and {} frames",
            disposed,
            self.metrics.total_ticks,
            self.metrics.total_frames
        );
    }
}

impl Drop for GameLoop {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for GameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLoop")
            .field("config", &self.config)
            .field("world", &self.world)
            .field("updates", &self.updates)
            .field("metrics", &self.metrics)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_length(), Duration::from_nanos(16_666_666));
        assert_eq!(config.frame_budget(), None);
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let cases = [
            EngineConfig {
                tick_rate: 0,
                ..EngineConfig::default()
            },
            EngineConfig {
                max_catch_up_ticks: 0,
                ..EngineConfig::default()
            },
            EngineConfig {
                time_scale: f64::NAN,
                ..EngineConfig::default()
            },
            EngineConfig {
                time_scale: -1.0,
                ..EngineConfig::default()
            },
            EngineConfig {
                target_fps: Some(0),
                ..EngineConfig::default()
            },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_config_round_trips_through_toml_and_ron() {
        let config = EngineConfig {
            tick_rate: 30,
            target_fps: Some(120),
            failure_policy: FailurePolicy::SkipComponent,
            seed: 99,
            ..EngineConfig::default()
        };

        for extension in ["toml", "ron"] {
            let path = std::env::temp_dir().join(format!(
                "fixstep_engine_config_{}.{}",
                std::process::id(),
                extension
            ));
            config.save_to_file(&path).unwrap();
            let loaded = EngineConfig::load_from_file(&path).unwrap();
            std::fs::remove_file(&path).unwrap();
            assert_eq!(loaded, config);
        }
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: EngineConfig = toml::from_str("tick_rate = 20").unwrap();
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.max_catch_up_ticks, 5);
        assert_eq!(config.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_stop_handle_is_shared() {
        let handle = StopHandle::default();
        let clone = handle.clone();
        std::thread::spawn(move || clone.stop()).join().unwrap();
        assert!(handle.is_stop_requested());
    }
}
