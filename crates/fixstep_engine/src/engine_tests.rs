//! Game loop scenario tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ecs::tests::fixtures::{event_log, events, Mover, Recorder};
use crate::ecs::{CallbackPhase, Component, ComponentResult, FailurePolicy, SchedulerState, Updatable, UpdateContext};
use crate::engine::{EngineConfig, EngineError, GameLoop, StopHandle};
use crate::foundation::time::{Clock, ManualClock};
use crate::input::{KeyCode, SharedInput};
use crate::render::{DrawCommand, RecordingSurface, Surface, SurfaceResult};

/// Clock that moves forward by a fixed step on every read
struct StepClock {
    now: Duration,
    step: Duration,
}

impl StepClock {
    fn boxed(step_ms: u64) -> Box<dyn Clock> {
        Box::new(Self {
            now: Duration::ZERO,
            step: Duration::from_millis(step_ms),
        })
    }
}

impl Clock for StepClock {
    fn now(&mut self) -> Option<Duration> {
        self.now += self.step;
        Some(self.now)
    }
}

/// Recording surface the test keeps a handle to
#[derive(Clone, Default)]
struct SharedSurface(Arc<Mutex<RecordingSurface>>);

impl SharedSurface {
    fn frame_count(&self) -> usize {
        self.0.lock().unwrap().frames().len()
    }
}

impl Surface for SharedSurface {
    fn begin_frame(&mut self, frame: u64) -> SurfaceResult<()> {
        self.0.lock().unwrap().begin_frame(frame)
    }

    fn submit(&mut self, command: DrawCommand) {
        self.0.lock().unwrap().submit(command);
    }

    fn end_frame(&mut self) -> SurfaceResult<()> {
        self.0.lock().unwrap().end_frame()
    }
}

/// Requests a stop once the simulation reaches a given tick
struct StopAt(u64);

impl Component for StopAt {
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }
}

impl Updatable for StopAt {
    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
        if ctx.tick() >= self.0 {
            ctx.request_stop();
        }
        Ok(())
    }
}

fn config(tick_rate: u32) -> EngineConfig {
    EngineConfig {
        tick_rate,
        ..EngineConfig::default()
    }
}

#[test]
fn test_run_until_stopped_then_tear_down() {
    let log = event_log();
    let mut game = GameLoop::new(config(100), StepClock::boxed(10)).unwrap();
    let e = game.world_mut().create_entity("recorder");
    game.world_mut().attach(e, Recorder::new("recorder", &log)).unwrap();
    game.world_mut().attach(e, StopAt(10)).unwrap();

    let metrics = game.run().unwrap();

    assert_eq!(metrics.total_ticks, 10);
    assert!(metrics.total_frames >= 10);
    assert!(game.is_torn_down());
    assert_eq!(game.state(), SchedulerState::Stopped);
    assert_eq!(game.world().live_count(), 0);

    let log = events(&log);
    assert_eq!(log.iter().filter(|e| e.starts_with("update")).count(), 10);
    assert_eq!(log.last().map(String::as_str), Some("dispose recorder"));
    assert_eq!(log.iter().filter(|e| e.starts_with("dispose")).count(), 1);
}

#[test]
fn test_stop_before_run_only_tears_down() {
    let log = event_log();
    let mut game = GameLoop::new(config(60), StepClock::boxed(5)).unwrap();
    let e = game.world_mut().create_entity("recorder");
    game.world_mut().attach(e, Recorder::new("recorder", &log)).unwrap();

    let handle: StopHandle = game.stop_handle();
    handle.stop();
    let metrics = game.run().unwrap();

    assert_eq!(metrics.total_ticks, 0);
    assert_eq!(events(&log), vec!["dispose recorder"]);
}

#[test]
fn test_abort_policy_ends_run_with_error() {
    let log = event_log();
    let mut game = GameLoop::new(config(100), StepClock::boxed(10)).unwrap();
    let e = game.world_mut().create_entity("flaky");
    game.world_mut()
        .attach(e, Recorder::new("flaky", &log).failing_on(3))
        .unwrap();

    match game.run() {
        Err(EngineError::Callback(failure)) => {
            assert_eq!(failure.entity, e);
            assert_eq!(failure.phase, CallbackPhase::Update);
        }
        other => panic!("expected a callback failure, got {other:?}"),
    }
    assert!(game.is_torn_down());
    assert_eq!(events(&log).last().map(String::as_str), Some("dispose flaky"));
}

#[test]
fn test_aborted_tick_stops_the_loop() {
    let log = event_log();
    let clock = ManualClock::new();
    let mut game = GameLoop::new(config(100), Box::new(clock.clone())).unwrap();
    let a = game.world_mut().create_entity("a");
    game.world_mut().attach(a, Recorder::new("a", &log)).unwrap();
    let b = game.world_mut().create_entity("b");
    game.world_mut().attach(b, Recorder::new("b", &log).failing_on(1)).unwrap();
    game.start().unwrap();

    clock.advance_ms(10);
    assert!(matches!(game.tick(), Err(EngineError::Callback(_))));
    assert_eq!(game.state(), SchedulerState::Stopped);
    assert!(game.stop_handle().is_stop_requested());

    // The failed tick is never replayed
    clock.advance_ms(10);
    let report = game.tick().unwrap();
    assert_eq!(report.ticks, 0);
    assert_eq!(report.frame, None);
    assert_eq!(events(&log), vec!["update a 1", "update b 1"]);

    // Teardown is still left to the owner
    assert!(!game.is_torn_down());
    drop(game);
    assert_eq!(events(&log).iter().filter(|e| e.starts_with("dispose")).count(), 2);
}

#[test]
fn test_aborted_frame_stops_the_loop_and_closes_the_frame() {
    let log = event_log();
    let clock = ManualClock::new();
    let surface = SharedSurface::default();
    let mut game = GameLoop::new(config(100), Box::new(clock.clone()))
        .unwrap()
        .with_surface(Box::new(surface.clone()));
    let e = game.world_mut().create_entity("broken");
    game.world_mut()
        .attach(e, Recorder::new("broken", &log).failing_render())
        .unwrap();
    game.start().unwrap();

    clock.advance_ms(10);
    assert!(matches!(game.tick(), Err(EngineError::Callback(_))));
    assert_eq!(game.state(), SchedulerState::Stopped);
    assert_eq!(surface.frame_count(), 1);

    clock.advance_ms(10);
    assert!(game.tick().is_ok());
    assert_eq!(surface.frame_count(), 1);
}

#[test]
fn test_skip_policy_quarantines_and_keeps_running() {
    let log = event_log();
    let mut game = GameLoop::new(
        EngineConfig {
            failure_policy: FailurePolicy::SkipComponent,
            ..config(100)
        },
        StepClock::boxed(10),
    )
    .unwrap();
    let broken = game.world_mut().create_entity("broken");
    game.world_mut()
        .attach(broken, Recorder::new("broken", &log).failing_render())
        .unwrap();
    let stopper = game.world_mut().create_entity("stopper");
    game.world_mut().attach(stopper, StopAt(5)).unwrap();

    let metrics = game.run().unwrap();
    assert_eq!(metrics.total_ticks, 5);

    // Rendered once, failed, never rendered or updated again
    let log = events(&log);
    assert_eq!(log.iter().filter(|e| e.starts_with("render")).count(), 1);
    assert_eq!(log.iter().filter(|e| e.starts_with("update")).count(), 1);
    assert_eq!(log.last().map(String::as_str), Some("dispose broken"));
}

#[test]
fn test_paused_loop_keeps_rendering() {
    let clock = ManualClock::new();
    let surface = SharedSurface::default();
    let mut game = GameLoop::new(config(50), Box::new(clock.clone()))
        .unwrap()
        .with_surface(Box::new(surface.clone()));
    let e = game.world_mut().create_entity("mover");
    game.world_mut().attach(e, Mover::new(0.0, 0.0, 50.0, 0.0)).unwrap();
    game.start().unwrap();

    clock.advance_ms(50);
    let report = game.tick().unwrap();
    assert_eq!(report.ticks, 2);
    assert_eq!(report.frame, Some(1));

    game.pause().unwrap();
    clock.advance_ms(200);
    let report = game.tick().unwrap();
    assert_eq!(report.ticks, 0);
    assert_eq!(report.frame, Some(2));
    assert_eq!(game.scheduler().ticks(), 2);
    assert_eq!(surface.frame_count(), 2);

    game.resume().unwrap();
    clock.advance_ms(20);
    assert_eq!(game.tick().unwrap().ticks, 1);
}

#[test]
fn test_stall_is_clamped_and_bounded() {
    let clock = ManualClock::new();
    let mut game = GameLoop::new(config(60), Box::new(clock.clone())).unwrap();
    game.start().unwrap();

    clock.advance(Duration::from_secs(10));
    let report = game.tick().unwrap();

    assert_eq!(report.elapsed, Duration::from_millis(250));
    assert_eq!(report.ticks, 5);
    assert_eq!(report.dropped_ticks, 10);
    assert!(report.alpha < 1.0);
    assert_eq!(game.metrics().falling_behind_events, 1);
}

#[test]
fn test_unavailable_clock_fails_startup() {
    let result = GameLoop::new(EngineConfig::default(), Box::new(ManualClock::unavailable()));
    assert!(matches!(result, Err(EngineError::Startup(_))));
}

#[test]
fn test_invalid_config_fails_construction() {
    let result = GameLoop::new(config(0), Box::new(ManualClock::new()));
    assert!(matches!(result, Err(EngineError::Config(_))));
}

#[test]
fn test_start_twice_is_rejected() {
    let mut game = GameLoop::new(EngineConfig::default(), Box::new(ManualClock::new())).unwrap();
    game.start().unwrap();
    assert!(matches!(game.start(), Err(EngineError::Scheduler(_))));
    assert!(matches!(
        GameLoop::new(EngineConfig::default(), Box::new(ManualClock::new()))
            .unwrap()
            .resume(),
        Err(EngineError::Scheduler(_))
    ));
}

#[test]
fn test_drop_tears_down() {
    let log = event_log();
    {
        let mut game = GameLoop::new(EngineConfig::default(), Box::new(ManualClock::new())).unwrap();
        let e = game.world_mut().create_entity("recorder");
        game.world_mut().attach(e, Recorder::new("recorder", &log)).unwrap();
    }
    assert_eq!(events(&log), vec!["dispose recorder"]);
}

/// Records whether the space key was held on each tick
struct Jumper {
    jumps: Arc<Mutex<Vec<bool>>>,
}

impl Component for Jumper {
    fn as_updatable(&mut self) -> Option<&mut dyn Updatable> {
        Some(self)
    }
}

impl Updatable for Jumper {
    fn on_update(&mut self, ctx: &mut UpdateContext<'_>) -> ComponentResult {
        self.jumps.lock().unwrap().push(ctx.input().is_key_down(KeyCode::Space));
        Ok(())
    }
}

#[test]
fn test_input_is_polled_per_tick() {
    let clock = ManualClock::new();
    let input = SharedInput::new();
    let jumps = Arc::new(Mutex::new(Vec::new()));
    let mut game = GameLoop::new(config(100), Box::new(clock.clone()))
        .unwrap()
        .with_input(Box::new(input.clone()));
    let e = game.world_mut().create_entity("jumper");
    game.world_mut()
        .attach(e, Jumper { jumps: Arc::clone(&jumps) })
        .unwrap();
    game.start().unwrap();

    clock.advance_ms(10);
    game.tick().unwrap();
    input.handle_key_input(KeyCode::Space, true);
    clock.advance_ms(20);
    game.tick().unwrap();

    assert_eq!(*jumps.lock().unwrap(), vec![false, true, true]);
}

#[test]
fn test_metrics_report_rates_after_one_second() {
    let mut game = GameLoop::new(config(100), StepClock::boxed(20)).unwrap();
    game.start().unwrap();
    for _ in 0..60 {
        game.tick().unwrap();
    }

    let metrics = game.metrics();
    assert_eq!(metrics.total_frames, 60);
    assert_eq!(metrics.total_ticks, 120);
    assert_eq!(metrics.frames_per_second, 50);
    assert_eq!(metrics.updates_per_second, 100);
}
