//! Headless bouncing-bodies demo
//!
//! Usage: `bounce_demo [CONFIG.toml|CONFIG.ron] [--seconds N]`
//!
//! Runs a small simulation against the system clock for a bounded time and
//! logs the loop metrics. Set `RUST_LOG=debug` for per-entity detail.

mod bodies;

use std::path::PathBuf;
use std::time::Duration;

use fixstep_engine::config::{Config, ConfigError};
use fixstep_engine::ecs::WorldError;
use fixstep_engine::foundation::logging;
use fixstep_engine::foundation::time::SystemClock;
use fixstep_engine::render::RecordingSurface;
use fixstep_engine::{EngineConfig, EngineError, GameLoop};
use thiserror::Error;

use bodies::{Body, Emitter};

const INITIAL_BODIES: usize = 24;
const EMIT_INTERVAL_TICKS: u64 = 30;
const SPARK_LIFETIME_TICKS: u64 = 240;
const MAX_SPARKS: usize = 16;
const DEFAULT_RUN_SECONDS: u64 = 5;

#[derive(Error, Debug)]
enum DemoError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    World(#[from] WorldError),
}

struct Args {
    config_path: Option<PathBuf>,
    run_for: Duration,
}

fn parse_args() -> Result<Args, DemoError> {
    let mut args = Args {
        config_path: None,
        run_for: Duration::from_secs(DEFAULT_RUN_SECONDS),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--seconds" {
            let value = iter
                .next()
                .ok_or_else(|| DemoError::Usage("--seconds needs a value".to_string()))?;
            let seconds: u64 = value
                .parse()
                .map_err(|_| DemoError::Usage(format!("invalid number of seconds: {value}")))?;
            args.run_for = Duration::from_secs(seconds);
        } else if args.config_path.is_none() {
            args.config_path = Some(PathBuf::from(arg));
        } else {
            return Err(DemoError::Usage(format!("unexpected argument: {arg}")));
        }
    }
    Ok(args)
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, DemoError> {
    let Some(path) = path else {
        return Ok(EngineConfig {
            target_fps: Some(120),
            seed: 0x5EED,
            ..EngineConfig::default()
        });
    };
    log::info!("Loading configuration from {}", path.display());
    let config = EngineConfig::load_from_file(path)?;
    config.validate()?;
    Ok(config)
}

fn run() -> Result<(), DemoError> {
    let args = parse_args()?;
    let config = load_config(args.config_path.as_ref())?;

    let mut game = GameLoop::new(config, Box::new(SystemClock::new()))?
        .with_surface(Box::new(RecordingSurface::with_history_limit(1)));

    for _ in 0..INITIAL_BODIES {
        let body = Body::random(game.scheduler_mut().rng());
        let entity = game.world_mut().create_entity("body");
        game.world_mut().attach(entity, body)?;
    }
    let emitter = game.world_mut().create_entity("emitter");
    game.world_mut()
        .attach(emitter, Emitter::new(EMIT_INTERVAL_TICKS, SPARK_LIFETIME_TICKS, MAX_SPARKS))?;

    let run_ticks = game.scheduler().duration_to_ticks(args.run_for);
    game.scheduler_mut().execute_after(run_ticks, |ctx| {
        log::info!("Run time elapsed at tick {}", ctx.tick());
        ctx.request_stop();
        Ok(())
    });

    log::info!(
        "Running {} bodies for {:?} ({} ticks)",
        INITIAL_BODIES,
        args.run_for,
        run_ticks
    );
    let metrics = game.run()?;

    log::info!(
        "Finished: {} ticks, {} frames, {} ups, {} fps, {} falling-behind events ({} ticks dropped)",
        metrics.total_ticks,
        metrics.total_frames,
        metrics.updates_per_second,
        metrics.frames_per_second,
        metrics.falling_behind_events,
        metrics.dropped_ticks
    );
    Ok(())
}

fn main() {
    logging::init_with_level(log::LevelFilter::Info);
    log::info!("Starting bounce demo");

    if let Err(e) = run() {
        log::error!("Bounce demo failed: {}", e);
        std::process::exit(1);
    }
}
