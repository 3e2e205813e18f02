#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

//! # Voxel Streaming
//!
//! The chunk lifecycle core of a voxel world: generating, decorating, meshing,
//! uploading and unloading terrain chunks around a moving player.
//!
//! ## Key Modules
//!
//! * `config` - JSON-loadable streaming tunables
//! * `core` - shared concurrency primitives
//! * `engine_state` - the tick loop and every stage of the chunk pipeline
//! * `error` - typed, recoverable errors for generation, meshing, upload and config
//!
//! ## Architecture
//!
//! One thread owns the graphics context and runs the tick. Mesh builds run on a fixed
//! worker pool and hand finished meshes back through a bounded upload queue. Every
//! chunk carries a mesh state machine that all stages go through, so a chunk is never
//! built twice at once, never uploaded after it was evicted, and never shows a stale
//! mesh as current.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use voxel_streaming::{config::StreamingConfig, engine_state::EngineState};
//!
//! let mut engine = EngineState::new(StreamingConfig::default()).unwrap();
//! engine.set_player_position(0, 0);
//! loop {
//!     engine.tick_now();
//! }
//! ```

use std::thread;

use log::{error, info};
use web_time::{Duration, Instant};

use config::{StreamingConfig, CONFIG_PATH_ENV};
use engine_state::EngineState;

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

/// Ticks the headless walk runs for.
const WALK_TICKS: u32 = 600;
/// Ticks between stats lines.
const STATS_INTERVAL: u32 = 60;
/// Blocks the player moves per tick.
const WALK_SPEED: i32 = 2;
const TICK_TIME: Duration = Duration::from_millis(16);

/// Runs the streaming engine headless with a player walking east, logging stats as it goes.
///
/// The config is read from the file named by `VOXEL_STREAMING_CONFIG`, or defaults are used.
pub fn run() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
    info!("Logger initialized");

    let config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => match StreamingConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                error!("could not load config from {path}: {err}");
                return;
            }
        },
        Err(_) => StreamingConfig::default(),
    };

    let mut engine = match EngineState::new(config) {
        Ok(engine) => engine,
        Err(err) => {
            error!("{err}");
            return;
        }
    };

    let started = Instant::now();
    for tick in 0..WALK_TICKS {
        let tick_start = Instant::now();
        engine.set_player_position(tick as i32 * WALK_SPEED, 0);
        engine.tick(tick_start);

        if tick % STATS_INTERVAL == 0 {
            info!("tick {tick}: {:?}", engine.stats());
        }
        if let Some(rest) = TICK_TIME.checked_sub(tick_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    let settled = engine.run_until_settled(16, Duration::from_secs(10));
    info!(
        "walk finished in {:?}, area settled: {settled}, {:?}",
        started.elapsed(),
        engine.stats()
    );
}
