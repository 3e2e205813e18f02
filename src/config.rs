//! # Streaming Configuration
//!
//! Tunables for chunk streaming, loaded from JSON. Every field has a default so a
//! partial file (or no file at all) is valid.
//!
//! ```json
//! { "render_distance": 6, "upload_budget_per_tick": 16 }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::error::ConfigError;

/// Environment variable `run()` reads the config path from.
pub const CONFIG_PATH_ENV: &str = "VOXEL_STREAMING_CONFIG";

/// Largest accepted render distance, in chunks.
pub const MAX_RENDER_DISTANCE: i32 = 64;
/// Largest accepted unload hysteresis, in chunks.
pub const MAX_UNLOAD_HYSTERESIS: i32 = 64;
/// Largest accepted scan or sweep interval, in seconds.
pub const MAX_INTERVAL_SECS: f64 = 3600.0;

/// Chunk streaming tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Chebyshev radius, in chunks, of the visible set.
    pub render_distance: i32,
    /// Extra chunks beyond the render distance before a chunk is evicted.
    pub unload_hysteresis: i32,
    /// Maximum number of meshes uploaded to the graphics context per tick.
    pub upload_budget_per_tick: usize,
    /// Seconds between unload sweeps.
    pub unload_interval_secs: f64,
    /// Seconds between visibility scans. Zero scans every tick.
    pub visibility_interval_secs: f64,
    /// Mesh worker count. `None` uses the available hardware parallelism.
    pub worker_threads: Option<usize>,
    /// Seed for the terrain generator.
    pub world_seed: u32,
    /// Consecutive failed builds of one chunk that still trigger neighbor repair.
    pub max_repair_cascade: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            render_distance: 8,
            unload_hysteresis: 2,
            upload_budget_per_tick: 32,
            unload_interval_secs: 5.0,
            visibility_interval_secs: 0.0,
            worker_threads: None,
            world_seed: 1337,
            max_repair_cascade: 3,
        }
    }
}

impl StreamingConfig {
    /// Reads and validates a config from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: StreamingConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: StreamingConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value, max) in [
            ("render_distance", self.render_distance, MAX_RENDER_DISTANCE),
            ("unload_hysteresis", self.unload_hysteresis, MAX_UNLOAD_HYSTERESIS),
        ] {
            if !(0..=max).contains(&value) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be between 0 and {max}, got {value}"),
                });
            }
        }
        if self.upload_budget_per_tick == 0 {
            return Err(ConfigError::Invalid {
                field: "upload_budget_per_tick",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.worker_threads == Some(0) {
            return Err(ConfigError::Invalid {
                field: "worker_threads",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        for (field, secs) in [
            ("unload_interval_secs", self.unload_interval_secs),
            ("visibility_interval_secs", self.visibility_interval_secs),
        ] {
            if !(0.0..=MAX_INTERVAL_SECS).contains(&secs) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be between 0 and {MAX_INTERVAL_SECS} seconds, got {secs}"),
                });
            }
        }
        Ok(())
    }

    /// Distance beyond which chunks are evicted.
    pub fn unload_distance(&self) -> i32 {
        self.render_distance + self.unload_hysteresis
    }

    /// Worker count, falling back to hardware parallelism and never below one.
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
        .max(1)
    }

    /// Unload sweep period.
    pub fn unload_interval(&self) -> Duration {
        interval(self.unload_interval_secs)
    }

    /// Visibility scan period.
    pub fn visibility_interval(&self) -> Duration {
        interval(self.visibility_interval_secs)
    }
}

/// Seconds to a `Duration`, clamped to `[0, MAX_INTERVAL_SECS]` so unvalidated values
/// cannot panic.
fn interval(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.min(MAX_INTERVAL_SECS)).unwrap_or(Duration::ZERO)
}
