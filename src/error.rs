//! # Error Types
//!
//! Every failure the streaming subsystem can recover from has a typed error here.
//! None of them are fatal: callers log them and convert them into a chunk state
//! transition, so the tick loop keeps running.

use thiserror::Error;

use crate::engine_state::voxels::chunk::ChunkCoordinate;

/// Failures while producing or decorating a chunk's block volume.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// The terrain generator reported an error for this coordinate.
    #[error("terrain generation failed for chunk {coordinate:?}: {reason}")]
    Generator {
        /// Chunk that failed to generate.
        coordinate: ChunkCoordinate,
        /// Generator-supplied description.
        reason: String,
    },
    /// The generator returned a volume with the wrong number of blocks.
    #[error("generated volume for chunk {coordinate:?} has {actual} blocks, expected {expected}")]
    InvalidVolume {
        /// Chunk that failed to generate.
        coordinate: ChunkCoordinate,
        /// Block count the chunk layout requires.
        expected: usize,
        /// Block count the generator produced.
        actual: usize,
    },
    /// Feature population (ores, trees, flowers) failed for this chunk.
    #[error("feature population failed for chunk {coordinate:?}: {reason}")]
    Features {
        /// Chunk whose decoration pass failed.
        coordinate: ChunkCoordinate,
        /// Generator-supplied description.
        reason: String,
    },
}

/// Failures while building mesh data on a worker thread.
#[derive(Error, Debug)]
pub enum MeshBuildError {
    /// The mesh builder returned an error.
    #[error("mesh build failed for chunk {coordinate:?}: {reason}")]
    Builder {
        /// Chunk being meshed.
        coordinate: ChunkCoordinate,
        /// Builder-supplied description.
        reason: String,
    },
    /// The mesh builder panicked; the panic was caught at the task boundary.
    #[error("mesh builder panicked for chunk {coordinate:?}: {message}")]
    Panicked {
        /// Chunk being meshed.
        coordinate: ChunkCoordinate,
        /// Panic payload, if it was a string.
        message: String,
    },
}

/// Failures while handing mesh data to the graphics context.
#[derive(Error, Debug)]
pub enum UploadError {
    /// The upload queue was drained from a thread that does not own the graphics context.
    #[error("upload queue drained off the graphics thread")]
    WrongThread,
    /// The graphics context rejected the upload.
    #[error("graphics context rejected mesh for chunk {coordinate:?}: {reason}")]
    Rejected {
        /// Chunk whose mesh was rejected.
        coordinate: ChunkCoordinate,
        /// Context-supplied description.
        reason: String,
    },
}

/// Failures while loading a [`StreamingConfig`](crate::config::StreamingConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The config file is not valid JSON for the config schema.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    /// A field holds a value the engine cannot run with.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Offending field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
