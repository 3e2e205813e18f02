//! Background tasks for the rendering system.
//!
//! - `ChunkMeshGenerationTask`: builds mesh data for one chunk

pub mod chunk_mesh_generation_task;

pub use chunk_mesh_generation_task::{
    BuildOutcome, ChunkMeshGenerationTask, ChunkMeshGenerationTaskResult,
};
