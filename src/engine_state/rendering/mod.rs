//! Mesh pipeline for the voxel engine.
//!
//! Chunks flow through this module in one direction:
//!
//! 1. [`MeshBuildScheduler`] collects chunks that need a mesh.
//! 2. Each tick the pending set becomes [`ChunkMeshGenerationTask`]s on the worker pool.
//! 3. Finished meshes land in the [`UploadQueue`].
//! 4. The graphics thread drains a bounded number of them into a
//!    [`GraphicsContext`](crate::engine_state::buffer_state::GraphicsContext).

pub mod meshing;
pub mod scheduler;
pub mod tasks;
pub mod upload_queue;
mod vertex;

// Re-export commonly used types
pub use meshing::{CulledMesher, MeshBuilder, MeshData};
pub use scheduler::MeshBuildScheduler;
pub use tasks::ChunkMeshGenerationTask;
pub use upload_queue::{UploadQueue, UploadReport};
pub use vertex::Vertex;
