//! # Buffer State Module
//!
//! The graphics side of the mesh pipeline. Uploading and releasing chunk meshes goes
//! through the [`GraphicsContext`] trait so the streaming core never touches a graphics
//! API directly.
//!
//! [`BufferState`] is a headless implementation: a registry of resident chunk meshes
//! keyed by chunk coordinate, with per-buffer analytics. It can be given a memory
//! capacity, past which uploads are rejected the way a real device runs out of memory.

use std::collections::HashMap;

use crate::engine_state::{rendering::meshing::MeshData, voxels::chunk::ChunkCoordinate};
use crate::error::UploadError;

/// The calls the streaming core makes on the graphics thread.
pub trait GraphicsContext {
    /// Uploads (or replaces) the mesh of one chunk.
    fn upload_mesh(&mut self, coordinate: ChunkCoordinate, mesh: &MeshData) -> Result<(), UploadError>;

    /// Frees the buffers of an evicted chunk. Returns whether anything was resident.
    fn release_mesh(&mut self, coordinate: ChunkCoordinate) -> bool;
}

/// Analytics data for one chunk's buffers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferAnalytics {
    /// Memory allocated for the buffers in bytes
    pub allocated_memory: u64,
    /// Faces held by the current mesh
    pub face_count: u64,
    /// Number of times the buffers have been written to
    pub times_written: u64,
}

/// Headless registry of resident chunk meshes.
#[derive(Debug, Default)]
pub struct BufferState {
    meshes: HashMap<ChunkCoordinate, BufferAnalytics>,
    capacity: Option<u64>,
}

impl BufferState {
    /// An unbounded registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that rejects uploads once `capacity` bytes are resident.
    pub fn with_capacity(capacity: u64) -> Self {
        BufferState {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Whether a chunk has a mesh resident.
    pub fn is_resident(&self, coordinate: ChunkCoordinate) -> bool {
        self.meshes.contains_key(&coordinate)
    }

    /// Number of chunks with resident meshes.
    pub fn resident_count(&self) -> usize {
        self.meshes.len()
    }

    /// Analytics for one chunk.
    pub fn analytics(&self, coordinate: ChunkCoordinate) -> Option<BufferAnalytics> {
        self.meshes.get(&coordinate).copied()
    }

    /// Sum of allocated memory over all resident meshes.
    pub fn get_total_allocated_memory(&self) -> u64 {
        self.meshes
            .values()
            .map(|analytics| analytics.allocated_memory)
            .sum()
    }
}

impl GraphicsContext for BufferState {
    fn upload_mesh(&mut self, coordinate: ChunkCoordinate, mesh: &MeshData) -> Result<(), UploadError> {
        let size = mesh.byte_size() as u64;
        if let Some(capacity) = self.capacity {
            let replaced = self
                .analytics(coordinate)
                .map_or(0, |analytics| analytics.allocated_memory);
            let in_use = self.get_total_allocated_memory() - replaced;
            if in_use + size > capacity {
                return Err(UploadError::Rejected {
                    coordinate,
                    reason: format!("{size} bytes requested, {} of {capacity} in use", in_use),
                });
            }
        }

        let times_written = self
            .analytics(coordinate)
            .map_or(0, |analytics| analytics.times_written);
        self.meshes.insert(
            coordinate,
            BufferAnalytics {
                allocated_memory: size,
                face_count: mesh.face_count() as u64,
                times_written: times_written + 1,
            },
        );
        Ok(())
    }

    fn release_mesh(&mut self, coordinate: ChunkCoordinate) -> bool {
        self.meshes.remove(&coordinate).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::rendering::meshing::Face;
    use crate::engine_state::voxels::block::{block_side::BlockSide, block_type::BlockType};

    fn mesh(faces: usize) -> MeshData {
        let mut mesh = MeshData::default();
        for x in 0..faces {
            mesh.push_face(&Face::new(x, 0, 0, BlockType::STONE, BlockSide::TOP));
        }
        mesh
    }

    #[test]
    fn uploads_replace_and_track_writes() {
        let mut buffers = BufferState::new();
        let coordinate = ChunkCoordinate::new(1, 2);
        buffers.upload_mesh(coordinate, &mesh(2)).unwrap();
        buffers.upload_mesh(coordinate, &mesh(3)).unwrap();

        let analytics = buffers.analytics(coordinate).unwrap();
        assert_eq!(analytics.times_written, 2);
        assert_eq!(analytics.face_count, 3);
        assert_eq!(analytics.allocated_memory, mesh(3).byte_size() as u64);
        assert_eq!(buffers.resident_count(), 1);
        assert_eq!(buffers.get_total_allocated_memory(), analytics.allocated_memory);
    }

    #[test]
    fn release_frees_memory() {
        let mut buffers = BufferState::new();
        let coordinate = ChunkCoordinate::new(0, 0);
        buffers.upload_mesh(coordinate, &mesh(1)).unwrap();
        assert!(buffers.release_mesh(coordinate));
        assert!(!buffers.release_mesh(coordinate));
        assert_eq!(buffers.get_total_allocated_memory(), 0);
        assert!(!buffers.is_resident(coordinate));
    }

    #[test]
    fn capacity_rejects_oversized_uploads() {
        let one_face = mesh(1).byte_size() as u64;
        let mut buffers = BufferState::with_capacity(one_face * 2);
        buffers.upload_mesh(ChunkCoordinate::new(0, 0), &mesh(1)).unwrap();
        assert!(matches!(
            buffers.upload_mesh(ChunkCoordinate::new(1, 0), &mesh(2)),
            Err(UploadError::Rejected { .. })
        ));
        // Replacing a resident mesh only counts the difference.
        buffers.upload_mesh(ChunkCoordinate::new(0, 0), &mesh(2)).unwrap();
        assert!(!buffers.is_resident(ChunkCoordinate::new(1, 0)));
    }
}
