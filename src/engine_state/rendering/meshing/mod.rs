//! Mesh generation for chunks.
//!
//! A [`MeshBuilder`] turns a chunk's blocks into [`MeshData`] on a worker thread. Faces
//! on the chunk border look across into the neighbor chunk, so builders receive a copy
//! of each neighbor's touching layer ([`NeighborEdges`]) instead of the neighbors
//! themselves. That keeps a build to one chunk lock at a time.
//!
//! # Architecture
//! - [`MeshData`]: vertices and indices ready for the graphics context
//! - [`Face`]: one quad, with vertical merging of stacked faces
//! - [`CulledMesher`]: the default builder, emitting only faces that can be seen

use crate::engine_state::{
    rendering::Vertex,
    voxels::{
        block::{block_side::BlockSide, block_type::BlockType},
        chunk::{volume::BlockVolume, Chunk, ChunkCoordinate, CHUNK_DIMENSION, WORLD_HEIGHT},
    },
};
use crate::error::MeshBuildError;

mod culled;
mod face;

pub use culled::CulledMesher;
pub use face::Face;

/// Geometry for one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// Vertex data, four per face
    pub vertices: Vec<Vertex>,
    /// Triangle list indices, six per face
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Appends a face.
    pub fn push_face(&mut self, face: &Face) {
        let first_vertex = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&face.vertices());
        self.indices.extend_from_slice(&Face::indices(first_vertex));
    }

    /// Number of quads.
    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Whether the chunk has nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertex data as bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as bytes.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Total bytes a graphics backend would allocate for this mesh.
    pub fn byte_size(&self) -> usize {
        self.vertex_bytes().len() + self.index_bytes().len()
    }
}

/// The layer of each horizontal neighbor that touches this chunk.
///
/// Layers are stored as `[y][along]` where `along` runs over the axis parallel to the
/// shared face. Missing neighbors read as `AIR`.
#[derive(Clone, Debug, Default)]
pub struct NeighborEdges {
    layers: [Option<Vec<BlockType>>; 4],
}

fn horizontal_index(side: BlockSide) -> Option<usize> {
    BlockSide::horizontal().iter().position(|&s| s == side)
}

impl NeighborEdges {
    /// No neighbors loaded.
    pub fn none() -> Self {
        Self::default()
    }

    /// Copies the touching layers out of whichever neighbors are present.
    ///
    /// `neighbor` is called with the side of *this* chunk the neighbor sits across.
    pub fn capture(mut neighbor: impl FnMut(BlockSide) -> Option<std::sync::Arc<Chunk>>) -> Self {
        let mut edges = Self::default();
        for side in BlockSide::horizontal() {
            if let Some(chunk) = neighbor(side) {
                edges.set(side, &chunk.blocks());
            }
        }
        edges
    }

    /// Records the layer of `volume` that touches this chunk across `side`.
    pub fn set(&mut self, side: BlockSide, volume: &BlockVolume) {
        let Some(slot) = horizontal_index(side) else {
            return;
        };
        let last = CHUNK_DIMENSION - 1;
        let mut layer = Vec::with_capacity(CHUNK_DIMENSION * WORLD_HEIGHT);
        for y in 0..WORLD_HEIGHT {
            for along in 0..CHUNK_DIMENSION {
                // The neighbor's face opposite to `side`.
                let block = match side {
                    BlockSide::FRONT => volume.get(last, y, along),
                    BlockSide::BACK => volume.get(0, y, along),
                    BlockSide::LEFT => volume.get(along, y, last),
                    _ => volume.get(along, y, 0),
                };
                layer.push(block);
            }
        }
        self.layers[slot] = Some(layer);
    }

    /// Whether a neighbor was captured across `side`.
    pub fn has(&self, side: BlockSide) -> bool {
        horizontal_index(side).is_some_and(|slot| self.layers[slot].is_some())
    }

    /// Block in the neighbor across `side`, at height `y` and offset `along` the face.
    pub fn get(&self, side: BlockSide, y: usize, along: usize) -> BlockType {
        horizontal_index(side)
            .and_then(|slot| self.layers[slot].as_ref())
            .map(|layer| layer[y * CHUNK_DIMENSION + along])
            .unwrap_or(BlockType::AIR)
    }
}

/// Builds mesh data for a chunk. Runs on worker threads.
pub trait MeshBuilder: Send + Sync {
    /// Builds the mesh of `blocks`, reading border faces from `neighbors`.
    fn build(
        &self,
        coordinate: ChunkCoordinate,
        blocks: &BlockVolume,
        neighbors: &NeighborEdges,
    ) -> Result<MeshData, MeshBuildError>;
}
