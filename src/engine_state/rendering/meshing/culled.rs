//! Face-culled meshing.
//!
//! A face is emitted only when the block across it is see-through and of a different
//! type. Vertical faces stacked in one column are merged into a single taller quad.
//!
//! Columns are walked bottom-up and stop at the column's highest visible block, read
//! from the volume's visibility bitmap.

use crate::engine_state::voxels::{
    block::{block_side::BlockSide, block_type::BlockType},
    chunk::{volume::BlockVolume, ChunkCoordinate, CHUNK_DIMENSION, CHUNK_VOLUME},
};
use crate::error::MeshBuildError;

use super::{Face, MeshBuilder, MeshData, NeighborEdges};

/// The default [`MeshBuilder`].
#[derive(Copy, Clone, Debug, Default)]
pub struct CulledMesher;

impl CulledMesher {
    fn across(
        blocks: &BlockVolume,
        neighbors: &NeighborEdges,
        (x, y, z): (usize, usize, usize),
        side: BlockSide,
    ) -> BlockType {
        let normal = side.normal();
        let (nx, ny, nz) = (x as i32 + normal.x, y as i32 + normal.y, z as i32 + normal.z);
        if BlockVolume::contains(nx, ny, nz) {
            return blocks.get(nx as usize, ny as usize, nz as usize);
        }
        match side {
            BlockSide::TOP | BlockSide::BOTTOM => BlockType::AIR,
            BlockSide::FRONT | BlockSide::BACK => neighbors.get(side, y, z),
            BlockSide::LEFT | BlockSide::RIGHT => neighbors.get(side, y, x),
        }
    }

    fn exposed(block: BlockType, across: BlockType) -> bool {
        !across.is_opaque() && across != block
    }
}

impl MeshBuilder for CulledMesher {
    fn build(
        &self,
        coordinate: ChunkCoordinate,
        blocks: &BlockVolume,
        neighbors: &NeighborEdges,
    ) -> Result<MeshData, MeshBuildError> {
        if blocks.len() != CHUNK_VOLUME {
            return Err(MeshBuildError::Builder {
                coordinate,
                reason: format!("volume holds {} blocks", blocks.len()),
            });
        }

        let mut mesh = MeshData::default();
        if blocks.visible_count() == 0 {
            return Ok(mesh);
        }
        let vertical_sides = BlockSide::horizontal();

        for x in 0..CHUNK_DIMENSION {
            for z in 0..CHUNK_DIMENSION {
                let Some(top) = blocks.surface_height(x, z) else {
                    continue;
                };
                let mut runs: [Option<Face>; 4] = [None; 4];
                for y in 0..=top {
                    let block = blocks.get(x, y, z);
                    let visible = block.is_visible();

                    for (slot, side) in vertical_sides.into_iter().enumerate() {
                        let face = (visible
                            && Self::exposed(block, Self::across(blocks, neighbors, (x, y, z), side)))
                        .then(|| Face::new(x, y, z, block, side));

                        runs[slot] = match (runs[slot], face) {
                            (Some(run), Some(face)) => match run.merge_up(&face) {
                                Some(merged) => Some(merged),
                                None => {
                                    mesh.push_face(&run);
                                    Some(face)
                                }
                            },
                            (Some(run), None) => {
                                mesh.push_face(&run);
                                None
                            }
                            (None, face) => face,
                        };
                    }

                    if !visible {
                        continue;
                    }
                    for side in [BlockSide::BOTTOM, BlockSide::TOP] {
                        if Self::exposed(block, Self::across(blocks, neighbors, (x, y, z), side)) {
                            mesh.push_face(&Face::new(x, y, z, block, side));
                        }
                    }
                }
                for run in runs.into_iter().flatten() {
                    mesh.push_face(&run);
                }
            }
        }

        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::chunk::WORLD_HEIGHT;

    fn build(blocks: &BlockVolume, neighbors: &NeighborEdges) -> MeshData {
        CulledMesher
            .build(ChunkCoordinate::new(0, 0), blocks, neighbors)
            .unwrap()
    }

    #[test]
    fn empty_chunk_has_no_faces() {
        assert!(build(&BlockVolume::empty(), &NeighborEdges::none()).is_empty());
    }

    #[test]
    fn lone_block_has_six_faces() {
        let mut blocks = BlockVolume::empty();
        blocks.set(5, 40, 5, BlockType::STONE);
        assert_eq!(build(&blocks, &NeighborEdges::none()).face_count(), 6);
    }

    #[test]
    fn stacked_blocks_merge_side_faces() {
        let mut blocks = BlockVolume::empty();
        for y in 40..44 {
            blocks.set(5, y, 5, BlockType::STONE);
        }
        // Four merged sides plus a top and a bottom.
        assert_eq!(build(&blocks, &NeighborEdges::none()).face_count(), 6);

        blocks.set(5, 42, 5, BlockType::DIRT);
        // Sides split into three runs each.
        assert_eq!(build(&blocks, &NeighborEdges::none()).face_count(), 4 * 3 + 2);
    }

    #[test]
    fn border_faces_are_culled_by_neighbors() {
        let mut blocks = BlockVolume::empty();
        blocks.set(0, 40, 5, BlockType::STONE);
        assert_eq!(build(&blocks, &NeighborEdges::none()).face_count(), 6);

        let mut west = BlockVolume::empty();
        west.set(CHUNK_DIMENSION - 1, 40, 5, BlockType::STONE);
        let mut edges = NeighborEdges::none();
        edges.set(BlockSide::FRONT, &west);
        assert_eq!(build(&blocks, &edges).face_count(), 5);
    }

    #[test]
    fn column_walk_reaches_both_world_limits() {
        let mut blocks = BlockVolume::empty();
        blocks.set(2, WORLD_HEIGHT - 1, 2, BlockType::STONE);
        blocks.set(9, 0, 9, BlockType::STONE);
        assert_eq!(build(&blocks, &NeighborEdges::none()).face_count(), 12);
    }

    #[test]
    fn adjacent_water_does_not_draw_internal_faces() {
        let mut blocks = BlockVolume::empty();
        blocks.set(3, 10, 3, BlockType::WATER);
        blocks.set(4, 10, 3, BlockType::WATER);
        // Each block hides one face of the other.
        assert_eq!(build(&blocks, &NeighborEdges::none()).face_count(), 10);
    }
}
