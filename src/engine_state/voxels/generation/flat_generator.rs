//! Superflat terrain: a fixed stack of layers and no decoration.

use crate::engine_state::voxels::{
    block::block_type::BlockType,
    chunk::{volume::BlockVolume, ChunkCoordinate},
};
use crate::error::GenerationError;

use super::{BlockAccess, TerrainGenerator};

/// Every column is bedrock, stone up to `surface - 1`, then one grass block.
#[derive(Copy, Clone, Debug)]
pub struct FlatTerrainGenerator {
    surface: usize,
}

impl FlatTerrainGenerator {
    /// Creates a generator whose grass layer sits at `surface`.
    pub fn new(surface: usize) -> Self {
        FlatTerrainGenerator { surface }
    }

    /// Height of the grass layer.
    pub fn surface(&self) -> usize {
        self.surface
    }
}

impl Default for FlatTerrainGenerator {
    fn default() -> Self {
        FlatTerrainGenerator::new(64)
    }
}

impl TerrainGenerator for FlatTerrainGenerator {
    fn generate_bare(&self, _coordinate: ChunkCoordinate) -> Result<BlockVolume, GenerationError> {
        let surface = self.surface;
        Ok(BlockVolume::from_fn(|_, y, _| match y {
            0 => BlockType::BEDROCK,
            y if y < surface => BlockType::STONE,
            y if y == surface => BlockType::GRASS,
            _ => BlockType::AIR,
        }))
    }

    fn populate_features(
        &self,
        _coordinate: ChunkCoordinate,
        _world: &dyn BlockAccess,
    ) -> Result<(), GenerationError> {
        Ok(())
    }
}
