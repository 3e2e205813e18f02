//! Noise-driven terrain: rolling hills of grass over dirt and stone, sandy shores and
//! water below sea level, and a bedrock floor.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::engine_state::voxels::{
    block::block_type::BlockType,
    chunk::{volume::BlockVolume, ChunkCoordinate, CHUNK_DIMENSION, WORLD_HEIGHT},
};
use crate::error::GenerationError;

use super::{features, BlockAccess, TerrainGenerator};

/// Water fills every column up to this height.
pub const SEA_LEVEL: i32 = 62;
/// Average terrain height.
const BASE_HEIGHT: f64 = 66.0;
/// Peak deviation of the hills from `BASE_HEIGHT`.
const HILL_AMPLITUDE: f64 = 18.0;
/// Thickness of the dirt layer under the surface block.
const DIRT_DEPTH: i32 = 3;

/// Deterministic terrain generator seeded from the world seed.
pub struct NoiseTerrainGenerator {
    seed: u32,
    height: Fbm<Perlin>,
    detail: Fbm<Perlin>,
}

impl NoiseTerrainGenerator {
    /// Creates a generator for a world seed.
    pub fn new(seed: u32) -> Self {
        let height = Fbm::<Perlin>::new(seed).set_octaves(5).set_frequency(0.008);
        let detail = Fbm::<Perlin>::new(seed ^ 0xA5A5_A5A5)
            .set_octaves(3)
            .set_frequency(0.04);
        NoiseTerrainGenerator {
            seed,
            height,
            detail,
        }
    }

    /// The world seed.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Height of the topmost terrain block of a world column.
    pub fn ground_height(&self, world_x: i32, world_z: i32) -> i32 {
        let point = [world_x as f64, world_z as f64];
        let hills = self.height.get(point) * HILL_AMPLITUDE + self.detail.get(point) * 3.0;
        ((BASE_HEIGHT + hills).round() as i32).clamp(1, WORLD_HEIGHT as i32 - 16)
    }

    fn column_block(ground: i32, y: i32) -> BlockType {
        if y == 0 {
            return BlockType::BEDROCK;
        }
        if y > ground {
            return if y <= SEA_LEVEL {
                BlockType::WATER
            } else {
                BlockType::AIR
            };
        }
        let shore = ground <= SEA_LEVEL + 1;
        if y == ground {
            if shore {
                BlockType::SAND
            } else {
                BlockType::GRASS
            }
        } else if y > ground - DIRT_DEPTH {
            if shore {
                BlockType::SAND
            } else {
                BlockType::DIRT
            }
        } else {
            BlockType::STONE
        }
    }
}

impl TerrainGenerator for NoiseTerrainGenerator {
    fn generate_bare(&self, coordinate: ChunkCoordinate) -> Result<BlockVolume, GenerationError> {
        let origin = coordinate.origin();
        let mut heights = [[0i32; CHUNK_DIMENSION]; CHUNK_DIMENSION];
        for (z, row) in heights.iter_mut().enumerate() {
            for (x, height) in row.iter_mut().enumerate() {
                *height = self.ground_height(origin.x + x as i32, origin.z + z as i32);
            }
        }
        Ok(BlockVolume::from_fn(|x, y, z| {
            Self::column_block(heights[z][x], y as i32)
        }))
    }

    fn populate_features(
        &self,
        coordinate: ChunkCoordinate,
        world: &dyn BlockAccess,
    ) -> Result<(), GenerationError> {
        features::place_ores(self.seed, coordinate, world);
        features::place_trees(self.seed, coordinate, world);
        features::place_flowers(self.seed, coordinate, world);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let a = NoiseTerrainGenerator::new(7);
        let b = NoiseTerrainGenerator::new(7);
        let coordinate = ChunkCoordinate::new(-3, 5);
        assert_eq!(
            a.generate_bare(coordinate).unwrap(),
            b.generate_bare(coordinate).unwrap()
        );
    }

    #[test]
    fn columns_have_bedrock_floor_and_a_surface() {
        let generator = NoiseTerrainGenerator::new(42);
        let volume = generator.generate_bare(ChunkCoordinate::new(0, 0)).unwrap();
        for x in 0..CHUNK_DIMENSION {
            for z in 0..CHUNK_DIMENSION {
                assert_eq!(volume.get(x, 0, z), BlockType::BEDROCK);
                let surface = volume.surface_height(x, z).unwrap();
                assert!(surface >= SEA_LEVEL as usize);
                assert_eq!(volume.get(x, WORLD_HEIGHT - 1, z), BlockType::AIR);
            }
        }
    }

    #[test]
    fn surface_block_depends_on_sea_level() {
        assert_eq!(NoiseTerrainGenerator::column_block(80, 80), BlockType::GRASS);
        assert_eq!(NoiseTerrainGenerator::column_block(80, 78), BlockType::DIRT);
        assert_eq!(NoiseTerrainGenerator::column_block(80, 20), BlockType::STONE);
        assert_eq!(NoiseTerrainGenerator::column_block(50, 50), BlockType::SAND);
        assert_eq!(NoiseTerrainGenerator::column_block(50, 55), BlockType::WATER);
        assert_eq!(NoiseTerrainGenerator::column_block(50, 90), BlockType::AIR);
    }
}
