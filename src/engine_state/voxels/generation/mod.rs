//! # Terrain Generation
//!
//! Chunk content comes from a [`TerrainGenerator`] in two passes:
//!
//! 1. `generate_bare` fills a chunk's volume from noise. It is pure and deterministic
//!    per coordinate, so any number of chunks may generate concurrently.
//! 2. `populate_features` decorates an already-registered chunk (ores, trees, flowers).
//!    It writes through [`BlockAccess`] in world coordinates, so a tree near an edge can
//!    reach into the neighboring chunk. The world runs it at most once per chunk.
//!
//! Randomness is never shared: every decoration step draws from its own
//! `fastrand::Rng` seeded by [`feature_seed`].

use crate::engine_state::voxels::{
    block::block_type::BlockType,
    chunk::{volume::BlockVolume, ChunkCoordinate},
};
use crate::error::GenerationError;

pub mod features;
pub mod flat_generator;
pub mod noise_generator;

pub use flat_generator::FlatTerrainGenerator;
pub use noise_generator::NoiseTerrainGenerator;

/// Produces and decorates chunk content.
pub trait TerrainGenerator: Send + Sync {
    /// Fills the volume of the chunk at `coordinate` from noise alone.
    fn generate_bare(&self, coordinate: ChunkCoordinate) -> Result<BlockVolume, GenerationError>;

    /// Places ores, trees and flowers for the chunk at `coordinate`.
    fn populate_features(
        &self,
        coordinate: ChunkCoordinate,
        world: &dyn BlockAccess,
    ) -> Result<(), GenerationError>;
}

/// World-coordinate block access used by the decoration pass.
pub trait BlockAccess {
    /// Block at a world position. Positions outside loaded chunks read as `AIR`.
    fn block_at(&self, world_x: i32, world_y: i32, world_z: i32) -> BlockType;

    /// Writes a block at a world position if its chunk is loaded.
    ///
    /// Returns `false` if the position is out of height bounds or its chunk is not loaded.
    fn place_block(&self, world_x: i32, world_y: i32, world_z: i32, block_type: BlockType)
        -> bool;
}

#[inline]
fn mix64(mut v: u64) -> u64 {
    v ^= v >> 30;
    v = v.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    v ^= v >> 27;
    v = v.wrapping_mul(0x94d0_49bb_1331_11eb);
    v ^= v >> 31;
    v
}

/// Deterministic seed for one decoration step of one chunk.
///
/// Distinct `(world_seed, chunk, feature_index)` tuples give independent streams, so
/// concurrent generation of different chunks needs no synchronization.
pub fn feature_seed(world_seed: u32, coordinate: ChunkCoordinate, feature_index: u32) -> u64 {
    let mut h = mix64(world_seed as u64 ^ 0x9e37_79b9_7f4a_7c15);
    h = mix64(h ^ (coordinate.x as u32 as u64));
    h = mix64(h ^ ((coordinate.z as u32 as u64) << 32));
    mix64(h ^ feature_index as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_seeds_differ_per_chunk_and_feature() {
        let a = feature_seed(1, ChunkCoordinate::new(0, 0), 0);
        assert_eq!(a, feature_seed(1, ChunkCoordinate::new(0, 0), 0));
        assert_ne!(a, feature_seed(1, ChunkCoordinate::new(1, 0), 0));
        assert_ne!(a, feature_seed(1, ChunkCoordinate::new(0, 1), 0));
        assert_ne!(a, feature_seed(1, ChunkCoordinate::new(0, 0), 1));
        assert_ne!(a, feature_seed(2, ChunkCoordinate::new(0, 0), 0));
    }
}
