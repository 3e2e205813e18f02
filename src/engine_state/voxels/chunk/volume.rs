//! # Block Volume
//!
//! Dense storage for one chunk column: `CHUNK_DIMENSION × WORLD_HEIGHT × CHUNK_DIMENSION`
//! blocks, laid out x-fastest, then z, then y, so one horizontal layer is contiguous.
//!
//! Alongside the blocks the volume keeps a bit vector of visible (non-air) positions.
//! The mesher uses it to skip empty volumes and to stop each column at its highest
//! visible block, so the air above the terrain surface is never walked.

use bitvec::prelude::BitVec;

use crate::engine_state::voxels::block::{block_type::BlockType, Block};

use super::{CHUNK_DIMENSION, CHUNK_LAYER_SIZE, CHUNK_VOLUME, WORLD_HEIGHT};

/// The block content of one chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockVolume {
    blocks: Vec<Block>,
    visible: BitVec,
}

impl BlockVolume {
    /// A volume filled with a single block type.
    pub fn filled(block_type: BlockType) -> Self {
        let blocks = vec![Block::new(block_type); CHUNK_VOLUME];
        let visible = BitVec::repeat(block_type.is_visible(), CHUNK_VOLUME);
        BlockVolume { blocks, visible }
    }

    /// A volume of air.
    pub fn empty() -> Self {
        Self::filled(BlockType::AIR)
    }

    /// Builds a volume by evaluating `f` at every local position.
    pub fn from_fn(mut f: impl FnMut(usize, usize, usize) -> BlockType) -> Self {
        let mut blocks = Vec::with_capacity(CHUNK_VOLUME);
        let mut visible = BitVec::with_capacity(CHUNK_VOLUME);
        for y in 0..WORLD_HEIGHT {
            for z in 0..CHUNK_DIMENSION {
                for x in 0..CHUNK_DIMENSION {
                    let block_type = f(x, y, z);
                    visible.push(block_type.is_visible());
                    blocks.push(Block::new(block_type));
                }
            }
        }
        BlockVolume { blocks, visible }
    }

    /// Wraps raw blocks, e.g. from a persistence layer.
    ///
    /// Returns the blocks back if the length does not match the chunk layout.
    pub fn from_blocks(blocks: Vec<Block>) -> Result<Self, Vec<Block>> {
        if blocks.len() != CHUNK_VOLUME {
            return Err(blocks);
        }
        let visible = blocks.iter().map(|b| b.get_type().is_visible()).collect();
        Ok(BlockVolume { blocks, visible })
    }

    /// Index of a local position in the flat block array.
    #[inline]
    pub fn index(x: usize, y: usize, z: usize) -> usize {
        x + CHUNK_DIMENSION * z + CHUNK_LAYER_SIZE * y
    }

    /// Whether a local position lies inside the volume.
    #[inline]
    pub fn contains(x: i32, y: i32, z: i32) -> bool {
        (0..CHUNK_DIMENSION as i32).contains(&x)
            && (0..WORLD_HEIGHT as i32).contains(&y)
            && (0..CHUNK_DIMENSION as i32).contains(&z)
    }

    /// Block type at a local position.
    ///
    /// # Panics
    /// Panics if the position is outside the volume.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> BlockType {
        self.blocks[Self::index(x, y, z)].get_type()
    }

    /// Overwrites a block, returning the previous type.
    ///
    /// # Panics
    /// Panics if the position is outside the volume.
    pub fn set(&mut self, x: usize, y: usize, z: usize, block_type: BlockType) -> BlockType {
        let index = Self::index(x, y, z);
        let previous = self.blocks[index].get_type();
        self.blocks[index] = Block::new(block_type);
        self.visible.set(index, block_type.is_visible());
        previous
    }

    /// Highest y holding a visible block in a column, if any.
    pub fn surface_height(&self, x: usize, z: usize) -> Option<usize> {
        (0..WORLD_HEIGHT)
            .rev()
            .find(|&y| self.visible[Self::index(x, y, z)])
    }

    /// Number of non-air blocks.
    pub fn visible_count(&self) -> usize {
        self.visible.count_ones()
    }

    /// Total number of blocks, always `CHUNK_VOLUME` for a well-formed volume.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the volume holds no blocks at all.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
