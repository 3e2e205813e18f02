//! # Block Type Module
//!
//! The kinds of blocks terrain generation and gameplay can place.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::BlockTypeSize;

/// Enumerates all possible block types in the voxel world.
///
/// The `FromPrimitive` derive allows conversion from the compact stored integer.
#[repr(u8)]
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive, Default)]
pub enum BlockType {
    /// Empty space. Never meshed.
    #[default]
    AIR,
    /// Bulk underground rock.
    STONE,
    /// Soil layer under grass.
    DIRT,
    /// Surface block above sea level.
    GRASS,
    /// Beach and shallow sea floor.
    SAND,
    /// Fills terrain below sea level.
    WATER,
    /// Tree trunk.
    WOOD,
    /// Tree canopy.
    LEAVES,
    /// Shallow ore vein.
    COAL_ORE,
    /// Deep ore vein.
    IRON_ORE,
    /// Decoration placed on grass.
    FLOWER,
    /// Unbreakable world floor.
    BEDROCK,
}

impl BlockType {
    /// Converts a `BlockTypeSize` to a `BlockType`, reading unknown values as `AIR`.
    pub fn get_block_type_from_int(btype: BlockTypeSize) -> Self {
        FromPrimitive::from_u8(btype).unwrap_or(BlockType::AIR)
    }

    /// Whether this block fully hides the face of a neighbor touching it.
    pub fn is_opaque(self) -> bool {
        !matches!(
            self,
            BlockType::AIR | BlockType::WATER | BlockType::LEAVES | BlockType::FLOWER
        )
    }

    /// Whether this block produces geometry at all.
    pub fn is_visible(self) -> bool {
        self != BlockType::AIR
    }
}
