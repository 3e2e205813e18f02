//! Decoration pass: ore veins, trees and flowers.
//!
//! Every routine draws from its own RNG seeded by chunk and feature index, and writes
//! in world coordinates so trees planted near an edge spill into the neighbor chunk.

use fastrand::Rng;

use crate::engine_state::voxels::{
    block::block_type::BlockType,
    chunk::{ChunkCoordinate, CHUNK_DIMENSION, WORLD_HEIGHT},
};

use super::{feature_seed, BlockAccess};

const ORE_FEATURE: u32 = 0;
const TREE_FEATURE: u32 = 1;
const FLOWER_FEATURE: u32 = 2;

struct OreKind {
    block_type: BlockType,
    veins: usize,
    vein_size: std::ops::RangeInclusive<usize>,
    depth: std::ops::Range<i32>,
}

const ORES: [OreKind; 2] = [
    OreKind {
        block_type: BlockType::COAL_ORE,
        veins: 10,
        vein_size: 4..=8,
        depth: 8..60,
    },
    OreKind {
        block_type: BlockType::IRON_ORE,
        veins: 5,
        vein_size: 3..=6,
        depth: 4..36,
    },
];

/// Topmost non-air block of a world column.
pub fn surface(world: &dyn BlockAccess, world_x: i32, world_z: i32) -> Option<(i32, BlockType)> {
    (0..WORLD_HEIGHT as i32)
        .rev()
        .map(|y| (y, world.block_at(world_x, y, world_z)))
        .find(|(_, block_type)| *block_type != BlockType::AIR)
}

fn random_column(rng: &mut Rng, coordinate: ChunkCoordinate) -> (i32, i32) {
    let origin = coordinate.origin();
    let dimension = CHUNK_DIMENSION as i32;
    (
        origin.x + rng.i32(0..dimension),
        origin.z + rng.i32(0..dimension),
    )
}

/// Replaces stone with short random-walk ore veins.
pub fn place_ores(world_seed: u32, coordinate: ChunkCoordinate, world: &dyn BlockAccess) -> usize {
    let mut rng = Rng::with_seed(feature_seed(world_seed, coordinate, ORE_FEATURE));
    let mut placed = 0;
    for ore in &ORES {
        for _ in 0..ore.veins {
            let (mut x, mut z) = random_column(&mut rng, coordinate);
            let mut y = rng.i32(ore.depth.clone());
            for _ in 0..rng.usize(ore.vein_size.clone()) {
                if world.block_at(x, y, z) == BlockType::STONE
                    && world.place_block(x, y, z, ore.block_type)
                {
                    placed += 1;
                }
                match rng.u8(0..3) {
                    0 => x += rng.i32(-1..=1),
                    1 => y += rng.i32(-1..=1),
                    _ => z += rng.i32(-1..=1),
                }
            }
        }
    }
    placed
}

/// Plants up to three trees on grass. Canopies may cross into neighbor chunks.
pub fn place_trees(world_seed: u32, coordinate: ChunkCoordinate, world: &dyn BlockAccess) -> usize {
    let mut rng = Rng::with_seed(feature_seed(world_seed, coordinate, TREE_FEATURE));
    let mut planted = 0;
    for _ in 0..rng.usize(0..=3) {
        let (x, z) = random_column(&mut rng, coordinate);
        let Some((ground, BlockType::GRASS)) = surface(world, x, z) else {
            continue;
        };
        let trunk_height = rng.i32(4..=6);
        if ground + trunk_height + 2 >= WORLD_HEIGHT as i32 {
            continue;
        }
        for dy in 1..=trunk_height {
            world.place_block(x, ground + dy, z, BlockType::WOOD);
        }
        let top = ground + trunk_height;
        for y in (top - 2)..=(top + 1) {
            let radius: i32 = if y > top - 1 { 1 } else { 2 };
            for dx in -radius..=radius {
                for dz in -radius..=radius {
                    let corner = dx.abs() == radius && dz.abs() == radius;
                    if corner && (radius == 1 || rng.bool()) {
                        continue;
                    }
                    if world.block_at(x + dx, y, z + dz) == BlockType::AIR {
                        world.place_block(x + dx, y, z + dz, BlockType::LEAVES);
                    }
                }
            }
        }
        planted += 1;
    }
    planted
}

/// Scatters flowers on open grass.
pub fn place_flowers(
    world_seed: u32,
    coordinate: ChunkCoordinate,
    world: &dyn BlockAccess,
) -> usize {
    let mut rng = Rng::with_seed(feature_seed(world_seed, coordinate, FLOWER_FEATURE));
    let mut placed = 0;
    for _ in 0..rng.usize(0..6) {
        let (x, z) = random_column(&mut rng, coordinate);
        if let Some((ground, BlockType::GRASS)) = surface(world, x, z) {
            if world.place_block(x, ground + 1, z, BlockType::FLOWER) {
                placed += 1;
            }
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// Flat grass world at y = 64 over stone, backed by a sparse overlay.
    struct FlatWorld {
        overlay: RefCell<HashMap<(i32, i32, i32), BlockType>>,
    }

    impl FlatWorld {
        fn new() -> Self {
            FlatWorld {
                overlay: RefCell::new(HashMap::new()),
            }
        }

        fn count(&self, block_type: BlockType) -> usize {
            self.overlay
                .borrow()
                .values()
                .filter(|b| **b == block_type)
                .count()
        }
    }

    impl BlockAccess for FlatWorld {
        fn block_at(&self, x: i32, y: i32, z: i32) -> BlockType {
            if let Some(block_type) = self.overlay.borrow().get(&(x, y, z)) {
                return *block_type;
            }
            match y {
                64 => BlockType::GRASS,
                y if y < 64 && y >= 0 => BlockType::STONE,
                _ => BlockType::AIR,
            }
        }

        fn place_block(&self, x: i32, y: i32, z: i32, block_type: BlockType) -> bool {
            if !(0..WORLD_HEIGHT as i32).contains(&y) {
                return false;
            }
            self.overlay.borrow_mut().insert((x, y, z), block_type);
            true
        }
    }

    #[test]
    fn ores_only_replace_stone() {
        let world = FlatWorld::new();
        let placed = place_ores(3, ChunkCoordinate::new(0, 0), &world);
        assert!(placed > 0);
        for ((_, y, _), block_type) in world.overlay.borrow().iter() {
            assert!(*y < 64);
            assert!(matches!(block_type, BlockType::COAL_ORE | BlockType::IRON_ORE));
        }
    }

    #[test]
    fn decoration_is_deterministic() {
        let a = FlatWorld::new();
        let b = FlatWorld::new();
        let coordinate = ChunkCoordinate::new(2, -9);
        place_trees(11, coordinate, &a);
        place_trees(11, coordinate, &b);
        assert_eq!(*a.overlay.borrow(), *b.overlay.borrow());
    }

    #[test]
    fn trees_grow_wood_above_grass() {
        let world = FlatWorld::new();
        let planted: usize = (0..8)
            .map(|i| place_trees(5, ChunkCoordinate::new(i, 0), &world))
            .sum();
        assert!(planted > 0);
        assert!(world.count(BlockType::WOOD) >= planted * 4);
        assert!(world.count(BlockType::LEAVES) > 0);
        for ((_, y, _), block_type) in world.overlay.borrow().iter() {
            if *block_type == BlockType::WOOD {
                assert!(*y > 64);
            }
        }
    }

    #[test]
    fn canopy_narrows_over_the_top_two_rows() {
        let world = FlatWorld::new();
        let planted: usize = (0..8)
            .map(|i| place_trees(5, ChunkCoordinate::new(i, 0), &world))
            .sum();
        assert!(planted > 0);

        let overlay = world.overlay.borrow();
        let mut trunk_tops: HashMap<(i32, i32), i32> = HashMap::new();
        for (&(x, y, z), block_type) in overlay.iter() {
            if *block_type == BlockType::WOOD {
                let top = trunk_tops.entry((x, z)).or_insert(y);
                *top = (*top).max(y);
            }
        }
        for (&(x, y, z), block_type) in overlay.iter() {
            if *block_type != BlockType::LEAVES {
                continue;
            }
            let fits_a_tree = trunk_tops.iter().any(|(&(tx, tz), &top)| {
                let reach = (x - tx).abs().max((z - tz).abs());
                let radius = if y > top - 1 { 1 } else { 2 };
                (top - 2..=top + 1).contains(&y) && reach <= radius
            });
            assert!(fits_a_tree, "stray leaves at {:?}", (x, y, z));
        }
    }

    #[test]
    fn flowers_sit_directly_on_grass() {
        let world = FlatWorld::new();
        for i in 0..8 {
            place_flowers(9, ChunkCoordinate::new(0, i), &world);
        }
        for ((_, y, _), block_type) in world.overlay.borrow().iter() {
            assert_eq!(*block_type, BlockType::FLOWER);
            assert_eq!(*y, 65);
        }
    }
}
