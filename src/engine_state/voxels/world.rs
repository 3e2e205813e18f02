//! # World Module
//!
//! The `World` is the chunk store: the single source of truth for which chunks exist.
//! It also exposes block-level access in world coordinates for gameplay and for the
//! decoration pass.
//!
//! ## Architecture
//!
//! Chunks live in a sharded concurrent map (`DashMap`) as `Arc<Chunk>`. The map is the
//! only long-lived owner; everyone else holds a transient clone. Each chunk carries its
//! own locks, so there is no world-wide lock.
//!
//! ## Chunk Creation
//!
//! `get_or_create` first asks the attached persistence layer for stored content and
//! otherwise runs the terrain generator. Generation happens outside the map's locks and
//! only a complete chunk is ever inserted; a failed generation leaves the map untouched
//! and the coordinate is retried on the next access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::GenerationError;

use super::block::{block_side::BlockSide, block_type::BlockType};
use super::chunk::{
    mesh_state::MeshEvent, volume::BlockVolume, Chunk, ChunkCoordinate, CHUNK_DIMENSION,
    CHUNK_VOLUME, WORLD_HEIGHT,
};
use super::generation::{BlockAccess, TerrainGenerator};
use super::persistence::{ChunkData, ChunkPersistence};

/// The set of loaded chunks plus the generator that fills new ones.
pub struct World {
    chunks: DashMap<ChunkCoordinate, Arc<Chunk>>,
    generator: Arc<dyn TerrainGenerator>,
    persistence: Option<Arc<dyn ChunkPersistence>>,
    generation_failures: AtomicUsize,
}

/// A world position split into its chunk and the local position inside it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockLocation {
    /// Chunk containing the block.
    pub chunk: ChunkCoordinate,
    /// Local X inside the chunk.
    pub x: usize,
    /// Y, identical in world and chunk space.
    pub y: usize,
    /// Local Z inside the chunk.
    pub z: usize,
}

impl BlockLocation {
    /// Splits a world position. `None` if `world_y` is outside the world height.
    pub fn from_world(world_x: i32, world_y: i32, world_z: i32) -> Option<Self> {
        if !(0..WORLD_HEIGHT as i32).contains(&world_y) {
            return None;
        }
        let dimension = CHUNK_DIMENSION as i32;
        Some(BlockLocation {
            chunk: ChunkCoordinate::containing(world_x, world_z),
            x: world_x.rem_euclid(dimension) as usize,
            y: world_y as usize,
            z: world_z.rem_euclid(dimension) as usize,
        })
    }

    /// The chunk faces this block touches, i.e. neighbors whose edge meshing sees it.
    pub fn touched_edges(&self) -> impl Iterator<Item = BlockSide> {
        let last = CHUNK_DIMENSION - 1;
        [
            (self.x == 0, BlockSide::FRONT),
            (self.x == last, BlockSide::BACK),
            (self.z == 0, BlockSide::LEFT),
            (self.z == last, BlockSide::RIGHT),
        ]
        .into_iter()
        .filter_map(|(touches, side)| touches.then_some(side))
    }
}

impl World {
    /// Creates an empty world backed by a terrain generator.
    pub fn new(generator: Arc<dyn TerrainGenerator>) -> Self {
        World {
            chunks: DashMap::new(),
            generator,
            persistence: None,
            generation_failures: AtomicUsize::new(0),
        }
    }

    /// Attaches a persistence layer consulted before generating a chunk.
    pub fn with_persistence(mut self, persistence: Arc<dyn ChunkPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// The attached persistence layer, if any.
    pub fn persistence(&self) -> Option<&Arc<dyn ChunkPersistence>> {
        self.persistence.as_ref()
    }

    /// The loaded chunk at `coordinate`, if any.
    pub fn get(&self, coordinate: ChunkCoordinate) -> Option<Arc<Chunk>> {
        self.chunks.get(&coordinate).map(|entry| entry.value().clone())
    }

    /// Whether a chunk is loaded.
    pub fn contains(&self, coordinate: ChunkCoordinate) -> bool {
        self.chunks.contains_key(&coordinate)
    }

    /// The chunk at `coordinate`, loading or generating it if absent.
    ///
    /// If two callers race on the same coordinate both may generate, but only the first
    /// insert is kept and both receive that chunk.
    pub fn get_or_create(&self, coordinate: ChunkCoordinate) -> Result<Arc<Chunk>, GenerationError> {
        if let Some(chunk) = self.get(coordinate) {
            return Ok(chunk);
        }

        let chunk = match self.create_chunk(coordinate) {
            Ok(chunk) => chunk,
            Err(err) => {
                self.generation_failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("{err}; chunk {coordinate:?} left unloaded");
                return Err(err);
            }
        };

        let chunk = self
            .chunks
            .entry(coordinate)
            .or_insert_with(|| Arc::new(chunk))
            .value()
            .clone();
        Ok(chunk)
    }

    fn create_chunk(&self, coordinate: ChunkCoordinate) -> Result<Chunk, GenerationError> {
        if let Some(stored) = self
            .persistence
            .as_ref()
            .and_then(|persistence| persistence.load_chunk(coordinate))
        {
            log::trace!("chunk {coordinate:?} restored from storage");
            return Ok(Chunk::restored(coordinate, stored.blocks));
        }

        let volume = self.generator.generate_bare(coordinate)?;
        if volume.len() != CHUNK_VOLUME {
            return Err(GenerationError::InvalidVolume {
                coordinate,
                expected: CHUNK_VOLUME,
                actual: volume.len(),
            });
        }
        Ok(Chunk::generated(coordinate, volume))
    }

    /// Removes a chunk from the world, returning it.
    pub fn remove(&self, coordinate: ChunkCoordinate) -> Option<Arc<Chunk>> {
        self.chunks.remove(&coordinate).map(|(_, chunk)| chunk)
    }

    /// A copy of every loaded chunk handle, safe to iterate while the map changes.
    pub fn snapshot_values(&self) -> Vec<Arc<Chunk>> {
        self.chunks
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of loaded chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunks are loaded.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// How many generations have failed since the world was created.
    pub fn generation_failures(&self) -> usize {
        self.generation_failures.load(Ordering::Relaxed)
    }

    /// Runs the decoration pass for a chunk unless it already ran.
    ///
    /// The chunk is claimed before the generator runs, so population never repeats even
    /// if it fails part way. On success the chunk is sent back to UNMESHED since its
    /// blocks changed.
    pub fn populate_features(&self, chunk: &Chunk) -> Result<bool, GenerationError> {
        if !chunk.mark_features_populated() {
            return Ok(false);
        }
        self.generator
            .populate_features(chunk.coordinate(), self)
            .inspect_err(|err| log::warn!("{err}; decoration skipped"))?;
        chunk.mark_dirty();
        chunk.transition(MeshEvent::Invalidate);
        Ok(true)
    }

    /// The chunk at chunk coordinates `(x, z)`, creating it if absent.
    pub fn get_chunk_at(&self, x: i32, z: i32) -> Result<Arc<Chunk>, GenerationError> {
        self.get_or_create(ChunkCoordinate::new(x, z))
    }

    /// Block at a world position. Out-of-height positions and chunks that fail to
    /// generate read as `AIR`.
    pub fn get_block_at(&self, world_x: i32, world_y: i32, world_z: i32) -> BlockType {
        let Some(location) = BlockLocation::from_world(world_x, world_y, world_z) else {
            return BlockType::AIR;
        };
        match self.get_or_create(location.chunk) {
            Ok(chunk) => chunk.block_at(location.x, location.y, location.z),
            Err(_) => BlockType::AIR,
        }
    }

    /// Writes a block at a world position, creating its chunk if needed.
    ///
    /// Returns `false` if `world_y` is out of bounds or the chunk cannot be generated.
    /// Otherwise the chunk, and any neighbor sharing the touched face, is sent back to
    /// UNMESHED. Their last uploaded meshes stay on screen until replacements land.
    pub fn set_block_at(&self, world_x: i32, world_y: i32, world_z: i32, block_type: BlockType) -> bool {
        let Some(location) = BlockLocation::from_world(world_x, world_y, world_z) else {
            return false;
        };
        let Ok(chunk) = self.get_or_create(location.chunk) else {
            return false;
        };
        self.write_block(&chunk, location, block_type);
        true
    }

    fn write_block(&self, chunk: &Chunk, location: BlockLocation, block_type: BlockType) {
        chunk.set_block(location.x, location.y, location.z, block_type);
        chunk.transition(MeshEvent::Invalidate);
        for side in location.touched_edges() {
            if let Some(neighbor) = self.get(location.chunk.neighbor(side)) {
                neighbor.transition(MeshEvent::Invalidate);
            }
        }
    }

    /// Loaded chunks within Chebyshev distance `radius` of `center`.
    pub fn chunks_within(&self, center: ChunkCoordinate, radius: i32) -> HashMap<ChunkCoordinate, Arc<Chunk>> {
        let mut chunks = HashMap::new();
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let coordinate = center.offset(dx, dz);
                if let Some(chunk) = self.get(coordinate) {
                    chunks.insert(coordinate, chunk);
                }
            }
        }
        chunks
    }

    /// Hands every dirty chunk to `persistence` and marks it clean.
    pub fn save_dirty_chunks(&self, persistence: &dyn ChunkPersistence) -> usize {
        let mut saved = 0;
        for chunk in self.snapshot_values() {
            if save_if_dirty(&chunk, persistence) {
                saved += 1;
            }
        }
        if saved > 0 {
            log::debug!("saved {saved} dirty chunks");
        }
        saved
    }
}

/// Saves one chunk if dirty. Returns whether it was saved.
pub fn save_if_dirty(chunk: &Chunk, persistence: &dyn ChunkPersistence) -> bool {
    if !chunk.take_dirty() {
        return false;
    }
    let data = ChunkData {
        blocks: chunk.snapshot_blocks(),
    };
    persistence.save_chunk(chunk.coordinate(), data);
    true
}

impl BlockAccess for World {
    fn block_at(&self, world_x: i32, world_y: i32, world_z: i32) -> BlockType {
        BlockLocation::from_world(world_x, world_y, world_z)
            .and_then(|location| {
                self.get(location.chunk)
                    .map(|chunk| chunk.block_at(location.x, location.y, location.z))
            })
            .unwrap_or(BlockType::AIR)
    }

    fn place_block(&self, world_x: i32, world_y: i32, world_z: i32, block_type: BlockType) -> bool {
        let Some(location) = BlockLocation::from_world(world_x, world_y, world_z) else {
            return false;
        };
        let Some(chunk) = self.get(location.chunk) else {
            log::trace!("feature write into unloaded chunk {:?} dropped", location.chunk);
            return false;
        };
        self.write_block(&chunk, location, block_type);
        true
    }
}
