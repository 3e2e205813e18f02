//! # Persistence Seam
//!
//! The on-disk format lives outside this crate. The streaming core only needs to
//! - ask a save layer for stored content before generating a chunk from scratch, and
//! - hand dirty chunks to the save layer and mark them clean.
//!
//! [`InMemoryChunkStorage`] is a process-local implementation used by the headless
//! driver and the tests.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::chunk::{volume::BlockVolume, ChunkCoordinate};

/// Stored content of one chunk. Features are already baked into the volume.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkData {
    /// The chunk's blocks.
    pub blocks: BlockVolume,
}

/// A save layer the world can load from and flush to.
pub trait ChunkPersistence: Send + Sync {
    /// Stored content for a chunk, if any. `None` means "generate it".
    fn load_chunk(&self, coordinate: ChunkCoordinate) -> Option<ChunkData>;

    /// Stores a chunk's content, replacing any previous copy.
    fn save_chunk(&self, coordinate: ChunkCoordinate, data: ChunkData);
}

/// Keeps saved chunks in a map.
#[derive(Default)]
pub struct InMemoryChunkStorage {
    chunks: Mutex<HashMap<ChunkCoordinate, ChunkData>>,
}

impl InMemoryChunkStorage {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saved chunks.
    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Whether nothing has been saved.
    pub fn is_empty(&self) -> bool {
        self.chunks.lock().is_empty()
    }

    /// Whether a chunk has been saved.
    pub fn contains(&self, coordinate: ChunkCoordinate) -> bool {
        self.chunks.lock().contains_key(&coordinate)
    }
}

impl ChunkPersistence for InMemoryChunkStorage {
    fn load_chunk(&self, coordinate: ChunkCoordinate) -> Option<ChunkData> {
        self.chunks.lock().get(&coordinate).cloned()
    }

    fn save_chunk(&self, coordinate: ChunkCoordinate, data: ChunkData) {
        self.chunks.lock().insert(coordinate, data);
    }
}
