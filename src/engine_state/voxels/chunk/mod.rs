//! # Chunk Module
//!
//! A chunk is a `16 × WORLD_HEIGHT × 16` column of blocks, the unit of generation,
//! meshing, upload and eviction.
//!
//! ## Locking
//!
//! Each chunk carries two independent locks:
//! - the block volume (`MtResource`, read-write) so mesh workers can read while the
//!   main thread edits a different chunk, and
//! - the mesh status (`parking_lot::Mutex`) which guards the state machine in
//!   [`mesh_state`] and the built-but-not-uploaded mesh data.
//!
//! There is no world-wide lock; meshing chunk A never contends with editing chunk B.
//! When both locks are needed the status lock is never held while taking the volume lock.

use cgmath::Point3;
use parking_lot::{Mutex, RwLockReadGuard};
use serde::{Deserialize, Serialize};

use crate::core::MtResource;
use crate::engine_state::rendering::meshing::MeshData;

use self::mesh_state::{ChunkStatus, MeshEvent, MeshState, Transition};
use self::volume::BlockVolume;
use super::block::{block_side::BlockSide, block_type::BlockType};

pub mod mesh_state;
pub mod volume;

/// The width and depth of a chunk in blocks.
pub const CHUNK_DIMENSION: usize = 16;
/// The height of the world, and of every chunk, in blocks.
pub const WORLD_HEIGHT: usize = 128;
/// The number of blocks in one horizontal layer of a chunk.
pub const CHUNK_LAYER_SIZE: usize = CHUNK_DIMENSION * CHUNK_DIMENSION;
/// The total number of blocks in a chunk.
pub const CHUNK_VOLUME: usize = CHUNK_LAYER_SIZE * WORLD_HEIGHT;

/// Identifies a chunk in chunk space (not block space).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoordinate {
    /// Chunk index along the world X axis.
    pub x: i32,
    /// Chunk index along the world Z axis.
    pub z: i32,
}

impl ChunkCoordinate {
    /// Creates a chunk coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        ChunkCoordinate { x, z }
    }

    /// The chunk containing a world block column.
    pub fn containing(world_x: i32, world_z: i32) -> Self {
        let dimension = CHUNK_DIMENSION as i32;
        ChunkCoordinate::new(world_x.div_euclid(dimension), world_z.div_euclid(dimension))
    }

    /// Chebyshev (square) distance between two chunks.
    pub fn chebyshev_distance(self, other: ChunkCoordinate) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }

    /// The coordinate offset by whole chunks.
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        ChunkCoordinate::new(self.x + dx, self.z + dz)
    }

    /// The chunk across a face. Vertical faces return `self`; chunks span the full height.
    pub fn neighbor(self, side: BlockSide) -> Self {
        let normal = side.normal();
        self.offset(normal.x, normal.z)
    }

    /// The four axis-aligned neighbors, paired with the face they sit across.
    pub fn neighbors(self) -> [(BlockSide, ChunkCoordinate); 4] {
        BlockSide::horizontal().map(|side| (side, self.neighbor(side)))
    }

    /// World position of the chunk's (0, 0, 0) block.
    pub fn origin(self) -> Point3<i32> {
        let dimension = CHUNK_DIMENSION as i32;
        Point3::new(self.x * dimension, 0, self.z * dimension)
    }
}

/// Point-in-time copy of a chunk's flags, for diagnostics and assertions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkFlags {
    /// Current mesh state.
    pub state: MeshState,
    /// A mesh has reached the graphics context at least once.
    pub mesh_generated: bool,
    /// Built mesh data is current (waiting for upload or uploaded).
    pub data_ready_for_gl: bool,
    /// A build is queued or running.
    pub mesh_build_in_flight: bool,
    /// The decoration pass has run.
    pub features_populated: bool,
    /// Content changed since last persisted.
    pub dirty: bool,
}

struct ChunkInner {
    status: ChunkStatus,
    pending_mesh: Option<MeshData>,
}

/// One column of the voxel world plus its mesh pipeline state.
///
/// Chunks are owned by the [`World`](crate::engine_state::voxels::world::World) and handed
/// out as `Arc<Chunk>` for transient use.
pub struct Chunk {
    coordinate: ChunkCoordinate,
    blocks: MtResource<BlockVolume>,
    inner: Mutex<ChunkInner>,
}

impl Chunk {
    /// A chunk fresh from the terrain generator.
    pub fn generated(coordinate: ChunkCoordinate, volume: BlockVolume) -> Self {
        Self::with_status(coordinate, volume, ChunkStatus::generated())
    }

    /// A chunk restored from storage. Its features are already baked into the volume.
    pub fn restored(coordinate: ChunkCoordinate, volume: BlockVolume) -> Self {
        Self::with_status(coordinate, volume, ChunkStatus::restored())
    }

    fn with_status(coordinate: ChunkCoordinate, volume: BlockVolume, status: ChunkStatus) -> Self {
        Chunk {
            coordinate,
            blocks: MtResource::new(volume),
            inner: Mutex::new(ChunkInner {
                status,
                pending_mesh: None,
            }),
        }
    }

    /// This chunk's coordinate.
    pub fn coordinate(&self) -> ChunkCoordinate {
        self.coordinate
    }

    /// Read access to the block volume.
    pub fn blocks(&self) -> RwLockReadGuard<'_, BlockVolume> {
        self.blocks.get()
    }

    /// A copy of the block volume, e.g. for an asynchronous save.
    pub fn snapshot_blocks(&self) -> BlockVolume {
        self.blocks.get().clone()
    }

    /// Block type at a local position.
    pub fn block_at(&self, x: usize, y: usize, z: usize) -> BlockType {
        self.blocks.get().get(x, y, z)
    }

    /// Overwrites a block at a local position and marks the chunk dirty when it changed.
    ///
    /// This does not touch mesh state; callers decide what to invalidate.
    pub fn set_block(&self, x: usize, y: usize, z: usize, block_type: BlockType) -> BlockType {
        let previous = self.blocks.get_mut().set(x, y, z, block_type);
        if previous != block_type {
            self.inner.lock().status.set_dirty(true);
        }
        previous
    }

    /// Feeds an event to the state machine.
    pub fn transition(&self, event: MeshEvent) -> Transition {
        let mut inner = self.inner.lock();
        let transition = inner.status.apply(event);
        if matches!(event, MeshEvent::Invalidate | MeshEvent::Evict) {
            inner.pending_mesh = None;
        }
        log::trace!("chunk {:?}: {:?} -> {:?}", self.coordinate, event, transition);
        transition
    }

    /// Finishes a build. On success the mesh is stored and `on_ready` runs while the
    /// status lock is still held, so an eviction cannot slip in between.
    pub fn complete_build(&self, mesh: Option<MeshData>, on_ready: impl FnOnce()) -> Transition {
        let mut inner = self.inner.lock();
        let event = if mesh.is_some() {
            MeshEvent::BuildSucceeded
        } else {
            MeshEvent::BuildFailed
        };
        let transition = inner.status.apply(event);
        if transition.reached(MeshState::ReadyForUpload) {
            inner.pending_mesh = mesh;
            on_ready();
        }
        log::trace!("chunk {:?}: {:?} -> {:?}", self.coordinate, event, transition);
        transition
    }

    /// Hands out the mesh data of a READY_FOR_UPLOAD chunk.
    ///
    /// The state does not move until [`Chunk::finish_upload`] reports what the graphics
    /// context did with it, so a rejected first upload never counts as generated.
    ///
    /// # Returns
    ///
    /// `None` if the chunk is no longer ready (invalidated or evicted since it was queued
    /// for upload) or its data was already taken.
    pub fn take_mesh_for_upload(&self) -> Option<MeshData> {
        let mut inner = self.inner.lock();
        if inner.status.state() != MeshState::ReadyForUpload {
            return None;
        }
        inner.pending_mesh.take()
    }

    /// Settles the chunk after its mesh reached the graphics context, or sends it back
    /// to UNMESHED when the context rejected it.
    pub fn finish_upload(&self, uploaded: bool) -> Transition {
        self.transition(if uploaded {
            MeshEvent::Uploaded
        } else {
            MeshEvent::UploadFailed
        })
    }

    /// Records that the decoration pass ran. Returns `false` if it already had.
    pub fn mark_features_populated(&self) -> bool {
        self.inner.lock().status.mark_features_populated()
    }

    /// Marks the content as changed since last persisted.
    pub fn mark_dirty(&self) {
        self.inner.lock().status.set_dirty(true);
    }

    /// Clears the dirty bit, returning whether it was set.
    ///
    /// A save clears the bit before it copies the volume, so an edit landing while the
    /// copy is taken sets it again and is picked up by the next save.
    pub fn take_dirty(&self) -> bool {
        self.inner.lock().status.take_dirty()
    }

    /// Snapshot of all flags.
    pub fn flags(&self) -> ChunkFlags {
        let inner = self.inner.lock();
        let status = &inner.status;
        ChunkFlags {
            state: status.state(),
            mesh_generated: status.mesh_generated(),
            data_ready_for_gl: status.data_ready_for_gl(),
            mesh_build_in_flight: status.mesh_build_in_flight(),
            features_populated: status.features_populated(),
            dirty: status.is_dirty(),
        }
    }

    /// Current mesh state.
    pub fn state(&self) -> MeshState {
        self.inner.lock().status.state()
    }

    /// Whether the uploaded mesh reflects the current block content.
    pub fn is_settled(&self) -> bool {
        self.state() == MeshState::Settled
    }

    /// Whether a mesh has reached the graphics context at least once.
    pub fn mesh_generated(&self) -> bool {
        self.inner.lock().status.mesh_generated()
    }

    /// Whether built mesh data is current.
    pub fn data_ready_for_gl(&self) -> bool {
        self.inner.lock().status.data_ready_for_gl()
    }

    /// Whether a build is queued or running.
    pub fn mesh_build_in_flight(&self) -> bool {
        self.inner.lock().status.mesh_build_in_flight()
    }

    /// Whether the decoration pass has run.
    pub fn features_populated(&self) -> bool {
        self.inner.lock().status.features_populated()
    }

    /// Whether the content changed since last persisted.
    pub fn is_dirty(&self) -> bool {
        self.inner.lock().status.is_dirty()
    }

    /// Whether the chunk has been evicted from the world.
    pub fn is_evicted(&self) -> bool {
        self.inner.lock().status.is_evicted()
    }

    /// Failed builds since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().status.consecutive_failures()
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coordinate", &self.coordinate)
            .field("flags", &self.flags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containing_floors_negative_coordinates() {
        assert_eq!(ChunkCoordinate::containing(0, 15), ChunkCoordinate::new(0, 0));
        assert_eq!(ChunkCoordinate::containing(-1, 16), ChunkCoordinate::new(-1, 1));
        assert_eq!(ChunkCoordinate::containing(-16, -17), ChunkCoordinate::new(-1, -2));
    }

    #[test]
    fn chebyshev_distance_is_the_larger_axis() {
        let origin = ChunkCoordinate::new(0, 0);
        assert_eq!(origin.chebyshev_distance(ChunkCoordinate::new(3, -1)), 3);
        assert_eq!(origin.chebyshev_distance(ChunkCoordinate::new(-2, -2)), 2);
    }

    #[test]
    fn neighbors_cover_the_four_axes() {
        let coordinate = ChunkCoordinate::new(4, -7);
        let neighbors: Vec<_> = coordinate.neighbors().iter().map(|(_, c)| *c).collect();
        assert!(neighbors.contains(&ChunkCoordinate::new(3, -7)));
        assert!(neighbors.contains(&ChunkCoordinate::new(5, -7)));
        assert!(neighbors.contains(&ChunkCoordinate::new(4, -8)));
        assert!(neighbors.contains(&ChunkCoordinate::new(4, -6)));
        assert_eq!(coordinate.neighbor(BlockSide::TOP), coordinate);
    }

    #[test]
    fn set_block_marks_dirty_only_on_change() {
        let chunk = Chunk::restored(ChunkCoordinate::new(0, 0), BlockVolume::empty());
        chunk.set_block(0, 0, 0, BlockType::AIR);
        assert!(!chunk.is_dirty());
        chunk.set_block(0, 0, 0, BlockType::STONE);
        assert!(chunk.is_dirty());
        assert!(chunk.take_dirty());
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn complete_build_runs_ready_hook_only_on_success() {
        let chunk = Chunk::generated(ChunkCoordinate::new(0, 0), BlockVolume::empty());
        chunk.transition(MeshEvent::Schedule);
        chunk.transition(MeshEvent::BeginBuild);
        let mut ran = false;
        chunk.complete_build(None, || ran = true);
        assert!(!ran);
        assert_eq!(chunk.state(), MeshState::Unmeshed);

        chunk.transition(MeshEvent::Schedule);
        chunk.transition(MeshEvent::BeginBuild);
        chunk.complete_build(Some(MeshData::default()), || ran = true);
        assert!(ran);
        assert!(chunk.take_mesh_for_upload().is_some());
        assert_eq!(chunk.state(), MeshState::ReadyForUpload);
        assert!(chunk.take_mesh_for_upload().is_none());
        assert!(chunk.finish_upload(true).reached(MeshState::Settled));
        assert!(chunk.mesh_generated());
    }

    #[test]
    fn rejected_first_upload_is_not_generated() {
        let chunk = Chunk::generated(ChunkCoordinate::new(0, 0), BlockVolume::empty());
        chunk.transition(MeshEvent::Schedule);
        chunk.transition(MeshEvent::BeginBuild);
        chunk.complete_build(Some(MeshData::default()), || {});
        assert!(chunk.take_mesh_for_upload().is_some());
        assert!(chunk.finish_upload(false).reached(MeshState::Unmeshed));
        assert!(!chunk.mesh_generated());
        assert!(!chunk.data_ready_for_gl());
    }
}
