//! Task for building a chunk's mesh on a worker thread.
//!
//! The task owns a handle to the chunk and to whichever horizontal neighbors were
//! resident when it was submitted. On the worker it
//! 1. moves the chunk from QUEUED to BUILDING,
//! 2. copies its own volume and the neighbors' touching layers, then runs the mesh
//!    builder on the copies, catching panics,
//! 3. records the outcome on the chunk, pushing it to the upload queue on success.
//!
//! Step 3 always runs, so a chunk never stays BUILDING after its task returns.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::engine_state::{
    rendering::{
        meshing::{MeshBuilder, MeshData, NeighborEdges},
        upload_queue::UploadQueue,
    },
    task_management::task::{panic_message, Task, TaskContext, TaskResult},
    voxels::{
        block::block_side::BlockSide,
        chunk::{
            mesh_state::{MeshEvent, MeshState},
            Chunk, ChunkCoordinate,
        },
    },
};
use crate::error::MeshBuildError;

/// Builds mesh data for one chunk.
pub struct ChunkMeshGenerationTask {
    chunk: Arc<Chunk>,
    neighbors: Vec<(BlockSide, Arc<Chunk>)>,
    builder: Arc<dyn MeshBuilder>,
    upload_queue: Arc<UploadQueue>,
}

impl ChunkMeshGenerationTask {
    /// Creates a task for a QUEUED chunk.
    ///
    /// # Arguments
    ///
    /// * `chunk` - The chunk to mesh
    /// * `neighbors` - Resident horizontal neighbors, keyed by the side they touch
    /// * `builder` - Produces the mesh from the block copies
    /// * `upload_queue` - Receives the chunk when its mesh is ready
    pub fn new(
        chunk: Arc<Chunk>,
        neighbors: Vec<(BlockSide, Arc<Chunk>)>,
        builder: Arc<dyn MeshBuilder>,
        upload_queue: Arc<UploadQueue>,
    ) -> Self {
        ChunkMeshGenerationTask {
            chunk,
            neighbors,
            builder,
            upload_queue,
        }
    }

    fn build(&self) -> Result<MeshData, MeshBuildError> {
        let coordinate = self.chunk.coordinate();
        panic::catch_unwind(AssertUnwindSafe(|| {
            let edges = NeighborEdges::capture(|side| {
                self.neighbors
                    .iter()
                    .find(|(neighbor_side, _)| *neighbor_side == side)
                    .map(|(_, chunk)| chunk.clone())
            });
            // Copy so edits on the main thread never wait for a build.
            let blocks = self.chunk.snapshot_blocks();
            self.builder.build(coordinate, &blocks, &edges)
        }))
        .unwrap_or_else(|payload| {
            Err(MeshBuildError::Panicked {
                coordinate,
                message: panic_message(payload.as_ref()),
            })
        })
    }
}

/// How a build ended.
#[derive(Debug)]
pub enum BuildOutcome {
    /// Mesh data is waiting in the upload queue.
    Ready,
    /// The chunk was edited or evicted mid-build; the mesh was thrown away.
    Discarded,
    /// The chunk was no longer QUEUED when the worker picked it up.
    Skipped,
    /// The builder failed.
    Failed {
        /// What went wrong.
        error: MeshBuildError,
        /// Failures in a row for this chunk, including this one.
        consecutive_failures: u32,
    },
}

impl Task for ChunkMeshGenerationTask {
    fn process(&self) -> Box<dyn TaskResult> {
        let coordinate = self.chunk.coordinate();
        let outcome = if !self
            .chunk
            .transition(MeshEvent::BeginBuild)
            .reached(MeshState::Building)
        {
            BuildOutcome::Skipped
        } else {
            match self.build() {
                Ok(mesh) => {
                    let transition = self.chunk.complete_build(Some(mesh), || {
                        self.upload_queue.enqueue(self.chunk.clone());
                    });
                    if transition.reached(MeshState::ReadyForUpload) {
                        BuildOutcome::Ready
                    } else {
                        BuildOutcome::Discarded
                    }
                }
                Err(error) => {
                    let transition = self.chunk.complete_build(None, || {});
                    if transition.accepted() && !self.chunk.is_evicted() {
                        BuildOutcome::Failed {
                            error,
                            consecutive_failures: self.chunk.consecutive_failures(),
                        }
                    } else {
                        BuildOutcome::Discarded
                    }
                }
            }
        };
        Box::new(ChunkMeshGenerationTaskResult {
            coordinate,
            outcome,
        })
    }

    fn chunk_coordinate(&self) -> Option<ChunkCoordinate> {
        Some(self.chunk.coordinate())
    }
}

/// The result of a [`ChunkMeshGenerationTask`].
pub struct ChunkMeshGenerationTaskResult {
    /// The chunk that was built.
    pub coordinate: ChunkCoordinate,
    /// How the build ended.
    pub outcome: BuildOutcome,
}

impl TaskResult for ChunkMeshGenerationTaskResult {
    /// Records the outcome. A failure sends the four neighbors back to UNMESHED, unless
    /// this chunk has failed more than `max_repair_cascade` times in a row.
    fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task>> {
        let coordinate = self.coordinate;
        match self.outcome {
            BuildOutcome::Ready => context.stats.meshes_built += 1,
            BuildOutcome::Skipped => context.stats.builds_skipped += 1,
            BuildOutcome::Discarded => {
                context.stats.builds_discarded += 1;
                if let Some(chunk) = context.world.get(coordinate) {
                    context.scheduler.conditionally_schedule(&chunk);
                }
            }
            BuildOutcome::Failed {
                error,
                consecutive_failures,
            } => {
                context.stats.build_failures += 1;
                log::warn!("{error} (failure {consecutive_failures} in a row)");
                if consecutive_failures > context.max_repair_cascade {
                    log::debug!("chunk {coordinate:?}: neighbor repair suppressed");
                    return Vec::new();
                }
                for (_, neighbor) in coordinate.neighbors() {
                    let Some(neighbor) = context.world.get(neighbor) else {
                        continue;
                    };
                    if neighbor.transition(MeshEvent::Invalidate).accepted() {
                        context.stats.neighbor_repairs += 1;
                    }
                    if neighbor.features_populated() {
                        context.scheduler.conditionally_schedule(&neighbor);
                    }
                }
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{channel, Receiver, Sender};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::engine_state::rendering::meshing::CulledMesher;
    use crate::engine_state::rendering::scheduler::MeshBuildScheduler;
    use crate::engine_state::voxels::block::block_type::BlockType;
    use crate::engine_state::voxels::chunk::volume::BlockVolume;
    use crate::engine_state::voxels::generation::FlatTerrainGenerator;
    use crate::engine_state::voxels::world::World;
    use crate::engine_state::EngineStats;

    /// Parks inside `build` until the test lets it go.
    struct GatedBuilder {
        started: Mutex<Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl MeshBuilder for GatedBuilder {
        fn build(
            &self,
            coordinate: ChunkCoordinate,
            blocks: &BlockVolume,
            neighbors: &NeighborEdges,
        ) -> Result<MeshData, MeshBuildError> {
            let _ = self.started.lock().unwrap().send(());
            if self
                .release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(10))
                .is_err()
            {
                return Err(MeshBuildError::Builder {
                    coordinate,
                    reason: "never released".into(),
                });
            }
            CulledMesher.build(coordinate, blocks, neighbors)
        }
    }

    fn queued_task(
        world: &World,
        builder: Arc<dyn MeshBuilder>,
        queue: &Arc<UploadQueue>,
    ) -> ChunkMeshGenerationTask {
        let chunk = world.get_chunk_at(0, 0).unwrap();
        assert!(chunk.transition(MeshEvent::Schedule).accepted());
        ChunkMeshGenerationTask::new(chunk, Vec::new(), builder, queue.clone())
    }

    fn handle(world: &World, result: Box<dyn TaskResult>) -> EngineStats {
        let scheduler = MeshBuildScheduler::new();
        let mut stats = EngineStats::default();
        let mut context = TaskContext {
            world,
            scheduler: &scheduler,
            max_repair_cascade: 3,
            stats: &mut stats,
        };
        assert!(result.handle_result(&mut context).is_empty());
        stats
    }

    #[test]
    fn successful_build_is_queued_for_upload() {
        let world = World::new(Arc::new(FlatTerrainGenerator::default()));
        let queue = Arc::new(UploadQueue::new());
        let task = queued_task(&world, Arc::new(CulledMesher), &queue);

        let stats = handle(&world, task.process());
        assert_eq!(stats.meshes_built, 1);
        assert!(queue.contains(ChunkCoordinate::new(0, 0)));
        assert_eq!(
            world.get_chunk_at(0, 0).unwrap().state(),
            MeshState::ReadyForUpload
        );
    }

    #[test]
    fn task_for_a_chunk_no_longer_queued_is_skipped() {
        let world = World::new(Arc::new(FlatTerrainGenerator::default()));
        let queue = Arc::new(UploadQueue::new());
        let task = queued_task(&world, Arc::new(CulledMesher), &queue);
        task.chunk.transition(MeshEvent::Evict);

        let stats = handle(&world, task.process());
        assert_eq!(stats.builds_skipped, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn edits_do_not_wait_for_a_running_build() {
        let world = World::new(Arc::new(FlatTerrainGenerator::default()));
        let queue = Arc::new(UploadQueue::new());
        let (started_tx, started_rx) = channel();
        let (release_tx, release_rx) = channel();
        let builder = Arc::new(GatedBuilder {
            started: Mutex::new(started_tx),
            release: Mutex::new(release_rx),
        });
        let task = queued_task(&world, builder, &queue);
        let chunk = task.chunk.clone();

        let result = thread::scope(|scope| {
            let worker = scope.spawn(|| task.process());
            started_rx.recv_timeout(Duration::from_secs(10)).unwrap();
            assert_eq!(chunk.state(), MeshState::Building);

            // Returns while the builder is still parked.
            assert!(world.set_block_at(3, 100, 3, BlockType::STONE));
            assert_eq!(chunk.block_at(3, 100, 3), BlockType::STONE);
            release_tx.send(()).unwrap();
            worker.join().unwrap()
        });

        // The build saw the old content, so it is thrown away and rescheduled.
        let stats = handle(&world, result);
        assert_eq!(stats.builds_discarded, 1);
        assert_eq!(stats.build_failures, 0);
        assert!(queue.is_empty());
        assert_eq!(chunk.state(), MeshState::Queued);
    }
}
