//! # Mesh Build Scheduler
//!
//! Collects chunks that need a mesh and hands them to the worker pool once per tick.
//!
//! Scheduling is idempotent: a chunk enters the pending set only by winning the
//! UNMESHED to QUEUED transition under its own lock, so concurrent callers can never
//! queue it twice. Draining takes the whole pending set at once; chunks scheduled while
//! a drain is being submitted wait for the next tick.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine_state::{
    rendering::{
        meshing::MeshBuilder, tasks::ChunkMeshGenerationTask, upload_queue::UploadQueue,
    },
    task_management::TaskManager,
    voxels::{
        chunk::{
            mesh_state::{MeshEvent, MeshState},
            Chunk, ChunkCoordinate,
        },
        world::World,
    },
};

/// Chunks waiting to be submitted for meshing.
#[derive(Default)]
pub struct MeshBuildScheduler {
    pending: Mutex<HashMap<ChunkCoordinate, Arc<Chunk>>>,
}

impl MeshBuildScheduler {
    /// An empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `chunk` for meshing unless it is settled, waiting for upload, already
    /// queued or building, or evicted. Returns whether it was queued.
    pub fn conditionally_schedule(&self, chunk: &Arc<Chunk>) -> bool {
        if !chunk.transition(MeshEvent::Schedule).reached(MeshState::Queued) {
            return false;
        }
        self.pending.lock().insert(chunk.coordinate(), chunk.clone());
        true
    }

    /// Takes the pending set, leaving it empty.
    pub fn drain_pending(&self) -> Vec<Arc<Chunk>> {
        mem::take(&mut *self.pending.lock()).into_values().collect()
    }

    /// Drops a chunk from the pending set. Returns whether it was pending.
    pub fn remove(&self, coordinate: ChunkCoordinate) -> bool {
        self.pending.lock().remove(&coordinate).is_some()
    }

    /// Whether a chunk is pending.
    pub fn is_pending(&self, coordinate: ChunkCoordinate) -> bool {
        self.pending.lock().contains_key(&coordinate)
    }

    /// Number of pending chunks.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Drains the pending set into build tasks.
    ///
    /// # Arguments
    ///
    /// * `world` - Source of the neighbor chunks each build reads edges from
    /// * `task_manager` - The worker pool running the builds
    /// * `builder` - Mesher shared by every task
    /// * `upload_queue` - Where finished chunks are queued
    ///
    /// # Returns
    ///
    /// How many tasks were submitted.
    pub fn submit_pending(
        &self,
        world: &World,
        task_manager: &mut TaskManager,
        builder: &Arc<dyn MeshBuilder>,
        upload_queue: &Arc<UploadQueue>,
    ) -> usize {
        let pending = self.drain_pending();
        let submitted = pending.len();
        for chunk in pending {
            let neighbors = chunk
                .coordinate()
                .neighbors()
                .into_iter()
                .filter_map(|(side, coordinate)| world.get(coordinate).map(|n| (side, n)))
                .collect();
            task_manager.publish_task(Box::new(ChunkMeshGenerationTask::new(
                chunk,
                neighbors,
                builder.clone(),
                upload_queue.clone(),
            )));
        }
        if submitted > 0 {
            log::debug!("submitted {submitted} mesh builds");
        }
        submitted
    }
}
