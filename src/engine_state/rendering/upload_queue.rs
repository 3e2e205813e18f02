//! Handoff of finished meshes from worker threads to the graphics thread.
//!
//! Workers push chunks as their builds complete. The thread that owns the graphics
//! context drains a bounded number per tick, so a burst of finished builds is spread
//! over several frames instead of stalling one.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::engine_state::{
    buffer_state::GraphicsContext,
    voxels::chunk::{Chunk, ChunkCoordinate},
};
use crate::error::UploadError;

/// What one drain did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Meshes accepted by the graphics context.
    pub uploaded: usize,
    /// Meshes the graphics context rejected.
    pub failed: usize,
    /// Entries whose chunk was invalidated or evicted after being queued.
    pub stale: usize,
    /// Entries left for later ticks.
    pub remaining: usize,
}

#[derive(Default)]
struct Queue {
    order: VecDeque<Arc<Chunk>>,
    queued: HashSet<ChunkCoordinate>,
}

/// Chunks whose mesh data is ready for upload, in completion order.
pub struct UploadQueue {
    queue: Mutex<Queue>,
    owner: ThreadId,
}

impl UploadQueue {
    /// A queue owned by the calling thread, which must be the graphics thread.
    pub fn new() -> Self {
        UploadQueue {
            queue: Mutex::new(Queue::default()),
            owner: thread::current().id(),
        }
    }

    /// Adds a chunk. Safe from any thread. Returns `false` if it was already queued.
    pub fn enqueue(&self, chunk: Arc<Chunk>) -> bool {
        let mut queue = self.queue.lock();
        if !queue.queued.insert(chunk.coordinate()) {
            return false;
        }
        queue.order.push_back(chunk);
        true
    }

    /// Drops a chunk from the queue, e.g. because it is being evicted.
    pub fn remove(&self, coordinate: ChunkCoordinate) -> bool {
        let mut queue = self.queue.lock();
        if !queue.queued.remove(&coordinate) {
            return false;
        }
        queue.order.retain(|chunk| chunk.coordinate() != coordinate);
        true
    }

    /// Whether a chunk is waiting for upload.
    pub fn contains(&self, coordinate: ChunkCoordinate) -> bool {
        self.queue.lock().queued.contains(&coordinate)
    }

    /// Number of waiting chunks.
    pub fn len(&self) -> usize {
        self.queue.lock().order.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().order.is_empty()
    }

    /// Pops at most `budget` chunks and uploads their meshes.
    ///
    /// Must be called on the owning thread. Popped chunks move to SETTLED on success
    /// and back to UNMESHED if the graphics context rejects them.
    ///
    /// # Arguments
    ///
    /// * `budget` - Most chunks to upload in this call
    /// * `context` - The graphics context receiving the meshes
    ///
    /// # Returns
    ///
    /// An [`UploadReport`] of what happened to each popped entry, or
    /// [`UploadError::WrongThread`] when called off the owning thread. Nothing is
    /// popped in that case.
    pub fn drain_up_to(
        &self,
        budget: usize,
        context: &mut dyn GraphicsContext,
    ) -> Result<UploadReport, UploadError> {
        if thread::current().id() != self.owner {
            return Err(UploadError::WrongThread);
        }

        let (batch, remaining) = {
            let mut queue = self.queue.lock();
            let count = budget.min(queue.order.len());
            let batch: Vec<Arc<Chunk>> = queue.order.drain(..count).collect();
            for chunk in &batch {
                queue.queued.remove(&chunk.coordinate());
            }
            (batch, queue.order.len())
        };

        let mut report = UploadReport {
            remaining,
            ..Default::default()
        };
        for chunk in batch {
            let Some(mesh) = chunk.take_mesh_for_upload() else {
                report.stale += 1;
                continue;
            };
            match context.upload_mesh(chunk.coordinate(), &mesh) {
                Ok(()) => {
                    chunk.finish_upload(true);
                    report.uploaded += 1;
                }
                Err(err) => {
                    log::warn!("{err}");
                    chunk.finish_upload(false);
                    report.failed += 1;
                }
            }
        }

        if report.uploaded + report.failed > 0 {
            log::trace!("upload drain: {report:?}");
        }
        Ok(report)
    }
}

impl Default for UploadQueue {
    fn default() -> Self {
        Self::new()
    }
}
