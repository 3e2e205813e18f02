//! # Unload Policy
//!
//! Periodically evicts chunks that have drifted out of range.
//!
//! A chunk is evicted once its Chebyshev distance from the player exceeds
//! `render_distance + hysteresis`. The margin keeps a player pacing along the render
//! boundary from loading and unloading the same column over and over.
//!
//! Eviction order for each chunk:
//! 1. mark it evicted, so in-flight builds and queued uploads are discarded
//! 2. drop it from the pending set, the upload queue and the worker queue
//! 3. release its graphics buffers
//! 4. save it if dirty
//! 5. remove it from the world

use web_time::{Duration, Instant};

use crate::engine_state::{
    buffer_state::GraphicsContext,
    rendering::{scheduler::MeshBuildScheduler, upload_queue::UploadQueue},
    task_management::TaskManager,
};

use super::chunk::{mesh_state::MeshEvent, ChunkCoordinate};
use super::world::{save_if_dirty, World};

/// Counts from one sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnloadReport {
    /// Chunks removed from the world.
    pub evicted: usize,
    /// Of those, how many were saved first.
    pub saved: usize,
    /// Of those, how many had graphics buffers released.
    pub released: usize,
}

/// Everything that may still reference a chunk being evicted.
pub struct EvictionTargets<'a> {
    /// Chunks waiting to be submitted.
    pub scheduler: &'a MeshBuildScheduler,
    /// Chunks waiting for upload.
    pub upload_queue: &'a UploadQueue,
    /// Build tasks waiting for a worker.
    pub task_manager: &'a mut TaskManager,
    /// Resident meshes.
    pub graphics: &'a mut dyn GraphicsContext,
}

/// Evicts chunks beyond the render distance plus a hysteresis margin.
#[derive(Clone, Debug)]
pub struct UnloadPolicy {
    render_distance: i32,
    hysteresis: i32,
    interval: Duration,
    last_sweep: Option<Instant>,
}

impl UnloadPolicy {
    /// A policy sweeping at most once per `interval`.
    pub fn new(render_distance: i32, hysteresis: i32, interval: Duration) -> Self {
        UnloadPolicy {
            render_distance,
            hysteresis: hysteresis.max(0),
            interval,
            last_sweep: None,
        }
    }

    /// Distance beyond which chunks are evicted.
    pub fn unload_distance(&self) -> i32 {
        self.render_distance + self.hysteresis
    }

    /// Whether a chunk at `coordinate` is out of range of `center`.
    pub fn should_evict(&self, center: ChunkCoordinate, coordinate: ChunkCoordinate) -> bool {
        center.chebyshev_distance(coordinate) > self.unload_distance()
    }

    /// Whether a sweep is due at `now`. The first call is always due.
    pub fn is_due(&self, now: Instant) -> bool {
        self.last_sweep
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }

    /// Sweeps if the interval has passed since the last sweep.
    ///
    /// # Returns
    ///
    /// `None` when no sweep was due, otherwise what the sweep evicted.
    pub fn sweep_if_due(
        &mut self,
        now: Instant,
        center: ChunkCoordinate,
        world: &World,
        targets: EvictionTargets<'_>,
    ) -> Option<UnloadReport> {
        if !self.is_due(now) {
            return None;
        }
        self.last_sweep = Some(now);
        Some(self.sweep(center, world, targets))
    }

    /// Evicts every out-of-range chunk now.
    pub fn sweep(&self, center: ChunkCoordinate, world: &World, targets: EvictionTargets<'_>) -> UnloadReport {
        let EvictionTargets {
            scheduler,
            upload_queue,
            task_manager,
            graphics,
        } = targets;
        let mut report = UnloadReport::default();

        for chunk in world.snapshot_values() {
            let coordinate = chunk.coordinate();
            if !self.should_evict(center, coordinate) {
                continue;
            }

            chunk.transition(MeshEvent::Evict);
            scheduler.remove(coordinate);
            upload_queue.remove(coordinate);
            task_manager.remove_queued_for(coordinate);
            if graphics.release_mesh(coordinate) {
                report.released += 1;
            }
            if let Some(persistence) = world.persistence() {
                if save_if_dirty(&chunk, persistence.as_ref()) {
                    report.saved += 1;
                }
            }
            world.remove(coordinate);
            report.evicted += 1;
        }

        if report.evicted > 0 {
            log::info!(
                "unloaded {} chunks beyond distance {} of {center:?} ({} saved)",
                report.evicted,
                self.unload_distance(),
                report.saved
            );
        }
        report
    }
}
