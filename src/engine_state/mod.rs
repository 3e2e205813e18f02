//! # Engine State Module
//!
//! `EngineState` owns every piece of the chunk streaming pipeline and drives it from a
//! single thread, the one that owns the graphics context.
//!
//! ## Key Components
//!
//! * `buffer_state` - the graphics-context seam and a headless mesh registry
//! * `rendering` - mesh building, the build scheduler and the upload queue
//! * `task_management` - the worker pool
//! * `voxels` - chunks, the world, generation, visibility and unloading
//!
//! ## Tick Order
//!
//! 1. Visibility scan around the player (every tick, or on a timer)
//! 2. Submit the pending set to the worker pool
//! 3. Handle finished builds, then refill idle workers
//! 4. Upload at most `upload_budget_per_tick` meshes
//! 5. Unload sweep (on its own, coarser timer)

use std::collections::HashMap;
use std::sync::Arc;

use web_time::{Duration, Instant};

use crate::config::StreamingConfig;
use crate::error::{ConfigError, GenerationError, UploadError};

use buffer_state::{BufferState, GraphicsContext};
use rendering::{
    meshing::{CulledMesher, MeshBuilder},
    scheduler::MeshBuildScheduler,
    upload_queue::{UploadQueue, UploadReport},
};
use task_management::{task::TaskContext, TaskManager};
use voxels::{
    block::block_type::BlockType,
    chunk::{Chunk, ChunkCoordinate},
    generation::{NoiseTerrainGenerator, TerrainGenerator},
    persistence::ChunkPersistence,
    unload::{EvictionTargets, UnloadPolicy, UnloadReport},
    visibility::{VisibilityScan, VisibilityTracker},
    world::{BlockLocation, World},
};

pub mod buffer_state;
pub mod rendering;
pub mod task_management;
pub mod voxels;

/// Counters and gauges for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Ticks run.
    pub ticks: u64,
    /// Chunks in the world.
    pub loaded_chunks: usize,
    /// Loaded chunks whose uploaded mesh is current.
    pub settled_chunks: usize,
    /// Chunks waiting to be submitted.
    pub pending_builds: usize,
    /// Build tasks on workers.
    pub tasks_in_flight: usize,
    /// Build tasks waiting for a worker.
    pub queued_tasks: usize,
    /// Meshes waiting for upload.
    pub queued_uploads: usize,
    /// Successful builds.
    pub meshes_built: u64,
    /// Meshes accepted by the graphics context.
    pub meshes_uploaded: u64,
    /// Meshes the graphics context rejected.
    pub upload_failures: u64,
    /// Builds thrown away because the chunk changed or left mid-build.
    pub builds_discarded: u64,
    /// Tasks that found their chunk no longer queued.
    pub builds_skipped: u64,
    /// Failed builds.
    pub build_failures: u64,
    /// Neighbors sent back to UNMESHED after a failed build.
    pub neighbor_repairs: u64,
    /// Tasks that panicked outside their own guard.
    pub task_panics: u64,
    /// Chunks unloaded.
    pub chunks_evicted: u64,
    /// Chunks that could not be generated.
    pub generation_failures: usize,
}

impl EngineStats {
    fn results_handled(&self) -> u64 {
        self.meshes_built
            + self.build_failures
            + self.builds_discarded
            + self.builds_skipped
            + self.task_panics
    }
}

/// What one tick did.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickReport {
    /// The visibility scan, if one ran.
    pub scan: Option<VisibilityScan>,
    /// Build tasks submitted.
    pub submitted: usize,
    /// Build results handled.
    pub completed: usize,
    /// The upload drain.
    pub uploads: UploadReport,
    /// The unload sweep, if one ran.
    pub unload: Option<UnloadReport>,
}

/// The chunk streaming pipeline around one player.
pub struct EngineState<G: GraphicsContext = BufferState> {
    config: StreamingConfig,
    world: World,
    scheduler: MeshBuildScheduler,
    upload_queue: Arc<UploadQueue>,
    task_manager: TaskManager,
    builder: Arc<dyn MeshBuilder>,
    graphics: G,
    visibility: VisibilityTracker,
    unload_policy: UnloadPolicy,
    player_chunk: ChunkCoordinate,
    last_scan: Option<Instant>,
    stats: EngineStats,
}

impl EngineState<BufferState> {
    /// Noise terrain, culled meshing and a headless buffer registry.
    pub fn new(config: StreamingConfig) -> Result<Self, ConfigError> {
        let generator = Arc::new(NoiseTerrainGenerator::new(config.world_seed));
        Self::with_components(
            config,
            World::new(generator),
            Arc::new(CulledMesher),
            BufferState::new(),
        )
    }

    /// Like [`EngineState::new`] with a custom generator.
    pub fn with_generator(
        config: StreamingConfig,
        generator: Arc<dyn TerrainGenerator>,
    ) -> Result<Self, ConfigError> {
        Self::with_components(
            config,
            World::new(generator),
            Arc::new(CulledMesher),
            BufferState::new(),
        )
    }
}

impl<G: GraphicsContext> EngineState<G> {
    /// Assembles an engine from its parts. The calling thread becomes the graphics thread.
    pub fn with_components(
        config: StreamingConfig,
        world: World,
        builder: Arc<dyn MeshBuilder>,
        graphics: G,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let workers = config.resolved_worker_threads();
        log::info!(
            "engine starting: render distance {}, unload distance {}, {} workers",
            config.render_distance,
            config.unload_distance(),
            workers
        );

        Ok(EngineState {
            visibility: VisibilityTracker::new(config.render_distance),
            unload_policy: UnloadPolicy::new(
                config.render_distance,
                config.unload_hysteresis,
                config.unload_interval(),
            ),
            task_manager: TaskManager::new(workers),
            upload_queue: Arc::new(UploadQueue::new()),
            scheduler: MeshBuildScheduler::new(),
            world,
            builder,
            graphics,
            player_chunk: ChunkCoordinate::new(0, 0),
            last_scan: None,
            stats: EngineStats::default(),
            config,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// The chunk store.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The build scheduler.
    pub fn scheduler(&self) -> &MeshBuildScheduler {
        &self.scheduler
    }

    /// The upload queue.
    pub fn upload_queue(&self) -> &UploadQueue {
        &self.upload_queue
    }

    /// The graphics context.
    pub fn graphics(&self) -> &G {
        &self.graphics
    }

    /// The chunk the player is in.
    pub fn player_chunk(&self) -> ChunkCoordinate {
        self.player_chunk
    }

    /// Moves the player to a chunk.
    pub fn set_player_chunk(&mut self, coordinate: ChunkCoordinate) {
        self.player_chunk = coordinate;
    }

    /// Moves the player to the chunk containing a world position.
    pub fn set_player_position(&mut self, world_x: i32, world_z: i32) {
        self.set_player_chunk(ChunkCoordinate::containing(world_x, world_z));
    }

    /// Runs one tick at the current time.
    pub fn tick_now(&mut self) -> TickReport {
        self.tick(Instant::now())
    }

    /// Runs one non-blocking tick.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let scan = self.scan_if_due(now);
        let submitted = self.submit_pending();
        let completed = self.collect_results(None);
        self.task_manager.process_queued_tasks();
        let uploads = self.drain_uploads();
        let unload = self.unload_if_due(now);
        self.stats.ticks += 1;
        TickReport {
            scan,
            submitted,
            completed,
            uploads,
            unload,
        }
    }

    /// Runs one full cycle, waiting for the worker pool to go idle before draining
    /// uploads. Always scans.
    ///
    /// # Arguments
    ///
    /// * `now` - Clock reading used for the scan and unload intervals
    /// * `timeout` - Longest wait for in-flight builds to report back
    ///
    /// # Returns
    ///
    /// What each phase did, including the scan.
    pub fn cycle(&mut self, now: Instant, timeout: Duration) -> TickReport {
        let scan = Some(self.scan(now));
        let submitted = self.submit_pending();
        let completed = self.collect_results(Some(timeout));
        let uploads = self.drain_uploads();
        let unload = self.unload_if_due(now);
        self.stats.ticks += 1;
        TickReport {
            scan,
            submitted,
            completed,
            uploads,
            unload,
        }
    }

    /// Cycles until every visible chunk is settled and nothing is left in the pipeline,
    /// or `max_cycles` run out. Returns whether the area settled.
    pub fn run_until_settled(&mut self, max_cycles: usize, timeout: Duration) -> bool {
        for _ in 0..max_cycles {
            self.cycle(Instant::now(), timeout);
            if self.area_settled() {
                return true;
            }
        }
        false
    }

    /// Whether every visible chunk is settled and no work is queued.
    pub fn area_settled(&self) -> bool {
        self.scheduler.is_empty()
            && self.upload_queue.is_empty()
            && self.task_manager.is_idle()
            && self
                .visibility
                .visible_set(self.player_chunk)
                .into_iter()
                .all(|coordinate| self.world.get(coordinate).is_some_and(|chunk| chunk.is_settled()))
    }

    fn scan_if_due(&mut self, now: Instant) -> Option<VisibilityScan> {
        let due = self.last_scan.map_or(true, |last| {
            now.saturating_duration_since(last) >= self.config.visibility_interval()
        });
        due.then(|| self.scan(now))
    }

    fn scan(&mut self, now: Instant) -> VisibilityScan {
        self.last_scan = Some(now);
        self.visibility
            .scan(self.player_chunk, &self.world, &self.scheduler)
    }

    fn submit_pending(&mut self) -> usize {
        self.scheduler.submit_pending(
            &self.world,
            &mut self.task_manager,
            &self.builder,
            &self.upload_queue,
        )
    }

    fn collect_results(&mut self, block_for: Option<Duration>) -> usize {
        let before = self.stats.results_handled();
        let mut context = TaskContext {
            world: &self.world,
            scheduler: &self.scheduler,
            max_repair_cascade: self.config.max_repair_cascade,
            stats: &mut self.stats,
        };
        match block_for {
            Some(timeout) => {
                if !self.task_manager.block_until_idle(&mut context, timeout) {
                    log::warn!("worker pool still busy after {timeout:?}");
                }
            }
            None => {
                self.task_manager.process_completed_tasks(&mut context);
            }
        }
        (self.stats.results_handled() - before) as usize
    }

    fn drain_uploads(&mut self) -> UploadReport {
        match self
            .upload_queue
            .drain_up_to(self.config.upload_budget_per_tick, &mut self.graphics)
        {
            Ok(report) => {
                self.stats.meshes_uploaded += report.uploaded as u64;
                self.stats.upload_failures += report.failed as u64;
                report
            }
            Err(err @ UploadError::WrongThread) => {
                log::error!("{err}");
                UploadReport::default()
            }
            Err(err) => {
                log::warn!("{err}");
                UploadReport::default()
            }
        }
    }

    fn unload_if_due(&mut self, now: Instant) -> Option<UnloadReport> {
        let report = self.unload_policy.sweep_if_due(
            now,
            self.player_chunk,
            &self.world,
            EvictionTargets {
                scheduler: &self.scheduler,
                upload_queue: &self.upload_queue,
                task_manager: &mut self.task_manager,
                graphics: &mut self.graphics,
            },
        )?;
        self.stats.chunks_evicted += report.evicted as u64;
        Some(report)
    }

    /// The chunk at chunk coordinates `(x, z)`, creating it if absent.
    pub fn get_chunk_at(&self, x: i32, z: i32) -> Result<Arc<Chunk>, GenerationError> {
        self.world.get_chunk_at(x, z)
    }

    /// Block at a world position; `AIR` when out of height or ungeneratable.
    pub fn get_block_at(&self, world_x: i32, world_y: i32, world_z: i32) -> BlockType {
        self.world.get_block_at(world_x, world_y, world_z)
    }

    /// Writes a block and queues the affected chunks for remeshing.
    ///
    /// An edit on a chunk border also queues the neighbor across it, since its faces
    /// against this chunk may change.
    ///
    /// # Arguments
    ///
    /// * `world_x`, `world_y`, `world_z` - World block coordinates
    /// * `block_type` - The new block
    ///
    /// # Returns
    ///
    /// `false` if `world_y` is out of bounds.
    pub fn set_block_at(&self, world_x: i32, world_y: i32, world_z: i32, block_type: BlockType) -> bool {
        if !self.world.set_block_at(world_x, world_y, world_z, block_type) {
            return false;
        }
        let Some(location) = BlockLocation::from_world(world_x, world_y, world_z) else {
            return true;
        };
        let affected = std::iter::once(location.chunk)
            .chain(location.touched_edges().map(|side| location.chunk.neighbor(side)));
        for coordinate in affected {
            if let Some(chunk) = self.world.get(coordinate) {
                if chunk.features_populated() {
                    self.scheduler.conditionally_schedule(&chunk);
                }
            }
        }
        true
    }

    /// Loaded chunks in the visible set around a player chunk.
    pub fn get_chunks_around_player(
        &self,
        player_chunk_x: i32,
        player_chunk_z: i32,
    ) -> HashMap<ChunkCoordinate, Arc<Chunk>> {
        self.world.chunks_within(
            ChunkCoordinate::new(player_chunk_x, player_chunk_z),
            self.visibility.render_distance(),
        )
    }

    /// Number of chunks in the world.
    pub fn get_loaded_chunk_count(&self) -> usize {
        self.world.len()
    }

    /// Saves every dirty chunk through `persistence`.
    pub fn save_dirty_chunks(&self, persistence: &dyn ChunkPersistence) -> usize {
        self.world.save_dirty_chunks(persistence)
    }

    /// Counters plus a fresh reading of the gauges.
    pub fn stats(&self) -> EngineStats {
        let chunks = self.world.snapshot_values();
        EngineStats {
            loaded_chunks: chunks.len(),
            settled_chunks: chunks.iter().filter(|chunk| chunk.is_settled()).count(),
            pending_builds: self.scheduler.len(),
            tasks_in_flight: self.task_manager.tasks_in_flight(),
            queued_tasks: self.task_manager.queued_len(),
            queued_uploads: self.upload_queue.len(),
            generation_failures: self.world.generation_failures(),
            ..self.stats
        }
    }
}
