//! # Task System Core Traits
//!
//! - `Task`: a unit of work executed on a worker thread
//! - `TaskResult`: the value a task sends back, handled on the main thread
//!
//! ## Task Lifecycle
//! 1. A `Task` is published via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called on the main thread with a [`TaskContext`]
//! 5. The result can spawn follow-up tasks

use crate::engine_state::{
    rendering::scheduler::MeshBuildScheduler,
    voxels::{chunk::ChunkCoordinate, world::World},
    EngineStats,
};

/// Main-thread state available to task results.
pub struct TaskContext<'a> {
    /// The chunk store.
    pub world: &'a World,
    /// Where chunks go to be rebuilt.
    pub scheduler: &'a MeshBuildScheduler,
    /// Consecutive failures of one chunk after which neighbors are no longer repaired.
    pub max_repair_cascade: u32,
    /// Running counters.
    pub stats: &'a mut EngineStats,
}

/// A unit of work that runs on a worker thread.
///
/// Tasks own everything they need. They must not call back into the chunk store to
/// create chunks; they only read chunks they were handed.
pub trait Task: Send {
    /// Does the work and returns a result for the main thread.
    fn process(&self) -> Box<dyn TaskResult>;

    /// The chunk this task works on, if any. Lets queued work be dropped on eviction.
    fn chunk_coordinate(&self) -> Option<ChunkCoordinate> {
        None
    }
}

/// The result of a completed [`Task`], handled on the main thread.
pub trait TaskResult: Send {
    /// Applies the result and returns any follow-up tasks.
    fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task>>;
}

/// Stands in for the result of a task that panicked outside its own guard.
pub struct PanickedTaskResult {
    /// Panic payload, if it was a string.
    pub message: String,
}

impl TaskResult for PanickedTaskResult {
    fn handle_result(self: Box<Self>, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task>> {
        log::error!("worker task panicked: {}", self.message);
        context.stats.task_panics += 1;
        Vec::new()
    }
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
