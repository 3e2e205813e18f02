//! # Task Management System
//!
//! A fixed pool of worker threads fed from the main thread.
//!
//! ## Architecture Overview
//! - `TaskManager`: central coordinator for task distribution and worker management
//! - `Task`: a unit of work that runs on a worker
//! - `TaskResult`: the result of a task, handled back on the main thread
//! - `TaskChannel`: the main thread's handle on one worker
//!
//! Each worker has its own task channel and at most [`MAX_TASKS_IN_FLIGHT`] tasks.
//! Everything else waits in `queued_tasks` on the main thread. Results from every worker
//! arrive on one shared channel tagged with the worker's index.
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager hands tasks to free workers round-robin, queuing the rest
//! 3. Workers run `Task::process` and send back the result
//! 4. Results are handled on the main thread in `process_completed_tasks()`
//! 5. Results can spawn new tasks
//!
//! A panic inside `process` is caught on the worker, which stays alive and reports a
//! [`PanickedTaskResult`](task::PanickedTaskResult) in its place.
//!
//! ## Example Usage
//! ```ignore
//! let mut task_manager = TaskManager::new(num_workers);
//! task_manager.publish_task(Box::new(MyTask::new(...)));
//!
//! // In the main loop:
//! task_manager.process_completed_tasks(&mut context);
//! task_manager.process_queued_tasks();
//! ```

pub mod task;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::engine_state::voxels::chunk::ChunkCoordinate;
use task::{panic_message, PanickedTaskResult, Task, TaskContext, TaskResult};

type Completed = (usize, Box<dyn TaskResult>);

/// The main thread's handle on one worker thread.
struct TaskChannel {
    task_sender: Option<Sender<Box<dyn Task>>>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// Not thread-safe: publish and process from the thread that owns the manager.
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    result_receiver: Receiver<Completed>,
    queued_tasks: VecDeque<Box<dyn Task>>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

impl TaskManager {
    /// Creates a `TaskManager` with `num_workers` threads.
    ///
    /// With zero workers every task stays queued.
    pub fn new(num_workers: usize) -> Self {
        let (result_tx, result_rx) = unbounded::<Completed>();
        let mut channels = Vec::with_capacity(num_workers);

        for worker_index in 0..num_workers {
            let (task_tx, task_rx) = unbounded::<Box<dyn Task>>();
            let result_tx = result_tx.clone();

            let task_closure = move || {
                while let Ok(task) = task_rx.recv() {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| task.process()))
                        .unwrap_or_else(|payload| {
                            Box::new(PanickedTaskResult {
                                message: panic_message(payload.as_ref()),
                            })
                        });
                    if result_tx.send((worker_index, result)).is_err() {
                        break;
                    }
                }
            };

            let worker = thread::Builder::new()
                .name(format!("mesh-worker-{worker_index}"))
                .spawn(task_closure);
            match worker {
                Ok(worker) => channels.push(TaskChannel {
                    task_sender: Some(task_tx),
                    num_tasks_in_flight: 0,
                    worker: Some(worker),
                }),
                Err(err) => log::error!("failed to spawn worker {worker_index}: {err}"),
            }
        }

        log::info!(
            "task manager started {} workers (available parallelism: {:?})",
            channels.len(),
            thread::available_parallelism()
        );

        TaskManager {
            channels,
            result_receiver: result_rx,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
        }
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Tasks currently held by workers.
    pub fn tasks_in_flight(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.num_tasks_in_flight)
            .sum()
    }

    /// Tasks waiting for a free worker.
    pub fn queued_len(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Whether nothing is queued or running.
    pub fn is_idle(&self) -> bool {
        self.queued_tasks.is_empty() && self.tasks_in_flight() == 0
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// Returns the task if the worker has gone away.
    fn try_send_task(&mut self, task: Box<dyn Task>, channel_idx: usize) -> Result<(), Box<dyn Task>> {
        let channel = &mut self.channels[channel_idx];
        let Some(sender) = &channel.task_sender else {
            return Err(task);
        };
        match sender.send(task) {
            Ok(()) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(err) => Err(err.into_inner()),
        }
    }

    /// Finds a worker below `MAX_TASKS_IN_FLIGHT`, round-robin from the last used one.
    fn find_available_channel(&self) -> Option<usize> {
        let len = self.channels.len();
        (0..len)
            .map(|offset| (self.current_channel + offset) % len)
            .find(|&idx| self.channels[idx].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT)
    }

    /// Publishes a task for execution.
    ///
    /// Returns `true` if a worker took it right away, `false` if it was queued.
    pub fn publish_task(&mut self, task: Box<dyn Task>) -> bool {
        let Some(channel_idx) = self.find_available_channel() else {
            self.queued_tasks.push_back(task);
            return false;
        };
        match self.try_send_task(task, channel_idx) {
            Ok(()) => {
                self.current_channel = (channel_idx + 1) % self.channels.len();
                true
            }
            Err(task) => {
                log::warn!("worker {channel_idx} disconnected; task queued");
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Hands queued tasks to free workers, oldest first.
    pub fn process_queued_tasks(&mut self) {
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                return;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(()) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // Channel is disconnected, put task back and stop processing
                    self.queued_tasks.push_front(task);
                    return;
                }
            }
        }
    }

    /// Drops queued tasks for a chunk. Tasks already on a worker are not affected.
    pub fn remove_queued_for(&mut self, coordinate: ChunkCoordinate) -> usize {
        let before = self.queued_tasks.len();
        self.queued_tasks
            .retain(|task| task.chunk_coordinate() != Some(coordinate));
        before - self.queued_tasks.len()
    }

    fn complete(&mut self, (worker_index, result): Completed, context: &mut TaskContext<'_>) -> Vec<Box<dyn Task>> {
        if let Some(channel) = self.channels.get_mut(worker_index) {
            channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
        }
        result.handle_result(context)
    }

    /// Handles every result that has arrived, without blocking.
    ///
    /// Returns how many results were handled.
    pub fn process_completed_tasks(&mut self, context: &mut TaskContext<'_>) -> usize {
        let mut tasks_to_queue = Vec::new();
        let mut handled = 0;
        while let Ok(completed) = self.result_receiver.try_recv() {
            tasks_to_queue.extend(self.complete(completed, context));
            handled += 1;
        }

        for task in tasks_to_queue {
            self.publish_task(task);
        }
        handled
    }

    /// Runs the pool until nothing is queued or in flight, or `timeout` passes without
    /// a result arriving. Returns whether the pool went idle.
    pub fn block_until_idle(&mut self, context: &mut TaskContext<'_>, timeout: Duration) -> bool {
        loop {
            self.process_queued_tasks();
            if self.is_idle() {
                return true;
            }
            if self.tasks_in_flight() == 0 {
                // Queued work but no worker can take it.
                return false;
            }
            match self.result_receiver.recv_timeout(timeout) {
                Ok(completed) => {
                    for task in self.complete(completed, context) {
                        self.publish_task(task);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        for channel in &mut self.channels {
            channel.task_sender.take();
        }
        for channel in &mut self.channels {
            if let Some(worker) = channel.worker.take() {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::engine_state::rendering::scheduler::MeshBuildScheduler;
    use crate::engine_state::voxels::generation::FlatTerrainGenerator;
    use crate::engine_state::voxels::world::World;
    use crate::engine_state::EngineStats;

    struct CountingTask {
        coordinate: Option<ChunkCoordinate>,
        processed: Arc<AtomicUsize>,
        handled: Arc<AtomicUsize>,
        panic: bool,
        follow_up: bool,
    }

    impl CountingTask {
        fn new(processed: &Arc<AtomicUsize>, handled: &Arc<AtomicUsize>) -> Self {
            CountingTask {
                coordinate: None,
                processed: processed.clone(),
                handled: handled.clone(),
                panic: false,
                follow_up: false,
            }
        }
    }

    struct CountingResult {
        handled: Arc<AtomicUsize>,
        follow_up: Option<CountingTask>,
    }

    impl Task for CountingTask {
        fn process(&self) -> Box<dyn TaskResult> {
            if self.panic {
                panic!("task exploded");
            }
            self.processed.fetch_add(1, Ordering::SeqCst);
            let follow_up = self
                .follow_up
                .then(|| CountingTask::new(&self.processed, &self.handled));
            Box::new(CountingResult {
                handled: self.handled.clone(),
                follow_up,
            })
        }

        fn chunk_coordinate(&self) -> Option<ChunkCoordinate> {
            self.coordinate
        }
    }

    impl TaskResult for CountingResult {
        fn handle_result(self: Box<Self>, _context: &mut TaskContext<'_>) -> Vec<Box<dyn Task>> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            self.follow_up
                .map(|task| vec![Box::new(task) as Box<dyn Task>])
                .unwrap_or_default()
        }
    }

    fn with_context(f: impl FnOnce(&mut TaskContext<'_>)) -> EngineStats {
        let world = World::new(Arc::new(FlatTerrainGenerator::default()));
        let scheduler = MeshBuildScheduler::new();
        let mut stats = EngineStats::default();
        let mut context = TaskContext {
            world: &world,
            scheduler: &scheduler,
            max_repair_cascade: 3,
            stats: &mut stats,
        };
        f(&mut context);
        stats
    }

    #[test]
    fn tasks_beyond_worker_capacity_are_queued() {
        let processed = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new(2);

        let published: Vec<bool> = (0..5)
            .map(|_| manager.publish_task(Box::new(CountingTask::new(&processed, &handled))))
            .collect();
        assert_eq!(published, vec![true, true, false, false, false]);
        assert_eq!(manager.queued_len(), 3);

        with_context(|context| {
            assert!(manager.block_until_idle(context, Duration::from_secs(10)));
        });
        assert_eq!(processed.load(Ordering::SeqCst), 5);
        assert_eq!(handled.load(Ordering::SeqCst), 5);
        assert!(manager.is_idle());
    }

    #[test]
    fn follow_up_tasks_are_published() {
        let processed = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new(1);
        let mut task = CountingTask::new(&processed, &handled);
        task.follow_up = true;
        manager.publish_task(Box::new(task));

        with_context(|context| {
            assert!(manager.block_until_idle(context, Duration::from_secs(10)));
        });
        assert_eq!(handled.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_task_does_not_kill_its_worker() {
        let processed = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new(1);
        let mut task = CountingTask::new(&processed, &handled);
        task.panic = true;
        manager.publish_task(Box::new(task));
        manager.publish_task(Box::new(CountingTask::new(&processed, &handled)));

        let stats = with_context(|context| {
            assert!(manager.block_until_idle(context, Duration::from_secs(10)));
        });
        assert_eq!(stats.task_panics, 1);
        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn queued_tasks_can_be_dropped_by_chunk() {
        let processed = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));
        let mut manager = TaskManager::new(0);
        for x in [0, 1, 0] {
            let mut task = CountingTask::new(&processed, &handled);
            task.coordinate = Some(ChunkCoordinate::new(x, 0));
            manager.publish_task(Box::new(task));
        }
        assert_eq!(manager.remove_queued_for(ChunkCoordinate::new(0, 0)), 2);
        assert_eq!(manager.queued_len(), 1);

        with_context(|context| {
            assert!(!manager.block_until_idle(context, Duration::from_millis(10)));
        });
    }
}
