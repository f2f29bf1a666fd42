use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::bounded_queue::BoundedFrameQueue;
use super::error_channel::ErrorChannel;
use super::run_state::RunState;
use super::statistics::StatisticsRegistry;

/// State a capture session shares with its ingestion and writer threads.
pub(crate) struct PipelineShared {
    pub queue: BoundedFrameQueue,
    pub stats: StatisticsRegistry,
    pub errors: ErrorChannel,
    pub run_state: Arc<RunState>,
    next_sequence: AtomicU64,
}

impl PipelineShared {
    pub fn new(queue_capacity: usize) -> Self {
        let run_state = Arc::new(RunState::new());
        Self {
            queue: BoundedFrameQueue::new(queue_capacity),
            stats: StatisticsRegistry::new(),
            errors: ErrorChannel::new(Arc::clone(&run_state)),
            run_state,
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Hands out the next capture sequence number; never repeats per session.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed)
    }
}

thread_local! {
    static ON_PIPELINE_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Tags the current thread as owned by a capture session.
pub(crate) fn mark_pipeline_thread() {
    ON_PIPELINE_THREAD.with(|flag| flag.set(true));
}

/// True on ingestion and writer threads, where joining the pipeline would
/// mean joining ourselves.
pub(crate) fn on_pipeline_thread() -> bool {
    ON_PIPELINE_THREAD.with(Cell::get)
}

/// Locks a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
