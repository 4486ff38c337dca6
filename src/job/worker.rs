//! Worker pool: fixed set of OS threads draining the job queue.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::Utc;
use pdfmill_core::Error;
use tracing::{debug, warn};

use super::handle::Outcome;
use super::queue::JobQueue;

/// Shared counters for pool observability.
#[derive(Default)]
pub(crate) struct PoolCounters {
    pub active: AtomicUsize,
    pub completed: AtomicU64,
}

pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` named threads draining `queue` until it closes.
    pub(crate) fn spawn(
        queue: Arc<JobQueue>,
        counters: Arc<PoolCounters>,
        workers: usize,
    ) -> Self {
        let handles = (0..workers)
            .map(|index| {
                let queue = Arc::clone(&queue);
                let counters = Arc::clone(&counters);
                std::thread::Builder::new()
                    .name(format!("pdfmill-worker-{index}"))
                    .spawn(move || worker_loop(index, &queue, &counters))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self { handles }
    }

    /// Wait for every worker to finish its current job and exit.
    pub(crate) fn join(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(index: usize, queue: &JobQueue, counters: &PoolCounters) {
    debug!("conversion worker {index} started");

    while let Some(entry) = queue.pop() {
        let shared = entry.shared;
        let waited_ms = (Utc::now() - shared.created_at).num_milliseconds();
        debug!(
            "worker {index} picked job {} (priority {}, queued {waited_ms}ms)",
            shared.id, entry.priority
        );

        counters.active.fetch_add(1, Ordering::SeqCst);
        let job = entry.job;
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| job.drive(&shared)));
        if result.is_err() {
            // A hook panicked. Keep the pool alive and make the failure
            // observable through the handle.
            warn!("job {} panicked while executing", shared.id);
            shared.publish(Outcome::Failed(Error::ConverterFailure {
                exit_code: None,
                detail: "conversion job panicked".to_string(),
            }));
        }
        counters.active.fetch_sub(1, Ordering::SeqCst);
        counters.completed.fetch_add(1, Ordering::SeqCst);
    }

    debug!("conversion worker {index} stopped");
}
