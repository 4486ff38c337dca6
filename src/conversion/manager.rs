//! Conversion management logic.
//!
//! The [`ConversionManager`] is the entry point of the library: it wires
//! the external converter driver, the priority job queue, and the worker
//! pool together, accepts `(source, target)` conversion requests, and hands
//! back a [`ConversionHandle`] per request.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use pdfmill_core::Result;
use tracing::{debug, info};

use crate::config::Config;
use crate::job::{
    ConversionHandle, ConversionJob, JobQueue, JobShared, Outcome, PoolCounters, WorkerPool,
};

use super::driver::ScriptConverter;
use super::file_job::FileConversion;

/// Snapshot of the manager's queue and pool state.
#[derive(Debug, Clone, Copy)]
pub struct ManagerStats {
    /// Jobs waiting in the queue.
    pub queued: usize,
    /// Jobs currently executing on a worker.
    pub active: usize,
    /// Jobs that reached a terminal state since startup.
    pub completed: u64,
    /// Size of the worker pool.
    pub workers: usize,
}

/// Facade over the conversion pipeline.
///
/// Constructed once; [`shutdown`](Self::shutdown) finishes running jobs,
/// cancels queued ones, and rejects further submissions.
pub struct ConversionManager {
    driver: Arc<ScriptConverter>,
    queue: Arc<JobQueue>,
    counters: Arc<PoolCounters>,
    pool: Mutex<Option<WorkerPool>>,
    workers: usize,
}

impl ConversionManager {
    /// Validate `config`, resolve the converter script, and start the
    /// worker pool.
    pub fn new(config: Config) -> Result<Self> {
        crate::config::validate_config(&config)?;
        let driver = Arc::new(ScriptConverter::new(&config.converter)?);
        let queue = Arc::new(JobQueue::new());
        let counters = Arc::new(PoolCounters::default());
        let pool = WorkerPool::spawn(
            Arc::clone(&queue),
            Arc::clone(&counters),
            config.pool.workers,
        );

        info!(
            "conversion manager started with {} workers, converter {}",
            config.pool.workers,
            driver.script().display()
        );

        Ok(Self {
            driver,
            queue,
            counters,
            pool: Mutex::new(Some(pool)),
            workers: config.pool.workers,
        })
    }

    /// Queue a conversion of `source` into `target` at normal priority.
    pub fn start_conversion(
        &self,
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> Result<ConversionHandle> {
        self.start_conversion_with_priority(source, target, crate::job::priority::NORMAL)
    }

    /// Queue a conversion at an explicit priority (larger runs earlier).
    pub fn start_conversion_with_priority(
        &self,
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        priority: i32,
    ) -> Result<ConversionHandle> {
        let job = FileConversion::new(Arc::clone(&self.driver), source.into(), target.into());
        self.submit(priority, job)
    }

    /// Queue an arbitrary [`ConversionJob`] implementation.
    ///
    /// Fails with [`pdfmill_core::Error::PoolClosed`] after `shutdown`.
    pub fn submit<J: ConversionJob>(&self, priority: i32, job: J) -> Result<ConversionHandle> {
        let shared = Arc::new(JobShared::new());
        self.queue.push(priority, Box::new(job), Arc::clone(&shared))?;
        debug!("queued job {} at priority {priority}", shared.id);
        Ok(ConversionHandle::new(shared))
    }

    /// Shut the pipeline down.
    ///
    /// Running jobs are driven to their terminal state; queued-but-unstarted
    /// jobs are published as cancelled; subsequent submissions are rejected.
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        let Some(pool) = self.pool.lock().take() else {
            return;
        };

        let drained = self.queue.close();
        if !drained.is_empty() {
            info!("cancelling {} queued conversions on shutdown", drained.len());
        }
        for entry in drained {
            entry.shared.publish(Outcome::Cancelled);
        }

        pool.join();
        info!("conversion manager stopped");
    }

    /// Current queue and pool counters.
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            queued: self.queue.len(),
            active: self.counters.active.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
            workers: self.workers,
        }
    }
}

impl Drop for ConversionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
