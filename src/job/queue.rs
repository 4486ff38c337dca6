//! Priority-ordered blocking job queue.
//!
//! Ordering is strict by priority (larger first); ties break by submission
//! order, tracked with a monotonically increasing sequence so equal-priority
//! jobs dequeue in the order they were enqueued.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use pdfmill_core::{Error, Result};

use super::handle::JobShared;
use super::runner::ErasedJob;

pub(crate) struct QueuedJob {
    pub priority: i32,
    pub seq: u64,
    pub shared: Arc<JobShared>,
    pub job: Box<dyn ErasedJob>,
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then earlier submission.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueInner {
    heap: BinaryHeap<QueuedJob>,
    next_seq: u64,
    closed: bool,
}

/// Blocking priority queue shared by the manager and the worker pool.
pub(crate) struct JobQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue a job. Fails with [`Error::PoolClosed`] after `close`.
    pub(crate) fn push(
        &self,
        priority: i32,
        job: Box<dyn ErasedJob>,
        shared: Arc<JobShared>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Error::PoolClosed);
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.heap.push(QueuedJob {
            priority,
            seq,
            shared,
            job,
        });
        self.available.notify_one();
        Ok(())
    }

    /// Dequeue the highest-priority job, blocking while the queue is empty.
    /// Returns `None` once the queue is closed and drained.
    pub(crate) fn pop(&self) -> Option<QueuedJob> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(entry) = inner.heap.pop() {
                return Some(entry);
            }
            if inner.closed {
                return None;
            }
            self.available.wait(&mut inner);
        }
    }

    /// Close the queue, waking all blocked workers. Jobs still queued are
    /// drained and returned so the caller can publish their cancellation.
    pub(crate) fn close(&self) -> Vec<QueuedJob> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        let drained = std::mem::take(&mut inner.heap).into_sorted_vec();
        self.available.notify_all();
        drained
    }

    /// Number of jobs waiting to be picked up.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }
}
