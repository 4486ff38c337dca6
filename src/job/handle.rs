//! Job state, terminal outcome, and the client-facing result handle.
//!
//! All of a job's mutable state lives behind one mutex; the terminal
//! outcome is published exactly once and broadcast through a condition
//! variable, so any number of threads can block on [`ConversionHandle::wait`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use pdfmill_core::{Error, Result};
use tracing::warn;
use uuid::Uuid;

use super::runner::ConversionContext;

/// Terminal outcome of a conversion job.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The converter produced the target document.
    Succeeded,
    /// The conversion failed with a typed converter error.
    Failed(Error),
    /// The job was cancelled before an outcome was committed.
    Cancelled,
}

/// Phase of a job's state machine. Advances are monotonic; `Done` is
/// absorbing. Only the owning worker moves a job forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Queued, not yet picked up by a worker.
    Pending,
    /// The worker is acquiring the source.
    FetchingSource,
    /// Source acquired and released; no conversion started yet.
    SourceConsumed,
    /// A converter process is running; its context is registered for
    /// cancel forwarding.
    Converting,
    /// The outcome has been decided at the commit point; cancellation can
    /// no longer change it.
    Finishing,
    /// Terminal.
    Done,
}

pub(crate) struct JobState {
    pub phase: Phase,
    /// Set by [`ConversionHandle::cancel`]; observed by the worker at its
    /// checkpoints and at the commit point.
    pub cancelled: bool,
    pub outcome: Option<Outcome>,
    /// Live conversion context, present only while `Converting`.
    pub context: Option<Arc<dyn ConversionContext>>,
}

/// State shared between the queue, the owning worker, and all handles.
pub(crate) struct JobShared {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: Mutex<JobState>,
    done: Condvar,
}

impl std::fmt::Debug for JobShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobShared")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

impl JobShared {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            state: Mutex::new(JobState {
                phase: Phase::Pending,
                cancelled: false,
                outcome: None,
                context: None,
            }),
            done: Condvar::new(),
        }
    }

    /// Publish the terminal outcome and wake all waiters. First write wins;
    /// a second publication is a bug upstream and is dropped with a warning.
    pub(crate) fn publish(&self, outcome: Outcome) {
        let mut state = self.state.lock();
        if state.outcome.is_some() {
            warn!("job {} already has a terminal outcome, dropping {:?}", self.id, outcome);
            return;
        }
        state.phase = Phase::Done;
        state.context = None;
        state.outcome = Some(outcome);
        self.done.notify_all();
    }

    pub(crate) fn is_done(&self) -> bool {
        self.state.lock().outcome.is_some()
    }
}

/// Thread-safe view onto a pending, executing, or finished conversion.
///
/// Handles are cheap to clone; all clones observe the same job.
#[derive(Clone, Debug)]
pub struct ConversionHandle {
    shared: Arc<JobShared>,
}

impl ConversionHandle {
    pub(crate) fn new(shared: Arc<JobShared>) -> Self {
        Self { shared }
    }

    /// Unique id of the underlying job.
    pub fn job_id(&self) -> Uuid {
        self.shared.id
    }

    /// Block until the job is terminal.
    ///
    /// Returns `Ok(true)` on success, `Ok(false)` when the job was
    /// cancelled, and the typed converter error when the conversion failed.
    pub fn wait(&self) -> Result<bool> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return terminal_result(outcome);
            }
            self.shared.done.wait(&mut state);
        }
    }

    /// Block until the job is terminal, or until `timeout` elapses.
    ///
    /// Timing out returns [`Error::Timeout`] and leaves the job untouched.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return terminal_result(outcome);
            }
            if self.shared.done.wait_until(&mut state, deadline).timed_out() {
                return Err(Error::Timeout(timeout));
            }
        }
    }

    /// Request cancellation of the job.
    ///
    /// Returns `true` only if this call set the cancel flag, i.e. caused the
    /// eventual transition to the cancelled state. Returns `false` once the
    /// outcome is decided or terminal, and on repeated calls.
    ///
    /// `_may_interrupt_if_running` is accepted for API compatibility; a live
    /// converter process is always terminated, since the job's outcome is
    /// already fixed to cancelled at that point.
    ///
    /// A `true` return does not mean the job is terminal yet; use
    /// [`wait`](Self::wait) to synchronize with the terminal transition.
    pub fn cancel(&self, _may_interrupt_if_running: bool) -> bool {
        let context = {
            let mut state = self.shared.state.lock();
            if state.outcome.is_some() || state.cancelled {
                return false;
            }
            if state.phase == Phase::Finishing {
                // The worker has committed to success or failure.
                return false;
            }
            state.cancelled = true;
            state.context.clone()
        };
        // Forward into a live conversion outside the lock; killing the child
        // unblocks the worker's wait on the context.
        if let Some(context) = context {
            context.cancel();
        }
        true
    }

    /// Whether the job reached any terminal state.
    pub fn is_done(&self) -> bool {
        self.shared.is_done()
    }

    /// Whether the job terminated as cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.shared.state.lock().outcome, Some(Outcome::Cancelled))
    }
}

fn terminal_result(outcome: &Outcome) -> Result<bool> {
    match outcome {
        Outcome::Succeeded => Ok(true),
        Outcome::Cancelled => Ok(false),
        Outcome::Failed(error) => Err(error.clone()),
    }
}
