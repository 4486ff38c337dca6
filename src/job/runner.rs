//! The job state machine.
//!
//! [`drive`] runs one conversion job end-to-end on the worker thread that
//! dequeued it, invoking the job's hooks in order and observing the cancel
//! flag at the checkpoints described on [`ConversionJob`]. The terminal
//! label is decided exactly once, at the commit point after the conversion
//! context resolves.

use std::sync::Arc;

use pdfmill_core::{Error, Result};
use tracing::{debug, trace};

use super::handle::{JobShared, Outcome, Phase};

/// Outcome of an in-flight conversion context.
#[derive(Debug, Clone)]
pub enum ContextOutcome {
    /// The converter exited successfully; the target exists.
    Succeeded,
    /// The converter failed; the typed error preserves the exit code.
    Failed(Error),
    /// The conversion was cancelled and the converter process terminated.
    Cancelled,
}

/// Handle to an in-flight external conversion.
///
/// Returned by [`ConversionJob::start_conversion`] and owned by the worker
/// for the duration of the converting phase. `cancel` may be called from
/// any thread and must unblock a concurrent `wait`.
pub trait ConversionContext: Send + Sync {
    /// Block until the conversion resolves.
    fn wait(&self) -> ContextOutcome;

    /// Terminate the conversion. After this call `wait` reports
    /// [`ContextOutcome::Cancelled`], never a failure.
    fn cancel(&self);

    /// Whether the conversion has resolved.
    fn is_done(&self) -> bool;
}

/// The capability set of a conversion job.
///
/// Each hook fires at most once per job, on the single worker thread that
/// owns it, in this order: `fetch_source`, `on_source_consumed`,
/// `start_conversion`, then exactly one of `on_conversion_finished`,
/// `on_conversion_failed`, or `on_conversion_cancelled`.
///
/// `fetch_source` and `on_source_consumed` fire as a symmetric
/// acquire/release pair even when the job is cancelled before a conversion
/// starts. Cancellation observed after the pair but before a conversion is
/// running skips `start_conversion` entirely; cancellation during the
/// conversion terminates the converter process and fires
/// `on_conversion_cancelled` only.
pub trait ConversionJob: Send + 'static {
    /// The acquired source representation.
    type Source: Send;

    /// Acquire the source of the conversion. The source is known-readable
    /// when fetching begins; a missing or unreadable file is the
    /// converter's to report.
    fn fetch_source(&mut self) -> Self::Source;

    /// Release the acquired source. Paired with `fetch_source` regardless
    /// of how the job ends.
    fn on_source_consumed(&mut self, source: &Self::Source);

    /// Start the external conversion and hand back its context.
    fn start_conversion(&mut self, source: Self::Source) -> Result<Arc<dyn ConversionContext>>;

    /// The conversion succeeded and the outcome is committed. The target
    /// artifact is guaranteed to exist at this point.
    fn on_conversion_finished(&mut self, context: Arc<dyn ConversionContext>);

    /// The conversion failed and the outcome is committed.
    fn on_conversion_failed(&mut self, error: &Error);

    /// The job terminated as cancelled.
    fn on_conversion_cancelled(&mut self);
}

/// Object-safe wrapper so heterogeneous jobs share one queue.
pub(crate) trait ErasedJob: Send {
    fn drive(self: Box<Self>, shared: &JobShared);
}

impl<J: ConversionJob> ErasedJob for J {
    fn drive(self: Box<Self>, shared: &JobShared) {
        drive(*self, shared);
    }
}

/// What the commit point decided the terminal label to be.
enum Commit {
    Success,
    Failure(Error),
    Cancel,
}

/// Drive one job from `Pending` to its terminal state.
pub(crate) fn drive<J: ConversionJob>(mut job: J, shared: &JobShared) {
    let job_id = shared.id;

    // The source pair fires even when the cancel flag is already set, so
    // that an acquired source is always released.
    shared.state.lock().phase = Phase::FetchingSource;
    trace!("job {job_id}: fetching source");

    let source = job.fetch_source();
    job.on_source_consumed(&source);

    // Checkpoint: last point at which a cancel wins without a converter
    // process having been started.
    {
        let mut state = shared.state.lock();
        if state.cancelled {
            drop(state);
            debug!("job {job_id}: cancelled before conversion start");
            job.on_conversion_cancelled();
            shared.publish(Outcome::Cancelled);
            return;
        }
        state.phase = Phase::SourceConsumed;
    }

    let context = match job.start_conversion(source) {
        Ok(context) => context,
        Err(error) => {
            debug!("job {job_id}: failed to start conversion: {error}");
            job.on_conversion_failed(&error);
            shared.publish(Outcome::Failed(error));
            return;
        }
    };

    // Register the live context so a cancel reaches the converter process.
    // A cancel that landed while the conversion was being started is
    // forwarded here.
    {
        let mut state = shared.state.lock();
        state.phase = Phase::Converting;
        state.context = Some(Arc::clone(&context));
        if state.cancelled {
            drop(state);
            context.cancel();
        }
    }

    trace!("job {job_id}: waiting on converter");
    let outcome = context.wait();

    // Commit point: the one place the terminal label is decided. A cancel
    // that landed before this lock wins; afterwards cancel() returns false.
    let commit = {
        let mut state = shared.state.lock();
        state.context = None;
        if state.cancelled {
            Commit::Cancel
        } else {
            match outcome {
                ContextOutcome::Cancelled => Commit::Cancel,
                ContextOutcome::Succeeded => {
                    state.phase = Phase::Finishing;
                    Commit::Success
                }
                ContextOutcome::Failed(error) => {
                    state.phase = Phase::Finishing;
                    Commit::Failure(error)
                }
            }
        }
    };

    match commit {
        Commit::Cancel => {
            debug!("job {job_id}: cancelled during conversion");
            job.on_conversion_cancelled();
            shared.publish(Outcome::Cancelled);
        }
        Commit::Success => {
            job.on_conversion_finished(context);
            debug!("job {job_id}: conversion finished");
            shared.publish(Outcome::Succeeded);
        }
        Commit::Failure(error) => {
            debug!("job {job_id}: conversion failed: {error}");
            job.on_conversion_failed(&error);
            shared.publish(Outcome::Failed(error));
        }
    }
}
