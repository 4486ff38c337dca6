//! Conversion job pipeline.
//!
//! A job travels through a priority queue to a worker thread, which drives
//! its state machine end-to-end:
//!
//! ```text
//! Pending -> FetchingSource -> SourceConsumed -> Converting -> Done
//! ```
//!
//! Cancellation can arrive from any thread at any time through the job's
//! [`ConversionHandle`]; the runner observes it at well-defined checkpoints
//! and decides the terminal label at a single commit point.

mod handle;
mod queue;
mod runner;
mod worker;

pub use handle::{ConversionHandle, Outcome};
pub use runner::{ContextOutcome, ConversionContext, ConversionJob};

pub(crate) use handle::JobShared;
pub(crate) use queue::JobQueue;
pub(crate) use worker::{PoolCounters, WorkerPool};

/// Well-known job priorities. Any `i32` is accepted; larger runs earlier.
pub mod priority {
    /// Background work that should yield to everything else.
    pub const LOW: i32 = -100;
    /// Default priority for interactive conversions.
    pub const NORMAL: i32 = 0;
    /// Urgent conversions that jump the queue.
    pub const HIGH: i32 = 100;
}
