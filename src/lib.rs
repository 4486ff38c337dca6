//! pdfmill - office-document to PDF conversion
//!
//! pdfmill converts word-processing documents to PDF by delegating the
//! rendering to an external, process-isolated converter (a headless office
//! application invoked through a shell script). The library supervises that
//! child process and wraps it in a priority-ordered, cancelable job
//! pipeline: submit a `(source, target)` pair to the
//! [`ConversionManager`](conversion::ConversionManager) and observe the
//! outcome through the returned
//! [`ConversionHandle`](job::ConversionHandle).

pub mod config;
pub mod conversion;
pub mod job;

// Re-export the most commonly used items at the crate root.
pub use config::{Config, ConverterConfig, PoolConfig};
pub use conversion::{ConversionManager, FileConversion, ManagerStats, ScriptConverter};
pub use job::{ContextOutcome, ConversionContext, ConversionHandle, ConversionJob, Outcome};
pub use pdfmill_core::{
    Error, Result, STATUS_CODE_ILLEGAL_INPUT, STATUS_CODE_INPUT_NOT_FOUND,
    STATUS_CODE_TARGET_INACCESSIBLE,
};
