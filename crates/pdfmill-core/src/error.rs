//! Unified error type for the pdfmill conversion core.
//!
//! All layers funnel their failures into [`Error`]. Converter failures keep
//! the exit code reported by the external script verbatim, so callers can
//! distinguish the contract categories without string matching.

use std::time::Duration;

/// Exit code the converter script uses for a source that exists but cannot
/// be converted (corrupt or unsupported document). `EX_DATAERR`.
pub const STATUS_CODE_ILLEGAL_INPUT: i32 = 65;

/// Exit code for a source that does not exist or is not readable.
/// `EX_NOINPUT`.
pub const STATUS_CODE_INPUT_NOT_FOUND: i32 = 66;

/// Exit code for a target that is a directory, exclusively locked, or
/// otherwise not writable. `EX_CANTCREAT`.
pub const STATUS_CODE_TARGET_INACCESSIBLE: i32 = 73;

/// Unified error type covering all failure modes in pdfmill.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The source document exists but the converter cannot render it.
    #[error("source is not convertible (converter exit code {exit_code}): {detail}")]
    IllegalInput {
        /// Exit code reported by the converter script.
        exit_code: i32,
        /// Captured converter stderr.
        detail: String,
    },

    /// The source document does not exist or is not readable.
    #[error("source not found or unreadable (converter exit code {exit_code}): {detail}")]
    InputNotFound {
        /// Exit code reported by the converter script.
        exit_code: i32,
        /// Captured converter stderr.
        detail: String,
    },

    /// The target path is a directory, exclusively locked, or not writable.
    #[error("target not writable (converter exit code {exit_code}): {detail}")]
    TargetInaccessible {
        /// Exit code reported by the converter script.
        exit_code: i32,
        /// Captured converter stderr.
        detail: String,
    },

    /// The converter failed in a way outside the contract categories.
    #[error("{}", fmt_converter_failure(.exit_code, .detail))]
    ConverterFailure {
        /// Exit code, when the process exited normally.
        exit_code: Option<i32>,
        /// Captured converter stderr or a spawn/supervision description.
        detail: String,
    },

    /// The conversion was cancelled.
    #[error("conversion cancelled")]
    Cancelled,

    /// A bounded wait on a result handle expired. The job itself is
    /// unaffected.
    #[error("timed out after {0:?} waiting for a conversion result")]
    Timeout(Duration),

    /// The conversion pool has been shut down; no new jobs are accepted.
    #[error("conversion pool is shut down")]
    PoolClosed,

    /// An I/O operation outside the converter process failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

fn fmt_converter_failure(exit_code: &Option<i32>, detail: &str) -> String {
    match exit_code {
        Some(code) => format!("converter failed with exit code {code}: {detail}"),
        None => format!("converter failed: {detail}"),
    }
}

impl Error {
    /// Classify a converter exit into the contract taxonomy.
    ///
    /// `code` is `None` when the process was terminated by a signal.
    pub fn from_exit(code: Option<i32>, stderr: &str) -> Self {
        let detail = stderr.trim().to_string();
        match code {
            Some(STATUS_CODE_ILLEGAL_INPUT) => Error::IllegalInput {
                exit_code: STATUS_CODE_ILLEGAL_INPUT,
                detail,
            },
            Some(STATUS_CODE_INPUT_NOT_FOUND) => Error::InputNotFound {
                exit_code: STATUS_CODE_INPUT_NOT_FOUND,
                detail,
            },
            Some(STATUS_CODE_TARGET_INACCESSIBLE) => Error::TargetInaccessible {
                exit_code: STATUS_CODE_TARGET_INACCESSIBLE,
                detail,
            },
            Some(code) => Error::ConverterFailure {
                exit_code: Some(code),
                detail,
            },
            None => Error::ConverterFailure {
                exit_code: None,
                detail: if detail.is_empty() {
                    "converter terminated by signal".to_string()
                } else {
                    format!("converter terminated by signal: {detail}")
                },
            },
        }
    }

    /// Convenience constructor for [`Error::Io`].
    pub fn io(source: std::io::Error) -> Self {
        Error::Io(source.to_string())
    }

    /// The converter exit code carried by this error, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::IllegalInput { exit_code, .. }
            | Error::InputNotFound { exit_code, .. }
            | Error::TargetInaccessible { exit_code, .. } => Some(*exit_code),
            Error::ConverterFailure { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}
