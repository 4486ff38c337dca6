//! pdfmill-core: unified error type and the external converter exit-code
//! contract.
//!
//! This crate is the foundational dependency for the pdfmill workspace. It
//! holds the closed failure taxonomy every other layer funnels into and the
//! exit-code constants shared with the wrapped converter script.

pub mod error;

// Re-export the most commonly used items at the crate root.
pub use error::{
    Error, Result, STATUS_CODE_ILLEGAL_INPUT, STATUS_CODE_INPUT_NOT_FOUND,
    STATUS_CODE_TARGET_INACCESSIBLE,
};
