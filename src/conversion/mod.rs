//! Document conversion module.
//!
//! This module owns the interaction with the external converter:
//!
//! - [`ScriptConverter`] spawns and supervises the converter script and
//!   translates its exit-code contract into typed errors
//! - [`FileConversion`] is the production job type for one
//!   source-file-to-target-file conversion
//! - [`ConversionManager`] is the facade that queues jobs and hands out
//!   result handles

mod driver;
mod file_job;
mod manager;

pub use driver::{ScriptContext, ScriptConverter};
pub use file_job::FileConversion;
pub use manager::{ConversionManager, ManagerStats};
