//! The production job type: one file-to-file conversion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pdfmill_core::{Error, Result};
use tracing::{debug, info, trace, warn};

use crate::job::{ConversionContext, ConversionJob};

use super::driver::ScriptConverter;

/// A single office-document to PDF conversion bound to a source and target
/// path.
pub struct FileConversion {
    driver: Arc<ScriptConverter>,
    source: PathBuf,
    target: PathBuf,
    /// Whether this conversion created the target (as opposed to
    /// overwriting an existing file); decides whether a cancelled job may
    /// discard the artifact.
    created_target: bool,
}

impl FileConversion {
    pub fn new(driver: Arc<ScriptConverter>, source: PathBuf, target: PathBuf) -> Self {
        Self {
            driver,
            source,
            target,
            created_target: false,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl ConversionJob for FileConversion {
    type Source = PathBuf;

    fn fetch_source(&mut self) -> PathBuf {
        // The driver absolutizes paths when it spawns the converter.
        debug!("fetched source {}", self.source.display());
        self.source.clone()
    }

    fn on_source_consumed(&mut self, source: &PathBuf) {
        trace!("source {} consumed", source.display());
    }

    fn start_conversion(&mut self, source: PathBuf) -> Result<Arc<dyn ConversionContext>> {
        self.created_target = !self.target.exists();
        let context = self.driver.convert(&source, &self.target)?;
        Ok(Arc::new(context))
    }

    fn on_conversion_finished(&mut self, _context: Arc<dyn ConversionContext>) {
        info!(
            "converted {} -> {}",
            self.source.display(),
            self.target.display()
        );
    }

    fn on_conversion_failed(&mut self, error: &Error) {
        warn!("conversion of {} failed: {error}", self.source.display());
    }

    fn on_conversion_cancelled(&mut self) {
        info!("conversion of {} cancelled", self.source.display());
        // An artifact produced by a conversion that lost the cancel race is
        // discarded here; in-flight failures are cleaned up by the driver.
        if self.created_target && self.target.is_file() {
            if let Err(e) = std::fs::remove_file(&self.target) {
                warn!("failed to discard target {}: {e}", self.target.display());
            }
        }
    }
}
