//! External converter driver.
//!
//! Runs the converter shell script as a child process with
//! `(source_path, target_path)` arguments and translates its exit code into
//! the typed failure taxonomy. The returned [`ScriptContext`] supervises
//! the child: it can be waited on by the owning worker and cancelled from
//! any other thread, which terminates the process.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use pdfmill_core::{Error, Result};
use tracing::{debug, trace, warn};

use crate::config::ConverterConfig;
use crate::job::{ContextOutcome, ConversionContext};

/// How often a blocked `wait` polls the child for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Driver for the external converter script.
pub struct ScriptConverter {
    script: PathBuf,
    timeout: Duration,
}

impl ScriptConverter {
    /// Resolve the configured script and build a driver around it.
    pub fn new(config: &ConverterConfig) -> Result<Self> {
        let script = config.resolve_script()?;
        debug!("using converter script {}", script.display());
        Ok(Self {
            script,
            timeout: config.timeout,
        })
    }

    /// Absolute path of the wrapped converter script.
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Launch a conversion of `source` into `target`.
    ///
    /// The conversion runs concurrently; observe it through the returned
    /// context. The driver never retries.
    pub fn convert(&self, source: &Path, target: &Path) -> Result<ScriptContext> {
        let source = std::path::absolute(source).map_err(Error::io)?;
        let target = std::path::absolute(target).map_err(Error::io)?;
        let target_preexisted = target.exists();

        let mut child = Command::new(&self.script)
            .arg(&source)
            .arg(&target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::ConverterFailure {
                exit_code: None,
                detail: format!("failed to spawn converter {}: {e}", self.script.display()),
            })?;

        debug!(
            "converter started: {} -> {}",
            source.display(),
            target.display()
        );

        let stdout = spawn_collector(child.stdout.take());
        let stderr = spawn_collector(child.stderr.take());

        Ok(ScriptContext {
            inner: Mutex::new(ContextInner {
                child: Some(child),
                stdout: Some(stdout),
                stderr: Some(stderr),
                cancelled: false,
                timed_out: false,
                outcome: None,
            }),
            target,
            target_preexisted,
            deadline: Instant::now() + self.timeout,
            timeout: self.timeout,
        })
    }
}

/// Drain a child pipe on its own thread so the process never blocks on a
/// full pipe buffer.
fn spawn_collector<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut buffer);
        }
        buffer
    })
}

#[derive(Debug)]
struct ContextInner {
    child: Option<Child>,
    stdout: Option<JoinHandle<String>>,
    stderr: Option<JoinHandle<String>>,
    cancelled: bool,
    timed_out: bool,
    outcome: Option<ContextOutcome>,
}

/// Handle to an in-flight converter process.
#[derive(Debug)]
pub struct ScriptContext {
    inner: Mutex<ContextInner>,
    target: PathBuf,
    target_preexisted: bool,
    deadline: Instant,
    timeout: Duration,
}

impl ScriptContext {
    /// Reap the exited child and decide the context outcome.
    fn reap(&self, inner: &mut ContextInner, status: ExitStatus) -> ContextOutcome {
        inner.child = None;
        let stdout = inner
            .stdout
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        let stderr = inner
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if !stdout.trim().is_empty() {
            trace!("converter stdout: {}", stdout.trim());
        }

        // A cancel always reports as cancelled, even when the child managed
        // to exit on its own in the meantime.
        let outcome = if inner.cancelled {
            ContextOutcome::Cancelled
        } else if inner.timed_out {
            ContextOutcome::Failed(Error::ConverterFailure {
                exit_code: status.code(),
                detail: format!("converter timed out after {:?}", self.timeout),
            })
        } else if status.success() {
            // Success is only reported with the artifact in place.
            if self.target.is_file() {
                ContextOutcome::Succeeded
            } else {
                ContextOutcome::Failed(Error::ConverterFailure {
                    exit_code: None,
                    detail: format!(
                        "converter reported success but produced no file at {}",
                        self.target.display()
                    ),
                })
            }
        } else {
            ContextOutcome::Failed(Error::from_exit(status.code(), &stderr))
        };

        match &outcome {
            ContextOutcome::Failed(error) => {
                warn!("converter for {} failed: {error}", self.target.display());
                self.discard_partial_target();
            }
            ContextOutcome::Cancelled => {
                debug!("converter for {} cancelled", self.target.display());
                self.discard_partial_target();
            }
            ContextOutcome::Succeeded => {}
        }

        inner.outcome = Some(outcome.clone());
        outcome
    }

    /// Remove a target the converter created before failing or being
    /// cancelled. A pre-existing target (directory, locked file, overwrite)
    /// is left untouched.
    fn discard_partial_target(&self) {
        if self.target_preexisted {
            return;
        }
        if self.target.is_file() {
            if let Err(e) = std::fs::remove_file(&self.target) {
                warn!(
                    "failed to remove partial target {}: {e}",
                    self.target.display()
                );
            } else {
                debug!("removed partial target {}", self.target.display());
            }
        }
    }
}

impl ConversionContext for ScriptContext {
    fn wait(&self) -> ContextOutcome {
        loop {
            {
                let mut guard = self.inner.lock();
                let inner = &mut *guard;
                if let Some(outcome) = &inner.outcome {
                    return outcome.clone();
                }
                if let Some(child) = inner.child.as_mut() {
                    match child.try_wait() {
                        Ok(Some(status)) => return self.reap(inner, status),
                        Ok(None) => {
                            if !inner.timed_out && Instant::now() >= self.deadline {
                                warn!(
                                    "converter for {} exceeded {:?}, killing it",
                                    self.target.display(),
                                    self.timeout
                                );
                                inner.timed_out = true;
                                let _ = child.kill();
                            }
                        }
                        Err(e) => {
                            let _ = child.kill();
                            let outcome = ContextOutcome::Failed(Error::ConverterFailure {
                                exit_code: None,
                                detail: format!("I/O error waiting for converter: {e}"),
                            });
                            inner.outcome = Some(outcome.clone());
                            self.discard_partial_target();
                            return outcome;
                        }
                    }
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn cancel(&self) {
        let mut inner = self.inner.lock();
        if inner.outcome.is_some() || inner.cancelled {
            return;
        }
        inner.cancelled = true;
        if let Some(child) = inner.child.as_mut() {
            debug!("terminating converter process for {}", self.target.display());
            let _ = child.kill();
        }
    }

    fn is_done(&self) -> bool {
        self.inner.lock().outcome.is_some()
    }
}
