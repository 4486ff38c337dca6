//! Shared harness for the integration test suites.
//!
//! Provides a tempdir with a stand-in converter script that mirrors the
//! real script's exit-code contract, plus a hook-counting stub job and a
//! gate primitive for deterministic interleaving of cancellation with the
//! job state machine.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use pdfmill::{
    Config, ContextOutcome, ConversionContext, ConversionJob, ConversionManager, Error, Result,
};

/// Stand-in converter mirroring the real script's exit-code contract:
/// 66 missing/unreadable input, 73 inaccessible target (directory or a
/// `.lock` sibling standing in for an exclusive lock), 65 unconvertible
/// input, 0 success.
const CONVERTER_SCRIPT: &str = r#"#!/bin/sh
src="$1"
dst="$2"

if [ ! -f "$src" ] || [ ! -r "$src" ]; then
    echo "input not found: $src" >&2
    exit 66
fi
if [ -d "$dst" ] || [ -e "$dst.lock" ]; then
    echo "target inaccessible: $dst" >&2
    exit 73
fi
if grep -q "sleep-forever" "$src" 2>/dev/null; then
    sleep 600
fi
if grep -q "not-a-document" "$src" 2>/dev/null; then
    echo "unsupported document" >&2
    exit 65
fi
if grep -q "no-output" "$src" 2>/dev/null; then
    exit 0
fi
printf '%%PDF-1.4\n' > "$dst" || { echo "write failed: $dst" >&2; exit 73; }
exit 0
"#;

pub struct TestHarness {
    pub dir: tempfile::TempDir,
    pub script: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("doc2pdf.sh");
        std::fs::write(&script, CONVERTER_SCRIPT).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        Self { dir, script }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.converter.script = self.script.clone();
        config
    }

    pub fn manager(&self) -> ConversionManager {
        self.manager_with(|_| {})
    }

    pub fn manager_with(&self, tweak: impl FnOnce(&mut Config)) -> ConversionManager {
        let mut config = self.config();
        tweak(&mut config);
        ConversionManager::new(config).unwrap()
    }

    /// Write a source document with the given contents.
    pub fn source(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn valid_docx(&self) -> PathBuf {
        self.source("valid.docx", "a perfectly fine document")
    }

    /// A source the converter rejects as unconvertible.
    pub fn corrupt_docx(&self) -> PathBuf {
        self.source("corrupt.docx", "not-a-document")
    }

    /// A source that keeps the converter busy until it is killed.
    pub fn slow_docx(&self) -> PathBuf {
        self.source("slow.docx", "sleep-forever")
    }

    /// A source the converter claims to convert without writing the target.
    pub fn phantom_docx(&self) -> PathBuf {
        self.source("phantom.docx", "no-output")
    }

    pub fn missing_docx(&self) -> PathBuf {
        self.dir.path().join("missing.docx")
    }

    pub fn target(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

// ---------------------------------------------------------------------------
// Deterministic interleaving support
// ---------------------------------------------------------------------------

/// One side of a rendezvous point inside a job hook: `pass` announces entry
/// and blocks until the controlling test releases it.
pub struct Gate {
    enter_tx: mpsc::Sender<()>,
    release_rx: mpsc::Receiver<()>,
}

impl Gate {
    pub fn pass(&self) {
        let _ = self.enter_tx.send(());
        let _ = self.release_rx.recv();
    }
}

/// Test-side control of a [`Gate`].
pub struct GateControl {
    enter_rx: mpsc::Receiver<()>,
    release_tx: mpsc::Sender<()>,
}

impl GateControl {
    /// Block until the gated hook has been entered.
    pub fn await_entry(&self) {
        self.enter_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("gated hook was not reached");
    }

    pub fn release(&self) {
        let _ = self.release_tx.send(());
    }
}

pub fn gate() -> (Gate, GateControl) {
    let (enter_tx, enter_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    (
        Gate {
            enter_tx,
            release_rx,
        },
        GateControl {
            enter_rx,
            release_tx,
        },
    )
}

// ---------------------------------------------------------------------------
// Hook-counting stub job
// ---------------------------------------------------------------------------

/// Per-hook invocation counters, one per job.
#[derive(Default)]
pub struct HookCounters {
    pub fetch_source: AtomicUsize,
    pub on_source_consumed: AtomicUsize,
    pub start_conversion: AtomicUsize,
    pub on_conversion_finished: AtomicUsize,
    pub on_conversion_failed: AtomicUsize,
    pub on_conversion_cancelled: AtomicUsize,
}

impl HookCounters {
    /// Assert the full counter vector, in hook invocation order.
    pub fn assert_vector(
        &self,
        fetch_source: usize,
        on_source_consumed: usize,
        start_conversion: usize,
        on_conversion_finished: usize,
        on_conversion_cancelled: usize,
        on_conversion_failed: usize,
    ) {
        assert_eq!(
            self.fetch_source.load(Ordering::SeqCst),
            fetch_source,
            "fetch_source count"
        );
        assert_eq!(
            self.on_source_consumed.load(Ordering::SeqCst),
            on_source_consumed,
            "on_source_consumed count"
        );
        assert_eq!(
            self.start_conversion.load(Ordering::SeqCst),
            start_conversion,
            "start_conversion count"
        );
        assert_eq!(
            self.on_conversion_finished.load(Ordering::SeqCst),
            on_conversion_finished,
            "on_conversion_finished count"
        );
        assert_eq!(
            self.on_conversion_cancelled.load(Ordering::SeqCst),
            on_conversion_cancelled,
            "on_conversion_cancelled count"
        );
        assert_eq!(
            self.on_conversion_failed.load(Ordering::SeqCst),
            on_conversion_failed,
            "on_conversion_failed count"
        );
    }
}

/// How a stub conversion context resolves.
pub enum StubMode {
    Succeed,
    Fail,
    BlockUntilCancel,
}

/// In-memory stand-in for a converter process.
pub struct StubContext {
    mode: StubMode,
    cancelled: Mutex<bool>,
    unblock: Condvar,
    waiting_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl StubContext {
    pub fn new(mode: StubMode) -> Self {
        Self {
            mode,
            cancelled: Mutex::new(false),
            unblock: Condvar::new(),
            waiting_tx: Mutex::new(None),
        }
    }

    fn with_wait_signal(mode: StubMode, tx: mpsc::Sender<()>) -> Self {
        let context = Self::new(mode);
        *context.waiting_tx.lock().unwrap() = Some(tx);
        context
    }
}

impl ConversionContext for StubContext {
    fn wait(&self) -> ContextOutcome {
        if let Some(tx) = self.waiting_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
        match self.mode {
            StubMode::Succeed => ContextOutcome::Succeeded,
            StubMode::Fail => ContextOutcome::Failed(Error::ConverterFailure {
                exit_code: Some(1),
                detail: "stub conversion failed".to_string(),
            }),
            StubMode::BlockUntilCancel => {
                let mut cancelled = self.cancelled.lock().unwrap();
                while !*cancelled {
                    cancelled = self.unblock.wait(cancelled).unwrap();
                }
                ContextOutcome::Cancelled
            }
        }
    }

    fn cancel(&self) {
        *self.cancelled.lock().unwrap() = true;
        self.unblock.notify_all();
    }

    fn is_done(&self) -> bool {
        false
    }
}

/// A [`ConversionJob`] that counts every hook invocation and can block at
/// named checkpoints so a test thread can interleave `cancel` calls
/// deterministically.
pub struct StubJob {
    pub counters: Arc<HookCounters>,
    context: Option<StubContext>,
    fetch_gate: Option<Gate>,
    start_gate: Option<Gate>,
    finished_gate: Option<Gate>,
    failed_gate: Option<Gate>,
    order_log: Option<(String, Arc<Mutex<Vec<String>>>)>,
}

impl StubJob {
    pub fn new(counters: Arc<HookCounters>, mode: StubMode) -> Self {
        Self {
            counters,
            context: Some(StubContext::new(mode)),
            fetch_gate: None,
            start_gate: None,
            finished_gate: None,
            failed_gate: None,
            order_log: None,
        }
    }

    /// Block inside `fetch_source` until released.
    pub fn gated_on_fetch(mut self, gate: Gate) -> Self {
        self.fetch_gate = Some(gate);
        self
    }

    /// Block inside `start_conversion` until released.
    pub fn gated_on_start(mut self, gate: Gate) -> Self {
        self.start_gate = Some(gate);
        self
    }

    /// Block inside `on_conversion_finished` until released.
    pub fn gated_on_finished(mut self, gate: Gate) -> Self {
        self.finished_gate = Some(gate);
        self
    }

    /// Block inside `on_conversion_failed` until released.
    pub fn gated_on_failed(mut self, gate: Gate) -> Self {
        self.failed_gate = Some(gate);
        self
    }

    /// Signal through `tx` once the worker is blocked on the context.
    pub fn signalling_wait(mut self, mode: StubMode, tx: mpsc::Sender<()>) -> Self {
        self.context = Some(StubContext::with_wait_signal(mode, tx));
        self
    }

    /// Record this job's execution under `label` when it is picked up.
    pub fn logging_order(mut self, label: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.order_log = Some((label.to_string(), log));
        self
    }
}

impl ConversionJob for StubJob {
    type Source = ();

    fn fetch_source(&mut self) {
        self.counters.fetch_source.fetch_add(1, Ordering::SeqCst);
        if let Some((label, log)) = &self.order_log {
            log.lock().unwrap().push(label.clone());
        }
        if let Some(gate) = &self.fetch_gate {
            gate.pass();
        }
    }

    fn on_source_consumed(&mut self, _source: &()) {
        self.counters
            .on_source_consumed
            .fetch_add(1, Ordering::SeqCst);
    }

    fn start_conversion(&mut self, _source: ()) -> Result<Arc<dyn ConversionContext>> {
        self.counters
            .start_conversion
            .fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.start_gate {
            gate.pass();
        }
        let context = self.context.take().expect("start_conversion fired once");
        Ok(Arc::new(context))
    }

    fn on_conversion_finished(&mut self, _context: Arc<dyn ConversionContext>) {
        self.counters
            .on_conversion_finished
            .fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.finished_gate {
            gate.pass();
        }
    }

    fn on_conversion_failed(&mut self, _error: &Error) {
        self.counters
            .on_conversion_failed
            .fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.failed_gate {
            gate.pass();
        }
    }

    fn on_conversion_cancelled(&mut self) {
        self.counters
            .on_conversion_cancelled
            .fetch_add(1, Ordering::SeqCst);
    }
}
