//! Uniform line transport to a UCI engine, embedded or external.

mod embedded;
mod external;
mod queue;

pub use embedded::{EmbeddedEngine, EngineInput, EngineIo, EngineOutput};
pub use external::find_engine_path;

use queue::LineQueue;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How long `close` waits for an embedded engine to leave its command loop.
const EMBEDDED_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to spawn engine {path:?}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Engine process has no {0}")]
    MissingPipe(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    #[error("engine closed")]
    Closed,
    #[error("timed out waiting for engine output")]
    Timeout,
}

/// Which backend to open.
#[derive(Clone)]
pub enum EngineKind {
    Embedded(Arc<dyn EmbeddedEngine>),
    External(PathBuf),
}

impl fmt::Debug for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded(engine) => f.debug_tuple("Embedded").field(&engine.name()).finish(),
            Self::External(path) => f.debug_tuple("External").field(path).finish(),
        }
    }
}

enum Backend {
    Embedded {
        inbox: Arc<LineQueue>,
        thread: Mutex<Option<std::thread::JoinHandle<()>>>,
        done: Mutex<Option<mpsc::Receiver<()>>>,
    },
    External(external::ExternalProcess),
}

/// One running engine instance.
///
/// Commands go in through [`send`](Self::send); response lines come out
/// through the receive methods in the order the engine wrote them. Dropping
/// the handle closes it.
pub struct EngineHandle {
    label: String,
    running: Arc<AtomicBool>,
    closed: AtomicBool,
    outbox: Arc<LineQueue>,
    backend: Backend,
    exchange: Mutex<()>,
}

impl EngineHandle {
    pub fn open(kind: EngineKind) -> Result<Self, TransportError> {
        match kind {
            EngineKind::Embedded(engine) => Self::open_embedded(engine),
            EngineKind::External(path) => Self::open_external(&path),
        }
    }

    pub fn open_embedded(engine: Arc<dyn EmbeddedEngine>) -> Result<Self, TransportError> {
        let label = format!("embedded:{}", engine.name());
        let running = Arc::new(AtomicBool::new(true));
        let outbox = Arc::new(LineQueue::new());
        let worker = embedded::spawn(engine, outbox.clone(), running.clone())?;

        Ok(Self {
            label,
            running,
            closed: AtomicBool::new(false),
            outbox,
            backend: Backend::Embedded {
                inbox: worker.inbox,
                thread: Mutex::new(Some(worker.thread)),
                done: Mutex::new(Some(worker.done)),
            },
            exchange: Mutex::new(()),
        })
    }

    pub fn open_external(path: &Path) -> Result<Self, TransportError> {
        let running = Arc::new(AtomicBool::new(true));
        let outbox = Arc::new(LineQueue::new());
        let process = external::spawn(path, outbox.clone(), running.clone())?;

        Ok(Self {
            label: format!("external:{}", process.path.display()),
            running,
            closed: AtomicBool::new(false),
            outbox,
            backend: Backend::External(process),
            exchange: Mutex::new(()),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.backend, Backend::Embedded { .. })
    }

    /// False once the handle is closed or the engine has exited.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Send one command line. Never blocks on the engine; commands to a dead
    /// engine are dropped.
    pub fn send(&self, command: impl fmt::Display) {
        let line = command.to_string();
        tracing::trace!(engine = %self.label, "UCI >> {}", line);
        match &self.backend {
            Backend::Embedded { inbox, .. } => inbox.push(line),
            Backend::External(process) => process.write_line(&line),
        }
    }

    /// Next queued response line, if any.
    pub fn try_receive(&self) -> Option<String> {
        self.outbox.try_pop()
    }

    /// Block until a line satisfying `wanted` arrives; other lines are
    /// discarded.
    pub fn receive_blocking<F>(&self, wanted: F) -> Result<String, RecvError>
    where
        F: FnMut(&str) -> bool,
    {
        self.receive_matching(wanted, None)
    }

    /// Like [`receive_blocking`](Self::receive_blocking) with a deadline.
    pub fn receive_until<F>(&self, wanted: F, deadline: Instant) -> Result<String, RecvError>
    where
        F: FnMut(&str) -> bool,
    {
        self.receive_matching(wanted, Some(deadline))
    }

    /// Next line of any kind, waiting at most `timeout`.
    pub fn receive_timeout(&self, timeout: Duration) -> Result<String, RecvError> {
        self.outbox
            .pop_until(&self.running, Some(Instant::now() + timeout))
    }

    fn receive_matching<F>(&self, mut wanted: F, deadline: Option<Instant>) -> Result<String, RecvError>
    where
        F: FnMut(&str) -> bool,
    {
        loop {
            let line = self.outbox.pop_until(&self.running, deadline)?;
            if wanted(&line) {
                return Ok(line);
            }
            tracing::trace!(engine = %self.label, "Skipping line: {}", line);
        }
    }

    /// Throw away every queued response line.
    pub fn drain(&self) -> usize {
        let drained = self.outbox.clear();
        if drained > 0 {
            tracing::debug!(engine = %self.label, "Drained {} stale lines", drained);
        }
        drained
    }

    /// Serialises request/response exchanges (`position` … `bestmove`) between
    /// threads sharing this handle.
    pub fn lock_exchange(&self) -> MutexGuard<'_, ()> {
        self.exchange.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send `quit`, stop all loops, and release the engine's threads and
    /// process. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!(engine = %self.label, "Closing engine");

        self.send(crate::EngineCommand::Quit);
        self.running.store(false, Ordering::Release);
        self.outbox.wake_all();

        match &self.backend {
            Backend::Embedded {
                inbox,
                thread,
                done,
            } => {
                inbox.wake_all();
                let done = done.lock().unwrap_or_else(PoisonError::into_inner).take();
                let thread = thread.lock().unwrap_or_else(PoisonError::into_inner).take();
                let finished = match done {
                    Some(done) => !matches!(
                        done.recv_timeout(EMBEDDED_JOIN_TIMEOUT),
                        Err(mpsc::RecvTimeoutError::Timeout)
                    ),
                    None => true,
                };
                match (finished, thread) {
                    (true, Some(thread)) => {
                        if thread.join().is_err() {
                            tracing::error!(engine = %self.label, "Embedded engine panicked");
                        }
                    }
                    (false, Some(_)) => {
                        tracing::warn!(
                            engine = %self.label,
                            "Embedded engine still busy after {:?}, detaching its thread",
                            EMBEDDED_JOIN_TIMEOUT
                        );
                    }
                    (_, None) => {}
                }
            }
            Backend::External(process) => process.shutdown(),
        }

        self.outbox.clear();
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("label", &self.label)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Check whether `path` is a UCI engine: it must answer `uci` with `uciok`
/// within `timeout`.
pub fn is_uci_binary(path: &Path, timeout: Duration) -> bool {
    let handle = match EngineHandle::open_external(path) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::debug!("Could not start {}: {}", path.display(), e);
            return false;
        }
    };

    handle.send(crate::EngineCommand::Uci);
    let ok = handle
        .receive_until(|line| line.starts_with("uciok"), Instant::now() + timeout)
        .is_ok();
    handle.close();
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedEngine;

    fn open_scripted(engine: ScriptedEngine) -> EngineHandle {
        EngineHandle::open(EngineKind::Embedded(Arc::new(engine))).unwrap()
    }

    #[test]
    fn test_embedded_handshake() {
        let handle = open_scripted(ScriptedEngine::new());
        handle.send("uci");
        let line = handle
            .receive_until(|l| l == "uciok", Instant::now() + Duration::from_secs(5))
            .unwrap();
        assert_eq!(line, "uciok");
        assert!(handle.is_embedded());
        assert!(handle.is_running());
        handle.close();
        assert!(!handle.is_running());
    }

    #[test]
    fn test_embedded_bestmove_roundtrip() {
        let engine = ScriptedEngine::new().with_bestmove("e2e4");
        let handle = open_scripted(engine);
        handle.send("position fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");
        handle.send("go depth 1");
        let line = handle.receive_blocking(|l| l.starts_with("bestmove")).unwrap();
        assert_eq!(line, "bestmove e2e4");
    }

    #[test]
    fn test_close_sends_quit_first() {
        let engine = ScriptedEngine::new();
        let log = engine.command_log();
        let handle = open_scripted(engine);
        handle.send("isready");
        handle
            .receive_until(|l| l == "readyok", Instant::now() + Duration::from_secs(5))
            .unwrap();
        handle.close();
        assert_eq!(log.commands().last().map(String::as_str), Some("quit"));
    }

    #[test]
    fn test_close_is_idempotent_and_send_after_close_is_harmless() {
        let handle = open_scripted(ScriptedEngine::new());
        handle.close();
        handle.close();
        handle.send("quit");
        assert_eq!(handle.try_receive(), None);
    }

    #[test]
    fn test_receive_on_exited_engine_reports_closed() {
        let handle = open_scripted(ScriptedEngine::new());
        handle.send("quit");
        let result = handle.receive_blocking(|l| l.starts_with("bestmove"));
        assert_eq!(result, Err(RecvError::Closed));
    }

    #[test]
    fn test_receive_until_times_out() {
        let handle = open_scripted(ScriptedEngine::new().never_answer_go());
        handle.send("go depth 3");
        let result = handle.receive_until(
            |l| l.starts_with("bestmove"),
            Instant::now() + Duration::from_millis(50),
        );
        assert_eq!(result, Err(RecvError::Timeout));
    }

    #[test]
    fn test_global_init_runs_once_per_process() {
        let first = open_scripted(ScriptedEngine::new());
        let second = open_scripted(ScriptedEngine::new());
        for handle in [&first, &second] {
            handle.send("isready");
            handle
                .receive_until(|l| l == "readyok", Instant::now() + Duration::from_secs(5))
                .unwrap();
        }
        assert_eq!(crate::mock::global_init_count(), 1);
    }

    #[test]
    fn test_drain_discards_queued_output() {
        let engine = ScriptedEngine::new().with_search_info(vec![
            "info depth 1 score cp 10 pv e2e4".to_string(),
            "info depth 2 score cp 12 pv e2e4".to_string(),
        ]);
        let handle = open_scripted(engine);
        handle.send("go depth 2");
        handle.send("isready");
        std::thread::sleep(Duration::from_millis(300));

        // two infos, bestmove, readyok
        assert_eq!(handle.drain(), 4);
        assert_eq!(handle.try_receive(), None);
    }

    #[test]
    fn test_open_external_missing_binary_fails() {
        let result = EngineHandle::open(EngineKind::External(PathBuf::from(
            "/nonexistent/definitely-not-an-engine",
        )));
        assert!(matches!(result, Err(TransportError::Spawn { .. })));
    }

    #[test]
    fn test_missing_binary_is_not_uci() {
        assert!(!is_uci_binary(
            Path::new("/nonexistent/definitely-not-an-engine"),
            Duration::from_millis(100)
        ));
    }
}
