//! In-process engines driven through injected line queues.
//!
//! An engine written around blocking console I/O runs unmodified on a
//! dedicated thread: its input is an [`EngineInput`] (a [`BufRead`] that blocks
//! on the handle's inbox) and its output an [`EngineOutput`] (a [`Write`] that
//! turns every completed line into an outbox entry).

use super::queue::LineQueue;
use super::TransportError;
use std::io::{self, BufRead, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Once};
use std::thread::{self, JoinHandle};

/// An engine library that can be hosted inside this process.
pub trait EmbeddedEngine: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Guard for [`EmbeddedEngine::global_init`]; implementations return a
    /// `static` so the initializer runs once per process.
    fn init_guard(&self) -> &'static Once;

    /// Process-wide table setup (attack tables, network weights, ...).
    fn global_init(&self) {}

    /// The engine's command loop. Returns when `quit` is read or the input
    /// reaches end of stream.
    fn run(&self, io: EngineIo);
}

/// Standard streams handed to an embedded engine.
pub struct EngineIo {
    pub input: EngineInput,
    pub output: EngineOutput,
}

/// Blocking line source backed by the handle's inbox.
pub struct EngineInput {
    inbox: Arc<LineQueue>,
    running: Arc<AtomicBool>,
    current: Vec<u8>,
    pos: usize,
}

impl EngineInput {
    /// Next command, or `None` once the handle is closed and the inbox is empty.
    pub fn read_command(&mut self) -> Option<String> {
        if self.pos < self.current.len() {
            let rest = String::from_utf8_lossy(&self.current[self.pos..]).into_owned();
            self.pos = self.current.len();
            return Some(rest.trim_end_matches('\n').to_string());
        }
        self.inbox.pop_until(&self.running, None).ok()
    }
}

impl Iterator for EngineInput {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.read_command()
    }
}

impl Read for EngineInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.fill_buf()?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl BufRead for EngineInput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.current.len() {
            match self.inbox.pop_until(&self.running, None) {
                Ok(line) => {
                    self.current = line.into_bytes();
                    self.current.push(b'\n');
                    self.pos = 0;
                }
                Err(_) => {
                    self.current.clear();
                    self.pos = 0;
                }
            }
        }
        Ok(&self.current[self.pos..])
    }

    fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.current.len());
    }
}

/// Line-assembling sink backed by the handle's outbox.
pub struct EngineOutput {
    outbox: Arc<LineQueue>,
    pending: Vec<u8>,
}

impl EngineOutput {
    /// Emit one complete line.
    pub fn send_line(&mut self, line: &str) {
        self.complete_pending();
        tracing::trace!("UCI << {}", line);
        self.outbox.push(line.to_string());
    }

    fn complete_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        if self.pending.last() == Some(&b'\r') {
            self.pending.pop();
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tracing::trace!("UCI << {}", line);
        self.outbox.push(line);
    }
}

impl Write for EngineOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte == b'\n' {
                if self.pending.is_empty() {
                    self.outbox.push(String::new());
                } else {
                    self.complete_pending();
                }
            } else {
                self.pending.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for EngineOutput {
    fn drop(&mut self) {
        self.complete_pending();
    }
}

/// Worker thread running an embedded engine's command loop.
pub(crate) struct EmbeddedWorker {
    pub(crate) inbox: Arc<LineQueue>,
    pub(crate) thread: JoinHandle<()>,
    /// Disconnects when the worker thread finishes.
    pub(crate) done: mpsc::Receiver<()>,
}

pub(crate) fn spawn(
    engine: Arc<dyn EmbeddedEngine>,
    outbox: Arc<LineQueue>,
    running: Arc<AtomicBool>,
) -> Result<EmbeddedWorker, TransportError> {
    let inbox = Arc::new(LineQueue::new());
    let (done_tx, done) = mpsc::channel::<()>();

    let io = EngineIo {
        input: EngineInput {
            inbox: inbox.clone(),
            running: running.clone(),
            current: Vec::new(),
            pos: 0,
        },
        output: EngineOutput {
            outbox: outbox.clone(),
            pending: Vec::new(),
        },
    };

    let inbox_for_thread = inbox.clone();
    let thread = thread::Builder::new()
        .name(format!("engine-{}", engine.name()))
        .spawn(move || {
            let _done = done_tx;
            engine.init_guard().call_once(|| {
                tracing::debug!("Running one-time init for embedded engine {}", engine.name());
                engine.global_init();
            });

            tracing::info!("Embedded engine {} started", engine.name());
            engine.run(io);
            tracing::info!("Embedded engine {} exited", engine.name());

            running.store(false, Ordering::Release);
            outbox.wake_all();
            inbox_for_thread.wake_all();
        })?;

    Ok(EmbeddedWorker {
        inbox,
        thread,
        done,
    })
}
