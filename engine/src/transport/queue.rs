use super::RecvError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Unbounded FIFO of text lines shared between one engine and its readers.
#[derive(Default)]
pub(crate) struct LineQueue {
    lines: Mutex<VecDeque<String>>,
    ready: Condvar,
}

impl LineQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, line: String) {
        self.lock().push_back(line);
        self.ready.notify_all();
    }

    pub(crate) fn try_pop(&self) -> Option<String> {
        self.lock().pop_front()
    }

    /// Wait for the next line until one arrives, `running` is cleared, or the
    /// deadline passes. Lines already queued are still handed out after
    /// `running` is cleared.
    pub(crate) fn pop_until(
        &self,
        running: &AtomicBool,
        deadline: Option<Instant>,
    ) -> Result<String, RecvError> {
        let mut lines = self.lock();
        loop {
            if let Some(line) = lines.pop_front() {
                return Ok(line);
            }
            if !running.load(Ordering::Acquire) {
                return Err(RecvError::Closed);
            }
            lines = match deadline {
                None => self
                    .ready
                    .wait(lines)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(RecvError::Timeout);
                    }
                    self.ready
                        .wait_timeout(lines, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Wake every blocked reader so it re-checks its exit conditions.
    pub(crate) fn wake_all(&self) {
        let _lines = self.lock();
        self.ready.notify_all();
    }

    pub(crate) fn clear(&self) -> usize {
        let mut lines = self.lock();
        let drained = lines.len();
        lines.clear();
        drained
    }
}
