//! The UI-thread side of the bridge.
//!
//! Worker threads never touch [`Controller`] state. They post closures through
//! a [`UiHandle`], and whoever owns the controller runs them from the
//! [`UiLoop`]. The handle also counts live workers, so shutdown can keep
//! running the loop until nothing can post to it any more.

use crate::controller::Controller;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub type UiTask = Box<dyn FnOnce(&mut Controller) + Send>;

/// Create a connected handle/loop pair.
pub fn channel() -> (UiHandle, UiLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    let outstanding = Arc::new(AtomicUsize::new(0));
    (
        UiHandle {
            tx,
            outstanding: outstanding.clone(),
        },
        UiLoop { rx, outstanding },
    )
}

/// Schedules work onto the UI thread. Cheap to clone and `Send`.
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiTask>,
    /// Queued tasks plus live workers.
    outstanding: Arc<AtomicUsize>,
}

impl UiHandle {
    /// Queue `task` to run on the UI thread. Returns false when the loop is
    /// gone.
    pub fn schedule<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut Controller) + Send + 'static,
    {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(Box::new(task)).is_err() {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!("UI loop closed, dropping task");
            return false;
        }
        true
    }

    /// Register a worker thread; dropping the token deregisters it.
    pub(crate) fn worker(&self) -> WorkerToken {
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        WorkerToken { ui: self.clone() }
    }
}

/// Held by a worker thread for as long as it may still schedule tasks.
pub(crate) struct WorkerToken {
    ui: UiHandle,
}

impl Drop for WorkerToken {
    fn drop(&mut self) {
        // Wake the loop so a pending drain notices the worker is gone
        self.ui.schedule(|_| {});
        self.ui.outstanding.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs scheduled tasks against the controller.
pub struct UiLoop {
    rx: mpsc::UnboundedReceiver<UiTask>,
    outstanding: Arc<AtomicUsize>,
}

impl UiLoop {
    /// Queued tasks plus live workers.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    fn run_task(&self, task: UiTask, controller: &mut Controller) {
        task(controller);
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
    }

    /// Run every task that is already queued. Never blocks.
    pub fn run_pending(&mut self, controller: &mut Controller) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            self.run_task(task, controller);
            ran += 1;
        }
        ran
    }

    /// Run tasks as they arrive until `done` holds or `timeout` passes.
    /// Returns whether `done` was reached.
    pub async fn run_until<F>(
        &mut self,
        controller: &mut Controller,
        timeout: Duration,
        mut done: F,
    ) -> bool
    where
        F: FnMut(&Controller) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if done(controller) {
                return true;
            }
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(task)) => self.run_task(task, controller),
                Ok(None) | Err(_) => return done(controller),
            }
        }
    }

    /// Run tasks as they arrive for `duration`.
    pub async fn run_for(&mut self, controller: &mut Controller, duration: Duration) {
        self.run_until(controller, duration, |_| false).await;
    }

    /// Run tasks until no worker is alive and the queue is empty.
    ///
    /// Call after [`Controller::shutdown`]; nothing scheduled before the
    /// drain completes is left to fire later.
    pub async fn drain(&mut self, controller: &mut Controller) {
        while self.outstanding() > 0 {
            match self.rx.recv().await {
                Some(task) => self.run_task(task, controller),
                None => break,
            }
        }
        tracing::debug!("UI loop drained");
    }
}
