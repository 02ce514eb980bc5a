//! One-shot worker that asks the move engine for a single move.

use crate::error::BridgeError;
use crate::ui::UiHandle;
use engine::{BestMove, EngineCommand, EngineHandle, RecvError, SearchLimit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What a move worker brings back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ThinkResult {
    Move(String),
    NoMove,
    TimedOut(Duration),
    Closed,
    /// A newer request took over before the search started.
    Superseded,
}

pub(super) struct ThinkJob {
    pub(super) generation: Arc<AtomicU64>,
    pub(super) gen: u64,
    pub(super) fen: String,
    pub(super) options: Vec<EngineCommand>,
    pub(super) limit: SearchLimit,
    pub(super) timeout: Duration,
    pub(super) engine: Arc<EngineHandle>,
}

impl ThinkJob {
    fn is_current(&self) -> bool {
        self.generation.load(Ordering::Acquire) == self.gen
    }

    #[tracing::instrument(level = "debug", skip(self), fields(gen = self.gen))]
    fn run(&self) -> ThinkResult {
        // A superseded worker may still be waiting for its bestmove
        let _exchange = self.engine.lock_exchange();
        if !self.is_current() {
            return ThinkResult::Superseded;
        }

        self.engine.drain();
        for option in &self.options {
            self.engine.send(option);
        }
        self.engine.send(EngineCommand::SetPosition {
            fen: self.fen.clone(),
        });
        self.engine.send(EngineCommand::Go(self.limit));

        let deadline = Instant::now() + self.timeout;
        let line = match self
            .engine
            .receive_until(|l| engine::parse_bestmove(l).is_some(), deadline)
        {
            Ok(line) => line,
            Err(RecvError::Timeout) => return ThinkResult::TimedOut(self.timeout),
            Err(RecvError::Closed) => return ThinkResult::Closed,
        };

        match engine::parse_bestmove(&line) {
            Some(BestMove::Move { mv, .. }) => {
                ThinkResult::Move(engine::uci::format_uci_move(&mv))
            }
            _ => ThinkResult::NoMove,
        }
    }
}

/// Run `job` on its own thread and hand the result to the UI thread if the
/// request is still current by then.
pub(super) fn spawn(job: ThinkJob, ui: &UiHandle) -> Result<(), BridgeError> {
    let token = ui.worker();
    let ui = ui.clone();

    thread::Builder::new()
        .name("move-think".to_string())
        .spawn(move || {
            let _token = token;
            let result = job.run();

            if !job.is_current() {
                tracing::debug!(gen = job.gen, ?result, "Dropping stale move result");
                return;
            }

            let (gen, fen) = (job.gen, job.fen);
            ui.schedule(move |controller| controller.finish_think(gen, fen, result));
        })
        .map_err(BridgeError::Thread)?;

    Ok(())
}
