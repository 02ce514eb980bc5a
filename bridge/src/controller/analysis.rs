//! Background analysis: one engine running `go infinite` and one long-lived
//! thread turning its `info` lines into evaluation updates.

use super::retire_engine;
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::snapshot::EvalSnapshot;
use crate::throttle::AnalysisThrottle;
use crate::ui::{UiHandle, WorkerToken};
use engine::{EngineCommand, EngineHandle, EngineKind, RecvError, SearchLimit};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// How often a blocked reader re-checks whether it should pause.
const PAUSE_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Identity of an analysis engine, for deciding whether a running one can be
/// reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum EngineSource {
    Embedded(String),
    External(PathBuf),
}

impl EngineSource {
    pub(super) fn of(kind: &EngineKind) -> Self {
        match kind {
            EngineKind::Embedded(engine) => Self::Embedded(engine.name().to_string()),
            EngineKind::External(path) => Self::External(path.clone()),
        }
    }
}

#[derive(Debug, Default)]
struct Gate {
    active: bool,
    paused: bool,
    closed: bool,
}

#[derive(Debug, Default)]
struct Target {
    fen: String,
    black_to_move: bool,
    searching: bool,
    /// `bestmove` lines still owed by stopped searches. Output is not
    /// attributed to `fen` until they have all been read.
    pending_bestmoves: u32,
}

#[derive(Default)]
struct Shared {
    gate: Mutex<Gate>,
    wake: Condvar,
    target: Mutex<Target>,
    latest: Mutex<Option<Arc<EvalSnapshot>>>,
}

impl Shared {
    fn gate(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn target(&self) -> MutexGuard<'_, Target> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_gate(&self, f: impl FnOnce(&mut Gate)) {
        let mut gate = self.gate();
        f(&mut gate);
        self.wake.notify_all();
    }

    /// Block while analysis is stopped or paused. False once closed.
    fn wait_until_readable(&self) -> bool {
        let gate = self.gate();
        let gate = self
            .wake
            .wait_while(gate, |g| !g.closed && (!g.active || g.paused))
            .unwrap_or_else(PoisonError::into_inner);
        !gate.closed
    }
}

/// A running analysis engine and its reader thread.
pub(super) struct AnalysisSession {
    pub(super) source: EngineSource,
    engine: Arc<EngineHandle>,
    shared: Arc<Shared>,
    ui: UiHandle,
}

impl AnalysisSession {
    #[tracing::instrument(level = "info", skip_all, fields(source = ?source))]
    pub(super) fn open(
        kind: EngineKind,
        source: EngineSource,
        options: Vec<EngineCommand>,
        config: &BridgeConfig,
        paused: bool,
        ui: &UiHandle,
    ) -> Result<Self, BridgeError> {
        let engine = Arc::new(EngineHandle::open(kind)?);
        engine.send(EngineCommand::Uci);
        for option in options {
            engine.send(option);
        }
        engine.send(EngineCommand::IsReady);

        let shared = Arc::new(Shared::default());
        shared.update_gate(|g| g.paused = paused);

        let reader = Reader {
            engine: engine.clone(),
            shared: shared.clone(),
            ui: ui.clone(),
            throttle: AnalysisThrottle::new(config.throttle_interval(), config.urgent_score_delta),
        };
        let token = ui.worker();
        thread::Builder::new()
            .name("analysis".to_string())
            .spawn(move || reader.run(token))
            .map_err(BridgeError::Thread)?;

        tracing::info!("Analysis engine started ({})", engine.label());
        Ok(Self {
            source,
            engine,
            shared,
            ui: ui.clone(),
        })
    }

    pub(super) fn is_alive(&self) -> bool {
        self.engine.is_running()
    }

    pub(super) fn is_active(&self) -> bool {
        self.shared.gate().active
    }

    pub(super) fn fen(&self) -> String {
        self.shared.target().fen.clone()
    }

    /// Latest parsed evaluation, throttled or not.
    pub(super) fn latest(&self) -> Option<Arc<EvalSnapshot>> {
        self.shared
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start (or move) the infinite search to `fen`.
    pub(super) fn search(&self, fen: &str) {
        {
            let mut target = self.shared.target();
            self.stop_search(&mut target);
            target.fen = fen.to_string();
            target.black_to_move = engine::black_to_move(fen);
            self.engine.send(EngineCommand::SetPosition {
                fen: fen.to_string(),
            });
            self.engine.send(EngineCommand::Go(SearchLimit::Infinite));
            target.searching = true;
        }
        tracing::debug!("Analysing {}", fen);
        self.shared.update_gate(|g| g.active = true);
    }

    /// Stop searching and reading. The engine stays up for a later `search`.
    pub(super) fn halt(&self) {
        self.shared.update_gate(|g| g.active = false);
        let mut target = self.shared.target();
        self.stop_search(&mut target);
    }

    pub(super) fn set_paused(&self, paused: bool) {
        self.shared.update_gate(|g| g.paused = paused);
    }

    /// Send options, which UCI only accepts between searches.
    pub(super) fn apply_options(&self, options: Vec<EngineCommand>) {
        let active = self.is_active();
        let mut target = self.shared.target();
        self.stop_search(&mut target);
        for option in options {
            self.engine.send(option);
        }
        if active {
            self.engine.send(EngineCommand::SetPosition {
                fen: target.fen.clone(),
            });
            self.engine.send(EngineCommand::Go(SearchLimit::Infinite));
            target.searching = true;
        }
    }

    fn stop_search(&self, target: &mut Target) {
        if target.searching {
            self.engine.send(EngineCommand::Stop);
            target.pending_bestmoves += 1;
            target.searching = false;
        }
    }
}

impl Drop for AnalysisSession {
    fn drop(&mut self) {
        self.shared.update_gate(|g| {
            g.active = false;
            g.closed = true;
        });
        retire_engine(&self.ui, self.engine.clone());
    }
}

struct Reader {
    engine: Arc<EngineHandle>,
    shared: Arc<Shared>,
    ui: UiHandle,
    throttle: AnalysisThrottle,
}

impl Reader {
    fn run(mut self, _token: WorkerToken) {
        tracing::debug!("Analysis reader started");
        while self.shared.wait_until_readable() {
            match self.engine.receive_timeout(PAUSE_CHECK_INTERVAL) {
                Ok(line) => self.handle_line(&line),
                Err(RecvError::Timeout) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Analysis reader exiting");
    }

    fn handle_line(&mut self, line: &str) {
        if engine::parse_bestmove(line).is_some() {
            let mut target = self.shared.target();
            if target.pending_bestmoves > 0 {
                target.pending_bestmoves -= 1;
            } else {
                // The engine ended the search by itself
                target.searching = false;
            }
            return;
        }

        if !line.starts_with("info") {
            return;
        }

        let (fen, black_to_move) = {
            let target = self.shared.target();
            if target.pending_bestmoves > 0 {
                return;
            }
            (target.fen.clone(), target.black_to_move)
        };

        let Some(info) = engine::parse_info(line, black_to_move) else {
            return;
        };
        if info.multipv != 1 {
            return;
        }

        let snapshot = Arc::new(EvalSnapshot::from_info(fen, info));
        *self
            .shared
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());

        if self.throttle.should_dispatch(&snapshot, Instant::now()) {
            self.ui.schedule(move |controller| controller.dispatch_eval(snapshot));
        }
    }
}
