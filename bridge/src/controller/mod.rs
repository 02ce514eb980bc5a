//! The UI-thread owner of everything the bridge does.

mod analysis;
mod think;

pub(crate) use think::ThinkResult;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::position::GamePosition;
use crate::rating::{self, MoveRating};
use crate::snapshot::{EvalSnapshot, EvalUpdate};
use crate::throttle::Sticky;
use crate::ui::UiHandle;
use crate::wdl::Wdl;
use analysis::{AnalysisSession, EngineSource};
use chess::PlayerSide;
use engine::{
    EmbeddedEngine, EngineCommand, EngineConfig, EngineHandle, EngineKind, NnueConfig,
    SearchParams,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// How a move request ended, when it was not superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The engine's move, already applied to the position.
    Played(String),
    /// The engine reported no legal move.
    NoMove,
}

type MoveCallback = Box<dyn FnOnce(&mut Controller, Result<MoveOutcome, BridgeError>)>;
type EvalCallback = Box<dyn FnMut(&EvalUpdate)>;

struct PendingThink {
    gen: u64,
    resume_analysis: bool,
    callback: Option<MoveCallback>,
}

struct PendingRating {
    before: Arc<EvalSnapshot>,
    played: Option<String>,
}

/// Builder for [`Controller`].
#[derive(Default)]
pub struct ControllerBuilder {
    config: BridgeConfig,
    embedded: Option<Arc<dyn EmbeddedEngine>>,
    move_engine: Option<EngineKind>,
    engine_config: EngineConfig,
    analysis_side: Option<PlayerSide>,
}

impl ControllerBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// Engine library used by default for both roles. Each role gets its own
    /// instance.
    pub fn embedded(mut self, engine: Arc<dyn EmbeddedEngine>) -> Self {
        self.embedded = Some(engine);
        self
    }

    /// Engine for move requests, instead of the embedded one.
    pub fn move_engine(mut self, kind: EngineKind) -> Self {
        self.move_engine = Some(kind);
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn analysis_side(mut self, side: PlayerSide) -> Self {
        self.analysis_side = Some(side);
        self
    }

    pub fn build(self, position: impl GamePosition + 'static, ui: UiHandle) -> Controller {
        Controller {
            sticky_mate: Sticky::new(self.config.sticky_mate()),
            sticky_rating: Sticky::new(self.config.sticky_rating()),
            config: self.config,
            position: Box::new(position),
            ui,
            embedded: self.embedded,
            move_kind: self.move_engine,
            move_engine: None,
            engine_config: self.engine_config,
            generation: Arc::new(AtomicU64::new(0)),
            thinking: None,
            analysis: None,
            analysis_request: None,
            analysis_side: self.analysis_side.unwrap_or(PlayerSide::White),
            dispatched: None,
            before_move: None,
            on_eval: None,
            destroyed: false,
        }
    }
}

/// Move requests, live analysis, and move rating for one game.
///
/// Lives on the UI thread. Results from engine threads arrive as tasks on the
/// [`UiLoop`](crate::UiLoop) this controller's [`UiHandle`] feeds.
pub struct Controller {
    config: BridgeConfig,
    position: Box<dyn GamePosition>,
    ui: UiHandle,

    embedded: Option<Arc<dyn EmbeddedEngine>>,
    move_kind: Option<EngineKind>,
    move_engine: Option<Arc<EngineHandle>>,
    engine_config: EngineConfig,

    /// Bumped by every move request, every cancel, and teardown.
    generation: Arc<AtomicU64>,
    thinking: Option<PendingThink>,

    analysis: Option<AnalysisSession>,
    /// Custom engine path of the last `start_analysis`, for restarts.
    analysis_request: Option<Option<PathBuf>>,
    analysis_side: PlayerSide,

    dispatched: Option<Arc<EvalSnapshot>>,
    before_move: Option<PendingRating>,
    sticky_mate: Sticky<i32>,
    sticky_rating: Sticky<MoveRating>,
    on_eval: Option<EvalCallback>,

    destroyed: bool,
}

impl Controller {
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn position(&self) -> &dyn GamePosition {
        self.position.as_ref()
    }

    /// Direct access for moves made outside the bridge. Call
    /// [`mark_human_move_begin`](Self::mark_human_move_begin) first if the move
    /// should be rated.
    pub fn position_mut(&mut self) -> &mut dyn GamePosition {
        self.position.as_mut()
    }

    /// Swap in a new game. Cancels any move request and forgets the rating
    /// baseline; analysis follows the new position.
    pub fn set_position(&mut self, position: impl GamePosition + 'static) {
        self.stop_thinking();
        self.position = Box::new(position);
        self.before_move = None;
        self.dispatched = None;
        self.sticky_mate.clear();
        self.sticky_rating.clear();
        if self.is_analysing() {
            self.resume_analysis();
        }
    }

    pub fn set_eval_callback(&mut self, callback: impl FnMut(&EvalUpdate) + 'static) {
        self.on_eval = Some(Box::new(callback));
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking.is_some()
    }

    pub fn is_analysing(&self) -> bool {
        self.analysis.as_ref().is_some_and(AnalysisSession::is_active)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Last surfaced `(score_cp, is_mate)`, White-relative.
    pub fn evaluation(&self) -> Option<(i32, bool)> {
        self.dispatched.as_ref().map(|s| (s.score_cp, s.is_mate))
    }

    pub fn set_analysis_side(&mut self, side: PlayerSide) {
        self.analysis_side = side;
    }

    /// Replace the bridge configuration. Throttle settings apply to the next
    /// analysis engine started.
    pub fn update_config(&mut self, config: BridgeConfig) {
        self.sticky_mate.set_hold(config.sticky_mate());
        self.sticky_rating.set_hold(config.sticky_rating());
        let live_analysis = config.live_analysis;
        self.config = config;
        if !live_analysis {
            self.stop_analysis(true);
        }
    }

    /// Use `kind` for move requests from now on.
    pub fn set_move_engine(&mut self, kind: EngineKind) {
        self.stop_thinking();
        if let Some(engine) = self.move_engine.take() {
            retire_engine(&self.ui, engine);
        }
        self.move_kind = Some(kind);
    }

    /// Ask the engine for a move in the current position.
    ///
    /// Does nothing while a request is already out. `callback` runs on the UI
    /// thread once the move has been applied, unless the request was
    /// superseded, in which case it never runs.
    #[tracing::instrument(level = "info", skip(self, callback))]
    pub fn request_move<F>(&mut self, params: SearchParams, callback: F) -> Result<(), BridgeError>
    where
        F: FnOnce(&mut Controller, Result<MoveOutcome, BridgeError>) + 'static,
    {
        if self.destroyed || self.thinking.is_some() {
            tracing::debug!("Move request ignored");
            return Ok(());
        }

        let engine = self.ensure_move_engine()?;
        let gen = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let job = think::ThinkJob {
            generation: self.generation.clone(),
            gen,
            fen: self.position.fen(),
            options: self.move_options(&params),
            limit: params.limit(),
            timeout: self.config.think_timeout(&params),
            engine,
        };
        think::spawn(job, &self.ui)?;

        self.thinking = Some(PendingThink {
            gen,
            resume_analysis: self.is_analysing(),
            callback: Some(Box::new(callback)),
        });
        self.set_analysis_paused(true);
        Ok(())
    }

    /// Cancel the outstanding move request. Its result will be discarded.
    pub fn stop_thinking(&mut self) {
        let Some(think) = self.thinking.take() else {
            return;
        };
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(engine) = &self.move_engine {
            engine.send(EngineCommand::Stop);
        }
        self.set_analysis_paused(false);
        tracing::info!(gen = think.gen, "Move request cancelled");
    }

    /// Start live analysis of the current position with the embedded engine
    /// (`custom == None`) or the binary at `custom`.
    ///
    /// Calling it again for the same engine and position is a no-op; a new
    /// position reuses the running engine.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn start_analysis(&mut self, custom: Option<&Path>) -> Result<(), BridgeError> {
        if self.destroyed {
            return Ok(());
        }
        if !self.config.live_analysis {
            self.stop_analysis(true);
            return Ok(());
        }

        self.analysis_request = Some(custom.map(Path::to_path_buf));
        if self.position.is_game_over() {
            tracing::debug!("Game over, not analysing");
            self.stop_analysis(false);
            return Ok(());
        }

        let kind = match custom {
            Some(path) => EngineKind::External(path.to_path_buf()),
            None => EngineKind::Embedded(self.embedded.clone().ok_or(BridgeError::NoEmbeddedEngine)?),
        };
        let source = EngineSource::of(&kind);
        let fen = self.position.fen();

        if let Some(session) = &self.analysis {
            if session.source == source && session.is_alive() {
                if !(session.is_active() && session.fen() == fen) {
                    session.search(&fen);
                }
                return Ok(());
            }
        }

        self.stop_analysis(true);
        let session = AnalysisSession::open(
            kind,
            source,
            self.analysis_options(),
            &self.config,
            self.thinking.is_some(),
            &self.ui,
        )?;
        session.search(&fen);
        self.analysis = Some(session);
        Ok(())
    }

    /// Stop live analysis, closing the engine when `free` is set.
    pub fn stop_analysis(&mut self, free: bool) {
        if let Some(session) = &self.analysis {
            session.halt();
        }
        if free {
            // Dropping the session closes its engine
            self.analysis = None;
        }
    }

    /// Choose the NNUE network for both roles.
    pub fn set_nnue(&mut self, nnue: NnueConfig) {
        if let Some(session) = &self.analysis {
            session.apply_options(nnue.commands());
        }
        self.engine_config.nnue = Some(nnue);
    }

    /// Capture the evaluation the next human move will be rated against.
    /// `played` is the move about to be made, if known.
    pub fn mark_human_move_begin(&mut self, played: Option<&str>) {
        // Only an evaluation of the position being left is a valid baseline
        let fen = self.position.fen();
        let current = |snapshot: &Arc<EvalSnapshot>| snapshot.fen == fen;
        let before = self
            .analysis
            .as_ref()
            .and_then(AnalysisSession::latest)
            .filter(current)
            .or_else(|| self.dispatched.clone().filter(current));

        self.before_move = before.map(|before| PendingRating {
            before,
            played: played.map(str::to_string),
        });
    }

    /// Play a human move: arm the rating, apply the move, and move analysis
    /// along.
    pub fn play_human_move(&mut self, uci: &str) -> Result<(), BridgeError> {
        self.mark_human_move_begin(Some(uci));
        if let Err(source) = self.position.apply_uci_move(uci) {
            self.before_move = None;
            return Err(BridgeError::MoveRejected {
                mv: uci.to_string(),
                source,
            });
        }
        if self.is_analysing() {
            self.resume_analysis();
        }
        Ok(())
    }

    /// Tear everything down. Follow with [`UiLoop::drain`](crate::UiLoop::drain)
    /// before dropping the controller.
    pub fn shutdown(&mut self) {
        if self.destroyed {
            return;
        }
        tracing::info!("Shutting down bridge");
        self.stop_thinking();
        self.destroyed = true;
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.stop_analysis(true);
        if let Some(engine) = self.move_engine.take() {
            retire_engine(&self.ui, engine);
        }
    }

    pub(crate) fn finish_think(&mut self, gen: u64, fen: String, result: ThinkResult) {
        let current = self.generation();
        let pending = self.thinking.as_ref().map(|t| t.gen);
        if self.destroyed || gen != current || pending != Some(gen) {
            tracing::debug!(gen, current, "Discarding stale move result");
            return;
        }
        let Some(mut think) = self.thinking.take() else {
            return;
        };
        self.set_analysis_paused(false);

        let outcome = match result {
            ThinkResult::Move(uci) => self.apply_engine_move(&fen, uci),
            ThinkResult::NoMove => Ok(MoveOutcome::NoMove),
            ThinkResult::TimedOut(waited) => {
                tracing::warn!("Engine unresponsive after {:?}, restarting it", waited);
                if let Some(engine) = self.move_engine.take() {
                    retire_engine(&self.ui, engine);
                }
                Err(BridgeError::EngineUnresponsive { waited })
            }
            ThinkResult::Closed => {
                tracing::warn!("Move engine closed during search");
                self.move_engine = None;
                Err(BridgeError::EngineClosed)
            }
            ThinkResult::Superseded => return,
        };

        if think.resume_analysis && matches!(outcome, Ok(MoveOutcome::Played(_))) {
            self.resume_analysis();
        }
        if let Some(callback) = think.callback.take() {
            callback(self, outcome);
        }
    }

    pub(crate) fn dispatch_eval(&mut self, snapshot: Arc<EvalSnapshot>) {
        if self.destroyed {
            return;
        }
        if snapshot.fen != self.position.fen() {
            tracing::trace!("Discarding evaluation of a stale position");
            return;
        }

        let now = Instant::now();
        self.dispatched = Some(snapshot.clone());

        if snapshot.is_mate {
            self.sticky_mate.set(snapshot.mate_distance, now);
        }
        let mate = if snapshot.is_mate {
            Some(snapshot.mate_distance)
        } else {
            self.sticky_mate.get(now).copied()
        };

        let rating = match self.take_rating(&snapshot) {
            Some(rating) => {
                self.sticky_rating.set(rating.clone(), now);
                Some(rating)
            }
            None => self.sticky_rating.get(now).cloned(),
        };

        let wdl = Wdl::estimate(self.analysis_side, snapshot.score_cp, mate);
        let display_mate = mate.filter(|distance| {
            self.config.show_mate_warning && distance.abs() <= self.config.mate_warning_max_distance
        });

        let update = EvalUpdate {
            snapshot: EvalSnapshot::clone(&snapshot),
            display_mate,
            wdl,
            rating,
            move_number: self.position.move_number(),
        };
        if let Some(callback) = self.on_eval.as_mut() {
            callback(&update);
        }
    }

    fn take_rating(&mut self, after: &EvalSnapshot) -> Option<MoveRating> {
        let pending = self.before_move.take()?;
        if pending.before.fen == after.fen {
            tracing::debug!("Rating skipped: position unchanged");
            return None;
        }

        let mover = if rating::white_moved(&pending.before.fen) {
            PlayerSide::White
        } else {
            PlayerSide::Black
        };
        if !self.position.mode().is_human(mover) {
            return None;
        }

        let rating = rating::rate_move(&pending.before, after, pending.played.as_deref());
        tracing::info!(
            played = pending.played.as_deref().unwrap_or("?"),
            penalty = rating.penalty_cp,
            "Move rated {}",
            rating
        );
        Some(rating)
    }

    fn apply_engine_move(&mut self, fen: &str, uci: String) -> Result<MoveOutcome, BridgeError> {
        if self.position.fen() != fen {
            tracing::warn!("Board changed during search, dropping {}", uci);
            return Err(BridgeError::PositionChanged);
        }
        self.position
            .apply_uci_move(&uci)
            .map_err(|source| BridgeError::MoveRejected {
                mv: uci.clone(),
                source,
            })?;
        tracing::info!("Engine played {}", uci);
        Ok(MoveOutcome::Played(uci))
    }

    fn resume_analysis(&mut self) {
        let Some(request) = self.analysis_request.clone() else {
            return;
        };
        if let Err(e) = self.start_analysis(request.as_deref()) {
            tracing::error!("Failed to restart analysis: {}", e);
        }
    }

    fn set_analysis_paused(&self, paused: bool) {
        if let Some(session) = &self.analysis {
            session.set_paused(paused);
        }
    }

    fn ensure_move_engine(&mut self) -> Result<Arc<EngineHandle>, BridgeError> {
        if let Some(engine) = &self.move_engine {
            if engine.is_running() {
                return Ok(engine.clone());
            }
        }

        let kind = match (&self.move_kind, &self.embedded) {
            (Some(kind), _) => kind.clone(),
            (None, Some(embedded)) => EngineKind::Embedded(embedded.clone()),
            (None, None) => return Err(BridgeError::NoEmbeddedEngine),
        };
        let engine = Arc::new(EngineHandle::open(kind)?);
        engine.send(EngineCommand::Uci);
        engine.send(EngineCommand::IsReady);
        tracing::info!("Move engine started ({})", engine.label());

        self.move_engine = Some(engine.clone());
        Ok(engine)
    }

    fn move_options(&self, params: &SearchParams) -> Vec<EngineCommand> {
        let mut config = self.engine_config.clone();
        if params.skill_level.is_some() {
            config.skill_level = params.skill_level;
        }
        config.commands()
    }

    fn analysis_options(&self) -> Vec<EngineCommand> {
        let config = EngineConfig {
            skill_level: None,
            ..self.engine_config.clone()
        };
        let mut options = vec![EngineCommand::SetOption {
            name: "MultiPV".to_string(),
            value: Some(self.config.multipv.max(1).to_string()),
        }];
        options.extend(config.commands());
        options
    }
}

/// Close `engine` off the UI thread. The close counts as a live worker so
/// [`UiLoop::drain`](crate::UiLoop::drain) waits for it.
pub(crate) fn retire_engine(ui: &UiHandle, engine: Arc<EngineHandle>) {
    let token = ui.worker();
    let spawned = thread::Builder::new()
        .name("engine-close".to_string())
        .spawn(move || {
            let _token = token;
            engine.close();
        });
    if let Err(e) = spawned {
        // The engine closes when its last handle drops
        tracing::warn!("Failed to spawn closer thread: {}", e);
    }
}
